//! Service container for dependency injection
//!
//! Wires up all services with their dependencies.

use std::sync::Arc;

use crate::application::services::CleanerService;
use crate::config::Settings;
use crate::infrastructure::traits::{FileSystem, MathTranslator, RealFileSystem};
use crate::infrastructure::translator::ProcessTranslator;
use crate::infrastructure::InfraResult;

/// Container holding all application services.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,

    /// Injected translator; the engine process translator is built on demand otherwise
    translator: Option<Arc<dyn MathTranslator>>,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings) -> Self {
        Self::with_deps(settings, Arc::new(RealFileSystem), None)
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(
        settings: Settings,
        fs: Arc<dyn FileSystem>,
        translator: Option<Arc<dyn MathTranslator>>,
    ) -> Self {
        let settings = Arc::new(settings);

        Self {
            settings,
            fs,
            translator,
        }
    }

    /// Math translator; fails when the configured engine executable is missing.
    pub fn translator(&self) -> InfraResult<Arc<dyn MathTranslator>> {
        if let Some(translator) = &self.translator {
            return Ok(Arc::clone(translator));
        }
        let translator = ProcessTranslator::new(&self.settings.translator)?;
        Ok(Arc::new(translator))
    }

    /// Tree cleaner wired to the translator and filesystem.
    pub fn cleaner(&self) -> InfraResult<CleanerService> {
        Ok(CleanerService::new(
            self.translator()?,
            Arc::clone(&self.fs),
            Arc::clone(&self.settings),
        ))
    }
}
