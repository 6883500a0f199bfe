//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/texclean/texclean.toml`
//! 3. Local config: `<project_dir>/.texclean.toml`
//! 4. Environment variables: `TEXCLEAN_*` prefix

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;

/// File names of the debug dumps written around a cleaning run.
pub const DUMP_BEFORE: &str = "texclean.before";
pub const DUMP_AFTER: &str = "texclean.after";

/// Math translator process settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TranslatorSettings {
    /// Engine executable, bare names are looked up on PATH
    pub executable: PathBuf,
    /// Startup flags
    pub args: Vec<String>,
    /// Banner lines printed by the engine before it reads input
    pub preamble_lines: usize,
    /// Maximum wait for a single output line, in milliseconds
    pub timeout_ms: u64,
    /// Error reports tolerated per request before giving up
    pub max_errors: usize,
}

impl Default for TranslatorSettings {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("tralics"),
            args: vec![
                "-interactivemath".into(),
                "-noconfig".into(),
                "-entnames=no".into(),
            ],
            preamble_lines: 4,
            timeout_ms: 10_000,
            max_errors: 3,
        }
    }
}

impl TranslatorSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn merge(&self, overlay: &RawTranslatorSettings) -> Self {
        Self {
            executable: overlay
                .executable
                .clone()
                .unwrap_or_else(|| self.executable.clone()),
            args: overlay.args.clone().unwrap_or_else(|| self.args.clone()),
            preamble_lines: overlay.preamble_lines.unwrap_or(self.preamble_lines),
            timeout_ms: overlay.timeout_ms.unwrap_or(self.timeout_ms),
            max_errors: overlay.max_errors.unwrap_or(self.max_errors),
        }
    }
}

/// Debug dump settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DumpSettings {
    /// Directory receiving `texclean.before` / `texclean.after`, no dumps when unset
    pub dir: Option<PathBuf>,
}

impl DumpSettings {
    pub fn before_path(&self) -> Option<PathBuf> {
        self.dir.as_ref().map(|d| d.join(DUMP_BEFORE))
    }

    pub fn after_path(&self) -> Option<PathBuf> {
        self.dir.as_ref().map(|d| d.join(DUMP_AFTER))
    }
}

/// Raw translator settings for intermediate parsing (None = not specified).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawTranslatorSettings {
    pub executable: Option<PathBuf>,
    pub args: Option<Vec<String>>,
    pub preamble_lines: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub max_errors: Option<usize>,
}

/// Raw dump settings for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawDumpSettings {
    pub dir: Option<PathBuf>,
}

/// Raw settings for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub translator: RawTranslatorSettings,
    pub dump: RawDumpSettings,
}

/// Unified configuration for texclean.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub translator: TranslatorSettings,
    pub dump: DumpSettings,
}

/// Get the XDG config directory for texclean.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "texclean").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("texclean.toml"))
}

/// Get the path to the local config file in a project directory.
pub fn local_config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(".texclean.toml")
}

/// Expand `~`, `$VAR` and `${VAR}`; unknown variables leave the input as is.
pub fn expand_env_vars(path: &str) -> String {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Expand shell variables and tilde in path-like fields.
    fn expand_paths(&mut self) {
        let expanded = expand_env_vars(self.translator.executable.to_string_lossy().as_ref());
        self.translator.executable = PathBuf::from(expanded);

        if let Some(dir) = &self.dump.dir {
            self.dump.dir = Some(PathBuf::from(expand_env_vars(
                dir.to_string_lossy().as_ref(),
            )));
        }
    }

    /// Overlay wins wherever it specifies a value.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            translator: self.translator.merge(&overlay.translator),
            dump: DumpSettings {
                dir: overlay.dump.dir.clone().or_else(|| self.dump.dir.clone()),
            },
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `project_dir` - Optional directory holding a local `.texclean.toml`
    pub fn load(project_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                let raw = load_raw_settings(&global_path)?;
                current = current.merge_with(&raw);
            }
        }

        if let Some(dir) = project_dir {
            let local_path = local_config_path(dir);
            if local_path.exists() {
                let raw = load_raw_settings(&local_path)?;
                current = current.merge_with(&raw);
            }
        }

        current = Self::apply_env_overrides(current)?;
        current.expand_paths();

        Ok(current)
    }

    /// Apply TEXCLEAN_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let builder = Config::builder().add_source(
            Environment::with_prefix("TEXCLEAN")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("translator.args")
                .try_parsing(true),
        );

        let config = builder.build().map_err(config_err)?;

        if let Ok(val) = config.get_string("translator.executable") {
            settings.translator.executable = PathBuf::from(val);
        }
        if let Ok(val) = config.get::<Vec<String>>("translator.args") {
            settings.translator.args = val;
        }
        if let Ok(val) = config.get::<usize>("translator.preamble_lines") {
            settings.translator.preamble_lines = val;
        }
        if let Ok(val) = config.get::<u64>("translator.timeout_ms") {
            settings.translator.timeout_ms = val;
        }
        if let Ok(val) = config.get::<usize>("translator.max_errors") {
            settings.translator.max_errors = val;
        }
        if let Ok(val) = config.get_string("dump.dir") {
            settings.dump.dir = Some(PathBuf::from(val));
        }

        Ok(settings)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# texclean configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/texclean/texclean.toml
#   Local:  <project_dir>/.texclean.toml
#   Env:    TEXCLEAN_* environment variables, e.g. TEXCLEAN_TRANSLATOR__EXECUTABLE

[translator]
# LaTeX to MathML engine, bare names are looked up on PATH
# executable = "tralics"

# Startup flags selecting interactive math mode
# args = ["-interactivemath", "-noconfig", "-entnames=no"]

# Banner lines the engine prints before reading input
# preamble_lines = 4

# Maximum wait for one line of engine output (milliseconds)
# timeout_ms = 10000

# Error reports tolerated per formula before giving up
# max_errors = 3

[dump]
# Write texclean.before / texclean.after into this directory
# dir = "/tmp"
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
