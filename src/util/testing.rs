//! Test support: one-time tracing setup shared by unit and integration tests.

use std::sync::Once;

use tracing::{debug, info};
use tracing_subscriber::{
    filter::filter_fn,
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

/// XML parser and writer targets, silenced even at `trace`.
const NOISY_TARGETS: [&str; 2] = ["quick_xml", "roxmltree"];

static TEST_SETUP: Once = Once::new();

/// Install the test subscriber once per process; `RUST_LOG` overrides the `trace` default.
pub fn init_test_setup() {
    TEST_SETUP.call_once(|| {
        if tracing::dispatcher::has_been_set() {
            debug!("tracing subscriber already set");
            return;
        }
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trace"));
        let quiet_xml = filter_fn(|metadata| {
            !NOISY_TARGETS
                .iter()
                .any(|target| metadata.target().starts_with(target))
        });

        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_span_events(FmtSpan::CLOSE)
                .with_filter(quiet_xml)
                .with_filter(env_filter),
        );
        if let Err(e) = subscriber.try_init() {
            eprintln!("Error: Failed to set up test logging: {}", e);
        }
        info!("texclean test logging ready");
    });
}
