//! Tracing initialisation for tests.
//!
//! The subscriber is installed at most once per process, so every test may
//! call [`init_test_tracing`] first thing.

use tracing_subscriber::EnvFilter;

/// Install a subscriber that writes through the test harness and honours
/// `RUST_LOG` (default `debug` for the parley crates, `warn` elsewhere).
///
/// ```ignore
/// #[tokio::test]
/// async fn my_test() {
///     parley_test_utils::tracing_setup::init_test_tracing();
///     tracing::debug!("visible under --nocapture");
/// }
/// ```
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,parley_core=debug,parley_config=debug")),
        )
        .with_test_writer()
        .try_init();
}
