//! Common test utilities and helpers


pub use fakes::{FakeFetcher, MemoryDataset, MemoryStore};

/// Logging utilities for tests
pub mod logging {
    use std::sync::Once;
    use tracing::{debug, info};

    static INIT: Once = Once::new();

    /// Initialize test logging
    pub fn init_test_logging() {
        INIT.call_once(|| {
            // Only initialize if not already initialized
            if tracing::subscriber::set_global_default(
                tracing_subscriber::fmt()
                    .with_env_filter("data_actors=debug,test=debug")
                    .with_test_writer()
                    .finish(),
            )
            .is_err()
            {
                // If already initialized, just continue
            }
        });
    }

    /// Log test step
    pub fn log_test_step(step: &str) {
        info!("🧪 Test Step: {}", step);
    }

    /// Log test data
    pub fn log_test_data<T: std::fmt::Debug>(label: &str, data: &T) {
        debug!("📊 {}: {:?}", label, data);
    }
}
