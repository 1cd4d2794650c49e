//! Logging utilities and structured logging support

pub use log::{debug, info, warn, error, trace};

use crate::config::RuntimeConfig;

/// Initialize the logging system with the level from the runtime config
///
/// `RUST_LOG` still takes precedence when it is set. Calling this more than
/// once is harmless; later calls are ignored.
pub fn init_with_config(config: &RuntimeConfig) {
    let _ = env_logger::Builder::new()
        .filter_level(config.log_level.into())
        .parse_default_env()
        .try_init();
}
