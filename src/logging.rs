//! `tracing` subscriber bootstrap, in the shape of the teacher's
//! `logging::init_logging`.

use crate::error::CacheError;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs a global `tracing` subscriber filtered by `level` (an
/// `EnvFilter` directive string, e.g. `"info"` or `"latticekv=debug"`).
pub fn init_logging(level: &str) -> crate::error::Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_new(level)
                .map_err(|e| CacheError::Invalid(format!("invalid log level: {e}")))?,
        )
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .map_err(|_| CacheError::Invalid("logging already initialized".to_string()))
}
