//! Unified error type for process-level failures.

use crate::config::ConfigError;
use crate::store::StoreError;

/// Failures that stop the service from starting or serving.
///
/// Request-level failures never surface here: they are turned into HTTP
/// responses by the handlers (see [`ApiError`](crate::api::ApiError)).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("store: {0}")]
    Store(#[from] StoreError),
}
