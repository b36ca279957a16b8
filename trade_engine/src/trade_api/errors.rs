use thiserror::Error;

use crate::traits::{StoreError, UpstreamError};

/// Errors returned by the reconciliation APIs.
///
/// The batch entry points (`sync_all`, `sync_for_user`, ...) only return an error when the work itself cannot be
/// enumerated. Failures of individual containers, configs, orders or buyers are logged and counted instead.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    #[error("{0}")]
    Store(#[from] StoreError),
    #[error("{0}")]
    Upstream(#[from] UpstreamError),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}
