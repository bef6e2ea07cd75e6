//! Domain error types.

use market_store::StoreError;
use thiserror::Error;

use crate::order::OrderError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the persistence layer.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A workflow rule was violated.
    #[error(transparent)]
    Order(#[from] OrderError),
}
