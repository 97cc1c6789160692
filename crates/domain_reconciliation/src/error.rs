//! Reconciliation errors

use thiserror::Error;

use core_kernel::PortError;

#[derive(Debug, Error)]
pub enum ReconciliationError {
    #[error(transparent)]
    Store(#[from] PortError),
}
