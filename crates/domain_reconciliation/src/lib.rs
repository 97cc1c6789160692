//! Reconciliation Domain - Provider vs Ledger Comparison
//!
//! Periodically the provider's view of the world is compared against our
//! payment records. This crate is strictly read-only: it reports what
//! disagrees, it never fixes anything. Corrections go through the normal
//! payment and refund flows with a human in the loop.

pub mod report;
pub mod comparator;
pub mod audit;
pub mod error;

pub use report::{
    ReconciliationReport, ProviderPaymentRecord, AmountDiscrepancy, StatusDiscrepancy,
    normalize_provider_status, AMOUNT_TOLERANCE_CENTS,
};
pub use comparator::ReconciliationService;
pub use audit::{FindingKind, InternalAudit, InternalAuditReport, InternalFinding};
pub use error::ReconciliationError;
