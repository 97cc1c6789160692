//! Payments Domain - Payment, Refund, and Reservation Lifecycles
//!
//! This crate owns the state machines that sit between payment providers and
//! the credit ledger:
//!
//! - **Payment**: one checkout attempt; credits are granted exactly once when
//!   a verified webhook confirms success
//! - **Refund**: reverses a payment in full or in part, clawing back a
//!   proportional share of the granted credits
//! - **UsageReservation**: a temporary hold on spendable credits that is
//!   later consumed, cancelled, or expired
//!
//! Provider interactions (checkout sessions, refund execution) go through
//! adapter ports so the domain never speaks HTTP itself.

pub mod payment;
pub mod refund;
pub mod reservation;
pub mod catalog;
pub mod provider;
pub mod store;
pub mod service;
pub mod refund_service;
pub mod reservation_service;
pub mod error;

pub use payment::{Payment, PaymentStatus, Provider};
pub use refund::{Refund, RefundStatus, proportional_credits};
pub use reservation::{UsageReservation, ReservationStatus, DEFAULT_RESERVATION_TTL};
pub use catalog::{CreditPackage, PackageCatalog};
pub use provider::{
    ProviderCheckoutAdapter, ProviderRefundAdapter, CheckoutSession,
    ProviderRefund, ProviderRefundStatus,
};
pub use store::{PaymentStore, RefundStore, ReservationStore, PaymentInsert, RefundInsert, ReservationInsert};
pub use service::PaymentService;
pub use refund_service::{RefundOrchestrator, RefundOutcome};
pub use reservation_service::ReservationService;
pub use error::PaymentError;
