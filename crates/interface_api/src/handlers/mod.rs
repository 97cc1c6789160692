//! Request handlers

pub mod checkout;
pub mod credits;
pub mod health;
pub mod payments;
pub mod reconciliation;
pub mod refunds;
pub mod reservations;
pub mod webhooks;
