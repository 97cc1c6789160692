//! Core Kernel - Foundational types and utilities for the credits system
//!
//! This crate provides the fundamental building blocks used across all domain modules:
//! - Money types with precise decimal arithmetic over minor units
//! - Strongly-typed identifiers for payments, refunds, reservations, and ledger entries
//! - Port error taxonomy shared by all store and adapter traits
//! - Deployment environment handling

pub mod money;
pub mod identifiers;
pub mod environment;
pub mod ports;

pub use money::{Money, Currency, MoneyError};
pub use identifiers::{
    UserId, TxId, PaymentId, RefundId, ReservationId, WebhookEventId,
};
pub use environment::Environment;
pub use ports::{PortError, DomainPort, AdapterConfig};
