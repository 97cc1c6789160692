//! Pre-built Test Fixtures
//!
//! Ready-to-use test data for common entities. Fixtures are consistent and
//! predictable so assertions can name exact values.

use core_kernel::{Currency, UserId};

/// Fixture for user identities
pub struct UserFixtures;

impl UserFixtures {
    /// The default test user
    pub fn alice() -> UserId {
        UserId::new("user-alice")
    }

    /// A second user for isolation tests
    pub fn bob() -> UserId {
        UserId::new("user-bob")
    }
}

/// Fixture for purchase amounts, mirroring the default package catalog
pub struct PurchaseFixtures;

impl PurchaseFixtures {
    pub const STARTER_CENTS: i64 = 999;
    pub const STARTER_CREDITS: i64 = 100;

    pub const STANDARD_CENTS: i64 = 2999;
    pub const STANDARD_CREDITS: i64 = 350;

    pub fn currency() -> Currency {
        Currency::USD
    }
}
