//! Property-Based Test Generators
//!
//! Proptest strategies for generating random test data that maintains
//! domain invariants.

use core_kernel::Currency;
use domain_payments::Provider;
use proptest::prelude::*;

/// Strategy for generating supported currencies
pub fn currency_strategy() -> impl Strategy<Value = Currency> {
    prop_oneof![
        Just(Currency::USD),
        Just(Currency::EUR),
        Just(Currency::MXN),
    ]
}

/// Strategy for generating providers
pub fn provider_strategy() -> impl Strategy<Value = Provider> {
    prop_oneof![Just(Provider::Stripe), Just(Provider::PayPal)]
}

/// Strategy for valid charge amounts in cents
pub fn amount_cents_strategy() -> impl Strategy<Value = i64> {
    100i64..100_000
}

/// Strategy for valid purchased-credit counts
pub fn credits_strategy() -> impl Strategy<Value = i64> {
    1i64..10_000
}

/// Strategy for `(amount_cents, credits)` purchase pairs
pub fn purchase_strategy() -> impl Strategy<Value = (i64, i64)> {
    (amount_cents_strategy(), credits_strategy())
}

/// Strategy for lists of purchases, as a checkout session history
pub fn purchase_history_strategy(max: usize) -> impl Strategy<Value = Vec<(i64, i64)>> {
    prop::collection::vec(purchase_strategy(), 1..max)
}
