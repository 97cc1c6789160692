//! Credit package catalog
//!
//! Checkout prices are resolved server-side: a client sends a package id and
//! the catalog is the single authority for how much that package costs and
//! how many credits it grants. This keeps price tampering out of the checkout
//! path entirely.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use core_kernel::Currency;

/// A purchasable credit bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditPackage {
    pub id: String,
    pub amount_cents: i64,
    pub currency: Currency,
    pub credits: i64,
}

/// Server-side price authority for checkout
#[derive(Debug, Clone)]
pub struct PackageCatalog {
    packages: BTreeMap<String, CreditPackage>,
    currency: Currency,
}

impl PackageCatalog {
    pub fn new(currency: Currency, packages: Vec<CreditPackage>) -> Self {
        Self {
            packages: packages.into_iter().map(|p| (p.id.clone(), p)).collect(),
            currency,
        }
    }

    /// The built-in package list used when no catalog is configured
    pub fn default_catalog(currency: Currency) -> Self {
        Self::new(currency, vec![
            CreditPackage {
                id: "starter".to_string(),
                amount_cents: 999,
                currency,
                credits: 100,
            },
            CreditPackage {
                id: "standard".to_string(),
                amount_cents: 2999,
                currency,
                credits: 350,
            },
            CreditPackage {
                id: "pro".to_string(),
                amount_cents: 7999,
                currency,
                credits: 1000,
            },
        ])
    }

    pub fn get(&self, id: &str) -> Option<&CreditPackage> {
        self.packages.get(id)
    }

    /// Settlement currency for custom top-ups outside the package list
    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn all(&self) -> impl Iterator<Item = &CreditPackage> {
        self.packages.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_id() {
        let catalog = PackageCatalog::default_catalog(Currency::USD);
        let pkg = catalog.get("standard").unwrap();
        assert_eq!(pkg.amount_cents, 2999);
        assert_eq!(pkg.credits, 350);
        assert!(catalog.get("nonexistent").is_none());
    }
}
