//! Product domain model

use serde::{Deserialize, Serialize};

use super::money::Money;
use super::nullable::default_on_null;

/// Packaging unit of a product, e.g. "gram" for loose candy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    /// Ask the operator for an amount right after scanning
    #[serde(default)]
    pub ask: bool,
}

/// Price of a product for members of one person group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub person_group_id: i64,
    pub amount: Money,
}

/// A product sold at the bar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub package: Option<Package>,
    #[serde(default, deserialize_with = "default_on_null")]
    pub prices: Vec<Price>,
}

impl Product {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            package: None,
            prices: Vec::new(),
        }
    }

    pub fn with_price(mut self, person_group_id: i64, amount: Money) -> Self {
        self.prices.push(Price {
            person_group_id,
            amount,
        });
        self
    }

    pub fn with_package(mut self, name: impl Into<String>, ask: bool) -> Self {
        self.package = Some(Package {
            name: name.into(),
            ask,
        });
        self
    }

    /// Unit name of the package, if any
    pub fn unit(&self) -> Option<&str> {
        self.package.as_ref().map(|p| p.name.as_str())
    }

    pub fn asks_amount(&self) -> bool {
        self.package.as_ref().is_some_and(|p| p.ask)
    }

    pub fn price_for_group(&self, person_group_id: i64) -> Option<Money> {
        self.prices
            .iter()
            .find(|p| p.person_group_id == person_group_id)
            .map(|p| p.amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_with_package_and_prices() {
        let json = r#"{
            "id": 12,
            "name": "Club-Mate",
            "package": {"name": "bottle", "ask": false},
            "prices": [
                {"person_group_id": 1, "amount": 150},
                {"person_group_id": 2, "amount": 200}
            ]
        }"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product.unit(), Some("bottle"));
        assert!(!product.asks_amount());
        assert_eq!(product.price_for_group(2), Some(Money::from_cents(200)));
        assert_eq!(product.price_for_group(3), None);
    }

    #[test]
    fn test_deserialize_without_package() {
        let json = r#"{"id": 3, "name": "Chips", "package": null, "prices": null}"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert!(product.package.is_none());
        assert!(product.prices.is_empty());
        assert!(!product.asks_amount());
    }
}
