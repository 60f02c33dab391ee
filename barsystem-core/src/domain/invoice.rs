//! Invoice domain model
//!
//! An invoice is what the service records when a cart or a deposit is
//! settled against a person's balance.

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};

use super::money::Money;

/// A product line sent with `invoice/create`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductOrder {
    pub id: i64,
    pub amount: u32,
}

/// A free-form line sent with `invoice/create`
///
/// `price` is the unit price and `amount` the number of units. A deposit is
/// a single line with a negative price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomCharge {
    pub description: String,
    pub price: Money,
    pub amount: u32,
}

impl CustomCharge {
    pub fn deposit(amount: Money) -> Self {
        Self {
            description: "Deposit".to_string(),
            price: -amount,
            amount: 1,
        }
    }
}

/// Line of a settled invoice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRow {
    pub description: String,
    pub price: Money,
    pub amount: u32,
}

impl InvoiceRow {
    pub fn total(&self) -> Money {
        self.price.times(self.amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    #[serde(default)]
    pub id: Option<i64>,
    pub total: Money,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// Balance of the person after settlement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonBalance {
    #[serde(default)]
    pub id: Option<i64>,
    pub balance: Money,
}

/// Result of `invoice/create`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceResult {
    pub invoice: Invoice,
    pub person: PersonBalance,
    #[serde(default)]
    pub rows: Vec<InvoiceRow>,
}

/// A past invoice, as listed by `invoice/list/last`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceSummary {
    /// Unix timestamp in seconds
    pub timestamp: i64,
    pub total: Money,
    #[serde(default)]
    pub rows: Vec<InvoiceRow>,
}

impl InvoiceSummary {
    pub fn local_time(&self) -> Option<DateTime<Local>> {
        Local.timestamp_opt(self.timestamp, 0).single()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deposit_charge_is_negative_single_unit() {
        let charge = CustomCharge::deposit(Money::from_cents(1000));
        assert_eq!(charge.description, "Deposit");
        assert_eq!(charge.price, Money::from_cents(-1000));
        assert_eq!(charge.amount, 1);

        let json = serde_json::to_value(&charge).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"description": "Deposit", "price": -1000, "amount": 1})
        );
    }

    #[test]
    fn test_deserialize_invoice_result() {
        let json = r#"{
            "invoice": {"id": 99, "total": 350, "timestamp": 1700000000, "person_id": 4},
            "person": {"id": 4, "nick_name": "ares", "balance": 650},
            "rows": [
                {"description": "Club-Mate", "price": 150, "amount": 2},
                {"description": "Chips", "price": 50, "amount": 1}
            ]
        }"#;
        let result: InvoiceResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.invoice.total, Money::from_cents(350));
        assert_eq!(result.person.balance, Money::from_cents(650));
        assert_eq!(result.rows[0].total(), Money::from_cents(300));
    }
}
