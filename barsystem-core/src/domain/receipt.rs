//! Receipt of the last settlement

use chrono::{DateTime, Local};
use serde::Serialize;

use super::invoice::InvoiceResult;
use super::money::Money;
use super::person::Person;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementKind {
    Purchase,
    Deposit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiptLine {
    pub description: String,
    /// Unit count; deposits are listed without one
    pub quantity: Option<u32>,
    pub total: Money,
}

/// Printable snapshot of a settled invoice
///
/// Deposits are stored as negative charges by the service; their lines and
/// total are sign-inverted here so the deposited amount reads positive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub kind: SettlementKind,
    pub customer: String,
    pub issued_at: DateTime<Local>,
    pub lines: Vec<ReceiptLine>,
    pub total: Money,
    pub balance_before: Money,
    pub balance_after: Money,
}

impl Receipt {
    /// Build a receipt from the person as looked up before settlement and
    /// the service's invoice result
    pub fn from_settlement(
        kind: SettlementKind,
        person: &Person,
        result: &InvoiceResult,
        issued_at: DateTime<Local>,
    ) -> Self {
        let sign = |m: Money| match kind {
            SettlementKind::Purchase => m,
            SettlementKind::Deposit => -m,
        };

        let lines = result
            .rows
            .iter()
            .map(|row| ReceiptLine {
                description: row.description.clone(),
                quantity: match kind {
                    SettlementKind::Purchase => Some(row.amount),
                    SettlementKind::Deposit => None,
                },
                total: sign(row.total()),
            })
            .collect();

        Self {
            kind,
            customer: person.display_name(),
            issued_at,
            lines,
            total: sign(result.invoice.total),
            balance_before: person.balance,
            balance_after: result.person.balance,
        }
    }

    /// Labelled totals in print order
    pub fn totals(&self) -> [(&'static str, Money); 3] {
        [
            ("Total", self.total),
            ("Balance before transaction", self.balance_before),
            ("Balance after transaction", self.balance_after),
        ]
    }
}
