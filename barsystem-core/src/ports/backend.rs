//! Bar backend port
//!
//! Defines the interface of the remote account-and-inventory service. The
//! register talks to the service only through this trait, so the JSON-RPC
//! client and the in-memory demo backend are interchangeable.

use crate::domain::result::Result;
use crate::domain::{
    CustomCharge, InvoiceResult, InvoiceSummary, Person, PersonGroup, Product, ProductOrder,
};

pub trait BarBackend: Send + Sync {
    /// Whether the service answers; never fails
    fn ping(&self) -> bool;

    /// Find a person by nickname (or any identifier the service accepts)
    fn find_person(&self, query: &str) -> Result<Option<Person>>;

    /// All persons, for name completion
    fn list_persons(&self) -> Result<Vec<Person>>;

    /// Create an account for a new member
    fn register_person(&self, nickname: &str) -> Result<()>;

    /// Products whose identifier (barcode) matches exactly
    fn find_products_by_identifier(&self, identifier: &str) -> Result<Vec<Product>>;

    /// Products whose name matches the query
    fn find_products_by_name(&self, name: &str) -> Result<Vec<Product>>;

    /// All products, for name completion
    fn list_products(&self) -> Result<Vec<Product>>;

    fn list_groups(&self) -> Result<Vec<PersonGroup>>;

    /// Settle products and custom charges against a person's balance
    fn create_invoice(
        &self,
        person_id: i64,
        products: &[ProductOrder],
        other: &[CustomCharge],
    ) -> Result<InvoiceResult>;

    /// Most recent invoices of a person, newest first
    fn last_invoices_of_person(&self, person_id: i64, count: usize)
        -> Result<Vec<InvoiceSummary>>;

    /// How often the session was interrupted and renewed so far
    fn session_renewals(&self) -> u64 {
        0
    }
}
