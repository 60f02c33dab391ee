//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod cart;
mod invoice;
mod money;
mod nullable;
mod person;
mod product;
mod receipt;
pub mod result;

pub use cart::{Cart, CartEntry, QuantityChange};
pub use invoice::{
    CustomCharge, Invoice, InvoiceResult, InvoiceRow, InvoiceSummary, PersonBalance, ProductOrder,
};
pub use money::Money;
pub use person::{Person, PersonGroup};
pub use product::{Package, Price, Product};
pub use receipt::{Receipt, ReceiptLine, SettlementKind};
