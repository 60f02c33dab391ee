//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The core domain
//! depends only on these traits, not on concrete implementations.

mod backend;
mod printer;

pub use backend::BarBackend;
pub use printer::ReceiptPrinter;
