//! Barsystem Core - point-of-sale logic for a members' bar
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (Money, Person, Product, Cart, Receipt)
//! - **ports**: Trait definitions for external dependencies (BarBackend, ReceiptPrinter)
//! - **services**: Business logic orchestration (Register, command parsing, event log)
//! - **adapters**: Concrete implementations (JSON-RPC client, in-memory backend, ESC/POS)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod services;

// Re-export commonly used types at crate root
pub use adapters::escpos::EscPosPrinter;
pub use adapters::memory::MemoryBackend;
pub use adapters::rpc::RpcClient;
pub use config::Config;
pub use domain::result::{Error, Result};
pub use domain::{Cart, Money, Person, Product, Receipt};
pub use ports::{BarBackend, ReceiptPrinter};
pub use services::{Command, Lookup, Register};
