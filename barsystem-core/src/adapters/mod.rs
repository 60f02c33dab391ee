//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - JSON-RPC over HTTP for the BarBackend port (the real service)
//! - In-memory BarBackend for demo mode and tests
//! - ESC/POS serial printer for the ReceiptPrinter port

pub mod escpos;
pub mod memory;
pub mod rpc;

#[cfg(test)]
pub mod rpc_mock;
