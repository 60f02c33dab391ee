//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

pub mod command;
pub mod logging;
pub mod register;

pub use command::{parse_amount, Command, CommandError, COMMAND_HELP};
pub use logging::{EntryPoint, LogEntry, LogEvent, LoggingService};
pub use register::{AmountChange, CartLine, Lookup, Register};
