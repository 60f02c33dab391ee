//! Shell command parsing
//!
//! The first word of a line selects a command. A line that is not a command
//! is a lookup: a person to query or charge, or a product to add.

use thiserror::Error;

use crate::domain::Money;

/// Command name and description, in help order
pub const COMMAND_HELP: &[(&str, &str)] = &[
    ("register", "Create an account"),
    ("deposit", "Add money to your account"),
    ("amount", "Set the amount for the product last added to the cart"),
    ("remove", "Remove the product last added to the cart"),
    ("clear", "Clear screen"),
    ("abort", "Abort transaction"),
    ("print", "Print receipt"),
    ("cyber", "Everyone needs a bit of cyber"),
    ("help", "You've found this one! :D"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Empty line: redraw the status screen
    Refresh,
    Register(String),
    Deposit { amount: Money, nickname: String },
    /// Set the amount of the last product; `None` asks for it
    Amount(Option<u32>),
    Remove,
    Clear,
    Abort,
    Print,
    Cyber,
    Help,
    /// Person or product query
    Lookup(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("Not a number!")]
    NotANumber,
}

const REGISTER_USAGE: &str = "register <nickname>";
const DEPOSIT_USAGE: &str = "deposit <amount in €> <nickname>";
const AMOUNT_USAGE: &str = "amount <amount>";

impl Command {
    pub fn parse(line: &str) -> Result<Command, CommandError> {
        let line = line.trim();
        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };
        let args: Vec<&str> = rest.split_whitespace().collect();

        let command = match name {
            "" => Command::Refresh,
            "register" => match args.as_slice() {
                [nickname] => Command::Register((*nickname).to_string()),
                _ => return Err(CommandError::Usage(REGISTER_USAGE)),
            },
            "deposit" => match args.as_slice() {
                [amount, nickname] => {
                    let amount = Money::parse_major(amount)
                        .ok()
                        .filter(|m| m.cents() > 0)
                        .ok_or(CommandError::Usage(DEPOSIT_USAGE))?;
                    Command::Deposit {
                        amount,
                        nickname: (*nickname).to_string(),
                    }
                }
                _ => return Err(CommandError::Usage(DEPOSIT_USAGE)),
            },
            "amount" => match args.as_slice() {
                [] => Command::Amount(None),
                [amount] => Command::Amount(Some(parse_amount(amount)?)),
                _ => return Err(CommandError::Usage(AMOUNT_USAGE)),
            },
            "remove" => no_args(&args, "remove", Command::Remove)?,
            "clear" => no_args(&args, "clear", Command::Clear)?,
            "print" => no_args(&args, "print", Command::Print)?,
            "abort" => Command::Abort,
            "cyber" => Command::Cyber,
            "help" | "?" => Command::Help,
            _ => Command::Lookup(line.to_string()),
        };

        Ok(command)
    }

    /// Short name for event logging; never includes arguments
    pub fn name(&self) -> &'static str {
        match self {
            Command::Refresh => "refresh",
            Command::Register(_) => "register",
            Command::Deposit { .. } => "deposit",
            Command::Amount(_) => "amount",
            Command::Remove => "remove",
            Command::Clear => "clear",
            Command::Abort => "abort",
            Command::Print => "print",
            Command::Cyber => "cyber",
            Command::Help => "help",
            Command::Lookup(_) => "lookup",
        }
    }
}

fn no_args(args: &[&str], usage: &'static str, command: Command) -> Result<Command, CommandError> {
    if args.is_empty() {
        Ok(command)
    } else {
        Err(CommandError::Usage(usage))
    }
}

/// Parse an operator-entered quantity
pub fn parse_amount(input: &str) -> Result<u32, CommandError> {
    input
        .trim()
        .parse::<u32>()
        .map_err(|_| CommandError::NotANumber)
}
