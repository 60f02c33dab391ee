//! Interactive register shell
//!
//! Reads one line at a time, parses it into a command and renders what the
//! register did. Every backend failure is reported and the loop goes on;
//! only end of input leaves the shell.

use std::io::{BufRead, Write};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use colored::Colorize;
use dialoguer::{BasicHistory, Completion, Input};
use indicatif::{ProgressBar, ProgressStyle};

use crate::commands::{get_logger, log_command, log_error, log_event, Connection};
use crate::output;
use barsystem_core::adapters::escpos::Bitmap;
use barsystem_core::domain::{InvoiceSummary, Person, Product, QuantityChange, SettlementKind};
use barsystem_core::services::{
    parse_amount, AmountChange, Command, CommandError, EntryPoint, LoggingService,
    Lookup, Register, COMMAND_HELP,
};
use barsystem_core::{BarBackend, Config, Error, EscPosPrinter, Receipt, ReceiptPrinter};

const PROMPT_EMPTY_CART: &str = "Command, user (query info) or product (add to cart)? >";
const PROMPT_FILLED_CART: &str = "Command, user (buy products) or product (add to cart)? >";

/// Tab completion over product names and nicknames
struct WordCompletion<'a> {
    words: &'a [String],
}

impl Completion for WordCompletion<'_> {
    fn get(&self, input: &str) -> Option<String> {
        let needle = input.trim_start().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.words
            .iter()
            .find(|word| word.starts_with(&needle) && word.len() > needle.len())
            .cloned()
    }
}

pub struct Shell {
    config: Config,
    register: Register,
    printer: Option<Box<dyn ReceiptPrinter>>,
    words: Vec<String>,
    history: BasicHistory,
    logger: Option<LoggingService>,
    interactive: bool,
    renewals_seen: u64,
}

/// Start the shell: connect, log in, open the printer and run until end of
/// input
pub fn run(config: Config) -> Result<()> {
    let logger = get_logger(EntryPoint::Shell);

    output::clear_screen();
    let connection = Connection::open(&config)?;
    output::warning(&format!("Connecting to server ({})...", connection.describe()));

    let backend = connection.backend();
    wait_for_connection(backend.as_ref(), config.reconnect_seconds, &logger);

    if let Err(e) = connection.login(&config) {
        output::header_error("Fatal error");
        println!("{:#}", e);
        log_error(&logger, "login_failed", &format!("{:#}", e), None);
        return Err(e);
    }

    output::warning("Connecting to printer...");
    let printer = open_printer(&config);

    output::warning("Welcome!");
    let register = Register::new(backend).with_history_length(config.history_length);

    println!("Please wait, querying list of products and persons...");
    let words = match register.completion_words() {
        Ok(words) => words,
        Err(e) => {
            output::warning(&format!("Name completion unavailable: {}", e));
            Vec::new()
        }
    };

    log_event(&logger, "shell_started");

    let mut shell = Shell {
        config,
        register,
        printer,
        words,
        history: BasicHistory::new().max_entries(100).no_duplicates(true),
        logger,
        interactive: atty::is(atty::Stream::Stdin),
        renewals_seen: 0,
    };
    shell.show_status();
    shell.run_loop();
    Ok(())
}

/// Block until the backend answers a ping
fn wait_for_connection(backend: &dyn BarBackend, seconds: u64, logger: &Option<LoggingService>) {
    if backend.ping() {
        return;
    }
    log_event(logger, "connection_lost");

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.yellow} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(format!(
        "Server unavailable. Reconnecting in {} seconds...",
        seconds
    ));
    spinner.enable_steady_tick(Duration::from_millis(120));

    while !backend.ping() {
        thread::sleep(Duration::from_secs(seconds));
    }

    spinner.finish_and_clear();
    log_event(logger, "connection_restored");
}

fn open_printer(config: &Config) -> Option<Box<dyn ReceiptPrinter>> {
    let device = match &config.printer_device {
        Some(device) => device,
        None => {
            output::info("No printer configured.");
            return None;
        }
    };

    let printer = match EscPosPrinter::open(device, config.printer_kodak) {
        Ok(printer) => printer,
        Err(_) => {
            output::warning("Printer not available!");
            return None;
        }
    };

    let printer = match &config.printer_logo {
        Some(path) => match Bitmap::load(path) {
            Ok(logo) => printer.with_logo(logo),
            Err(e) => {
                output::warning(&e.to_string());
                printer
            }
        },
        None => printer,
    };
    Some(Box::new(printer))
}

/// Renewals since the last check; advances `seen`
fn unseen(seen: &mut u64, current: u64) -> u64 {
    let renewed = current.saturating_sub(*seen);
    *seen = (*seen).max(current);
    renewed
}

/// Message for an error the operator can act on
fn describe(error: &Error) -> String {
    match error {
        Error::Validation(message) => message.clone(),
        Error::Printer(_) => error.to_string(),
        _ => format!("Server error: {}", error),
    }
}

impl Shell {
    fn run_loop(&mut self) {
        loop {
            let prompt = if self.register.cart().is_empty() {
                PROMPT_EMPTY_CART
            } else {
                PROMPT_FILLED_CART
            };
            println!();

            let line = match self.read_line(prompt, true) {
                Some(line) => line,
                None => break,
            };
            self.execute(&line);
            self.report_renewals();
        }
        log_event(&self.logger, "shell_exited");
    }

    /// One line of operator input; `None` at end of input
    fn read_line(&mut self, prompt: &str, complete: bool) -> Option<String> {
        if !self.interactive {
            print!("{} ", prompt.cyan());
            let _ = std::io::stdout().flush();
            let mut line = String::new();
            return match std::io::stdin().lock().read_line(&mut line) {
                Ok(0) | Err(_) => None,
                Ok(_) => {
                    println!();
                    Some(line.trim_end_matches(['\r', '\n']).to_string())
                }
            };
        }

        let completion = WordCompletion { words: &self.words };
        let mut input = Input::<String>::new()
            .with_prompt(prompt.cyan().to_string())
            .allow_empty(true);
        if complete {
            input = input
                .completion_with(&completion)
                .history_with(&mut self.history);
        }

        match input.interact_text() {
            // Ctrl-D arrives as a character in raw mode
            Ok(line) if line.contains('\u{4}') => None,
            Ok(line) => Some(line),
            Err(_) => None,
        }
    }

    fn execute(&mut self, line: &str) {
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(e @ CommandError::Usage(_)) => {
                output::warning(&e.to_string());
                return;
            }
            Err(e) => {
                output::error(&e.to_string());
                return;
            }
        };

        if command != Command::Refresh {
            log_command(&self.logger, command.name());
        }

        match command {
            Command::Refresh => {
                self.wait_for_connection();
                self.show_status();
            }
            Command::Clear => self.show_status(),
            Command::Register(nickname) => self.register_person(&nickname),
            Command::Deposit { amount, nickname } => self.deposit(amount, &nickname),
            Command::Amount(Some(quantity)) => self.apply_amount(quantity),
            Command::Amount(None) => self.ask_amount(),
            Command::Remove => {
                let change = self.register.remove();
                self.show_change(change);
            }
            Command::Abort => {
                self.register.abort();
                self.show_status();
                output::error("Transaction canceled!");
            }
            Command::Print => self.print_receipt(),
            Command::Cyber => {
                println!();
                output::banner("               ");
                output::banner("     CYBER     ");
                output::banner("               ");
            }
            Command::Help => self.show_help(),
            Command::Lookup(query) => self.lookup(&query),
        }
    }

    fn wait_for_connection(&self) {
        wait_for_connection(
            self.register.backend().as_ref(),
            self.config.reconnect_seconds,
            &self.logger,
        );
    }

    /// Tell the operator about sessions the client had to renew
    fn report_renewals(&mut self) {
        let current = self.register.backend().session_renewals();
        let renewed = unseen(&mut self.renewals_seen, current);
        if renewed == 0 {
            return;
        }
        output::warning("Session interrupted. Connected again.");
        for _ in 0..renewed {
            log_event(&self.logger, "session_renewed");
        }
    }

    fn log_failure(&self, event: &str, error: &Error) {
        let details = error.rpc_code().map(|code| format!("rpc code {}", code));
        log_error(&self.logger, event, &error.to_string(), details.as_deref());
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    fn lookup(&mut self, query: &str) {
        self.wait_for_connection();

        let result = match self.register.lookup(query) {
            Ok(result) => result,
            Err(e) => {
                self.log_failure("lookup_failed", &e);
                output::error(&describe(&e));
                return;
            }
        };

        match result {
            Lookup::Account { person, recent } => self.show_account(&person, &recent),
            Lookup::Checkout(receipt) => {
                log_event(&self.logger, "checkout_completed");
                self.show_status();
                output::success("Transaction completed!");
                self.show_transaction(&receipt);
            }
            Lookup::Added {
                product,
                ask_amount,
                ..
            } => self.product_added(&product, ask_amount),
            Lookup::Ambiguous(products) => self.choose_product(products),
            Lookup::Unknown => output::error("Error: unknown command, user or product."),
        }
    }

    fn product_added(&mut self, product: &Product, ask_amount: bool) {
        self.show_status();
        if ask_amount {
            self.ask_amount_of(product);
        }
    }

    fn choose_product(&mut self, products: Vec<Product>) {
        println!();
        println!("{}", "=== MULTIPLE RESULTS ===".yellow());
        println!();
        for (index, product) in products.iter().enumerate() {
            println!("{}. {:<25}", index + 1, product.name);
        }
        println!();

        let choice = self
            .read_line("Pick one (or abort):", false)
            .and_then(|line| line.trim().parse::<usize>().ok())
            .and_then(|n| n.checked_sub(1))
            .and_then(|index| products.get(index).cloned());

        match choice {
            Some(product) => {
                if let Lookup::Added {
                    product,
                    ask_amount,
                    ..
                } = self.register.pick(product)
                {
                    self.product_added(&product, ask_amount);
                }
            }
            None => println!("{}", "Canceled".red()),
        }
    }

    // =========================================================================
    // Cart changes
    // =========================================================================

    fn ask_amount(&mut self) {
        match self.register.last_product().cloned() {
            Some(product) => self.ask_amount_of(&product),
            None => output::error("Add a product to the cart first!"),
        }
    }

    fn ask_amount_of(&mut self, product: &Product) {
        let prompt = match product.unit() {
            Some(unit) => format!("Amount of {} [unit: {}] >", product.name, unit),
            None => format!("Amount of {} >", product.name),
        };
        let Some(line) = self.read_line(&prompt, false) else {
            return;
        };
        match parse_amount(&line) {
            Ok(quantity) => self.apply_amount(quantity),
            Err(e) => output::error(&e.to_string()),
        }
    }

    fn apply_amount(&mut self, quantity: u32) {
        let change = self.register.set_amount(quantity);
        self.show_change(change);
    }

    fn show_change(&mut self, change: barsystem_core::Result<AmountChange>) {
        let AmountChange {
            product,
            quantity,
            change,
        } = match change {
            Ok(change) => change,
            Err(e) => {
                output::error(&describe(&e));
                return;
            }
        };

        self.show_status();
        match change {
            QuantityChange::Removed => {
                output::warning(&format!("Removed {} from the cart", product.name))
            }
            QuantityChange::Updated => {
                let unit = product.unit().map(|u| format!(" {}", u)).unwrap_or_default();
                println!(
                    "(Changed amount of {} to {}{})",
                    product.name, quantity, unit
                );
            }
            QuantityChange::Inserted => {
                output::success(&format!("Added {} to the cart", product.name))
            }
            QuantityChange::Unchanged => {}
        }
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    fn register_person(&mut self, nickname: &str) {
        self.wait_for_connection();
        match self.register.register_person(nickname) {
            Ok(()) => {
                log_event(&self.logger, "person_registered");
                let word = nickname.to_lowercase();
                if let Err(index) = self.words.binary_search(&word) {
                    self.words.insert(index, word);
                }
                output::success("Registered!");
            }
            Err(e) => {
                self.log_failure("register_failed", &e);
                output::error(&describe(&e));
            }
        }
    }

    fn deposit(&mut self, amount: barsystem_core::Money, nickname: &str) {
        self.wait_for_connection();
        match self.register.deposit(amount, nickname) {
            Ok(receipt) => {
                log_event(&self.logger, "deposit_completed");
                self.show_status();
                self.show_transaction(&receipt);
                output::success("Deposit completed!");
                if !self.register.cart().is_empty() {
                    println!("Warning: there are still products in the cart. Either enter your name to buy the products or enter \"abort\" to cancel the pending transaction.");
                }
            }
            Err(Error::NotFound(_)) => output::error(
                "Error: could not find your account, have you spelled your nickname correctly?",
            ),
            Err(e) => {
                self.log_failure("deposit_failed", &e);
                output::error(&describe(&e));
            }
        }
    }

    fn print_receipt(&mut self) {
        let Some(printer) = self.printer.as_mut() else {
            output::error("No printer available.");
            return;
        };
        if self.register.last_receipt().is_none() {
            output::error("No transaction available.");
            return;
        }

        match self
            .register
            .print_receipt(printer.as_mut(), &self.config.title)
        {
            Ok(()) => {
                log_event(&self.logger, "receipt_printed");
                output::success("Receipt sent to the printer!");
            }
            Err(e) => {
                self.log_failure("print_failed", &e);
                output::error(&describe(&e));
            }
        }
    }

    // =========================================================================
    // Screens
    // =========================================================================

    fn show_status(&mut self) {
        output::clear_screen();
        println!();
        if self.register.cart().is_empty() {
            output::header_confirm("");
            output::header_confirm("  The cart is empty. Scan a product to add it to the cart!");
            output::header_confirm("");
            println!();
            println!("Enter your name to display information about your account.");
            println!("Scan or enter the name of a product to add it to the cart.");
            println!("Enter 'help' for a list of commands.");
            println!();
        } else {
            output::header_warning("");
            output::header_warning(
                "  The cart contains products. Enter your name to confirm the transaction!",
            );
            output::header_warning("");
            println!();
            println!("Enter your name to buy the products in the cart.");
            println!("Scan or enter the name of a product to add it to the cart.");
            println!("Enter 'abort' to clear the cart.");
            println!("Enter 'help' for a list of commands.");
            println!();
            self.show_cart();
        }
    }

    fn show_cart(&mut self) {
        let group_names: Vec<String> = match self.register.groups() {
            Ok(groups) => groups.iter().map(|g| g.name.clone()).collect(),
            Err(e) => {
                output::error(&describe(&e));
                return;
            }
        };
        let lines = match self.register.cart_lines() {
            Ok(lines) => lines,
            Err(e) => {
                output::error(&describe(&e));
                return;
            }
        };

        output::header_info("CART");
        let mut table = output::create_table();
        let mut header = vec![
            "Amount".to_string(),
            "Unit".to_string(),
            "Product".to_string(),
        ];
        header.extend(group_names);
        table.set_header(header);

        for line in lines {
            let mut row = vec![
                line.quantity.to_string(),
                line.unit.unwrap_or_default(),
                line.name,
            ];
            row.extend(
                line.prices
                    .into_iter()
                    .map(|price| price.map(output::money).unwrap_or_default()),
            );
            table.add_row(row);
        }
        println!("{}", table);
    }

    fn show_account(&self, person: &Person, recent: &[InvoiceSummary]) {
        println!();
        println!(
            "Hello {}! Your balance is {}",
            person.display_name(),
            output::money(person.balance)
        );
        println!();

        if recent.is_empty() {
            return;
        }

        let mut table = output::create_table();
        table.set_header(vec!["Date", "Total", "Products"]);
        for invoice in recent {
            let when = invoice
                .local_time()
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default();
            let rows = invoice
                .rows
                .iter()
                .map(|row| format!("{:>4}x {}", row.amount, row.description))
                .collect::<Vec<_>>()
                .join("\n");
            table.add_row(vec![when, output::money(invoice.total), rows]);
        }
        println!("{}", table);
    }

    fn show_transaction(&self, receipt: &Receipt) {
        output::header_confirm("TRANSACTION RECEIPT");
        println!();
        for line in &receipt.lines {
            match line.quantity {
                Some(quantity) => println!(
                    "{}x {:<29}{}",
                    quantity,
                    line.description,
                    output::money(line.total)
                ),
                None => println!("{:<32}{}", line.description, output::money(line.total)),
            }
        }

        println!();
        if receipt.kind == SettlementKind::Purchase {
            println!("Transaction total:\t\t{}", output::money(receipt.total));
        }
        println!(
            "Balance before transaction:\t{}",
            output::money(receipt.balance_before)
        );
        println!(
            "Balance after transaction:\t{}",
            output::money(receipt.balance_after)
        );

        if self.printer.is_some() {
            println!();
            println!("Use 'print' to print this receipt.");
        }
        println!();
    }

    fn show_help(&self) {
        println!();
        output::banner(&format!("  ~~~  Welcome to the {}  ~~~  ", self.config.title));
        println!();

        let mut table = output::create_table();
        table.set_header(vec!["Command", "Description"]);
        for (name, description) in COMMAND_HELP {
            table.add_row(vec![*name, *description]);
        }
        println!("{}", table);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_finds_prefix() {
        let words = vec![
            "chips naturel".to_string(),
            "club-mate".to_string(),
            "zeus".to_string(),
        ];
        let completion = WordCompletion { words: &words };

        assert_eq!(completion.get("Clu"), Some("club-mate".to_string()));
        assert_eq!(completion.get("ch"), Some("chips naturel".to_string()));
        assert_eq!(completion.get("zeus"), None);
        assert_eq!(completion.get(""), None);
        assert_eq!(completion.get("x"), None);
    }

    #[test]
    fn test_renewals_are_reported_once() {
        let mut seen = 0;
        assert_eq!(unseen(&mut seen, 0), 0);
        assert_eq!(unseen(&mut seen, 2), 2);
        assert_eq!(unseen(&mut seen, 2), 0);
        assert_eq!(unseen(&mut seen, 3), 1);
        assert_eq!(seen, 3);
    }

    #[test]
    fn test_describe_errors() {
        assert_eq!(
            describe(&Error::validation("Add a product to the cart first!")),
            "Add a product to the cart first!"
        );
        assert_eq!(
            describe(&Error::rpc(-32000, "Invalid password")),
            "Server error: Invalid password"
        );
        assert_eq!(
            describe(&Error::Transport("Unable to connect".to_string())),
            "Server error: Unable to connect"
        );
    }
}
