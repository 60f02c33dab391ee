//! Output formatting utilities

use colored::{ColoredString, Colorize};
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};
use dialoguer::console::Term;

use barsystem_core::Money;

/// Disable colors when stdout is not a terminal
pub fn init() {
    if atty::isnt(atty::Stream::Stdout) {
        colored::control::set_override(false);
    }
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{}", msg.green());
}

/// Print an error message
pub fn error(msg: &str) {
    println!("{}", msg.red());
}

/// Print a warning message
pub fn warning(msg: &str) {
    println!("{}", msg.yellow());
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{}", msg.cyan());
}

pub fn clear_screen() {
    let _ = Term::stdout().clear_screen();
}

fn terminal_width() -> usize {
    let (_, columns) = Term::stdout().size();
    usize::from(columns).max(1)
}

/// Pad to the full terminal width so the background color fills the line
fn bar(msg: &str) -> String {
    format!("{:<width$}", msg, width = terminal_width())
}

fn print_bar(line: ColoredString) {
    println!("{}", line.bold());
}

pub fn header_error(msg: &str) {
    print_bar(bar(msg).as_str().white().on_red());
}

pub fn header_warning(msg: &str) {
    print_bar(bar(msg).as_str().black().on_bright_yellow());
}

pub fn header_confirm(msg: &str) {
    print_bar(bar(msg).as_str().white().on_green());
}

pub fn header_info(msg: &str) {
    print_bar(bar(msg).as_str().white().on_blue());
}

/// Black on yellow block, sized to its text
pub fn banner(msg: &str) {
    println!("{}", msg.black().on_bright_yellow());
}

/// `€ 12.50`
pub fn money(amount: Money) -> String {
    format!("€ {}", amount)
}

/// Create a styled table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_column() {
        assert_eq!(money(Money::from_cents(1250)), "€ 12.50");
        assert_eq!(money(Money::from_cents(-5)), "€ -0.05");
    }

    #[test]
    fn test_bar_fills_width() {
        let line = bar("CART");
        assert!(line.starts_with("CART"));
        assert_eq!(line.chars().count(), terminal_width().max(4));
    }
}
