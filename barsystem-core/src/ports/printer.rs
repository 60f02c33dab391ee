//! Receipt printer port

use crate::domain::result::Result;
use crate::domain::Receipt;

/// A device that can print the receipt of the last settlement
pub trait ReceiptPrinter {
    /// Print `receipt` under the shop `title`
    fn print_receipt(&mut self, receipt: &Receipt, title: &str) -> Result<()>;
}
