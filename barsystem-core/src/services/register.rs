//! Register service - the cart and everything settled against it
//!
//! Decides what an operator's input means (a person, a product or several
//! products), keeps the running cart and settles it against a person's
//! balance through the backend.

use std::sync::Arc;

use chrono::Local;

use crate::domain::result::{Error, Result};
use crate::domain::{
    Cart, CustomCharge, InvoiceSummary, Money, Person, PersonGroup, Product, QuantityChange,
    Receipt, SettlementKind,
};
use crate::ports::{BarBackend, ReceiptPrinter};

/// Number of past invoices shown with an account
pub const DEFAULT_HISTORY_LENGTH: usize = 5;

/// What a lookup resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// A person, looked up with an empty cart
    Account {
        person: Person,
        recent: Vec<InvoiceSummary>,
    },
    /// A person, looked up with products in the cart: the cart was settled
    Checkout(Receipt),
    /// One product matched and was added to the cart
    Added {
        product: Product,
        quantity: u32,
        /// The product's package asks for an amount right away
        ask_amount: bool,
    },
    /// Several products matched; the operator picks one with `pick`
    Ambiguous(Vec<Product>),
    Unknown,
}

/// Result of `set_amount`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmountChange {
    pub product: Product,
    pub quantity: u32,
    pub change: QuantityChange,
}

/// A cart entry priced for every person group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub quantity: u32,
    pub unit: Option<String>,
    pub name: String,
    /// Line price per group, in the order of `Register::groups`
    pub prices: Vec<Option<Money>>,
}

pub struct Register {
    backend: Arc<dyn BarBackend>,
    cart: Cart,
    last_product: Option<Product>,
    groups: Option<Vec<PersonGroup>>,
    last_receipt: Option<Receipt>,
    history_length: usize,
}

impl Register {
    pub fn new(backend: Arc<dyn BarBackend>) -> Self {
        Self {
            backend,
            cart: Cart::new(),
            last_product: None,
            groups: None,
            last_receipt: None,
            history_length: DEFAULT_HISTORY_LENGTH,
        }
    }

    pub fn with_history_length(mut self, history_length: usize) -> Self {
        self.history_length = history_length;
        self
    }

    pub fn backend(&self) -> &Arc<dyn BarBackend> {
        &self.backend
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn last_product(&self) -> Option<&Product> {
        self.last_product.as_ref()
    }

    pub fn last_receipt(&self) -> Option<&Receipt> {
        self.last_receipt.as_ref()
    }

    /// Resolve operator input
    ///
    /// Persons take precedence over products. Product matches by
    /// identifier come first, followed by name matches not already found.
    pub fn lookup(&mut self, input: &str) -> Result<Lookup> {
        let query = input.trim();
        if query.is_empty() {
            return Ok(Lookup::Unknown);
        }

        if let Some(person) = self.backend.find_person(query)? {
            if self.cart.is_empty() {
                let recent = self
                    .backend
                    .last_invoices_of_person(person.id, self.history_length)?;
                return Ok(Lookup::Account { person, recent });
            }
            return self.checkout(&person).map(Lookup::Checkout);
        }

        let mut products = self.backend.find_products_by_identifier(query)?;
        for product in self.backend.find_products_by_name(query)? {
            if !products.iter().any(|p| p.id == product.id) {
                products.push(product);
            }
        }

        if products.len() > 1 {
            return Ok(Lookup::Ambiguous(products));
        }
        Ok(match products.pop() {
            Some(product) => self.pick(product),
            None => Lookup::Unknown,
        })
    }

    /// Add one unit of a product and make it the target of `set_amount`
    pub fn pick(&mut self, product: Product) -> Lookup {
        let quantity = self.cart.add(&product);
        let ask_amount = product.asks_amount();
        self.last_product = Some(product.clone());
        Lookup::Added {
            product,
            quantity,
            ask_amount,
        }
    }

    /// Set the quantity of the last product added; 0 removes it
    pub fn set_amount(&mut self, quantity: u32) -> Result<AmountChange> {
        let product = self
            .last_product
            .clone()
            .ok_or_else(|| Error::validation("Add a product to the cart first!"))?;

        let change = self.cart.set_quantity(&product, quantity);
        Ok(AmountChange {
            product,
            quantity,
            change,
        })
    }

    pub fn remove(&mut self) -> Result<AmountChange> {
        self.set_amount(0)
    }

    /// Empty the cart
    ///
    /// The last product stays the target of `set_amount`.
    pub fn abort(&mut self) {
        self.cart.clear();
    }

    /// Settle the cart against a person's balance
    ///
    /// The cart is only emptied once the service accepted the invoice.
    pub fn checkout(&mut self, person: &Person) -> Result<Receipt> {
        if self.cart.is_empty() {
            return Err(Error::validation("The cart is empty"));
        }

        let result = self
            .backend
            .create_invoice(person.id, &self.cart.product_orders(), &[])?;
        let receipt =
            Receipt::from_settlement(SettlementKind::Purchase, person, &result, Local::now());

        self.cart.clear();
        self.last_receipt = Some(receipt.clone());
        Ok(receipt)
    }

    /// Credit a person's balance; the cart is left untouched
    pub fn deposit(&mut self, amount: Money, nickname: &str) -> Result<Receipt> {
        if amount.cents() <= 0 {
            return Err(Error::validation("A deposit must be a positive amount"));
        }

        let person = self
            .backend
            .find_person(nickname)?
            .ok_or_else(|| Error::not_found(nickname.to_string()))?;

        let result = self
            .backend
            .create_invoice(person.id, &[], &[CustomCharge::deposit(amount)])?;
        let receipt =
            Receipt::from_settlement(SettlementKind::Deposit, &person, &result, Local::now());

        self.last_receipt = Some(receipt.clone());
        Ok(receipt)
    }

    pub fn register_person(&mut self, nickname: &str) -> Result<()> {
        let nickname = nickname.trim();
        if nickname.is_empty() || nickname.contains(char::is_whitespace) {
            return Err(Error::validation("A nickname is a single word"));
        }
        self.backend.register_person(nickname)
    }

    /// Person groups, fetched once
    pub fn groups(&mut self) -> Result<&[PersonGroup]> {
        if self.groups.is_none() {
            self.groups = Some(self.backend.list_groups()?);
        }
        Ok(self.groups.as_deref().unwrap_or_default())
    }

    /// Cart entries in product id order, priced for every group
    pub fn cart_lines(&mut self) -> Result<Vec<CartLine>> {
        let group_ids: Vec<i64> = self.groups()?.iter().map(|g| g.id).collect();

        Ok(self
            .cart
            .entries()
            .map(|entry| CartLine {
                quantity: entry.quantity,
                unit: entry.product.unit().map(str::to_string),
                name: entry.product.name.clone(),
                prices: group_ids
                    .iter()
                    .map(|id| entry.price_for_group(*id))
                    .collect(),
            })
            .collect())
    }

    /// Lower-cased product names and nicknames for tab completion
    pub fn completion_words(&self) -> Result<Vec<String>> {
        let mut words: Vec<String> = self
            .backend
            .list_products()?
            .into_iter()
            .map(|p| p.name.to_lowercase())
            .chain(
                self.backend
                    .list_persons()?
                    .into_iter()
                    .map(|p| p.nickname.to_lowercase()),
            )
            .collect();
        words.sort();
        words.dedup();
        Ok(words)
    }

    /// Print the receipt of the last settlement
    pub fn print_receipt(&self, printer: &mut dyn ReceiptPrinter, title: &str) -> Result<()> {
        let receipt = self
            .last_receipt
            .as_ref()
            .ok_or_else(|| Error::not_found("No transaction available"))?;
        printer.print_receipt(receipt, title)
    }
}
