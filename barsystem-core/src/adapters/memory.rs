//! In-memory bar backend
//!
//! Keeps persons, products and invoices in process memory. Backs demo mode
//! (`MemoryBackend::demo()`) and the register tests. Clones share state, so
//! a test can keep a handle to inspect balances after the register settled
//! a cart.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use crate::domain::result::{Error, Result};
use crate::domain::{
    CustomCharge, Invoice, InvoiceResult, InvoiceRow, InvoiceSummary, Money, Person,
    PersonBalance, PersonGroup, Product, ProductOrder,
};
use crate::ports::BarBackend;

#[derive(Debug)]
struct MemoryState {
    online: bool,
    groups: Vec<PersonGroup>,
    persons: Vec<Person>,
    /// person id -> person group id
    memberships: HashMap<i64, i64>,
    products: Vec<Product>,
    /// barcode -> product id
    identifiers: HashMap<String, i64>,
    /// (person id, invoice), oldest first
    invoices: Vec<(i64, InvoiceSummary)>,
    next_person_id: i64,
    next_invoice_id: i64,
}

impl Default for MemoryState {
    fn default() -> Self {
        Self {
            online: true,
            groups: Vec::new(),
            persons: Vec::new(),
            memberships: HashMap::new(),
            products: Vec::new(),
            identifiers: HashMap::new(),
            invoices: Vec::new(),
            next_person_id: 1,
            next_invoice_id: 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend seeded with a small bar: two groups, three members and a
    /// handful of products
    pub fn demo() -> Self {
        let members = 1;
        let guests = 2;

        let mut zeus = Person::new(1, "zeus");
        zeus.first_name = "Zeus".to_string();
        zeus.last_name = "Olympios".to_string();
        zeus.balance = Money::from_cents(1250);

        let mut hera = Person::new(2, "hera");
        hera.first_name = "Hera".to_string();
        hera.balance = Money::from_cents(300);

        let mut hermes = Person::new(3, "hermes");
        hermes.balance = Money::from_cents(-120);

        Self::new()
            .with_group(members, "Members")
            .with_group(guests, "Guests")
            .with_person(zeus, members)
            .with_person(hera, members)
            .with_person(hermes, guests)
            .with_product(
                Product::new(1, "Club-Mate")
                    .with_price(members, Money::from_cents(150))
                    .with_price(guests, Money::from_cents(200)),
                &["4029764001807"],
            )
            .with_product(
                Product::new(2, "Cola")
                    .with_price(members, Money::from_cents(100))
                    .with_price(guests, Money::from_cents(150)),
                &["5449000000996"],
            )
            .with_product(
                Product::new(3, "Chips paprika")
                    .with_price(members, Money::from_cents(80))
                    .with_price(guests, Money::from_cents(100)),
                &["8710398500120"],
            )
            .with_product(
                Product::new(4, "Chips naturel")
                    .with_price(members, Money::from_cents(80))
                    .with_price(guests, Money::from_cents(100)),
                &["8710398500113"],
            )
            .with_product(
                Product::new(5, "Candy")
                    .with_package("gram", true)
                    .with_price(members, Money::from_cents(2))
                    .with_price(guests, Money::from_cents(3)),
                &[],
            )
            .with_product(
                Product::new(6, "Coffee")
                    .with_package("cup", false)
                    .with_price(members, Money::from_cents(50))
                    .with_price(guests, Money::from_cents(80)),
                &[],
            )
    }

    pub fn with_group(self, id: i64, name: &str) -> Self {
        if let Ok(mut state) = self.lock() {
            state.groups.push(PersonGroup {
                id,
                name: name.to_string(),
            });
        }
        self
    }

    pub fn with_person(self, person: Person, group_id: i64) -> Self {
        if let Ok(mut state) = self.lock() {
            state.next_person_id = state.next_person_id.max(person.id + 1);
            state.memberships.insert(person.id, group_id);
            state.persons.push(person);
        }
        self
    }

    pub fn with_product(self, product: Product, identifiers: &[&str]) -> Self {
        if let Ok(mut state) = self.lock() {
            for identifier in identifiers {
                state.identifiers.insert(identifier.to_string(), product.id);
            }
            state.products.push(product);
        }
        self
    }

    /// Simulate the service going away or coming back
    pub fn set_online(&self, online: bool) {
        if let Ok(mut state) = self.lock() {
            state.online = online;
        }
    }

    /// Current state of a person
    pub fn person(&self, id: i64) -> Option<Person> {
        self.lock()
            .ok()?
            .persons
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    /// Number of invoices recorded for a person
    pub fn invoice_count(&self, person_id: i64) -> usize {
        self.lock()
            .map(|s| s.invoices.iter().filter(|(id, _)| *id == person_id).count())
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|e| Error::Other(format!("Lock poisoned: {}", e)))
    }

    fn lock_online(&self) -> Result<MutexGuard<'_, MemoryState>> {
        let state = self.lock()?;
        if !state.online {
            return Err(Error::Transport("Service unavailable".to_string()));
        }
        Ok(state)
    }
}

impl BarBackend for MemoryBackend {
    fn ping(&self) -> bool {
        self.lock().map(|s| s.online).unwrap_or(false)
    }

    fn find_person(&self, query: &str) -> Result<Option<Person>> {
        let state = self.lock_online()?;
        Ok(state
            .persons
            .iter()
            .find(|p| p.nickname.eq_ignore_ascii_case(query.trim()))
            .cloned())
    }

    fn list_persons(&self) -> Result<Vec<Person>> {
        Ok(self.lock_online()?.persons.clone())
    }

    fn register_person(&self, nickname: &str) -> Result<()> {
        let mut state = self.lock_online()?;
        let nickname = nickname.trim();
        if nickname.is_empty() {
            return Err(Error::validation("Nickname cannot be empty"));
        }
        if state
            .persons
            .iter()
            .any(|p| p.nickname.eq_ignore_ascii_case(nickname))
        {
            return Err(Error::validation(format!(
                "Nickname '{}' is already registered",
                nickname
            )));
        }

        let id = state.next_person_id;
        state.next_person_id += 1;
        if let Some(group) = state.groups.first().map(|g| g.id) {
            state.memberships.insert(id, group);
        }
        state.persons.push(Person::new(id, nickname));
        Ok(())
    }

    fn find_products_by_identifier(&self, identifier: &str) -> Result<Vec<Product>> {
        let state = self.lock_online()?;
        Ok(state
            .identifiers
            .get(identifier.trim())
            .and_then(|id| state.products.iter().find(|p| p.id == *id))
            .cloned()
            .into_iter()
            .collect())
    }

    fn find_products_by_name(&self, name: &str) -> Result<Vec<Product>> {
        let state = self.lock_online()?;
        let query = name.trim().to_lowercase();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        // An exact name wins over partial matches
        if let Some(exact) = state
            .products
            .iter()
            .find(|p| p.name.to_lowercase() == query)
        {
            return Ok(vec![exact.clone()]);
        }

        Ok(state
            .products
            .iter()
            .filter(|p| p.name.to_lowercase().contains(&query))
            .cloned()
            .collect())
    }

    fn list_products(&self) -> Result<Vec<Product>> {
        Ok(self.lock_online()?.products.clone())
    }

    fn list_groups(&self) -> Result<Vec<PersonGroup>> {
        Ok(self.lock_online()?.groups.clone())
    }

    fn create_invoice(
        &self,
        person_id: i64,
        products: &[ProductOrder],
        other: &[CustomCharge],
    ) -> Result<InvoiceResult> {
        let mut state = self.lock_online()?;

        let group = state
            .memberships
            .get(&person_id)
            .copied()
            .ok_or_else(|| Error::not_found(format!("person {}", person_id)))?;

        let mut rows = Vec::with_capacity(products.len() + other.len());
        for order in products {
            let product = state
                .products
                .iter()
                .find(|p| p.id == order.id)
                .ok_or_else(|| Error::not_found(format!("product {}", order.id)))?;
            let price = product.price_for_group(group).ok_or_else(|| {
                Error::validation(format!("{} has no price for group {}", product.name, group))
            })?;
            rows.push(InvoiceRow {
                description: product.name.clone(),
                price,
                amount: order.amount,
            });
        }
        rows.extend(other.iter().map(|charge| InvoiceRow {
            description: charge.description.clone(),
            price: charge.price,
            amount: charge.amount,
        }));

        let total: Money = rows.iter().map(InvoiceRow::total).sum();
        let timestamp = Utc::now().timestamp();
        let invoice_id = state.next_invoice_id;
        state.next_invoice_id += 1;

        let person = state
            .persons
            .iter_mut()
            .find(|p| p.id == person_id)
            .ok_or_else(|| Error::not_found(format!("person {}", person_id)))?;
        person.balance -= total;
        let balance = person.balance;

        state.invoices.push((
            person_id,
            InvoiceSummary {
                timestamp,
                total,
                rows: rows.clone(),
            },
        ));

        Ok(InvoiceResult {
            invoice: Invoice {
                id: Some(invoice_id),
                total,
                timestamp: Some(timestamp),
            },
            person: PersonBalance {
                id: Some(person_id),
                balance,
            },
            rows,
        })
    }

    fn last_invoices_of_person(
        &self,
        person_id: i64,
        count: usize,
    ) -> Result<Vec<InvoiceSummary>> {
        let state = self.lock_online()?;
        Ok(state
            .invoices
            .iter()
            .rev()
            .filter(|(id, _)| *id == person_id)
            .take(count)
            .map(|(_, invoice)| invoice.clone())
            .collect())
    }
}
