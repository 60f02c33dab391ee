//! Cart domain model

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use serde::Serialize;

use super::invoice::ProductOrder;
use super::money::Money;
use super::product::Product;

/// A product in the cart with its quantity (always at least 1)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartEntry {
    pub product: Product,
    pub quantity: u32,
}

impl CartEntry {
    /// Line price for members of the given group
    pub fn price_for_group(&self, person_group_id: i64) -> Option<Money> {
        self.product
            .price_for_group(person_group_id)
            .map(|price| price.times(self.quantity))
    }
}

/// What `Cart::set_quantity` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityChange {
    Inserted,
    Updated,
    Removed,
    /// Quantity 0 for a product that was not in the cart
    Unchanged,
}

/// Products awaiting settlement, keyed by product id
///
/// An entry never holds quantity 0: setting a quantity of 0 deletes it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Cart {
    entries: BTreeMap<i64, CartEntry>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one unit of a product, returning its new quantity
    pub fn add(&mut self, product: &Product) -> u32 {
        let entry = self.entries.entry(product.id).or_insert_with(|| CartEntry {
            product: product.clone(),
            quantity: 0,
        });
        entry.quantity += 1;
        entry.quantity
    }

    pub fn set_quantity(&mut self, product: &Product, quantity: u32) -> QuantityChange {
        if quantity == 0 {
            return match self.entries.remove(&product.id) {
                Some(_) => QuantityChange::Removed,
                None => QuantityChange::Unchanged,
            };
        }

        match self.entries.entry(product.id) {
            Entry::Occupied(mut occupied) => {
                occupied.get_mut().quantity = quantity;
                QuantityChange::Updated
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CartEntry {
                    product: product.clone(),
                    quantity,
                });
                QuantityChange::Inserted
            }
        }
    }

    pub fn remove(&mut self, product_id: i64) -> Option<CartEntry> {
        self.entries.remove(&product_id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct products
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> impl Iterator<Item = &CartEntry> {
        self.entries.values()
    }

    pub fn quantity_of(&self, product_id: i64) -> Option<u32> {
        self.entries.get(&product_id).map(|e| e.quantity)
    }

    /// Product lines for `invoice/create`
    pub fn product_orders(&self) -> Vec<ProductOrder> {
        self.entries
            .values()
            .map(|e| ProductOrder {
                id: e.product.id,
                amount: e.quantity,
            })
            .collect()
    }

    /// Cart total for a group, or `None` if a product has no price for it
    pub fn total_for_group(&self, person_group_id: i64) -> Option<Money> {
        self.entries
            .values()
            .map(|e| e.price_for_group(person_group_id))
            .sum()
    }
}
