//! Cart aggregate and its arithmetic
//!
//! A [`Cart`] belongs to one user and references one restaurant. Every
//! mutator keeps `total_price == Σ(price × quantity)` and refuses to touch a
//! checked-out cart.
//!
//! ```text
//! (none) ──add──▶ Active ──check_out──▶ CheckedOut (terminal)
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::{self, MAX_QUANTITY, MoneyError};
use crate::types::Timestamp;
use crate::util::new_id;

/// Cart status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CartStatus {
    /// Accepts mutation
    #[default]
    Active,
    /// Immutable history
    CheckedOut,
}

/// Restaurant reference, populated with its display name on API responses
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RestaurantRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl RestaurantRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }
}

/// Cart line. `name` and `price` are snapshots taken when the dish was added.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: String,
    pub menu_item_id: String,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub quantity: u32,
}

impl CartItem {
    pub fn line_total(&self) -> Decimal {
        money::line_total(self.price, self.quantity)
    }
}

/// Input for [`Cart::add_item`]
#[derive(Debug, Clone, PartialEq)]
pub struct NewCartItem {
    pub menu_item_id: String,
    pub name: String,
    pub price: Decimal,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("Cart {0} is already checked out")]
    CheckedOut(String),

    #[error("Item {0} not found in cart")]
    ItemNotFound(String),

    #[error("quantity must be between 1 and {max}, got {0}", max = MAX_QUANTITY)]
    InvalidQuantity(u64),

    #[error(transparent)]
    Price(#[from] MoneyError),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: String,
    pub restaurant: RestaurantRef,
    pub items: Vec<CartItem>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
    pub status: CartStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

fn check_quantity(quantity: u64) -> Result<u32, CartError> {
    if quantity == 0 || quantity > u64::from(MAX_QUANTITY) {
        return Err(CartError::InvalidQuantity(quantity));
    }
    Ok(quantity as u32)
}

impl Cart {
    /// Open a new, empty active cart for a restaurant
    pub fn open(restaurant_id: impl Into<String>, now: Timestamp) -> Self {
        Self {
            id: new_id(),
            restaurant: RestaurantRef::new(restaurant_id),
            items: Vec::new(),
            total_price: Decimal::ZERO,
            status: CartStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn restaurant_id(&self) -> &str {
        &self.restaurant.id
    }

    pub fn is_active(&self) -> bool {
        self.status == CartStatus::Active
    }

    pub fn item(&self, item_id: &str) -> Option<&CartItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    pub fn contains_item(&self, item_id: &str) -> bool {
        self.item(item_id).is_some()
    }

    /// Total number of units across all lines ("N items added")
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Σ(price × quantity) over the current lines
    pub fn computed_total(&self) -> Decimal {
        money::sum_lines(self.items.iter().map(|i| (i.price, i.quantity)))
    }

    pub fn recompute_total(&mut self) {
        self.total_price = self.computed_total();
    }

    fn ensure_active(&self) -> Result<(), CartError> {
        if !self.is_active() {
            return Err(CartError::CheckedOut(self.id.clone()));
        }
        Ok(())
    }

    /// Add a dish, merging by `menu_item_id`.
    ///
    /// On merge only the quantity accumulates; the existing name/price
    /// snapshot is kept. Returns the id of the affected line.
    pub fn add_item(&mut self, new: NewCartItem, now: Timestamp) -> Result<String, CartError> {
        self.ensure_active()?;
        check_quantity(u64::from(new.quantity))?;

        let item_id = match self
            .items
            .iter_mut()
            .find(|i| i.menu_item_id == new.menu_item_id)
        {
            Some(existing) => {
                let merged = u64::from(existing.quantity) + u64::from(new.quantity);
                existing.quantity = check_quantity(merged)?;
                existing.id.clone()
            }
            None => {
                let price = money::normalize_price(new.price)?;
                let item = CartItem {
                    id: new_id(),
                    menu_item_id: new.menu_item_id,
                    name: new.name,
                    price,
                    quantity: new.quantity,
                };
                let id = item.id.clone();
                self.items.push(item);
                id
            }
        };

        self.recompute_total();
        self.updated_at = now;
        Ok(item_id)
    }

    /// Set the exact quantity of a line. Zero is rejected, not stored.
    pub fn set_item_quantity(
        &mut self,
        item_id: &str,
        quantity: u32,
        now: Timestamp,
    ) -> Result<(), CartError> {
        self.ensure_active()?;
        let quantity = check_quantity(u64::from(quantity))?;
        let item = self
            .items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| CartError::ItemNotFound(item_id.to_string()))?;
        item.quantity = quantity;
        self.recompute_total();
        self.updated_at = now;
        Ok(())
    }

    pub fn remove_item(&mut self, item_id: &str, now: Timestamp) -> Result<CartItem, CartError> {
        self.ensure_active()?;
        let pos = self
            .items
            .iter()
            .position(|i| i.id == item_id)
            .ok_or_else(|| CartError::ItemNotFound(item_id.to_string()))?;
        let removed = self.items.remove(pos);
        self.recompute_total();
        self.updated_at = now;
        Ok(removed)
    }

    pub fn clear(&mut self, now: Timestamp) -> Result<(), CartError> {
        self.ensure_active()?;
        self.items.clear();
        self.total_price = Decimal::ZERO;
        self.updated_at = now;
        Ok(())
    }

    /// Terminal transition `active → checked-out`
    pub fn check_out(&mut self, now: Timestamp) -> Result<(), CartError> {
        self.ensure_active()?;
        self.status = CartStatus::CheckedOut;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn dish(id: &str, price: &str, quantity: u32) -> NewCartItem {
        NewCartItem {
            menu_item_id: id.to_string(),
            name: format!("Dish {id}"),
            price: d(price),
            quantity,
        }
    }

    #[test]
    fn add_merge_and_append() {
        let mut cart = Cart::open("R1", 1);

        cart.add_item(dish("D1", "100", 1), 2).unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.total_price, d("100"));

        let merged_id = cart.add_item(dish("D1", "100", 2), 3).unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].id, merged_id);
        assert_eq!(cart.items[0].quantity, 3);
        assert_eq!(cart.total_price, d("300"));

        cart.add_item(dish("D2", "50", 1), 4).unwrap();
        assert_eq!(cart.items.len(), 2);
        assert_eq!(cart.total_price, d("350"));
        assert_eq!(cart.updated_at, 4);
        assert_eq!(cart.item_count(), 4);
    }

    #[test]
    fn merge_keeps_original_snapshot() {
        let mut cart = Cart::open("R1", 0);
        cart.add_item(dish("D1", "12.50", 1), 0).unwrap();

        let mut repriced = dish("D1", "99.00", 1);
        repriced.name = "Renamed".to_string();
        cart.add_item(repriced, 0).unwrap();

        assert_eq!(cart.items[0].price, d("12.50"));
        assert_eq!(cart.items[0].name, "Dish D1");
        assert_eq!(cart.total_price, d("25.00"));
    }

    #[test]
    fn zero_quantity_is_rejected_everywhere() {
        let mut cart = Cart::open("R1", 0);
        assert_eq!(
            cart.add_item(dish("D1", "1", 0), 0),
            Err(CartError::InvalidQuantity(0))
        );

        let id = cart.add_item(dish("D1", "1", 2), 0).unwrap();
        assert_eq!(
            cart.set_item_quantity(&id, 0, 0),
            Err(CartError::InvalidQuantity(0))
        );
        assert_eq!(cart.items[0].quantity, 2);
        assert_eq!(cart.total_price, d("2"));
    }

    #[test]
    fn merge_beyond_limit_is_rejected_without_change() {
        let mut cart = Cart::open("R1", 0);
        cart.add_item(dish("D1", "1", MAX_QUANTITY), 0).unwrap();
        assert_eq!(
            cart.add_item(dish("D1", "1", 1), 0),
            Err(CartError::InvalidQuantity(u64::from(MAX_QUANTITY) + 1))
        );
        assert_eq!(cart.items[0].quantity, MAX_QUANTITY);
    }

    #[test]
    fn set_quantity_is_idempotent() {
        let mut cart = Cart::open("R1", 0);
        let id = cart.add_item(dish("D1", "7.25", 1), 0).unwrap();

        cart.set_item_quantity(&id, 4, 5).unwrap();
        let once = cart.clone();
        cart.set_item_quantity(&id, 4, 5).unwrap();

        assert_eq!(cart, once);
        assert_eq!(cart.total_price, d("29.00"));
    }

    #[test]
    fn remove_and_clear_recompute_total() {
        let mut cart = Cart::open("R1", 0);
        let a = cart.add_item(dish("D1", "3.10", 2), 0).unwrap();
        cart.add_item(dish("D2", "4.05", 1), 0).unwrap();

        let removed = cart.remove_item(&a, 1).unwrap();
        assert_eq!(removed.menu_item_id, "D1");
        assert_eq!(cart.total_price, d("4.05"));
        assert_eq!(
            cart.remove_item(&a, 1),
            Err(CartError::ItemNotFound(a.clone()))
        );

        cart.clear(2).unwrap();
        assert!(cart.items.is_empty());
        assert_eq!(cart.total_price, Decimal::ZERO);
    }

    #[test]
    fn checked_out_cart_is_frozen() {
        let mut cart = Cart::open("R1", 0);
        let id = cart.add_item(dish("D1", "10", 1), 0).unwrap();
        cart.check_out(9).unwrap();

        let frozen = cart.clone();
        let err = CartError::CheckedOut(cart.id.clone());
        assert_eq!(cart.add_item(dish("D2", "1", 1), 10), Err(err.clone()));
        assert_eq!(cart.set_item_quantity(&id, 2, 10), Err(err.clone()));
        assert_eq!(cart.remove_item(&id, 10), Err(err.clone()));
        assert_eq!(cart.clear(10), Err(err.clone()));
        assert_eq!(cart.check_out(10), Err(err));
        assert_eq!(cart, frozen);
        assert_eq!(cart.status, CartStatus::CheckedOut);
    }

    #[test]
    fn wire_format_is_camel_case_with_kebab_status() {
        let mut cart = Cart::open("R1", 0);
        cart.add_item(dish("D1", "100", 1), 0).unwrap();
        cart.check_out(1).unwrap();

        let json = serde_json::to_value(&cart).unwrap();
        assert_eq!(json["status"], "checked-out");
        assert_eq!(json["restaurant"]["id"], "R1");
        assert_eq!(json["items"][0]["menuItemId"], "D1");
        assert_eq!(json["totalPrice"], 100.0);

        let back: Cart = serde_json::from_value(json).unwrap();
        assert_eq!(back, cart);
    }
}
