//! Cart Mutation Service
//!
//! Every operation is a load → mutate → compare-and-swap save of the user
//! aggregate. A save that loses the race (`VersionConflict`) is replayed on a
//! freshly loaded aggregate, up to `max_retries` times, so concurrent
//! requests on the same user never lose an update.
//!
//! # Cart selection
//!
//! Routes address a cart with one path segment. It is resolved as a cart id
//! first (any status, so a checked-out cart answers `Conflict`) and then as a
//! restaurant id (active cart only).

use std::sync::Arc;

use shared::money::{self, MAX_QUANTITY};
use shared::util::now_millis;
use shared::{AddItemRequest, Cart, CartError, NewCartItem};
use thiserror::Error;

use super::storage::{CartStorage, StorageError};
use super::user::UserRecord;
use crate::catalog::{Catalog, CatalogError};
use crate::utils::validation::{MAX_ID_LEN, MAX_NAME_LEN, validate_required_text};

const CART_NOT_FOUND: &str = "Cart not found or already checked out";

/// Default retry budget for version conflicts
pub const DEFAULT_MAX_RETRIES: u32 = 5;

#[derive(Debug, Error)]
pub enum MutationError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for MutationError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::UserNotFound(_) => MutationError::NotFound("User not found".to_string()),
            StorageError::EmailTaken(_) => {
                MutationError::Conflict("Email is already registered".to_string())
            }
            StorageError::VersionConflict { .. } => {
                MutationError::Conflict("Cart was modified concurrently, retry".to_string())
            }
            other => MutationError::Storage(other),
        }
    }
}

impl From<CartError> for MutationError {
    fn from(e: CartError) -> Self {
        match e {
            CartError::CheckedOut(id) => {
                MutationError::Conflict(format!("Cart {id} is already checked out"))
            }
            CartError::ItemNotFound(_) => MutationError::NotFound("Item not found".to_string()),
            CartError::InvalidQuantity(_) | CartError::Price(_) => {
                MutationError::Validation(e.to_string())
            }
        }
    }
}

impl From<CatalogError> for MutationError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::RestaurantNotFound(_) | CatalogError::DishNotFound { .. } => {
                MutationError::NotFound(e.to_string())
            }
            CatalogError::Io(_) | CatalogError::Parse(_) => MutationError::Validation(e.to_string()),
        }
    }
}

pub type MutationResult<T> = Result<T, MutationError>;

/// Resolve a cart path segment to an index into `user.carts`
fn select_cart(user: &UserRecord, selector: &str) -> MutationResult<usize> {
    if let Some(idx) = user.cart_index_by_id(selector) {
        let cart = &user.carts[idx];
        if !cart.is_active() {
            return Err(MutationError::Conflict(format!(
                "Cart {} is already checked out",
                cart.id
            )));
        }
        return Ok(idx);
    }
    user.active_cart_index(selector)
        .ok_or_else(|| MutationError::NotFound(CART_NOT_FOUND.to_string()))
}

fn cart_at(user: &mut UserRecord, idx: usize) -> MutationResult<&mut Cart> {
    user.carts
        .get_mut(idx)
        .ok_or_else(|| MutationError::NotFound(CART_NOT_FOUND.to_string()))
}

fn validate_add(restaurant_id: &str, req: &AddItemRequest) -> MutationResult<()> {
    validate_required_text(restaurant_id, "restaurantId", MAX_ID_LEN)
        .and_then(|_| validate_required_text(&req.menu_item_id, "menuItemId", MAX_ID_LEN))
        .and_then(|_| validate_required_text(&req.name, "name", MAX_NAME_LEN))
        .map_err(|e| MutationError::Validation(e.to_string()))?;
    if req.quantity == 0 || req.quantity > MAX_QUANTITY {
        return Err(CartError::InvalidQuantity(u64::from(req.quantity)).into());
    }
    money::normalize_price(req.price).map_err(CartError::from)?;
    Ok(())
}

/// 购物车变更服务
#[derive(Clone, Debug)]
pub struct CartService {
    storage: CartStorage,
    catalog: Arc<dyn Catalog>,
    max_retries: u32,
}

impl CartService {
    pub fn new(storage: CartStorage, catalog: Arc<dyn Catalog>) -> Self {
        Self {
            storage,
            catalog,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn storage(&self) -> &CartStorage {
        &self.storage
    }

    /// Load-mutate-save with CAS retry. `apply` must be replayable: it runs
    /// again on a fresh aggregate after each lost race.
    fn mutate<F>(&self, user_id: &str, op: &'static str, mut apply: F) -> MutationResult<Cart>
    where
        F: FnMut(&mut UserRecord, i64) -> MutationResult<Cart>,
    {
        let mut attempt: u32 = 0;
        loop {
            let mut user = self.storage.require_user(user_id)?;
            let now = now_millis();
            let cart = apply(&mut user, now)?;
            user.updated_at = now;

            match self.storage.save_user(user) {
                Ok(saved) => {
                    tracing::debug!(
                        op,
                        user_id,
                        cart_id = %cart.id,
                        restaurant_id = %cart.restaurant_id(),
                        version = saved.version,
                        total = %cart.total_price,
                        "Cart mutated"
                    );
                    return Ok(cart);
                }
                Err(StorageError::VersionConflict { .. }) if attempt < self.max_retries => {
                    attempt += 1;
                    tracing::debug!(op, user_id, attempt, "Version conflict, replaying");
                    std::thread::yield_now();
                }
                Err(e @ StorageError::VersionConflict { .. }) => {
                    tracing::warn!(op, user_id, attempts = attempt + 1, "Version conflict retries exhausted");
                    return Err(e.into());
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    // ========== Queries ==========

    pub fn list_active_carts(&self, user_id: &str) -> MutationResult<Vec<Cart>> {
        let carts = self.storage.list_active_carts(user_id)?;
        Ok(carts.into_iter().map(|c| self.catalog.populate(c)).collect())
    }

    pub fn find_cart(&self, user_id: &str, restaurant_id: &str) -> MutationResult<Option<Cart>> {
        let cart = self.storage.find_cart(user_id, restaurant_id)?;
        Ok(cart.map(|c| self.catalog.populate(c)))
    }

    pub fn list_cart_history(&self, user_id: &str) -> MutationResult<Vec<Cart>> {
        let carts = self.storage.list_cart_history(user_id)?;
        Ok(carts.into_iter().map(|c| self.catalog.populate(c)).collect())
    }

    // ========== Mutations ==========

    /// Add a dish to the user's active cart for `restaurant_id`, opening
    /// the cart if needed. Merges by `menu_item_id`.
    pub fn add_item(
        &self,
        user_id: &str,
        restaurant_id: &str,
        req: AddItemRequest,
    ) -> MutationResult<Cart> {
        validate_add(restaurant_id, &req)?;
        self.catalog.check_dish(restaurant_id, &req.menu_item_id)?;
        let new_item = NewCartItem::from(req);

        let cart = self.mutate(user_id, "add_item", |user, now| {
            let idx = match user.active_cart_index(restaurant_id) {
                Some(idx) => idx,
                None => {
                    user.carts.push(Cart::open(restaurant_id, now));
                    user.carts.len() - 1
                }
            };
            let cart = cart_at(user, idx)?;
            cart.add_item(new_item.clone(), now)?;
            Ok(cart.clone())
        })?;
        Ok(self.catalog.populate(cart))
    }

    /// Set the exact quantity of a cart line. Quantity 0 is a validation
    /// error; use [`remove_item`](Self::remove_item) to delete a line.
    pub fn update_item_quantity(
        &self,
        user_id: &str,
        selector: &str,
        item_id: &str,
        quantity: u32,
    ) -> MutationResult<Cart> {
        let cart = self.mutate(user_id, "update_item_quantity", |user, now| {
            let idx = select_cart(user, selector)?;
            let cart = cart_at(user, idx)?;
            cart.set_item_quantity(item_id, quantity, now)?;
            Ok(cart.clone())
        })?;
        Ok(self.catalog.populate(cart))
    }

    pub fn remove_item(&self, user_id: &str, selector: &str, item_id: &str) -> MutationResult<Cart> {
        let cart = self.mutate(user_id, "remove_item", |user, now| {
            let idx = select_cart(user, selector)?;
            let cart = cart_at(user, idx)?;
            cart.remove_item(item_id, now)?;
            Ok(cart.clone())
        })?;
        Ok(self.catalog.populate(cart))
    }

    /// Remove a line from whichever active cart holds it
    pub fn remove_item_anywhere(&self, user_id: &str, item_id: &str) -> MutationResult<Cart> {
        let cart = self.mutate(user_id, "remove_item", |user, now| {
            let idx = user
                .carts
                .iter()
                .position(|c| c.is_active() && c.contains_item(item_id))
                .ok_or_else(|| MutationError::NotFound("Item not found".to_string()))?;
            let cart = cart_at(user, idx)?;
            cart.remove_item(item_id, now)?;
            Ok(cart.clone())
        })?;
        Ok(self.catalog.populate(cart))
    }

    pub fn clear_cart(&self, user_id: &str, selector: &str) -> MutationResult<Cart> {
        let cart = self.mutate(user_id, "clear_cart", |user, now| {
            let idx = select_cart(user, selector)?;
            let cart = cart_at(user, idx)?;
            cart.clear(now)?;
            Ok(cart.clone())
        })?;
        Ok(self.catalog.populate(cart))
    }

    /// `active → checked-out`. The cart stays in the user's history; the
    /// next add for the same restaurant opens a new cart.
    pub fn checkout(&self, user_id: &str, selector: &str) -> MutationResult<Cart> {
        let cart = self.mutate(user_id, "checkout", |user, now| {
            let idx = select_cart(user, selector)?;
            let cart = cart_at(user, idx)?;
            cart.check_out(now)?;
            Ok(cart.clone())
        })?;
        tracing::info!(user_id, cart_id = %cart.id, total = %cart.total_price, "Cart checked out");
        Ok(self.catalog.populate(cart))
    }
}
