//! Client cart cache
//!
//! In-memory mirror of the carts the session believes are active. Quantity
//! changes are applied optimistically and recorded in a ledger keyed by
//! [`MutationId`]; server responses replace whole carts (`reconcile`).
//!
//! A failed mutation is rolled back only while it is still the latest
//! optimistic mutation for its `(restaurant, item)`: a newer intent owns
//! the visible value. Until a mutation is confirmed or rolled back, every
//! server cart taken into the cache shows its quantity again.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use shared::util::now_millis;
use shared::{AddItemRequest, Cart};

use crate::{CartApi, ClientResult};

/// Correlation id of one optimistic mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MutationId(u64);

impl std::fmt::Display for MutationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "m{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct LedgerEntry {
    restaurant_id: String,
    item_id: String,
    /// Locally requested quantity
    quantity: u32,
    /// Quantity to restore on rollback
    previous_quantity: u32,
}

/// Point-in-time copy of the cache
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheSnapshot {
    pub carts: Vec<Cart>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
struct CacheInner {
    carts: Vec<Cart>,
    loading: bool,
    error: Option<String>,
    ledger: HashMap<MutationId, LedgerEntry>,
    /// Latest mutation per (restaurant, item)
    latest: HashMap<(String, String), MutationId>,
    next_id: u64,
}

impl CacheInner {
    fn cart_mut(&mut self, restaurant_id: &str) -> Option<&mut Cart> {
        self.carts
            .iter_mut()
            .find(|c| c.is_active() && c.restaurant_id() == restaurant_id)
    }

    fn forget(&mut self, id: MutationId) -> Option<(LedgerEntry, bool)> {
        let entry = self.ledger.remove(&id)?;
        let key = (entry.restaurant_id.clone(), entry.item_id.clone());
        let is_latest = self.latest.get(&key) == Some(&id);
        if is_latest {
            self.latest.remove(&key);
        }
        Some((entry, is_latest))
    }

    /// Re-apply the latest open mutation of each line over a server cart
    fn overlay_open(&mut self, restaurant_id: &str) {
        let open: Vec<(String, u32)> = self
            .latest
            .iter()
            .filter(|((r, _), _)| r == restaurant_id)
            .filter_map(|((_, item), id)| self.ledger.get(id).map(|e| (item.clone(), e.quantity)))
            .collect();
        let Some(cart) = self.cart_mut(restaurant_id) else {
            return;
        };
        for (item_id, quantity) in open {
            // the line may be gone server-side
            cart.set_item_quantity(&item_id, quantity, now_millis()).ok();
        }
    }
}

/// Thread-safe cart cache, cheap to clone
#[derive(Debug, Clone, Default)]
pub struct CartCache {
    inner: Arc<RwLock<CacheInner>>,
}

impl CartCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        let inner = self.inner.read();
        CacheSnapshot {
            carts: inner.carts.clone(),
            loading: inner.loading,
            error: inner.error.clone(),
        }
    }

    pub fn cart_for(&self, restaurant_id: &str) -> Option<Cart> {
        self.inner
            .read()
            .carts
            .iter()
            .find(|c| c.restaurant_id() == restaurant_id)
            .cloned()
    }

    pub fn item_quantity(&self, restaurant_id: &str, item_id: &str) -> Option<u32> {
        let inner = self.inner.read();
        inner
            .carts
            .iter()
            .find(|c| c.restaurant_id() == restaurant_id)
            .and_then(|c| c.item(item_id))
            .map(|i| i.quantity)
    }

    /// Total units in a restaurant's cart, 0 when there is no cart
    pub fn item_count(&self, restaurant_id: &str) -> u32 {
        self.cart_for(restaurant_id)
            .map(|c| c.item_count())
            .unwrap_or(0)
    }

    /// Set a line's quantity locally and open a ledger entry.
    ///
    /// `None` when the cart or item is not cached or the quantity is out of
    /// range; nothing changes in that case.
    pub fn apply_optimistic(
        &self,
        restaurant_id: &str,
        item_id: &str,
        quantity: u32,
    ) -> Option<MutationId> {
        let mut inner = self.inner.write();
        let cart = inner.cart_mut(restaurant_id)?;
        let previous_quantity = cart.item(item_id)?.quantity;
        cart.set_item_quantity(item_id, quantity, now_millis()).ok()?;

        inner.next_id += 1;
        let id = MutationId(inner.next_id);
        inner.ledger.insert(
            id,
            LedgerEntry {
                restaurant_id: restaurant_id.to_string(),
                item_id: item_id.to_string(),
                quantity,
                previous_quantity,
            },
        );
        inner
            .latest
            .insert((restaurant_id.to_string(), item_id.to_string()), id);
        Some(id)
    }

    /// `old` never reached the server: drop it and let `new` restore the
    /// quantity `old` would have restored.
    pub fn supersede(&self, old: MutationId, new: MutationId) {
        let mut inner = self.inner.write();
        if let Some(old_entry) = inner.ledger.remove(&old)
            && let Some(new_entry) = inner.ledger.get_mut(&new)
        {
            new_entry.previous_quantity = old_entry.previous_quantity;
        }
    }

    /// Replace the cached cart for the restaurant with the server's copy.
    /// A cart that is no longer active leaves the cache. Open mutations on
    /// its lines stay visible.
    pub fn reconcile(&self, cart: Cart) {
        let mut inner = self.inner.write();
        let restaurant_id = cart.restaurant_id().to_string();
        let position = inner
            .carts
            .iter()
            .position(|c| c.id == cart.id || c.restaurant_id() == cart.restaurant_id());
        match (position, cart.is_active()) {
            (Some(idx), true) => inner.carts[idx] = cart,
            (None, true) => inner.carts.push(cart),
            (Some(idx), false) => {
                inner.carts.remove(idx);
            }
            (None, false) => {}
        }
        inner.overlay_open(&restaurant_id);
    }

    /// Mutation succeeded
    pub fn confirm(&self, id: MutationId) {
        self.inner.write().forget(id);
    }

    /// Mutation failed. Returns `true` when the previous quantity was
    /// restored, `false` when a newer mutation owns the value.
    pub fn rollback(&self, id: MutationId) -> bool {
        let mut inner = self.inner.write();
        let Some((entry, is_latest)) = inner.forget(id) else {
            return false;
        };
        if !is_latest {
            return false;
        }
        match inner.cart_mut(&entry.restaurant_id) {
            Some(cart) => cart
                .set_item_quantity(&entry.item_id, entry.previous_quantity, now_millis())
                .is_ok(),
            None => false,
        }
    }

    pub fn pending_mutations(&self) -> usize {
        self.inner.read().ledger.len()
    }

    pub fn record_error(&self, message: impl Into<String>) {
        self.inner.write().error = Some(message.into());
    }

    pub fn clear_error(&self) {
        self.inner.write().error = None;
    }

    pub fn set_loading(&self, loading: bool) {
        self.inner.write().loading = loading;
    }

    /// Replace every cached cart (full refresh). Only active carts are kept.
    pub fn replace_all(&self, carts: Vec<Cart>) {
        let mut inner = self.inner.write();
        inner.carts = carts.into_iter().filter(Cart::is_active).collect();
        let restaurants: Vec<String> = inner
            .carts
            .iter()
            .map(|c| c.restaurant_id().to_string())
            .collect();
        for restaurant_id in restaurants {
            inner.overlay_open(&restaurant_id);
        }
    }

    pub fn remove_restaurant(&self, restaurant_id: &str) {
        self.inner
            .write()
            .carts
            .retain(|c| c.restaurant_id() != restaurant_id);
    }
}

/// Cache + API: the non-debounced cart operations of a client session
#[derive(Clone)]
pub struct CartSession {
    api: Arc<dyn CartApi>,
    cache: CartCache,
}

impl std::fmt::Debug for CartSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartSession")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl CartSession {
    pub fn new(api: Arc<dyn CartApi>, cache: CartCache) -> Self {
        Self { api, cache }
    }

    pub fn cache(&self) -> &CartCache {
        &self.cache
    }

    pub fn api(&self) -> Arc<dyn CartApi> {
        self.api.clone()
    }

    /// Run one API call with the loading flag set, recording failures
    async fn track<T>(
        &self,
        op: &'static str,
        call: impl std::future::Future<Output = ClientResult<T>>,
    ) -> ClientResult<T> {
        self.cache.set_loading(true);
        let result = call.await;
        self.cache.set_loading(false);
        match &result {
            Ok(_) => self.cache.clear_error(),
            Err(e) => {
                tracing::warn!(op, error = %e, "Cart request failed");
                self.cache.record_error(e.to_string());
            }
        }
        result
    }

    /// Reload all active carts from the server
    pub async fn refresh(&self) -> ClientResult<()> {
        let carts = self.track("refresh", self.api.list_carts()).await?;
        self.cache.replace_all(carts);
        Ok(())
    }

    pub async fn add_item(&self, restaurant_id: &str, req: AddItemRequest) -> ClientResult<Cart> {
        let cart = self
            .track("add_item", self.api.add_item(restaurant_id, &req))
            .await?;
        self.cache.reconcile(cart.clone());
        Ok(cart)
    }

    pub async fn remove_item(&self, restaurant_id: &str, item_id: &str) -> ClientResult<Cart> {
        let cart = self
            .track("remove_item", self.api.remove_item(restaurant_id, item_id))
            .await?;
        self.cache.reconcile(cart.clone());
        Ok(cart)
    }

    pub async fn clear(&self, restaurant_id: &str) -> ClientResult<Cart> {
        let cart = self
            .track("clear_cart", self.api.clear_cart(restaurant_id))
            .await?;
        self.cache.reconcile(cart.clone());
        Ok(cart)
    }

    /// Check out a restaurant's cart; it leaves the active view
    pub async fn checkout(&self, restaurant_id: &str) -> ClientResult<Cart> {
        let cart = self
            .track("checkout", self.api.checkout(restaurant_id))
            .await?;
        self.cache.reconcile(cart.clone());
        Ok(cart)
    }
}
