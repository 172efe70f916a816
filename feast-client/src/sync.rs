//! Debounced quantity synchronizer
//!
//! One line per `(restaurant, item)`. Every intent updates the cache
//! immediately and (re)arms a quiet-period timer; only the last intent of a
//! burst is sent. A superseded timer is aborted before it fires. Requests
//! already on the wire are never cancelled.
//!
//! At most one PUT per line is in flight. An intent whose quiet period ends
//! while its line is busy waits and goes out when that PUT completes, so the
//! server sees the line's intents in order.
//!
//! ```text
//! +1 +1 +1 ──(quiet period)──▶ PUT quantity=4 ──▶ reconcile / rollback
//!               +1 ──(quiet)──▶ (due) ───────────▶ PUT quantity=5
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use shared::Cart;
use shared::money::MAX_QUANTITY;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::cache::{CartCache, MutationId};
use crate::{CartApi, ClientError, ClientResult};

type LineKey = (String, String);

/// Latest unsent intent of a line
struct Pending {
    generation: u64,
    quantity: u32,
    mutation: MutationId,
    timer: JoinHandle<()>,
    /// Quiet period over, waiting for the in-flight PUT
    due: bool,
}

#[derive(Clone, Copy)]
struct InFlight {
    quantity: u32,
    mutation: MutationId,
}

#[derive(Default)]
struct Line {
    pending: Option<Pending>,
    in_flight: Option<InFlight>,
}

impl Line {
    /// Move the pending intent onto the wire
    fn start_next(&mut self) -> Option<InFlight> {
        let pending = self.pending.take()?;
        let next = InFlight {
            quantity: pending.quantity,
            mutation: pending.mutation,
        };
        self.in_flight = Some(next);
        Some(next)
    }
}

struct SyncInner {
    api: Arc<dyn CartApi>,
    cache: CartCache,
    quiet: Duration,
    generation: AtomicU64,
    /// Lines with an unsent intent or a PUT in flight
    lines: Mutex<HashMap<LineKey, Line>>,
    /// Signalled whenever a line's PUT chain finishes
    settled: Notify,
}

/// Debounced `PUT …/items/{item}` sender, cheap to clone
#[derive(Clone)]
pub struct QuantitySynchronizer {
    inner: Arc<SyncInner>,
}

impl std::fmt::Debug for QuantitySynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuantitySynchronizer")
            .field("quiet", &self.inner.quiet)
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

impl QuantitySynchronizer {
    pub fn new(api: Arc<dyn CartApi>, cache: CartCache, quiet: Duration) -> Self {
        Self {
            inner: Arc::new(SyncInner {
                api,
                cache,
                quiet,
                generation: AtomicU64::new(0),
                lines: Mutex::new(HashMap::new()),
                settled: Notify::new(),
            }),
        }
    }

    /// Quiet period taken from [`ClientConfig::debounce_ms`](crate::ClientConfig)
    pub fn from_config(api: Arc<dyn CartApi>, cache: CartCache, config: &crate::ClientConfig) -> Self {
        Self::new(api, cache, config.debounce())
    }

    pub fn cache(&self) -> &CartCache {
        &self.inner.cache
    }

    /// `+1`. `None` at the quantity ceiling.
    pub fn increase(&self, restaurant_id: &str, item_id: &str) -> ClientResult<Option<MutationId>> {
        let current = self.current(restaurant_id, item_id)?;
        if current >= MAX_QUANTITY {
            return Ok(None);
        }
        self.set_quantity(restaurant_id, item_id, current + 1).map(Some)
    }

    /// `-1`, floored at 1. `None` when already at 1.
    pub fn decrease(&self, restaurant_id: &str, item_id: &str) -> ClientResult<Option<MutationId>> {
        let current = self.current(restaurant_id, item_id)?;
        if current <= 1 {
            return Ok(None);
        }
        self.set_quantity(restaurant_id, item_id, current - 1).map(Some)
    }

    fn current(&self, restaurant_id: &str, item_id: &str) -> ClientResult<u32> {
        self.inner
            .cache
            .item_quantity(restaurant_id, item_id)
            .ok_or_else(|| ClientError::NotFound(format!("item {item_id} is not in the cart")))
    }

    /// Apply `quantity` locally and schedule it, replacing any unsent intent
    /// for the same line.
    pub fn set_quantity(
        &self,
        restaurant_id: &str,
        item_id: &str,
        quantity: u32,
    ) -> ClientResult<MutationId> {
        if quantity == 0 || quantity > MAX_QUANTITY {
            return Err(ClientError::Validation(format!(
                "quantity must be between 1 and {MAX_QUANTITY}"
            )));
        }
        let mutation = self
            .inner
            .cache
            .apply_optimistic(restaurant_id, item_id, quantity)
            .ok_or_else(|| ClientError::NotFound(format!("item {item_id} is not in the cart")))?;

        let key: LineKey = (restaurant_id.to_string(), item_id.to_string());
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed) + 1;

        let mut lines = self.inner.lines.lock();
        let line = lines.entry(key.clone()).or_default();
        if let Some(old) = line.pending.take() {
            old.timer.abort();
            self.inner.cache.supersede(old.mutation, mutation);
            tracing::debug!(restaurant_id, item_id, quantity, "Superseded pending quantity");
        }

        let inner = self.inner.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(inner.quiet).await;
            inner.fire(key, generation).await;
        });
        line.pending = Some(Pending {
            generation,
            quantity,
            mutation,
            timer,
            due: false,
        });
        Ok(mutation)
    }

    /// Send every unsent intent now and wait until no PUT is in flight
    pub async fn flush(&self) {
        let starts: Vec<(LineKey, InFlight)> = {
            let mut lines = self.inner.lines.lock();
            let mut starts = Vec::new();
            for (key, line) in lines.iter_mut() {
                if let Some(pending) = line.pending.as_mut() {
                    pending.timer.abort();
                    pending.due = true;
                }
                if line.in_flight.is_none()
                    && let Some(next) = line.start_next()
                {
                    starts.push((key.clone(), next));
                }
            }
            starts
        };
        let drives = starts.into_iter().map(|(key, next)| {
            let inner = self.inner.clone();
            async move { inner.drive(key, next).await }
        });
        futures::future::join_all(drives).await;
        self.inner.wait_settled().await;
    }

    /// Lines with an unsent intent or a PUT in flight
    pub fn pending_count(&self) -> usize {
        self.inner.lines.lock().len()
    }
}

impl SyncInner {
    /// Timer expiry: only the generation that still owns the line proceeds
    async fn fire(&self, key: LineKey, generation: u64) {
        let next = {
            let mut lines = self.lines.lock();
            let Some(line) = lines.get_mut(&key) else {
                return;
            };
            let Some(pending) = line.pending.as_mut() else {
                return;
            };
            if pending.generation != generation {
                return;
            }
            if line.in_flight.is_some() {
                pending.due = true;
                return;
            }
            line.start_next()
        };
        if let Some(next) = next {
            self.drive(key, next).await;
        }
    }

    /// Send `first`, then every intent that became due while the line was busy
    async fn drive(&self, key: LineKey, first: InFlight) {
        let mut current = Some(first);
        while let Some(sent) = current {
            let result = self
                .api
                .update_quantity(&key.0, &key.1, sent.quantity)
                .await;

            current = {
                let mut lines = self.lines.lock();
                let newer = lines
                    .get(&key)
                    .and_then(|line| line.pending.as_ref())
                    .map(|pending| pending.mutation);
                self.settle(&key, sent, newer, result);

                let (next, idle) = match lines.get_mut(&key) {
                    Some(line) => {
                        line.in_flight = None;
                        let next = if line.pending.as_ref().is_some_and(|p| p.due) {
                            line.start_next()
                        } else {
                            None
                        };
                        (next, line.pending.is_none() && line.in_flight.is_none())
                    }
                    None => (None, false),
                };
                if idle {
                    lines.remove(&key);
                }
                next
            };
        }
        self.settled.notify_waiters();
    }

    fn settle(
        &self,
        key: &LineKey,
        sent: InFlight,
        newer: Option<MutationId>,
        result: ClientResult<Cart>,
    ) {
        let (restaurant_id, item_id) = key;
        match result {
            Ok(cart) => {
                self.cache.reconcile(cart);
                self.cache.confirm(sent.mutation);
                tracing::debug!(restaurant_id, item_id, quantity = sent.quantity, "Quantity synced");
            }
            Err(e) => {
                // a newer intent keeps the visible value and inherits the baseline
                let restored = match newer {
                    Some(next) => {
                        self.cache.supersede(sent.mutation, next);
                        false
                    }
                    None => self.cache.rollback(sent.mutation),
                };
                self.cache.record_error(e.to_string());
                tracing::warn!(
                    restaurant_id,
                    item_id,
                    quantity = sent.quantity,
                    restored,
                    error = %e,
                    "Quantity sync failed"
                );
            }
        }
    }

    async fn wait_settled(&self) {
        loop {
            let notified = self.settled.notified();
            let mut notified = std::pin::pin!(notified);
            notified.as_mut().enable();
            if self.lines.lock().values().all(|line| line.in_flight.is_none()) {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use shared::{AddItemRequest, Cart, NewCartItem};
    use std::sync::atomic::AtomicBool;

    /// Server stand-in holding one canonical cart
    struct MockApi {
        cart: Mutex<Cart>,
        calls: Mutex<Vec<(String, String, u32)>>,
        fail: AtomicBool,
        /// Time between receiving a PUT and answering it
        latency: Duration,
    }

    impl MockApi {
        fn new(cart: Cart, latency: Duration) -> Arc<Self> {
            Arc::new(Self {
                cart: Mutex::new(cart),
                calls: Mutex::new(Vec::new()),
                fail: AtomicBool::new(false),
                latency,
            })
        }

        fn server_quantity(&self, item_id: &str) -> Option<u32> {
            self.cart.lock().item(item_id).map(|i| i.quantity)
        }

        fn calls(&self) -> Vec<(String, String, u32)> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl CartApi for MockApi {
        async fn list_carts(&self) -> ClientResult<Vec<Cart>> {
            Ok(vec![self.cart.lock().clone()])
        }

        async fn add_item(&self, _: &str, _: &AddItemRequest) -> ClientResult<Cart> {
            Err(ClientError::Validation("unsupported".into()))
        }

        async fn update_quantity(
            &self,
            restaurant_id: &str,
            item_id: &str,
            quantity: u32,
        ) -> ClientResult<Cart> {
            self.calls
                .lock()
                .push((restaurant_id.to_string(), item_id.to_string(), quantity));
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(ClientError::Api {
                    status: 500,
                    message: "Internal server error".into(),
                });
            }
            let mut cart = self.cart.lock();
            cart.set_item_quantity(item_id, quantity, 1)
                .map_err(|e| ClientError::Validation(e.to_string()))?;
            Ok(cart.clone())
        }

        async fn remove_item(&self, _: &str, _: &str) -> ClientResult<Cart> {
            Err(ClientError::Validation("unsupported".into()))
        }

        async fn clear_cart(&self, _: &str) -> ClientResult<Cart> {
            Err(ClientError::Validation("unsupported".into()))
        }

        async fn checkout(&self, _: &str) -> ClientResult<Cart> {
            Err(ClientError::Validation("unsupported".into()))
        }
    }

    fn setup() -> (QuantitySynchronizer, Arc<MockApi>, String, String) {
        setup_with_latency(Duration::ZERO)
    }

    fn setup_with_latency(latency: Duration) -> (QuantitySynchronizer, Arc<MockApi>, String, String) {
        let mut cart = Cart::open("R1", 0);
        let d1 = cart
            .add_item(
                NewCartItem {
                    menu_item_id: "D1".into(),
                    name: "Dumplings".into(),
                    price: "4.50".parse().unwrap(),
                    quantity: 1,
                },
                0,
            )
            .unwrap();
        let d2 = cart
            .add_item(
                NewCartItem {
                    menu_item_id: "D2".into(),
                    name: "Tea".into(),
                    price: "2".parse().unwrap(),
                    quantity: 1,
                },
                0,
            )
            .unwrap();
        let api = MockApi::new(cart.clone(), latency);
        let cache = CartCache::new();
        cache.replace_all(vec![cart]);
        let sync = QuantitySynchronizer::new(api.clone(), cache, Duration::from_millis(1000));
        (sync, api, d1, d2)
    }

    async fn quiet_period() {
        tokio::time::sleep(Duration::from_millis(1100)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_increases_coalesce_into_one_call() {
        let (sync, api, d1, _) = setup();
        for _ in 0..3 {
            sync.increase("R1", &d1).unwrap();
        }
        assert_eq!(sync.cache().item_quantity("R1", &d1), Some(4));
        assert_eq!(sync.pending_count(), 1);
        assert!(api.calls().is_empty());

        quiet_period().await;

        assert_eq!(api.calls(), vec![("R1".to_string(), d1.clone(), 4)]);
        assert_eq!(sync.pending_count(), 0);
        assert_eq!(sync.cache().item_quantity("R1", &d1), Some(4));
        assert_eq!(sync.cache().pending_mutations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn each_tap_restarts_the_quiet_period() {
        let (sync, api, d1, _) = setup();
        sync.increase("R1", &d1).unwrap();
        tokio::time::sleep(Duration::from_millis(700)).await;
        sync.increase("R1", &d1).unwrap();
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert!(api.calls().is_empty());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(api.calls().len(), 1);
        assert_eq!(api.calls()[0].2, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn lines_are_debounced_independently() {
        let (sync, api, d1, d2) = setup();
        sync.increase("R1", &d1).unwrap();
        sync.increase("R1", &d2).unwrap();
        sync.increase("R1", &d2).unwrap();
        assert_eq!(sync.pending_count(), 2);

        quiet_period().await;

        let mut calls = api.calls();
        calls.sort();
        assert_eq!(calls.len(), 2);
        let cart = sync.cache().cart_for("R1").unwrap();
        assert_eq!(cart.item(&d1).unwrap().quantity, 2);
        assert_eq!(cart.item(&d2).unwrap().quantity, 3);
        assert_eq!(cart.total_price, cart.computed_total());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_rolls_back_and_records_error() {
        let (sync, api, d1, _) = setup();
        api.fail.store(true, Ordering::SeqCst);
        sync.increase("R1", &d1).unwrap();
        sync.increase("R1", &d1).unwrap();
        assert_eq!(sync.cache().item_quantity("R1", &d1), Some(3));

        quiet_period().await;

        assert_eq!(api.calls().len(), 1);
        // back to the last confirmed value, not the intermediate one
        assert_eq!(sync.cache().item_quantity("R1", &d1), Some(1));
        assert!(sync.cache().snapshot().error.is_some());
        assert_eq!(sync.cache().pending_mutations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn decrease_floors_at_one() {
        let (sync, api, d1, _) = setup();
        assert_eq!(sync.decrease("R1", &d1).unwrap(), None);
        assert_eq!(sync.pending_count(), 0);

        sync.set_quantity("R1", &d1, 3).unwrap();
        sync.decrease("R1", &d1).unwrap();
        assert_eq!(sync.cache().item_quantity("R1", &d1), Some(2));

        quiet_period().await;
        assert_eq!(api.calls()[0].2, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_intents_are_rejected() {
        let (sync, _, d1, _) = setup();
        assert!(matches!(
            sync.set_quantity("R1", &d1, 0),
            Err(ClientError::Validation(_))
        ));
        assert!(matches!(
            sync.increase("R1", "missing"),
            Err(ClientError::NotFound(_))
        ));
        assert!(matches!(
            sync.set_quantity("R9", &d1, 2),
            Err(ClientError::NotFound(_))
        ));
        assert_eq!(sync.cache().item_quantity("R1", &d1), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn flush_sends_immediately() {
        let (sync, api, d1, _) = setup();
        sync.set_quantity("R1", &d1, 5).unwrap();
        sync.flush().await;
        assert_eq!(api.calls(), vec![("R1".to_string(), d1.clone(), 5)]);
        assert_eq!(sync.pending_count(), 0);

        // the aborted timer must not send again
        quiet_period().await;
        assert_eq!(api.calls().len(), 1);
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn newer_intent_stays_visible_while_older_put_is_in_flight() {
        let (sync, api, d1, _) = setup_with_latency(Duration::from_millis(1500));
        sync.set_quantity("R1", &d1, 2).unwrap();
        // first PUT leaves at t=1000 and answers at t=2500
        advance(1200).await;
        sync.set_quantity("R1", &d1, 3).unwrap();

        // second intent is due at t=2200 but waits for the first answer
        advance(1100).await;
        assert_eq!(api.calls().len(), 1);
        assert_eq!(sync.cache().item_quantity("R1", &d1), Some(3));

        advance(300).await;
        let sent: Vec<u32> = api.calls().iter().map(|c| c.2).collect();
        assert_eq!(sent, vec![2, 3]);
        assert_eq!(sync.cache().item_quantity("R1", &d1), Some(3));
        assert_eq!(sync.pending_count(), 1);

        advance(1500).await;
        assert_eq!(api.server_quantity(&d1), Some(3));
        assert_eq!(sync.cache().item_quantity("R1", &d1), Some(3));
        assert_eq!(sync.pending_count(), 0);
        assert_eq!(sync.cache().pending_mutations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_chain_restores_last_confirmed_quantity() {
        let (sync, api, d1, _) = setup_with_latency(Duration::from_millis(1500));
        api.fail.store(true, Ordering::SeqCst);
        sync.set_quantity("R1", &d1, 2).unwrap();
        advance(1200).await;
        sync.set_quantity("R1", &d1, 3).unwrap();

        // first PUT fails at t=2500; the queued intent still owns the value
        advance(1400).await;
        assert_eq!(sync.cache().item_quantity("R1", &d1), Some(3));
        assert!(sync.cache().snapshot().error.is_some());

        advance(1500).await;
        assert_eq!(api.calls().len(), 2);
        assert_eq!(sync.cache().item_quantity("R1", &d1), Some(1));
        assert_eq!(sync.cache().pending_mutations(), 0);
        assert_eq!(sync.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_waits_for_queued_intents() {
        let (sync, api, d1, _) = setup_with_latency(Duration::from_millis(500));
        sync.set_quantity("R1", &d1, 2).unwrap();
        advance(1100).await;
        sync.set_quantity("R1", &d1, 4).unwrap();

        sync.flush().await;
        let sent: Vec<u32> = api.calls().iter().map(|c| c.2).collect();
        assert_eq!(sent, vec![2, 4]);
        assert_eq!(api.server_quantity(&d1), Some(4));
        assert_eq!(sync.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unrelated_reconcile_keeps_pending_intent() {
        let (sync, api, d1, _) = setup();
        sync.set_quantity("R1", &d1, 6).unwrap();

        // e.g. the response of an add-item call made meanwhile
        let server_cart = api.cart.lock().clone();
        sync.cache().reconcile(server_cart);
        assert_eq!(sync.cache().item_quantity("R1", &d1), Some(6));

        quiet_period().await;
        assert_eq!(api.server_quantity(&d1), Some(6));
        assert_eq!(sync.cache().item_quantity("R1", &d1), Some(6));
    }
}
