//! Cart API seam
//!
//! [`CartSession`](crate::CartSession) and
//! [`QuantitySynchronizer`](crate::QuantitySynchronizer) talk to the server
//! only through this trait; [`HttpClient`](crate::HttpClient) is the network
//! implementation.

use async_trait::async_trait;
use shared::{AddItemRequest, Cart};

use crate::ClientResult;

#[async_trait]
pub trait CartApi: Send + Sync {
    /// Active carts of the current user
    async fn list_carts(&self) -> ClientResult<Vec<Cart>>;

    async fn add_item(&self, restaurant_id: &str, req: &AddItemRequest) -> ClientResult<Cart>;

    /// Set the absolute quantity of a cart line
    async fn update_quantity(
        &self,
        restaurant_id: &str,
        item_id: &str,
        quantity: u32,
    ) -> ClientResult<Cart>;

    async fn remove_item(&self, restaurant_id: &str, item_id: &str) -> ClientResult<Cart>;

    async fn clear_cart(&self, restaurant_id: &str) -> ClientResult<Cart>;

    async fn checkout(&self, restaurant_id: &str) -> ClientResult<Cart>;
}
