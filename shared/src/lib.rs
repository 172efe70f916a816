//! Shared types for the Feast cart subsystem
//!
//! Domain types used by both `feast-server` and `feast-client`: carts and
//! their arithmetic, money helpers, and the JSON request/response shapes of
//! the cart API. The cart arithmetic lives here so that an optimistic client
//! mutation and the authoritative server mutation run the same code.

pub mod cart;
pub mod client;
pub mod money;
pub mod request;
pub mod response;
pub mod types;
pub mod util;

// Re-exports
pub use cart::{Cart, CartError, CartItem, CartStatus, NewCartItem, RestaurantRef};
pub use request::{AddItemRequest, UpdateQuantityRequest};
pub use response::{CartResponse, CartsResponse, ErrorBody};
pub use serde::{Deserialize, Serialize};
