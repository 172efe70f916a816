//! Feast Client - HTTP client and local cart state for the Feast server
//!
//! - [`HttpClient`]: typed calls against `/api/v1`
//! - [`CartCache`] / [`CartSession`]: optimistic local cart state
//! - [`QuantitySynchronizer`]: debounced quantity updates

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod sync;

pub use api::CartApi;
pub use cache::{CacheSnapshot, CartCache, CartSession, MutationId};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use http::HttpClient;
pub use sync::QuantitySynchronizer;

// Re-export shared types for convenience
pub use shared::client::{CurrentUserResponse, LoginResponse, RegisterRequest, UserInfo};
pub use shared::{AddItemRequest, Cart, CartItem};
