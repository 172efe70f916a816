//! Request bodies of the cart API

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cart::NewCartItem;

/// `POST /api/v1/carts/{restaurant_id}/items`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub menu_item_id: String,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub quantity: u32,
}

impl From<AddItemRequest> for NewCartItem {
    fn from(req: AddItemRequest) -> Self {
        Self {
            menu_item_id: req.menu_item_id,
            name: req.name,
            price: req.price,
            quantity: req.quantity,
        }
    }
}

/// `PUT /api/v1/carts/{restaurant_id}/items/{item_id}`
///
/// The quantity is absolute, not a delta.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateQuantityRequest {
    pub quantity: u32,
}
