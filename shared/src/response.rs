//! API Response types
//!
//! Success bodies carry `success: true`; failures use [`ErrorBody`]:
//!
//! ```json
//! { "success": false, "error": "Cart not found", "code": "not_found" }
//! ```

use serde::{Deserialize, Serialize};

use crate::cart::Cart;

/// Single cart response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartResponse {
    pub success: bool,
    pub cart: Cart,
}

impl CartResponse {
    pub fn ok(cart: Cart) -> Self {
        Self {
            success: true,
            cart,
        }
    }
}

/// Cart list response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartsResponse {
    pub success: bool,
    pub carts: Vec<Cart>,
}

impl CartsResponse {
    pub fn ok(carts: Vec<Cart>) -> Self {
        Self {
            success: true,
            carts,
        }
    }
}

/// Plain acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Error response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub success: bool,
    pub error: String,
    /// Machine-readable error kind (`not_found`, `conflict`, ...)
    #[serde(default)]
    pub code: String,
}

impl ErrorBody {
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            code: code.into(),
        }
    }
}
