//! 餐厅/菜品目录
//!
//! The cart service consults the catalog to validate `(restaurant, dish)`
//! pairs on add and to populate restaurant names on responses. Catalog
//! management is not part of this server: the catalog is either *open*
//! (accepts every pair, knows no names) or loaded from a JSON seed file:
//!
//! ```json
//! { "restaurants": [
//!     { "id": "r1", "name": "Pizza Place",
//!       "dishes": [ { "id": "d1", "name": "Margherita", "price": 9.5 } ] }
//! ] }
//! ```

use std::collections::HashMap;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use shared::Cart;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Restaurant {0} not found")]
    RestaurantNotFound(String),

    #[error("Dish {dish} not found in restaurant {restaurant}")]
    DishNotFound { restaurant: String, dish: String },

    #[error("Failed to read catalog seed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid catalog seed: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Catalog lookup used by the cart service
pub trait Catalog: Send + Sync + std::fmt::Debug {
    /// Display name of a restaurant, if known
    fn restaurant_name(&self, restaurant_id: &str) -> Option<String>;

    /// Check that a dish can be ordered from a restaurant
    fn check_dish(&self, restaurant_id: &str, dish_id: &str) -> Result<(), CatalogError>;

    /// Resolve the restaurant reference of a cart ("populate")
    fn populate(&self, mut cart: Cart) -> Cart {
        cart.restaurant.name = self.restaurant_name(cart.restaurant_id());
        cart
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DishEntry {
    pub id: String,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestaurantEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub dishes: Vec<DishEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub restaurants: Vec<RestaurantEntry>,
}

/// In-memory catalog
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    /// None = open catalog
    restaurants: Option<HashMap<String, RestaurantEntry>>,
}

impl StaticCatalog {
    /// Catalog that accepts every dish and knows no restaurant names
    pub fn open() -> Self {
        Self { restaurants: None }
    }

    pub fn from_seed(seed: CatalogSeed) -> Self {
        let restaurants = seed
            .restaurants
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect();
        Self {
            restaurants: Some(restaurants),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path)?;
        let seed: CatalogSeed = serde_json::from_str(&raw)?;
        Ok(Self::from_seed(seed))
    }

    /// Seed file when configured, open catalog otherwise
    pub fn from_config(seed_path: Option<&str>) -> Result<Self, CatalogError> {
        match seed_path {
            Some(path) => {
                let catalog = Self::load(path)?;
                tracing::info!(path, restaurants = catalog.len(), "Catalog seed loaded");
                Ok(catalog)
            }
            None => {
                tracing::warn!("CATALOG_SEED_PATH not set, catalog accepts every dish");
                Ok(Self::open())
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.restaurants.is_none()
    }

    pub fn len(&self) -> usize {
        self.restaurants.as_ref().map(HashMap::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dish(&self, restaurant_id: &str, dish_id: &str) -> Option<&DishEntry> {
        self.restaurants
            .as_ref()?
            .get(restaurant_id)?
            .dishes
            .iter()
            .find(|d| d.id == dish_id)
    }
}

impl Catalog for StaticCatalog {
    fn restaurant_name(&self, restaurant_id: &str) -> Option<String> {
        self.restaurants
            .as_ref()?
            .get(restaurant_id)
            .map(|r| r.name.clone())
    }

    fn check_dish(&self, restaurant_id: &str, dish_id: &str) -> Result<(), CatalogError> {
        let Some(restaurants) = &self.restaurants else {
            return Ok(());
        };
        let restaurant = restaurants
            .get(restaurant_id)
            .ok_or_else(|| CatalogError::RestaurantNotFound(restaurant_id.to_string()))?;
        if !restaurant.dishes.iter().any(|d| d.id == dish_id) {
            return Err(CatalogError::DishNotFound {
                restaurant: restaurant_id.to_string(),
                dish: dish_id.to_string(),
            });
        }
        Ok(())
    }
}
