//! User aggregate
//!
//! Carts are embedded in the user record, so the user is the unit of
//! persistence and of contention. `version` is the optimistic concurrency
//! token checked by [`CartStorage::save_user`](super::CartStorage::save_user).

use serde::{Deserialize, Serialize};
use shared::client::UserInfo;
use shared::types::{Role, Timestamp};
use shared::util::{new_id, now_millis};
use shared::{Cart, CartStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    /// Lowercased, trimmed
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub role: Role,
    /// argon2 PHC string
    pub password_hash: String,
    #[serde(default)]
    pub carts: Vec<Cart>,
    #[serde(default)]
    pub version: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default)]
    pub last_login: Option<Timestamp>,
}

/// Normalize an email the way it is stored and indexed
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl UserRecord {
    pub fn new(
        email: &str,
        name: impl Into<String>,
        phone_number: Option<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        let now = now_millis();
        Self {
            id: new_id(),
            email: normalize_email(email),
            name: name.into(),
            phone_number,
            role: Role::User,
            password_hash: password_hash.into(),
            carts: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
            last_login: None,
        }
    }

    pub fn info(&self) -> UserInfo {
        UserInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }

    pub fn active_carts(&self) -> impl Iterator<Item = &Cart> {
        self.carts.iter().filter(|c| c.is_active())
    }

    /// Checked-out carts, newest first
    pub fn cart_history(&self) -> Vec<&Cart> {
        let mut history: Vec<&Cart> = self
            .carts
            .iter()
            .filter(|c| c.status == CartStatus::CheckedOut)
            .collect();
        history.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        history
    }

    pub fn active_cart(&self, restaurant_id: &str) -> Option<&Cart> {
        self.active_carts().find(|c| c.restaurant_id() == restaurant_id)
    }

    pub fn active_cart_index(&self, restaurant_id: &str) -> Option<usize> {
        self.carts
            .iter()
            .position(|c| c.is_active() && c.restaurant_id() == restaurant_id)
    }

    pub fn cart_index_by_id(&self, cart_id: &str) -> Option<usize> {
        self.carts.iter().position(|c| c.id == cart_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_normalized() {
        let user = UserRecord::new("  Alice@Example.COM ", "Alice", None, "hash");
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.version, 0);
        assert_eq!(user.info().role, Role::User);
    }

    #[test]
    fn active_and_history_views() {
        let mut user = UserRecord::new("a@b.c", "A", None, "hash");
        let mut old = Cart::open("R1", 1);
        old.check_out(5).unwrap();
        let mut older = Cart::open("R1", 0);
        older.check_out(2).unwrap();
        user.carts.push(older);
        user.carts.push(old);
        user.carts.push(Cart::open("R1", 6));

        assert_eq!(user.active_carts().count(), 1);
        assert_eq!(user.active_cart_index("R1"), Some(2));
        let history = user.cart_history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].updated_at, 5);
        assert!(user.active_cart("R2").is_none());
    }
}
