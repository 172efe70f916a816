/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate a random resource id (UUID v4, hyphenated).
///
/// Used for user, cart and cart item identities.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
