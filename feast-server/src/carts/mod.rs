//! 购物车模块
//!
//! - [`CartStorage`] - redb 存储 (用户聚合，内嵌购物车)
//! - [`CartService`] - 购物车变更服务 (CAS 重试)
//! - [`UserRecord`] - 用户聚合

pub mod service;
pub mod storage;
pub mod user;

pub use service::{CartService, DEFAULT_MAX_RETRIES, MutationError, MutationResult};
pub use storage::{CartStorage, StorageError, StorageResult};
pub use user::{UserRecord, normalize_email};
