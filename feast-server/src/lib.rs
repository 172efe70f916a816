//! Feast Server - 多餐厅购物车服务
//!
//! # 架构概述
//!
//! - **购物车存储** (`carts::storage`): redb 持久化的用户聚合 (含购物车)
//! - **购物车变更服务** (`carts::service`): 维护不变量、重算总价、CAS 保存
//! - **菜品目录** (`catalog`): 餐厅/菜品查询协作者
//! - **认证** (`auth`): JWT + Argon2 认证体系
//! - **HTTP API** (`api`): RESTful API 接口
//!
//! # 模块结构
//!
//! ```text
//! feast-server/src/
//! ├── core/          # 配置、状态、服务器
//! ├── auth/          # JWT 认证
//! ├── carts/         # 购物车存储与变更服务
//! ├── catalog/       # 餐厅/菜品目录
//! ├── api/           # HTTP 路由和处理器
//! └── utils/         # 错误、日志、校验
//! ```

pub mod api;
pub mod auth;
pub mod carts;
pub mod catalog;
pub mod core;
pub mod utils;

// Re-export 公共类型
pub use auth::{CurrentUser, JwtService};
pub use carts::{CartService, CartStorage};
pub use core::{Config, Server, ServerState};
pub use utils::{AppError, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

// Security logging macro - 支持 tracing 格式说明符
#[macro_export]
macro_rules! security_log {
    ($level:expr, $event:expr, $($key:ident = $value:expr),*) => {
        tracing::info!(
            target: "security",
            level = $level,
            event = $event,
            $($key = $value),*
        );
    };
}

/// 准备工作目录、初始化日志
pub fn setup_environment(config: &Config) -> anyhow::Result<()> {
    std::fs::create_dir_all(&config.work_dir)?;
    init_logger_with_file(
        Some(&config.log_level),
        Some(config.log_json),
        config.log_dir.as_deref(),
    )
}
