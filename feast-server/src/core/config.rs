use std::path::PathBuf;

use crate::auth::JwtConfig;
use crate::core::Result;

/// 服务器配置
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | ./data | 工作目录 (数据库文件) |
/// | HTTP_HOST | 0.0.0.0 | 监听地址 |
/// | HTTP_PORT | 3000 | HTTP 服务端口 |
/// | ENVIRONMENT | development | 运行环境 |
/// | REQUEST_TIMEOUT_MS | 30000 | 请求超时(毫秒) |
/// | SHUTDOWN_TIMEOUT_MS | 10000 | 关闭超时(毫秒) |
/// | CART_MAX_RETRIES | 5 | 版本冲突时的最大重试次数 |
/// | CATALOG_SEED_PATH | - | 菜品目录 JSON 种子文件 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_JSON | false | JSON 格式日志 |
/// | LOG_DIR | - | 日志文件目录 (按天滚动) |
/// | JWT_SECRET | 开发环境自动生成 | HS256 密钥 (≥32 字符，生产环境必填) |
/// | JWT_EXPIRATION_MINUTES | 10080 | 令牌有效期 |
/// | JWT_ISSUER / JWT_AUDIENCE | feast-server / feast-clients | 令牌签发者 / 受众 |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/feast HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储数据库文件
    pub work_dir: String,
    /// 监听地址
    pub http_host: String,
    /// HTTP API 服务端口
    pub http_port: u16,
    /// JWT 认证配置
    pub jwt: JwtConfig,
    /// 运行环境: development | staging | production
    pub environment: String,
    /// 请求超时时间 (毫秒)
    pub request_timeout_ms: u64,
    /// 关闭超时时间 (毫秒)
    pub shutdown_timeout_ms: u64,
    /// 购物车保存遇到版本冲突时的重试次数
    pub cart_max_retries: u32,
    /// 菜品目录种子文件；未配置时目录为开放模式
    pub catalog_seed_path: Option<String>,
    pub log_level: String,
    pub log_json: bool,
    pub log_dir: Option<String>,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值。生产环境缺少 `JWT_SECRET` 时报错。
    pub fn from_env() -> Result<Self> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());
        let jwt = JwtConfig::from_env(environment == "production")?;
        Ok(Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "./data".into()),
            http_host: std::env::var("HTTP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            http_port: env_parse("HTTP_PORT", 3000),
            jwt,
            environment,
            request_timeout_ms: env_parse("REQUEST_TIMEOUT_MS", 30000),
            shutdown_timeout_ms: env_parse("SHUTDOWN_TIMEOUT_MS", 10000),
            cart_max_retries: env_parse("CART_MAX_RETRIES", 5),
            catalog_seed_path: std::env::var("CATALOG_SEED_PATH").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_json: env_parse("LOG_JSON", false),
            log_dir: std::env::var("LOG_DIR").ok(),
        })
    }

    /// 使用自定义值覆盖部分配置
    ///
    /// 常用于测试场景
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Result<Self> {
        let mut config = Self::from_env()?;
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        Ok(config)
    }

    /// 数据库文件路径
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("feast.redb")
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 是否开发环境
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_and_paths() {
        let config = Config::with_overrides("/tmp/feast-test", 0).unwrap();
        assert_eq!(config.work_dir, "/tmp/feast-test");
        assert_eq!(config.http_port, 0);
        assert!(config.database_path().ends_with("feast.redb"));
        assert!(config.jwt.secret.len() >= crate::auth::jwt::MIN_SECRET_LEN);
    }
}
