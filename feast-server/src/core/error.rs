use thiserror::Error;

use crate::auth::JwtError;
use crate::carts::StorageError;
use crate::catalog::CatalogError;

/// 启动与运行期错误 (非请求级)
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("存储初始化失败: {0}")]
    Storage(#[from] StorageError),

    #[error("目录加载失败: {0}")]
    Catalog(#[from] CatalogError),

    #[error("认证配置错误: {0}")]
    Jwt(#[from] JwtError),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("内部服务器错误")]
    Internal(#[from] anyhow::Error),
}

/// 启动流程的 Result 类型别名
pub type Result<T> = std::result::Result<T, ServerError>;
