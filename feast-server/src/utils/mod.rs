//! 工具模块 - 错误、日志、校验

pub mod error;
pub mod logger;
pub mod result;
pub mod validation;

pub use error::AppError;
pub use result::AppResult;
