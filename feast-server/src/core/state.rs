use std::sync::Arc;

use crate::auth::JwtService;
use crate::carts::{CartService, CartStorage};
use crate::catalog::{Catalog, StaticCatalog};
use crate::core::{Config, Result};

/// 服务器状态 - 持有所有服务的共享引用
///
/// 使用 Arc 实现浅拷贝，每个请求克隆一份。
///
/// | 字段 | 类型 | 说明 |
/// |------|------|------|
/// | config | Config | 配置项 (不可变) |
/// | storage | CartStorage | redb 用户/购物车存储 |
/// | catalog | Arc<dyn Catalog> | 餐厅/菜品目录 |
/// | carts | CartService | 购物车变更服务 |
/// | jwt_service | Arc<JwtService> | JWT 认证服务 |
#[derive(Clone, Debug)]
pub struct ServerState {
    /// 服务器配置
    pub config: Config,
    /// 用户与购物车存储
    pub storage: CartStorage,
    /// 菜品目录
    pub catalog: Arc<dyn Catalog>,
    /// 购物车变更服务
    pub carts: CartService,
    /// JWT 认证服务 (Arc 共享所有权)
    pub jwt_service: Arc<JwtService>,
}

impl ServerState {
    /// 创建服务器状态 (手动构造)
    ///
    /// 通常使用 [`initialize()`](Self::initialize) 方法代替
    pub fn new(
        config: Config,
        storage: CartStorage,
        catalog: Arc<dyn Catalog>,
        jwt_service: Arc<JwtService>,
    ) -> Self {
        let carts = CartService::new(storage.clone(), catalog.clone())
            .with_max_retries(config.cart_max_retries);
        Self {
            config,
            storage,
            catalog,
            carts,
            jwt_service,
        }
    }

    /// 初始化服务器状态
    ///
    /// 按顺序初始化：
    /// 1. 工作目录
    /// 2. 数据库 (work_dir/feast.redb)
    /// 3. 菜品目录 (CATALOG_SEED_PATH)
    /// 4. JWT 服务
    pub fn initialize(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(&config.work_dir)?;

        let db_path = config.database_path();
        let storage = CartStorage::open(&db_path)?;
        tracing::info!(path = %db_path.display(), "Cart storage opened");

        let catalog: Arc<dyn Catalog> =
            Arc::new(StaticCatalog::from_config(config.catalog_seed_path.as_deref())?);
        let jwt_service = Arc::new(JwtService::with_config(config.jwt.clone()));

        Ok(Self::new(config.clone(), storage, catalog, jwt_service))
    }

    /// 获取 JWT 服务
    pub fn get_jwt_service(&self) -> Arc<JwtService> {
        self.jwt_service.clone()
    }
}
