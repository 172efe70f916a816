use feast_server::{Config, Server, ServerState, setup_environment};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. 加载 .env 与配置
    dotenv::dotenv().ok();
    let config = Config::from_env()?;

    // 2. 设置环境 (工作目录, 日志)
    setup_environment(&config)?;

    tracing::info!("🍜 Feast server starting...");

    // 3. 初始化服务器状态 (数据库、目录、JWT)
    let state = ServerState::initialize(&config)?;

    // 4. 启动 HTTP 服务器
    let server = Server::with_state(config, state);

    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
