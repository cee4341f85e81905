use anyhow::Result;
use range_transfer::utils::logging;
use range_transfer::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    // 加载配置
    let config = Config::from_env();

    // 初始化并运行应用
    let _result = App::initialize(config).await?.run().await?;

    Ok(())
}
