use anyhow::Result;
use wizard_autofill::utils::logging;
use wizard_autofill::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置（命令行参数：[数据文件] [附件]）
    let config = Config::from_env().with_inputs(std::env::args().skip(1));

    // 初始化日志
    logging::init(config.verbose_logging);

    // 初始化并运行应用
    let stats = App::initialize(config).await?.run().await?;
    if stats.failed > 0 {
        tracing::warn!("⚠️ 有 {} 条记录未能完成", stats.failed);
    }

    Ok(())
}
