use anyhow::Result;
use exam_question_gen::utils::logging;
use exam_question_gen::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    let verbose = std::env::var("VERBOSE_LOGGING").is_ok_and(|v| v.trim() == "true");
    logging::init(verbose);

    // 加载配置
    let config = Config::from_env();

    // 初始化并运行应用
    App::initialize(config).await?.run().await?;

    Ok(())
}
