use tracing::info;
/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use tracing_subscriber::EnvFilter;

use crate::models::{BatchRequest, TopicRegistry};

/// 初始化日志
///
/// 默认级别 `info`（详细模式为 `debug`），`RUST_LOG` 优先
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
///
/// # 参数
/// - `model`: 使用的模型
/// - `target_count`: 每个主题的目标题量
/// - `per_call_budget`: 单次调用的题量上限
pub fn log_startup(model: &str, target_count: usize, per_call_budget: usize) {
    info!("{}", "=".repeat(60));
    info!(
        "🚀 程序启动 - {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("🤖 模型: {}", model);
    info!(
        "📊 每个主题 {} 道题，单次最多请求 {} 道",
        target_count, per_call_budget
    );
    info!("{}", "=".repeat(60));
}

/// 记录主题加载信息
pub fn log_topics_loaded(registry: &TopicRegistry) {
    info!("✓ 共 {} 个主题", registry.len());
    for topic in registry.iter() {
        info!("   {:>3}. {}", topic.ordinal + 1, truncate_text(&topic.label, 70));
    }
}

/// 记录批次开始信息
///
/// # 参数
/// - `batch_num`: 批次编号
/// - `batch`: 本批次请求
/// - `registry`: 主题注册表（用于显示名称）
pub fn log_batch_start(batch_num: usize, batch: &[BatchRequest], registry: &TopicRegistry) {
    let requested: usize = batch.iter().map(|r| r.requested_count).sum();
    info!("\n{}", "=".repeat(60));
    info!(
        "📦 第 {} 批: {} 个主题，共 {} 道题",
        batch_num,
        batch.len(),
        requested
    );
    for request in batch {
        if let Ok(topic) = registry.get(request.topic_ordinal) {
            info!(
                "   → {} ×{}",
                truncate_text(&topic.label, 60),
                request.requested_count
            );
        }
    }
    info!("{}", "=".repeat(60));
}

/// 记录批次完成信息
///
/// # 参数
/// - `batch_num`: 批次编号
/// - `received`: 实际收到的题数
/// - `requested`: 请求的题数
pub fn log_batch_complete(batch_num: usize, received: usize, requested: usize) {
    info!("\n{}", "─".repeat(60));
    info!("✓ 第 {} 批完成: 收到 {}/{}", batch_num, received, requested);
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `artifacts`: 题目总数
/// - `batches`: 调用次数
/// - `completed`: 是否全部完成
/// - `export_path`: 导出文件路径
pub fn print_final_stats(artifacts: usize, batches: usize, completed: bool, export_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 生成结束统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 题目总数: {}", artifacts);
    info!("📦 调用次数: {}", batches);
    if completed {
        info!("🏁 所有主题均已完成");
    } else {
        info!("⏸️ 未全部完成，可用导出文件恢复后继续");
    }
    info!("{}", "=".repeat(60));
    info!("\n题目已导出至: {}", export_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
