//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层持有调度状态并控制并发，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `coordinator` - 生成协调器
//! - 阶段状态机（idle → analyzing → topic_confirmation → ready_to_generate → generating → completed）
//! - 持有主题注册表、选择集、游标、题目集合
//! - 单飞：一次只有一个出题调用
//! - 取消令牌：`stop()` 后迟到的结果被丢弃
//!
//! ### `auto_runner` - 自动运行
//! - 订阅协调器状态变化，满足条件时延时触发下一批
//! - 状态在延时期间变化则放弃本次触发
//!
//! ## 层次关系
//!
//! ```text
//! app (命令行驱动)
//!     ↓
//! orchestrator (GenerationCoordinator / AutoRunner)
//!     ↓
//! workflow (batch_planner / remapper / quota / session_restorer)
//!     ↓
//! services (能力层：llm / 出题 / 主题检测 / 文档提取)
//! ```

pub mod auto_runner;
pub mod coordinator;

// 重新导出主要类型
pub use auto_runner::AutoRunner;
pub use coordinator::{
    BatchOutcome, GenerationCoordinator, GenerationSettings, RestoreSummary, SchedulerSnapshot,
    TopicProgress,
};
