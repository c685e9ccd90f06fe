//! # Exam Question Gen
//!
//! 把长文档按主题分批交给模型，生成选择题，并能从导出文件恢复进度
//!
//! ## 架构设计
//!
//! 本系统采用四层架构：
//!
//! ### ① 数据层（Models）
//! - `models/` - 主题、题目、批次请求、出题参数
//! - `models/loaders/` - 主题索引和会话文件的读写
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，不做流程决策
//! - `LlmService` - 调用模型
//! - `QuestionGenerator` / `LlmQuestionGenerator` - 按 `{主题, 题量}` 出题
//! - `TopicDetector` - 主题检测
//! - `DocumentExtractor` - 文档提取
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 纯函数调度核心
//! - `plan_next_batch` - 批次规划
//! - `remap` - 相对序号重映射
//! - `counts_from_artifacts` - 配额统计
//! - `restore` - 会话恢复
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/coordinator` - 阶段状态机、单飞调用、取消
//! - `orchestrator/auto_runner` - 自动运行
//!
//! ## 模块结构

pub mod app;
pub mod config;
pub mod error;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use app::App;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{Artifact, Phase, Topic, TopicEntry, TopicRegistry};
pub use orchestrator::{AutoRunner, BatchOutcome, GenerationCoordinator, GenerationSettings};
pub use services::{GenerationRequest, QuestionGenerator};
