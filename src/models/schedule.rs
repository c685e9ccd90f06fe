//! 调度相关的数据类型

use std::fmt;

use serde::{Deserialize, Serialize};

/// 生成阶段
///
/// `idle → analyzing → topic_confirmation → ready_to_generate → generating → {ready_to_generate, completed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Analyzing,
    TopicConfirmation,
    ReadyToGenerate,
    Generating,
    Completed,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Analyzing => "analyzing",
            Phase::TopicConfirmation => "topic_confirmation",
            Phase::ReadyToGenerate => "ready_to_generate",
            Phase::Generating => "generating",
            Phase::Completed => "completed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个主题的请求题量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub topic_ordinal: usize,
    pub requested_count: usize,
}

impl BatchRequest {
    pub fn new(topic_ordinal: usize, requested_count: usize) -> Self {
        Self {
            topic_ordinal,
            requested_count,
        }
    }
}

/// 批次规划结果
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchPlan {
    pub batch: Vec<BatchRequest>,
    pub new_cursor: usize,
    pub exhausted: bool,
}

impl BatchPlan {
    /// 本批次请求的题目总数
    pub fn total_requested(&self) -> usize {
        self.batch.iter().map(|r| r.requested_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }
}

/// 发给生成服务的一项主题请求（只含名称和题量）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicQuota {
    pub topic: String,
    pub count: usize,
}
