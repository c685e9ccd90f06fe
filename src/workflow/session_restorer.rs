//! 会话恢复
//!
//! 从导出的题目集合和新检测的主题注册表重建配额统计和游标

use serde_json::Value as JsonValue;
use tracing::{info, warn};

use crate::error::RestoreError;
use crate::models::{Artifact, TopicRegistry};
use crate::workflow::quota::{count_for, counts_from_artifacts, TopicCounts};

/// 恢复结果
#[derive(Debug, Clone, PartialEq)]
pub struct RestoredSession {
    pub artifacts: Vec<Artifact>,
    pub counts: TopicCounts,
    pub cursor: usize,
}

/// 恢复会话
///
/// 游标规则：按序扫描主题，有题目（>0）的视为已完成，停在第一个没有题目的主题；
/// 全部都有题目时停在最后一个主题。部分完成的主题（0 < 数量 < 目标）同样视为已完成，
/// 只记录警告。
///
/// # 参数
/// - `persisted`: 会话文件内容，必须是数组
/// - `registry`: 重新检测得到的主题注册表
/// - `target_count`: 每个主题的目标题量
pub fn restore(
    persisted: &JsonValue,
    registry: &TopicRegistry,
    target_count: usize,
) -> Result<RestoredSession, RestoreError> {
    let records = persisted.as_array().ok_or_else(|| RestoreError::NotAnArray {
        found: json_kind(persisted).to_string(),
    })?;

    if registry.is_empty() {
        return Err(RestoreError::EmptyRegistry);
    }

    let artifacts = records
        .iter()
        .enumerate()
        .map(|(index, record)| parse_record(index, record))
        .collect::<Result<Vec<_>, _>>()?;

    let counts = counts_from_artifacts(&artifacts);

    let orphaned = artifacts
        .iter()
        .filter(|a| a.topic_ordinal().map_or(true, |o| o >= registry.len()))
        .count();
    if orphaned > 0 {
        warn!(
            "⚠️ {} 道题无法对应到当前 {} 个主题中的任何一个",
            orphaned,
            registry.len()
        );
    }

    let cursor = resume_cursor(registry, &counts);

    let partial = registry
        .ordinals()
        .filter(|&o| {
            let c = count_for(&counts, o);
            c > 0 && c < target_count
        })
        .count();
    if partial > 0 {
        warn!(
            "⚠️ {} 个主题只完成了一部分（少于 {} 题），恢复后不会再补齐",
            partial, target_count
        );
    }

    info!(
        "✓ 已恢复 {} 道题，从第 {} 个主题继续",
        artifacts.len(),
        cursor + 1
    );

    Ok(RestoredSession {
        artifacts,
        counts,
        cursor,
    })
}

/// 计算恢复游标
pub fn resume_cursor(registry: &TopicRegistry, counts: &TopicCounts) -> usize {
    let last = registry.len().saturating_sub(1);
    registry
        .ordinals()
        .find(|&ordinal| count_for(counts, ordinal) == 0)
        .unwrap_or(last)
}

fn parse_record(index: usize, record: &JsonValue) -> Result<Artifact, RestoreError> {
    if !record.is_object() {
        return Err(RestoreError::InvalidRecord {
            index,
            reason: format!("应为对象，实际为 {}", json_kind(record)),
        });
    }
    serde_json::from_value(record.clone()).map_err(|e| RestoreError::InvalidRecord {
        index,
        reason: e.to_string(),
    })
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
