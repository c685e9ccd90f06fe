//! 结果重映射
//!
//! 生成服务只看到本批次的短列表，返回的 `epigrafe` 是批次内相对序号（1..K）。
//! 这里把它换算回主题序号（从1开始）。以序号字段为准，不依赖返回顺序。

use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::models::{Artifact, BatchRequest, RawArtifact};

/// 相对序号换算成主题引用，超出范围时返回 None
fn resolve(relative_ordinal: usize, batch: &[BatchRequest]) -> Option<usize> {
    relative_ordinal
        .checked_sub(1)
        .and_then(|i| batch.get(i))
        .map(|request| request.topic_ordinal + 1)
}

/// 重映射题目的主题引用
///
/// 相对序号超出 `1..=batch.len()` 时保留原值并记录警告
pub fn remap(raw: Vec<RawArtifact>, batch: &[BatchRequest]) -> Vec<Artifact> {
    let mut unmapped = 0;
    let artifacts: Vec<Artifact> = raw
        .into_iter()
        .map(|item| match resolve(item.relative_ordinal, batch) {
            Some(topic_ref) => item.into_artifact(topic_ref),
            None => {
                unmapped += 1;
                let passthrough = item.relative_ordinal;
                item.into_artifact(passthrough)
            }
        })
        .collect();

    if unmapped > 0 {
        warn!(
            "⚠️ {} 道题的相对序号超出批次范围 [1, {}]，保留原始序号",
            unmapped,
            batch.len()
        );
    }

    artifacts
}

/// 严格模式的重映射
///
/// 任何一道题的相对序号超出范围都视为响应格式错误，整批丢弃
pub fn remap_strict(raw: Vec<RawArtifact>, batch: &[BatchRequest]) -> AppResult<Vec<Artifact>> {
    raw.into_iter()
        .enumerate()
        .map(|(index, item)| match resolve(item.relative_ordinal, batch) {
            Some(topic_ref) => Ok(item.into_artifact(topic_ref)),
            None => Err(AppError::malformed(format!(
                "第 {} 道题的相对序号 {} 超出批次范围 [1, {}]",
                index + 1,
                item.relative_ordinal,
                batch.len()
            ))),
        })
        .collect()
}
