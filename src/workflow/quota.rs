//! 配额统计
//!
//! 每次都从题目集合重新计算，不做增量维护

use std::collections::BTreeMap;

use crate::models::Artifact;

/// 主题序号（从0开始） -> 已有题目数
pub type TopicCounts = BTreeMap<usize, usize>;

/// 按主题统计题目数量
///
/// 按 `topic_ref - 1` 分组；没有题目的主题不出现在结果中，未归属的题目不计入
pub fn counts_from_artifacts(artifacts: &[Artifact]) -> TopicCounts {
    let mut counts = TopicCounts::new();
    for ordinal in artifacts.iter().filter_map(Artifact::topic_ordinal) {
        *counts.entry(ordinal).or_insert(0) += 1;
    }
    counts
}

/// 读取某个主题的题目数，不存在时为 0
pub fn count_for(counts: &TopicCounts, ordinal: usize) -> usize {
    counts.get(&ordinal).copied().unwrap_or(0)
}
