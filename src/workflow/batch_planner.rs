//! 批次规划
//!
//! 从游标开始单向扫描主题，在单次调用的题量预算内尽量多装主题。
//! 纯函数：相同输入总是得到相同输出。

use std::collections::BTreeSet;

use crate::models::{BatchPlan, BatchRequest, TopicRegistry};
use crate::workflow::quota::{count_for, TopicCounts};

/// 计算下一个批次
///
/// # 参数
/// - `registry`: 主题注册表
/// - `selection`: 本次需要覆盖的主题序号
/// - `counts`: 各主题已有题目数
/// - `cursor`: 下一个要考虑的主题序号
/// - `per_call_budget`: 单次调用最多请求的题目数（小于1时按1处理）
/// - `target_count`: 每个主题的目标题量
///
/// # 返回
/// 本批次请求、新的游标，以及扫描是否已到达注册表末尾
pub fn plan_next_batch(
    registry: &TopicRegistry,
    selection: &BTreeSet<usize>,
    counts: &TopicCounts,
    cursor: usize,
    per_call_budget: usize,
    target_count: usize,
) -> BatchPlan {
    let budget = per_call_budget.max(1);
    let total = registry.len();
    let mut batch: Vec<BatchRequest> = Vec::new();
    let mut used = 0;
    let mut cursor = cursor;

    while cursor < total {
        if !selection.contains(&cursor) {
            cursor += 1;
            continue;
        }

        let needed = target_count.saturating_sub(count_for(counts, cursor));
        if needed == 0 {
            cursor += 1;
            continue;
        }

        let remaining = budget - used;
        if needed <= remaining {
            batch.push(BatchRequest::new(cursor, needed));
            used += needed;
            cursor += 1;
            if remaining == needed {
                break;
            }
        } else if !batch.is_empty() {
            // 放不下，留到下一次完整请求
            break;
        } else {
            // 单个主题就超出预算：截断到预算，保证每次都有进展
            batch.push(BatchRequest::new(cursor, remaining));
            cursor += 1;
            break;
        }
    }

    BatchPlan {
        batch,
        new_cursor: cursor,
        exhausted: cursor >= total,
    }
}
