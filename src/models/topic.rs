use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

/// 主题检测的默认建议题量
pub const DEFAULT_SUGGESTED_COUNT: usize = 10;

fn default_suggested_count() -> usize {
    DEFAULT_SUGGESTED_COUNT
}

/// 主题检测 / 主题索引文件中的一条记录
///
/// 字段名与导出的索引文件保持一致：`{ "topic": "...", "count": 10 }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicEntry {
    pub topic: String,
    #[serde(default = "default_suggested_count")]
    pub count: usize,
}

impl TopicEntry {
    pub fn new(topic: impl Into<String>, count: usize) -> Self {
        Self {
            topic: topic.into(),
            count,
        }
    }
}

/// 主题
///
/// 加载后不可变，`ordinal` 是其在注册表中的位置（从0开始）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub label: String,
    pub target_count: usize,
    pub ordinal: usize,
}

/// 主题注册表
///
/// 只能整体替换，不提供修改接口。重新检测或重新加载索引都会生成新的注册表。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicRegistry {
    topics: Vec<Topic>,
}

impl TopicRegistry {
    /// 从检测结果构建注册表，按顺序分配序号
    pub fn load(entries: Vec<TopicEntry>) -> Self {
        let topics = entries
            .into_iter()
            .enumerate()
            .map(|(ordinal, entry)| Topic {
                label: entry.topic,
                target_count: entry.count,
                ordinal,
            })
            .collect();
        Self { topics }
    }

    /// 按序号获取主题
    pub fn get(&self, ordinal: usize) -> Result<&Topic, SchedulerError> {
        self.topics
            .get(ordinal)
            .ok_or(SchedulerError::TopicOutOfRange {
                ordinal,
                len: self.topics.len(),
            })
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Topic> {
        self.topics.iter()
    }

    pub fn ordinals(&self) -> std::ops::Range<usize> {
        0..self.topics.len()
    }

    /// 转回索引文件格式
    pub fn to_entries(&self) -> Vec<TopicEntry> {
        self.topics
            .iter()
            .map(|t| TopicEntry::new(t.label.clone(), t.target_count))
            .collect()
    }
}
