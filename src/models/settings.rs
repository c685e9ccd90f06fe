use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 出题策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStrategy {
    /// 每个主题 1 道
    Fast,
    /// 每个主题 3 道
    Medium,
    /// 每个主题 20 道
    Complete,
    /// 每个主题 10 道
    Custom,
}

impl GenerationStrategy {
    /// 每个主题的目标题量
    pub fn target_count(self) -> usize {
        match self {
            GenerationStrategy::Fast => 1,
            GenerationStrategy::Medium => 3,
            GenerationStrategy::Complete => 20,
            GenerationStrategy::Custom => 10,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GenerationStrategy::Fast => "fast",
            GenerationStrategy::Medium => "medium",
            GenerationStrategy::Complete => "complete",
            GenerationStrategy::Custom => "custom",
        }
    }
}

impl Default for GenerationStrategy {
    fn default() -> Self {
        GenerationStrategy::Medium
    }
}

impl FromStr for GenerationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(GenerationStrategy::Fast),
            "medium" => Ok(GenerationStrategy::Medium),
            "complete" => Ok(GenerationStrategy::Complete),
            "custom" => Ok(GenerationStrategy::Custom),
            other => Err(format!("未知的出题策略: {}", other)),
        }
    }
}

impl fmt::Display for GenerationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} 题/主题)", self.name(), self.target_count())
    }
}

/// 题目输出语言
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputLanguage {
    Spanish,
    English,
    /// 保持文档原语言
    Original,
}

impl OutputLanguage {
    /// 写进提示词的语言描述
    pub fn prompt_name(self) -> &'static str {
        match self {
            OutputLanguage::Spanish => "Spanish",
            OutputLanguage::English => "English",
            OutputLanguage::Original => "the same language as the source text",
        }
    }
}

impl Default for OutputLanguage {
    fn default() -> Self {
        OutputLanguage::Spanish
    }
}

impl FromStr for OutputLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spanish" | "es" => Ok(OutputLanguage::Spanish),
            "english" | "en" => Ok(OutputLanguage::English),
            "original" => Ok(OutputLanguage::Original),
            other => Err(format!("未知的输出语言: {}", other)),
        }
    }
}
