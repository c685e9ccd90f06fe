//! 主题检测 - 业务能力层
//!
//! 先用正则扫描文档开头的目录，找不到再请模型提取

use regex::Regex;
use tracing::{info, warn};

use crate::error::AppResult;
use crate::models::topic::{TopicEntry, DEFAULT_SUGGESTED_COUNT};
use crate::services::llm_service::LlmService;
use crate::services::response_parser::parse_json_array;
use crate::utils::text::excerpt;

/// 正则扫描的范围
const INDEX_SCAN_CHARS: usize = 20_000;
/// AI 回退时发送的字符数
const AI_FALLBACK_CHARS: usize = 30_000;
/// AI 结构化目录发送的字符数
const AI_INDEX_CHARS: usize = 50_000;
/// 兜底主题的建议题量
const GENERAL_TOPIC_COUNT: usize = 15;

const EXTRACTOR_SYSTEM_MESSAGE: &str =
    "You are a precise JSON extractor. Output valid JSON only.";

/// 编号 + 标题，标题截止到下一个数字或换行
const HEADING_PATTERN: &str = r"(\d+(?:\.\d+)*\.?)\s+([^0-9\n\r]+)";

/// 扫描编号标题（`1.`、`2.3` 等），标题长度限制在 4..150 个字符
///
/// 标题之后（跳过空白）必须紧跟下一个编号或文本结尾，否则视为正文
pub fn scan_index(text: &str) -> Vec<TopicEntry> {
    let segment = excerpt(text, INDEX_SCAN_CHARS);
    let Ok(re) = Regex::new(HEADING_PATTERN) else {
        return Vec::new();
    };

    re.captures_iter(&segment)
        .filter_map(|caps| {
            let rest = &segment[caps.get(0)?.end()..];
            if !ends_heading(rest) {
                return None;
            }
            let number = caps.get(1)?.as_str().trim();
            let title = caps.get(2)?.as_str().trim();
            let len = title.chars().count();
            (len > 3 && len < 150)
                .then(|| TopicEntry::new(format!("{} {}", number, title), DEFAULT_SUGGESTED_COUNT))
        })
        .collect()
}

fn ends_heading(rest: &str) -> bool {
    rest.trim_start()
        .chars()
        .next()
        .map_or(true, |c| c.is_ascii_digit())
}

/// 主题检测服务
pub struct TopicDetector {
    llm: LlmService,
}

impl TopicDetector {
    /// 创建主题检测服务，提取目录时使用 0 温度
    pub fn new(llm: LlmService) -> Self {
        Self {
            llm: llm.with_temperature(0.0),
        }
    }

    /// 检测主题
    ///
    /// 正则 → AI 提取 → 单个"General Content"主题，依次回退，不会失败
    pub async fn detect(&self, text: &str) -> Vec<TopicEntry> {
        let topics = scan_index(text);
        if !topics.is_empty() {
            info!("✓ 正则识别到 {} 个主题", topics.len());
            return topics;
        }

        info!("🤖 正则未找到目录，使用 AI 提取...");
        let prompt = format!(
            "Extract the table of contents of this text.\n\
             Return ONLY a JSON array like [{{ \"topic\": \"1. Introduction\", \"count\": 10 }}].\n\
             Text: {}",
            excerpt(text, AI_FALLBACK_CHARS)
        );

        match self.ask_for_topics(&prompt).await {
            Ok(topics) if !topics.is_empty() => topics,
            Ok(_) => {
                warn!("⚠️ AI 未返回任何主题，使用通用主题");
                vec![general_topic()]
            }
            Err(e) => {
                warn!("⚠️ AI 提取目录失败: {}，使用通用主题", e);
                vec![general_topic()]
            }
        }
    }

    /// 让模型基于全文生成结构化目录
    ///
    /// 与 [`detect`](Self::detect) 不同，失败时直接返回错误
    pub async fn ai_index(&self, text: &str) -> AppResult<Vec<TopicEntry>> {
        info!("🤖 AI 正在生成结构化目录...");
        let prompt = format!(
            "Create a deep structural index (table of contents) for this text.\n\
             Return ONLY a JSON array like [{{ \"topic\": \"1. Title\", \"count\": 10 }}].\n\
             Text: {}",
            excerpt(text, AI_INDEX_CHARS)
        );
        self.ask_for_topics(&prompt).await
    }

    async fn ask_for_topics(&self, prompt: &str) -> AppResult<Vec<TopicEntry>> {
        let response = self
            .llm
            .send_to_llm(prompt, Some(EXTRACTOR_SYSTEM_MESSAGE))
            .await?;
        parse_json_array(&response)
    }
}

fn general_topic() -> TopicEntry {
    TopicEntry::new("General Content", GENERAL_TOPIC_COUNT)
}
