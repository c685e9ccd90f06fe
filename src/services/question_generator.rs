//! 出题能力 - 业务能力层
//!
//! 对外部生成能力的抽象：给定原文片段和本批次的 `{主题, 题量}` 列表，返回带相对序号的题目

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::AppResult;
use crate::models::{OutputLanguage, RawArtifact, TopicQuota, OPTION_ARITY};
use crate::services::llm_service::LlmService;
use crate::services::response_parser::parse_artifacts;

/// 一次出题请求
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// 本批次的主题列表，顺序决定相对序号（1..K）
    pub topics: Vec<TopicQuota>,
    /// 原文片段
    pub source_excerpt: String,
    pub language: OutputLanguage,
}

impl GenerationRequest {
    pub fn total_requested(&self) -> usize {
        self.topics.iter().map(|t| t.count).sum()
    }
}

/// 外部生成能力
///
/// 实现方应当观察取消令牌，被取消后尽快返回
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    async fn generate(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> AppResult<Vec<RawArtifact>>;
}

/// 基于 LLM 的出题实现
pub struct LlmQuestionGenerator {
    llm: LlmService,
}

impl LlmQuestionGenerator {
    pub fn new(llm: LlmService) -> Self {
        Self { llm }
    }

    /// 构建出题提示词
    ///
    /// 返回 (user_message, system_message)
    fn build_messages(&self, request: &GenerationRequest) -> (String, String) {
        let system_message =
            "You are a strict professional examiner. You only answer with a valid JSON array."
                .to_string();

        let topic_list = request
            .topics
            .iter()
            .enumerate()
            .map(|(i, t)| format!("  {}. {} -> {} questions", i + 1, t.topic, t.count))
            .collect::<Vec<_>>()
            .join("\n");

        let user_message = format!(
            r#"Write multiple-choice exam questions based ONLY on the source text below.

Rules:
- Each question has EXACTLY {arity} options and exactly one correct option.
- Options are plain text: no "a)", "A.", "1." or "-" prefixes.
- Never refer to "the text", "the section" or the topic name inside the question.
- Avoid "all of the above" / "none of the above".
- Distractors must be plausible; vary the position of the correct option.
- Each question must be understandable on its own.

Topics for this batch (the number before the dot is the topic id):
{topics}

Answer with a JSON array, one object per question:
[
  {{
    "epigrafe": 1,
    "question": "...",
    "options": ["...", "...", "..."],
    "answer": 0,
    "explanation": "..."
  }}
]
"epigrafe" is the topic id from the list above, "answer" is the index of the correct option.
Produce {total} questions in total. Write them in {language}, formal register.

SOURCE TEXT:
{source}"#,
            arity = OPTION_ARITY,
            topics = topic_list,
            total = request.total_requested(),
            language = request.language.prompt_name(),
            source = request.source_excerpt,
        );

        (user_message, system_message)
    }
}

#[async_trait]
impl QuestionGenerator for LlmQuestionGenerator {
    async fn generate(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> AppResult<Vec<RawArtifact>> {
        debug!(
            "请求生成 {} 道题，主题数: {}，模型: {}",
            request.total_requested(),
            request.topics.len(),
            self.llm.model_name()
        );

        let (user_message, system_message) = self.build_messages(&request);
        let response = self
            .llm
            .send_cancellable(&user_message, Some(&system_message), &cancel)
            .await?;

        let artifacts = parse_artifacts(&response)?;
        info!(
            "✓ 模型返回 {} 道题 (请求 {} 道)",
            artifacts.len(),
            request.total_requested()
        );

        Ok(artifacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn request() -> GenerationRequest {
        GenerationRequest {
            topics: vec![
                TopicQuota {
                    topic: "4. Contratos del sector público".to_string(),
                    count: 3,
                },
                TopicQuota {
                    topic: "7. Procedimiento sancionador".to_string(),
                    count: 2,
                },
            ],
            source_excerpt: "--- Página 1 ---\nTexto de prueba".to_string(),
            language: OutputLanguage::English,
        }
    }

    #[test]
    fn test_prompt_lists_topics_with_relative_ids() {
        let generator = LlmQuestionGenerator::new(LlmService::new(&Config::default()));
        let (user_message, _) = generator.build_messages(&request());

        assert!(user_message.contains("  1. 4. Contratos del sector público -> 3 questions"));
        assert!(user_message.contains("  2. 7. Procedimiento sancionador -> 2 questions"));
        assert!(user_message.contains("Produce 5 questions in total"));
        assert!(user_message.contains("Write them in English"));
        assert!(user_message.ends_with("Texto de prueba"));
    }

    #[test]
    fn test_total_requested() {
        assert_eq!(request().total_requested(), 5);
    }
}
