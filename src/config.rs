use std::str::FromStr;

use tracing::warn;

use crate::error::{AppResult, ConfigError, UserInputError};
use crate::models::{GenerationStrategy, OutputLanguage};

/// LLM 服务提供方
///
/// 两者都走 OpenAI 兼容接口，只是默认地址和模型不同
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LlmProvider {
    Gemini,
    DeepSeek,
}

impl LlmProvider {
    pub fn default_base_url(self) -> &'static str {
        match self {
            LlmProvider::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
            LlmProvider::DeepSeek => "https://api.deepseek.com",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            LlmProvider::Gemini => "gemini-2.5-flash",
            LlmProvider::DeepSeek => "deepseek-chat",
        }
    }

    /// 模型探测时的候选列表，越靠前越优先
    pub fn candidate_models(self) -> Vec<String> {
        let names: &[&str] = match self {
            LlmProvider::Gemini => &[
                "gemini-2.5-pro",
                "gemini-2.5-flash",
                "gemini-2.0-flash",
                "gemini-1.5-pro-latest",
                "gemini-1.5-flash-latest",
            ],
            LlmProvider::DeepSeek => &["deepseek-chat"],
        };
        names.iter().map(|s| s.to_string()).collect()
    }

    /// 生成题目时使用的温度
    pub fn generation_temperature(self) -> f32 {
        match self {
            LlmProvider::Gemini => 0.7,
            LlmProvider::DeepSeek => 1.1,
        }
    }
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(LlmProvider::Gemini),
            "deepseek" => Ok(LlmProvider::DeepSeek),
            other => Err(format!("未知的服务提供方: {}", other)),
        }
    }
}

/// 主题来源
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TopicSource {
    /// 正则扫描目录，失败时回退到 AI
    Regex,
    /// 直接让 AI 生成结构化目录
    Ai,
}

impl FromStr for TopicSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "regex" => Ok(TopicSource::Regex),
            "ai" => Ok(TopicSource::Ai),
            other => Err(format!("未知的主题来源: {}", other)),
        }
    }
}

/// 主题索引的保存格式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TopicIndexFormat {
    Json,
    Toml,
}

impl FromStr for TopicIndexFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(TopicIndexFormat::Json),
            "toml" => Ok(TopicIndexFormat::Toml),
            other => Err(format!("未知的索引格式: {}", other)),
        }
    }
}

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    // --- LLM 配置 ---
    pub llm_provider: LlmProvider,
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    /// 模型探测的候选列表
    pub llm_candidate_models: Vec<String>,
    /// 启动时是否探测可用模型
    pub detect_model: bool,
    pub llm_temperature: f32,
    // --- 输入输出 ---
    /// 源文档路径
    pub document_path: Option<String>,
    /// 要恢复的会话文件
    pub restore_session_path: Option<String>,
    /// 预先保存的主题索引
    pub topics_path: Option<String>,
    /// 导出目录
    pub output_dir: String,
    /// 分析后是否保存主题索引
    pub save_topic_index: bool,
    pub topic_index_format: TopicIndexFormat,
    // --- 出题配置 ---
    pub strategy: GenerationStrategy,
    pub language: OutputLanguage,
    pub topic_source: TopicSource,
    /// 需要覆盖的主题（从1开始），None 表示全部
    pub selected_topics: Option<Vec<usize>>,
    // --- 调度配置 ---
    /// 单次调用最多请求的题目数
    pub per_call_budget: usize,
    /// 自动运行的间隔（毫秒）
    pub auto_run_delay_ms: u64,
    /// 发送给模型的原文最大字符数
    pub source_excerpt_chars: usize,
    /// 相对序号越界时是否整批拒绝
    pub strict_remap: bool,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        let provider = LlmProvider::Gemini;
        Self {
            llm_provider: provider,
            llm_api_key: String::new(),
            llm_api_base_url: provider.default_base_url().to_string(),
            llm_model_name: provider.default_model().to_string(),
            llm_candidate_models: provider.candidate_models(),
            detect_model: false,
            llm_temperature: provider.generation_temperature(),
            document_path: None,
            restore_session_path: None,
            topics_path: None,
            output_dir: "output".to_string(),
            save_topic_index: true,
            topic_index_format: TopicIndexFormat::Json,
            strategy: GenerationStrategy::Medium,
            language: OutputLanguage::Spanish,
            topic_source: TopicSource::Regex,
            selected_topics: None,
            per_call_budget: 20,
            auto_run_delay_ms: 1000,
            source_excerpt_chars: 50_000,
            strict_remap: false,
            verbose_logging: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        let provider = env_parse("LLM_PROVIDER").unwrap_or(default.llm_provider);
        Self {
            llm_provider: provider,
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL")
                .unwrap_or_else(|_| provider.default_base_url().to_string()),
            llm_model_name: std::env::var("LLM_MODEL_NAME")
                .unwrap_or_else(|_| provider.default_model().to_string()),
            llm_candidate_models: std::env::var("LLM_CANDIDATE_MODELS")
                .ok()
                .map(|v| split_list(&v))
                .filter(|list| !list.is_empty())
                .unwrap_or_else(|| provider.candidate_models()),
            detect_model: env_parse("LLM_DETECT_MODEL").unwrap_or(default.detect_model),
            llm_temperature: env_parse("LLM_TEMPERATURE")
                .unwrap_or_else(|| provider.generation_temperature()),
            document_path: std::env::var("DOCUMENT_PATH").ok(),
            restore_session_path: std::env::var("RESTORE_SESSION_PATH").ok(),
            topics_path: std::env::var("TOPICS_PATH").ok(),
            output_dir: std::env::var("OUTPUT_DIR").unwrap_or(default.output_dir),
            save_topic_index: env_parse("SAVE_TOPIC_INDEX").unwrap_or(default.save_topic_index),
            topic_index_format: env_parse("TOPIC_INDEX_FORMAT")
                .unwrap_or(default.topic_index_format),
            strategy: env_parse("GENERATION_STRATEGY").unwrap_or(default.strategy),
            language: env_parse("TARGET_LANGUAGE").unwrap_or(default.language),
            topic_source: env_parse("TOPIC_SOURCE").unwrap_or(default.topic_source),
            selected_topics: std::env::var("SELECTED_TOPICS")
                .ok()
                .map(|v| {
                    split_list(&v)
                        .iter()
                        .filter_map(|s| s.parse().ok())
                        .collect::<Vec<usize>>()
                })
                .filter(|list| !list.is_empty()),
            per_call_budget: env_parse("PER_CALL_BUDGET").unwrap_or(default.per_call_budget),
            auto_run_delay_ms: env_parse("AUTO_RUN_DELAY_MS").unwrap_or(default.auto_run_delay_ms),
            source_excerpt_chars: env_parse("SOURCE_EXCERPT_CHARS")
                .unwrap_or(default.source_excerpt_chars),
            strict_remap: env_parse("STRICT_REMAP").unwrap_or(default.strict_remap),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(default.verbose_logging),
        }
    }

    /// 校验运行所需的配置
    ///
    /// 缺少密钥或文档时返回用户输入错误
    pub fn validate(&self) -> AppResult<()> {
        if self.llm_api_key.trim().is_empty() {
            return Err(UserInputError::MissingCredential.into());
        }
        if self
            .document_path
            .as_deref()
            .map_or(true, |p| p.trim().is_empty())
        {
            return Err(UserInputError::MissingDocument.into());
        }
        if self.per_call_budget == 0 {
            return Err(ConfigError::InvalidValue {
                name: "PER_CALL_BUDGET".to_string(),
                reason: "必须大于 0".to_string(),
            }
            .into());
        }
        if let Some(selected) = &self.selected_topics {
            if selected.iter().any(|&o| o == 0) {
                return Err(ConfigError::InvalidValue {
                    name: "SELECTED_TOPICS".to_string(),
                    reason: "主题序号从 1 开始".to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// 读取并解析环境变量，解析失败时记录警告并返回 None
fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let value = std::env::var(name).ok()?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            let err = ConfigError::EnvVarParseFailed {
                var_name: name.to_string(),
                value,
                expected_type: std::any::type_name::<T>().to_string(),
            };
            warn!("⚠️ {}，使用默认值", err);
            None
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
