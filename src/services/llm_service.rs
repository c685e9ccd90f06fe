//! LLM 服务 - 业务能力层
//!
//! 只负责"调用模型"能力，不关心流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - Gemini 和 DeepSeek 都通过 OpenAI 兼容接口访问
//! - 模型名称和密钥都来自显式传入的 [`Config`]，不做进程级缓存

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, LlmError};

/// 模型探测时发送的提示词
const PROBE_PROMPT: &str = "Test connection. Reply with OK.";

/// LLM 服务
///
/// 职责：
/// - 发送单条对话请求并返回文本
/// - 支持通过取消令牌放弃进行中的请求
/// - 不解析业务内容
#[derive(Clone)]
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
    temperature: f32,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        Self::with_model(config, config.llm_model_name.clone())
    }

    /// 使用指定模型创建 LLM 服务
    pub fn with_model(config: &Config, model_name: impl Into<String>) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: model_name.into(),
            temperature: config.llm_temperature,
        }
    }

    /// 设置默认温度
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// 通用的 LLM 调用函数
    ///
    /// # 参数
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（可选）
    ///
    /// # 返回
    /// 返回 LLM 的响应内容（已去除首尾空白）
    ///
    /// # 示例
    /// ```no_run
    /// # use exam_question_gen::services::LlmService;
    /// # async fn example(service: &LlmService) -> exam_question_gen::AppResult<()> {
    /// let response = service
    ///     .send_to_llm("Resume el tema 1", Some("Eres un asistente conciso"))
    ///     .await?;
    /// println!("LLM 响应: {}", response);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn send_to_llm(
        &self,
        user_message: &str,
        system_message: Option<&str>,
    ) -> AppResult<String> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()
                .map_err(|e| AppError::llm_api_failed(&self.model_name, e))?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(|e| AppError::llm_api_failed(&self.model_name, e))?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(self.temperature)
            .build()
            .map_err(|e| AppError::llm_api_failed(&self.model_name, e))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            AppError::llm_api_failed(&self.model_name, e)
        })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| LlmError::EmptyContent {
                model: self.model_name.clone(),
            })?;

        Ok(content.trim().to_string())
    }

    /// 可取消的 LLM 调用
    ///
    /// 令牌被取消后立即返回 [`LlmError::Cancelled`]，不再读取响应
    pub async fn send_cancellable(
        &self,
        user_message: &str,
        system_message: Option<&str>,
        cancel: &CancellationToken,
    ) -> AppResult<String> {
        if cancel.is_cancelled() {
            return Err(LlmError::Cancelled.into());
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("LLM 请求已取消，丢弃响应");
                Err(LlmError::Cancelled.into())
            }
            result = self.send_to_llm(user_message, system_message) => result,
        }
    }

    /// 依次探测候选模型，返回第一个可用的
    ///
    /// 结果由调用方写回配置，这里不做缓存
    pub async fn probe_models(config: &Config, candidates: &[String]) -> AppResult<String> {
        let mut failed = Vec::new();

        for model in candidates {
            let service = Self::with_model(config, model.clone());
            match service.send_to_llm(PROBE_PROMPT, None).await {
                Ok(_) => {
                    info!("✅ 可用模型: {}", model);
                    return Ok(model.clone());
                }
                Err(e) => {
                    warn!("❌ 模型 {} 不可用: {}", model, e);
                    failed.push(model.clone());
                }
            }
        }

        Err(LlmError::NoWorkingModel {
            tried: failed.join(", "),
        }
        .into())
    }
}
