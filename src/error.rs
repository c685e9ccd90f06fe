use thiserror::Error;

use crate::models::Phase;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 用户输入错误（缺少密钥或文档）
    #[error("输入错误: {0}")]
    UserInput(#[from] UserInputError),
    /// 会话恢复错误
    #[error("恢复错误: {0}")]
    Restore(#[from] RestoreError),
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 调度器错误
    #[error("调度错误: {0}")]
    Scheduler(#[from] SchedulerError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 用户输入错误
///
/// 立即返回给调用方，不改变阶段
#[derive(Debug, Error)]
pub enum UserInputError {
    /// 缺少 API 密钥
    #[error("请提供 API 密钥")]
    MissingCredential,
    /// 缺少源文档
    #[error("请先加载源文档")]
    MissingDocument,
    /// 不支持的文档格式
    #[error("不支持的文档格式: {extension}，仅支持 txt / md")]
    UnsupportedDocument { extension: String },
}

/// 会话恢复错误
///
/// 发生时恢复中止，不修改任何状态
#[derive(Debug, Error)]
pub enum RestoreError {
    /// 会话文件不是合法 JSON
    #[error("会话文件不是合法的 JSON: {reason}")]
    InvalidJson { reason: String },
    /// 会话文件不是数组
    #[error("会话文件格式错误: 顶层必须是数组，实际为 {found}")]
    NotAnArray { found: String },
    /// 某条记录无法解析
    #[error("会话文件第 {index} 条记录无效: {reason}")]
    InvalidRecord { index: usize, reason: String },
    /// 没有可用的主题
    #[error("主题列表为空，无法恢复进度")]
    EmptyRegistry,
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// API 调用失败（网络或服务端错误）
    #[error("LLM API调用失败 (模型: {model}): {source}")]
    ApiCallFailed {
        model: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
    /// 返回内容无法解析为题目
    #[error("LLM返回的内容无法解析为题目: {reason}")]
    MalformedResponse { reason: String },
    /// 用户取消
    #[error("生成已被用户取消")]
    Cancelled,
    /// 所有候选模型都不可用
    #[error("没有可用的模型，已尝试: {tried}")]
    NoWorkingModel { tried: String },
}

/// 调度器错误
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// 当前阶段不允许该操作
    #[error("当前阶段 {actual} 不允许该操作 (需要: {expected})")]
    InvalidPhase { expected: Phase, actual: Phase },
    /// 主题序号超出范围
    #[error("主题序号 {ordinal} 超出范围 (共 {len} 个主题)")]
    TopicOutOfRange { ordinal: usize, len: usize },
    /// 没有检测到主题
    #[error("没有检测到任何主题")]
    NoTopics,
    /// 没有选中任何主题
    #[error("请至少选择一个主题")]
    EmptySelection,
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 解析文件失败
    #[error("解析文件失败 ({path}): {source}")]
    ParseFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 数值不合法
    #[error("配置项 {name} 的值不合法: {reason}")]
    InvalidValue { name: String, reason: String },
}

// ========== 从常见错误类型转换 ==========

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Llm(LlmError::MalformedResponse {
            reason: err.to_string(),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建LLM API调用错误
    pub fn llm_api_failed(
        model: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Llm(LlmError::ApiCallFailed {
            model: model.into(),
            source: Box::new(source),
        })
    }

    /// 创建响应格式错误
    pub fn malformed(reason: impl Into<String>) -> Self {
        AppError::Llm(LlmError::MalformedResponse {
            reason: reason.into(),
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件解析错误
    pub fn file_parse_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ParseFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 是否为用户取消
    pub fn is_cancellation(&self) -> bool {
        matches!(self, AppError::Llm(LlmError::Cancelled))
    }

    /// 是否属于会把 `generating` 回退到 `ready_to_generate` 的错误
    pub fn reverts_generation(&self) -> bool {
        matches!(
            self,
            AppError::Llm(
                LlmError::ApiCallFailed { .. }
                    | LlmError::EmptyContent { .. }
                    | LlmError::MalformedResponse { .. }
                    | LlmError::Cancelled
            )
        )
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
