use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::{AppError, AppResult};

/// 每道题的选项数量
pub const OPTION_ARITY: usize = 3;

/// 已归属到主题的题目
///
/// 序列化格式与导出的会话文件一致，`epigrafe` 是从1开始的主题序号。
/// 未识别的字段保存在 `extra` 中，恢复后原样写回。缺失或为 `null` 的字段取缺省值。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// 主题序号（从1开始），0 表示未归属
    #[serde(rename = "epigrafe", default, deserialize_with = "null_as_default")]
    pub topic_ref: usize,
    #[serde(default, deserialize_with = "null_as_default")]
    pub question: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub options: Vec<String>,
    /// 正确选项下标
    #[serde(default, deserialize_with = "null_as_default")]
    pub answer: usize,
    #[serde(default, deserialize_with = "null_as_default")]
    pub explanation: String,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl Artifact {
    /// 对应的主题序号（从0开始），未归属时返回 None
    pub fn topic_ordinal(&self) -> Option<usize> {
        self.topic_ref.checked_sub(1)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// 生成服务返回的原始题目
///
/// `epigrafe` 是批次内的相对序号（1..K），需要经过重映射才能得到主题序号
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawArtifact {
    #[serde(rename = "epigrafe")]
    pub relative_ordinal: usize,
    pub question: String,
    pub options: Vec<String>,
    pub answer: usize,
    #[serde(default)]
    pub explanation: String,
}

impl RawArtifact {
    /// 校验单条记录的结构
    ///
    /// # 参数
    /// - `index`: 记录在响应中的位置（仅用于错误信息）
    pub fn validate(&self, index: usize) -> AppResult<()> {
        if self.relative_ordinal == 0 {
            return Err(AppError::malformed(format!(
                "第 {} 道题缺少主题序号 (epigrafe)",
                index + 1
            )));
        }
        if self.question.trim().is_empty() {
            return Err(AppError::malformed(format!("第 {} 道题题干为空", index + 1)));
        }
        if self.options.len() != OPTION_ARITY {
            return Err(AppError::malformed(format!(
                "第 {} 道题有 {} 个选项，应为 {}",
                index + 1,
                self.options.len(),
                OPTION_ARITY
            )));
        }
        if self.answer >= OPTION_ARITY {
            return Err(AppError::malformed(format!(
                "第 {} 道题的答案下标 {} 超出范围 [0, {}]",
                index + 1,
                self.answer,
                OPTION_ARITY - 1
            )));
        }
        Ok(())
    }

    /// 转换为题目，`topic_ref` 由调用方决定
    pub fn into_artifact(self, topic_ref: usize) -> Artifact {
        Artifact {
            topic_ref,
            question: self.question,
            options: self.options,
            answer: self.answer,
            explanation: self.explanation,
            extra: Map::new(),
        }
    }
}
