//! 模型响应解析
//!
//! 模型经常在 JSON 外面包一层 markdown 代码块或说明文字，这里尽量剥掉再解析

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::RawArtifact;
use crate::utils::logging::truncate_text;

/// 从模型输出中提取 JSON 数组并反序列化
pub fn parse_json_array<T: DeserializeOwned>(text: &str) -> AppResult<Vec<T>> {
    let cleaned = text.replace("```json", "").replace("```", "");

    let slice = match (cleaned.find('['), cleaned.rfind(']')) {
        (Some(start), Some(end)) if end > start => &cleaned[start..=end],
        _ => cleaned.trim(),
    };

    serde_json::from_str(slice).map_err(|e| {
        debug!("无法解析的响应: {}", truncate_text(text, 200));
        AppError::malformed(format!("模型返回了文本，但不是合法的 JSON 数组: {}", e))
    })
}

/// 解析并校验生成的题目
///
/// 任意一条记录结构不对都会整体拒绝
pub fn parse_artifacts(text: &str) -> AppResult<Vec<RawArtifact>> {
    let artifacts: Vec<RawArtifact> = parse_json_array(text)?;
    for (index, artifact) in artifacts.iter().enumerate() {
        artifact.validate(index)?;
    }
    Ok(artifacts)
}
