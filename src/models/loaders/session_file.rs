use std::path::{Path, PathBuf};

use serde_json::Value as JsonValue;
use tokio::fs;

use crate::error::{AppError, AppResult, RestoreError};
use crate::models::artifact::Artifact;

/// 读取已导出的会话文件
///
/// 只负责读取和 JSON 解析，结构校验由会话恢复负责
pub async fn load_session_file(path: &Path) -> AppResult<JsonValue> {
    let display = path.display().to_string();
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| AppError::file_read_failed(&display, e))?;

    serde_json::from_str(&content).map_err(|e| {
        RestoreError::InvalidJson {
            reason: e.to_string(),
        }
        .into()
    })
}

/// 导出题目集合
///
/// 写入 `examen_ia_<日期>.json`，格式与 [`load_session_file`] 读取的一致
pub async fn save_session_file(dir: &Path, artifacts: &[Artifact]) -> AppResult<PathBuf> {
    let date = chrono::Local::now().format("%Y-%m-%d");
    let path = dir.join(format!("examen_ia_{}.json", date));
    let display = path.display().to_string();

    let content = serde_json::to_string_pretty(artifacts)
        .map_err(|e| AppError::file_write_failed(&display, e))?;

    fs::create_dir_all(dir)
        .await
        .map_err(|e| AppError::file_write_failed(&display, e))?;
    fs::write(&path, content)
        .await
        .map_err(|e| AppError::file_write_failed(&display, e))?;

    tracing::debug!("已导出 {} 道题到 {}", artifacts.len(), path.display());
    Ok(path)
}
