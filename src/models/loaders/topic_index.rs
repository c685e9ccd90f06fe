use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{AppError, AppResult};
use crate::models::topic::{TopicEntry, TopicRegistry};

/// TOML 索引文件的外层结构
#[derive(Debug, Serialize, Deserialize)]
struct TomlTopicIndex {
    topics: Vec<TopicEntry>,
}

/// 从文件加载主题索引
///
/// 根据扩展名选择格式：`.toml` 使用 `[[topics]]` 表数组，其余按 JSON 数组解析
pub async fn load_topic_index(path: &Path) -> AppResult<Vec<TopicEntry>> {
    let display = path.display().to_string();
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| AppError::file_read_failed(&display, e))?;

    let entries = if is_toml(path) {
        toml::from_str::<TomlTopicIndex>(&content)
            .map_err(|e| AppError::file_parse_failed(&display, e))?
            .topics
    } else {
        serde_json::from_str::<Vec<TopicEntry>>(&content)
            .map_err(|e| AppError::file_parse_failed(&display, e))?
    };

    tracing::info!("从 {} 加载了 {} 个主题", path.display(), entries.len());
    Ok(entries)
}

/// 保存主题索引
///
/// # 参数
/// - `dir`: 输出目录
/// - `registry`: 当前注册表
/// - `as_toml`: 是否保存为 TOML
///
/// # 返回
/// 返回写入的文件路径
pub async fn save_topic_index(
    dir: &Path,
    registry: &TopicRegistry,
    as_toml: bool,
) -> AppResult<PathBuf> {
    let date = chrono::Local::now().format("%Y-%m-%d");
    let extension = if as_toml { "toml" } else { "json" };
    let path = dir.join(format!("indice_temas_{}.{}", date, extension));
    let display = path.display().to_string();

    let content = if as_toml {
        toml::to_string_pretty(&TomlTopicIndex {
            topics: registry.to_entries(),
        })
        .map_err(|e| AppError::file_write_failed(&display, e))?
    } else {
        serde_json::to_string_pretty(&registry.to_entries())
            .map_err(|e| AppError::file_write_failed(&display, e))?
    };

    fs::create_dir_all(dir)
        .await
        .map_err(|e| AppError::file_write_failed(&display, e))?;
    fs::write(&path, content)
        .await
        .map_err(|e| AppError::file_write_failed(&display, e))?;

    Ok(path)
}

fn is_toml(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some("toml")
}
