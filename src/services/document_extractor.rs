//! 文档提取 - 业务能力层
//!
//! 读取纯文本文档，按分页符切页，去掉重复出现的页眉页脚，并加上页码标记

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::{debug, info};

use crate::error::{AppError, AppResult, UserInputError};

/// 分页符
const PAGE_BREAK: char = '\u{000C}';
/// 出现在超过该比例页面首/尾行的文本视为页眉/页脚
const REPEAT_THRESHOLD: f64 = 0.4;
/// 少于该页数时不做页眉页脚清理
const MIN_PAGES_FOR_CLEANUP: usize = 3;

/// 提取结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDocument {
    pub text: String,
    pub pages: usize,
    pub removed_headers: usize,
    pub removed_footers: usize,
}

/// 文档提取服务
pub struct DocumentExtractor {
    threshold: f64,
}

impl DocumentExtractor {
    pub fn new() -> Self {
        Self {
            threshold: REPEAT_THRESHOLD,
        }
    }

    /// 读取文档文件
    ///
    /// 只支持 `.txt` / `.md`，其余格式返回用户输入错误
    pub async fn extract_file(&self, path: &Path) -> AppResult<ExtractedDocument> {
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if !matches!(extension.as_str(), "txt" | "md") {
            return Err(UserInputError::UnsupportedDocument { extension }.into());
        }

        let display = path.display().to_string();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AppError::file_read_failed(&display, e))?;

        let document = self.extract_text(&raw);
        info!(
            "✓ 文档读取完成: {} 页, {} 字符",
            document.pages,
            document.text.chars().count()
        );
        Ok(document)
    }

    /// 处理原始文本
    pub fn extract_text(&self, raw: &str) -> ExtractedDocument {
        let pages: Vec<Vec<&str>> = raw
            .split(PAGE_BREAK)
            .map(|page| {
                page.lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .collect()
            })
            .collect();

        let (headers, footers) = if pages.len() >= MIN_PAGES_FOR_CLEANUP {
            (
                self.repeated(pages.iter().filter_map(|p| p.first().copied()), pages.len()),
                self.repeated(pages.iter().filter_map(|p| p.last().copied()), pages.len()),
            )
        } else {
            (HashSet::new(), HashSet::new())
        };

        if !headers.is_empty() || !footers.is_empty() {
            debug!("检测到页眉: {:?}, 页脚: {:?}", headers, footers);
        }

        let mut removed_headers = 0;
        let mut removed_footers = 0;
        let mut sections = Vec::with_capacity(pages.len());

        for (index, lines) in pages.iter().enumerate() {
            let mut body: &[&str] = lines;
            if let Some(first) = body.first() {
                if headers.contains(first) {
                    body = &body[1..];
                    removed_headers += 1;
                }
            }
            if let Some(last) = body.last() {
                if footers.contains(last) {
                    body = &body[..body.len() - 1];
                    removed_footers += 1;
                }
            }
            sections.push(format!("--- Página {} ---\n{}\n", index + 1, body.join("\n")));
        }

        ExtractedDocument {
            text: sections.join("\n").trim().to_string(),
            pages: pages.len(),
            removed_headers,
            removed_footers,
        }
    }

    fn repeated<'a>(
        &self,
        lines: impl Iterator<Item = &'a str>,
        page_count: usize,
    ) -> HashSet<&'a str> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for line in lines {
            *counts.entry(line).or_insert(0) += 1;
        }
        let limit = page_count as f64 * self.threshold;
        counts
            .into_iter()
            .filter(|(_, n)| *n as f64 > limit)
            .map(|(line, _)| line)
            .collect()
    }
}

impl Default for DocumentExtractor {
    fn default() -> Self {
        Self::new()
    }
}
