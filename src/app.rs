//! 命令行驱动
//!
//! 读取文档 → 检测/加载主题 → 确认选择 → （可选）恢复会话 → 自动运行直到完成 → 导出

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::{error, info, warn};

use crate::config::{Config, TopicIndexFormat, TopicSource};
use crate::models::{load_session_file, load_topic_index, save_session_file, save_topic_index};
use crate::models::{Phase, TopicEntry};
use crate::orchestrator::{AutoRunner, GenerationCoordinator, GenerationSettings};
use crate::services::{
    DocumentExtractor, LlmQuestionGenerator, LlmService, QuestionGenerator, TopicDetector,
};
use crate::utils::logging::{log_startup, log_topics_loaded, print_final_stats};

/// 自动运行的结束方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunEnd {
    Completed,
    /// 收到 Ctrl+C
    Stopped,
    /// 某一批生成失败，停在 `cursor`
    Failed { cursor: usize, total: usize },
}

/// 应用主结构
pub struct App {
    config: Config,
    llm: LlmService,
    coordinator: GenerationCoordinator,
}

impl App {
    /// 初始化应用
    pub async fn initialize(mut config: Config) -> Result<Self> {
        config.validate()?;

        if config.detect_model {
            info!("🔍 正在探测可用模型...");
            let candidates = config.llm_candidate_models.clone();
            config.llm_model_name = LlmService::probe_models(&config, &candidates).await?;
        }

        let llm = LlmService::new(&config);
        let generator = Arc::new(LlmQuestionGenerator::new(llm.clone()));
        Ok(Self::with_generator(config, llm, generator))
    }

    /// 使用指定的出题服务组装应用
    pub fn with_generator(
        config: Config,
        llm: LlmService,
        generator: Arc<dyn QuestionGenerator>,
    ) -> Self {
        let settings = GenerationSettings::from(&config);
        log_startup(
            &config.llm_model_name,
            settings.target_count,
            settings.per_call_budget,
        );

        let coordinator = GenerationCoordinator::new(generator, settings);
        Self {
            config,
            llm,
            coordinator,
        }
    }

    pub fn coordinator(&self) -> &GenerationCoordinator {
        &self.coordinator
    }

    /// 运行应用主逻辑
    ///
    /// 生成中途失败时仍会导出已有题目，然后返回错误
    pub async fn run(&self) -> Result<()> {
        let text = self.load_document().await?;
        self.load_topics(&text).await?;
        self.confirm_selection()?;

        if let Some(path) = &self.config.restore_session_path {
            self.restore_session(Path::new(path)).await?;
        }

        let end = self.generate_all().await?;
        self.export().await?;

        if let RunEnd::Failed { cursor, total } = end {
            bail!("生成在第 {}/{} 个主题处失败", cursor + 1, total);
        }
        Ok(())
    }

    /// 读取源文档
    async fn load_document(&self) -> Result<String> {
        let path = self
            .config
            .document_path
            .as_deref()
            .context("缺少 DOCUMENT_PATH")?;

        info!("\n📄 正在读取文档: {}", path);
        let document = DocumentExtractor::new()
            .extract_file(Path::new(path))
            .await
            .with_context(|| format!("无法读取文档: {}", path))?;

        if document.removed_headers + document.removed_footers > 0 {
            info!(
                "🧹 已清理页眉 {} 处、页脚 {} 处",
                document.removed_headers, document.removed_footers
            );
        }
        self.coordinator.set_document(document.text.clone());
        Ok(document.text)
    }

    /// 加载主题：优先读取索引文件，否则检测
    async fn load_topics(&self, text: &str) -> Result<()> {
        if let Some(path) = &self.config.topics_path {
            info!("\n📁 正在读取主题索引: {}", path);
            let entries = load_topic_index(Path::new(path)).await?;
            self.coordinator.load_topics(entries)?;
        } else {
            self.detect_topics(text).await?;
        }

        log_topics_loaded(&self.coordinator.registry());
        Ok(())
    }

    async fn detect_topics(&self, text: &str) -> Result<()> {
        self.coordinator.begin_analysis()?;

        let detector = TopicDetector::new(self.llm.clone());
        let detected = match self.config.topic_source {
            TopicSource::Regex => Ok(detector.detect(text).await),
            TopicSource::Ai => detector.ai_index(text).await,
        };

        let entries: Vec<TopicEntry> = match detected {
            Ok(entries) => entries,
            Err(e) => {
                self.coordinator.fail_analysis();
                return Err(e).context("主题检测失败");
            }
        };
        self.coordinator.finish_analysis(entries)?;

        if self.config.save_topic_index {
            match save_topic_index(
                Path::new(&self.config.output_dir),
                &self.coordinator.registry(),
                self.config.topic_index_format == TopicIndexFormat::Toml,
            )
            .await
            {
                Ok(path) => info!("💾 主题索引已保存: {}", path.display()),
                Err(e) => warn!("⚠️ 保存主题索引失败: {}", e),
            }
        }
        Ok(())
    }

    /// 应用 SELECTED_TOPICS 并确认
    fn confirm_selection(&self) -> Result<()> {
        if let Some(selected) = &self.config.selected_topics {
            let selected: BTreeSet<usize> =
                selected.iter().filter_map(|n| n.checked_sub(1)).collect();
            self.coordinator.toggle_all(false)?;
            for ordinal in selected {
                self.coordinator.toggle_topic(ordinal).with_context(|| {
                    format!("SELECTED_TOPICS 中的主题 {} 不存在", ordinal + 1)
                })?;
            }
        }
        self.coordinator.confirm_selection()?;
        Ok(())
    }

    /// 从导出文件恢复进度
    async fn restore_session(&self, path: &Path) -> Result<()> {
        info!("\n♻️ 正在恢复会话: {}", path.display());
        let persisted = load_session_file(path).await?;
        self.coordinator
            .restore_session(&persisted)
            .with_context(|| format!("无法恢复会话: {}", path.display()))?;
        Ok(())
    }

    /// 开启自动运行，直到完成、出错或收到 Ctrl+C
    async fn generate_all(&self) -> Result<RunEnd> {
        let delay = Duration::from_millis(self.config.auto_run_delay_ms);
        let runner = AutoRunner::spawn(self.coordinator.clone(), delay);
        let mut revisions = self.coordinator.subscribe();

        self.coordinator.set_auto_run(true);
        let mut stopped = false;

        let end = loop {
            revisions.borrow_and_update();
            let snapshot = self.coordinator.snapshot();
            if snapshot.phase == Phase::Completed {
                break RunEnd::Completed;
            }
            if !snapshot.auto_run && snapshot.phase != Phase::Generating {
                if stopped {
                    break RunEnd::Stopped;
                }
                error!(
                    "❌ 生成已中断，停在第 {}/{} 个主题",
                    snapshot.cursor + 1,
                    snapshot.total_topics
                );
                break RunEnd::Failed {
                    cursor: snapshot.cursor,
                    total: snapshot.total_topics,
                };
            }

            tokio::select! {
                _ = tokio::signal::ctrl_c(), if !stopped => {
                    warn!("\n⏹️ 收到 Ctrl+C，正在停止...");
                    stopped = true;
                    self.coordinator.stop();
                }
                changed = revisions.changed() => {
                    if changed.is_err() {
                        break RunEnd::Stopped;
                    }
                }
            }
        };

        runner.shutdown().await;
        Ok(end)
    }

    /// 导出题目集合
    async fn export(&self) -> Result<()> {
        let snapshot = self.coordinator.snapshot();
        let artifacts = self.coordinator.artifacts();
        if artifacts.is_empty() {
            warn!("⚠️ 没有生成任何题目，跳过导出");
            return Ok(());
        }

        let path = save_session_file(Path::new(&self.config.output_dir), &artifacts)
            .await
            .context("导出题目失败")?;

        print_final_stats(
            artifacts.len(),
            snapshot.batches,
            snapshot.phase == Phase::Completed,
            &path.display().to_string(),
        );
        Ok(())
    }
}
