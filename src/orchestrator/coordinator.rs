//! 生成协调器 - 编排层
//!
//! ## 职责
//!
//! 持有阶段状态机、主题注册表、选择集、游标和题目集合，
//! 一次只发起一个出题调用，并把结果应用回状态。
//!
//! ## 并发模型
//!
//! - 状态放在 `Arc<parking_lot::Mutex<_>>` 中，锁只在同步辅助函数里持有，不跨 `.await`
//! - 单飞保护：`generating` 阶段本身 + 调用纪元（epoch），过期结果一律丢弃
//! - 取消：每次调用一个新的 [`CancellationToken`]，`stop()` 使其失效
//! - 每次状态变化都会推进 `watch` 修订号，供 [`AutoRunner`](super::AutoRunner) 订阅

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppResult, LlmError, SchedulerError, UserInputError};
use crate::models::{
    Artifact, BatchRequest, OutputLanguage, Phase, RawArtifact, TopicEntry, TopicQuota,
    TopicRegistry,
};
use crate::services::question_generator::{GenerationRequest, QuestionGenerator};
use crate::utils::logging::{log_batch_complete, log_batch_start};
use crate::utils::text::excerpt;
use crate::workflow::{
    count_for, counts_from_artifacts, plan_next_batch, remap, remap_strict, restore,
};

/// 出题参数
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    /// 每个主题的目标题量
    pub target_count: usize,
    /// 单次调用最多请求的题目数
    pub per_call_budget: usize,
    pub language: OutputLanguage,
    /// 发送给模型的原文最大字符数
    pub source_excerpt_chars: usize,
    /// 相对序号越界时整批拒绝
    pub strict_remap: bool,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for GenerationSettings {
    fn from(config: &Config) -> Self {
        Self {
            target_count: config.strategy.target_count(),
            per_call_budget: config.per_call_budget,
            language: config.language,
            source_excerpt_chars: config.source_excerpt_chars,
            strict_remap: config.strict_remap,
        }
    }
}

/// 单个主题的进度
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicProgress {
    pub ordinal: usize,
    pub label: String,
    pub selected: bool,
    pub count: usize,
    pub target: usize,
}

impl TopicProgress {
    pub fn is_satisfied(&self) -> bool {
        self.count >= self.target
    }
}

/// 协调器状态快照（只读）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSnapshot {
    pub phase: Phase,
    pub cursor: usize,
    pub total_topics: usize,
    /// 游标所在主题的名称
    pub current_topic: Option<String>,
    pub artifact_count: usize,
    pub auto_run: bool,
    /// 已完成的调用次数
    pub batches: usize,
    pub topics: Vec<TopicProgress>,
}

/// 一次 `generate_next_batch` 的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// 调用成功，结果已追加
    Generated {
        requested: usize,
        added: usize,
        new_cursor: usize,
        completed: bool,
    },
    /// 没有需要请求的主题，直接进入 `completed`
    Completed,
}

/// 会话恢复的摘要
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreSummary {
    pub artifacts: usize,
    pub cursor: usize,
}

struct CoordinatorState {
    phase: Phase,
    registry: TopicRegistry,
    selection: BTreeSet<usize>,
    cursor: usize,
    artifacts: Vec<Artifact>,
    auto_run: bool,
    source_text: Option<String>,
    settings: GenerationSettings,
    active_token: Option<CancellationToken>,
    epoch: u64,
    batches: usize,
}

impl CoordinatorState {
    fn new(settings: GenerationSettings) -> Self {
        Self {
            phase: Phase::Idle,
            registry: TopicRegistry::default(),
            selection: BTreeSet::new(),
            cursor: 0,
            artifacts: Vec::new(),
            auto_run: false,
            source_text: None,
            settings,
            active_token: None,
            epoch: 0,
            batches: 0,
        }
    }

    fn expect_phase(&self, expected: Phase) -> Result<(), SchedulerError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(SchedulerError::InvalidPhase {
                expected,
                actual: self.phase,
            })
        }
    }

    /// 分析和生成进行中时不允许修改主题或选择集
    fn expect_settled(&self) -> Result<(), SchedulerError> {
        match self.phase {
            Phase::Analyzing | Phase::Generating => Err(SchedulerError::InvalidPhase {
                expected: Phase::TopicConfirmation,
                actual: self.phase,
            }),
            _ => Ok(()),
        }
    }

    fn install_registry(&mut self, entries: Vec<TopicEntry>) {
        self.registry = TopicRegistry::load(entries);
        self.selection = self.registry.ordinals().collect();
        self.cursor = 0;
        self.artifacts.clear();
        self.batches = 0;
        self.phase = Phase::TopicConfirmation;
    }

    /// 作废当前令牌，返回是否确实取消了进行中的调用
    fn cancel_active(&mut self) -> bool {
        match self.active_token.take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

/// 已开始的调用
struct InFlight {
    epoch: u64,
    batch_num: usize,
    batch: Vec<BatchRequest>,
    new_cursor: usize,
    exhausted: bool,
    request: GenerationRequest,
    token: CancellationToken,
    strict_remap: bool,
}

enum Prepared {
    Call(InFlight),
    Completed,
}

/// 生成协调器
///
/// 克隆得到的是同一个协调器的句柄
#[derive(Clone)]
pub struct GenerationCoordinator {
    state: Arc<Mutex<CoordinatorState>>,
    generator: Arc<dyn QuestionGenerator>,
    revision: Arc<watch::Sender<u64>>,
}

impl GenerationCoordinator {
    pub fn new(generator: Arc<dyn QuestionGenerator>, settings: GenerationSettings) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            state: Arc::new(Mutex::new(CoordinatorState::new(settings))),
            generator,
            revision: Arc::new(revision),
        }
    }

    /// 订阅状态变化
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn bump(&self) {
        self.revision.send_modify(|r| *r = r.wrapping_add(1));
    }

    // ========== 文档与分析 ==========

    /// 设置源文档文本
    pub fn set_document(&self, text: impl Into<String>) {
        self.state.lock().source_text = Some(text.into());
        self.bump();
    }

    pub fn has_document(&self) -> bool {
        self.state
            .lock()
            .source_text
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }

    /// 开始主题分析
    ///
    /// 没有文档时返回用户输入错误，阶段不变
    pub fn begin_analysis(&self) -> AppResult<()> {
        {
            let mut state = self.state.lock();
            state.expect_settled()?;
            if state.source_text.as_deref().map_or(true, |t| t.trim().is_empty()) {
                return Err(UserInputError::MissingDocument.into());
            }
            state.auto_run = false;
            state.phase = Phase::Analyzing;
        }
        self.bump();
        Ok(())
    }

    /// 分析完成：替换注册表，全选，游标归零，清空题目集合
    pub fn finish_analysis(&self, topics: Vec<TopicEntry>) -> AppResult<()> {
        let result = {
            let mut state = self.state.lock();
            state.expect_phase(Phase::Analyzing)?;
            if topics.is_empty() {
                state.phase = Phase::Idle;
                Err(SchedulerError::NoTopics.into())
            } else {
                state.install_registry(topics);
                info!("✓ 主题分析完成: {} 个主题", state.registry.len());
                Ok(())
            }
        };
        self.bump();
        result
    }

    /// 分析失败，回到 `idle`
    pub fn fail_analysis(&self) {
        {
            let mut state = self.state.lock();
            if state.phase == Phase::Analyzing {
                state.phase = Phase::Idle;
            }
        }
        self.bump();
    }

    /// 从主题索引文件加载注册表，进入 `topic_confirmation`
    pub fn load_topics(&self, topics: Vec<TopicEntry>) -> AppResult<()> {
        {
            let mut state = self.state.lock();
            state.expect_settled()?;
            if topics.is_empty() {
                return Err(SchedulerError::NoTopics.into());
            }
            state.auto_run = false;
            state.install_registry(topics);
        }
        self.bump();
        Ok(())
    }

    /// 全部重置（保留源文档和出题参数）
    pub fn reset(&self) {
        {
            let mut state = self.state.lock();
            state.cancel_active();
            let epoch = state.epoch + 1;
            let settings = state.settings.clone();
            let source_text = state.source_text.take();
            *state = CoordinatorState::new(settings);
            state.source_text = source_text;
            state.epoch = epoch;
        }
        info!("🔄 已重置");
        self.bump();
    }

    // ========== 选择与确认 ==========

    /// 切换单个主题的选中状态，返回切换后的状态
    pub fn toggle_topic(&self, ordinal: usize) -> AppResult<bool> {
        let selected = {
            let mut state = self.state.lock();
            state.expect_settled()?;
            state.registry.get(ordinal)?;
            if state.selection.remove(&ordinal) {
                false
            } else {
                state.selection.insert(ordinal);
                true
            }
        };
        self.bump();
        Ok(selected)
    }

    /// 全选或全不选
    pub fn toggle_all(&self, select: bool) -> AppResult<()> {
        {
            let mut state = self.state.lock();
            state.expect_settled()?;
            state.selection = if select {
                state.registry.ordinals().collect()
            } else {
                BTreeSet::new()
            };
        }
        self.bump();
        Ok(())
    }

    /// 确认选择：游标移到第一个选中的主题，进入 `ready_to_generate`
    pub fn confirm_selection(&self) -> AppResult<()> {
        {
            let mut state = self.state.lock();
            match state.phase {
                Phase::TopicConfirmation | Phase::ReadyToGenerate | Phase::Completed => {}
                actual => {
                    return Err(SchedulerError::InvalidPhase {
                        expected: Phase::TopicConfirmation,
                        actual,
                    }
                    .into())
                }
            }
            let first = state
                .selection
                .first()
                .copied()
                .ok_or(SchedulerError::EmptySelection)?;
            state.cursor = first;
            state.phase = Phase::ReadyToGenerate;
            info!(
                "✓ 已确认 {} 个主题，从第 {} 个开始",
                state.selection.len(),
                first + 1
            );
        }
        self.bump();
        Ok(())
    }

    /// 修改出题参数（生成中不允许）
    pub fn update_settings(&self, settings: GenerationSettings) -> AppResult<()> {
        {
            let mut state = self.state.lock();
            state.expect_settled()?;
            state.settings = settings;
        }
        self.bump();
        Ok(())
    }

    // ========== 会话恢复 ==========

    /// 从导出的题目集合恢复进度
    ///
    /// 需要先有主题注册表；格式错误时不修改任何状态
    pub fn restore_session(&self, persisted: &JsonValue) -> AppResult<RestoreSummary> {
        let summary = {
            let mut state = self.state.lock();
            state.expect_settled()?;
            let restored = restore(persisted, &state.registry, state.settings.target_count)?;

            state.cancel_active();
            state.auto_run = false;
            state.artifacts = restored.artifacts;
            state.cursor = restored.cursor;
            state.phase = Phase::ReadyToGenerate;

            RestoreSummary {
                artifacts: state.artifacts.len(),
                cursor: state.cursor,
            }
        };
        info!(
            "✓ 会话已恢复: {} 道题，从第 {} 个主题继续",
            summary.artifacts,
            summary.cursor + 1
        );
        self.bump();
        Ok(summary)
    }

    // ========== 生成 ==========

    /// 生成下一批
    ///
    /// 要求阶段为 `ready_to_generate`；成功后追加结果并推进游标。
    /// 失败或取消时回到 `ready_to_generate`、关闭自动运行，之前的题目保留。
    pub async fn generate_next_batch(&self) -> AppResult<BatchOutcome> {
        let in_flight = match self.prepare_batch()? {
            Prepared::Completed => return Ok(BatchOutcome::Completed),
            Prepared::Call(in_flight) => in_flight,
        };
        self.bump();

        let token = in_flight.token.clone();
        let result: AppResult<Vec<RawArtifact>> = tokio::select! {
            biased;
            _ = token.cancelled() => Err(LlmError::Cancelled.into()),
            result = self.generator.generate(in_flight.request.clone(), token.clone()) => result,
        };

        let outcome = self.apply_result(in_flight, result);
        self.bump();
        outcome
    }

    fn prepare_batch(&self) -> AppResult<Prepared> {
        let mut state = self.state.lock();
        state.expect_phase(Phase::ReadyToGenerate)?;

        let source_text = match state.source_text.as_deref() {
            Some(text) if !text.trim().is_empty() => text,
            _ => return Err(UserInputError::MissingDocument.into()),
        };
        let source_excerpt = excerpt(source_text, state.settings.source_excerpt_chars);

        let counts = counts_from_artifacts(&state.artifacts);
        let plan = plan_next_batch(
            &state.registry,
            &state.selection,
            &counts,
            state.cursor,
            state.settings.per_call_budget,
            state.settings.target_count,
        );

        if plan.is_empty() {
            state.cursor = plan.new_cursor;
            state.phase = Phase::Completed;
            info!("🏁 所有选中的主题都已达到目标题量");
            drop(state);
            self.bump();
            return Ok(Prepared::Completed);
        }

        let topics = plan
            .batch
            .iter()
            .map(|r| {
                state.registry.get(r.topic_ordinal).map(|t| TopicQuota {
                    topic: t.label.clone(),
                    count: r.requested_count,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        state.cancel_active();
        let token = CancellationToken::new();
        state.active_token = Some(token.clone());
        state.epoch += 1;
        state.phase = Phase::Generating;

        let batch_num = state.batches + 1;
        log_batch_start(batch_num, &plan.batch, &state.registry);
        debug!("计划: {:?}", plan);

        Ok(Prepared::Call(InFlight {
            epoch: state.epoch,
            batch_num,
            batch: plan.batch,
            new_cursor: plan.new_cursor,
            exhausted: plan.exhausted,
            request: GenerationRequest {
                topics,
                source_excerpt,
                language: state.settings.language,
            },
            token,
            strict_remap: state.settings.strict_remap,
        }))
    }

    fn apply_result(
        &self,
        in_flight: InFlight,
        result: AppResult<Vec<RawArtifact>>,
    ) -> AppResult<BatchOutcome> {
        let mut state = self.state.lock();

        // stop() 或 reset() 之后的过期结果
        if state.epoch != in_flight.epoch || in_flight.token.is_cancelled() {
            if state.epoch == in_flight.epoch {
                state.active_token = None;
                state.auto_run = false;
                if state.phase == Phase::Generating {
                    state.phase = Phase::ReadyToGenerate;
                }
            }
            if result.is_ok() {
                debug!("丢弃已取消调用的结果");
            }
            warn!("⏹️ 第 {} 批已取消", in_flight.batch_num);
            return Err(LlmError::Cancelled.into());
        }

        state.active_token = None;

        let remapped = result.and_then(|raw| {
            if in_flight.strict_remap {
                remap_strict(raw, &in_flight.batch)
            } else {
                Ok(remap(raw, &in_flight.batch))
            }
        });

        let artifacts = match remapped {
            Ok(artifacts) => artifacts,
            Err(e) => {
                state.phase = Phase::ReadyToGenerate;
                state.auto_run = false;
                warn!("❌ 第 {} 批失败: {}", in_flight.batch_num, e);
                return Err(e);
            }
        };

        let requested = in_flight.request.total_requested();
        let added = artifacts.len();
        state.artifacts.extend(artifacts);
        state.batches = in_flight.batch_num;

        state.cursor = in_flight.new_cursor;
        let completed = in_flight.exhausted;
        state.phase = if completed {
            Phase::Completed
        } else {
            Phase::ReadyToGenerate
        };

        log_batch_complete(in_flight.batch_num, added, requested);
        if completed {
            info!("🏁 已到达最后一个主题");
        }

        Ok(BatchOutcome::Generated {
            requested,
            added,
            new_cursor: in_flight.new_cursor,
            completed,
        })
    }

    /// 停止进行中的调用
    ///
    /// 令牌立即失效，阶段同步回到 `ready_to_generate`，迟到的结果会被丢弃
    pub fn stop(&self) -> bool {
        let cancelled = {
            let mut state = self.state.lock();
            let cancelled = state.cancel_active();
            state.auto_run = false;
            if state.phase == Phase::Generating {
                state.phase = Phase::ReadyToGenerate;
            }
            cancelled
        };
        if cancelled {
            info!("⏹️ 已请求停止当前调用");
        }
        self.bump();
        cancelled
    }

    // ========== 自动运行 ==========

    /// 切换自动运行，返回切换后的状态
    pub fn toggle_auto_run(&self) -> bool {
        let enabled = {
            let mut state = self.state.lock();
            state.auto_run = !state.auto_run;
            state.auto_run
        };
        info!("{} 自动运行", if enabled { "▶️ 开启" } else { "⏸️ 关闭" });
        self.bump();
        enabled
    }

    pub fn set_auto_run(&self, enabled: bool) {
        {
            let mut state = self.state.lock();
            if state.auto_run == enabled {
                return;
            }
            state.auto_run = enabled;
        }
        self.bump();
    }

    /// 自动运行的触发条件：已开启、阶段为 `ready_to_generate`、没有进行中的调用
    pub fn auto_run_armed(&self) -> bool {
        let state = self.state.lock();
        state.auto_run && state.phase == Phase::ReadyToGenerate && state.active_token.is_none()
    }

    // ========== 只读观察 ==========

    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    pub fn cursor(&self) -> usize {
        self.state.lock().cursor
    }

    pub fn artifact_count(&self) -> usize {
        self.state.lock().artifacts.len()
    }

    pub fn artifacts(&self) -> Vec<Artifact> {
        self.state.lock().artifacts.clone()
    }

    pub fn registry(&self) -> TopicRegistry {
        self.state.lock().registry.clone()
    }

    pub fn settings(&self) -> GenerationSettings {
        self.state.lock().settings.clone()
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        let state = self.state.lock();
        let counts = counts_from_artifacts(&state.artifacts);
        let topics = state
            .registry
            .iter()
            .map(|t| TopicProgress {
                ordinal: t.ordinal,
                label: t.label.clone(),
                selected: state.selection.contains(&t.ordinal),
                count: count_for(&counts, t.ordinal),
                target: state.settings.target_count,
            })
            .collect();

        SchedulerSnapshot {
            phase: state.phase,
            cursor: state.cursor,
            total_topics: state.registry.len(),
            current_topic: state
                .registry
                .get(state.cursor)
                .ok()
                .map(|t| t.label.clone()),
            artifact_count: state.artifacts.len(),
            auto_run: state.auto_run,
            batches: state.batches,
            topics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, RestoreError};
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Notify;

    /// 按请求题量逐条作答的生成器
    struct ScriptedGenerator {
        requests: Mutex<Vec<GenerationRequest>>,
        fail_next: Mutex<bool>,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedGenerator {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                requests: Mutex::new(Vec::new()),
                fail_next: Mutex::new(false),
                gate: None,
            })
        }

        fn gated(gate: Arc<Notify>) -> Arc<Self> {
            Arc::new(Self {
                requests: Mutex::new(Vec::new()),
                fail_next: Mutex::new(false),
                gate: Some(gate),
            })
        }
    }

    #[async_trait]
    impl QuestionGenerator for ScriptedGenerator {
        async fn generate(
            &self,
            request: GenerationRequest,
            _cancel: CancellationToken,
        ) -> AppResult<Vec<RawArtifact>> {
            self.requests.lock().push(request.clone());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if std::mem::take(&mut *self.fail_next.lock()) {
                return Err(AppError::malformed("respuesta truncada"));
            }
            Ok(request
                .topics
                .iter()
                .enumerate()
                .flat_map(|(i, t)| {
                    (0..t.count).map(move |n| RawArtifact {
                        relative_ordinal: i + 1,
                        question: format!("¿Pregunta {} de {}?", n + 1, t.topic),
                        options: vec!["a".into(), "b".into(), "c".into()],
                        answer: 0,
                        explanation: String::new(),
                    })
                })
                .collect())
        }
    }

    fn settings(per_call_budget: usize, target_count: usize) -> GenerationSettings {
        GenerationSettings {
            target_count,
            per_call_budget,
            language: OutputLanguage::Spanish,
            source_excerpt_chars: 1_000,
            strict_remap: false,
        }
    }

    fn ready_coordinator(
        generator: Arc<ScriptedGenerator>,
        per_call_budget: usize,
        target_count: usize,
    ) -> GenerationCoordinator {
        let coordinator = GenerationCoordinator::new(generator, settings(per_call_budget, target_count));
        coordinator.set_document("--- Página 1 ---\n1. Tema A\n2. Tema B\n3. Tema C");
        coordinator.begin_analysis().unwrap();
        coordinator
            .finish_analysis(vec![
                TopicEntry::new("1. Tema A", 10),
                TopicEntry::new("2. Tema B", 10),
                TopicEntry::new("3. Tema C", 10),
            ])
            .unwrap();
        coordinator.confirm_selection().unwrap();
        coordinator
    }

    #[tokio::test]
    async fn test_gap_fill_runs_to_completion() {
        let generator = ScriptedGenerator::new();
        let coordinator = ready_coordinator(generator.clone(), 5, 3);

        let first = coordinator.generate_next_batch().await.unwrap();
        assert_eq!(
            first,
            BatchOutcome::Generated {
                requested: 3,
                added: 3,
                new_cursor: 1,
                completed: false
            }
        );
        assert_eq!(coordinator.phase(), Phase::ReadyToGenerate);

        coordinator.generate_next_batch().await.unwrap();
        let last = coordinator.generate_next_batch().await.unwrap();
        assert!(matches!(last, BatchOutcome::Generated { completed: true, .. }));
        assert_eq!(coordinator.phase(), Phase::Completed);

        let refs: Vec<usize> = coordinator.artifacts().iter().map(|a| a.topic_ref).collect();
        assert_eq!(refs, vec![1, 1, 1, 2, 2, 2, 3, 3, 3]);
        assert_eq!(generator.requests.lock().len(), 3);

        let err = coordinator.generate_next_batch().await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Scheduler(SchedulerError::InvalidPhase {
                actual: Phase::Completed,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_request_carries_labels_and_excerpt() {
        let generator = ScriptedGenerator::new();
        let coordinator = ready_coordinator(generator.clone(), 20, 3);

        coordinator.generate_next_batch().await.unwrap();

        let requests = generator.requests.lock();
        let topics: Vec<(&str, usize)> = requests[0]
            .topics
            .iter()
            .map(|t| (t.topic.as_str(), t.count))
            .collect();
        assert_eq!(
            topics,
            vec![("1. Tema A", 3), ("2. Tema B", 3), ("3. Tema C", 3)]
        );
        assert!(requests[0].source_excerpt.starts_with("--- Página 1 ---"));
        assert_eq!(requests[0].language, OutputLanguage::Spanish);
    }

    #[tokio::test]
    async fn test_generate_requires_confirmation() {
        let coordinator = GenerationCoordinator::new(ScriptedGenerator::new(), settings(5, 3));
        let err = coordinator.generate_next_batch().await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Scheduler(SchedulerError::InvalidPhase {
                expected: Phase::ReadyToGenerate,
                actual: Phase::Idle
            })
        ));
    }

    #[tokio::test]
    async fn test_nothing_to_request_completes_without_calling() {
        let generator = ScriptedGenerator::new();
        let coordinator = ready_coordinator(generator.clone(), 5, 0);

        let outcome = coordinator.generate_next_batch().await.unwrap();
        assert_eq!(outcome, BatchOutcome::Completed);
        assert_eq!(coordinator.phase(), Phase::Completed);
        assert!(generator.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_artifacts() {
        let generator = ScriptedGenerator::new();
        let coordinator = ready_coordinator(generator.clone(), 5, 3);
        coordinator.generate_next_batch().await.unwrap();

        coordinator.set_auto_run(true);
        *generator.fail_next.lock() = true;
        let err = coordinator.generate_next_batch().await.unwrap_err();

        assert!(err.reverts_generation());
        assert_eq!(coordinator.phase(), Phase::ReadyToGenerate);
        assert_eq!(coordinator.artifact_count(), 3);
        assert_eq!(coordinator.cursor(), 1);
        assert!(!coordinator.snapshot().auto_run);

        // 重试会重新请求同一批
        coordinator.generate_next_batch().await.unwrap();
        assert_eq!(coordinator.artifact_count(), 6);
    }

    #[tokio::test]
    async fn test_stop_discards_in_flight_result() {
        let gate = Arc::new(Notify::new());
        let generator = ScriptedGenerator::gated(gate.clone());
        let coordinator = ready_coordinator(generator.clone(), 5, 3);

        let task = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.generate_next_batch().await })
        };
        while coordinator.phase() != Phase::Generating {
            tokio::task::yield_now().await;
        }

        assert!(coordinator.stop());
        assert_eq!(coordinator.phase(), Phase::ReadyToGenerate);

        let err = task.await.unwrap().unwrap_err();
        assert!(err.is_cancellation());
        assert_eq!(coordinator.artifact_count(), 0);
        assert_eq!(coordinator.cursor(), 0);

        gate.notify_one();
        coordinator.generate_next_batch().await.unwrap();

        let requests = generator.requests.lock();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].topics, requests[1].topics);
    }

    #[test]
    fn test_stop_without_call_is_noop() {
        let coordinator = ready_coordinator(ScriptedGenerator::new(), 5, 3);
        assert!(!coordinator.stop());
        assert_eq!(coordinator.phase(), Phase::ReadyToGenerate);
    }

    #[test]
    fn test_analysis_without_document_is_user_error() {
        let coordinator = GenerationCoordinator::new(ScriptedGenerator::new(), settings(5, 3));
        let err = coordinator.begin_analysis().unwrap_err();
        assert!(matches!(
            err,
            AppError::UserInput(UserInputError::MissingDocument)
        ));
        assert_eq!(coordinator.phase(), Phase::Idle);
    }

    #[test]
    fn test_empty_analysis_returns_to_idle() {
        let coordinator = GenerationCoordinator::new(ScriptedGenerator::new(), settings(5, 3));
        coordinator.set_document("texto");
        coordinator.begin_analysis().unwrap();
        assert!(coordinator.finish_analysis(Vec::new()).is_err());
        assert_eq!(coordinator.phase(), Phase::Idle);
    }

    #[test]
    fn test_confirm_moves_cursor_to_first_selected() {
        let coordinator = ready_coordinator(ScriptedGenerator::new(), 5, 3);
        assert!(!coordinator.toggle_topic(0).unwrap());
        coordinator.confirm_selection().unwrap();
        assert_eq!(coordinator.cursor(), 1);

        coordinator.toggle_all(false).unwrap();
        let err = coordinator.confirm_selection().unwrap_err();
        assert!(matches!(
            err,
            AppError::Scheduler(SchedulerError::EmptySelection)
        ));

        let err = coordinator.toggle_topic(7).unwrap_err();
        assert!(matches!(
            err,
            AppError::Scheduler(SchedulerError::TopicOutOfRange { ordinal: 7, len: 3 })
        ));
    }

    #[test]
    fn test_restore_session_sets_cursor() {
        let coordinator = ready_coordinator(ScriptedGenerator::new(), 5, 3);
        let record = |epigrafe: usize| {
            json!({
                "epigrafe": epigrafe,
                "question": "¿Q?",
                "options": ["a", "b", "c"],
                "answer": 1,
                "explanation": ""
            })
        };
        let persisted = JsonValue::Array(
            std::iter::repeat(1)
                .take(3)
                .chain(std::iter::repeat(3).take(5))
                .map(record)
                .collect(),
        );

        let summary = coordinator.restore_session(&persisted).unwrap();
        assert_eq!(summary, RestoreSummary { artifacts: 8, cursor: 1 });
        assert_eq!(coordinator.phase(), Phase::ReadyToGenerate);

        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.current_topic.as_deref(), Some("2. Tema B"));
        assert_eq!(snapshot.topics[2].count, 5);
        assert!(snapshot.topics[2].is_satisfied());
    }

    #[test]
    fn test_bad_restore_leaves_state_untouched() {
        let coordinator = ready_coordinator(ScriptedGenerator::new(), 5, 3);
        let err = coordinator
            .restore_session(&json!({"preguntas": []}))
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Restore(RestoreError::NotAnArray { .. })
        ));
        assert_eq!(coordinator.artifact_count(), 0);
        assert_eq!(coordinator.cursor(), 0);
    }

    #[test]
    fn test_state_changes_bump_revision() {
        let coordinator = ready_coordinator(ScriptedGenerator::new(), 5, 3);
        let mut rx = coordinator.subscribe();
        let before = *rx.borrow_and_update();
        coordinator.toggle_auto_run();
        assert!(rx.has_changed().unwrap());
        assert_ne!(*rx.borrow(), before);
        assert!(coordinator.auto_run_armed());
    }

    #[test]
    fn test_reset_clears_everything_but_document() {
        let coordinator = ready_coordinator(ScriptedGenerator::new(), 5, 3);
        coordinator.reset();
        assert_eq!(coordinator.phase(), Phase::Idle);
        assert_eq!(coordinator.snapshot().total_topics, 0);
        assert!(coordinator.has_document());
    }
}
