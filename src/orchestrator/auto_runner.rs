//! 自动运行 - 编排层
//!
//! 订阅协调器的修订号：条件满足时挂一个延时，到点前状态有任何变化就放弃这次延时，
//! 到点后重新检查条件再调用 `generate_next_batch`。

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::orchestrator::coordinator::{BatchOutcome, GenerationCoordinator};

/// 自动运行任务
pub struct AutoRunner {
    handle: JoinHandle<()>,
    shutdown: CancellationToken,
}

impl AutoRunner {
    /// 启动自动运行任务
    ///
    /// 任务本身不修改 `auto_run` 标志，只在标志开启时工作
    pub fn spawn(coordinator: GenerationCoordinator, delay: Duration) -> Self {
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run_loop(coordinator, delay, shutdown.clone()));
        Self { handle, shutdown }
    }

    /// 停止任务并等待退出（不会打断进行中的调用）
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.handle.await {
            warn!("自动运行任务异常退出: {}", e);
        }
    }
}

async fn run_loop(coordinator: GenerationCoordinator, delay: Duration, shutdown: CancellationToken) {
    let mut revisions = coordinator.subscribe();

    loop {
        revisions.borrow_and_update();

        if !coordinator.auto_run_armed() {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                changed = revisions.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            continue;
        }

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            changed = revisions.changed() => {
                if changed.is_err() {
                    break;
                }
                debug!("状态已变化，放弃本次自动运行");
            }
            _ = tokio::time::sleep(delay) => {
                if !coordinator.auto_run_armed() {
                    continue;
                }
                match coordinator.generate_next_batch().await {
                    Ok(BatchOutcome::Completed) => debug!("自动运行: 已完成"),
                    Ok(BatchOutcome::Generated { completed, .. }) => {
                        if completed {
                            debug!("自动运行: 最后一批已完成");
                        }
                    }
                    Err(e) if e.is_cancellation() => debug!("自动运行: 调用已取消"),
                    Err(e) => warn!("⚠️ 自动运行已停止: {}", e),
                }
            }
        }
    }

    debug!("自动运行任务退出");
}
