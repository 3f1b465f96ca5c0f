//! Runner - Run フェーズ
//!
//! # フロー
//! 1. タスク集合と Target を検証して選択（I/O の前に失敗させる）
//! 2. 必要ならジョブのパーティションを消去（reset）
//! 3. タスクごとに QueryService::execute → CacheService::put
//! 4. 全タスクの実行後、失敗をまとめて報告
//!
//! # キャンセル
//! - バッチ全体がキャンセルトークンと競争する
//! - キャンセル時はこの Run が書き込んだエントリを削除し、`Cancelled` を返す
//!   （途中までの結果を「完了した Run」として Eval に見せない）

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tracing::{Instrument, debug, info, info_span, warn};

use super::context::JobContext;
use crate::domain::{
    BatchFailure, CacheError, CapabilityError, OverseerError, Phase, Target, Task, TaskId,
    failure_chain, validate_tasks,
};
use crate::ports::{CacheService, QueryService};

/// RunSettings は Runner の実行設定
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// 同時に実行するクエリ数
    pub concurrency: usize,
    /// クエリごとの締め切り（None なら無制限）
    pub query_timeout: Option<Duration>,
    /// 実行前にジョブのキャッシュを消去する
    pub reset: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            query_timeout: None,
            reset: false,
        }
    }
}

/// 成功した Run の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// 結果をキャッシュしたタスク（選択順）
    pub cached: Vec<TaskId>,
}

/// Runner は選択したタスクを実行し、結果をジョブのキャッシュに書き込む
///
/// # 設計原則
/// - 1 タスクの失敗で他のタスクを止めない
/// - 既存エントリは上書きしない（再実行は reset が必要）
pub struct Runner {
    cache: Arc<dyn CacheService>,
    query: Arc<dyn QueryService>,
    settings: RunSettings,
}

impl Runner {
    /// 新しい Runner を作成（通常は PipelineBuilder 経由）
    pub fn new(
        cache: Arc<dyn CacheService>,
        query: Arc<dyn QueryService>,
        settings: RunSettings,
    ) -> Self {
        Self {
            cache,
            query,
            settings,
        }
    }

    /// 実行設定
    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Target に一致するタスクを実行し、結果をキャッシュ
    ///
    /// # エラー
    /// - `DuplicateTaskId` / `NoTasksConfigured`: タスク集合が不正（I/O なし）
    /// - `InvalidTarget` / `NoTasksSelected`: Target が不正または一致なし（I/O なし）
    /// - `Batch`: 一部のタスクが失敗（成功分はキャッシュ済み）
    /// - `Cancelled`: キャンセルされた（この Run の書き込みは削除済み）
    pub async fn run(
        &self,
        ctx: &JobContext,
        tasks: &[Task],
        target: &Target,
    ) -> Result<RunReport, OverseerError> {
        let span = info_span!("run", job_id = %ctx.job_id());
        self.run_inner(ctx, tasks, target).instrument(span).await
    }

    async fn run_inner(
        &self,
        ctx: &JobContext,
        tasks: &[Task],
        target: &Target,
    ) -> Result<RunReport, OverseerError> {
        validate_tasks(tasks)?;
        let selected = target.select(tasks)?;
        info!(selected = selected.len(), configured = tasks.len(), "tasks selected");

        if ctx.is_cancelled() {
            return Err(OverseerError::Cancelled);
        }

        let written = Mutex::new(Vec::new());
        let work = async {
            if self.settings.reset {
                let removed = self.cache.clear(ctx.job_id()).await?;
                info!(removed, "cleared job partition");
            }
            let outcomes: Vec<Result<TaskId, OverseerError>> = stream::iter(&selected)
                .map(|task| self.run_task(ctx, task, &written))
                .buffered(self.settings.concurrency.max(1))
                .collect()
                .await;
            Ok::<_, OverseerError>(outcomes)
        };

        let finished = tokio::select! {
            biased;
            _ = ctx.cancel_token().cancelled() => None,
            outcomes = work => Some(outcomes?),
        };
        let outcomes = match finished {
            Some(outcomes) if !ctx.is_cancelled() => outcomes,
            _ => {
                self.discard(ctx, written.into_inner()).await;
                return Err(OverseerError::Cancelled);
            }
        };

        let mut cached = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(task_id) => cached.push(task_id),
                Err(e) => {
                    warn!(error = %failure_chain(&e), "task failed");
                    failures.push(e);
                }
            }
        }

        if !failures.is_empty() {
            return Err(OverseerError::Batch(BatchFailure {
                phase: Phase::Run,
                attempted: selected.len(),
                failures,
            }));
        }

        info!(cached = cached.len(), "run finished");
        Ok(RunReport { cached })
    }

    async fn run_task(
        &self,
        ctx: &JobContext,
        task: &Task,
        written: &Mutex<Vec<TaskId>>,
    ) -> Result<TaskId, OverseerError> {
        let task_id = task.id();
        debug!(%task_id, "executing query");

        let query = self.query.execute(task, ctx.cancel_token());
        let result = match self.settings.query_timeout {
            Some(limit) => tokio::time::timeout(limit, query)
                .await
                .unwrap_or(Err(CapabilityError::Timeout(limit))),
            None => query.await,
        };
        let payload = result.map_err(|source| OverseerError::TaskExecutionFailed {
            task_id: task_id.clone(),
            source,
        })?;

        self.cache
            .put(ctx.job_id(), task_id, payload)
            .await
            .map_err(|e| cache_write_error(task_id, e))?;
        written.lock().await.push(task_id.clone());

        info!(%task_id, "query result cached");
        Ok(task_id.clone())
    }

    /// キャンセルされた Run が書き込んだエントリを削除
    ///
    /// 削除の失敗はログに残すだけで、結果は `Cancelled` のまま。
    async fn discard(&self, ctx: &JobContext, written: Vec<TaskId>) {
        warn!(written = written.len(), "run cancelled; discarding partial results");
        for task_id in &written {
            if let Err(e) = self.cache.remove(ctx.job_id(), task_id).await {
                warn!(%task_id, error = %failure_chain(&e), "failed to discard cached result");
            }
        }
    }
}

fn cache_write_error(task_id: &TaskId, e: CacheError) -> OverseerError {
    match e {
        CacheError::DuplicateKey { job_id, task_id } => {
            OverseerError::DuplicateCacheKey { job_id, task_id }
        }
        source => OverseerError::CacheWriteFailed {
            task_id: task_id.clone(),
            source,
        },
    }
}
