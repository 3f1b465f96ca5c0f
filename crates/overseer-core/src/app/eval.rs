//! Evaluator - Eval フェーズ
//!
//! # フロー
//! 1. ジョブのキャッシュエントリを列挙（0 件なら EmptyJobCache）
//! 2. エントリごとに PolicyService::evaluate → Alert::new → NotifyService::publish
//! 3. バッチ全体の実行後、失敗をまとめて報告
//!
//! # 学習ポイント
//! - 1 件の失敗でバッチを止めない（失敗は集めて最後に `Batch` として返す）
//! - キャンセル時は残りのエントリを評価せず `Cancelled` を返す
//! - 送信済みの Alert は取り消せない

use std::sync::Arc;

use futures::TryStreamExt;
use futures::stream::{self, StreamExt};
use tracing::{Instrument, debug, info, info_span, warn};

use super::context::JobContext;
use crate::domain::{
    Alert, AlertId, BatchFailure, CacheEntry, OverseerError, Phase, failure_chain,
};
use crate::ports::{CacheService, Clock, IdGenerator, NotifyService, PolicyService};

/// EvalSettings は Evaluator の実行設定
#[derive(Debug, Clone)]
pub struct EvalSettings {
    /// 同時に評価するエントリ数
    pub concurrency: usize,
}

impl Default for EvalSettings {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

/// 成功した Eval の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalReport {
    /// 評価したエントリ数
    pub entries: usize,
    /// 送信した AlertId（エントリの列挙順にまとまる）
    pub alerts: Vec<AlertId>,
}

/// 1 エントリの評価結果
#[derive(Default)]
struct EntryOutcome {
    dispatched: Vec<AlertId>,
    failures: Vec<OverseerError>,
}

/// Evaluator はジョブのキャッシュを評価して Alert を送る
///
/// # 設計原則
/// - Clock / IdGenerator を注入し、Alert の時刻と ID をテストで固定できる
/// - エントリは `buffered` で並行評価しつつ、結果の順序は列挙順を保つ
pub struct Evaluator {
    cache: Arc<dyn CacheService>,
    policy: Arc<dyn PolicyService>,
    notify: Arc<dyn NotifyService>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    settings: EvalSettings,
}

impl Evaluator {
    /// 新しい Evaluator を作成（通常は PipelineBuilder 経由）
    pub fn new(
        cache: Arc<dyn CacheService>,
        policy: Arc<dyn PolicyService>,
        notify: Arc<dyn NotifyService>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        settings: EvalSettings,
    ) -> Self {
        Self {
            cache,
            policy,
            notify,
            clock,
            ids,
            settings,
        }
    }

    /// 実行設定
    pub fn settings(&self) -> &EvalSettings {
        &self.settings
    }

    /// ジョブのキャッシュを評価し、生成された Alert を送信
    ///
    /// # エラー
    /// - `EmptyJobCache`: エントリが 1 件もない（何も送信しない）
    /// - `Cache`: 列挙に失敗（部分的に読めたパーティションは信用しない）
    /// - `Batch`: 一部のエントリ・Alert が失敗（残りは処理済み）
    /// - `Cancelled`: キャンセルされた
    pub async fn eval(&self, ctx: &JobContext) -> Result<EvalReport, OverseerError> {
        let span = info_span!("eval", job_id = %ctx.job_id());
        self.eval_inner(ctx).instrument(span).await
    }

    async fn eval_inner(&self, ctx: &JobContext) -> Result<EvalReport, OverseerError> {
        if ctx.is_cancelled() {
            return Err(OverseerError::Cancelled);
        }

        let work = async {
            let entries: Vec<CacheEntry> = self.cache.entries(ctx.job_id()).try_collect().await?;
            if entries.is_empty() {
                return Err(OverseerError::EmptyJobCache(ctx.job_id().clone()));
            }
            info!(entries = entries.len(), "evaluating cached entries");

            let outcomes: Vec<EntryOutcome> = stream::iter(&entries)
                .map(|entry| self.eval_entry(ctx, entry))
                .buffered(self.settings.concurrency.max(1))
                .collect()
                .await;
            Ok::<_, OverseerError>((entries.len(), outcomes))
        };

        let (entry_count, outcomes) = tokio::select! {
            biased;
            _ = ctx.cancel_token().cancelled() => {
                warn!("eval cancelled; discarding partial results");
                return Err(OverseerError::Cancelled);
            }
            result = work => result?,
        };
        if ctx.is_cancelled() {
            return Err(OverseerError::Cancelled);
        }

        let mut alerts = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            alerts.extend(outcome.dispatched);
            failures.extend(outcome.failures);
        }

        if !failures.is_empty() {
            return Err(OverseerError::Batch(BatchFailure {
                phase: Phase::Eval,
                attempted: entry_count,
                failures,
            }));
        }

        info!(entries = entry_count, alerts = alerts.len(), "eval finished");
        Ok(EvalReport {
            entries: entry_count,
            alerts,
        })
    }

    async fn eval_entry(&self, ctx: &JobContext, entry: &CacheEntry) -> EntryOutcome {
        let task_id = &entry.task_id;
        let mut outcome = EntryOutcome::default();

        let bodies = match self.policy.evaluate(entry).await {
            Ok(bodies) => bodies,
            Err(source) => {
                let err = OverseerError::PolicyFailed {
                    task_id: task_id.clone(),
                    source,
                };
                warn!(error = %failure_chain(&err), "policy failed");
                outcome.failures.push(err);
                return outcome;
            }
        };
        debug!(%task_id, alerts = bodies.len(), "policy evaluated");

        for body in bodies {
            let alert = match Alert::new(ctx.job_id(), body, self.clock.as_ref(), self.ids.as_ref())
            {
                Ok(alert) => alert,
                Err(source) => {
                    warn!(%task_id, error = %source, "alert rejected");
                    outcome.failures.push(OverseerError::AlertRejected {
                        task_id: task_id.clone(),
                        source: Box::new(source),
                    });
                    continue;
                }
            };

            match self.notify.publish(&alert).await {
                Ok(()) => {
                    info!(%task_id, alert_id = %alert.id(), "alert dispatched");
                    outcome.dispatched.push(alert.id());
                }
                Err(source) => {
                    let err = OverseerError::AlertDispatchFailed {
                        alert_id: alert.id(),
                        source,
                    };
                    warn!(error = %failure_chain(&err), "dispatch failed");
                    outcome.failures.push(err);
                }
            }
        }
        outcome
    }
}
