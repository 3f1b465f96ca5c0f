//! Errors - エラー型と分類
//!
//! # 学習ポイント
//! - thiserror による enum エラー（`#[source]` で原因を連鎖）
//! - ErrorKind による運用分類（CLI の終了コードはこれで決まる）
//! - バッチ内の失敗は集めて [`OverseerError::Batch`] で返し、それ以外は即座に返す

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use super::ids::{AlertId, JobId, TaskId};

/// ErrorKind は [`OverseerError`] の運用分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// I/O の前に拒否（選択なし、空のジョブキャッシュ）
    FailFast,
    /// 入力データの不正（Alert 本体、タスク定義、ID）
    Validation,
    /// 外部の協調者（query / policy / notify / cache）の失敗
    Collaborator,
    /// バッチが 1 件以上の失敗で終了
    Aggregate,
    /// ジョブコンテキストがキャンセルされた
    Cancelled,
}

/// OverseerError はドメインエラー
#[derive(Debug, Error)]
pub enum OverseerError {
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("no task matched target (tags={tags:?}, ids={ids:?})")]
    NoTasksSelected { tags: Vec<String>, ids: Vec<String> },

    #[error("no tasks configured")]
    NoTasksConfigured,

    #[error("duplicate task id: {0}")]
    DuplicateTaskId(TaskId),

    #[error("invalid task: {0}")]
    InvalidTask(String),

    #[error("job id is required")]
    MissingJobId,

    #[error("alert title is required")]
    MissingTitle,

    #[error("malformed timestamp {value}: {reason}")]
    MalformedTimestamp { value: String, reason: String },

    #[error("unsupported timestamp type: {value}")]
    UnsupportedTimestampType { value: String },

    #[error("invalid alert: {0}")]
    InvalidAlert(String),

    #[error("unsupported alert schema version: {0}")]
    UnsupportedAlertVersion(String),

    #[error("cache entry already exists for job_id={job_id} task_id={task_id}")]
    DuplicateCacheKey { job_id: JobId, task_id: TaskId },

    #[error("no cached results for job_id={0}")]
    EmptyJobCache(JobId),

    #[error("task {task_id} failed")]
    TaskExecutionFailed {
        task_id: TaskId,
        #[source]
        source: CapabilityError,
    },

    #[error("caching result of task {task_id} failed")]
    CacheWriteFailed {
        task_id: TaskId,
        #[source]
        source: CacheError,
    },

    #[error("policy evaluation failed for task {task_id}")]
    PolicyFailed {
        task_id: TaskId,
        #[source]
        source: CapabilityError,
    },

    #[error("alert from task {task_id} rejected")]
    AlertRejected {
        task_id: TaskId,
        #[source]
        source: Box<OverseerError>,
    },

    #[error("alert {alert_id} dispatch failed")]
    AlertDispatchFailed {
        alert_id: AlertId,
        #[source]
        source: CapabilityError,
    },

    #[error(transparent)]
    Cache(CacheError),

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Batch(BatchFailure),
}

impl OverseerError {
    /// 運用分類を返す
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidTarget(_)
            | Self::NoTasksSelected { .. }
            | Self::NoTasksConfigured
            | Self::EmptyJobCache(_) => ErrorKind::FailFast,
            Self::DuplicateTaskId(_)
            | Self::InvalidTask(_)
            | Self::MissingJobId
            | Self::MissingTitle
            | Self::MalformedTimestamp { .. }
            | Self::UnsupportedTimestampType { .. }
            | Self::InvalidAlert(_)
            | Self::UnsupportedAlertVersion(_)
            | Self::AlertRejected { .. } => ErrorKind::Validation,
            Self::DuplicateCacheKey { .. }
            | Self::TaskExecutionFailed { .. }
            | Self::CacheWriteFailed { .. }
            | Self::PolicyFailed { .. }
            | Self::AlertDispatchFailed { .. }
            | Self::Cache(_) => ErrorKind::Collaborator,
            Self::Batch(_) => ErrorKind::Aggregate,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl From<CacheError> for OverseerError {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::DuplicateKey { job_id, task_id } => {
                Self::DuplicateCacheKey { job_id, task_id }
            }
            other => Self::Cache(other),
        }
    }
}

/// [`BatchFailure`] の発生フェーズ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Run,
    Eval,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Run => f.write_str("run"),
            Phase::Eval => f.write_str("eval"),
        }
    }
}

/// BatchFailure は 1 バッチ分の失敗をまとめたもの
///
/// バッチ全体が終わってから報告する（途中で止めない）。
#[derive(Debug)]
pub struct BatchFailure {
    /// 発生フェーズ
    pub phase: Phase,
    /// 試行した件数（Run はタスク数、Eval はエントリ数）
    pub attempted: usize,
    /// 失敗の一覧（発生順ではなく入力順）
    pub failures: Vec<OverseerError>,
}

impl BatchFailure {
    /// 失敗に含まれる TaskId（failures の順）
    pub fn failed_tasks(&self) -> Vec<&TaskId> {
        self.failures
            .iter()
            .filter_map(|e| match e {
                OverseerError::TaskExecutionFailed { task_id, .. }
                | OverseerError::CacheWriteFailed { task_id, .. }
                | OverseerError::PolicyFailed { task_id, .. }
                | OverseerError::AlertRejected { task_id, .. }
                | OverseerError::DuplicateCacheKey { task_id, .. } => Some(task_id),
                _ => None,
            })
            .collect()
    }

    /// 送信に失敗した AlertId
    pub fn failed_alerts(&self) -> Vec<AlertId> {
        self.failures
            .iter()
            .filter_map(|e| match e {
                OverseerError::AlertDispatchFailed { alert_id, .. } => Some(*alert_id),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} batch: {} failure(s) out of {} item(s)",
            self.phase,
            self.failures.len(),
            self.attempted
        )?;
        for failure in &self.failures {
            write!(f, "\n  - {}", failure_chain(failure))?;
        }
        Ok(())
    }
}

impl std::error::Error for BatchFailure {}

/// エラーと source の連鎖を 1 行に整形
///
/// # 例
/// `task a failed: command exited with exit status: 1: boom`
pub fn failure_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

/// CacheError は job スコープキャッシュのエラー
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache entry already exists for job_id={job_id} task_id={task_id}")]
    DuplicateKey { job_id: JobId, task_id: TaskId },

    #[error("cache io: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache codec: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("corrupted cache entry {path}: {reason}")]
    Corrupted { path: String, reason: String },
}

/// CapabilityError は外部ケイパビリティ（query / policy / notify）のエラー
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("{0}")]
    Failed(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("cancelled")]
    Cancelled,

    #[error("command exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}
