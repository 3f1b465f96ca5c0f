//! ports のテストダブル
//!
//! # 学習ポイント
//! - 外部システムなしで Runner / Evaluator を検証する
//! - builder 風のメソッドで振る舞い（失敗・遅延・停止）を組み立てる

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::{Alert, AlertBody, AlertId, CacheEntry, CapabilityError, Task};
use crate::ports::{IdGenerator, NotifyService, PolicyService, QueryService};

/// 決定的に増加する AlertId
pub struct SequenceIds {
    next: AtomicU64,
}

impl SequenceIds {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequenceIds {
    fn generate_alert_id(&self) -> AlertId {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        AlertId::from(Uuid::from_u128(n as u128))
    }
}

/// Query のダブル: タスクごとの固定結果と呼び出し記録
#[derive(Default)]
pub struct FakeQuery {
    failing: HashSet<String>,
    stalling: HashSet<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl FakeQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, task_id: &str) -> Self {
        self.failing.insert(task_id.to_string());
        self
    }

    /// 全タスクを `delay` だけ遅らせる（キャンセルされれば即終了）
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// このタスクはキャンセルされるまで戻らない
    pub fn stalling(mut self, task_id: &str) -> Self {
        self.stalling.insert(task_id.to_string());
        self
    }

    /// 呼び出されたタスク ID（完了順に依存しないようソート済み）
    pub fn calls(&self) -> Vec<String> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort();
        calls
    }
}

#[async_trait]
impl QueryService for FakeQuery {
    async fn execute(
        &self,
        task: &Task,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, CapabilityError> {
        let id = task.id().to_string();
        self.calls.lock().unwrap().push(id.clone());

        if self.stalling.contains(&id) {
            cancel.cancelled().await;
            return Err(CapabilityError::Cancelled);
        }
        if let Some(delay) = self.delay {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => return Err(CapabilityError::Cancelled),
            }
        }
        if self.failing.contains(&id) {
            return Err(CapabilityError::Failed(format!("query {id} exploded")));
        }
        Ok(serde_json::json!([{ "task": id }]))
    }
}

/// Policy のダブル: タスクごとの AlertBody または失敗
#[derive(Default)]
pub struct FakePolicy {
    bodies: HashMap<String, Vec<AlertBody>>,
    failing: HashSet<String>,
    stalling: HashSet<String>,
    seen: Mutex<Vec<CacheEntry>>,
}

impl FakePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(mut self, task_id: &str, bodies: Vec<AlertBody>) -> Self {
        self.bodies.insert(task_id.to_string(), bodies);
        self
    }

    pub fn failing(mut self, task_id: &str) -> Self {
        self.failing.insert(task_id.to_string());
        self
    }

    /// このタスクの評価は終わらない（呼び出し側のキャンセル待ち）
    pub fn stalling(mut self, task_id: &str) -> Self {
        self.stalling.insert(task_id.to_string());
        self
    }

    /// evaluate に渡されたエントリ（呼び出し順）
    pub fn seen(&self) -> Vec<CacheEntry> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl PolicyService for FakePolicy {
    async fn evaluate(&self, entry: &CacheEntry) -> Result<Vec<AlertBody>, CapabilityError> {
        self.seen.lock().unwrap().push(entry.clone());
        let id = entry.task_id.as_str();
        if self.stalling.contains(id) {
            std::future::pending::<()>().await;
        }
        if self.failing.contains(id) {
            return Err(CapabilityError::Failed(format!("policy for {id} exploded")));
        }
        Ok(self.bodies.get(id).cloned().unwrap_or_default())
    }
}

/// Notify のダブル: Alert を記録し、指定タイトルは拒否する
#[derive(Default)]
pub struct RecordingNotify {
    rejected_titles: HashSet<String>,
    sent: Mutex<Vec<Alert>>,
}

impl RecordingNotify {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(mut self, title: &str) -> Self {
        self.rejected_titles.insert(title.to_string());
        self
    }

    /// 送信に成功した Alert（送信順）
    pub fn sent(&self) -> Vec<Alert> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotifyService for RecordingNotify {
    async fn publish(&self, alert: &Alert) -> Result<(), CapabilityError> {
        if self.rejected_titles.contains(alert.title()) {
            return Err(CapabilityError::Failed("transport unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(alert.clone());
        Ok(())
    }
}
