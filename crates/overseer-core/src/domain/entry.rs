//! CacheEntry - キャッシュされたクエリ結果

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::TaskId;

/// CacheEntry は Run フェーズが書いた 1 タスク分の生の結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// 結果を生んだタスク
    pub task_id: TaskId,
    /// 書き込み時刻（キャッシュの Clock）
    pub stored_at: DateTime<Utc>,
    /// クエリの出力（JSON のまま保持）
    pub payload: serde_json::Value,
}

impl CacheEntry {
    pub fn new(task_id: TaskId, stored_at: DateTime<Utc>, payload: serde_json::Value) -> Self {
        Self {
            task_id,
            stored_at,
            payload,
        }
    }
}
