//! QueryService port - タスク 1 件のクエリ実行
//!
//! 具体的なエンジン（DWH クライアント、コマンドラインツールなど）はこの trait の裏にある。
//! エラーはそのままタスクの失敗として扱う。

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::{CapabilityError, Task};

/// QueryService はタスクのクエリを実行して結果を JSON で返す
#[async_trait]
pub trait QueryService: Send + Sync {
    /// タスクのクエリを実行
    ///
    /// `cancel` が発火したら速やかに `CapabilityError::Cancelled` で戻ること。
    async fn execute(
        &self,
        task: &Task,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, CapabilityError>;
}
