//! NotifyService port - Alert を通知経路に渡す
//!
//! コアはリトライしない。リトライ方針は実装側の責務。

use async_trait::async_trait;

use crate::domain::{Alert, CapabilityError};

/// NotifyService は検証済みの Alert を送信
#[async_trait]
pub trait NotifyService: Send + Sync {
    /// Alert を 1 件送信
    async fn publish(&self, alert: &Alert) -> Result<(), CapabilityError>;
}
