//! JsonLinesNotify - Alert を 1 行 1 JSON で書き出す
//!
//! pub/sub publisher の代わり。stdout に向けて実際の通知経路へパイプするか、
//! 追記専用ファイルに向ける。

use std::path::Path;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::{Alert, CapabilityError};
use crate::ports::NotifyService;

/// JsonLinesNotify は任意の AsyncWrite に Alert を書く NotifyService
pub struct JsonLinesNotify {
    out: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
}

impl JsonLinesNotify {
    /// 任意の writer から作成
    pub fn from_writer(writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(writer)),
        }
    }

    /// 標準出力へ書く
    pub fn stdout() -> Self {
        Self::from_writer(tokio::io::stdout())
    }

    /// `path` に追記する（無ければ作成）
    pub async fn append_to(path: &Path) -> Result<Self, CapabilityError> {
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self::from_writer(file))
    }
}

#[async_trait]
impl NotifyService for JsonLinesNotify {
    async fn publish(&self, alert: &Alert) -> Result<(), CapabilityError> {
        let mut line = serde_json::to_vec(alert)?;
        line.push(b'\n');

        // 1 行ごとにロックを取り、並行送信でも行が混ざらない
        let mut out = self.out.lock().await;
        out.write_all(&line).await?;
        out.flush().await?;
        debug!(alert_id = %alert.id(), "alert written");
        Ok(())
    }
}
