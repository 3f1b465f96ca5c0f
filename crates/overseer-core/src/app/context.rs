//! JobContext - フェーズが共有する現在のジョブの情報

use tokio_util::sync::CancellationToken;

use crate::domain::JobId;

/// JobContext は JobId と、1 回のコマンド実行のキャンセル信号
///
/// Clone はトークンを共有する（どれか 1 つで cancel すれば全体に伝わる）。
#[derive(Debug, Clone)]
pub struct JobContext {
    job_id: JobId,
    cancel: CancellationToken,
}

impl JobContext {
    /// 新しいトークンで作成
    pub fn new(job_id: JobId) -> Self {
        Self::with_cancel(job_id, CancellationToken::new())
    }

    /// 外部のトークン（Ctrl+C など）と結び付けて作成
    pub fn with_cancel(job_id: JobId, cancel: CancellationToken) -> Self {
        Self { job_id, cancel }
    }

    /// 対象ジョブ
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// キャンセルトークン
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// キャンセル済みか
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
