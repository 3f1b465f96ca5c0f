//! CacheService port - クエリ結果の job スコープストレージ
//!
//! エントリのキーは (JobId, TaskId)。Run フェーズが書き、Eval フェーズが読む。
//! あるジョブのパーティションに別のジョブが触れることはない。
//!
//! # 実装
//! - **InMemoryCache**: プロセス内（テスト、1 プロセスで両フェーズを回す場合）
//! - **FileCache**: ジョブごとに 1 ディレクトリ（別プロセス間で共有できる）

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::domain::{CacheEntry, CacheError, JobId, TaskId};

/// CacheService は (job, task) ごとに 1 エントリを保存
///
/// # 契約
/// - `put` は上書きしない: 既存キーは `DuplicateKey` で失敗
/// - `entries` は有限のストリーム。呼ぶたびに最初から列挙する
/// - 同じストアなら列挙順は安定（同梱の実装は TaskId 順）
#[async_trait]
pub trait CacheService: Send + Sync {
    /// 結果を保存（既存キーなら `DuplicateKey`）
    async fn put(
        &self,
        job_id: &JobId,
        task_id: &TaskId,
        payload: serde_json::Value,
    ) -> Result<(), CacheError>;

    /// 1 エントリを取得（無ければ None）
    async fn get(
        &self,
        job_id: &JobId,
        task_id: &TaskId,
    ) -> Result<Option<CacheEntry>, CacheError>;

    /// ジョブのパーティションの全エントリを列挙
    fn entries<'a>(&'a self, job_id: &'a JobId) -> BoxStream<'a, Result<CacheEntry, CacheError>>;

    /// 1 エントリを削除。存在したかどうかを返す
    ///
    /// キャンセルされた Run が自分の書き込みを取り消すのに使う。
    async fn remove(&self, job_id: &JobId, task_id: &TaskId) -> Result<bool, CacheError>;

    /// ジョブのパーティションを破棄。削除したエントリ数を返す
    async fn clear(&self, job_id: &JobId) -> Result<usize, CacheError>;
}
