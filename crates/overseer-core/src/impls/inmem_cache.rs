//! InMemoryCache - プロセス内の job スコープキャッシュ
//!
//! テストや、1 プロセスで Run と Eval を続けて回すときに使う。
//! エントリはプロセス終了とともに消える。

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::{CacheEntry, CacheError, JobId, TaskId};
use crate::ports::{CacheService, Clock, SystemClock};

type Partition = BTreeMap<TaskId, CacheEntry>;

/// InMemoryCache はジョブごとに 1 パーティションを持つ
///
/// # 詳細
/// - `RwLock` の中に `HashMap<JobId, BTreeMap<TaskId, CacheEntry>>`
/// - `entries` は最初の poll でパーティションのスナップショットを取る
///   （消費側の処理中にロックを握り続けない）
/// - BTreeMap なので列挙は TaskId 順
pub struct InMemoryCache<C = SystemClock> {
    partitions: Arc<RwLock<HashMap<JobId, Partition>>>,
    clock: C,
}

impl InMemoryCache<SystemClock> {
    /// システム時刻で `stored_at` を刻むキャッシュを作成
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl<C: Clock> InMemoryCache<C> {
    /// Clock を差し替えて作成
    pub fn with_clock(clock: C) -> Self {
        Self {
            partitions: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }
}

impl Default for InMemoryCache<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<C: Clock> CacheService for InMemoryCache<C> {
    async fn put(
        &self,
        job_id: &JobId,
        task_id: &TaskId,
        payload: serde_json::Value,
    ) -> Result<(), CacheError> {
        let mut partitions = self.partitions.write().await;
        let partition = partitions.entry(job_id.clone()).or_default();
        if partition.contains_key(task_id) {
            return Err(CacheError::DuplicateKey {
                job_id: job_id.clone(),
                task_id: task_id.clone(),
            });
        }
        let entry = CacheEntry::new(task_id.clone(), self.clock.now(), payload);
        partition.insert(task_id.clone(), entry);
        debug!(%job_id, %task_id, "cached result in memory");
        Ok(())
    }

    async fn get(
        &self,
        job_id: &JobId,
        task_id: &TaskId,
    ) -> Result<Option<CacheEntry>, CacheError> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .get(job_id)
            .and_then(|partition| partition.get(task_id))
            .cloned())
    }

    fn entries<'a>(&'a self, job_id: &'a JobId) -> BoxStream<'a, Result<CacheEntry, CacheError>> {
        stream::once(async move {
            let partitions = self.partitions.read().await;
            let snapshot: Vec<Result<CacheEntry, CacheError>> = partitions
                .get(job_id)
                .map(|partition| partition.values().cloned().map(Ok).collect())
                .unwrap_or_default();
            stream::iter(snapshot)
        })
        .flatten()
        .boxed()
    }

    async fn remove(&self, job_id: &JobId, task_id: &TaskId) -> Result<bool, CacheError> {
        let mut partitions = self.partitions.write().await;
        let Some(partition) = partitions.get_mut(job_id) else {
            return Ok(false);
        };
        let removed = partition.remove(task_id).is_some();
        if partition.is_empty() {
            partitions.remove(job_id);
        }
        Ok(removed)
    }

    async fn clear(&self, job_id: &JobId) -> Result<usize, CacheError> {
        let mut partitions = self.partitions.write().await;
        Ok(partitions.remove(job_id).map(|p| p.len()).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};
    use futures::TryStreamExt;
    use serde_json::json;

    fn job(id: &str) -> JobId {
        JobId::new(id).unwrap()
    }

    fn task(id: &str) -> TaskId {
        TaskId::new(id).unwrap()
    }

    #[tokio::test]
    async fn put_then_get_roundtrip() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let cache = InMemoryCache::with_clock(FixedClock::new(at));
        cache.put(&job("j1"), &task("a"), json!([{"n": 1}])).await.unwrap();

        let entry = cache.get(&job("j1"), &task("a")).await.unwrap().unwrap();
        assert_eq!(entry.payload, json!([{"n": 1}]));
        assert_eq!(entry.stored_at, at);
        assert_eq!(entry.task_id, task("a"));
    }

    #[tokio::test]
    async fn second_put_is_rejected_and_first_value_kept() {
        let cache = InMemoryCache::new();
        cache.put(&job("j1"), &task("a"), json!(1)).await.unwrap();

        let err = cache.put(&job("j1"), &task("a"), json!(2)).await.unwrap_err();
        assert!(matches!(err, CacheError::DuplicateKey { .. }));

        let entry = cache.get(&job("j1"), &task("a")).await.unwrap().unwrap();
        assert_eq!(entry.payload, json!(1));
    }

    #[tokio::test]
    async fn partitions_are_isolated_by_job() {
        let cache = InMemoryCache::new();
        cache.put(&job("j1"), &task("a"), json!(1)).await.unwrap();
        cache.put(&job("j2"), &task("a"), json!(2)).await.unwrap();
        cache.put(&job("j2"), &task("b"), json!(3)).await.unwrap();

        let j1: Vec<_> = cache.entries(&job("j1")).try_collect().await.unwrap();
        let j2: Vec<_> = cache.entries(&job("j2")).try_collect().await.unwrap();
        assert_eq!(j1.len(), 1);
        assert_eq!(j2.len(), 2);
        assert!(cache.get(&job("j1"), &task("b")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn entries_are_restartable_and_ordered() {
        let cache = InMemoryCache::new();
        for id in ["c", "a", "b"] {
            cache.put(&job("j"), &task(id), json!(id)).await.unwrap();
        }

        for _ in 0..2 {
            let ids: Vec<String> = cache
                .entries(&job("j"))
                .map_ok(|e| e.task_id.to_string())
                .try_collect()
                .await
                .unwrap();
            assert_eq!(ids, vec!["a", "b", "c"]);
        }
    }

    #[tokio::test]
    async fn clear_allows_a_fresh_run() {
        let cache = InMemoryCache::new();
        cache.put(&job("j"), &task("a"), json!(1)).await.unwrap();

        assert_eq!(cache.clear(&job("j")).await.unwrap(), 1);
        assert_eq!(cache.clear(&job("j")).await.unwrap(), 0);
        cache.put(&job("j"), &task("a"), json!(2)).await.unwrap();
    }

    #[tokio::test]
    async fn remove_drops_only_the_named_entry() {
        let cache = InMemoryCache::new();
        cache.put(&job("j"), &task("a"), json!(1)).await.unwrap();
        cache.put(&job("j"), &task("b"), json!(2)).await.unwrap();

        assert!(cache.remove(&job("j"), &task("a")).await.unwrap());
        assert!(!cache.remove(&job("j"), &task("a")).await.unwrap());
        assert!(!cache.remove(&job("other"), &task("b")).await.unwrap());

        assert!(cache.get(&job("j"), &task("a")).await.unwrap().is_none());
        assert!(cache.get(&job("j"), &task("b")).await.unwrap().is_some());
        cache.put(&job("j"), &task("a"), json!(3)).await.unwrap();
    }

    #[tokio::test]
    async fn unknown_job_has_no_entries() {
        let cache = InMemoryCache::new();
        let all: Vec<_> = cache.entries(&job("none")).try_collect().await.unwrap();
        assert!(all.is_empty());
    }
}
