//! PipelineBuilder - ports を Runner / Evaluator に配線
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）: 足りないケイパビリティを名前で列挙する
//! - 開発体験の改善（バッチの途中ではなく起動時に失敗する）

use std::sync::Arc;

use super::eval::{EvalSettings, Evaluator};
use super::run::{RunSettings, Runner};
use crate::ports::{
    CacheService, Clock, IdGenerator, NotifyService, PolicyService, QueryService, SystemClock,
    UuidV7Generator,
};

/// BuildError はフェーズ構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing capabilities: {0:?}")]
    MissingCapabilities(Vec<&'static str>),
}

/// PipelineBuilder は Runner と Evaluator を構築
///
/// # 使用例
/// ```ignore
/// let runner = PipelineBuilder::new()
///     .with_cache(cache)
///     .with_query(query)
///     .build_runner()?;
/// ```
///
/// # Fail-fast 設計
/// - Runner には cache と query が必須
/// - Evaluator には cache / policy / notify が必須
/// - 不足があれば BuildError::MissingCapabilities を返す
#[derive(Default)]
pub struct PipelineBuilder {
    cache: Option<Arc<dyn CacheService>>,
    query: Option<Arc<dyn QueryService>>,
    policy: Option<Arc<dyn PolicyService>>,
    notify: Option<Arc<dyn NotifyService>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    run: RunSettings,
    eval: EvalSettings,
}

impl PipelineBuilder {
    /// 新しい PipelineBuilder を作成
    pub fn new() -> Self {
        Self::default()
    }

    /// CacheService を設定（両フェーズで必須）
    pub fn with_cache(mut self, cache: Arc<dyn CacheService>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// QueryService を設定（Runner で必須）
    pub fn with_query(mut self, query: Arc<dyn QueryService>) -> Self {
        self.query = Some(query);
        self
    }

    /// PolicyService を設定（Evaluator で必須）
    pub fn with_policy(mut self, policy: Arc<dyn PolicyService>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// NotifyService を設定（Evaluator で必須）
    pub fn with_notify(mut self, notify: Arc<dyn NotifyService>) -> Self {
        self.notify = Some(notify);
        self
    }

    /// Clock を設定（既定は [`SystemClock`]）
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// IdGenerator を設定（既定はシステム時刻の [`UuidV7Generator`]）
    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Runner の実行設定
    pub fn run_settings(mut self, settings: RunSettings) -> Self {
        self.run = settings;
        self
    }

    /// Evaluator の実行設定
    pub fn eval_settings(mut self, settings: EvalSettings) -> Self {
        self.eval = settings;
        self
    }

    /// Runner を構築
    ///
    /// # 検証
    /// - cache / query が設定されているか
    pub fn build_runner(self) -> Result<Runner, BuildError> {
        match (self.cache, self.query) {
            (Some(cache), Some(query)) => Ok(Runner::new(cache, query, self.run)),
            (cache, query) => Err(BuildError::MissingCapabilities(missing(&[
                ("cache", cache.is_some()),
                ("query", query.is_some()),
            ]))),
        }
    }

    /// Evaluator を構築
    ///
    /// # 検証
    /// - cache / policy / notify が設定されているか
    pub fn build_evaluator(self) -> Result<Evaluator, BuildError> {
        match (self.cache, self.policy, self.notify) {
            (Some(cache), Some(policy), Some(notify)) => {
                let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
                let ids = self
                    .ids
                    .unwrap_or_else(|| Arc::new(UuidV7Generator::new(SystemClock)));
                Ok(Evaluator::new(cache, policy, notify, clock, ids, self.eval))
            }
            (cache, policy, notify) => Err(BuildError::MissingCapabilities(missing(&[
                ("cache", cache.is_some()),
                ("policy", policy.is_some()),
                ("notify", notify.is_some()),
            ]))),
        }
    }
}

fn missing(supplied: &[(&'static str, bool)]) -> Vec<&'static str> {
    supplied
        .iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| *name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryCache;
    use crate::testing::{FakePolicy, FakeQuery, RecordingNotify};

    #[test]
    fn builds_runner_with_cache_and_query() {
        let runner = PipelineBuilder::new()
            .with_cache(Arc::new(InMemoryCache::new()))
            .with_query(Arc::new(FakeQuery::new()))
            .run_settings(RunSettings {
                concurrency: 2,
                ..RunSettings::default()
            })
            .build_runner()
            .unwrap();
        assert_eq!(runner.settings().concurrency, 2);
    }

    #[test]
    fn runner_without_query_names_it() {
        let err = PipelineBuilder::new()
            .with_cache(Arc::new(InMemoryCache::new()))
            .build_runner()
            .err()
            .unwrap();
        assert!(matches!(err, BuildError::MissingCapabilities(m) if m == vec!["query"]));
    }

    #[test]
    fn evaluator_defaults_clock_and_ids() {
        let evaluator = PipelineBuilder::new()
            .with_cache(Arc::new(InMemoryCache::new()))
            .with_policy(Arc::new(FakePolicy::new()))
            .with_notify(Arc::new(RecordingNotify::new()))
            .build_evaluator();
        assert!(evaluator.is_ok());
    }

    #[test]
    fn evaluator_reports_every_missing_capability() {
        let err = PipelineBuilder::new()
            .with_cache(Arc::new(InMemoryCache::new()))
            .build_evaluator()
            .err()
            .unwrap();
        assert!(matches!(
            err,
            BuildError::MissingCapabilities(m) if m == vec!["policy", "notify"]
        ));
    }
}
