//! overseer-core
//!
//! 「今集めて、後で評価する」パイプライン overseer のコア部品。
//!
//! # モジュール
//! - **domain**: ドメインモデル（ID、Task、Target、CacheEntry、Alert、タイムスタンプ、エラー）
//! - **ports**: ケイパビリティ trait（CacheService, QueryService, PolicyService, NotifyService, Clock, IdGenerator）
//! - **app**: オーケストレーション（Runner, Evaluator, PipelineBuilder, JobContext）
//! - **impls**: 同梱アダプタ（インメモリ / ファイルキャッシュ、コマンド実行の query と policy、JSON Lines 通知、クエリディレクトリ読み込み）
//! - **config**: `overseer.toml` と環境変数による上書き

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

#[cfg(test)]
mod testing;
