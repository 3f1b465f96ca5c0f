//! Impls - コアに同梱する port 実装
//!
//! # 同梱
//! - **InMemoryCache** / **FileCache**: job スコープキャッシュ
//! - **CommandQuery** / **CommandPolicy**: 外部プログラムを query / policy エンジンとして使う
//! - **JsonLinesNotify**: Alert を JSON Lines で stdout またはファイルへ
//! - **load_tasks**: クエリディレクトリの読み込み

pub mod command;
pub mod file_cache;
pub mod inmem_cache;
pub mod jsonl_notify;
pub mod query_dir;

pub use self::command::{CommandPolicy, CommandQuery, CommandSpec};
pub use self::file_cache::FileCache;
pub use self::inmem_cache::InMemoryCache;
pub use self::jsonl_notify::JsonLinesNotify;
pub use self::query_dir::{TaskSourceError, load_tasks};
