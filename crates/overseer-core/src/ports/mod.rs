//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部システム（クエリエンジン、キャッシュ、ポリシーエンジン、通知経路）
//! またはプロセス全体の状態（時計、ID 発行）への境界で、
//! Runner / Evaluator をテストダブルで検証できるようにします。

pub mod cache;
pub mod clock;
pub mod id_generator;
pub mod notify;
pub mod policy;
pub mod query;

pub use self::cache::CacheService;
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UuidV7Generator};
pub use self::notify::NotifyService;
pub use self::policy::PolicyService;
pub use self::query::QueryService;
