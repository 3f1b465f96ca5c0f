//! Domain model - ドメインモデル
//!
//! I/O を持たない純粋な型と関数（ID、Task、Target、CacheEntry、Alert、エラー）。

pub mod alert;
pub mod attrs;
pub mod entry;
pub mod errors;
pub mod ids;
pub mod target;
pub mod task;
pub mod timestamp;

pub use alert::{ALERT_SCHEMA_VERSION, Alert, AlertBody};
pub use attrs::{AttrValue, Attrs};
pub use entry::CacheEntry;
pub use errors::{
    BatchFailure, CacheError, CapabilityError, ErrorKind, OverseerError, Phase, failure_chain,
};
pub use ids::{AlertId, JobId, TaskId};
pub use target::Target;
pub use task::{Task, validate_tasks};
pub use timestamp::TimestampInput;
