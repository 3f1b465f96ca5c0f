//! App - オーケストレーション層
//!
//! ports を組み合わせてパイプラインの 2 フェーズを構成する。
//!
//! # コンポーネント
//! - **PipelineBuilder**: 配線と起動時検証
//! - **Runner**: Run フェーズ（選択 → query → cache）
//! - **Evaluator**: Eval フェーズ（cache → policy → Alert → notify）
//! - **JobContext**: 両フェーズが共有する JobId とキャンセル

pub mod builder;
pub mod context;
pub mod eval;
pub mod run;

pub use self::builder::{BuildError, PipelineBuilder};
pub use self::context::JobContext;
pub use self::eval::{EvalReport, EvalSettings, Evaluator};
pub use self::run::{RunReport, RunSettings, Runner};
