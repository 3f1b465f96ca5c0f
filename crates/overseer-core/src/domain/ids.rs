//! Domain identifiers (strongly-typed IDs).
//!
//! # JobId / TaskId: 外部から渡される文字列 ID
//! CLI フラグやクエリファイル名など、コアの外で決まる不透明な文字列です。
//! 前後の空白は取り除き、空文字列は拒否します。
//!
//! ## Phantom Type パターン
//! `Id<T>` で共通実装を 1 つにまとめ、`T` はマーカー型としてのみ使います。
//! JobId と TaskId は別の型なので、引数の取り違えはコンパイルエラーになります。
//!
//! # AlertId: コア内部で生成する UUIDv7
//! - **時刻でソート可能**: 先頭 48 bit がミリ秒タイムスタンプ
//! - **一度だけ割り当て**: Alert の構築時に [`IdGenerator`](crate::ports::IdGenerator) が発行

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;
use uuid::Uuid;

use super::errors::OverseerError;

/// IdMarker は文字列 ID のマーカー trait
pub trait IdMarker: Send + Sync + 'static {
    /// 空の値が渡されたときのエラー
    fn empty_error() -> OverseerError;
}

/// ジェネリック ID 型（空でない文字列）
///
/// # 例
/// ```ignore
/// let job_id = JobId::new("nightly-2024-05-01")?;
/// let task_id = TaskId::new("failed_logins")?;
/// // job_id と task_id は異なる型なので、混同できない
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id<T: IdMarker> {
    value: String,
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    /// 文字列から Id を作成
    ///
    /// 前後の空白を取り除いた結果が空なら `T::empty_error()` を返す。
    pub fn new(value: impl Into<String>) -> Result<Self, OverseerError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(T::empty_error());
        }
        Ok(Self {
            value: trimmed.to_string(),
            _marker: PhantomData,
        })
    }

    /// 文字列表現
    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl<T: IdMarker> AsRef<str> for Id<T> {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

impl<T: IdMarker> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.value)
    }
}

impl<'de, T: IdMarker> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

// ========================================
// Markers
// ========================================

/// JobId のマーカー（空なら MissingJobId）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Job {}

impl IdMarker for Job {
    fn empty_error() -> OverseerError {
        OverseerError::MissingJobId
    }
}

/// TaskId のマーカー（空なら InvalidTask）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Task {}

impl IdMarker for Task {
    fn empty_error() -> OverseerError {
        OverseerError::InvalidTask("task id must not be empty".to_string())
    }
}

/// 1 回の Run/Eval サイクルの ID。キャッシュのパーティションキー
pub type JobId = Id<Job>;

/// クエリ 1 件の ID。Run の中で一意
pub type TaskId = Id<Task>;

/// Alert の ID（UUIDv7）。構築時に一度だけ割り当てる
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertId(Uuid);

impl AlertId {
    /// UUID から AlertId を作成
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// 内部の UUID を取得
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for AlertId {
    fn from(uuid: Uuid) -> Self {
        Self::from_uuid(uuid)
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}
