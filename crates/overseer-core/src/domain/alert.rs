//! Alert - 検証済みの通知レコード
//!
//! [`AlertBody`] は Policy が返す未検証の内容、[`Alert`] はそこから構築した
//! 検証済みレコード（ID・スキーマバージョン・JobId・絶対時刻を持つ）。
//!
//! # 学習ポイント
//! - 構築時検証: 不正な Alert は値として存在できない（フィールドは private）
//! - Clock / IdGenerator の注入による決定的なテスト
//! - ID は検証と時刻解決が成功してから発行する（失敗した Alert は ID を消費しない）

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::attrs::Attrs;
use super::errors::OverseerError;
use super::ids::{AlertId, JobId};
use super::timestamp::TimestampInput;
use crate::ports::{Clock, IdGenerator};

/// すべての Alert に刻むスキーマバージョン
pub const ALERT_SCHEMA_VERSION: &str = "v0";

/// AlertBody は Policy 評価が返す未検証の Alert 内容
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertBody {
    /// Alert の短い要約（必須）
    #[serde(default)]
    pub title: String,

    /// 詳細（省略時は空文字列）
    #[serde(default)]
    pub description: String,

    /// 発生時刻（省略時は構築時の現在時刻）
    #[serde(default)]
    pub timestamp: Option<TimestampInput>,

    /// 任意属性
    #[serde(default)]
    pub attrs: Attrs,
}

impl AlertBody {
    /// タイトルだけを持つ AlertBody を作成
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// 必須項目を検証（title が空なら MissingTitle）
    pub fn validate(&self) -> Result<(), OverseerError> {
        if self.title.is_empty() {
            return Err(OverseerError::MissingTitle);
        }
        Ok(())
    }
}

/// Alert は検証済みで ID を持つ通知。構築後は不変
///
/// # 不変条件
/// - `title` は空でない
/// - `version` は [`ALERT_SCHEMA_VERSION`]
/// - `timestamp` は null instant ではない
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    id: AlertId,
    version: String,
    job_id: JobId,
    timestamp: DateTime<Utc>,
    title: String,
    description: String,
    attrs: Attrs,
}

impl Alert {
    /// `body` を検証して `job_id` の Alert を構築
    ///
    /// # 順序
    /// 1. `AlertBody::validate`（title が先なので、空 title は時刻が不正でも MissingTitle）
    /// 2. timestamp の解決（欠落・null instant なら `clock.now()`）
    /// 3. `ids.generate_alert_id()`
    pub fn new(
        job_id: &JobId,
        body: AlertBody,
        clock: &dyn Clock,
        ids: &dyn IdGenerator,
    ) -> Result<Self, OverseerError> {
        body.validate()?;

        let resolved = match &body.timestamp {
            None => None,
            Some(input) => input.resolve()?,
        };
        let timestamp = resolved.unwrap_or_else(|| clock.now());

        Ok(Self {
            id: ids.generate_alert_id(),
            version: ALERT_SCHEMA_VERSION.to_string(),
            job_id: job_id.clone(),
            timestamp,
            title: body.title,
            description: body.description,
            attrs: body.attrs,
        })
    }

    /// 外部で生成された Alert を JSON からデコード
    ///
    /// 未知のスキーマバージョンは UnsupportedAlertVersion で拒否する。
    pub fn from_json(bytes: &[u8]) -> Result<Self, OverseerError> {
        let alert: Alert = serde_json::from_slice(bytes)
            .map_err(|e| OverseerError::InvalidAlert(e.to_string()))?;
        if !alert.is_supported_version() {
            return Err(OverseerError::UnsupportedAlertVersion(alert.version));
        }
        if alert.title.is_empty() {
            return Err(OverseerError::MissingTitle);
        }
        Ok(alert)
    }

    /// このビルドが扱えるスキーマバージョンか
    pub fn is_supported_version(&self) -> bool {
        self.version == ALERT_SCHEMA_VERSION
    }

    /// Alert の ID（UUIDv7）
    pub fn id(&self) -> AlertId {
        self.id
    }

    /// スキーマバージョン
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Alert を生成したジョブ
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// 解決済みの発生時刻
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// タイトル
    pub fn title(&self) -> &str {
        &self.title
    }

    /// 詳細
    pub fn description(&self) -> &str {
        &self.description
    }

    /// 任意属性
    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }
}
