//! Timestamp - Alert の多態的なタイムスタンプ
//!
//! Policy の出力は timestamp を次のどれかで持ちうる:
//! - RFC3339 文字列
//! - 整数の Unix 秒
//! - 小数の Unix 秒
//!
//! 受信時に [`TimestampInput`] へ一度だけデコードし、Alert の構築時に
//! 絶対時刻へ解決する。
//!
//! # Null instant
//! Unix epoch と `0001-01-01T00:00:00Z` は「未設定」とみなし、構築時の現在時刻で置き換える。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::OverseerError;

/// `AlertBody.timestamp` のワイヤ形式。欠落は `Option` で表す
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimestampInput {
    Rfc3339(String),
    Seconds(i64),
    FractionalSeconds(f64),
    /// それ以外の JSON。構築時にエラーとして報告するため保持する
    Unsupported(serde_json::Value),
}

impl TimestampInput {
    /// 絶対時刻へ解決
    ///
    /// null instant なら `Ok(None)` を返し、呼び出し側が現在時刻で置き換える。
    ///
    /// # エラー
    /// - `MalformedTimestamp`: 解析できない文字列、範囲外の数値
    /// - `UnsupportedTimestampType`: 文字列でも数値でもない
    pub fn resolve(&self) -> Result<Option<DateTime<Utc>>, OverseerError> {
        let ts = match self {
            TimestampInput::Rfc3339(s) => DateTime::parse_from_rfc3339(s)
                .map_err(|e| OverseerError::MalformedTimestamp {
                    value: s.clone(),
                    reason: e.to_string(),
                })?
                .with_timezone(&Utc),
            TimestampInput::Seconds(secs) => {
                DateTime::from_timestamp(*secs, 0).ok_or_else(|| out_of_range(secs))?
            }
            TimestampInput::FractionalSeconds(v) => {
                if !v.is_finite() {
                    return Err(out_of_range(v));
                }
                let whole = v.floor();
                let nsec = ((v - whole) * 1e9) as u32;
                if whole < i64::MIN as f64 || whole > i64::MAX as f64 {
                    return Err(out_of_range(v));
                }
                DateTime::from_timestamp(whole as i64, nsec.min(999_999_999))
                    .ok_or_else(|| out_of_range(v))?
            }
            TimestampInput::Unsupported(v) => {
                return Err(OverseerError::UnsupportedTimestampType {
                    value: v.to_string(),
                });
            }
        };

        Ok((!is_null_instant(&ts)).then_some(ts))
    }
}

fn out_of_range(value: &dyn std::fmt::Display) -> OverseerError {
    OverseerError::MalformedTimestamp {
        value: value.to_string(),
        reason: "out of range".to_string(),
    }
}

/// Unix epoch と `0001-01-01T00:00:00Z` は「未設定」
fn is_null_instant(ts: &DateTime<Utc>) -> bool {
    ts.timestamp_subsec_nanos() == 0 && matches!(ts.timestamp(), 0 | ZERO_YEAR_ONE)
}

/// `0001-01-01T00:00:00Z` の Unix 秒
const ZERO_YEAR_ONE: i64 = -62_135_596_800;
