//! PolicyService port - キャッシュされた結果に対するルール評価

use async_trait::async_trait;

use crate::domain::{AlertBody, CacheEntry, CapabilityError};

/// PolicyService はキャッシュ 1 件を 0 件以上の Alert 候補に変換
///
/// 空の Vec は「どのルールも発火しなかった」を意味する（失敗ではない）。
#[async_trait]
pub trait PolicyService: Send + Sync {
    /// エントリを評価して AlertBody を返す
    async fn evaluate(&self, entry: &CacheEntry) -> Result<Vec<AlertBody>, CapabilityError>;
}
