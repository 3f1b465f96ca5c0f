//! IdGenerator port - AlertId 生成の抽象化
//!
//! # 実装
//! - **UuidV7Generator**: UUIDv7 ベース（本番用）
//!
//! テストでは決定的な連番に差し替える。

use crate::domain::ids::AlertId;
use crate::ports::Clock;
use uuid::Builder;

/// IdGenerator はグローバルに一意で時刻順に並ぶ AlertId を生成
///
/// # 性質
/// - 先頭 48 bit がミリ秒タイムスタンプなので生成順にソートできる
/// - 残りはランダムなので、プロセス間の調整が要らない
pub trait IdGenerator: Send + Sync {
    /// 新しい AlertId を発行
    fn generate_alert_id(&self) -> AlertId;
}

/// UuidV7Generator は [`Clock`] で時刻部を決める UUIDv7 生成器
///
/// `FixedClock` を渡すと時刻部が決定的になる。
///
/// # Panics
/// Clock が Unix epoch より前を返すと、v7 の時刻部を作れないので panic する。
pub struct UuidV7Generator<C> {
    clock: C,
}

impl<C: Clock> UuidV7Generator<C> {
    /// Clock を指定して作成
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UuidV7Generator<C> {
    fn generate_alert_id(&self) -> AlertId {
        // epoch 以前の時刻は v7 の時刻部にできない
        let timestamp_ms = u64::try_from(self.clock.now().timestamp_millis())
            .unwrap_or_else(|_| panic!("clock is before the unix epoch; cannot generate alert id"));
        let random: [u8; 10] = rand::random();
        let uuid = Builder::from_unix_timestamp_millis(timestamp_ms, &random).into_uuid();
        AlertId::from(uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn generates_unique_ids() {
        let id_gen = UuidV7Generator::new(SystemClock);

        let id1 = id_gen.generate_alert_id();
        let id2 = id_gen.generate_alert_id();
        let id3 = id_gen.generate_alert_id();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn ids_are_version_7() {
        let id = UuidV7Generator::new(SystemClock).generate_alert_id();
        assert_eq!(id.as_uuid().get_version_num(), 7);
    }

    #[test]
    fn fixed_clock_fixes_the_timestamp_prefix() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = UuidV7Generator::new(FixedClock::new(fixed_time));

        let id1 = id_gen.generate_alert_id();
        let id2 = id_gen.generate_alert_id();

        // random part still differs
        assert_ne!(id1, id2);

        let prefix1 = (id1.as_uuid().as_u128() >> 80) as u64;
        let prefix2 = (id2.as_uuid().as_u128() >> 80) as u64;
        assert_eq!(prefix1, prefix2);
        assert_eq!(prefix1, fixed_time.timestamp_millis() as u64);
    }

    #[test]
    fn later_clock_sorts_later() {
        let early = UuidV7Generator::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ))
        .generate_alert_id();
        let late = UuidV7Generator::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 1).unwrap(),
        ))
        .generate_alert_id();

        assert!(late > early);
        assert!(late.to_string() > early.to_string());
    }

    #[test]
    #[should_panic(expected = "before the unix epoch")]
    fn pre_epoch_clock_is_fatal() {
        let id_gen = UuidV7Generator::new(FixedClock::new(
            Utc.with_ymd_and_hms(1960, 1, 1, 0, 0, 0).unwrap(),
        ));
        id_gen.generate_alert_id();
    }
}
