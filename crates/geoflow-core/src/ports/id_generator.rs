//! IdGenerator port - 名前生成の抽象化
//!
//! 実行名（execution name）と blob の object key を生成します。
//! テスト容易性のために trait として抽象化しています。
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）

use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は衝突しない名前を生成
///
/// # ULID の特性
/// - 時刻でソート可能
/// - 分散環境で生成可能（調整不要）
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数の invocation から共有できる）
pub trait IdGenerator: Send + Sync {
    /// Execution name handed to the execution engine.
    fn generate_execution_name(&self) -> String;

    /// Key for an oversized payload spilled to blob storage.
    fn generate_object_key(&self) -> String;
}

/// UlidGenerator は ULID ベースの名前生成器
///
/// Clock を使って現在時刻ベースの ULID を生成します。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_execution_name(&self) -> String {
        self.next_ulid().to_string().to_lowercase()
    }

    fn generate_object_key(&self) -> String {
        self.next_ulid().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn ulid_generator_generates_unique_names() {
        let id_gen = UlidGenerator::new(SystemClock);

        let a = id_gen.generate_execution_name();
        let b = id_gen.generate_execution_name();
        let c = id_gen.generate_object_key();

        assert_ne!(a, b);
        assert_ne!(a.to_uppercase(), c);
        assert_eq!(a.len(), 26);
    }

    #[test]
    fn ulid_generator_with_fixed_clock_shares_timestamp() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = UlidGenerator::new(FixedClock::new(fixed_time));

        let k1: Ulid = id_gen.generate_object_key().parse().unwrap();
        let k2: Ulid = id_gen.generate_object_key().parse().unwrap();

        // ランダム部分があるので key は異なる
        assert_ne!(k1, k2);
        // ただし、timestamp 部分は同じはず
        assert_eq!(k1.timestamp_ms(), k2.timestamp_ms());
        assert_eq!(k1.timestamp_ms(), fixed_time.timestamp_millis() as u64);
    }
}
