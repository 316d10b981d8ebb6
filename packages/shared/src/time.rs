//! JST time helpers.

use chrono::{DateTime, FixedOffset, Offset, Utc};

/// JST is UTC+9
const JST_OFFSET_SECS: i32 = 9 * 3600;

fn jst_offset() -> FixedOffset {
    FixedOffset::east_opt(JST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Get current Unix timestamp in JST (milliseconds)
pub fn get_jst_timestamp() -> i64 {
    let now_jst: DateTime<FixedOffset> = Utc::now().with_timezone(&jst_offset());
    now_jst.timestamp_millis()
}

/// Parse an RFC 3339 string into a Unix timestamp (milliseconds).
pub fn rfc3339_to_timestamp(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.timestamp_millis())
}

/// Format a Unix timestamp (milliseconds) as `HH:MM` in JST, for list rows.
pub fn format_jst_clock(timestamp_ms: i64) -> String {
    match DateTime::from_timestamp_millis(timestamp_ms) {
        Some(dt) => dt.with_timezone(&jst_offset()).format("%H:%M").to_string(),
        None => "--:--".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc3339_to_timestamp_keeps_millis() {
        // テスト項目: オフセット付き RFC 3339 文字列からミリ秒のタイムスタンプに戻せる
        // given (前提条件): 2023-01-01T00:00:00.123Z
        let value = "2023-01-01T09:00:00.123+09:00";

        // when (操作):
        let parsed = rfc3339_to_timestamp(value);

        // then (期待する結果):
        assert_eq!(parsed, Some(1_672_531_200_123));
    }

    #[test]
    fn test_rfc3339_invalid_returns_none() {
        // テスト項目: 不正な文字列は None になる
        assert_eq!(rfc3339_to_timestamp("yesterday"), None);
    }

    #[test]
    fn test_format_jst_clock() {
        // テスト項目: 一覧表示用に HH:MM (JST) で整形される
        // given (前提条件): 2023-01-01T00:00:00Z
        let timestamp = 1_672_531_200_000;

        // when (操作):
        let clock = format_jst_clock(timestamp);

        // then (期待する結果):
        assert_eq!(clock, "09:00");
    }
}
