//! Datagram timestamp decoding.
//!
//! Every datagram header carries a 64-bit count of 100-nanosecond ticks
//! since 1601-01-01T00:00:00 UTC (an NT filetime). Sub-microsecond ticks
//! are truncated.

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Decode `ticks` into a UTC instant.
///
/// Infallible: the largest representable tick count lands in year ~60055,
/// well inside chrono's calendar range.
#[must_use]
pub fn decode(ticks: u64) -> DateTime<Utc> {
    let micros = ticks / 10;
    let (seconds, micros) = (micros / 1_000_000, micros % 1_000_000);
    let (days, seconds) = (seconds / 86_400, seconds % 86_400);

    epoch()
        + Duration::days(days as i64)
        + Duration::seconds(seconds as i64)
        + Duration::microseconds(micros as i64)
}

/// The NT epoch, 1601-01-01T00:00:00 UTC.
fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1601, 1, 1, 0, 0, 0).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Ticks between the NT epoch and the unix epoch.
    const UNIX_EPOCH_TICKS: u64 = 116_444_736_000_000_000;

    #[test]
    fn zero_is_nt_epoch() {
        assert_eq!(decode(0), Utc.with_ymd_and_hms(1601, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn unix_epoch() {
        assert_eq!(
            decode(UNIX_EPOCH_TICKS),
            Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn modern_instant() {
        // 2017-04-12T08:00:00Z == unix 1491984000
        let ticks = UNIX_EPOCH_TICKS + 1_491_984_000 * 10_000_000;
        assert_eq!(
            decode(ticks),
            Utc.with_ymd_and_hms(2017, 4, 12, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn sub_microsecond_ticks_truncate() {
        let base = decode(UNIX_EPOCH_TICKS);
        assert_eq!(decode(UNIX_EPOCH_TICKS + 9), base);
        assert_eq!(decode(UNIX_EPOCH_TICKS + 15), base + Duration::microseconds(1));
    }

    #[test]
    fn max_ticks_does_not_panic() {
        let ts = decode(u64::MAX);
        assert!(ts > Utc.with_ymd_and_hms(9999, 1, 1, 0, 0, 0).unwrap());
    }
}
