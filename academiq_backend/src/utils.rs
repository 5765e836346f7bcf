//! Shared helpers and constants.

use chrono::{DateTime, SecondsFormat, Utc};

pub const APP_NAME: &str = "academiq_backend";

/// Current time as a millisecond-precision RFC 3339 string. Every timestamp
/// column uses this format so string order matches chronological order.
pub fn now_utc_iso() -> String {
    format_timestamp(Utc::now())
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn print_banner() {
    println!("{APP_NAME} v{}", env!("CARGO_PKG_VERSION"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_use_millisecond_precision_and_z_suffix() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 5, 23, 59, 59).unwrap()
            + chrono::Duration::milliseconds(500);
        assert_eq!(format_timestamp(ts), "2024-01-05T23:59:59.500Z");
    }
}
