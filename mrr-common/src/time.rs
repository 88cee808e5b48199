//! Timestamp utilities

use chrono::{DateTime, Local, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Local wall-clock stamp used in export parameter blocks (`dd.mm.YYYY HH:MM`)
pub fn export_stamp(at: DateTime<Local>) -> String {
    at.format("%d.%m.%Y %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01 00:00:00 UTC
    }

    #[test]
    fn test_export_stamp_format() {
        let at = Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 0).unwrap();
        assert_eq!(export_stamp(at), "07.03.2024 09:05");
    }
}
