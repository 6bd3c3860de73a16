//! Time helpers — business timezone conversions.
//!
//! Sequence numbers reset per business day in the outlet timezone; entity
//! timestamps are Unix millis.

use chrono_tz::Tz;

/// Current Unix timestamp in milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Current business date as a compact `YYYYMMDD` string (outlet timezone).
pub fn business_date(tz: Tz) -> String {
    chrono::Utc::now()
        .with_timezone(&tz)
        .format("%Y%m%d")
        .to_string()
}

/// Current calendar year in the outlet timezone (invoice number scope).
pub fn business_year(tz: Tz) -> String {
    chrono::Utc::now().with_timezone(&tz).format("%Y").to_string()
}
