use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;

/// The transport fills optional numeric fields with `f64::MAX`.
pub const UNSET_DOUBLE: f64 = f64::MAX;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("unexpected market depth side: {0}")]
    InvalidDepthSide(i32),
    #[error("unexpected market depth operation: {0}")]
    InvalidDepthOperation(i32),
    #[error("unparseable broker timestamp: {0:?}")]
    InvalidTimestamp(String),
}

/// Convert a wire double to a decimal. The unset sentinel (and anything that
/// is not a finite number) yields `None`.
pub fn decimal_from_wire(name: &str, value: f64) -> Option<Decimal> {
    if value == UNSET_DOUBLE {
        tracing::trace!(field = name, "wire value is unset");
        return None;
    }
    let converted = Decimal::from_f64(value);
    if converted.is_none() {
        tracing::debug!(field = name, value, "wire value is not representable as decimal");
    }
    converted
}

/// Parse the timestamp shapes the broker uses for bars and executions:
///
/// - `yyyyMMdd` (daily bars, midnight UTC)
/// - `yyyyMMdd  HH:mm:ss` / `yyyyMMdd HH:mm:ss` (interpreted as UTC)
/// - `yyyyMMdd HH:mm:ss <IANA zone>` (e.g. `US/Eastern`)
/// - `yyyyMMdd-HH:mm:ss` (UTC)
/// - epoch seconds
pub fn parse_broker_time(raw: &str) -> Result<DateTime<Utc>, SchemaError> {
    let text = raw.trim();
    let invalid = || SchemaError::InvalidTimestamp(raw.to_string());

    if text.len() > 8 && text.bytes().all(|b| b.is_ascii_digit()) {
        let secs: i64 = text.parse().map_err(|_| invalid())?;
        return DateTime::from_timestamp(secs, 0).ok_or_else(invalid);
    }

    if text.len() == 8 {
        let date = NaiveDate::parse_from_str(text, "%Y%m%d").map_err(|_| invalid())?;
        let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(invalid)?;
        return Ok(Utc.from_utc_datetime(&midnight));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y%m%d-%H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    let mut parts = text.split_whitespace();
    let date = parts.next().ok_or_else(invalid)?;
    let time = parts.next().ok_or_else(invalid)?;
    let zone = parts.next();
    if parts.next().is_some() {
        return Err(invalid());
    }

    let naive = NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y%m%d %H:%M:%S")
        .map_err(|_| invalid())?;

    match zone {
        None => Ok(Utc.from_utc_datetime(&naive)),
        Some(name) => {
            let tz: Tz = name.parse().map_err(|_| invalid())?;
            tz.from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
                .ok_or_else(invalid)
        }
    }
}
