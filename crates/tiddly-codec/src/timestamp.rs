//! Compact `YYYYMMDDhhmmss` UTC timestamps used by both codecs.

use chrono::{DateTime, NaiveDateTime, Utc};

const FORMAT: &str = "%Y%m%d%H%M%S";

pub fn format(ts: &DateTime<Utc>) -> String {
    ts.format(FORMAT).to_string()
}

pub fn parse(s: &str) -> Result<DateTime<Utc>, String> {
    NaiveDateTime::parse_from_str(s.trim(), FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| format!("bad timestamp {s:?}: {e}"))
}
