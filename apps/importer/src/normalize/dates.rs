use chrono::{TimeZone, Utc};
use serde_json::Value;

/// Outcome of splitting a single "start - end" string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    pub start: String,
    pub end: String,
    pub current: bool,
}

const RANGE_SEPARATORS: [&str; 4] = [" - ", " – ", " — ", " to "];
const OPEN_ENDED: [&str; 3] = ["present", "current", "now"];

/// Canonical text for a raw date value.
///
/// - strings are kept as given, trimmed
/// - `{year, month?}` objects become `YYYY-MM` (month defaults to `01`)
/// - plain years become `YYYY`
/// - other numbers are epoch milliseconds, rendered `YYYY-MM-DD`
///
/// `Ok(None)` means "no date"; `Err` describes a value that cannot be a date.
pub fn format_date(value: &Value) -> Result<Option<String>, String> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => {
            let trimmed = s.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        Value::Number(n) => {
            let Some(n) = n.as_i64() else {
                return Err(format!("non-integer date {n}"));
            };
            if (1900..=2100).contains(&n) {
                return Ok(Some(n.to_string()));
            }
            Utc.timestamp_millis_opt(n)
                .single()
                .map(|dt| Some(dt.format("%Y-%m-%d").to_string()))
                .ok_or_else(|| format!("timestamp {n} out of range"))
        }
        Value::Object(obj) => {
            let Some(year) = obj.get("year").and_then(as_int) else {
                if obj.values().all(Value::is_null) {
                    return Ok(None);
                }
                return Err("date object has no year".to_string());
            };
            let month = obj.get("month").and_then(as_int).unwrap_or(1);
            if !(1..=12).contains(&month) {
                return Err(format!("month {month} out of range"));
            }
            Ok(Some(format!("{year:04}-{month:02}")))
        }
        Value::Bool(_) => Err("boolean is not a date".to_string()),
        Value::Array(_) => Err("array is not a date".to_string()),
    }
}

fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Splits `"Jan 2020 - Present · 3 yrs"` style ranges. Returns `None` when
/// no separator is found.
pub fn split_range(raw: &str) -> Option<DateRange> {
    // Providers append a duration after a middle dot.
    let range = raw.split('·').next().unwrap_or(raw).trim();

    let (start, end) = RANGE_SEPARATORS
        .iter()
        .find_map(|sep| range.split_once(sep))?;
    let start = start.trim().to_string();
    let end = end.trim();

    if OPEN_ENDED.iter().any(|w| end.eq_ignore_ascii_case(w)) {
        return Some(DateRange {
            start,
            end: String::new(),
            current: true,
        });
    }
    Some(DateRange {
        start,
        end: end.to_string(),
        current: false,
    })
}

pub fn is_open_ended(raw: &str) -> bool {
    OPEN_ENDED.iter().any(|w| raw.trim().eq_ignore_ascii_case(w))
}
