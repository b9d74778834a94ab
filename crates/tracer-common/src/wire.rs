use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Identifiers come back as integers from the SQL-backed endpoints and as
/// strings from everything else.
pub(crate) fn string_or_number<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(d)? {
        Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!(
            "expected a non-empty string or number identifier, got {other}"
        ))),
    }
}

/// Accepts RFC 3339 and the naive `YYYY-MM-DD[T ]HH:MM:SS[.f]` form the job
/// table emits (interpreted as UTC). Anything else reads as absent.
pub(crate) fn lenient_timestamp<'de, D>(d: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => s,
        _ => return Ok(None),
    };
    Ok(parse_timestamp(&raw))
}

pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_timestamp_forms() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-05-01T12:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T14:30:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T12:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01 12:30:00.000"), Some(expected));
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
    }
}
