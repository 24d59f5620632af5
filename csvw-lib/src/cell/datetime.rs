//! Date, time, dateTime and duration parsing. Recognized format patterns are
//! translated to chrono specifiers and every parsed value is re-composed into
//! its canonical lexical form.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;

use super::value::Value;

/// Recognized date patterns and their chrono equivalents. chrono's numeric
/// parsing accepts unpadded digits, so the single-letter variants share a
/// specifier with their padded forms.
const DATE_PATTERNS: [(&str, &str); 14] = [
    ("yyyy-MM-dd", "%Y-%m-%d"),
    ("yyyyMMdd", "%Y%m%d"),
    ("dd-MM-yyyy", "%d-%m-%Y"),
    ("d-M-yyyy", "%d-%m-%Y"),
    ("MM-dd-yyyy", "%m-%d-%Y"),
    ("M-d-yyyy", "%m-%d-%Y"),
    ("dd/MM/yyyy", "%d/%m/%Y"),
    ("d/M/yyyy", "%d/%m/%Y"),
    ("MM/dd/yyyy", "%m/%d/%Y"),
    ("M/d/yyyy", "%m/%d/%Y"),
    ("dd.MM.yyyy", "%d.%m.%Y"),
    ("d.M.yyyy", "%d.%m.%Y"),
    ("MM.dd.yyyy", "%m.%d.%Y"),
    ("M.d.yyyy", "%m.%d.%Y"),
];

const TIME_PATTERNS: [(&str, &str); 4] = [
    ("HH:mm:ss", "%H:%M:%S"),
    ("HHmmss", "%H%M%S"),
    ("HH:mm", "%H:%M"),
    ("HHmm", "%H%M"),
];

const DATETIME_PATTERNS: [(&str, &str); 2] = [
    ("yyyy-MM-ddTHH:mm:ss", "%Y-%m-%dT%H:%M:%S"),
    ("yyyy-MM-ddTHH:mm", "%Y-%m-%dT%H:%M"),
];

static OFFSET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(Z|[+-][0-9]{2}(:?[0-9]{2})?)$").expect("valid regex"));

static TZ_FORMAT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r" ?x{1,5}$").expect("valid regex"));

/// Parse a raw string against one of the date/time datatype bases, with an
/// optional format like `"dd/MM/yyyy"` or `"yyyy-MM-dd HH:mm:ss x"`.
pub fn parse_date_like(raw: &str, base: &str, format: Option<&str>) -> Result<Value, String> {
    let (format, expects_offset) = match format {
        Some(format) => match TZ_FORMAT_RE.find(format) {
            Some(m) => (Some(format[..m.start()].to_string()), true),
            None => (Some(format.to_string()), false),
        },
        None => (None, true),
    };

    let attempt = |body: &str, offset: Option<&str>| -> Result<Value, String> {
        if base == "dateTimeStamp" && offset.is_none() {
            return Err(format!(
                "{} is not a valid dateTimeStamp: time zone required",
                raw
            ));
        }
        let suffix = offset.map(canonical_offset).unwrap_or_default();
        match base {
            "date" => {
                let date = parse_date(body, format.as_deref())?;
                Ok(Value::Date {
                    lexical: format!("{}{}", date.format("%Y-%m-%d"), suffix),
                    value: date,
                })
            }
            "time" => {
                let time = parse_time(body, format.as_deref())?;
                Ok(Value::Time {
                    lexical: format!("{}{}", time.format("%H:%M:%S"), suffix),
                    value: time,
                })
            }
            _ => {
                let datetime = parse_datetime(body, format.as_deref())?;
                Ok(Value::DateTime {
                    lexical: format!("{}{}", datetime.format("%Y-%m-%dT%H:%M:%S"), suffix),
                    value: datetime,
                })
            }
        }
    };

    if !expects_offset {
        return attempt(raw, None);
    }
    // A trailing offset is ambiguous with date digits ("2024-06-17" ends in
    // "-17"), so retry on the whole string when the split attempt fails.
    match split_offset(raw) {
        (body, Some(offset)) => attempt(body, Some(offset)).or_else(|e| {
            attempt(raw, None).map_err(|_| e)
        }),
        (body, None) => attempt(body, None),
    }
}

fn split_offset(raw: &str) -> (&str, Option<&str>) {
    match OFFSET_RE.find(raw) {
        Some(m) => (raw[..m.start()].trim_end(), Some(m.as_str())),
        None => (raw, None),
    }
}

/// Canonicalize an offset to `Z` or `±hh:mm`.
fn canonical_offset(offset: &str) -> String {
    if offset == "Z" || offset == "+00:00" || offset == "+0000" || offset == "+00" {
        return "Z".to_string();
    }
    let (sign, digits) = offset.split_at(1);
    let digits = digits.replace(':', "");
    match digits.len() {
        2 => format!("{}{}:00", sign, digits),
        4 => format!("{}{}:{}", sign, &digits[..2], &digits[2..]),
        _ => offset.to_string(),
    }
}

fn parse_date(body: &str, format: Option<&str>) -> Result<NaiveDate, String> {
    let spec = match format {
        Some(format) => DATE_PATTERNS
            .iter()
            .find(|(pattern, _)| *pattern == format)
            .map(|(_, spec)| *spec)
            .ok_or_else(|| format!("unrecognized date format {}", format))?,
        None => "%Y-%m-%d",
    };
    NaiveDate::parse_from_str(body, spec)
        .map_err(|_| format!("{} is not a valid date", body))
}

fn parse_time(body: &str, format: Option<&str>) -> Result<NaiveTime, String> {
    let spec = match format {
        Some(format) => TIME_PATTERNS
            .iter()
            .find(|(pattern, _)| *pattern == format)
            .map(|(_, spec)| *spec)
            .ok_or_else(|| format!("unrecognized time format {}", format))?,
        None => "%H:%M:%S",
    };
    NaiveTime::parse_from_str(body, spec)
        .map_err(|_| format!("{} is not a valid time", body))
}

fn parse_datetime(body: &str, format: Option<&str>) -> Result<NaiveDateTime, String> {
    match format {
        Some(format) => {
            let spec = datetime_spec(format)
                .ok_or_else(|| format!("unrecognized dateTime format {}", format))?;
            NaiveDateTime::parse_from_str(body, &spec)
                .map_err(|_| format!("{} is not a valid dateTime", body))
        }
        None => {
            for spec in [
                "%Y-%m-%dT%H:%M:%S%.f",
                "%Y-%m-%dT%H:%M:%S",
                "%Y-%m-%dT%H:%M",
            ] {
                if let Ok(parsed) = NaiveDateTime::parse_from_str(body, spec) {
                    return Ok(parsed);
                }
            }
            Err(format!("{} is not a valid dateTime", body))
        }
    }
}

/// Translate a dateTime format: either one of the combined patterns, or a
/// date pattern joined to a time pattern with `T` or a space.
fn datetime_spec(format: &str) -> Option<String> {
    if let Some((_, spec)) = DATETIME_PATTERNS.iter().find(|(p, _)| *p == format) {
        return Some(spec.to_string());
    }
    for joiner in ['T', ' '] {
        if let Some(at) = format.find(joiner) {
            let (date_part, time_part) = (&format[..at], &format[at + 1..]);
            let date_spec = DATE_PATTERNS.iter().find(|(p, _)| *p == date_part)?.1;
            let time_spec = TIME_PATTERNS.iter().find(|(p, _)| *p == time_part)?.1;
            return Some(format!("{}{}{}", date_spec, joiner, time_spec));
        }
    }
    None
}

static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?P([0-9]+Y)?([0-9]+M)?([0-9]+D)?(T([0-9]+H)?([0-9]+M)?([0-9]+(\.[0-9]+)?S)?)?$")
        .expect("valid regex")
});

static YEAR_MONTH_DURATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?P([0-9]+Y)?([0-9]+M)?$").expect("valid regex"));

static DAY_TIME_DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?P([0-9]+D)?(T([0-9]+H)?([0-9]+M)?([0-9]+(\.[0-9]+)?S)?)?$")
        .expect("valid regex")
});

/// Durations pass through as lexical values, validated by shape.
pub fn parse_duration(raw: &str, base: &str) -> Result<Value, String> {
    let regex = match base {
        "yearMonthDuration" => &YEAR_MONTH_DURATION_RE,
        "dayTimeDuration" => &DAY_TIME_DURATION_RE,
        _ => &DURATION_RE,
    };
    let has_component = raw.chars().any(|c| c.is_ascii_digit());
    if regex.is_match(raw) && has_component && !raw.ends_with('T') {
        Ok(Value::Duration(raw.to_string()))
    } else {
        Err(format!("{} is not a valid {}", raw, base))
    }
}
