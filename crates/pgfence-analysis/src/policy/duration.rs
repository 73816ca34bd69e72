//! PostgreSQL duration-literal parsing for timeout settings.

use std::sync::OnceLock;

use regex::Regex;

/// A parsed timeout setting. `0` means no timeout at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutValue {
    Millis(u64),
    Unlimited,
}

impl TimeoutValue {
    /// Whether the value exceeds a ceiling. Unlimited exceeds everything.
    pub fn exceeds(self, ceiling_ms: u64) -> bool {
        match self {
            Self::Millis(ms) => ms > ceiling_ms,
            Self::Unlimited => true,
        }
    }
}

fn duration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*([a-zA-Z]*)\s*$").expect("duration regex")
    })
}

/// Parse a timeout value the way PostgreSQL does: a bare number is
/// milliseconds; otherwise a number with a unit (`500ms`, `2s`, `5min`, `1h`,
/// `"2 seconds"`). Returns `None` for values PostgreSQL would reject.
pub fn parse_timeout(value: &str) -> Option<TimeoutValue> {
    let caps = duration_re().captures(value)?;
    let amount: f64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps.get(2).map(|m| m.as_str()).unwrap_or("");

    let millis = match unit.to_ascii_lowercase().as_str() {
        "" | "ms" | "millisecond" | "milliseconds" => amount,
        "us" | "microsecond" | "microseconds" => amount / 1_000.0,
        "s" | "sec" | "secs" | "second" | "seconds" => amount * 1_000.0,
        "min" | "mins" | "minute" | "minutes" => amount * 60_000.0,
        "h" | "hr" | "hour" | "hours" => amount * 3_600_000.0,
        "d" | "day" | "days" => amount * 86_400_000.0,
        _ => return None,
    };

    if millis == 0.0 {
        Some(TimeoutValue::Unlimited)
    } else {
        Some(TimeoutValue::Millis(millis.round() as u64))
    }
}
