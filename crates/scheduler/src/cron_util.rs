//! Five-field cron parsing and next-run computation, shared by the alert
//! engine's `check-interval` bookkeeping and the subscription engine's
//! `cron-expression` (4.F). Schedules use a five-field dialect (minute,
//! hour, day-of-month, month, day-of-week); six-field dialects with a
//! leading seconds column are rejected outright rather than silently
//! accepted with second-level precision nobody asked for.

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum CronError {
    #[error("cron expression must have exactly five fields: {0}")]
    WrongFieldCount(String),
    #[error("invalid cron expression: {0}")]
    Invalid(String),
}

/// Parses a five-field expression by prepending a fixed `0` seconds field
/// for the underlying `cron` crate, which speaks a six-field dialect.
pub fn parse_five_field(expression: &str) -> Result<Schedule, CronError> {
    let field_count = expression.split_whitespace().count();
    if field_count != 5 {
        return Err(CronError::WrongFieldCount(expression.to_string()));
    }
    let with_seconds = format!("0 {}", expression);
    Schedule::from_str(&with_seconds).map_err(|e| CronError::Invalid(e.to_string()))
}

/// Resolves `timezone` as an IANA name, falling back to UTC (with a warning)
/// on an unrecognised name rather than failing the caller.
fn resolve_timezone(timezone: &str) -> Tz {
    match Tz::from_str(timezone) {
        Ok(tz) => tz,
        Err(_) => {
            tracing::warn!("unknown timezone '{}', falling back to UTC", timezone);
            Tz::UTC
        }
    }
}

/// The next instant (in UTC) satisfying `expression`, strictly after `after`,
/// evaluated in `timezone`.
pub fn next_run_after(expression: &str, timezone: &str, after: DateTime<Utc>) -> Result<DateTime<Utc>, CronError> {
    let schedule = parse_five_field(expression)?;
    let tz = resolve_timezone(timezone);
    let local_after = after.with_timezone(&tz);
    let next_local = schedule
        .after(&local_after)
        .next()
        .ok_or_else(|| CronError::Invalid("schedule has no future occurrence".to_string()))?;
    Ok(next_local.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rejects_six_field_expressions() {
        assert!(matches!(parse_five_field("0 0 * * * *"), Err(CronError::WrongFieldCount(_))));
    }

    #[test]
    fn accepts_standard_five_field_expression() {
        assert!(parse_five_field("0 9 * * MON").is_ok());
    }

    #[test]
    fn unknown_timezone_falls_back_to_utc() {
        let after = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let next = next_run_after("0 9 * * *", "Not/AZone", after).unwrap();
        assert_eq!(next.timezone(), Utc);
    }

    #[test]
    fn computed_next_run_is_strictly_after_input() {
        let after = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let next = next_run_after("0 9 * * *", "America/New_York", after).unwrap();
        assert!(next > after);
    }
}
