use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::clock::Clock;
use crate::settings::ReminderTime;

const NAIVE_DATE_TIME_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognised due date `{0}`")]
pub struct InvalidDueDate(pub String);

/// Extracts the local calendar date from an ISO-8601 due date.
///
/// Date-times carrying an offset are converted to the clock's zone first;
/// naive date-times keep their own date.
pub fn parse_due_date(raw: &str, clock: &dyn Clock) -> Result<NaiveDate, InvalidDueDate> {
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(instant) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(clock.to_local(instant.with_timezone(&Utc)).date());
    }
    NAIVE_DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(|naive| naive.date())
        .ok_or_else(|| InvalidDueDate(raw.to_string()))
}

/// Instant at which the reminder for `due_date` fires: its local calendar date
/// at `time`. `None` when the date cannot be parsed or the wall time does not
/// exist locally.
pub fn reminder_instant(
    due_date: &str,
    time: ReminderTime,
    clock: &dyn Clock,
) -> Option<DateTime<Utc>> {
    let date = match parse_due_date(due_date, clock) {
        Ok(date) => date,
        Err(err) => {
            tracing::debug!(%err, "ignoring due date");
            return None;
        }
    };
    let local = date.and_time(time.as_naive_time());
    let instant = clock.from_local(local);
    if instant.is_none() {
        tracing::debug!(%local, "reminder time does not exist in local zone");
    }
    instant
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{FixedOffset, TimeZone};

    fn clock(offset_hours: i32) -> FixedClock {
        FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            FixedOffset::east_opt(offset_hours * 3600).unwrap(),
        )
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn accepts_dates_and_date_times() {
        let utc = clock(0);
        assert_eq!(parse_due_date("2024-01-05", &utc), Ok(date(2024, 1, 5)));
        assert_eq!(parse_due_date(" 2024-01-05 ", &utc), Ok(date(2024, 1, 5)));
        assert_eq!(parse_due_date("2024-01-05T23:30:00", &utc), Ok(date(2024, 1, 5)));
        assert_eq!(parse_due_date("2024-01-05T23:30", &utc), Ok(date(2024, 1, 5)));
        assert_eq!(parse_due_date("2024-01-05T10:00:00.000Z", &utc), Ok(date(2024, 1, 5)));
        assert!(parse_due_date("next tuesday", &utc).is_err());
        assert!(parse_due_date("2024-02-30", &utc).is_err());
        assert!(parse_due_date("", &utc).is_err());
    }

    #[test]
    fn offset_date_times_use_local_calendar_date() {
        let tokyo = clock(9);
        assert_eq!(
            parse_due_date("2024-01-05T20:00:00Z", &tokyo),
            Ok(date(2024, 1, 6))
        );
        let new_york = clock(-5);
        assert_eq!(
            parse_due_date("2024-01-05T02:00:00Z", &new_york),
            Ok(date(2024, 1, 4))
        );
    }

    #[test]
    fn reminder_instant_discards_encoded_time() {
        let berlin = clock(1);
        let time = ReminderTime { hour: 8, minute: 30 };
        let instant = reminder_instant("2024-01-05T18:45:00", time, &berlin).unwrap();
        assert_eq!(instant, Utc.with_ymd_and_hms(2024, 1, 5, 7, 30, 0).unwrap());
        assert_eq!(reminder_instant("garbage", time, &berlin), None);
    }
}
