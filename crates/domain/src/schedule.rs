//! Recurring trigger definitions: `@every <n><unit>` intervals and
//! `@daily HH:MM` wall-clock times (UTC).

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, NaiveTime, TimeZone, Timelike, Utc};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("unrecognized schedule `{0}` (expected `@every <n><s|m|h|d>` or `@daily HH:MM`)")]
    Unrecognized(String),
    #[error("invalid interval `{0}`")]
    InvalidInterval(String),
    #[error("invalid time of day `{0}`")]
    InvalidTime(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    Every(Duration),
    DailyAt(NaiveTime),
}

impl Schedule {
    pub fn daily_at(hour: u32, minute: u32) -> Self {
        Self::DailyAt(NaiveTime::from_hms_opt(hour % 24, minute % 60, 0).unwrap_or(NaiveTime::MIN))
    }

    /// First fire time strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Schedule::Every(interval) => {
                now + chrono::Duration::from_std(*interval)
                    .unwrap_or_else(|_| chrono::Duration::days(1))
            }
            Schedule::DailyAt(time) => {
                let today = Utc.from_utc_datetime(&now.date_naive().and_time(*time));
                if today > now {
                    today
                } else {
                    today + chrono::Duration::days(1)
                }
            }
        }
    }

    /// Wall-clock delay from `now` until the next fire time.
    pub fn delay_from(&self, now: DateTime<Utc>) -> Duration {
        (self.next_after(now) - now)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

impl FromStr for Schedule {
    type Err = ScheduleError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let mut parts = trimmed.split_whitespace();
        let keyword = parts.next().unwrap_or_default();
        let argument = parts.next();
        if parts.next().is_some() {
            return Err(ScheduleError::Unrecognized(raw.to_string()));
        }

        match (keyword, argument) {
            ("@hourly", None) => Ok(Schedule::Every(Duration::from_secs(3600))),
            ("@daily", None) => Ok(Schedule::DailyAt(NaiveTime::MIN)),
            ("@daily", Some(time)) => NaiveTime::parse_from_str(time, "%H:%M")
                .map(Schedule::DailyAt)
                .map_err(|_| ScheduleError::InvalidTime(time.to_string())),
            ("@every", Some(interval)) => parse_interval(interval).map(Schedule::Every),
            _ => Err(ScheduleError::Unrecognized(raw.to_string())),
        }
    }
}

fn parse_interval(raw: &str) -> Result<Duration, ScheduleError> {
    let invalid = || ScheduleError::InvalidInterval(raw.to_string());
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(invalid)?;
    let (amount, unit) = raw.split_at(split);
    let amount: u64 = amount.parse().map_err(|_| invalid())?;
    let seconds = match unit {
        "s" => amount,
        "m" => amount.checked_mul(60).ok_or_else(invalid)?,
        "h" => amount.checked_mul(3600).ok_or_else(invalid)?,
        "d" => amount.checked_mul(86_400).ok_or_else(invalid)?,
        _ => return Err(invalid()),
    };
    if seconds == 0 {
        return Err(invalid());
    }
    Ok(Duration::from_secs(seconds))
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Every(interval) => write!(f, "@every {}s", interval.as_secs()),
            Schedule::DailyAt(time) => {
                write!(f, "@daily {:02}:{:02}", time.hour(), time.minute())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, h, m, 0).unwrap()
    }

    #[test]
    fn parses_supported_forms() {
        assert_eq!(
            "@every 10m".parse::<Schedule>().unwrap(),
            Schedule::Every(Duration::from_secs(600))
        );
        assert_eq!(
            "@every 1h".parse::<Schedule>().unwrap(),
            Schedule::Every(Duration::from_secs(3600))
        );
        assert_eq!(
            " @daily 08:30 ".parse::<Schedule>().unwrap(),
            Schedule::daily_at(8, 30)
        );
        assert_eq!("@daily".parse::<Schedule>().unwrap(), Schedule::daily_at(0, 0));
        assert_eq!(
            "@hourly".parse::<Schedule>().unwrap(),
            Schedule::Every(Duration::from_secs(3600))
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            "every day".parse::<Schedule>(),
            Err(ScheduleError::Unrecognized(_))
        ));
        assert!(matches!(
            "@every 0s".parse::<Schedule>(),
            Err(ScheduleError::InvalidInterval(_))
        ));
        assert!(matches!(
            "@every 5w".parse::<Schedule>(),
            Err(ScheduleError::InvalidInterval(_))
        ));
        assert!(matches!(
            "@daily 25:00".parse::<Schedule>(),
            Err(ScheduleError::InvalidTime(_))
        ));
    }

    #[test]
    fn daily_fires_later_today_or_tomorrow() {
        let schedule = Schedule::daily_at(8, 0);
        assert_eq!(schedule.next_after(at(6, 15)), at(8, 0));
        assert_eq!(
            schedule.next_after(at(8, 0)),
            at(8, 0) + chrono::Duration::days(1)
        );
        assert_eq!(
            schedule.delay_from(at(7, 0)),
            Duration::from_secs(3600)
        );
    }

    #[test]
    fn interval_adds_to_now() {
        let schedule = Schedule::Every(Duration::from_secs(90));
        assert_eq!(
            schedule.next_after(at(0, 0)),
            at(0, 1) + chrono::Duration::seconds(30)
        );
    }

    #[test]
    fn display_round_trips() {
        for raw in ["@every 600s", "@daily 08:05"] {
            let schedule: Schedule = raw.parse().unwrap();
            assert_eq!(schedule.to_string(), raw);
        }
    }
}
