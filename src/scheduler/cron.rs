//! 5-field cron grammar parser and `next(after)` computation.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike};
use chrono_tz::Tz;

use super::error::{SchedulerError, SchedulerResult};

const SAFETY_CAP: u32 = 366 * 24 * 60;

#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    minute: Vec<u32>,
    hour: Vec<u32>,
    day_of_month: Vec<u32>,
    month: Vec<u32>,
    weekday: Vec<u32>,
    timezone: Tz,
}

fn parse_range(part: &str, min: u32, max: u32) -> SchedulerResult<(u32, u32)> {
    let (a, b) = part
        .split_once('-')
        .ok_or_else(|| SchedulerError::InvalidCronExpression(part.to_string()))?;
    let a: u32 = a
        .parse()
        .map_err(|_| SchedulerError::InvalidCronExpression(part.to_string()))?;
    let b: u32 = b
        .parse()
        .map_err(|_| SchedulerError::InvalidCronExpression(part.to_string()))?;
    if a < min || b > max || a > b {
        return Err(SchedulerError::InvalidCronExpression(part.to_string()));
    }
    Ok((a, b))
}

fn parse_field(field: &str, min: u32, max: u32) -> SchedulerResult<Vec<u32>> {
    let mut values = BTreeSet::new();
    for part in field.split(',') {
        if part == "*" {
            values.extend(min..=max);
        } else if let Some(step_str) = part.strip_prefix("*/") {
            let step: u32 = step_str
                .parse()
                .map_err(|_| SchedulerError::InvalidCronExpression(part.to_string()))?;
            if step == 0 {
                return Err(SchedulerError::InvalidCronExpression(part.to_string()));
            }
            let mut v = min;
            while v <= max {
                values.insert(v);
                v += step;
            }
        } else if let Some((range, step_str)) = part.split_once('/') {
            let step: u32 = step_str
                .parse()
                .map_err(|_| SchedulerError::InvalidCronExpression(part.to_string()))?;
            if step == 0 {
                return Err(SchedulerError::InvalidCronExpression(part.to_string()));
            }
            let (a, b) = parse_range(range, min, max)?;
            let mut v = a;
            while v <= b {
                values.insert(v);
                v += step;
            }
        } else if part.contains('-') {
            let (a, b) = parse_range(part, min, max)?;
            values.extend(a..=b);
        } else {
            let v: u32 = part
                .parse()
                .map_err(|_| SchedulerError::InvalidCronExpression(part.to_string()))?;
            if v < min || v > max {
                return Err(SchedulerError::InvalidCronExpression(part.to_string()));
            }
            values.insert(v);
        }
    }
    if values.is_empty() {
        return Err(SchedulerError::InvalidCronExpression(field.to_string()));
    }
    Ok(values.into_iter().collect())
}

impl CronSchedule {
    pub fn parse(expression: &str) -> SchedulerResult<Self> {
        Self::parse_in_timezone(expression, Tz::UTC)
    }

    pub fn parse_in_timezone(expression: &str, timezone: Tz) -> SchedulerResult<Self> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(SchedulerError::InvalidCronExpression(expression.to_string()));
        }
        Ok(Self {
            expression: expression.to_string(),
            minute: parse_field(fields[0], 0, 59)?,
            hour: parse_field(fields[1], 0, 23)?,
            day_of_month: parse_field(fields[2], 1, 31)?,
            month: parse_field(fields[3], 1, 12)?,
            weekday: parse_field(fields[4], 0, 6)?,
            timezone,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    fn matches(&self, at: DateTime<Tz>) -> bool {
        self.minute.binary_search(&at.minute()).is_ok()
            && self.hour.binary_search(&at.hour()).is_ok()
            && self.day_of_month.binary_search(&at.day()).is_ok()
            && self.month.binary_search(&at.month()).is_ok()
            && self
                .weekday
                .binary_search(&at.weekday().num_days_from_sunday())
                .is_ok()
    }

    /// Smallest minute-truncated instant strictly after `after` satisfying
    /// all five field sets simultaneously.
    pub fn next(&self, after: DateTime<Tz>) -> SchedulerResult<DateTime<Tz>> {
        let local = after.with_timezone(&self.timezone);
        let mut candidate = local
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(local)
            + Duration::minutes(1);

        for _ in 0..SAFETY_CAP {
            if self.matches(candidate) {
                return Ok(candidate.with_timezone(&after.timezone()));
            }
            candidate += Duration::minutes(1);
        }
        Err(SchedulerError::InvalidCronExpression(format!(
            "no matching time found for '{}' within safety cap",
            self.expression
        )))
    }

    pub fn next_utc(&self, after: DateTime<chrono::Utc>) -> SchedulerResult<DateTime<chrono::Utc>> {
        let converted = self.timezone.from_utc_datetime(&after.naive_utc());
        Ok(self.next(converted)?.with_timezone(&chrono::Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    #[test]
    fn s1_every_5_minutes() {
        let cron = CronSchedule::parse("*/5 * * * *").unwrap();
        let after = chrono::Utc.with_ymd_and_hms(2025, 1, 1, 10, 2, 30).unwrap();
        let next = cron.next_utc(after).unwrap();
        assert_eq!(next, chrono::Utc.with_ymd_and_hms(2025, 1, 1, 10, 5, 0).unwrap());
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(CronSchedule::parse("60 * * * *").is_err());
        assert!(CronSchedule::parse("* 24 * * *").is_err());
        assert!(CronSchedule::parse("* * 32 * *").is_err());
        assert!(CronSchedule::parse("* * * 13 *").is_err());
        assert!(CronSchedule::parse("* * * * 7").is_err());
    }

    #[test]
    fn list_and_range_and_stepped_range() {
        let cron = CronSchedule::parse("0,30 9-17/2 * * 1-5").unwrap();
        assert_eq!(cron.minute, vec![0, 30]);
        assert_eq!(cron.hour, vec![9, 11, 13, 15, 17]);
        assert_eq!(cron.weekday, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn next_is_always_strictly_later_and_minute_truncated() {
        let cron = CronSchedule::parse("*/7 * * * *").unwrap();
        let after = chrono::Utc.with_ymd_and_hms(2025, 3, 14, 1, 2, 3).unwrap();
        let n1 = cron.next_utc(after).unwrap();
        let n2 = cron.next_utc(n1).unwrap();
        assert!(n1 > after);
        assert!(n2 > n1);
        assert_eq!(n1.second(), 0);
        assert!(n2 - n1 >= Duration::minutes(1));
    }

    proptest::proptest! {
        #[test]
        fn invariant_next_next_strictly_increasing(minute_step in 1u32..30, hour_seed in 0i64..23, start_offset_min in 0i64..120) {
            let expr = format!("*/{minute_step} * * * *");
            let cron = CronSchedule::parse(&expr).unwrap();
            let base = chrono::Utc.with_ymd_and_hms(2025, 6, 1, hour_seed as u32, 0, 0).unwrap()
                + Duration::minutes(start_offset_min);
            let n1 = cron.next_utc(base).unwrap();
            let n2 = cron.next_utc(n1).unwrap();
            prop_assert!(n1 >= base + Duration::minutes(1));
            prop_assert!(n2 > n1);
        }
    }
}
