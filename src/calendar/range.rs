//! Calendar arithmetic shared by the index, the population workers and the
//! archive routes.
//!
//! Every calendar question ("which day is this message on", "where does
//! March 2021 start") is answered in one configured [`CalendarZone`]. Period
//! boundaries are half-open: a month runs from local midnight of its first
//! day up to, but excluding, local midnight of the first day of the next
//! month. That keeps the last second of December 31 inside December without
//! any fudge factor on the upper bound.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Probes used when local midnight falls inside a DST gap.
const DST_GAP_PROBES: i64 = 8;
const DST_GAP_STEP_MINUTES: i64 = 15;

/// Time zone used to split timestamps into calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarZone {
    /// The process time zone, including its DST rules.
    Local,
    /// A fixed offset from UTC.
    Fixed(FixedOffset),
}

impl CalendarZone {
    pub fn utc() -> Self {
        CalendarZone::Fixed(Utc.fix())
    }

    /// Parse `local`, `UTC`/`Z`, or an offset such as `+03:00`, `-0530`, `+5`.
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "local" => Some(CalendarZone::Local),
            "utc" | "z" => Some(CalendarZone::utc()),
            _ => parse_offset(trimmed).map(CalendarZone::Fixed),
        }
    }

    /// Calendar date of an epoch-second timestamp in this zone.
    ///
    /// Returns `None` for timestamps outside chrono's representable range.
    pub fn date_of(self, timestamp: i64) -> Option<CalendarDate> {
        let instant = DateTime::<Utc>::from_timestamp(timestamp, 0)?;
        let date = match self {
            CalendarZone::Local => instant.with_timezone(&chrono::Local).date_naive(),
            CalendarZone::Fixed(offset) => instant.with_timezone(&offset).date_naive(),
        };
        Some(CalendarDate::from(date))
    }

    /// First instant (epoch seconds) of `date` in this zone.
    pub fn start_of_day(self, date: NaiveDate) -> Option<i64> {
        let midnight = date.and_hms_opt(0, 0, 0)?;
        match self {
            CalendarZone::Local => first_instant(&chrono::Local, midnight),
            CalendarZone::Fixed(offset) => first_instant(&offset, midnight),
        }
    }

    /// `[Jan 1 of year, Jan 1 of year + 1)`.
    pub fn year_range(self, year: i32) -> Option<TimeRange> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let next = NaiveDate::from_ymd_opt(year.checked_add(1)?, 1, 1)?;
        self.between(start, next)
    }

    /// `[day 1 of month, day 1 of the following month)`.
    pub fn month_range(self, year: i32, month: u32) -> Option<TimeRange> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year.checked_add(1)?, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        self.between(start, next)
    }

    /// `[midnight of date, midnight of the next day)`.
    pub fn day_range(self, date: NaiveDate) -> Option<TimeRange> {
        self.between(date, date.succ_opt()?)
    }

    fn between(self, start: NaiveDate, end: NaiveDate) -> Option<TimeRange> {
        Some(TimeRange::Between {
            start: self.start_of_day(start)?,
            end: self.start_of_day(end)?,
        })
    }
}

impl std::fmt::Display for CalendarZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalendarZone::Local => write!(f, "local"),
            CalendarZone::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}

/// Earliest instant at or after `local` that exists in `tz`.
///
/// Midnight can be skipped by a DST transition in some zones; the day then
/// starts at the first wall-clock time that does exist.
fn first_instant<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> Option<i64> {
    (0..=DST_GAP_PROBES).find_map(|step| {
        let probe = local.checked_add_signed(Duration::minutes(step * DST_GAP_STEP_MINUTES))?;
        tz.from_local_datetime(&probe)
            .earliest()
            .map(|instant| instant.timestamp())
    })
}

fn parse_offset(value: &str) -> Option<FixedOffset> {
    let (sign, rest) = match value.as_bytes().first()? {
        b'+' => (1, &value[1..]),
        b'-' => (-1, &value[1..]),
        _ => return None,
    };
    if rest.is_empty() || !rest.is_ascii() {
        return None;
    }

    let (hours, minutes) = match rest.split_once(':') {
        Some(parts) => parts,
        None if rest.len() == 4 => rest.split_at(2),
        None => (rest, "0"),
    };
    let hours: i32 = hours.parse::<u8>().ok()?.into();
    let minutes: i32 = minutes.parse::<u8>().ok()?.into();
    if hours > 23 || minutes > 59 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Year, month (1-12) and day (1-31) of a message in the calendar zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CalendarDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl From<NaiveDate> for CalendarDate {
    fn from(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
            day: date.day(),
        }
    }
}

/// Range of message timestamps to read from the archive, in epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRange {
    /// Whole history of the conversation.
    All,
    /// `start <= t < end`.
    Between { start: i64, end: i64 },
}

impl TimeRange {
    pub fn contains(&self, timestamp: i64) -> bool {
        match *self {
            TimeRange::All => true,
            TimeRange::Between { start, end } => start <= timestamp && timestamp < end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plus_three() -> CalendarZone {
        CalendarZone::Fixed(FixedOffset::east_opt(3 * 3600).unwrap())
    }

    fn local_ts(zone: CalendarZone, y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> i64 {
        match zone {
            CalendarZone::Fixed(offset) => offset
                .with_ymd_and_hms(y, m, d, h, min, s)
                .single()
                .unwrap()
                .timestamp(),
            CalendarZone::Local => panic!("tests use fixed zones"),
        }
    }

    #[test]
    fn parses_zone_specs() {
        assert_eq!(CalendarZone::parse("local"), Some(CalendarZone::Local));
        assert_eq!(CalendarZone::parse(" UTC "), Some(CalendarZone::utc()));
        assert_eq!(CalendarZone::parse("+03:00"), Some(plus_three()));
        assert_eq!(CalendarZone::parse("+0300"), Some(plus_three()));
        assert_eq!(CalendarZone::parse("+3"), Some(plus_three()));
        assert_eq!(
            CalendarZone::parse("-05:30"),
            Some(CalendarZone::Fixed(FixedOffset::west_opt(5 * 3600 + 30 * 60).unwrap()))
        );
        assert_eq!(CalendarZone::parse("+25:00"), None);
        assert_eq!(CalendarZone::parse("+-5"), None);
        assert_eq!(CalendarZone::parse("Europe/Moscow"), None);
    }

    #[test]
    fn date_of_uses_zone_offset() {
        // 2020-12-31T22:30:00Z is already January 1st at +03:00.
        let ts = Utc.with_ymd_and_hms(2020, 12, 31, 22, 30, 0).unwrap().timestamp();
        assert_eq!(
            plus_three().date_of(ts),
            Some(CalendarDate { year: 2021, month: 1, day: 1 })
        );
        assert_eq!(
            CalendarZone::utc().date_of(ts),
            Some(CalendarDate { year: 2020, month: 12, day: 31 })
        );
    }

    #[test]
    fn last_second_of_december_stays_in_december() {
        let zone = plus_three();
        let last = local_ts(zone, 2020, 12, 31, 23, 59, 59);

        assert!(zone.month_range(2020, 12).unwrap().contains(last));
        assert!(zone.year_range(2020).unwrap().contains(last));
        assert!(!zone.month_range(2021, 1).unwrap().contains(last));
        assert!(!zone.year_range(2021).unwrap().contains(last));
    }

    #[test]
    fn ranges_end_at_next_period_start() {
        let zone = plus_three();
        let TimeRange::Between { start, end } = zone.year_range(2020).unwrap() else {
            panic!("year range is bounded");
        };
        assert_eq!(start, local_ts(zone, 2020, 1, 1, 0, 0, 0));
        assert_eq!(end, local_ts(zone, 2021, 1, 1, 0, 0, 0));

        let TimeRange::Between { start, end } = zone.month_range(2024, 2).unwrap() else {
            panic!("month range is bounded");
        };
        assert_eq!(start, local_ts(zone, 2024, 2, 1, 0, 0, 0));
        assert_eq!(end, local_ts(zone, 2024, 3, 1, 0, 0, 0));
        assert_eq!(end - start, 29 * 86_400);
    }

    #[test]
    fn month_range_rejects_invalid_month() {
        assert_eq!(CalendarZone::utc().month_range(2020, 0), None);
        assert_eq!(CalendarZone::utc().month_range(2020, 13), None);
    }

    #[test]
    fn day_range_covers_one_day() {
        let zone = CalendarZone::utc();
        let date = NaiveDate::from_ymd_opt(2021, 3, 3).unwrap();
        let range = zone.day_range(date).unwrap();
        assert_eq!(
            range,
            TimeRange::Between {
                start: 1_614_729_600,
                end: 1_614_729_600 + 86_400,
            }
        );
    }

    #[test]
    fn unbounded_range_contains_everything() {
        assert!(TimeRange::All.contains(i64::MIN));
        assert!(TimeRange::All.contains(0));
        assert!(TimeRange::All.contains(i64::MAX));
    }

    #[test]
    fn out_of_range_timestamp_has_no_date() {
        assert_eq!(CalendarZone::utc().date_of(i64::MAX), None);
    }

    fn sao_paulo_midnight(y: i32, m: u32, d: u32) -> Option<i64> {
        let midnight = NaiveDate::from_ymd_opt(y, m, d)?.and_hms_opt(0, 0, 0)?;
        first_instant(&chrono_tz::America::Sao_Paulo, midnight)
    }

    #[test]
    fn day_skipping_midnight_starts_at_first_existing_instant() {
        // Clocks jumped from 00:00 to 01:00 on 2018-11-04.
        let start = sao_paulo_midnight(2018, 11, 4).unwrap();
        assert_eq!(start, 1_541_300_400);

        let tz = chrono_tz::America::Sao_Paulo;
        let day_of = |ts: i64| DateTime::<Utc>::from_timestamp(ts, 0).unwrap().with_timezone(&tz).date_naive();
        assert_eq!(day_of(start), NaiveDate::from_ymd_opt(2018, 11, 4).unwrap());
        assert_eq!(day_of(start - 1), NaiveDate::from_ymd_opt(2018, 11, 3).unwrap());

        // The shortened day still ends at the next midnight.
        let next = sao_paulo_midnight(2018, 11, 5).unwrap();
        assert_eq!(next - start, 23 * 3600);
    }

    #[test]
    fn day_with_repeated_hour_lasts_twenty_five_hours() {
        // Clocks fell back from 00:00 on 2019-02-17 to 23:00 on the 16th.
        let start = sao_paulo_midnight(2019, 2, 16).unwrap();
        let end = sao_paulo_midnight(2019, 2, 17).unwrap();
        assert_eq!(start, 1_550_282_400);
        assert_eq!(end - start, 25 * 3600);
    }
}
