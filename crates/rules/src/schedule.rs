//! Duty-window checks for rule schedules.

use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;
use rulewatch_core::{ScheduleItem, TimeOfDay};

use crate::error::EvalError;

/// Whether any schedule item covers `now`. No items means always on duty.
///
/// Window matching compares hour and minute independently, so a window of
/// 08:30-17:15 never matches: no minute is both >= 30 and <= 15. Stored
/// schedules are authored against this behaviour.
pub fn is_on_duty(items: &[ScheduleItem], now: DateTime<Utc>) -> Result<bool, EvalError> {
    if items.is_empty() {
        return Ok(true);
    }

    for item in items {
        let tz = resolve_timezone(&item.timezone)?;
        let local = now.with_timezone(&tz);

        let weekday = local.weekday().num_days_from_sunday() as usize;
        if !item.active_days.get(weekday).copied().unwrap_or(false) {
            continue;
        }

        let from = item.time_from;
        let to = match item.time_to {
            TimeOfDay { hours: 0, minutes: 0 } => TimeOfDay::new(24, 0),
            other => other,
        };

        if from == TimeOfDay::new(0, 0) && to == TimeOfDay::new(24, 0) {
            return Ok(true);
        }

        let (hour, minute) = (local.hour(), local.minute());
        if hour >= from.hours && minute >= from.minutes && hour <= to.hours && minute <= to.minutes {
            return Ok(true);
        }
    }

    Ok(false)
}

fn resolve_timezone(name: &str) -> Result<Tz, EvalError> {
    if name.is_empty() {
        return Ok(Tz::UTC);
    }
    name.parse::<Tz>()
        .map_err(|_| EvalError::UnknownTimezone(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const ALL_DAYS: [bool; 7] = [true; 7];

    fn item(from: (u32, u32), to: (u32, u32), tz: &str, days: &[bool]) -> ScheduleItem {
        ScheduleItem {
            time_from: TimeOfDay::new(from.0, from.1),
            time_to: TimeOfDay::new(to.0, to.1),
            timezone: tz.into(),
            active_days: days.to_vec(),
        }
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn empty_schedule_is_always_on_duty() {
        assert!(is_on_duty(&[], utc(2024, 1, 1, 3, 7)).unwrap());
    }

    #[test]
    fn whole_day_window_matches_any_time() {
        for end in [(0, 0), (24, 0)] {
            let items = [item((0, 0), end, "UTC", &ALL_DAYS)];
            for hour in [0, 11, 23] {
                assert!(is_on_duty(&items, utc(2024, 3, 5, hour, 59)).unwrap());
            }
        }
    }

    #[test]
    fn inactive_weekday_never_matches() {
        // 2024-01-07 is a Sunday (index 0).
        let mut days = ALL_DAYS;
        days[0] = false;
        let items = [item((0, 0), (0, 0), "UTC", &days)];
        assert!(!is_on_duty(&items, utc(2024, 1, 7, 12, 0)).unwrap());
        assert!(is_on_duty(&items, utc(2024, 1, 8, 12, 0)).unwrap());
    }

    #[test]
    fn short_weekday_list_treats_missing_days_as_inactive() {
        // Saturday is index 6, absent here.
        let items = [item((0, 0), (0, 0), "UTC", &[true, true])];
        assert!(!is_on_duty(&items, utc(2024, 1, 6, 12, 0)).unwrap());
        assert!(is_on_duty(&items, utc(2024, 1, 7, 12, 0)).unwrap());
    }

    #[test]
    fn weekday_is_taken_in_item_timezone() {
        // Sunday 23:30 UTC is already Monday in Vienna.
        let mut monday_only = [false; 7];
        monday_only[1] = true;
        let items = [item((0, 0), (0, 0), "Europe/Vienna", &monday_only)];
        assert!(is_on_duty(&items, utc(2024, 1, 7, 23, 30)).unwrap());
    }

    #[test]
    fn hour_and_minute_are_compared_independently() {
        let items = [item((8, 30), (17, 15), "UTC", &ALL_DAYS)];
        assert!(!is_on_duty(&items, utc(2024, 1, 8, 8, 0)).unwrap());
        assert!(!is_on_duty(&items, utc(2024, 1, 8, 12, 45)).unwrap());
        assert!(!is_on_duty(&items, utc(2024, 1, 8, 12, 0)).unwrap());
        assert!(!is_on_duty(&items, utc(2024, 1, 8, 18, 0)).unwrap());

        let items = [item((8, 0), (17, 59), "UTC", &ALL_DAYS)];
        assert!(is_on_duty(&items, utc(2024, 1, 8, 12, 45)).unwrap());
        assert!(!is_on_duty(&items, utc(2024, 1, 8, 7, 45)).unwrap());
    }

    #[test]
    fn any_matching_item_wins() {
        let items = [
            item((1, 0), (2, 0), "UTC", &ALL_DAYS),
            item((0, 0), (0, 0), "UTC", &ALL_DAYS),
        ];
        assert!(is_on_duty(&items, utc(2024, 1, 8, 15, 0)).unwrap());
    }

    #[test]
    fn empty_timezone_means_utc() {
        let items = [item((10, 0), (10, 59), "", &ALL_DAYS)];
        assert!(is_on_duty(&items, utc(2024, 1, 8, 10, 20)).unwrap());
    }

    #[test]
    fn unknown_timezone_is_an_error() {
        let items = [item((0, 0), (0, 0), "Mars/Olympus", &ALL_DAYS)];
        assert!(matches!(
            is_on_duty(&items, utc(2024, 1, 8, 10, 0)),
            Err(EvalError::UnknownTimezone(tz)) if tz == "Mars/Olympus"
        ));
    }
}
