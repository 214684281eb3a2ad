//! `calculate_next_run_at` (§4.G): a pure function over `chrono_tz::Tz` so
//! it is testable without a store or a wall-clock mock.

use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

use research_core::model::{EpochMillis, Frequency};

fn parse_delivery_time(delivery_time: &str) -> Option<(u32, u32)> {
    let (h, m) = delivery_time.split_once(':')?;
    let hour: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some((hour, minute))
}

/// Last valid day of `year`/`month`, so a `dayOfMonth=31` clamps instead of
/// overflowing into the next month.
fn last_day_of_month(year: i32, month: u32) -> u32 {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    first_of_next
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

fn month_day_clamped(year: i32, month: u32, target_day: u8) -> NaiveDate {
    let day = u32::from(target_day).clamp(1, last_day_of_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_else(|| NaiveDate::from_ymd_opt(year, month, 1).expect("first of month is always valid"))
}

fn first_of_next_month(date: NaiveDate) -> NaiveDate {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
    .expect("the first of a month is always a valid date")
}

/// ISO weekday (1=Monday..7=Sunday) of the soonest date on or after `date`
/// matching `target_iso_weekday`.
fn next_weekday_on_or_after(date: NaiveDate, target_iso_weekday: u8) -> NaiveDate {
    let current = i64::from(date.weekday().number_from_monday());
    let target = i64::from(target_iso_weekday);
    let mut delta = target - current;
    if delta < 0 {
        delta += 7;
    }
    date + ChronoDuration::days(delta)
}

/// Resolves a local calendar date + `(hour, minute)` to a concrete instant
/// in `tz`. Rolls forward a day at a time past a DST spring-forward gap
/// where the wall-clock time never occurs, and picks the earlier instant
/// on a DST fall-back overlap where it occurs twice.
fn resolve_local(tz: Tz, mut date: NaiveDate, hour: u32, minute: u32) -> DateTime<Tz> {
    loop {
        let naive = date
            .and_hms_opt(hour, minute, 0)
            .expect("hour/minute were validated by parse_delivery_time");
        match tz.from_local_datetime(&naive) {
            chrono::LocalResult::Single(dt) => return dt,
            chrono::LocalResult::Ambiguous(earliest, _) => return earliest,
            chrono::LocalResult::None => {
                date = date.succ_opt().unwrap_or(date);
            }
        }
    }
}

/// §4.G: the soonest future instant whose local projection in `tz` matches
/// `deliveryTime` and, for weekly/monthly, the named day. Day-of-month
/// overflow clamps to the last day of shorter months. `frequency=once`
/// resolves to `now` itself — the caller (`research_scheduler::worker`)
/// is responsible for never calling this again for a one-shot project
/// once it has run.
#[must_use]
pub fn calculate_next_run_at(
    frequency: Frequency,
    delivery_time: &str,
    tz: Tz,
    day_of_week: Option<u8>,
    day_of_month: Option<u8>,
    now: DateTime<Utc>,
) -> Option<EpochMillis> {
    if frequency == Frequency::Once {
        return Some(EpochMillis::from_datetime(now));
    }

    let (hour, minute) = parse_delivery_time(delivery_time)?;
    let local_now = now.with_timezone(&tz);
    let today = local_now.date_naive();

    let candidate_date = match frequency {
        Frequency::Once => unreachable!("handled above"),
        Frequency::Daily => today,
        Frequency::Weekly => next_weekday_on_or_after(today, day_of_week?),
        Frequency::Monthly => month_day_clamped(today.year(), today.month(), day_of_month?),
    };

    let mut candidate = resolve_local(tz, candidate_date, hour, minute);
    if candidate <= local_now {
        candidate = match frequency {
            Frequency::Once => unreachable!("handled above"),
            Frequency::Daily => {
                let tomorrow = candidate_date.succ_opt().unwrap_or(candidate_date);
                resolve_local(tz, tomorrow, hour, minute)
            }
            Frequency::Weekly => {
                let tomorrow = candidate_date.succ_opt().unwrap_or(candidate_date);
                let next = next_weekday_on_or_after(tomorrow, day_of_week?);
                resolve_local(tz, next, hour, minute)
            }
            Frequency::Monthly => {
                let next_month = first_of_next_month(candidate_date);
                let next = month_day_clamped(next_month.year(), next_month.month(), day_of_month?);
                resolve_local(tz, next, hour, minute)
            }
        };
    }

    Some(EpochMillis::from_datetime(candidate.with_timezone(&Utc)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Offset;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn daily_same_day_when_delivery_time_has_not_passed() {
        let now = utc(2026, 3, 10, 8, 0);
        let next = calculate_next_run_at(Frequency::Daily, "09:00", chrono_tz::UTC, None, None, now)
            .unwrap();
        assert_eq!(next, EpochMillis::from_datetime(utc(2026, 3, 10, 9, 0)));
    }

    #[test]
    fn daily_rolls_to_tomorrow_when_delivery_time_has_passed() {
        let now = utc(2026, 3, 10, 10, 0);
        let next = calculate_next_run_at(Frequency::Daily, "09:00", chrono_tz::UTC, None, None, now)
            .unwrap();
        assert_eq!(next, EpochMillis::from_datetime(utc(2026, 3, 11, 9, 0)));
    }

    #[test]
    fn weekly_matches_named_weekday() {
        // 2026-03-10 is a Tuesday (ISO weekday 2).
        let now = utc(2026, 3, 10, 8, 0);
        let next = calculate_next_run_at(Frequency::Weekly, "09:00", chrono_tz::UTC, Some(2), None, now)
            .unwrap();
        assert_eq!(next, EpochMillis::from_datetime(utc(2026, 3, 10, 9, 0)));
    }

    #[test]
    fn weekly_rolls_to_next_week_past_target_weekday() {
        let now = utc(2026, 3, 11, 8, 0); // Wednesday
        let next = calculate_next_run_at(Frequency::Weekly, "09:00", chrono_tz::UTC, Some(2), None, now)
            .unwrap();
        assert_eq!(next, EpochMillis::from_datetime(utc(2026, 3, 17, 9, 0)));
    }

    #[test]
    fn monthly_clamps_day_31_in_february() {
        let now = utc(2026, 2, 1, 0, 0);
        let next = calculate_next_run_at(Frequency::Monthly, "09:00", chrono_tz::UTC, None, Some(31), now)
            .unwrap();
        assert_eq!(next, EpochMillis::from_datetime(utc(2026, 2, 28, 9, 0)));
    }

    #[test]
    fn monthly_rolls_to_next_month_past_target_day() {
        let now = utc(2026, 3, 20, 10, 0);
        let next = calculate_next_run_at(Frequency::Monthly, "09:00", chrono_tz::UTC, None, Some(15), now)
            .unwrap();
        assert_eq!(next, EpochMillis::from_datetime(utc(2026, 4, 15, 9, 0)));
    }

    #[test]
    fn once_resolves_to_now() {
        let now = utc(2026, 3, 10, 8, 0);
        let next = calculate_next_run_at(Frequency::Once, "09:00", chrono_tz::UTC, None, None, now)
            .unwrap();
        assert_eq!(next, EpochMillis::from_datetime(now));
    }

    #[test]
    fn malformed_delivery_time_returns_none() {
        let now = utc(2026, 3, 10, 8, 0);
        assert!(calculate_next_run_at(Frequency::Daily, "25:99", chrono_tz::UTC, None, None, now).is_none());
    }

    #[test]
    fn daily_rolls_forward_across_spring_forward_gap() {
        // America/New_York: 2026-03-08 02:00-02:59 local does not exist.
        // 2026-03-07 08:00 UTC is 03:00 EST, already past the 02:30 delivery
        // time, so today's candidate is stale and the rollover lands
        // squarely on the gap day.
        let tz: Tz = "America/New_York".parse().unwrap();
        let now = utc(2026, 3, 7, 8, 0);
        let next = calculate_next_run_at(Frequency::Daily, "02:30", tz, None, None, now).unwrap();
        let local = next.to_datetime().with_timezone(&tz);
        assert_ne!(local.date_naive(), NaiveDate::from_ymd_opt(2026, 3, 8).unwrap());
        assert!(next.to_datetime() > now);
    }

    #[test]
    fn daily_picks_earliest_instant_across_fall_back_overlap() {
        // America/New_York: 2026-11-01 01:00-01:59 local occurs twice.
        let tz: Tz = "America/New_York".parse().unwrap();
        let now = utc(2026, 10, 31, 12, 0);
        let next = calculate_next_run_at(Frequency::Daily, "01:30", tz, None, None, now).unwrap();
        let local = next.to_datetime().with_timezone(&tz);
        assert_eq!(local.date_naive(), NaiveDate::from_ymd_opt(2026, 11, 1).unwrap());
        // The earlier of the two instants is the one still in EDT (UTC-4).
        assert_eq!(local.offset().fix().local_minus_utc(), -4 * 3600);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// §9 Open Question 10: day-of-month overflow always clamps into
        /// the target month instead of spilling into the next one.
        #[test]
        fn monthly_clamp_never_exceeds_last_day_of_month(
            year in 2020i32..2035,
            month in 1u32..=12,
            target_day in 1u8..=31,
        ) {
            let date = month_day_clamped(year, month, target_day);
            prop_assert!(date.day() <= last_day_of_month(year, month));
            prop_assert_eq!(date.month(), month);
            prop_assert_eq!(date.year(), year);
        }

        /// Whatever `now` is, the computed run is strictly in its future,
        /// across arbitrary valid delivery times and calendar dates.
        #[test]
        fn next_run_at_is_always_strictly_after_now(
            year in 2024i32..2030,
            month in 1u32..=12,
            day in 1u32..=28,
            hour in 0u32..24,
            minute in 0u32..60,
            delivery_hour in 0u32..24,
            delivery_minute in 0u32..60,
            day_of_week in 1u8..=7,
            day_of_month in 1u8..=28,
        ) {
            let now = Utc.with_ymd_and_hms(year, month, day, hour, minute, 0).unwrap();
            let delivery_time = format!("{delivery_hour:02}:{delivery_minute:02}");

            for frequency in [Frequency::Daily, Frequency::Weekly, Frequency::Monthly] {
                let next = calculate_next_run_at(
                    frequency,
                    &delivery_time,
                    chrono_tz::UTC,
                    Some(day_of_week),
                    Some(day_of_month),
                    now,
                ).expect("valid inputs always resolve to a run time");
                prop_assert!(next.to_datetime() > now);
            }
        }
    }
}
