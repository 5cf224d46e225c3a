//! Calendar helpers for length-of-service arithmetic.

use chrono::{Datelike, Months, NaiveDate, Weekday};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct ServiceTime {
    pub years: u32,
    pub months: u32,
}

impl ServiceTime {
    pub fn total_months(&self) -> u32 {
        self.years * 12 + self.months
    }
}

/// Whole calendar months elapsed between two dates. A month counts once the
/// day-of-month of `from` has been reached again.
pub fn whole_months_between(from: NaiveDate, to: NaiveDate) -> u32 {
    if to <= from {
        return 0;
    }
    let mut months = (to.year() - from.year()) * 12 + to.month() as i32 - from.month() as i32;
    if to.day() < from.day() && !is_clamped_month_end(from, to) {
        months -= 1;
    }
    months.max(0) as u32
}

// Jan 31 -> Feb 28 is a full month.
fn is_clamped_month_end(from: NaiveDate, to: NaiveDate) -> bool {
    from.day() > last_day_of_month(to).day() && to == last_day_of_month(to)
}

pub fn service_time(hire_date: NaiveDate, at: NaiveDate) -> ServiceTime {
    let months = whole_months_between(hire_date, at);
    ServiceTime {
        years: months / 12,
        months: months % 12,
    }
}

pub fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    let first = first_day_of_month(date);
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(date)
}

pub fn first_day_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Anniversary of `hire_date` after `years` years; Feb 29 falls back to Feb 28.
pub fn anniversary(hire_date: NaiveDate, years: u32) -> NaiveDate {
    hire_date
        .checked_add_months(Months::new(years * 12))
        .unwrap_or(hire_date)
}

pub fn last_anniversary(hire_date: NaiveDate, at: NaiveDate) -> NaiveDate {
    anniversary(hire_date, service_time(hire_date, at).years)
}

/// Counts Mondays in the inclusive range. Social security is assessed per Monday.
pub fn mondays_between(start: NaiveDate, end: NaiveDate) -> u32 {
    if end < start {
        return 0;
    }
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| d.weekday() == Weekday::Mon)
        .count() as u32
}

/// Calendar months of `year` in which the employee worked at least one day.
pub fn months_worked_in_year(
    hire_date: NaiveDate,
    termination_date: Option<NaiveDate>,
    year: i32,
) -> u32 {
    let (Some(year_start), Some(year_end)) = (
        NaiveDate::from_ymd_opt(year, 1, 1),
        NaiveDate::from_ymd_opt(year, 12, 31),
    ) else {
        return 0;
    };

    let start = hire_date.max(year_start);
    let end = termination_date.map_or(year_end, |t| t.min(year_end));
    if end < start {
        return 0;
    }
    end.month() - start.month() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn counts_whole_months() {
        assert_eq!(whole_months_between(d(2020, 3, 15), d(2020, 4, 14)), 0);
        assert_eq!(whole_months_between(d(2020, 3, 15), d(2020, 4, 15)), 1);
        assert_eq!(whole_months_between(d(2020, 1, 31), d(2020, 2, 29)), 1);
        assert_eq!(whole_months_between(d(2020, 5, 1), d(2020, 4, 1)), 0);
    }

    #[test]
    fn service_time_splits_years_and_months() {
        let st = service_time(d(2018, 6, 10), d(2024, 9, 9));
        assert_eq!(st, ServiceTime { years: 6, months: 2 });
        assert_eq!(st.total_months(), 74);
    }

    #[test]
    fn leap_day_anniversary_falls_back() {
        assert_eq!(anniversary(d(2020, 2, 29), 1), d(2021, 2, 28));
        assert_eq!(anniversary(d(2020, 2, 29), 4), d(2024, 2, 29));
    }

    #[test]
    fn counts_mondays_inclusive() {
        // 2026-06-01 is a Monday
        assert_eq!(mondays_between(d(2026, 6, 1), d(2026, 6, 15)), 3);
        assert_eq!(mondays_between(d(2026, 6, 2), d(2026, 6, 7)), 0);
        assert_eq!(mondays_between(d(2026, 6, 1), d(2026, 6, 30)), 5);
        assert_eq!(mondays_between(d(2026, 6, 30), d(2026, 6, 1)), 0);
    }

    #[test]
    fn months_worked_counts_partial_months() {
        assert_eq!(months_worked_in_year(d(2020, 1, 1), None, 2025), 12);
        assert_eq!(months_worked_in_year(d(2025, 3, 20), None, 2025), 10);
        assert_eq!(
            months_worked_in_year(d(2019, 1, 1), Some(d(2025, 4, 2)), 2025),
            4
        );
        assert_eq!(months_worked_in_year(d(2026, 1, 1), None, 2025), 0);
    }

    #[test]
    fn month_bounds() {
        assert_eq!(last_day_of_month(d(2024, 2, 10)), d(2024, 2, 29));
        assert_eq!(last_day_of_month(d(2025, 12, 3)), d(2025, 12, 31));
        assert_eq!(first_day_of_month(d(2025, 12, 3)), d(2025, 12, 1));
    }
}
