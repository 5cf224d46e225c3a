//! SENIAT and BANAVIH artifacts built from already-persisted records.

pub mod books;
pub mod faov;
pub mod islr_xml;
pub mod iva_txt;

use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::domain::DomainError;
use crate::domain::service::last_day_of_month;

pub const FISCAL_EOL: &str = "\r\n";

#[derive(Debug, Clone, Copy, Deserialize, IntoParams, ToSchema)]
pub struct PeriodQuery {
    #[schema(example = 2026)]
    pub year: i32,
    #[schema(example = 1)]
    pub month: u32,
}

impl PeriodQuery {
    pub fn range(&self) -> Result<(NaiveDate, NaiveDate), DomainError> {
        month_range(self.year, self.month)
    }

    /// `YYYYMM` as used in SENIAT file headers.
    pub fn label(&self) -> String {
        format!("{:04}{:02}", self.year, self.month)
    }
}

pub fn month_range(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), DomainError> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| DomainError::Invalid(format!("invalid period {year}-{month}")))?;
    Ok((first, last_day_of_month(first)))
}

/// Fortnight 1 covers days 1 to 15, fortnight 2 the rest of the month.
pub fn half_range(year: i32, month: u32, half: u8) -> Result<(NaiveDate, NaiveDate), DomainError> {
    let (first, last) = month_range(year, month)?;
    let fifteenth = first.with_day0(14).unwrap_or(first);
    match half {
        1 => Ok((first, fifteenth)),
        2 => Ok((fifteenth.succ_opt().unwrap_or(last), last)),
        other => Err(DomainError::Invalid(format!("half must be 1 or 2, got {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn splits_month_in_fortnights() {
        assert_eq!(half_range(2026, 2, 1).unwrap(), (d(2026, 2, 1), d(2026, 2, 15)));
        assert_eq!(half_range(2026, 2, 2).unwrap(), (d(2026, 2, 16), d(2026, 2, 28)));
        assert!(half_range(2026, 2, 3).is_err());
        assert!(month_range(2026, 13).is_err());
    }

    #[test]
    fn labels_period() {
        assert_eq!(PeriodQuery { year: 2026, month: 3 }.label(), "202603");
    }
}
