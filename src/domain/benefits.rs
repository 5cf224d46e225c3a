//! Prestaciones sociales (LOTTT art. 142/143/144), utilidades and vacation
//! entitlements.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use super::service::{
    anniversary, first_day_of_month, last_anniversary, months_worked_in_year, service_time,
    whole_months_between,
};
use super::{DomainError, round2};
use crate::config::LegalParams;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BenefitKind {
    Garantia,
    DiasAdicionales,
    Intereses,
    Anticipo,
}

const GUARANTEE_DAYS_PER_QUARTER: Decimal = dec!(15);
const MAX_ADDITIONAL_DAYS: u32 = 30;
const ADVANCE_LIMIT: Decimal = dec!(0.75);
const YEAR_BASIS_DAYS: Decimal = dec!(360);

/// Vacation days for the year of service being completed (art. 190).
pub fn vacation_days(years: u32) -> Decimal {
    Decimal::from((15 + years.saturating_sub(1)).min(30))
}

/// Bono vacacional days (art. 192). Same progression as vacation days.
pub fn bono_vacacional_days(years: u32) -> Decimal {
    Decimal::from((15 + years.saturating_sub(1)).min(30))
}

/// Daily salary including the aliquots of utilidades and bono vacacional.
pub fn integral_daily_salary(daily: Decimal, years: u32, legal: &LegalParams) -> Decimal {
    let utilidades_aliquot = daily * legal.utilidades_days / YEAR_BASIS_DAYS;
    let bono_aliquot = daily * bono_vacacional_days(years) / YEAR_BASIS_DAYS;
    round2(daily + utilidades_aliquot + bono_aliquot)
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AccrualEntry {
    pub kind: BenefitKind,
    pub days: Decimal,
    pub daily_integral_salary: Decimal,
    pub amount: Decimal,
    pub note: String,
}

#[derive(Debug, Clone)]
pub struct AccrualInput {
    pub hire_date: NaiveDate,
    pub monthly_salary: Decimal,
    pub quarter_end: NaiveDate,
    /// Net ledger balance before this accrual, used for interest
    pub balance: Decimal,
    pub annual_interest_rate: Decimal,
}

/// Entries to post for one employee at the end of a quarter. Empty when the
/// employee has not yet completed three months of service.
pub fn quarterly_accrual(input: &AccrualInput, legal: &LegalParams) -> Result<Vec<AccrualEntry>, DomainError> {
    if input.monthly_salary <= Decimal::ZERO {
        return Err(DomainError::NonPositiveSalary);
    }
    if input.annual_interest_rate < Decimal::ZERO {
        return Err(DomainError::Invalid("interest rate must not be negative".into()));
    }

    let service = service_time(input.hire_date, input.quarter_end);
    if service.total_months() < 3 {
        return Ok(Vec::new());
    }

    let daily = input.monthly_salary / dec!(30);
    let integral = integral_daily_salary(daily, service.years, legal);
    let mut entries = Vec::with_capacity(3);

    entries.push(AccrualEntry {
        kind: BenefitKind::Garantia,
        days: GUARANTEE_DAYS_PER_QUARTER,
        daily_integral_salary: integral,
        amount: round2(GUARANTEE_DAYS_PER_QUARTER * integral),
        note: format!("Garantía trimestre al {}", input.quarter_end),
    });

    // Two extra days per year after the first, credited on the anniversary.
    if service.years >= 2 && anniversary_in_quarter(input.hire_date, service.years, input.quarter_end) {
        let extra = (2 * (service.years - 1)).min(MAX_ADDITIONAL_DAYS);
        let days = Decimal::from(extra);
        entries.push(AccrualEntry {
            kind: BenefitKind::DiasAdicionales,
            days,
            daily_integral_salary: integral,
            amount: round2(days * integral),
            note: format!("Días adicionales año {}", service.years),
        });
    }

    let interest = round2(input.balance * input.annual_interest_rate / dec!(4));
    if interest > Decimal::ZERO {
        entries.push(AccrualEntry {
            kind: BenefitKind::Intereses,
            days: Decimal::ZERO,
            daily_integral_salary: Decimal::ZERO,
            amount: interest,
            note: format!("Intereses tasa {}", input.annual_interest_rate),
        });
    }

    Ok(entries)
}

fn anniversary_in_quarter(hire_date: NaiveDate, years: u32, quarter_end: NaiveDate) -> bool {
    let date = anniversary(hire_date, years);
    let quarter_start = quarter_start(quarter_end);
    date >= quarter_start && date <= quarter_end
}

/// First day of the three-month window that ends on `quarter_end`.
pub fn quarter_start(quarter_end: NaiveDate) -> NaiveDate {
    first_day_of_month(quarter_end)
        .checked_sub_months(chrono::Months::new(2))
        .unwrap_or(quarter_end)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct LedgerTotals {
    pub garantia: Decimal,
    pub dias_adicionales: Decimal,
    pub intereses: Decimal,
    pub anticipos: Decimal,
}

impl LedgerTotals {
    pub fn add(&mut self, kind: BenefitKind, amount: Decimal) {
        match kind {
            BenefitKind::Garantia => self.garantia += amount,
            BenefitKind::DiasAdicionales => self.dias_adicionales += amount,
            BenefitKind::Intereses => self.intereses += amount,
            BenefitKind::Anticipo => self.anticipos += amount,
        }
    }

    pub fn deposits(&self) -> Decimal {
        self.garantia + self.dias_adicionales
    }

    pub fn balance(&self) -> Decimal {
        self.deposits() + self.intereses - self.anticipos
    }

    /// Up to 75 % of the deposits may be advanced, net of prior advances (art. 144).
    pub fn available_for_advance(&self) -> Decimal {
        (round2(self.deposits() * ADVANCE_LIMIT) - self.anticipos).max(Decimal::ZERO)
    }
}

pub fn check_advance(totals: &LedgerTotals, requested: Decimal) -> Result<(), DomainError> {
    if requested <= Decimal::ZERO {
        return Err(DomainError::Invalid("advance must be positive".into()));
    }
    let available = totals.available_for_advance();
    if requested > available {
        return Err(DomainError::AdvanceTooLarge {
            requested,
            available,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct UtilidadesLine {
    pub months_worked: u32,
    pub days: Decimal,
    pub daily_salary: Decimal,
    pub amount: Decimal,
    pub inces: Decimal,
    pub net: Decimal,
}

/// Profit-sharing for a fiscal year, prorated by months worked (art. 131, 132).
pub fn utilidades(
    monthly_salary: Decimal,
    hire_date: NaiveDate,
    termination_date: Option<NaiveDate>,
    year: i32,
    legal: &LegalParams,
) -> UtilidadesLine {
    let months_worked = months_worked_in_year(hire_date, termination_date, year);
    let daily = monthly_salary / dec!(30);
    let days = legal.utilidades_days * Decimal::from(months_worked) / dec!(12);
    let amount = round2(daily * days);
    let inces = round2(amount * legal.inces_employee_rate);

    UtilidadesLine {
        months_worked,
        days: round2(days),
        daily_salary: round2(daily),
        amount,
        inces,
        net: amount - inces,
    }
}

/// Months since the most recent anniversary, used for fractional vacations.
pub fn months_since_anniversary(hire_date: NaiveDate, at: NaiveDate) -> u32 {
    whole_months_between(last_anniversary(hire_date, at), at)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn vacation_entitlement_grows_and_caps() {
        assert_eq!(vacation_days(0), dec!(15));
        assert_eq!(vacation_days(1), dec!(15));
        assert_eq!(vacation_days(5), dec!(19));
        assert_eq!(vacation_days(40), dec!(30));
        assert_eq!(bono_vacacional_days(16), dec!(30));
    }

    #[test]
    fn integral_salary_adds_aliquots() {
        let legal = LegalParams::default();
        // 100 + 100*30/360 + 100*15/360 = 112.50
        assert_eq!(integral_daily_salary(dec!(100), 1, &legal), dec!(112.50));
        // 5 years: bono 19 days -> 100 + 8.333 + 5.277 = 113.61
        assert_eq!(integral_daily_salary(dec!(100), 5, &legal), dec!(113.61));
    }

    #[test]
    fn no_accrual_before_three_months() {
        let legal = LegalParams::default();
        let entries = quarterly_accrual(
            &AccrualInput {
                hire_date: d(2025, 2, 1),
                monthly_salary: dec!(3000),
                quarter_end: d(2025, 3, 31),
                balance: Decimal::ZERO,
                annual_interest_rate: dec!(0.5),
            },
            &legal,
        )
        .unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn quarter_with_anniversary_and_interest() {
        let legal = LegalParams::default();
        // hired 2022-05-10, quarter Apr-Jun 2025 contains 3rd anniversary
        let entries = quarterly_accrual(
            &AccrualInput {
                hire_date: d(2022, 5, 10),
                monthly_salary: dec!(3000),
                quarter_end: d(2025, 6, 30),
                balance: dec!(10000),
                annual_interest_rate: dec!(0.20),
            },
            &legal,
        )
        .unwrap();

        assert_eq!(entries.len(), 3);
        // daily 100, 3 years -> bono 17 days: 100 + 8.3333 + 4.7222 = 113.06
        assert_eq!(entries[0].kind, BenefitKind::Garantia);
        assert_eq!(entries[0].daily_integral_salary, dec!(113.06));
        assert_eq!(entries[0].amount, dec!(1695.90));

        assert_eq!(entries[1].kind, BenefitKind::DiasAdicionales);
        assert_eq!(entries[1].days, dec!(4));
        assert_eq!(entries[1].amount, dec!(452.24));

        assert_eq!(entries[2].kind, BenefitKind::Intereses);
        assert_eq!(entries[2].amount, dec!(500.00));
    }

    #[test]
    fn no_additional_days_outside_anniversary_quarter() {
        let legal = LegalParams::default();
        let entries = quarterly_accrual(
            &AccrualInput {
                hire_date: d(2022, 5, 10),
                monthly_salary: dec!(3000),
                quarter_end: d(2025, 9, 30),
                balance: Decimal::ZERO,
                annual_interest_rate: dec!(0.20),
            },
            &legal,
        )
        .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, BenefitKind::Garantia);
    }

    #[test]
    fn advance_limited_to_75_percent_of_deposits() {
        let mut totals = LedgerTotals::default();
        totals.add(BenefitKind::Garantia, dec!(1000));
        totals.add(BenefitKind::Intereses, dec!(50));
        totals.add(BenefitKind::Anticipo, dec!(500));

        assert_eq!(totals.balance(), dec!(550));
        assert_eq!(totals.available_for_advance(), dec!(250));
        assert!(check_advance(&totals, dec!(250)).is_ok());
        assert!(matches!(
            check_advance(&totals, dec!(250.01)),
            Err(DomainError::AdvanceTooLarge { .. })
        ));
        assert!(check_advance(&totals, Decimal::ZERO).is_err());
    }

    #[test]
    fn utilidades_prorated() {
        let legal = LegalParams::default();
        let line = utilidades(dec!(3000), d(2025, 4, 15), None, 2025, &legal);
        assert_eq!(line.months_worked, 9);
        assert_eq!(line.days, dec!(22.50));
        assert_eq!(line.amount, dec!(2250.00));
        assert_eq!(line.inces, dec!(11.25));
        assert_eq!(line.net, dec!(2238.75));
    }

    #[test]
    fn quarter_start_is_three_months_back() {
        assert_eq!(quarter_start(d(2025, 6, 30)), d(2025, 4, 1));
        assert_eq!(quarter_start(d(2025, 3, 31)), d(2025, 1, 1));
    }

    #[test]
    fn months_since_last_anniversary() {
        assert_eq!(months_since_anniversary(d(2020, 3, 1), d(2025, 8, 15)), 5);
        assert_eq!(months_since_anniversary(d(2025, 3, 1), d(2025, 3, 20)), 0);
    }
}
