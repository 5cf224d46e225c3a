//! Per-employee payroll computation for a single run period.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use super::service::mondays_between;
use super::{DomainError, round2};
use crate::config::LegalParams;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PayFrequency {
    Semanal,
    Quincenal,
    Mensual,
}

impl PayFrequency {
    /// Salary days paid per period on the 30-day commercial month.
    pub fn day_count(&self) -> i32 {
        match self {
            PayFrequency::Semanal => 7,
            PayFrequency::Quincenal => 15,
            PayFrequency::Mensual => 30,
        }
    }

    pub fn days(&self) -> Decimal {
        Decimal::from(self.day_count())
    }
}

/// Variable inputs ("novedades") for one employee in one run.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct PayrollAdjustment {
    pub employee_id: u64,
    #[serde(default)]
    pub bonus: Decimal,
    #[serde(default)]
    pub overtime_hours: Decimal,
    #[serde(default)]
    pub absence_days: Decimal,
}

#[derive(Debug, Clone)]
pub struct PayrollInput<'a> {
    pub employee_label: &'a str,
    pub monthly_salary: Decimal,
    pub islr_rate: Decimal,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub frequency: PayFrequency,
    pub bonus: Decimal,
    pub overtime_hours: Decimal,
    pub absence_days: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PayrollLine {
    pub base_salary: Decimal,
    pub days: i32,
    pub earnings: Decimal,
    pub overtime: Decimal,
    pub bonuses: Decimal,
    pub absences: Decimal,
    pub gross: Decimal,
    pub sso: Decimal,
    pub rpe: Decimal,
    pub faov: Decimal,
    /// Withholding fraction applied to `gross`
    pub islr_rate: Decimal,
    pub islr: Decimal,
    pub total_deductions: Decimal,
    pub net: Decimal,
    pub employer_sso: Decimal,
    pub employer_rpe: Decimal,
    pub employer_faov: Decimal,
    pub employer_inces: Decimal,
}

impl PayrollLine {
    pub fn employer_total(&self) -> Decimal {
        self.employer_sso + self.employer_rpe + self.employer_faov + self.employer_inces
    }
}

// Overtime surcharge, LOTTT art. 118
const OVERTIME_FACTOR: Decimal = dec!(1.5);
const HOURS_PER_DAY: Decimal = dec!(8);
const COMMERCIAL_MONTH_DAYS: Decimal = dec!(30);

/// Weekly equivalent of a monthly base: twelve months spread over 52 weeks.
fn weekly(monthly: Decimal) -> Decimal {
    monthly * dec!(12) / dec!(52)
}

pub fn compute_line(input: &PayrollInput<'_>, legal: &LegalParams) -> Result<PayrollLine, DomainError> {
    if input.period_end < input.period_start {
        return Err(DomainError::InvertedPeriod {
            start: input.period_start.to_string(),
            end: input.period_end.to_string(),
        });
    }
    if input.monthly_salary <= Decimal::ZERO {
        return Err(DomainError::NonPositiveSalary);
    }

    let days = input.frequency.days();
    if input.absence_days > days {
        return Err(DomainError::TooManyAbsences {
            absences: input.absence_days,
            days,
        });
    }
    if input.bonus < Decimal::ZERO
        || input.overtime_hours < Decimal::ZERO
        || input.absence_days < Decimal::ZERO
    {
        return Err(DomainError::Invalid(
            "adjustments must not be negative".to_string(),
        ));
    }

    let daily = input.monthly_salary / COMMERCIAL_MONTH_DAYS;
    let hourly = daily / HOURS_PER_DAY;

    let earnings = round2(daily * days);
    let overtime = round2(hourly * OVERTIME_FACTOR * input.overtime_hours);
    let bonuses = round2(input.bonus);
    let absences = round2(daily * input.absence_days);
    let gross = (earnings + overtime + bonuses - absences).max(Decimal::ZERO);

    let mondays = Decimal::from(mondays_between(input.period_start, input.period_end));
    let sso_base = weekly(input.monthly_salary.min(legal.minimum_wage * legal.sso_cap_wages));
    let rpe_base = weekly(input.monthly_salary.min(legal.minimum_wage * legal.rpe_cap_wages));

    let sso = round2(sso_base * legal.sso_employee_rate * mondays);
    let rpe = round2(rpe_base * legal.rpe_employee_rate * mondays);
    let faov = round2(gross * legal.faov_employee_rate);
    let islr = round2(gross * input.islr_rate);
    let total_deductions = sso + rpe + faov + islr;
    let net = gross - total_deductions;

    if net < Decimal::ZERO {
        return Err(DomainError::NegativeNet(input.employee_label.to_string()));
    }

    Ok(PayrollLine {
        base_salary: input.monthly_salary,
        days: input.frequency.day_count(),
        earnings,
        overtime,
        bonuses,
        absences,
        gross,
        sso,
        rpe,
        faov,
        islr_rate: input.islr_rate,
        islr,
        total_deductions,
        net,
        employer_sso: round2(sso_base * legal.sso_employer_rate * mondays),
        employer_rpe: round2(rpe_base * legal.rpe_employer_rate * mondays),
        employer_faov: round2(gross * legal.faov_employer_rate),
        employer_inces: round2(gross * legal.inces_employer_rate),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct RunTotals {
    pub total_gross: Decimal,
    pub total_deductions: Decimal,
    pub total_net: Decimal,
    pub total_employer: Decimal,
}

pub fn totals<'a>(lines: impl IntoIterator<Item = &'a PayrollLine>) -> RunTotals {
    lines.into_iter().fold(RunTotals::default(), |mut acc, line| {
        acc.total_gross += line.gross;
        acc.total_deductions += line.total_deductions;
        acc.total_net += line.net;
        acc.total_employer += line.employer_total();
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn input(monthly: Decimal) -> PayrollInput<'static> {
        PayrollInput {
            employee_label: "EMP-001",
            monthly_salary: monthly,
            islr_rate: Decimal::ZERO,
            // June 2026 first fortnight: three Mondays (1, 8, 15)
            period_start: d(2026, 6, 1),
            period_end: d(2026, 6, 15),
            frequency: PayFrequency::Quincenal,
            bonus: Decimal::ZERO,
            overtime_hours: Decimal::ZERO,
            absence_days: Decimal::ZERO,
        }
    }

    #[test]
    fn fortnight_below_caps() {
        let legal = LegalParams::default();
        let line = compute_line(&input(dec!(520)), &legal).unwrap();

        assert_eq!(line.days, 15);
        assert_eq!(line.earnings, dec!(260.00));
        assert_eq!(line.gross, dec!(260.00));
        // 520 * 12 / 52 = 120 weekly; 120 * 4% * 3 mondays
        assert_eq!(line.sso, dec!(14.40));
        // 120 * 0.5% * 3
        assert_eq!(line.rpe, dec!(1.80));
        assert_eq!(line.faov, dec!(2.60));
        assert_eq!(line.islr, dec!(0.00));
        assert_eq!(line.total_deductions, dec!(18.80));
        assert_eq!(line.net, dec!(241.20));
        assert_eq!(line.employer_sso, dec!(32.40));
        assert_eq!(line.employer_inces, dec!(5.20));
    }

    #[test]
    fn sso_base_is_capped_at_five_minimum_wages() {
        let legal = LegalParams::default();
        let line = compute_line(&input(dec!(5200)), &legal).unwrap();

        // cap = 130 * 5 = 650 -> weekly 150
        assert_eq!(line.sso, dec!(18.00));
        // rpe cap = 1300 -> weekly 300
        assert_eq!(line.rpe, dec!(4.50));
        assert_eq!(line.gross, dec!(2600.00));
        assert_eq!(line.faov, dec!(26.00));
    }

    #[test]
    fn adjustments_flow_into_gross_and_islr() {
        let legal = LegalParams::default();
        let mut inp = input(dec!(2400));
        inp.islr_rate = dec!(0.02);
        inp.bonus = dec!(100);
        inp.overtime_hours = dec!(4);
        inp.absence_days = dec!(1);
        let line = compute_line(&inp, &legal).unwrap();

        // daily 80, hourly 10
        assert_eq!(line.earnings, dec!(1200.00));
        assert_eq!(line.overtime, dec!(60.00));
        assert_eq!(line.absences, dec!(80.00));
        assert_eq!(line.gross, dec!(1280.00));
        assert_eq!(line.islr, dec!(25.60));
        assert_eq!(line.islr_rate, dec!(0.02));
    }

    #[test]
    fn rejects_excess_absences() {
        let legal = LegalParams::default();
        let mut inp = input(dec!(520));
        inp.absence_days = dec!(16);
        assert!(matches!(
            compute_line(&inp, &legal),
            Err(DomainError::TooManyAbsences { .. })
        ));
    }

    #[test]
    fn full_absence_leaves_negative_net() {
        let legal = LegalParams::default();
        let mut inp = input(dec!(520));
        inp.absence_days = dec!(15);
        assert_eq!(
            compute_line(&inp, &legal),
            Err(DomainError::NegativeNet("EMP-001".to_string()))
        );
    }

    #[test]
    fn rejects_inverted_period() {
        let legal = LegalParams::default();
        let mut inp = input(dec!(520));
        inp.period_end = d(2026, 5, 31);
        assert!(matches!(
            compute_line(&inp, &legal),
            Err(DomainError::InvertedPeriod { .. })
        ));
    }

    #[test]
    fn sums_run_totals() {
        let legal = LegalParams::default();
        let a = compute_line(&input(dec!(520)), &legal).unwrap();
        let b = compute_line(&input(dec!(5200)), &legal).unwrap();
        let t = totals([&a, &b]);
        assert_eq!(t.total_gross, dec!(2860.00));
        assert_eq!(t.total_net, a.net + b.net);
        assert_eq!(t.total_employer, a.employer_total() + b.employer_total());
    }

    #[test]
    fn frequency_parses_from_lowercase() {
        assert_eq!("quincenal".parse::<PayFrequency>().unwrap(), PayFrequency::Quincenal);
        assert_eq!(PayFrequency::Mensual.as_ref(), "mensual");
    }
}
