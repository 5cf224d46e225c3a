//! Termination settlement (liquidación) under LOTTT art. 142 and 92.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use super::benefits::{
    LedgerTotals, bono_vacacional_days, integral_daily_salary, months_since_anniversary,
    vacation_days,
};
use super::service::{ServiceTime, months_worked_in_year, service_time};
use super::{DomainError, round2};
use crate::config::LegalParams;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TerminationReason {
    Renuncia,
    DespidoJustificado,
    DespidoInjustificado,
    MutuoAcuerdo,
}

/// Which of the two art. 142 computations produced the larger amount.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SeveranceMethod {
    Garantia,
    Retroactivo,
}

#[derive(Debug, Clone)]
pub struct SettlementInput {
    pub hire_date: NaiveDate,
    pub termination_date: NaiveDate,
    pub monthly_salary: Decimal,
    pub reason: TerminationReason,
    pub ledger: LedgerTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Settlement {
    pub service: ServiceTime,
    pub daily_salary: Decimal,
    pub daily_integral_salary: Decimal,
    pub garantia: Decimal,
    pub retroactive: Decimal,
    pub method: SeveranceMethod,
    pub prestaciones: Decimal,
    pub intereses: Decimal,
    pub indemnizacion: Decimal,
    pub vacaciones: Decimal,
    pub bono_vacacional: Decimal,
    pub utilidades: Decimal,
    pub anticipos: Decimal,
    pub total: Decimal,
}

const RETROACTIVE_DAYS_PER_YEAR: Decimal = dec!(30);

pub fn compute_settlement(input: &SettlementInput, legal: &LegalParams) -> Result<Settlement, DomainError> {
    if input.termination_date < input.hire_date {
        return Err(DomainError::TerminationBeforeHire);
    }
    if input.monthly_salary <= Decimal::ZERO {
        return Err(DomainError::NonPositiveSalary);
    }

    let service = service_time(input.hire_date, input.termination_date);
    let daily = input.monthly_salary / dec!(30);
    let integral = integral_daily_salary(daily, service.years, legal);

    // A fraction above six months counts as a full year.
    let retro_years = service.years + u32::from(service.months > 6);
    let retroactive = round2(RETROACTIVE_DAYS_PER_YEAR * integral * Decimal::from(retro_years));
    let garantia = input.ledger.deposits();

    let (method, prestaciones) = if retroactive > garantia {
        (SeveranceMethod::Retroactivo, retroactive)
    } else {
        (SeveranceMethod::Garantia, garantia)
    };

    let indemnizacion = match input.reason {
        TerminationReason::DespidoInjustificado => prestaciones,
        _ => Decimal::ZERO,
    };

    let months_fraction = Decimal::from(months_since_anniversary(input.hire_date, input.termination_date));
    let next_year = service.years + 1;
    let vacaciones = round2(vacation_days(next_year) / dec!(12) * months_fraction * daily);
    let bono_vacacional = round2(bono_vacacional_days(next_year) / dec!(12) * months_fraction * daily);

    let months_in_year = months_worked_in_year(
        input.hire_date,
        Some(input.termination_date),
        input.termination_date.year(),
    );
    let utilidades = round2(legal.utilidades_days / dec!(12) * Decimal::from(months_in_year) * daily);

    let intereses = input.ledger.intereses;
    let anticipos = input.ledger.anticipos;
    let total = prestaciones + intereses + indemnizacion + vacaciones + bono_vacacional + utilidades
        - anticipos;

    Ok(Settlement {
        service,
        daily_salary: round2(daily),
        daily_integral_salary: integral,
        garantia,
        retroactive,
        method,
        prestaciones,
        intereses,
        indemnizacion,
        vacaciones,
        bono_vacacional,
        utilidades,
        anticipos,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::benefits::BenefitKind;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn input(reason: TerminationReason, ledger: LedgerTotals) -> SettlementInput {
        SettlementInput {
            hire_date: d(2020, 1, 15),
            // 5 years, 7 months
            termination_date: d(2025, 8, 20),
            monthly_salary: dec!(3000),
            reason,
            ledger,
        }
    }

    #[test]
    fn retroactive_wins_without_ledger() {
        let legal = LegalParams::default();
        let s = compute_settlement(&input(TerminationReason::Renuncia, LedgerTotals::default()), &legal)
            .unwrap();

        assert_eq!(s.service, ServiceTime { years: 5, months: 7 });
        assert_eq!(s.daily_salary, dec!(100.00));
        // bono 19 days at 5 years -> 113.61
        assert_eq!(s.daily_integral_salary, dec!(113.61));
        // 7 months > 6 so six years count
        assert_eq!(s.retroactive, dec!(20449.80));
        assert_eq!(s.method, SeveranceMethod::Retroactivo);
        assert_eq!(s.prestaciones, dec!(20449.80));
        assert_eq!(s.indemnizacion, Decimal::ZERO);
        // 20 days / 12 * 7 months * 100
        assert_eq!(s.vacaciones, dec!(1166.67));
        assert_eq!(s.bono_vacacional, dec!(1166.67));
        // 30 / 12 * 8 months * 100
        assert_eq!(s.utilidades, dec!(2000.00));
        assert_eq!(s.total, dec!(24783.14));
    }

    #[test]
    fn garantia_wins_when_larger_and_advances_are_deducted() {
        let legal = LegalParams::default();
        let mut ledger = LedgerTotals::default();
        ledger.add(BenefitKind::Garantia, dec!(25000));
        ledger.add(BenefitKind::Intereses, dec!(300));
        ledger.add(BenefitKind::Anticipo, dec!(1000));

        let s = compute_settlement(&input(TerminationReason::DespidoInjustificado, ledger), &legal)
            .unwrap();

        assert_eq!(s.method, SeveranceMethod::Garantia);
        assert_eq!(s.prestaciones, dec!(25000));
        assert_eq!(s.indemnizacion, dec!(25000));
        assert_eq!(s.intereses, dec!(300));
        assert_eq!(s.anticipos, dec!(1000));
        assert_eq!(
            s.total,
            dec!(25000) + dec!(300) + dec!(25000) + s.vacaciones + s.bono_vacacional + s.utilidades
                - dec!(1000)
        );
    }

    #[test]
    fn rejects_termination_before_hire() {
        let legal = LegalParams::default();
        let mut inp = input(TerminationReason::Renuncia, LedgerTotals::default());
        inp.termination_date = d(2019, 12, 31);
        assert_eq!(
            compute_settlement(&inp, &legal),
            Err(DomainError::TerminationBeforeHire)
        );
    }

    #[test]
    fn short_service_has_no_retroactive_years() {
        let legal = LegalParams::default();
        let mut inp = input(TerminationReason::MutuoAcuerdo, LedgerTotals::default());
        inp.hire_date = d(2025, 3, 1);
        inp.termination_date = d(2025, 6, 15);
        let s = compute_settlement(&inp, &legal).unwrap();
        assert_eq!(s.service, ServiceTime { years: 0, months: 3 });
        assert_eq!(s.retroactive, Decimal::ZERO);
        assert_eq!(s.prestaciones, Decimal::ZERO);
        // 15 days / 12 * 3 months * 100
        assert_eq!(s.vacaciones, dec!(375.00));
    }
}
