//! Pure business arithmetic. Nothing in here touches the database, so every
//! calculator can be exercised directly from unit tests.

pub mod benefits;
pub mod currency;
pub mod invoicing;
pub mod payroll;
pub mod retention;
pub mod service;
pub mod severance;

use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum DomainError {
    #[error("period end {end} is before period start {start}")]
    InvertedPeriod { start: String, end: String },

    #[error("net pay for employee {0} would be negative")]
    NegativeNet(String),

    #[error("absence days ({absences}) exceed period days ({days})")]
    TooManyAbsences { absences: Decimal, days: Decimal },

    #[error("monthly salary must be positive")]
    NonPositiveSalary,

    #[error("termination date precedes hire date")]
    TerminationBeforeHire,

    #[error("advance of {requested} exceeds available {available}")]
    AdvanceTooLarge { requested: Decimal, available: Decimal },

    #[error("invoice needs at least one line")]
    EmptyInvoice,

    #[error("line quantity must be positive")]
    NonPositiveQuantity,

    #[error("unknown ISLR concept {0}")]
    UnknownIslrConcept(String),

    #[error("{0}")]
    Invalid(String),
}

/// Rounds a money amount to cents, half away from zero.
pub fn round2(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round2(dec!(1.005)), dec!(1.01));
        assert_eq!(round2(dec!(2.345)), dec!(2.35));
        assert_eq!(round2(dec!(-1.005)), dec!(-1.01));
        assert_eq!(round2(dec!(10)), dec!(10));
    }
}
