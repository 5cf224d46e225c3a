//! IVA and ISLR withholding on supplier invoices.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use utoipa::ToSchema;

use super::{DomainError, round2};

/// Withholding concept from the ISLR regulation (Decreto 1808).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IslrConcept {
    pub code: &'static str,
    pub description: &'static str,
    pub rate: Decimal,
    pub sustraendo: Decimal,
}

pub const ISLR_CONCEPTS: &[IslrConcept] = &[
    IslrConcept {
        code: "002",
        description: "Honorarios profesionales (persona jurídica)",
        rate: dec!(0.05),
        sustraendo: dec!(0),
    },
    IslrConcept {
        code: "013",
        description: "Arrendamiento de bienes inmuebles (persona jurídica)",
        rate: dec!(0.05),
        sustraendo: dec!(0),
    },
    IslrConcept {
        code: "053",
        description: "Servicios (persona jurídica)",
        rate: dec!(0.02),
        sustraendo: dec!(0),
    },
    IslrConcept {
        code: "055",
        description: "Fletes (persona jurídica)",
        rate: dec!(0.03),
        sustraendo: dec!(0),
    },
    IslrConcept {
        code: "071",
        description: "Publicidad y propaganda (persona jurídica)",
        rate: dec!(0.05),
        sustraendo: dec!(0),
    },
];

/// Salaries and wages, used only for payroll withholding reports.
pub const PAYROLL_ISLR_CODE: &str = "001";

pub fn islr_concept(code: &str) -> Result<&'static IslrConcept, DomainError> {
    ISLR_CONCEPTS
        .iter()
        .find(|c| c.code == code)
        .ok_or_else(|| DomainError::UnknownIslrConcept(code.to_string()))
}

pub fn islr_retention(base: Decimal, concept: &IslrConcept) -> Decimal {
    round2(base * concept.rate - concept.sustraendo).max(Decimal::ZERO)
}

/// Ordinary taxpayers get 75 %; suppliers without formal invoicing get 100 %.
pub fn iva_retention_pct(formal_supplier: bool) -> Decimal {
    if formal_supplier { dec!(0.75) } else { dec!(1.00) }
}

pub fn iva_retention(iva: Decimal, pct: Decimal) -> Decimal {
    round2(iva * pct)
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PurchaseRetentions {
    pub iva: Decimal,
    pub total: Decimal,
    pub iva_retention_pct: Decimal,
    pub iva_retained: Decimal,
    pub islr_retained: Decimal,
    /// Amount actually transferred to the supplier
    pub payable: Decimal,
}

pub fn compute_purchase(
    exento: Decimal,
    base: Decimal,
    iva_rate: Decimal,
    formal_supplier: bool,
    islr_concept_code: Option<&str>,
) -> Result<PurchaseRetentions, DomainError> {
    if exento < Decimal::ZERO || base < Decimal::ZERO || iva_rate < Decimal::ZERO {
        return Err(DomainError::Invalid("amounts must not be negative".into()));
    }
    if exento + base <= Decimal::ZERO {
        return Err(DomainError::Invalid("purchase total must be positive".into()));
    }

    let iva = round2(base * iva_rate);
    let total = exento + base + iva;
    let pct = iva_retention_pct(formal_supplier);
    let iva_retained = iva_retention(iva, pct);
    let islr_retained = match islr_concept_code {
        Some(code) => islr_retention(base + exento, islr_concept(code)?),
        None => Decimal::ZERO,
    };

    Ok(PurchaseRetentions {
        iva,
        total,
        iva_retention_pct: pct,
        iva_retained,
        islr_retained,
        payable: total - iva_retained - islr_retained,
    })
}

/// Retention voucher number: `YYYYMM` followed by an 8-digit sequence.
pub fn retention_voucher(year: i32, month: u32, sequence: u64) -> String {
    format!("{year:04}{month:02}{sequence:08}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formal_supplier_with_services_concept() {
        let r = compute_purchase(dec!(0), dec!(1000), dec!(0.16), true, Some("053")).unwrap();
        assert_eq!(r.iva, dec!(160.00));
        assert_eq!(r.total, dec!(1160.00));
        assert_eq!(r.iva_retained, dec!(120.00));
        assert_eq!(r.islr_retained, dec!(20.00));
        assert_eq!(r.payable, dec!(1020.00));
    }

    #[test]
    fn informal_supplier_full_retention_without_islr() {
        let r = compute_purchase(dec!(50), dec!(200), dec!(0.16), false, None).unwrap();
        assert_eq!(r.iva, dec!(32.00));
        assert_eq!(r.iva_retention_pct, dec!(1.00));
        assert_eq!(r.iva_retained, dec!(32.00));
        assert_eq!(r.islr_retained, Decimal::ZERO);
        assert_eq!(r.payable, dec!(250.00));
    }

    #[test]
    fn unknown_concept_is_rejected() {
        assert_eq!(
            compute_purchase(dec!(0), dec!(10), dec!(0.16), true, Some("999")),
            Err(DomainError::UnknownIslrConcept("999".into()))
        );
    }

    #[test]
    fn sustraendo_never_goes_negative() {
        let concept = IslrConcept {
            code: "X",
            description: "test",
            rate: dec!(0.01),
            sustraendo: dec!(50),
        };
        assert_eq!(islr_retention(dec!(1000), &concept), Decimal::ZERO);
        assert_eq!(islr_retention(dec!(10000), &concept), dec!(50.00));
    }

    #[test]
    fn voucher_format() {
        assert_eq!(retention_voucher(2025, 3, 17), "20250300000017");
    }
}
