//! Invoice totals: IVA by aliquot, exempt sales and IGTF on foreign-currency payments.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use super::currency::Currency;
use super::{DomainError, round2};
use crate::config::LegalParams;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaxKind {
    General,
    Reducida,
    Exento,
}

impl TaxKind {
    pub fn rate(&self, legal: &LegalParams) -> Decimal {
        match self {
            TaxKind::General => legal.iva_general_rate,
            TaxKind::Reducida => legal.iva_reduced_rate,
            TaxKind::Exento => Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaxableLine {
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub tax_kind: TaxKind,
}

impl TaxableLine {
    pub fn amount(&self) -> Decimal {
        round2(self.quantity * self.unit_price)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct InvoiceTotals {
    pub exento: Decimal,
    pub base_general: Decimal,
    pub iva_general: Decimal,
    pub base_reducida: Decimal,
    pub iva_reducida: Decimal,
    pub subtotal: Decimal,
    pub iva: Decimal,
    pub igtf: Decimal,
    pub total: Decimal,
}

pub fn compute_totals(
    lines: &[TaxableLine],
    payment_currency: Currency,
    legal: &LegalParams,
) -> Result<InvoiceTotals, DomainError> {
    if lines.is_empty() {
        return Err(DomainError::EmptyInvoice);
    }

    let mut totals = InvoiceTotals::default();
    for line in lines {
        if line.quantity <= Decimal::ZERO {
            return Err(DomainError::NonPositiveQuantity);
        }
        if line.unit_price < Decimal::ZERO {
            return Err(DomainError::Invalid("unit price must not be negative".into()));
        }
        let amount = line.amount();
        match line.tax_kind {
            TaxKind::General => totals.base_general += amount,
            TaxKind::Reducida => totals.base_reducida += amount,
            TaxKind::Exento => totals.exento += amount,
        }
    }

    let iva_general = totals.base_general * TaxKind::General.rate(legal);
    let iva_reducida = totals.base_reducida * TaxKind::Reducida.rate(legal);
    // per-aliquot columns feed the sales book; the invoice tax is rounded once
    totals.iva_general = round2(iva_general);
    totals.iva_reducida = round2(iva_reducida);
    totals.iva = round2(iva_general + iva_reducida);
    totals.subtotal = totals.exento + totals.base_general + totals.base_reducida;

    if !payment_currency.is_local() {
        totals.igtf = round2((totals.subtotal + totals.iva) * legal.igtf_rate);
    }
    totals.total = totals.subtotal + totals.iva + totals.igtf;

    Ok(totals)
}

/// Fiscal control number printed on the invoice, e.g. `00-00000042`.
pub fn control_number(sequence: u64) -> String {
    format!("00-{sequence:08}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(qty: Decimal, price: Decimal, kind: TaxKind) -> TaxableLine {
        TaxableLine {
            quantity: qty,
            unit_price: price,
            tax_kind: kind,
        }
    }

    #[test]
    fn mixes_aliquots_in_bolivares() {
        let legal = LegalParams::default();
        let totals = compute_totals(
            &[
                line(dec!(2), dec!(50), TaxKind::General),
                line(dec!(1), dec!(200), TaxKind::Reducida),
                line(dec!(3), dec!(10), TaxKind::Exento),
            ],
            Currency::Ves,
            &legal,
        )
        .unwrap();

        assert_eq!(totals.base_general, dec!(100.00));
        assert_eq!(totals.iva_general, dec!(16.00));
        assert_eq!(totals.base_reducida, dec!(200.00));
        assert_eq!(totals.iva_reducida, dec!(16.00));
        assert_eq!(totals.exento, dec!(30.00));
        assert_eq!(totals.subtotal, dec!(330.00));
        assert_eq!(totals.iva, dec!(32.00));
        assert_eq!(totals.igtf, Decimal::ZERO);
        assert_eq!(totals.total, dec!(362.00));
    }

    #[test]
    fn foreign_currency_adds_igtf() {
        let legal = LegalParams::default();
        let totals = compute_totals(
            &[line(dec!(1), dec!(1000), TaxKind::General)],
            Currency::Usd,
            &legal,
        )
        .unwrap();
        // (1000 + 160) * 3%
        assert_eq!(totals.igtf, dec!(34.80));
        assert_eq!(totals.total, dec!(1194.80));
    }

    #[test]
    fn fractional_quantities_round_per_line() {
        let legal = LegalParams::default();
        let totals = compute_totals(
            &[line(dec!(1.255), dec!(10), TaxKind::General)],
            Currency::Ves,
            &legal,
        )
        .unwrap();
        assert_eq!(totals.base_general, dec!(12.55));
        assert_eq!(totals.iva_general, dec!(2.01));
    }

    #[test]
    fn iva_rounds_once_per_invoice() {
        let legal = LegalParams::default();
        let totals = compute_totals(
            &[
                line(dec!(1), dec!(0.03), TaxKind::General),
                line(dec!(1), dec!(0.06), TaxKind::Reducida),
            ],
            Currency::Ves,
            &legal,
        )
        .unwrap();
        // 0.0048 + 0.0048 rounds to 0.01 while each aliquot alone rounds to zero
        assert_eq!(totals.iva_general, dec!(0.00));
        assert_eq!(totals.iva_reducida, dec!(0.00));
        assert_eq!(totals.iva, dec!(0.01));
        assert_eq!(totals.total, dec!(0.10));
    }

    #[test]
    fn rejects_empty_and_non_positive() {
        let legal = LegalParams::default();
        assert_eq!(
            compute_totals(&[], Currency::Ves, &legal),
            Err(DomainError::EmptyInvoice)
        );
        assert_eq!(
            compute_totals(&[line(dec!(0), dec!(1), TaxKind::General)], Currency::Ves, &legal),
            Err(DomainError::NonPositiveQuantity)
        );
    }

    #[test]
    fn formats_control_number() {
        assert_eq!(control_number(42), "00-00000042");
    }
}
