//! Libro de ventas and libro de compras.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::FISCAL_EOL;
use crate::model::invoice::{Invoice, InvoiceStatus};
use crate::model::purchase::Purchase;
use crate::utils::text::{csv_field, decimal_comma};

const SEP: char = ';';

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BookFormat {
    #[default]
    Json,
    Csv,
}

/// Taxpayer keeping the book.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BookCompany {
    #[schema(example = "J-12345678-9")]
    pub rif: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SalesBookRow {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub rif: String,
    pub name: String,
    pub invoice_number: u64,
    pub control_number: String,
    pub total: Decimal,
    pub exento: Decimal,
    pub base_general: Decimal,
    pub iva_general: Decimal,
    pub base_reducida: Decimal,
    pub iva_reducida: Decimal,
    pub igtf: Decimal,
    #[schema(example = "EMITIDA")]
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct SalesBookTotals {
    pub total: Decimal,
    pub exento: Decimal,
    pub base_general: Decimal,
    pub iva_general: Decimal,
    pub base_reducida: Decimal,
    pub iva_reducida: Decimal,
    pub igtf: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SalesBook {
    pub company: BookCompany,
    #[schema(example = "202601")]
    pub period: String,
    pub rows: Vec<SalesBookRow>,
    pub totals: SalesBookTotals,
}

fn sales_row(invoice: &Invoice) -> SalesBookRow {
    let void = invoice.status == InvoiceStatus::Void.as_ref();
    let amount = |v: Decimal| if void { Decimal::ZERO } else { v };

    SalesBookRow {
        date: invoice.invoice_date,
        rif: invoice.customer_rif.clone(),
        name: invoice.customer_name.clone(),
        invoice_number: invoice.invoice_number,
        control_number: invoice.control_number.clone(),
        total: amount(invoice.total),
        exento: amount(invoice.exento),
        base_general: amount(invoice.base_general),
        iva_general: amount(invoice.iva_general),
        base_reducida: amount(invoice.base_reducida),
        iva_reducida: amount(invoice.iva_reducida),
        igtf: amount(invoice.igtf),
        status: if void { "ANULADA" } else { "EMITIDA" }.to_string(),
    }
}

/// One row per invoice of the period, ordered by invoice number. Void
/// invoices stay in the book with zeroed amounts.
pub fn sales_book(company: BookCompany, period: String, invoices: &[Invoice]) -> SalesBook {
    let mut rows: Vec<SalesBookRow> = invoices.iter().map(sales_row).collect();
    rows.sort_by_key(|r| r.invoice_number);

    let mut totals = SalesBookTotals::default();
    for r in &rows {
        totals.total += r.total;
        totals.exento += r.exento;
        totals.base_general += r.base_general;
        totals.iva_general += r.iva_general;
        totals.base_reducida += r.base_reducida;
        totals.iva_reducida += r.iva_reducida;
        totals.igtf += r.igtf;
    }

    SalesBook {
        company,
        period,
        rows,
        totals,
    }
}

fn join(fields: &[String]) -> String {
    let mut line = fields
        .iter()
        .map(|f| csv_field(f, SEP))
        .collect::<Vec<_>>()
        .join(&SEP.to_string());
    line.push_str(FISCAL_EOL);
    line
}

pub fn sales_book_csv(book: &SalesBook) -> String {
    let mut out = join(
        &[
            "Fecha", "RIF", "Razon Social", "Factura", "Control", "Total", "Exento",
            "Base General", "IVA General", "Base Reducida", "IVA Reducida", "IGTF", "Estado",
        ]
        .map(String::from),
    );

    for r in &book.rows {
        out.push_str(&join(&[
            r.date.format("%d/%m/%Y").to_string(),
            r.rif.clone(),
            r.name.clone(),
            r.invoice_number.to_string(),
            r.control_number.clone(),
            decimal_comma(r.total),
            decimal_comma(r.exento),
            decimal_comma(r.base_general),
            decimal_comma(r.iva_general),
            decimal_comma(r.base_reducida),
            decimal_comma(r.iva_reducida),
            decimal_comma(r.igtf),
            r.status.clone(),
        ]));
    }

    let t = &book.totals;
    out.push_str(&join(&[
        "TOTALES".into(),
        String::new(),
        String::new(),
        String::new(),
        String::new(),
        decimal_comma(t.total),
        decimal_comma(t.exento),
        decimal_comma(t.base_general),
        decimal_comma(t.iva_general),
        decimal_comma(t.base_reducida),
        decimal_comma(t.iva_reducida),
        decimal_comma(t.igtf),
        String::new(),
    ]));
    out
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PurchaseBookRow {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub rif: String,
    pub name: String,
    pub invoice_number: String,
    pub control_number: String,
    pub total: Decimal,
    pub exento: Decimal,
    pub base: Decimal,
    pub iva_rate: Decimal,
    pub iva: Decimal,
    pub iva_retained: Decimal,
    pub islr_retained: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct PurchaseBookTotals {
    pub total: Decimal,
    pub exento: Decimal,
    pub base: Decimal,
    pub iva: Decimal,
    pub iva_retained: Decimal,
    pub islr_retained: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PurchaseBook {
    pub company: BookCompany,
    pub period: String,
    pub rows: Vec<PurchaseBookRow>,
    pub totals: PurchaseBookTotals,
}

pub fn purchase_book(company: BookCompany, period: String, purchases: &[Purchase]) -> PurchaseBook {
    let mut rows: Vec<PurchaseBookRow> = purchases
        .iter()
        .map(|p| PurchaseBookRow {
            date: p.invoice_date,
            rif: p.supplier_rif.clone(),
            name: p.supplier_name.clone(),
            invoice_number: p.invoice_number.clone(),
            control_number: p.control_number.clone(),
            total: p.total,
            exento: p.exento,
            base: p.base,
            iva_rate: p.iva_rate,
            iva: p.iva,
            iva_retained: p.iva_retained,
            islr_retained: p.islr_retained,
        })
        .collect();
    rows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.invoice_number.cmp(&b.invoice_number)));

    let mut totals = PurchaseBookTotals::default();
    for r in &rows {
        totals.total += r.total;
        totals.exento += r.exento;
        totals.base += r.base;
        totals.iva += r.iva;
        totals.iva_retained += r.iva_retained;
        totals.islr_retained += r.islr_retained;
    }

    PurchaseBook {
        company,
        period,
        rows,
        totals,
    }
}

pub fn purchase_book_csv(book: &PurchaseBook) -> String {
    let mut out = join(
        &[
            "Fecha", "RIF", "Razon Social", "Factura", "Control", "Total", "Exento", "Base",
            "Alicuota", "IVA", "IVA Retenido", "ISLR Retenido",
        ]
        .map(String::from),
    );

    for r in &book.rows {
        out.push_str(&join(&[
            r.date.format("%d/%m/%Y").to_string(),
            r.rif.clone(),
            r.name.clone(),
            r.invoice_number.clone(),
            r.control_number.clone(),
            decimal_comma(r.total),
            decimal_comma(r.exento),
            decimal_comma(r.base),
            decimal_comma(r.iva_rate * Decimal::ONE_HUNDRED),
            decimal_comma(r.iva),
            decimal_comma(r.iva_retained),
            decimal_comma(r.islr_retained),
        ]));
    }

    let t = &book.totals;
    out.push_str(&join(&[
        "TOTALES".into(),
        String::new(),
        String::new(),
        String::new(),
        String::new(),
        decimal_comma(t.total),
        decimal_comma(t.exento),
        decimal_comma(t.base),
        String::new(),
        decimal_comma(t.iva),
        decimal_comma(t.iva_retained),
        decimal_comma(t.islr_retained),
    ]));
    out
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use rust_decimal_macros::dec;

    pub fn invoice(number: u64, status: &str) -> Invoice {
        Invoice {
            id: number,
            invoice_number: number,
            control_number: format!("00-{number:08}"),
            order_id: None,
            customer_rif: "J-30000000-1".into(),
            customer_name: "Distribuidora; El Sol".into(),
            invoice_date: NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
            payment_currency: "VES".into(),
            exchange_rate: dec!(1),
            exento: dec!(10),
            base_general: dec!(100),
            iva_general: dec!(16),
            base_reducida: dec!(0),
            iva_reducida: dec!(0),
            subtotal: dec!(110),
            iva: dec!(16),
            igtf: dec!(0),
            total: dec!(126),
            status: status.into(),
        }
    }

    pub fn company() -> BookCompany {
        BookCompany {
            rif: "J-12345678-9".into(),
            name: "Comercial Andina C.A.".into(),
        }
    }

    pub fn purchase(day: u32, invoice_number: &str) -> Purchase {
        Purchase {
            id: day as u64,
            supplier_rif: "J-30000000-1".into(),
            supplier_name: "Servicios Ávila".into(),
            invoice_number: invoice_number.into(),
            control_number: format!("00-{invoice_number}"),
            invoice_date: NaiveDate::from_ymd_opt(2026, 1, day).unwrap(),
            exento: dec!(0),
            base: dec!(1000),
            iva_rate: dec!(0.16),
            iva: dec!(160),
            total: dec!(1160),
            islr_concept: Some("053".into()),
            iva_retention_pct: dec!(0.75),
            iva_retained: dec!(120),
            islr_retained: dec!(20),
            retention_voucher: "20260100000001".into(),
            supplier_bank_code: None,
            supplier_account: None,
            paid: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{company, invoice, purchase};
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn void_invoices_are_zeroed_and_ordered() {
        let book = sales_book(
            company(),
            "202601".into(),
            &[invoice(3, "issued"), invoice(2, "void"), invoice(1, "issued")],
        );

        let numbers: Vec<u64> = book.rows.iter().map(|r| r.invoice_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(book.rows[1].status, "ANULADA");
        assert_eq!(book.rows[1].total, dec!(0));
        assert_eq!(book.totals.total, dec!(252));
        assert_eq!(book.totals.iva_general, dec!(32));
        assert_eq!(book.company.name, "Comercial Andina C.A.");
    }

    #[test]
    fn csv_uses_semicolons_and_decimal_commas() {
        let book = sales_book(company(), "202601".into(), &[invoice(1, "issued")]);
        let csv = sales_book_csv(&book);
        let lines: Vec<&str> = csv.split("\r\n").collect();

        assert!(lines[0].starts_with("Fecha;RIF;Razon Social;Factura"));
        assert_eq!(
            lines[1],
            "10/01/2026;J-30000000-1;\"Distribuidora; El Sol\";1;00-00000001;126,00;10,00;100,00;16,00;0,00;0,00;0,00;EMITIDA"
        );
        assert_eq!(lines[2], "TOTALES;;;;;126,00;10,00;100,00;16,00;0,00;0,00;0,00;");
    }

    #[test]
    fn purchase_book_carries_retentions() {
        let book = purchase_book(
            company(),
            "202601".into(),
            &[purchase(20, "B-2"), purchase(5, "A-1")],
        );
        assert_eq!(book.rows[0].invoice_number, "A-1");
        assert_eq!(book.totals.iva_retained, dec!(240));

        let csv = purchase_book_csv(&book);
        assert!(csv.contains(";16,00;160,00;120,00;20,00\r\n"));
        assert!(csv.ends_with("TOTALES;;;;;2320,00;0,00;2000,00;;320,00;240,00;40,00\r\n"));
    }
}
