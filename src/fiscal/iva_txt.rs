//! Fortnightly IVA withholding declaration (SENIAT TXT import).

use rust_decimal::Decimal;

use super::FISCAL_EOL;
use crate::model::purchase::Purchase;
use crate::utils::rif::compact;
use crate::utils::text::decimal_dot;

/// Operation type "C" (compra) and document type "01" (factura).
const OPERATION: &str = "C";
const DOCUMENT: &str = "01";

/// One tab-separated line per purchase with IVA withheld. The caller passes
/// only the purchases of the requested fortnight.
pub fn iva_retention_txt(agent_rif: &str, period: &str, purchases: &[Purchase]) -> String {
    let agent = compact(agent_rif);
    let mut out = String::new();

    for p in purchases.iter().filter(|p| p.iva_retained > Decimal::ZERO) {
        let fields = [
            agent.clone(),
            period.to_string(),
            p.invoice_date.format("%Y-%m-%d").to_string(),
            OPERATION.to_string(),
            DOCUMENT.to_string(),
            compact(&p.supplier_rif),
            p.invoice_number.clone(),
            p.control_number.clone(),
            decimal_dot(p.total),
            decimal_dot(p.base),
            decimal_dot(p.iva_retained),
            "0".to_string(),
            p.retention_voucher.clone(),
            decimal_dot(p.exento),
            decimal_dot(p.iva_rate * Decimal::ONE_HUNDRED),
            "0".to_string(),
        ];
        out.push_str(&fields.join("\t"));
        out.push_str(FISCAL_EOL);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fiscal::books::fixtures::purchase;
    use rust_decimal_macros::dec;

    #[test]
    fn writes_sixteen_tab_separated_fields() {
        let mut exempt = purchase(3, "X-9");
        exempt.iva_retained = dec!(0);

        let txt = iva_retention_txt("J-00000000-0", "202601", &[purchase(2, "A-1"), exempt]);
        let lines: Vec<&str> = txt.lines().collect();

        assert_eq!(lines.len(), 1);
        let fields: Vec<&str> = lines[0].split('\t').collect();
        assert_eq!(fields.len(), 16);
        assert_eq!(
            lines[0],
            "J000000000\t202601\t2026-01-02\tC\t01\tJ300000001\tA-1\t00-A-1\t1160.00\t1000.00\t120.00\t0\t20260100000001\t0.00\t16.00\t0"
        );
    }
}
