//! Banco de Venezuela (0102) payroll/supplier layout: one `H` header and
//! fixed-width `D` details, no trailer.

use super::{BankFileError, BankFileFormat, PaymentBatch, amount_field, crlf_lines, id_field, validate};
use crate::utils::rif::compact;
use crate::utils::text::{fold_upper, pad_right, pad_zeros};

const CODE: &str = "0102";

pub struct Bdv;

impl BankFileFormat for Bdv {
    fn bank_code(&self) -> &'static str {
        CODE
    }

    fn render(&self, batch: &PaymentBatch) -> Result<String, BankFileError> {
        validate(batch, CODE)?;

        let count = pad_zeros(&batch.payments.len().to_string(), 5)
            .ok_or_else(|| BankFileError::AmountOverflow("payment count".into()))?;
        let mut lines = Vec::with_capacity(batch.payments.len() + 1);
        lines.push(format!(
            "H{}{}{}{}{}{}",
            pad_right(&compact(&batch.company_rif), 10),
            batch.debit_account,
            batch.value_date.format("%d%m%Y"),
            count,
            amount_field(batch.total(), 15, "batch total")?,
            pad_right(&batch.reference, 20),
        ));

        for p in &batch.payments {
            lines.push(format!(
                "D{}{}{}{}",
                id_field(&p.beneficiary_id, 9)?,
                p.account,
                amount_field(p.amount, 15, &p.beneficiary_id)?,
                pad_right(&fold_upper(&p.name), 40),
            ));
        }

        Ok(crlf_lines(&lines))
    }

    fn file_name(&self, batch: &PaymentBatch) -> String {
        format!("BDV_{}_{}.txt", safe_reference(&batch.reference), batch.value_date.format("%Y%m%d"))
    }
}

/// Keeps only characters that are safe in a download file name.
pub(crate) fn safe_reference(reference: &str) -> String {
    reference
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::fixtures::batch;

    #[test]
    fn renders_header_and_details() {
        let out = Bdv.render(&batch(CODE)).unwrap();
        let lines: Vec<&str> = out.split("\r\n").collect();

        assert_eq!(lines.len(), 4); // header, two details, trailing empty
        assert_eq!(
            lines[0],
            format!(
                "HJ300000001{}15012026{}{}{:<20}",
                "01020000000000000001", "00002", "000000000173456", "NOM-7"
            )
        );
        assert_eq!(
            lines[1],
            format!(
                "DV012345678{}{}{:<40}",
                "01020000000000000002", "000000000123456", "MARIA PEREZ"
            )
        );
        assert_eq!(
            lines[2],
            format!(
                "DE008123456{}{}{:<40}",
                "01020000000000000003", "000000000050000", "JOSE NUNEZ"
            )
        );
        assert_eq!(lines[3], "");
        assert_eq!(lines[1].len(), 86);
    }

    #[test]
    fn names_file_after_reference_and_date() {
        assert_eq!(Bdv.file_name(&batch(CODE)), "BDV_NOM-7_20260115.txt");
    }

    #[test]
    fn refuses_foreign_accounts() {
        assert!(matches!(
            Bdv.render(&batch("0134")),
            Err(BankFileError::InvalidAccount { .. })
        ));
    }
}
