//! Banesco (0134) layout: `HDR` header, `DET` details and a `TOT` trailer
//! carrying the record count and the amount sum.

use super::bdv::safe_reference;
use super::{BankFileError, BankFileFormat, PaymentBatch, amount_field, crlf_lines, id_field, validate};
use crate::utils::rif::compact;
use crate::utils::text::{fold_upper, pad_right, pad_zeros};

const CODE: &str = "0134";

pub struct Banesco;

impl BankFileFormat for Banesco {
    fn bank_code(&self) -> &'static str {
        CODE
    }

    fn render(&self, batch: &PaymentBatch) -> Result<String, BankFileError> {
        validate(batch, CODE)?;

        let mut lines = Vec::with_capacity(batch.payments.len() + 2);
        lines.push(format!(
            "HDR{}{}{}{}",
            pad_right(&compact(&batch.company_rif), 10),
            pad_right(&batch.reference, 15),
            batch.value_date.format("%Y%m%d"),
            batch.debit_account,
        ));

        for (i, p) in batch.payments.iter().enumerate() {
            let seq = pad_zeros(&(i + 1).to_string(), 6)
                .ok_or_else(|| BankFileError::AmountOverflow("record count".into()))?;
            lines.push(format!(
                "DET{}{}{}{}{}",
                seq,
                id_field(&p.beneficiary_id, 9)?,
                pad_right(&fold_upper(&p.name), 30),
                p.account,
                amount_field(p.amount, 15, &p.beneficiary_id)?,
            ));
        }

        let count = pad_zeros(&batch.payments.len().to_string(), 6)
            .ok_or_else(|| BankFileError::AmountOverflow("record count".into()))?;
        lines.push(format!(
            "TOT{}{}",
            count,
            amount_field(batch.total(), 17, "batch total")?
        ));

        Ok(crlf_lines(&lines))
    }

    fn file_name(&self, batch: &PaymentBatch) -> String {
        format!(
            "BANESCO_{}_{}.txt",
            safe_reference(&batch.reference),
            batch.value_date.format("%Y%m%d")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::fixtures::batch;
    use rust_decimal_macros::dec;

    #[test]
    fn renders_with_trailer() {
        let out = Banesco.render(&batch(CODE)).unwrap();
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines[0],
            format!("HDRJ300000001{:<15}20260115{}", "NOM-7", "01340000000000000001")
        );
        assert_eq!(
            lines[1],
            format!(
                "DET000001V012345678{:<30}{}{}",
                "MARIA PEREZ", "01340000000000000002", "000000000123456"
            )
        );
        assert!(lines[2].starts_with("DET000002E008123456JOSE NUNEZ"));
        assert_eq!(lines[3], "TOT00000200000000000173456");
        assert!(out.ends_with("\r\n"));
    }

    #[test]
    fn rejects_amounts_that_do_not_fit() {
        let mut b = batch(CODE);
        b.payments[0].amount = dec!(99999999999999);
        assert_eq!(
            Banesco.render(&b),
            Err(BankFileError::AmountOverflow("V12345678".into()))
        );
    }
}
