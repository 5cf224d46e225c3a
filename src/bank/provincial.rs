//! BBVA Provincial (0108) layout: `01` header, `02` details, `03` trailer.

use super::bdv::safe_reference;
use super::{BankFileError, BankFileFormat, PaymentBatch, amount_field, crlf_lines, id_field, validate};
use crate::utils::rif::compact;
use crate::utils::text::{fold_upper, pad_right, pad_zeros};

const CODE: &str = "0108";

pub struct Provincial;

impl BankFileFormat for Provincial {
    fn bank_code(&self) -> &'static str {
        CODE
    }

    fn render(&self, batch: &PaymentBatch) -> Result<String, BankFileError> {
        validate(batch, CODE)?;

        let mut lines = Vec::with_capacity(batch.payments.len() + 2);
        lines.push(format!(
            "01{}{}{}{}",
            pad_right(&compact(&batch.company_rif), 10),
            batch.debit_account,
            batch.value_date.format("%Y%m%d"),
            pad_right(&batch.reference, 16),
        ));

        for p in &batch.payments {
            lines.push(format!(
                "02{}{}{}{}",
                id_field(&p.beneficiary_id, 9)?,
                p.account,
                amount_field(p.amount, 15, &p.beneficiary_id)?,
                pad_right(&fold_upper(&p.name), 35),
            ));
        }

        let count = pad_zeros(&batch.payments.len().to_string(), 8)
            .ok_or_else(|| BankFileError::AmountOverflow("record count".into()))?;
        lines.push(format!(
            "03{}{}",
            count,
            amount_field(batch.total(), 17, "batch total")?
        ));

        Ok(crlf_lines(&lines))
    }

    fn file_name(&self, batch: &PaymentBatch) -> String {
        format!(
            "PROVINCIAL_{}_{}.txt",
            safe_reference(&batch.reference),
            batch.value_date.format("%Y%m%d")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::fixtures::batch;

    #[test]
    fn renders_three_record_types() {
        let out = Provincial.render(&batch(CODE)).unwrap();
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(
            lines[0],
            format!("01J300000001{}20260115{:<16}", "01080000000000000001", "NOM-7")
        );
        assert_eq!(
            lines[2],
            format!(
                "02E008123456{}{}{:<35}",
                "01080000000000000003", "000000000050000", "JOSE NUNEZ"
            )
        );
        assert_eq!(lines[3], "030000000200000000000173456");
        assert_eq!(Provincial.file_name(&batch(CODE)), "PROVINCIAL_NOM-7_20260115.txt");
    }
}
