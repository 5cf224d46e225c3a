//! Mercantil (0105) layout: semicolon-delimited records with a header row.

use super::bdv::safe_reference;
use super::{BankFileError, BankFileFormat, PaymentBatch, amount_field, crlf_lines, id_field, validate};
use crate::utils::rif::compact;
use crate::utils::text::fold_upper;

const CODE: &str = "0105";
const NAME_WIDTH: usize = 60;

pub struct Mercantil;

impl BankFileFormat for Mercantil {
    fn bank_code(&self) -> &'static str {
        CODE
    }

    fn render(&self, batch: &PaymentBatch) -> Result<String, BankFileError> {
        validate(batch, CODE)?;

        let mut lines = Vec::with_capacity(batch.payments.len() + 1);
        lines.push(
            [
                compact(&batch.company_rif),
                batch.debit_account.clone(),
                batch.value_date.format("%d/%m/%Y").to_string(),
                batch.payments.len().to_string(),
                amount_field(batch.total(), 15, "batch total")?,
            ]
            .join(";"),
        );

        for p in &batch.payments {
            let name: String = fold_upper(&p.name).chars().take(NAME_WIDTH).collect();
            lines.push(
                [
                    id_field(&p.beneficiary_id, 9)?,
                    name,
                    p.account.clone(),
                    amount_field(p.amount, 15, &p.beneficiary_id)?,
                ]
                .join(";"),
            );
        }

        Ok(crlf_lines(&lines))
    }

    fn file_name(&self, batch: &PaymentBatch) -> String {
        format!(
            "MERCANTIL_{}_{}.txt",
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
    fn renders_delimited_rows() {
        let out = Mercantil.render(&batch(CODE)).unwrap();
        assert_eq!(
            out,
            "J300000001;01050000000000000001;15/01/2026;2;000000000173456\r\n\
             V012345678;MARIA PEREZ;01050000000000000002;000000000123456\r\n\
             E008123456;JOSE NUNEZ;01050000000000000003;000000000050000\r\n"
        );
    }

    #[test]
    fn empty_batch_is_an_error() {
        let mut b = batch(CODE);
        b.payments.clear();
        assert_eq!(Mercantil.render(&b), Err(BankFileError::EmptyBatch));
    }
}
