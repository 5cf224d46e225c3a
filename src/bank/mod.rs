//! Bulk transfer files for the Venezuelan banks we pay through.
//!
//! Every layout shares the same batch model and validation; the formatters
//! only decide how the lines look.

pub mod banesco;
pub mod bdv;
pub mod mercantil;
pub mod provincial;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::utils::rif::compact;
use crate::utils::text::{cents, pad_zeros};

pub const CRLF: &str = "\r\n";

#[derive(Debug, Error, PartialEq)]
pub enum BankFileError {
    #[error("payment batch is empty")]
    EmptyBatch,

    #[error("account {account} is not a 20-digit account of bank {bank}")]
    InvalidAccount { account: String, bank: String },

    #[error("invalid beneficiary id {0}")]
    InvalidBeneficiary(String),

    #[error("amount for {0} must be positive")]
    NonPositiveAmount(String),

    #[error("amount for {0} does not fit the file layout")]
    AmountOverflow(String),

    #[error("unsupported bank code {0}")]
    UnknownBank(String),
}

#[derive(Debug, Clone)]
pub struct Payment {
    /// `V12345678`, `E-8123456` or a RIF such as `J-30000000-1`
    pub beneficiary_id: String,
    pub name: String,
    pub account: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone)]
pub struct PaymentBatch {
    pub company_rif: String,
    pub debit_account: String,
    pub value_date: NaiveDate,
    pub reference: String,
    pub payments: Vec<Payment>,
}

impl PaymentBatch {
    pub fn total(&self) -> Decimal {
        self.payments.iter().map(|p| p.amount).sum()
    }
}

pub trait BankFileFormat: Send + Sync {
    /// Four-digit SUDEBAN code, which is also the account number prefix.
    fn bank_code(&self) -> &'static str;

    fn render(&self, batch: &PaymentBatch) -> Result<String, BankFileError>;

    fn file_name(&self, batch: &PaymentBatch) -> String;
}

pub fn format_for(bank_code: &str) -> Result<Box<dyn BankFileFormat>, BankFileError> {
    match bank_code {
        "0102" => Ok(Box::new(bdv::Bdv)),
        "0134" => Ok(Box::new(banesco::Banesco)),
        "0105" => Ok(Box::new(mercantil::Mercantil)),
        "0108" => Ok(Box::new(provincial::Provincial)),
        other => Err(BankFileError::UnknownBank(other.to_string())),
    }
}

pub fn is_bank_account(account: &str, bank_code: &str) -> bool {
    account.len() == 20 && account.chars().all(|c| c.is_ascii_digit()) && account.starts_with(bank_code)
}

/// Checks the parts every layout relies on before any line is written.
pub(crate) fn validate(batch: &PaymentBatch, bank_code: &str) -> Result<(), BankFileError> {
    if batch.payments.is_empty() {
        return Err(BankFileError::EmptyBatch);
    }
    if !is_bank_account(&batch.debit_account, bank_code) {
        return Err(BankFileError::InvalidAccount {
            account: batch.debit_account.clone(),
            bank: bank_code.to_string(),
        });
    }
    for p in &batch.payments {
        if !is_bank_account(&p.account, bank_code) {
            return Err(BankFileError::InvalidAccount {
                account: p.account.clone(),
                bank: bank_code.to_string(),
            });
        }
        if p.amount <= Decimal::ZERO {
            return Err(BankFileError::NonPositiveAmount(p.beneficiary_id.clone()));
        }
    }
    Ok(())
}

/// Zero-padded amount in cents, `width` digits wide.
pub(crate) fn amount_field(amount: Decimal, width: usize, who: &str) -> Result<String, BankFileError> {
    cents(amount)
        .and_then(|c| pad_zeros(&c.to_string(), width))
        .ok_or_else(|| BankFileError::AmountOverflow(who.to_string()))
}

/// `V12345678` -> `V000012345678` style: kind letter plus `digits` zero-padded digits.
pub(crate) fn id_field(raw: &str, digits: usize) -> Result<String, BankFileError> {
    let cleaned = compact(raw.trim()).replace(' ', "").to_ascii_uppercase();
    let mut chars = cleaned.chars();
    let kind = chars
        .next()
        .filter(|c| matches!(c, 'V' | 'E' | 'J' | 'P' | 'G'))
        .ok_or_else(|| BankFileError::InvalidBeneficiary(raw.to_string()))?;
    let number: String = chars.collect();
    if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
        return Err(BankFileError::InvalidBeneficiary(raw.to_string()));
    }
    let padded =
        pad_zeros(&number, digits).ok_or_else(|| BankFileError::InvalidBeneficiary(raw.to_string()))?;
    Ok(format!("{kind}{padded}"))
}

/// Joins lines with CRLF, including after the last one.
pub(crate) fn crlf_lines(lines: &[String]) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(line);
        out.push_str(CRLF);
    }
    out
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use rust_decimal_macros::dec;

    pub fn batch(bank: &str) -> PaymentBatch {
        PaymentBatch {
            company_rif: "J-30000000-1".into(),
            debit_account: format!("{bank}0000000000000001"),
            value_date: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            reference: "NOM-7".into(),
            payments: vec![
                Payment {
                    beneficiary_id: "V12345678".into(),
                    name: "María Pérez".into(),
                    account: format!("{bank}0000000000000002"),
                    amount: dec!(1234.56),
                },
                Payment {
                    beneficiary_id: "E-8123456".into(),
                    name: "José Núñez".into(),
                    account: format!("{bank}0000000000000003"),
                    amount: dec!(500),
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn resolves_supported_banks() {
        for code in ["0102", "0134", "0105", "0108"] {
            assert_eq!(format_for(code).map(|f| f.bank_code()).ok(), Some(code));
        }
        assert_eq!(
            format_for("0999").err(),
            Some(BankFileError::UnknownBank("0999".into()))
        );
    }

    #[test]
    fn rejects_bad_batches() {
        let mut batch = fixtures::batch("0102");
        assert_eq!(validate(&batch, "0102"), Ok(()));

        batch.payments[1].account = "01340000000000000003".into();
        assert!(matches!(
            validate(&batch, "0102"),
            Err(BankFileError::InvalidAccount { .. })
        ));

        let mut batch = fixtures::batch("0102");
        batch.payments[0].amount = dec!(0);
        assert_eq!(
            validate(&batch, "0102"),
            Err(BankFileError::NonPositiveAmount("V12345678".into()))
        );

        batch.payments.clear();
        assert_eq!(validate(&batch, "0102"), Err(BankFileError::EmptyBatch));
    }

    #[test]
    fn formats_fields() {
        assert_eq!(amount_field(dec!(1234.56), 10, "x").unwrap(), "0000123456");
        assert_eq!(
            amount_field(dec!(100000000), 10, "x"),
            Err(BankFileError::AmountOverflow("x".into()))
        );
        assert_eq!(id_field("V12345678", 9).unwrap(), "V012345678");
        assert_eq!(id_field("j-30000000-1", 9).unwrap(), "J300000001");
        assert!(id_field("X123", 9).is_err());
        assert_eq!(crlf_lines(&["A".into(), "B".into()]), "A\r\nB\r\n");
    }
}
