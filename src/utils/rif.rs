//! Venezuelan fiscal id (RIF) and cédula handling.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum RifError {
    #[error("RIF must look like J-12345678-9")]
    Format,
    #[error("unknown RIF type {0}")]
    Kind(char),
    #[error("RIF check digit does not match")]
    CheckDigit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rif {
    pub kind: char,
    pub number: u32,
    pub check: u8,
}

const WEIGHTS: [u32; 8] = [3, 2, 7, 6, 5, 4, 3, 2];

fn kind_value(kind: char) -> Option<u32> {
    match kind {
        'V' => Some(1),
        'E' => Some(2),
        'J' | 'C' => Some(3),
        'P' => Some(4),
        'G' => Some(5),
        _ => None,
    }
}

pub fn check_digit(kind: char, number: u32) -> Result<u8, RifError> {
    let kv = kind_value(kind).ok_or(RifError::Kind(kind))?;
    let digits = format!("{number:08}");
    let mut sum = kv * 4;
    for (digit, weight) in digits.chars().zip(WEIGHTS) {
        sum += digit.to_digit(10).ok_or(RifError::Format)? * weight;
    }
    let dv = 11 - (sum % 11);
    Ok(if dv >= 10 { 0 } else { dv as u8 })
}

impl FromStr for Rif {
    type Err = RifError;

    /// Accepts `J-12345678-9`, `J123456789` and lowercase variants.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let cleaned: String = raw
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != ' ')
            .collect::<String>()
            .to_ascii_uppercase();

        let mut chars = cleaned.chars();
        let kind = chars.next().ok_or(RifError::Format)?;
        let rest: String = chars.collect();
        if rest.len() < 2 || rest.len() > 9 || !rest.chars().all(|c| c.is_ascii_digit()) {
            return Err(RifError::Format);
        }

        let (number, check) = rest.split_at(rest.len() - 1);
        let number: u32 = number.parse().map_err(|_| RifError::Format)?;
        let check: u8 = check.parse().map_err(|_| RifError::Format)?;

        if check_digit(kind, number)? != check {
            return Err(RifError::CheckDigit);
        }

        Ok(Rif {
            kind,
            number,
            check,
        })
    }
}

impl fmt::Display for Rif {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:08}-{}", self.kind, self.number, self.check)
    }
}

/// Normalizes a RIF to `J-12345678-9`, validating the check digit.
pub fn normalize_rif(raw: &str) -> Result<String, RifError> {
    raw.parse::<Rif>().map(|r| r.to_string())
}

/// Compact form used in SENIAT files: `J123456789`.
pub fn compact(rif: &str) -> String {
    rif.chars().filter(|c| *c != '-').collect()
}

/// Cédula numbers are 6 to 9 digits.
pub fn is_valid_cedula(cedula: &str) -> bool {
    (6..=9).contains(&cedula.len()) && cedula.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_check_digit() {
        assert_eq!(check_digit('V', 12345678).unwrap(), 1);
        assert_eq!(check_digit('J', 30000000).unwrap(), 1);
        assert_eq!(check_digit('J', 0).unwrap(), 0);
    }

    #[test]
    fn parses_and_normalizes() {
        assert_eq!(normalize_rif("v123456781").unwrap(), "V-12345678-1");
        assert_eq!(normalize_rif(" J-30000000-1 ").unwrap(), "J-30000000-1");
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(normalize_rif("J-30000000-2"), Err(RifError::CheckDigit));
        assert_eq!(normalize_rif("X-30000000-1"), Err(RifError::Kind('X')));
        assert_eq!(normalize_rif("J-3000A000-1"), Err(RifError::Format));
        assert_eq!(normalize_rif(""), Err(RifError::Format));
    }

    #[test]
    fn compacts_for_seniat() {
        assert_eq!(compact("J-30000000-1"), "J300000001");
    }

    #[test]
    fn validates_cedula() {
        assert!(is_valid_cedula("12345678"));
        assert!(!is_valid_cedula("12345"));
        assert!(!is_valid_cedula("12A45678"));
    }
}
