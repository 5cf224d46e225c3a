use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use super::{DomainError, round2};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Currency {
    Ves,
    Usd,
    Eur,
}

impl Currency {
    pub fn is_local(&self) -> bool {
        matches!(self, Currency::Ves)
    }
}

/// Converts through bolívares. Rates are VES per one unit of the currency;
/// pass `Decimal::ONE` for VES.
pub fn convert(amount: Decimal, from_rate: Decimal, to_rate: Decimal) -> Result<Decimal, DomainError> {
    if from_rate <= Decimal::ZERO || to_rate <= Decimal::ZERO {
        return Err(DomainError::Invalid("exchange rate must be positive".into()));
    }
    Ok(round2(amount * from_rate / to_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn codes_round_trip_through_strum() {
        assert_eq!("USD".parse::<Currency>().unwrap(), Currency::Usd);
        assert_eq!(Currency::Ves.to_string(), "VES");
        assert!("usd".parse::<Currency>().is_err());
    }

    #[test]
    fn converts_via_bolivares() {
        // 100 USD at 36.50 -> 3650 VES
        assert_eq!(convert(dec!(100), dec!(36.50), Decimal::ONE).unwrap(), dec!(3650.00));
        // 3650 VES -> USD
        assert_eq!(convert(dec!(3650), Decimal::ONE, dec!(36.50)).unwrap(), dec!(100.00));
        // USD -> EUR cross rate
        assert_eq!(convert(dec!(100), dec!(36.50), dec!(40.00)).unwrap(), dec!(91.25));
    }

    #[test]
    fn rejects_zero_rate() {
        assert!(convert(dec!(1), Decimal::ZERO, Decimal::ONE).is_err());
    }
}
