use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TxKind {
    Deposito,
    Retiro,
    TransferenciaEntrada,
    TransferenciaSalida,
}

impl TxKind {
    pub fn is_inflow(self) -> bool {
        matches!(self, TxKind::Deposito | TxKind::TransferenciaEntrada)
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct BankAccount {
    pub id: u64,
    #[schema(example = "0134")]
    pub bank_code: String,
    #[schema(example = "Banesco")]
    pub bank_name: String,
    #[schema(example = "01340000000000000001")]
    pub account_number: String,
    #[schema(example = "VES")]
    pub currency: String,
    pub holder: String,
    pub opening_balance: Decimal,
    /// Opening balance plus inflows minus outflows
    pub balance: Decimal,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct BankTransaction {
    pub id: u64,
    pub account_id: u64,
    #[schema(value_type = String, format = "date")]
    pub tx_date: NaiveDate,
    #[schema(example = "deposito")]
    pub kind: String,
    pub amount: Decimal,
    pub reference: Option<String>,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_direction() {
        assert!(TxKind::Deposito.is_inflow());
        assert!(TxKind::TransferenciaEntrada.is_inflow());
        assert!(!TxKind::Retiro.is_inflow());
        assert_eq!(TxKind::TransferenciaSalida.to_string(), "transferencia_salida");
    }
}
