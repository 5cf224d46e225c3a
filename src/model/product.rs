use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Unit {
    Und,
    Kg,
    Lt,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MoveKind {
    Entrada,
    Salida,
    Ajuste,
}

impl MoveKind {
    /// Signed quantity as stored; `ajuste` keeps the caller's sign.
    pub fn signed(self, quantity: Decimal) -> Decimal {
        match self {
            MoveKind::Entrada => quantity.abs(),
            MoveKind::Salida => -quantity.abs(),
            MoveKind::Ajuste => quantity,
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Product {
    pub id: u64,
    #[schema(example = "HAR-001")]
    pub sku: String,
    #[schema(example = "Harina de maíz 1kg")]
    pub name: String,
    #[schema(example = "und")]
    pub unit: String,
    pub price: Decimal,
    pub cost: Decimal,
    #[schema(example = "reducida")]
    pub tax_kind: String,
    pub min_stock: Decimal,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct InventoryMove {
    pub id: u64,
    pub product_id: u64,
    #[schema(example = "salida")]
    pub kind: String,
    pub quantity: Decimal,
    pub reference: Option<String>,
    #[schema(value_type = String, format = "date")]
    pub move_date: NaiveDate,
    pub created_by: Option<u64>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct StockLevel {
    pub product_id: u64,
    pub sku: String,
    pub name: String,
    pub stock: Decimal,
    pub min_stock: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn signs_follow_kind() {
        assert_eq!(MoveKind::Entrada.signed(dec!(-3)), dec!(3));
        assert_eq!(MoveKind::Salida.signed(dec!(3)), dec!(-3));
        assert_eq!(MoveKind::Ajuste.signed(dec!(-1.5)), dec!(-1.5));
    }
}
