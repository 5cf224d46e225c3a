use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

/// Bolívares per unit of `currency` on `rate_date`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct ExchangeRate {
    pub id: u64,
    #[schema(example = "USD")]
    pub currency: String,
    #[schema(value_type = String, format = "date")]
    pub rate_date: NaiveDate,
    #[schema(example = "36.5000")]
    pub rate: Decimal,
    #[schema(example = "BCV")]
    pub source: String,
}
