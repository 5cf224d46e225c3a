use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct BenefitEntry {
    pub id: u64,
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub entry_date: NaiveDate,
    #[schema(example = "garantia")]
    pub kind: String,
    pub days: Decimal,
    pub daily_integral_salary: Decimal,
    pub amount: Decimal,
    pub note: Option<String>,
}
