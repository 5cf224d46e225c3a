use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

/// Persisted settlement ("liquidación").
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Termination {
    pub id: u64,
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub termination_date: NaiveDate,
    #[schema(example = "renuncia")]
    pub reason: String,
    pub years_of_service: i32,
    pub months_of_service: i32,
    pub daily_salary: Decimal,
    pub daily_integral_salary: Decimal,
    pub garantia: Decimal,
    pub retroactive: Decimal,
    #[schema(example = "garantia")]
    pub method: String,
    pub prestaciones: Decimal,
    pub intereses: Decimal,
    pub indemnizacion: Decimal,
    pub vacaciones: Decimal,
    pub bono_vacacional: Decimal,
    pub utilidades: Decimal,
    pub anticipos: Decimal,
    pub total: Decimal,
}
