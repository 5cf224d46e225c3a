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
pub enum EmployeeStatus {
    Active,
    Suspended,
    Terminated,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "employee_code": "EMP-001",
        "nationality": "V",
        "cedula": "12345678",
        "first_name": "María",
        "last_name": "Pérez",
        "email": "maria.perez@empresa.com.ve",
        "phone": "+584121234567",
        "hire_date": "2022-05-10",
        "termination_date": null,
        "status": "active",
        "islr_rate": "0.0200",
        "bank_code": "0102",
        "bank_account": "01020123450000012345"
    })
)]
pub struct Employee {
    pub id: u64,
    pub employee_code: String,
    /// `V` (venezolano) or `E` (extranjero)
    pub nationality: String,
    pub cedula: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[schema(nullable = true)]
    pub phone: Option<String>,
    #[schema(value_type = String, format = "date")]
    pub hire_date: NaiveDate,
    #[schema(value_type = Option<String>, format = "date")]
    pub termination_date: Option<NaiveDate>,
    pub status: String,
    /// ISLR withholding fraction from the employee's ARI form
    pub islr_rate: Decimal,
    pub bank_code: Option<String>,
    pub bank_account: Option<String>,
}
