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
pub enum RunStatus {
    Draft,
    Approved,
    Paid,
}

impl RunStatus {
    /// The only forward move allowed from this status, if any.
    pub fn next(self) -> Option<RunStatus> {
        match self {
            RunStatus::Draft => Some(RunStatus::Approved),
            RunStatus::Approved => Some(RunStatus::Paid),
            RunStatus::Paid => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct PayrollRun {
    pub id: u64,
    #[schema(value_type = String, format = "date")]
    pub period_start: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub period_end: NaiveDate,
    #[schema(example = "quincenal")]
    pub frequency: String,
    #[schema(example = "draft")]
    pub status: String,
    pub total_gross: Decimal,
    pub total_deductions: Decimal,
    pub total_net: Decimal,
    pub total_employer: Decimal,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct PayrollItem {
    pub id: u64,
    pub run_id: u64,
    pub employee_id: u64,
    pub employee_code: String,
    pub employee_name: String,
    pub base_salary: Decimal,
    pub days: i32,
    pub earnings: Decimal,
    pub overtime: Decimal,
    pub bonuses: Decimal,
    pub absences: Decimal,
    pub gross: Decimal,
    pub sso: Decimal,
    pub rpe: Decimal,
    pub faov: Decimal,
    pub islr_rate: Decimal,
    pub islr: Decimal,
    pub total_deductions: Decimal,
    pub net: Decimal,
    pub employer_sso: Decimal,
    pub employer_rpe: Decimal,
    pub employer_faov: Decimal,
    pub employer_inces: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_moves_forward_only() {
        assert_eq!(RunStatus::Draft.next(), Some(RunStatus::Approved));
        assert_eq!(RunStatus::Approved.next(), Some(RunStatus::Paid));
        assert_eq!(RunStatus::Paid.next(), None);
        assert_eq!("approved".parse::<RunStatus>(), Ok(RunStatus::Approved));
    }
}
