use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{info, instrument};
use utoipa::ToSchema;

use super::benefit::ledger_totals;
use super::contract::{active_contract_for_update, end_contract_tx};
use super::db_error;
use super::employee::{EMPLOYEE_COLUMNS, fetch_employee};
use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::domain::severance::{Settlement, SettlementInput, TerminationReason, compute_settlement};
use crate::error::AppError;
use crate::model::employee::{Employee, EmployeeStatus};
use crate::model::role::Role;
use crate::model::termination::Termination;

const TERMINATION_COLUMNS: &str = "id, employee_id, termination_date, reason, years_of_service, \
     months_of_service, daily_salary, daily_integral_salary, garantia, retroactive, method, \
     prestaciones, intereses, indemnizacion, vacaciones, bono_vacacional, utilidades, anticipos, total";

#[derive(Deserialize, ToSchema)]
pub struct TerminationRequest {
    #[schema(example = 1)]
    pub employee_id: u64,
    #[schema(example = "2026-06-30", value_type = String, format = "date")]
    pub termination_date: NaiveDate,
    pub reason: TerminationReason,
}

#[derive(Serialize, ToSchema)]
pub struct SettlementPreview {
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub termination_date: NaiveDate,
    pub reason: TerminationReason,
    pub monthly_salary: Decimal,
    pub settlement: Settlement,
}

async fn active_salary(pool: &MySqlPool, employee_id: u64) -> Result<Decimal, AppError> {
    let row: Option<(Decimal,)> = sqlx::query_as(
        "SELECT monthly_salary FROM contracts WHERE employee_id = ? AND status = 'active'",
    )
    .bind(employee_id)
    .fetch_optional(pool)
    .await
    .map_err(db_error("fetch active salary"))?;

    row.map(|(salary,)| salary)
        .ok_or_else(|| AppError::Validation("Employee has no active contract".into()))
}

fn ensure_not_terminated(employee: &Employee) -> Result<(), AppError> {
    if employee.status == EmployeeStatus::Terminated.as_ref() {
        return Err(AppError::Conflict(format!(
            "Employee {} is already terminated",
            employee.employee_code
        )));
    }
    Ok(())
}

/// Compute a settlement without saving it
#[utoipa::path(
    post,
    path = "/api/v1/terminations/preview",
    request_body = TerminationRequest,
    responses(
        (status = 200, body = SettlementPreview),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Employee already terminated"),
        (status = 422, description = "No active contract or date before hire")
    ),
    tag = "Termination",
    security(("bearer_auth" = []))
)]
pub async fn preview(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<TerminationRequest>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Rrhh])?;

    let employee = fetch_employee(pool.get_ref(), payload.employee_id).await?;
    ensure_not_terminated(&employee)?;

    let monthly_salary = active_salary(pool.get_ref(), employee.id).await?;
    let ledger = ledger_totals(pool.get_ref(), employee.id).await?;

    let settlement = compute_settlement(
        &SettlementInput {
            hire_date: employee.hire_date,
            termination_date: payload.termination_date,
            monthly_salary,
            reason: payload.reason,
            ledger,
        },
        &config.legal,
    )?;

    Ok(HttpResponse::Ok().json(SettlementPreview {
        employee_id: employee.id,
        termination_date: payload.termination_date,
        reason: payload.reason,
        monthly_salary,
        settlement,
    }))
}

/// Terminate an employee and persist the settlement
#[utoipa::path(
    post,
    path = "/api/v1/terminations",
    request_body = TerminationRequest,
    responses(
        (status = 201, body = Termination),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Employee already terminated"),
        (status = 422, description = "No active contract or date before hire")
    ),
    tag = "Termination",
    security(("bearer_auth" = []))
)]
#[instrument(skip_all, fields(user = %auth.username, employee_id = payload.employee_id))]
pub async fn create_termination(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<TerminationRequest>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Rrhh])?;
    let employee_id = payload.employee_id;

    let mut tx = pool.begin().await.map_err(db_error("begin termination"))?;

    let employee = sqlx::query_as::<_, Employee>(&format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ? FOR UPDATE"
    ))
    .bind(employee_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(db_error("lock employee"))?
    .ok_or_else(|| AppError::not_found("Employee"))?;
    ensure_not_terminated(&employee)?;

    let contract = active_contract_for_update(&mut tx, employee_id)
        .await?
        .ok_or_else(|| AppError::Validation("Employee has no active contract".into()))?;
    if payload.termination_date < contract.start_date {
        return Err(AppError::Validation(
            "termination_date precedes the start of the active contract".into(),
        ));
    }

    let ledger = ledger_totals(&mut *tx, employee_id).await?;
    let settlement = compute_settlement(
        &SettlementInput {
            hire_date: employee.hire_date,
            termination_date: payload.termination_date,
            monthly_salary: contract.monthly_salary,
            reason: payload.reason,
            ledger,
        },
        &config.legal,
    )?;

    let termination_id = sqlx::query(
        r#"
        INSERT INTO terminations
        (employee_id, termination_date, reason, years_of_service, months_of_service, daily_salary,
         daily_integral_salary, garantia, retroactive, method, prestaciones, intereses, indemnizacion,
         vacaciones, bono_vacacional, utilidades, anticipos, total)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(payload.termination_date)
    .bind(payload.reason.as_ref())
    .bind(settlement.service.years)
    .bind(settlement.service.months)
    .bind(settlement.daily_salary)
    .bind(settlement.daily_integral_salary)
    .bind(settlement.garantia)
    .bind(settlement.retroactive)
    .bind(settlement.method.as_ref())
    .bind(settlement.prestaciones)
    .bind(settlement.intereses)
    .bind(settlement.indemnizacion)
    .bind(settlement.vacaciones)
    .bind(settlement.bono_vacacional)
    .bind(settlement.utilidades)
    .bind(settlement.anticipos)
    .bind(settlement.total)
    .execute(&mut *tx)
    .await
    .map_err(|e| AppError::from_insert(e, "Employee already has a settlement"))?
    .last_insert_id();

    sqlx::query("UPDATE employees SET status = ?, termination_date = ? WHERE id = ?")
        .bind(EmployeeStatus::Terminated.as_ref())
        .bind(payload.termination_date)
        .bind(employee_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error("terminate employee"))?;

    end_contract_tx(&mut tx, contract.id, payload.termination_date).await?;

    tx.commit().await.map_err(db_error("commit termination"))?;

    info!(
        termination_id,
        reason = %payload.reason,
        method = %settlement.method,
        total = %settlement.total,
        "Employee terminated"
    );

    let termination = fetch_termination(pool.get_ref(), termination_id).await?;
    Ok(HttpResponse::Created().json(termination))
}

async fn fetch_termination(pool: &MySqlPool, termination_id: u64) -> Result<Termination, AppError> {
    sqlx::query_as::<_, Termination>(&format!(
        "SELECT {TERMINATION_COLUMNS} FROM terminations WHERE id = ?"
    ))
    .bind(termination_id)
    .fetch_optional(pool)
    .await
    .map_err(db_error("fetch termination"))?
    .ok_or_else(|| AppError::not_found("Termination"))
}

#[utoipa::path(
    get,
    path = "/api/v1/terminations/{termination_id}",
    params(("termination_id", Path, description = "Termination ID")),
    responses((status = 200, body = Termination), (status = 404, description = "Not found")),
    tag = "Termination",
    security(("bearer_auth" = []))
)]
pub async fn get_termination(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let termination = fetch_termination(pool.get_ref(), path.into_inner()).await?;
    if auth.employee_id != Some(termination.employee_id) {
        auth.require_any(&[Role::Rrhh, Role::Finanzas])?;
    }
    Ok(HttpResponse::Ok().json(termination))
}
