use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{MySql, MySqlPool, Transaction};
use tracing::info;
use utoipa::ToSchema;

use super::{db_error, employee::fetch_employee};
use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::model::contract::{Contract, ContractStatus, ContractType};
use crate::model::employee::EmployeeStatus;
use crate::model::role::Role;

const CONTRACT_COLUMNS: &str =
    "id, employee_id, contract_type, position, monthly_salary, start_date, end_date, status";

#[derive(Deserialize, ToSchema)]
pub struct CreateContract {
    pub contract_type: ContractType,
    #[schema(example = "Analista contable")]
    pub position: String,
    #[schema(example = "1500.00", value_type = String)]
    pub monthly_salary: Decimal,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(format = "date", value_type = Option<String>)]
    pub end_date: Option<NaiveDate>,
}

#[derive(Deserialize, ToSchema)]
pub struct EndContract {
    #[schema(example = "2026-06-30", format = "date", value_type = String)]
    pub end_date: NaiveDate,
}

async fn fetch_contract(pool: &MySqlPool, contract_id: u64) -> Result<Contract, AppError> {
    sqlx::query_as::<_, Contract>(&format!("SELECT {CONTRACT_COLUMNS} FROM contracts WHERE id = ?"))
        .bind(contract_id)
        .fetch_optional(pool)
        .await
        .map_err(db_error("fetch contract"))?
        .ok_or_else(|| AppError::not_found("Contract"))
}

/// Active contract of an employee, locked for the rest of the transaction.
pub(crate) async fn active_contract_for_update(
    tx: &mut Transaction<'_, MySql>,
    employee_id: u64,
) -> Result<Option<Contract>, AppError> {
    sqlx::query_as::<_, Contract>(&format!(
        "SELECT {CONTRACT_COLUMNS} FROM contracts WHERE employee_id = ? AND status = 'active' FOR UPDATE"
    ))
    .bind(employee_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(db_error("fetch active contract"))
}

pub(crate) async fn end_contract_tx(
    tx: &mut Transaction<'_, MySql>,
    contract_id: u64,
    end_date: NaiveDate,
) -> Result<(), AppError> {
    sqlx::query("UPDATE contracts SET status = ?, end_date = ? WHERE id = ?")
        .bind(ContractStatus::Ended.as_ref())
        .bind(end_date)
        .bind(contract_id)
        .execute(&mut **tx)
        .await
        .map_err(db_error("end contract"))?;
    Ok(())
}

/// Create a contract; the current active contract, if any, is closed the day before
#[utoipa::path(
    post,
    path = "/api/v1/employees/{employee_id}/contracts",
    params(("employee_id", Path, description = "Employee ID")),
    request_body = CreateContract,
    responses(
        (status = 201, body = Contract),
        (status = 404, description = "Employee not found"),
        (status = 422, description = "Invalid salary or dates")
    ),
    tag = "Contract",
    security(("bearer_auth" = []))
)]
pub async fn create_contract(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<CreateContract>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Rrhh])?;
    let employee_id = path.into_inner();

    if payload.monthly_salary <= Decimal::ZERO {
        return Err(AppError::Validation("monthly_salary must be positive".into()));
    }
    if payload.position.trim().is_empty() {
        return Err(AppError::BadRequest("position is required".into()));
    }
    if let Some(end) = payload.end_date {
        if end < payload.start_date {
            return Err(AppError::Validation("end_date precedes start_date".into()));
        }
    }

    let employee = fetch_employee(pool.get_ref(), employee_id).await?;
    if employee.status == EmployeeStatus::Terminated.as_ref() {
        return Err(AppError::Validation("Employee is terminated".into()));
    }
    if payload.start_date < employee.hire_date {
        return Err(AppError::Validation("Contract cannot start before the hire date".into()));
    }

    let mut tx = pool.begin().await.map_err(db_error("begin contract"))?;

    if let Some(previous) = active_contract_for_update(&mut tx, employee_id).await? {
        let end_date = payload
            .start_date
            .pred_opt()
            .ok_or_else(|| AppError::Validation("Invalid start_date".into()))?;
        if end_date < previous.start_date {
            return Err(AppError::Validation(
                "New contract must start after the current one".into(),
            ));
        }
        end_contract_tx(&mut tx, previous.id, end_date).await?;
        info!(employee_id, contract_id = previous.id, %end_date, "Previous contract ended");
    }

    let result = sqlx::query(
        r#"
        INSERT INTO contracts (employee_id, contract_type, position, monthly_salary, start_date, end_date, status)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(payload.contract_type.as_ref())
    .bind(payload.position.trim())
    .bind(payload.monthly_salary)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(ContractStatus::Active.as_ref())
    .execute(&mut *tx)
    .await
    .map_err(db_error("insert contract"))?;

    tx.commit().await.map_err(db_error("commit contract"))?;

    let contract_id = result.last_insert_id();
    info!(employee_id, contract_id, salary = %payload.monthly_salary, "Contract created");

    Ok(HttpResponse::Created().json(fetch_contract(pool.get_ref(), contract_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/employees/{employee_id}/contracts",
    params(("employee_id", Path, description = "Employee ID")),
    responses((status = 200, body = [Contract])),
    tag = "Contract",
    security(("bearer_auth" = []))
)]
pub async fn list_contracts(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let employee_id = path.into_inner();
    if auth.employee_id != Some(employee_id) {
        auth.require_any(&[Role::Rrhh, Role::Finanzas])?;
    }

    let contracts = sqlx::query_as::<_, Contract>(&format!(
        "SELECT {CONTRACT_COLUMNS} FROM contracts WHERE employee_id = ? ORDER BY start_date DESC"
    ))
    .bind(employee_id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(db_error("list contracts"))?;

    Ok(HttpResponse::Ok().json(contracts))
}

#[utoipa::path(
    get,
    path = "/api/v1/contracts/{contract_id}",
    params(("contract_id", Path, description = "Contract ID")),
    responses((status = 200, body = Contract), (status = 404, description = "Not found")),
    tag = "Contract",
    security(("bearer_auth" = []))
)]
pub async fn get_contract(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let contract = fetch_contract(pool.get_ref(), path.into_inner()).await?;
    if auth.employee_id != Some(contract.employee_id) {
        auth.require_any(&[Role::Rrhh, Role::Finanzas])?;
    }
    Ok(HttpResponse::Ok().json(contract))
}

#[utoipa::path(
    put,
    path = "/api/v1/contracts/{contract_id}/end",
    params(("contract_id", Path, description = "Contract ID")),
    request_body = EndContract,
    responses(
        (status = 200, body = Contract),
        (status = 409, description = "Contract already ended"),
        (status = 422, description = "End date before start date")
    ),
    tag = "Contract",
    security(("bearer_auth" = []))
)]
pub async fn end_contract(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<EndContract>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Rrhh])?;
    let contract_id = path.into_inner();

    let contract = fetch_contract(pool.get_ref(), contract_id).await?;
    if contract.status != ContractStatus::Active.as_ref() {
        return Err(AppError::Conflict("Contract is already ended".into()));
    }
    if payload.end_date < contract.start_date {
        return Err(AppError::Validation("end_date precedes start_date".into()));
    }

    let mut tx = pool.begin().await.map_err(db_error("begin end contract"))?;
    end_contract_tx(&mut tx, contract_id, payload.end_date).await?;
    tx.commit().await.map_err(db_error("commit end contract"))?;

    info!(contract_id, end_date = %payload.end_date, "Contract ended");
    Ok(HttpResponse::Ok().json(fetch_contract(pool.get_ref(), contract_id).await?))
}
