use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Executor, MySql, MySqlPool};
use tracing::{debug, info, instrument};
use utoipa::{IntoParams, ToSchema};

use super::{db_error, employee::fetch_employee, stored, today};
use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::domain::benefits::{
    AccrualEntry, AccrualInput, BenefitKind, LedgerTotals, UtilidadesLine, check_advance,
    quarterly_accrual, utilidades,
};
use crate::domain::service::last_day_of_month;
use crate::error::AppError;
use crate::model::benefit::BenefitEntry;
use crate::model::employee::EmployeeStatus;
use crate::model::role::Role;

#[derive(Deserialize, ToSchema)]
pub struct AccrueRequest {
    /// Last day of the quarter being credited
    #[schema(example = "2026-03-31", value_type = String, format = "date")]
    pub quarter_end: NaiveDate,
    /// BCV active rate as a fraction, e.g. 0.1556
    #[schema(example = "0.1556", value_type = String)]
    pub annual_interest_rate: Decimal,
}

#[derive(Serialize, ToSchema)]
pub struct AccruedEmployee {
    pub employee_id: u64,
    pub entries: Vec<AccrualEntry>,
}

#[derive(Serialize, ToSchema)]
pub struct SkippedEmployee {
    pub employee_id: u64,
    pub reason: String,
}

#[derive(Serialize, ToSchema)]
pub struct AccrualReport {
    #[schema(value_type = String, format = "date")]
    pub quarter_end: NaiveDate,
    pub accrued: Vec<AccruedEmployee>,
    pub skipped: Vec<SkippedEmployee>,
}

#[derive(Deserialize, ToSchema)]
pub struct AdvanceRequest {
    #[schema(example = "500.00", value_type = String)]
    pub amount: Decimal,
    #[schema(example = "Anticipo para vivienda")]
    pub note: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct BenefitStatement {
    pub employee_id: u64,
    pub entries: Vec<BenefitEntry>,
    pub totals: LedgerTotals,
    pub balance: Decimal,
    pub available_for_advance: Decimal,
}

#[derive(Deserialize, IntoParams)]
pub struct UtilidadesQuery {
    #[param(example = 2026)]
    pub year: i32,
}

#[derive(Serialize, ToSchema)]
pub struct UtilidadesRow {
    pub employee_id: u64,
    pub employee_code: String,
    pub employee_name: String,
    pub monthly_salary: Decimal,
    #[serde(flatten)]
    pub line: UtilidadesLine,
}

#[derive(sqlx::FromRow)]
struct ContractedEmployee {
    id: u64,
    employee_code: String,
    first_name: String,
    last_name: String,
    hire_date: NaiveDate,
    termination_date: Option<NaiveDate>,
    monthly_salary: Decimal,
}

/// Ledger sums per kind for one employee.
pub(crate) async fn ledger_totals<'e, E>(executor: E, employee_id: u64) -> Result<LedgerTotals, AppError>
where
    E: Executor<'e, Database = MySql>,
{
    let rows: Vec<(String, Decimal)> = sqlx::query_as(
        "SELECT kind, COALESCE(SUM(amount), 0) FROM benefit_entries WHERE employee_id = ? GROUP BY kind",
    )
    .bind(employee_id)
    .fetch_all(executor)
    .await
    .map_err(db_error("sum benefit ledger"))?;

    let mut totals = LedgerTotals::default();
    for (kind, amount) in rows {
        totals.add(stored::<BenefitKind>(&kind, "benefit_entries.kind")?, amount);
    }
    Ok(totals)
}

/// Credit the quarter's garantía, additional days and interest
#[utoipa::path(
    post,
    path = "/api/v1/benefits/accrue",
    request_body = AccrueRequest,
    responses(
        (status = 200, body = AccrualReport),
        (status = 422, description = "quarter_end is not a month end or rate is negative")
    ),
    tag = "Benefits",
    security(("bearer_auth" = []))
)]
#[instrument(skip_all, fields(user = %auth.username))]
pub async fn accrue(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<AccrueRequest>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Rrhh])?;
    let quarter_end = payload.quarter_end;

    if last_day_of_month(quarter_end) != quarter_end {
        return Err(AppError::Validation("quarter_end must be the last day of a month".into()));
    }

    let mut tx = pool.begin().await.map_err(db_error("begin accrual"))?;

    let employees = sqlx::query_as::<_, ContractedEmployee>(
        r#"
        SELECT e.id, e.employee_code, e.first_name, e.last_name, e.hire_date, e.termination_date,
               c.monthly_salary
        FROM employees e
        JOIN contracts c ON c.employee_id = e.id AND c.status = 'active'
        WHERE e.status = 'active' AND e.hire_date <= ?
        ORDER BY e.id
        FOR UPDATE
        "#,
    )
    .bind(quarter_end)
    .fetch_all(&mut *tx)
    .await
    .map_err(db_error("fetch employees for accrual"))?;

    let mut accrued = Vec::new();
    let mut skipped = Vec::new();

    for employee in employees {
        let (repeats,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM benefit_entries WHERE employee_id = ? AND kind = ? AND entry_date = ?",
        )
        .bind(employee.id)
        .bind(BenefitKind::Garantia.as_ref())
        .bind(quarter_end)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error("check previous accrual"))?;

        if repeats > 0 {
            skipped.push(SkippedEmployee {
                employee_id: employee.id,
                reason: "quarter already accrued".into(),
            });
            continue;
        }

        let balance = ledger_totals(&mut *tx, employee.id).await?.balance();
        let entries = quarterly_accrual(
            &AccrualInput {
                hire_date: employee.hire_date,
                monthly_salary: employee.monthly_salary,
                quarter_end,
                balance,
                annual_interest_rate: payload.annual_interest_rate,
            },
            &config.legal,
        )?;

        if entries.is_empty() {
            skipped.push(SkippedEmployee {
                employee_id: employee.id,
                reason: "less than three months of service".into(),
            });
            continue;
        }

        for entry in &entries {
            sqlx::query(
                r#"
                INSERT INTO benefit_entries (employee_id, entry_date, kind, days, daily_integral_salary, amount, note)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(employee.id)
            .bind(quarter_end)
            .bind(entry.kind.as_ref())
            .bind(entry.days)
            .bind(entry.daily_integral_salary)
            .bind(entry.amount)
            .bind(&entry.note)
            .execute(&mut *tx)
            .await
            .map_err(db_error("insert benefit entry"))?;
        }

        debug!(employee_id = employee.id, entries = entries.len(), "Benefits accrued");
        accrued.push(AccruedEmployee {
            employee_id: employee.id,
            entries,
        });
    }

    tx.commit().await.map_err(db_error("commit accrual"))?;

    info!(
        %quarter_end,
        accrued = accrued.len(),
        skipped = skipped.len(),
        "Quarterly benefit accrual posted"
    );

    Ok(HttpResponse::Ok().json(AccrualReport {
        quarter_end,
        accrued,
        skipped,
    }))
}

/// Advance against accrued prestaciones (max 75 %)
#[utoipa::path(
    post,
    path = "/api/v1/benefits/{employee_id}/advance",
    params(("employee_id", Path, description = "Employee ID")),
    request_body = AdvanceRequest,
    responses(
        (status = 201, body = BenefitEntry),
        (status = 404, description = "Not found"),
        (status = 422, description = "Advance exceeds the available amount")
    ),
    tag = "Benefits",
    security(("bearer_auth" = []))
)]
pub async fn advance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<AdvanceRequest>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Rrhh])?;
    let employee_id = path.into_inner();

    let employee = fetch_employee(pool.get_ref(), employee_id).await?;
    if employee.status == EmployeeStatus::Terminated.as_ref() {
        return Err(AppError::Validation("Employee is terminated".into()));
    }

    let mut tx = pool.begin().await.map_err(db_error("begin advance"))?;

    sqlx::query("SELECT id FROM employees WHERE id = ? FOR UPDATE")
        .bind(employee_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error("lock employee"))?;

    let totals = ledger_totals(&mut *tx, employee_id).await?;
    check_advance(&totals, payload.amount)?;

    let entry_date = today();
    let note = payload
        .note
        .clone()
        .unwrap_or_else(|| "Anticipo de prestaciones".to_string());

    let entry_id = sqlx::query(
        r#"
        INSERT INTO benefit_entries (employee_id, entry_date, kind, days, daily_integral_salary, amount, note)
        VALUES (?, ?, ?, 0, 0, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(entry_date)
    .bind(BenefitKind::Anticipo.as_ref())
    .bind(payload.amount)
    .bind(&note)
    .execute(&mut *tx)
    .await
    .map_err(db_error("insert advance"))?
    .last_insert_id();

    tx.commit().await.map_err(db_error("commit advance"))?;

    info!(employee_id, amount = %payload.amount, "Prestaciones advance posted");

    Ok(HttpResponse::Created().json(BenefitEntry {
        id: entry_id,
        employee_id,
        entry_date,
        kind: BenefitKind::Anticipo.to_string(),
        days: Decimal::ZERO,
        daily_integral_salary: Decimal::ZERO,
        amount: payload.amount,
        note: Some(note),
    }))
}

/// Ledger statement for one employee
#[utoipa::path(
    get,
    path = "/api/v1/benefits/{employee_id}",
    params(("employee_id", Path, description = "Employee ID")),
    responses((status = 200, body = BenefitStatement), (status = 404, description = "Not found")),
    tag = "Benefits",
    security(("bearer_auth" = []))
)]
pub async fn statement(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let employee_id = path.into_inner();
    if auth.employee_id != Some(employee_id) {
        auth.require_any(&[Role::Rrhh])?;
    }
    fetch_employee(pool.get_ref(), employee_id).await?;

    let entries = sqlx::query_as::<_, BenefitEntry>(
        r#"
        SELECT id, employee_id, entry_date, kind, days, daily_integral_salary, amount, note
        FROM benefit_entries
        WHERE employee_id = ?
        ORDER BY entry_date, id
        "#,
    )
    .bind(employee_id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(db_error("fetch benefit entries"))?;

    let mut totals = LedgerTotals::default();
    for entry in &entries {
        totals.add(stored(&entry.kind, "benefit_entries.kind")?, entry.amount);
    }

    Ok(HttpResponse::Ok().json(BenefitStatement {
        employee_id,
        balance: totals.balance(),
        available_for_advance: totals.available_for_advance(),
        entries,
        totals,
    }))
}

/// Utilidades preview for a fiscal year
#[utoipa::path(
    get,
    path = "/api/v1/benefits/utilidades",
    params(UtilidadesQuery),
    responses((status = 200, body = [UtilidadesRow])),
    tag = "Benefits",
    security(("bearer_auth" = []))
)]
pub async fn utilidades_preview(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<UtilidadesQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Rrhh, Role::Finanzas])?;
    let year = query.year;
    let year_end = NaiveDate::from_ymd_opt(year, 12, 31)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid year {year}")))?;

    let employees = sqlx::query_as::<_, ContractedEmployee>(
        r#"
        SELECT e.id, e.employee_code, e.first_name, e.last_name, e.hire_date, e.termination_date,
               c.monthly_salary
        FROM employees e
        JOIN contracts c ON c.employee_id = e.id AND c.status = 'active'
        WHERE e.status = 'active' AND e.hire_date <= ?
        ORDER BY e.employee_code
        "#,
    )
    .bind(year_end)
    .fetch_all(pool.get_ref())
    .await
    .map_err(db_error("fetch employees for utilidades"))?;

    let rows: Vec<UtilidadesRow> = employees
        .into_iter()
        .map(|e| UtilidadesRow {
            line: utilidades(e.monthly_salary, e.hire_date, e.termination_date, year, &config.legal),
            employee_id: e.id,
            employee_code: e.employee_code,
            employee_name: format!("{} {}", e.first_name, e.last_name),
            monthly_salary: e.monthly_salary,
        })
        .filter(|row| row.line.months_worked > 0)
        .collect();

    Ok(HttpResponse::Ok().json(rows))
}
