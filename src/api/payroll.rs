use std::collections::HashMap;

use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{MySql, MySqlPool, QueryBuilder};
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};

use super::{bank_file_response, db_error, stored, today};
use crate::auth::auth::AuthUser;
use crate::bank::{Payment, PaymentBatch, format_for};
use crate::config::Config;
use crate::domain::payroll::{
    PayFrequency, PayrollAdjustment, PayrollInput, PayrollLine, RunTotals, compute_line, totals,
};
use crate::error::AppError;
use crate::model::payroll::{PayrollItem, PayrollRun, RunStatus};
use crate::model::role::Role;
use crate::utils::db_utils::{Filters, SqlValue};
use crate::utils::pagination::Page;

const RUN_COLUMNS: &str = "id, period_start, period_end, frequency, status, \
     total_gross, total_deductions, total_net, total_employer";

const ITEM_SELECT: &str = r#"
    SELECT i.id, i.run_id, i.employee_id, e.employee_code,
           CONCAT(e.first_name, ' ', e.last_name) AS employee_name,
           i.base_salary, i.days, i.earnings, i.overtime, i.bonuses, i.absences, i.gross,
           i.sso, i.rpe, i.faov, i.islr_rate, i.islr, i.total_deductions, i.net,
           i.employer_sso, i.employer_rpe, i.employer_faov, i.employer_inces
    FROM payroll_items i
    JOIN employees e ON e.id = i.employee_id
"#;

#[derive(Deserialize, ToSchema)]
pub struct CreatePayrollRun {
    #[schema(example = "2026-01-01", value_type = String, format = "date")]
    pub period_start: NaiveDate,
    #[schema(example = "2026-01-15", value_type = String, format = "date")]
    pub period_end: NaiveDate,
    pub frequency: PayFrequency,
    #[serde(default)]
    pub adjustments: Vec<PayrollAdjustment>,
}

#[derive(Deserialize, IntoParams)]
pub struct RunQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// draft, approved or paid
    pub status: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct BankFileQuery {
    /// Four-digit bank code: 0102, 0134, 0105 or 0108
    #[param(example = "0102")]
    pub bank: String,
    /// Company account the batch is debited from
    #[param(example = "01020000000000000001")]
    pub debit_account: String,
}

#[derive(Serialize, ToSchema)]
pub struct PayrollRunDetail {
    #[serde(flatten)]
    pub run: PayrollRun,
    pub items: Vec<PayrollItem>,
}

#[derive(sqlx::FromRow)]
struct PayableEmployee {
    id: u64,
    employee_code: String,
    first_name: String,
    last_name: String,
    islr_rate: Decimal,
    monthly_salary: Decimal,
}

#[derive(sqlx::FromRow)]
struct PayeeRow {
    employee_id: u64,
    nationality: String,
    cedula: String,
    first_name: String,
    last_name: String,
    bank_code: Option<String>,
    bank_account: Option<String>,
    net: Decimal,
}

async fn fetch_run(pool: &MySqlPool, run_id: u64) -> Result<PayrollRun, AppError> {
    sqlx::query_as::<_, PayrollRun>(&format!("SELECT {RUN_COLUMNS} FROM payroll_runs WHERE id = ?"))
        .bind(run_id)
        .fetch_optional(pool)
        .await
        .map_err(db_error("fetch payroll run"))?
        .ok_or_else(|| AppError::not_found("Payroll run"))
}

/// Generate a payroll run
#[utoipa::path(
    post,
    path = "/api/v1/payroll/runs",
    request_body = CreatePayrollRun,
    responses(
        (status = 201, description = "Draft run with its items", body = PayrollRunDetail),
        (status = 409, description = "An approved or paid run overlaps the period"),
        (status = 422, description = "Invalid period, adjustment, or negative net pay")
    ),
    tag = "Payroll",
    security(("bearer_auth" = []))
)]
#[instrument(skip_all, fields(user = %auth.username))]
pub async fn create_run(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<CreatePayrollRun>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Rrhh])?;
    let payload = payload.into_inner();

    if payload.period_end < payload.period_start {
        return Err(AppError::Validation("period_end is before period_start".into()));
    }

    let mut adjustments: HashMap<u64, PayrollAdjustment> = HashMap::new();
    for adjustment in payload.adjustments {
        if adjustments.insert(adjustment.employee_id, adjustment.clone()).is_some() {
            return Err(AppError::Validation(format!(
                "Duplicate adjustment for employee {}",
                adjustment.employee_id
            )));
        }
    }

    let mut tx = pool.begin().await.map_err(db_error("begin payroll run"))?;

    let overlapping: Option<(u64,)> = sqlx::query_as(
        r#"
        SELECT id FROM payroll_runs
        WHERE status <> ? AND period_start <= ? AND period_end >= ?
        LIMIT 1
        FOR UPDATE
        "#,
    )
    .bind(RunStatus::Draft.as_ref())
    .bind(payload.period_end)
    .bind(payload.period_start)
    .fetch_optional(&mut *tx)
    .await
    .map_err(db_error("check overlapping runs"))?;

    if let Some((run_id,)) = overlapping {
        return Err(AppError::Conflict(format!(
            "Payroll run {run_id} already covers part of this period"
        )));
    }

    let employees = sqlx::query_as::<_, PayableEmployee>(
        r#"
        SELECT e.id, e.employee_code, e.first_name, e.last_name, e.islr_rate, c.monthly_salary
        FROM employees e
        JOIN contracts c ON c.employee_id = e.id AND c.status = 'active'
        WHERE e.status = 'active' AND c.start_date <= ?
        ORDER BY e.id
        "#,
    )
    .bind(payload.period_end)
    .fetch_all(&mut *tx)
    .await
    .map_err(db_error("fetch payable employees"))?;

    if employees.is_empty() {
        return Err(AppError::Validation(
            "No active employee has a contract for this period".into(),
        ));
    }
    if let Some(id) = adjustments
        .keys()
        .find(|id| !employees.iter().any(|e| e.id == **id))
    {
        return Err(AppError::Validation(format!(
            "Employee {id} is not part of this payroll run"
        )));
    }

    let mut lines: Vec<(u64, PayrollLine)> = Vec::with_capacity(employees.len());
    for employee in &employees {
        let label = format!(
            "{} ({} {})",
            employee.employee_code, employee.first_name, employee.last_name
        );
        let adjustment = adjustments.remove(&employee.id).unwrap_or_default();
        let line = compute_line(
            &PayrollInput {
                employee_label: &label,
                monthly_salary: employee.monthly_salary,
                islr_rate: employee.islr_rate,
                period_start: payload.period_start,
                period_end: payload.period_end,
                frequency: payload.frequency,
                bonus: adjustment.bonus,
                overtime_hours: adjustment.overtime_hours,
                absence_days: adjustment.absence_days,
            },
            &config.legal,
        )?;
        lines.push((employee.id, line));
    }

    let RunTotals {
        total_gross,
        total_deductions,
        total_net,
        total_employer,
    } = totals(lines.iter().map(|(_, line)| line));

    let run_id = sqlx::query(
        r#"
        INSERT INTO payroll_runs
        (period_start, period_end, frequency, status, total_gross, total_deductions, total_net, total_employer, created_by)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.period_start)
    .bind(payload.period_end)
    .bind(payload.frequency.as_ref())
    .bind(RunStatus::Draft.as_ref())
    .bind(total_gross)
    .bind(total_deductions)
    .bind(total_net)
    .bind(total_employer)
    .bind(auth.user_id)
    .execute(&mut *tx)
    .await
    .map_err(db_error("insert payroll run"))?
    .last_insert_id();

    let mut insert = QueryBuilder::<MySql>::new(
        "INSERT INTO payroll_items (run_id, employee_id, base_salary, days, earnings, overtime, \
         bonuses, absences, gross, sso, rpe, faov, islr_rate, islr, total_deductions, net, \
         employer_sso, employer_rpe, employer_faov, employer_inces) ",
    );
    insert.push_values(&lines, |mut row, (employee_id, line)| {
        row.push_bind(run_id)
            .push_bind(*employee_id)
            .push_bind(line.base_salary)
            .push_bind(line.days)
            .push_bind(line.earnings)
            .push_bind(line.overtime)
            .push_bind(line.bonuses)
            .push_bind(line.absences)
            .push_bind(line.gross)
            .push_bind(line.sso)
            .push_bind(line.rpe)
            .push_bind(line.faov)
            .push_bind(line.islr_rate)
            .push_bind(line.islr)
            .push_bind(line.total_deductions)
            .push_bind(line.net)
            .push_bind(line.employer_sso)
            .push_bind(line.employer_rpe)
            .push_bind(line.employer_faov)
            .push_bind(line.employer_inces);
    });
    insert
        .build()
        .execute(&mut *tx)
        .await
        .map_err(db_error("insert payroll items"))?;

    tx.commit().await.map_err(db_error("commit payroll run"))?;

    info!(
        run_id,
        employees = lines.len(),
        gross = %total_gross,
        net = %total_net,
        "Payroll run generated"
    );

    let detail = run_detail(pool.get_ref(), run_id).await?;
    Ok(HttpResponse::Created().json(detail))
}

async fn run_detail(pool: &MySqlPool, run_id: u64) -> Result<PayrollRunDetail, AppError> {
    let run = fetch_run(pool, run_id).await?;
    let items = sqlx::query_as::<_, PayrollItem>(&format!(
        "{ITEM_SELECT} WHERE i.run_id = ? ORDER BY e.employee_code"
    ))
    .bind(run_id)
    .fetch_all(pool)
    .await
    .map_err(db_error("fetch payroll items"))?;
    Ok(PayrollRunDetail { run, items })
}

/// List payroll runs
#[utoipa::path(
    get,
    path = "/api/v1/payroll/runs",
    params(RunQuery),
    responses((status = 200, body = PaginatedPayrollRun)),
    tag = "Payroll",
    security(("bearer_auth" = []))
)]
pub async fn list_runs(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<RunQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Rrhh, Role::Finanzas])?;
    let page = Page::new(query.page, query.per_page);

    let mut filters = Filters::default();
    if let Some(status) = &query.status {
        let status: RunStatus = super::requested(status, "status")?;
        filters.add("status = ?", vec![SqlValue::String(status.to_string())]);
    }

    let mut count = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM payroll_runs");
    filters.write_where(&mut count);
    let total: i64 = count
        .build_query_scalar()
        .fetch_one(pool.get_ref())
        .await
        .map_err(db_error("count payroll runs"))?;

    let mut select = QueryBuilder::<MySql>::new(format!("SELECT {RUN_COLUMNS} FROM payroll_runs"));
    filters.write_where(&mut select);
    select
        .push(" ORDER BY period_start DESC, id DESC LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    let runs = select
        .build_query_as::<PayrollRun>()
        .fetch_all(pool.get_ref())
        .await
        .map_err(db_error("list payroll runs"))?;

    Ok(HttpResponse::Ok().json(page.wrap(runs, total)))
}

/// Get a run with its items
#[utoipa::path(
    get,
    path = "/api/v1/payroll/runs/{run_id}",
    params(("run_id", Path, description = "Payroll run ID")),
    responses((status = 200, body = PayrollRunDetail), (status = 404, description = "Not found")),
    tag = "Payroll",
    security(("bearer_auth" = []))
)]
pub async fn get_run(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Rrhh, Role::Finanzas])?;
    let detail = run_detail(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(detail))
}

async fn advance_run(
    pool: &MySqlPool,
    run_id: u64,
    target: RunStatus,
) -> Result<PayrollRun, AppError> {
    let mut tx = pool.begin().await.map_err(db_error("begin run transition"))?;

    let (status,): (String,) = sqlx::query_as("SELECT status FROM payroll_runs WHERE id = ? FOR UPDATE")
        .bind(run_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("lock payroll run"))?
        .ok_or_else(|| AppError::not_found("Payroll run"))?;

    let current: RunStatus = stored(&status, "payroll_runs.status")?;
    if current.next() != Some(target) {
        return Err(AppError::Conflict(format!(
            "Payroll run is {current} and cannot move to {target}"
        )));
    }

    sqlx::query("UPDATE payroll_runs SET status = ? WHERE id = ?")
        .bind(target.as_ref())
        .bind(run_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error("update payroll run status"))?;

    tx.commit().await.map_err(db_error("commit run transition"))?;
    info!(run_id, from = %current, to = %target, "Payroll run status changed");

    fetch_run(pool, run_id).await
}

/// Approve a draft run
#[utoipa::path(
    put,
    path = "/api/v1/payroll/runs/{run_id}/approve",
    params(("run_id", Path, description = "Payroll run ID")),
    responses(
        (status = 200, body = PayrollRun),
        (status = 409, description = "Run is not a draft")
    ),
    tag = "Payroll",
    security(("bearer_auth" = []))
)]
pub async fn approve_run(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Rrhh])?;
    let run = advance_run(pool.get_ref(), path.into_inner(), RunStatus::Approved).await?;
    Ok(HttpResponse::Ok().json(run))
}

/// Mark an approved run as paid
#[utoipa::path(
    put,
    path = "/api/v1/payroll/runs/{run_id}/pay",
    params(("run_id", Path, description = "Payroll run ID")),
    responses(
        (status = 200, body = PayrollRun),
        (status = 409, description = "Run is not approved")
    ),
    tag = "Payroll",
    security(("bearer_auth" = []))
)]
pub async fn pay_run(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Finanzas])?;
    let run = advance_run(pool.get_ref(), path.into_inner(), RunStatus::Paid).await?;
    Ok(HttpResponse::Ok().json(run))
}

/// Delete a draft run
#[utoipa::path(
    delete,
    path = "/api/v1/payroll/runs/{run_id}",
    params(("run_id", Path, description = "Payroll run ID")),
    responses(
        (status = 200, description = "Run deleted"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Only drafts can be deleted")
    ),
    tag = "Payroll",
    security(("bearer_auth" = []))
)]
pub async fn delete_run(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Rrhh])?;
    let run_id = path.into_inner();

    let result = sqlx::query("DELETE FROM payroll_runs WHERE id = ? AND status = ?")
        .bind(run_id)
        .bind(RunStatus::Draft.as_ref())
        .execute(pool.get_ref())
        .await
        .map_err(db_error("delete payroll run"))?;

    if result.rows_affected() == 0 {
        let run = fetch_run(pool.get_ref(), run_id).await?;
        return Err(AppError::Conflict(format!(
            "Payroll run is {} and cannot be deleted",
            run.status
        )));
    }

    info!(run_id, "Draft payroll run deleted");
    Ok(HttpResponse::Ok().json(json!({ "message": "Payroll run deleted" })))
}

/// Bank transfer file for the run's net pay
#[utoipa::path(
    get,
    path = "/api/v1/payroll/runs/{run_id}/bank-file",
    params(("run_id", Path, description = "Payroll run ID"), BankFileQuery),
    responses(
        (status = 200, description = "Bank file; skipped employee ids in X-Skipped-Employees", content_type = "text/plain", body = String),
        (status = 400, description = "Unknown bank"),
        (status = 409, description = "Run is still a draft"),
        (status = 422, description = "Nothing to pay or invalid debit account")
    ),
    tag = "Payroll",
    security(("bearer_auth" = []))
)]
pub async fn bank_file(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    query: web::Query<BankFileQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Finanzas])?;
    let run_id = path.into_inner();
    let format = format_for(query.bank.trim())?;

    let run = fetch_run(pool.get_ref(), run_id).await?;
    if stored::<RunStatus>(&run.status, "payroll_runs.status")? == RunStatus::Draft {
        return Err(AppError::Conflict("Approve the payroll run before paying it".into()));
    }

    let payees = sqlx::query_as::<_, PayeeRow>(
        r#"
        SELECT i.employee_id, e.nationality, e.cedula, e.first_name, e.last_name,
               e.bank_code, e.bank_account, i.net
        FROM payroll_items i
        JOIN employees e ON e.id = i.employee_id
        WHERE i.run_id = ?
        ORDER BY e.employee_code
        "#,
    )
    .bind(run_id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(db_error("fetch payroll payees"))?;

    let mut payments = Vec::with_capacity(payees.len());
    let mut skipped = Vec::new();
    for payee in payees {
        match payee.bank_account {
            Some(account)
                if payee.bank_code.as_deref() == Some(format.bank_code())
                    && payee.net > Decimal::ZERO =>
            {
                payments.push(Payment {
                    beneficiary_id: format!("{}{}", payee.nationality, payee.cedula),
                    name: format!("{} {}", payee.first_name, payee.last_name),
                    account,
                    amount: payee.net,
                });
            }
            _ => skipped.push(payee.employee_id),
        }
    }

    let batch = PaymentBatch {
        company_rif: config.company_rif.clone(),
        debit_account: query.debit_account.trim().to_string(),
        value_date: today(),
        reference: format!("NOM-{run_id}"),
        payments,
    };
    let content = format.render(&batch)?;
    let file_name = format.file_name(&batch);

    if !skipped.is_empty() {
        warn!(run_id, bank = format.bank_code(), skipped = ?skipped, "Employees left out of bank file");
    }
    info!(
        run_id,
        bank = format.bank_code(),
        payments = batch.payments.len(),
        total = %batch.total(),
        "Payroll bank file generated"
    );

    Ok(bank_file_response(&file_name, content, "X-Skipped-Employees", &skipped))
}
