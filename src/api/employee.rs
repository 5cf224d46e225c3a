use crate::{
    api::db_error,
    auth::auth::AuthUser,
    bank::is_bank_account,
    error::AppError,
    model::{
        employee::{Employee, EmployeeStatus},
        role::Role,
    },
    utils::{
        db_utils::{ColumnKind, Filters, SqlUpdate, SqlValue, build_update_sql, execute_update},
        pagination::Page,
        rif::is_valid_cedula,
    },
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::{MySql, MySqlPool, QueryBuilder};
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

pub(crate) const EMPLOYEE_COLUMNS: &str = "id, employee_code, nationality, cedula, first_name, last_name, email, phone, \
     hire_date, termination_date, status, islr_rate, bank_code, bank_account";

const MAX_ISLR_RATE: Decimal = dec!(0.34);

/// Columns that may be cleared with `null`
const NULLABLE: &[&str] = &["phone", "bank_code", "bank_account"];

/// Columns a client may change through `PUT /employees/{id}`
const UPDATABLE: &[(&str, ColumnKind)] = &[
    ("employee_code", ColumnKind::Text),
    ("first_name", ColumnKind::Text),
    ("last_name", ColumnKind::Text),
    ("email", ColumnKind::Text),
    ("phone", ColumnKind::Text),
    ("status", ColumnKind::Text),
    ("islr_rate", ColumnKind::Money),
    ("bank_code", ColumnKind::Text),
    ("bank_account", ColumnKind::Text),
];

#[derive(Deserialize, ToSchema)]
pub struct CreateEmployee {
    #[schema(example = "EMP-001")]
    pub employee_code: String,
    #[schema(example = "V")]
    pub nationality: String,
    #[schema(example = "12345678")]
    pub cedula: String,
    #[schema(example = "María")]
    pub first_name: String,
    #[schema(example = "Pérez")]
    pub last_name: String,
    #[schema(example = "maria.perez@empresa.com.ve", format = "email")]
    pub email: String,
    pub phone: Option<String>,
    #[schema(example = "2024-01-08", format = "date", value_type = String)]
    pub hire_date: NaiveDate,
    #[serde(default)]
    #[schema(example = "0.02", value_type = String)]
    pub islr_rate: Decimal,
    #[schema(example = "0102")]
    pub bank_code: Option<String>,
    #[schema(example = "01020123450000012345")]
    pub bank_account: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct EmployeeQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// active, suspended or terminated
    pub status: Option<String>,
    /// Matches name, email, code or cédula
    pub search: Option<String>,
}

fn validate_islr_rate(rate: Decimal) -> Result<(), AppError> {
    if rate < Decimal::ZERO || rate > MAX_ISLR_RATE {
        return Err(AppError::Validation("islr_rate must be between 0 and 0.34".into()));
    }
    Ok(())
}

fn validate_bank(code: Option<&str>, account: Option<&str>) -> Result<(), AppError> {
    match (code, account) {
        (None, None) => Ok(()),
        (Some(code), Some(account)) if is_bank_account(account, code) => Ok(()),
        (Some(_), Some(_)) => Err(AppError::Validation(
            "bank_account must have 20 digits and start with bank_code".into(),
        )),
        _ => Err(AppError::Validation("bank_code and bank_account go together".into())),
    }
}

/// Validates a partial update against the stored record.
fn check_update(update: &SqlUpdate, current: &Employee) -> Result<(), AppError> {
    for (column, value) in update.columns.iter().zip(&update.values) {
        if *value == SqlValue::Null && !NULLABLE.contains(&column.as_str()) {
            return Err(AppError::BadRequest(format!("{column} cannot be null")));
        }
    }

    if let Some(SqlValue::Decimal(rate)) = update.value_of("islr_rate") {
        validate_islr_rate(*rate)?;
    }
    if let Some(SqlValue::String(status)) = update.value_of("status") {
        if current.status == EmployeeStatus::Terminated.as_ref() {
            return Err(AppError::Validation(
                "A terminated employee cannot change status".into(),
            ));
        }
        // terminated is only reachable through a settlement
        if status != "active" && status != "suspended" {
            return Err(AppError::Validation("status must be active or suspended".into()));
        }
    }

    if update.value_of("bank_code").is_some() || update.value_of("bank_account").is_some() {
        let text = |col: &str, fallback: &Option<String>| match update.value_of(col) {
            Some(SqlValue::String(v)) => Some(v.clone()),
            Some(_) => None,
            None => fallback.clone(),
        };
        let code = text("bank_code", &current.bank_code);
        let account = text("bank_account", &current.bank_account);
        validate_bank(code.as_deref(), account.as_deref())?;
    }
    Ok(())
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/v1/employees",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created", body = Employee),
        (status = 409, description = "Duplicate code or cédula"),
        (status = 422, description = "Invalid cédula, ISLR rate or bank account")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateEmployee>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Rrhh])?;

    let nationality = payload.nationality.trim().to_uppercase();
    if nationality != "V" && nationality != "E" {
        return Err(AppError::Validation("nationality must be V or E".into()));
    }
    if !is_valid_cedula(payload.cedula.trim()) {
        return Err(AppError::Validation("cedula must have 6 to 9 digits".into()));
    }
    if payload.first_name.trim().is_empty() || payload.last_name.trim().is_empty() {
        return Err(AppError::BadRequest("first_name and last_name are required".into()));
    }
    validate_islr_rate(payload.islr_rate)?;
    validate_bank(payload.bank_code.as_deref(), payload.bank_account.as_deref())?;

    let result = sqlx::query(
        r#"
        INSERT INTO employees
        (employee_code, nationality, cedula, first_name, last_name, email, phone, hire_date, islr_rate, bank_code, bank_account)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.employee_code.trim())
    .bind(&nationality)
    .bind(payload.cedula.trim())
    .bind(payload.first_name.trim())
    .bind(payload.last_name.trim())
    .bind(payload.email.trim())
    .bind(&payload.phone)
    .bind(payload.hire_date)
    .bind(payload.islr_rate)
    .bind(&payload.bank_code)
    .bind(&payload.bank_account)
    .execute(pool.get_ref())
    .await
    .map_err(|e| AppError::from_insert(e, "Employee code or cédula already registered"))?;

    let employee_id = result.last_insert_id();
    info!(employee_id, code = %payload.employee_code, "Employee created");

    let employee = fetch_employee(pool.get_ref(), employee_id).await?;
    Ok(HttpResponse::Created().json(employee))
}

pub(crate) async fn fetch_employee(pool: &MySqlPool, employee_id: u64) -> Result<Employee, AppError> {
    sqlx::query_as::<_, Employee>(&format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?"))
        .bind(employee_id)
        .fetch_optional(pool)
        .await
        .map_err(db_error("fetch employee"))?
        .ok_or_else(|| AppError::not_found("Employee"))
}

#[utoipa::path(
    get,
    path = "/api/v1/employees",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = PaginatedEmployee)
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Rrhh, Role::Finanzas])?;

    let page = Page::new(query.page, query.per_page);

    // ---------- build WHERE clause dynamically ----------
    let mut filters = Filters::default();
    if let Some(status) = &query.status {
        filters.add("status = ?", vec![SqlValue::String(status.clone())]);
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let like = SqlValue::String(format!("%{search}%"));
        filters.add(
            "(first_name LIKE ? OR last_name LIKE ? OR email LIKE ? OR employee_code LIKE ? OR cedula LIKE ?)",
            vec![like.clone(), like.clone(), like.clone(), like.clone(), like],
        );
    }

    // ---------- total count ----------
    let mut count = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM employees");
    filters.write_where(&mut count);
    debug!(sql = %count.sql(), "Counting employees");
    let total: i64 = count
        .build_query_scalar()
        .fetch_one(pool.get_ref())
        .await
        .map_err(db_error("count employees"))?;

    // ---------- data query ----------
    let mut select = QueryBuilder::<MySql>::new(format!("SELECT {EMPLOYEE_COLUMNS} FROM employees"));
    filters.write_where(&mut select);
    select
        .push(" ORDER BY last_name, first_name LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());
    debug!(sql = %select.sql(), page = page.page, per_page = page.per_page, "Fetching employees");

    let employees = select
        .build_query_as::<Employee>()
        .fetch_all(pool.get_ref())
        .await
        .map_err(db_error("list employees"))?;

    Ok(HttpResponse::Ok().json(page.wrap(employees, total)))
}

/// Update Employee (partial, whitelisted columns)
#[utoipa::path(
    put,
    path = "/api/v1/employees/{employee_id}",
    params(("employee_id", Path, description = "Employee ID")),
    request_body(content = Object, example = json!({"email": "nuevo@empresa.com.ve", "islr_rate": "0.03"})),
    responses(
        (status = 200, description = "Employee updated", body = Employee),
        (status = 400, description = "Unknown column, wrong type or null in a required column"),
        (status = 404, description = "Employee not found"),
        (status = 422, description = "Invalid ISLR rate, bank account or status change")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Rrhh])?;
    let employee_id = path.into_inner();

    let update = build_update_sql("employees", &body, UPDATABLE, employee_id)?;
    let current = fetch_employee(pool.get_ref(), employee_id).await?;
    check_update(&update, &current)?;

    debug!(sql = %update.sql, employee_id, "Updating employee");

    let mut tx = pool.begin().await.map_err(db_error("begin employee update"))?;
    execute_update(&mut tx, update)
        .await
        .map_err(|e| AppError::from_insert(e, "Employee code already in use"))?;
    tx.commit().await.map_err(db_error("commit employee update"))?;

    info!(employee_id, updated_by = auth.user_id, "Employee updated");
    let employee = fetch_employee(pool.get_ref(), employee_id).await?;
    Ok(HttpResponse::Ok().json(employee))
}

/// Delete Employee
#[utoipa::path(
    delete,
    path = "/api/v1/employees/{employee_id}",
    params(("employee_id", Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Employee has payroll history")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn delete_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Rrhh])?;
    let employee_id = path.into_inner();

    let mut tx = pool.begin().await.map_err(db_error("begin employee delete"))?;

    let (items,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM payroll_items WHERE employee_id = ?")
        .bind(employee_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error("count payroll items"))?;
    if items > 0 {
        return Err(AppError::Conflict(
            "Employee has payroll history and cannot be deleted".into(),
        ));
    }

    sqlx::query("DELETE FROM contracts WHERE employee_id = ?")
        .bind(employee_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error("delete contracts"))?;

    let res = sqlx::query("DELETE FROM employees WHERE id = ?")
        .bind(employee_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            // benefit entries or a settlement still point at the employee
            if crate::error::is_foreign_key(&e) {
                AppError::Conflict("Employee has benefit history and cannot be deleted".into())
            } else {
                db_error("delete employee")(e)
            }
        })?;

    if res.rows_affected() == 0 {
        return Err(AppError::not_found("Employee"));
    }
    tx.commit().await.map_err(db_error("commit employee delete"))?;

    info!(employee_id, deleted_by = auth.user_id, "Employee deleted");
    Ok(HttpResponse::Ok().json(json!({
        "message": "Successfully deleted"
    })))
}

/// Get Employee by ID. Plain employees may only read their own record.
#[utoipa::path(
    get,
    path = "/api/v1/employees/{employee_id}",
    params(("employee_id", Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        }))
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let employee_id = path.into_inner();
    if auth.employee_id != Some(employee_id) {
        auth.require_any(&[Role::Rrhh, Role::Finanzas])?;
    }

    let employee = fetch_employee(pool.get_ref(), employee_id).await?;
    Ok(HttpResponse::Ok().json(employee))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employee(status: EmployeeStatus) -> Employee {
        Employee {
            id: 3,
            employee_code: "EMP-003".into(),
            nationality: "V".into(),
            cedula: "12345678".into(),
            first_name: "Ana".into(),
            last_name: "Rojas".into(),
            email: "ana@empresa.com.ve".into(),
            phone: None,
            hire_date: NaiveDate::from_ymd_opt(2023, 3, 1).unwrap(),
            termination_date: None,
            status: status.to_string(),
            islr_rate: dec!(0.02),
            bank_code: Some("0102".into()),
            bank_account: Some("01020123450000012345".into()),
        }
    }

    fn update(body: Value) -> SqlUpdate {
        build_update_sql("employees", &body, UPDATABLE, 3).unwrap()
    }

    #[test]
    fn required_columns_cannot_be_nulled() {
        let current = employee(EmployeeStatus::Active);
        for column in ["islr_rate", "status", "first_name", "email"] {
            let mut body = serde_json::Map::new();
            body.insert(column.to_string(), Value::Null);
            let err = check_update(&update(Value::Object(body)), &current).unwrap_err();
            assert!(matches!(err, AppError::BadRequest(_)), "{column}");
        }
        assert!(check_update(&update(json!({"phone": null})), &current).is_ok());
        assert!(
            check_update(&update(json!({"bank_code": null, "bank_account": null})), &current).is_ok()
        );
    }

    #[test]
    fn terminated_employee_keeps_status() {
        let current = employee(EmployeeStatus::Terminated);
        let err = check_update(&update(json!({"status": "active"})), &current).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(check_update(&update(json!({"phone": "+584141112233"})), &current).is_ok());

        let active = employee(EmployeeStatus::Active);
        assert!(check_update(&update(json!({"status": "suspended"})), &active).is_ok());
        assert!(check_update(&update(json!({"status": "terminated"})), &active).is_err());
    }

    #[test]
    fn validates_rate_and_bank_pair() {
        let current = employee(EmployeeStatus::Active);
        assert!(check_update(&update(json!({"islr_rate": "0.5"})), &current).is_err());
        assert!(check_update(&update(json!({"islr_rate": "0.05"})), &current).is_ok());
        // account no longer matches the stored bank code
        assert!(
            check_update(&update(json!({"bank_account": "01340123450000012345"})), &current).is_err()
        );
        assert!(check_update(&update(json!({"bank_code": null})), &current).is_err());
    }
}
