use actix_web::{HttpResponse, http::header, web};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::IntoParams;

use super::db_error;
use super::invoice::INVOICE_COLUMNS;
use super::purchase::PURCHASE_COLUMNS;
use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::error::AppError;
use crate::fiscal::books::{
    BookCompany, BookFormat, purchase_book, purchase_book_csv, sales_book, sales_book_csv,
};
use crate::fiscal::faov::{FaovLine, faov_file};
use crate::fiscal::islr_xml::{IslrDetail, islr_xml};
use crate::fiscal::iva_txt::iva_retention_txt;
use crate::fiscal::{PeriodQuery, half_range};
use crate::model::invoice::Invoice;
use crate::model::purchase::Purchase;
use crate::model::role::Role;

#[derive(Deserialize, IntoParams)]
pub struct BookQuery {
    #[param(example = 2026)]
    pub year: i32,
    #[param(example = 1)]
    pub month: u32,
    /// json (default) or csv
    pub format: Option<BookFormat>,
}

#[derive(Deserialize, IntoParams)]
pub struct FortnightQuery {
    #[param(example = 2026)]
    pub year: i32,
    #[param(example = 1)]
    pub month: u32,
    /// 1 for days 1 to 15, 2 for the rest
    #[param(example = 1)]
    pub half: u8,
}

#[derive(sqlx::FromRow)]
struct PayrollWithholding {
    nationality: String,
    cedula: String,
    islr_rate: Decimal,
    gross: Decimal,
    paid_on: NaiveDate,
}

fn book_company(config: &Config) -> BookCompany {
    BookCompany {
        rif: config.company_rif.clone(),
        name: config.company_name.clone(),
    }
}

fn attachment(content_type: &str, file_name: &str, body: String) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(content_type)
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{file_name}\""),
        ))
        .body(body)
}

async fn purchases_between(
    pool: &MySqlPool,
    first: NaiveDate,
    last: NaiveDate,
    extra: &str,
) -> Result<Vec<Purchase>, AppError> {
    sqlx::query_as::<_, Purchase>(&format!(
        "SELECT {PURCHASE_COLUMNS} FROM purchases WHERE invoice_date BETWEEN ? AND ? {extra} \
         ORDER BY invoice_date, id"
    ))
    .bind(first)
    .bind(last)
    .fetch_all(pool)
    .await
    .map_err(db_error("fetch purchases for period"))
}

/// Libro de ventas
#[utoipa::path(
    get,
    path = "/api/v1/fiscal/sales-book",
    params(BookQuery),
    responses(
        (status = 200, description = "Sales book as JSON or CSV", body = SalesBook),
        (status = 422, description = "Invalid period")
    ),
    tag = "Fiscal",
    security(("bearer_auth" = []))
)]
pub async fn sales_book_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<BookQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Finanzas])?;
    let period = PeriodQuery { year: query.year, month: query.month };
    let (first, last) = period.range()?;

    let invoices = sqlx::query_as::<_, Invoice>(&format!(
        "SELECT {INVOICE_COLUMNS} FROM invoices WHERE invoice_date BETWEEN ? AND ? ORDER BY invoice_number"
    ))
    .bind(first)
    .bind(last)
    .fetch_all(pool.get_ref())
    .await
    .map_err(db_error("fetch invoices for sales book"))?;

    let book = sales_book(book_company(&config), period.label(), &invoices);
    info!(period = %book.period, rows = book.rows.len(), "Sales book generated");

    Ok(match query.format.unwrap_or_default() {
        BookFormat::Json => HttpResponse::Ok().json(book),
        BookFormat::Csv => attachment(
            "text/csv; charset=utf-8",
            &format!("libro_ventas_{}.csv", book.period),
            sales_book_csv(&book),
        ),
    })
}

/// Libro de compras
#[utoipa::path(
    get,
    path = "/api/v1/fiscal/purchase-book",
    params(BookQuery),
    responses(
        (status = 200, description = "Purchase book as JSON or CSV", body = PurchaseBook),
        (status = 422, description = "Invalid period")
    ),
    tag = "Fiscal",
    security(("bearer_auth" = []))
)]
pub async fn purchase_book_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<BookQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Finanzas])?;
    let period = PeriodQuery { year: query.year, month: query.month };
    let (first, last) = period.range()?;

    let purchases = purchases_between(pool.get_ref(), first, last, "").await?;
    let book = purchase_book(book_company(&config), period.label(), &purchases);
    info!(period = %book.period, rows = book.rows.len(), "Purchase book generated");

    Ok(match query.format.unwrap_or_default() {
        BookFormat::Json => HttpResponse::Ok().json(book),
        BookFormat::Csv => attachment(
            "text/csv; charset=utf-8",
            &format!("libro_compras_{}.csv", book.period),
            purchase_book_csv(&book),
        ),
    })
}

/// IVA withholding TXT for one fortnight
#[utoipa::path(
    get,
    path = "/api/v1/fiscal/iva-retentions",
    params(FortnightQuery),
    responses(
        (status = 200, description = "Tab-separated SENIAT import file", content_type = "text/plain", body = String),
        (status = 422, description = "Invalid period or fortnight")
    ),
    tag = "Fiscal",
    security(("bearer_auth" = []))
)]
pub async fn iva_retentions(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<FortnightQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Finanzas])?;
    let (first, last) = half_range(query.year, query.month, query.half)?;
    let period = PeriodQuery { year: query.year, month: query.month }.label();

    let purchases = purchases_between(pool.get_ref(), first, last, "AND iva_retained > 0").await?;
    let body = iva_retention_txt(&config.company_rif, &period, &purchases);
    info!(%period, half = query.half, lines = purchases.len(), "IVA withholding file generated");

    Ok(attachment(
        "text/plain; charset=utf-8",
        &format!("retenciones_iva_{period}_{}.txt", query.half),
        body,
    ))
}

/// Monthly ISLR withholding XML, suppliers and payroll
#[utoipa::path(
    get,
    path = "/api/v1/fiscal/islr-retentions",
    params(PeriodQuery),
    responses(
        (status = 200, description = "SENIAT XML relation", content_type = "application/xml", body = String),
        (status = 422, description = "Invalid period")
    ),
    tag = "Fiscal",
    security(("bearer_auth" = []))
)]
pub async fn islr_retentions(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<PeriodQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Finanzas])?;
    let (first, last) = query.range()?;

    let purchases = purchases_between(pool.get_ref(), first, last, "AND islr_retained > 0").await?;
    let mut details = Vec::with_capacity(purchases.len());
    for p in &purchases {
        details.extend(IslrDetail::purchase(p)?);
    }

    let payroll = sqlx::query_as::<_, PayrollWithholding>(
        r#"
        SELECT e.nationality, e.cedula, i.islr_rate, i.gross, r.period_end AS paid_on
        FROM payroll_items i
        JOIN payroll_runs r ON r.id = i.run_id
        JOIN employees e ON e.id = i.employee_id
        WHERE r.status <> 'draft' AND r.period_end BETWEEN ? AND ? AND i.islr > 0
        ORDER BY r.period_end, e.cedula
        "#,
    )
    .bind(first)
    .bind(last)
    .fetch_all(pool.get_ref())
    .await
    .map_err(db_error("fetch payroll withholdings"))?;

    details.extend(payroll.iter().map(|w| {
        IslrDetail::payroll(
            &format!("{}{}", w.nationality, w.cedula),
            w.paid_on,
            w.gross,
            w.islr_rate,
        )
    }));

    let period = query.label();
    let body = islr_xml(&config.company_rif, &period, &details);
    info!(
        %period,
        suppliers = purchases.len(),
        payroll_items = payroll.len(),
        "ISLR withholding XML generated"
    );

    Ok(attachment(
        "application/xml; charset=utf-8",
        &format!("retenciones_islr_{period}.xml"),
        body,
    ))
}

/// FAOV contribution file for BANAVIH
#[utoipa::path(
    get,
    path = "/api/v1/fiscal/faov",
    params(PeriodQuery),
    responses(
        (status = 200, description = "Comma-separated BANAVIH file", content_type = "text/plain", body = String),
        (status = 422, description = "Invalid period")
    ),
    tag = "Fiscal",
    security(("bearer_auth" = []))
)]
pub async fn faov(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PeriodQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Finanzas, Role::Rrhh])?;
    let (first, last) = query.range()?;

    let lines = sqlx::query_as::<_, FaovLine>(
        r#"
        SELECT e.nationality, e.cedula, e.first_name, e.last_name,
               SUM(i.gross) AS salary, e.hire_date, e.termination_date
        FROM payroll_items i
        JOIN payroll_runs r ON r.id = i.run_id
        JOIN employees e ON e.id = i.employee_id
        WHERE r.status <> 'draft' AND r.period_end BETWEEN ? AND ?
        GROUP BY e.id, e.nationality, e.cedula, e.first_name, e.last_name, e.hire_date, e.termination_date
        ORDER BY e.cedula
        "#,
    )
    .bind(first)
    .bind(last)
    .fetch_all(pool.get_ref())
    .await
    .map_err(db_error("fetch FAOV salaries"))?;

    let period = query.label();
    info!(%period, employees = lines.len(), "FAOV file generated");

    Ok(attachment(
        "text/plain; charset=utf-8",
        &format!("faov_{period}.txt"),
        faov_file(&lines),
    ))
}
