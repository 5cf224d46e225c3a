use actix_web::{HttpResponse, web};
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{MySql, MySqlPool, QueryBuilder};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use super::db_error;
use crate::auth::auth::AuthUser;
use crate::bank::is_bank_account;
use crate::config::Config;
use crate::domain::retention::{ISLR_CONCEPTS, compute_purchase, retention_voucher};
use crate::error::{AppError, AppResult};
use crate::model::purchase::Purchase;
use crate::model::role::Role;
use crate::utils::db_utils::{Filters, SqlValue};
use crate::utils::pagination::Page;
use crate::utils::rif::normalize_rif;
use crate::utils::sequences;

pub(crate) const PURCHASE_COLUMNS: &str = "id, supplier_rif, supplier_name, invoice_number, control_number, \
     invoice_date, exento, base, iva_rate, iva, total, islr_concept, iva_retention_pct, iva_retained, \
     islr_retained, retention_voucher, supplier_bank_code, supplier_account, paid";

#[derive(Deserialize, ToSchema)]
pub struct CreatePurchase {
    #[schema(example = "J-40000000-2")]
    pub supplier_rif: String,
    #[schema(example = "Servicios Técnicos del Centro C.A.")]
    pub supplier_name: String,
    #[schema(example = "000123")]
    pub invoice_number: String,
    #[schema(example = "00-000456")]
    pub control_number: String,
    #[schema(example = "2026-01-20", value_type = String, format = "date")]
    pub invoice_date: NaiveDate,
    #[serde(default)]
    #[schema(example = "0", value_type = String)]
    pub exento: Decimal,
    #[schema(example = "1000.00", value_type = String)]
    pub base: Decimal,
    /// Defaults to the general IVA rate
    #[schema(value_type = Option<String>)]
    pub iva_rate: Option<Decimal>,
    /// Ordinary taxpayer issuing formal invoices (default); `false` means 100 % IVA retention
    pub formal: Option<bool>,
    /// ISLR concept code, e.g. 053
    pub islr_concept: Option<String>,
    pub supplier_bank_code: Option<String>,
    pub supplier_account: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct PurchaseQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    #[param(value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,
    pub paid: Option<bool>,
}

#[derive(Serialize, ToSchema)]
pub struct IslrConceptView {
    #[schema(example = "053")]
    pub code: String,
    pub description: String,
    pub rate: Decimal,
    pub sustraendo: Decimal,
}

pub(crate) async fn fetch_purchase(pool: &MySqlPool, purchase_id: u64) -> AppResult<Purchase> {
    sqlx::query_as::<_, Purchase>(&format!(
        "SELECT {PURCHASE_COLUMNS} FROM purchases WHERE id = ?"
    ))
    .bind(purchase_id)
    .fetch_optional(pool)
    .await
    .map_err(db_error("fetch purchase"))?
    .ok_or_else(|| AppError::not_found("Purchase"))
}

/// Register a supplier invoice and its retentions
#[utoipa::path(
    post,
    path = "/api/v1/purchases",
    request_body = CreatePurchase,
    responses(
        (status = 201, body = Purchase),
        (status = 409, description = "Invoice already registered for that supplier"),
        (status = 422, description = "Invalid RIF, amounts, ISLR concept or bank account")
    ),
    tag = "Purchases",
    security(("bearer_auth" = []))
)]
pub async fn create_purchase(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<CreatePurchase>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Finanzas])?;

    let supplier_rif = normalize_rif(&payload.supplier_rif)?;
    if payload.supplier_name.trim().is_empty()
        || payload.invoice_number.trim().is_empty()
        || payload.control_number.trim().is_empty()
    {
        return Err(AppError::BadRequest(
            "supplier_name, invoice_number and control_number are required".into(),
        ));
    }
    match (payload.supplier_bank_code.as_deref(), payload.supplier_account.as_deref()) {
        (None, None) => {}
        (Some(code), Some(account)) if is_bank_account(account, code) => {}
        _ => {
            return Err(AppError::Validation(
                "supplier_account must have 20 digits and start with supplier_bank_code".into(),
            ));
        }
    }

    let iva_rate = payload.iva_rate.unwrap_or(config.legal.iva_general_rate);
    let concept = payload
        .islr_concept
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    let retentions = compute_purchase(
        payload.exento,
        payload.base,
        iva_rate,
        payload.formal.unwrap_or(true),
        concept,
    )?;

    let mut tx = pool.begin().await.map_err(db_error("begin purchase"))?;

    let sequence = sequences::next_value(&mut tx, sequences::RETENTION_VOUCHER)
        .await
        .map_err(db_error("next retention voucher"))?;
    let voucher = retention_voucher(
        payload.invoice_date.year(),
        payload.invoice_date.month(),
        sequence,
    );

    let purchase_id = sqlx::query(
        r#"
        INSERT INTO purchases
        (supplier_rif, supplier_name, invoice_number, control_number, invoice_date, exento, base,
         iva_rate, iva, total, islr_concept, iva_retention_pct, iva_retained, islr_retained,
         retention_voucher, supplier_bank_code, supplier_account)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&supplier_rif)
    .bind(payload.supplier_name.trim())
    .bind(payload.invoice_number.trim())
    .bind(payload.control_number.trim())
    .bind(payload.invoice_date)
    .bind(payload.exento)
    .bind(payload.base)
    .bind(iva_rate)
    .bind(retentions.iva)
    .bind(retentions.total)
    .bind(concept)
    .bind(retentions.iva_retention_pct)
    .bind(retentions.iva_retained)
    .bind(retentions.islr_retained)
    .bind(&voucher)
    .bind(&payload.supplier_bank_code)
    .bind(&payload.supplier_account)
    .execute(&mut *tx)
    .await
    .map_err(|e| AppError::from_insert(e, "Invoice already registered for that supplier"))?
    .last_insert_id();

    tx.commit().await.map_err(db_error("commit purchase"))?;

    info!(
        purchase_id,
        %supplier_rif,
        %voucher,
        iva_retained = %retentions.iva_retained,
        islr_retained = %retentions.islr_retained,
        "Purchase registered"
    );

    Ok(HttpResponse::Created().json(fetch_purchase(pool.get_ref(), purchase_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/purchases/{purchase_id}",
    params(("purchase_id", Path, description = "Purchase ID")),
    responses((status = 200, body = Purchase), (status = 404, description = "Not found")),
    tag = "Purchases",
    security(("bearer_auth" = []))
)]
pub async fn get_purchase(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Finanzas])?;
    Ok(HttpResponse::Ok().json(fetch_purchase(pool.get_ref(), path.into_inner()).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/purchases",
    params(PurchaseQuery),
    responses((status = 200, body = PaginatedPurchase)),
    tag = "Purchases",
    security(("bearer_auth" = []))
)]
pub async fn list_purchases(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PurchaseQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Finanzas])?;
    let page = Page::new(query.page, query.per_page);

    let mut filters = Filters::default();
    if let Some(from) = query.from {
        filters.add("invoice_date >= ?", vec![SqlValue::Date(from)]);
    }
    if let Some(to) = query.to {
        filters.add("invoice_date <= ?", vec![SqlValue::Date(to)]);
    }
    if let Some(paid) = query.paid {
        filters.add("paid = ?", vec![SqlValue::Bool(paid)]);
    }

    let mut count = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM purchases");
    filters.write_where(&mut count);
    let total: i64 = count
        .build_query_scalar()
        .fetch_one(pool.get_ref())
        .await
        .map_err(db_error("count purchases"))?;

    let mut select = QueryBuilder::<MySql>::new(format!("SELECT {PURCHASE_COLUMNS} FROM purchases"));
    filters.write_where(&mut select);
    select
        .push(" ORDER BY invoice_date DESC, id DESC LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    let purchases = select
        .build_query_as::<Purchase>()
        .fetch_all(pool.get_ref())
        .await
        .map_err(db_error("list purchases"))?;

    Ok(HttpResponse::Ok().json(page.wrap(purchases, total)))
}

#[utoipa::path(
    put,
    path = "/api/v1/purchases/{purchase_id}/paid",
    params(("purchase_id", Path, description = "Purchase ID")),
    responses(
        (status = 200, body = Purchase),
        (status = 404, description = "Not found"),
        (status = 409, description = "Already paid")
    ),
    tag = "Purchases",
    security(("bearer_auth" = []))
)]
pub async fn mark_paid(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Finanzas])?;
    let purchase_id = path.into_inner();

    let result = sqlx::query("UPDATE purchases SET paid = 1 WHERE id = ? AND paid = 0")
        .bind(purchase_id)
        .execute(pool.get_ref())
        .await
        .map_err(db_error("mark purchase paid"))?;

    let purchase = fetch_purchase(pool.get_ref(), purchase_id).await?;
    if result.rows_affected() == 0 {
        return Err(AppError::Conflict("Purchase is already paid".into()));
    }

    info!(purchase_id, payable = %purchase.payable(), "Purchase marked paid");
    Ok(HttpResponse::Ok().json(purchase))
}

/// ISLR withholding concepts
#[utoipa::path(
    get,
    path = "/api/v1/purchases/islr-concepts",
    responses((status = 200, body = [IslrConceptView])),
    tag = "Purchases",
    security(("bearer_auth" = []))
)]
pub async fn islr_concepts(_auth: AuthUser) -> HttpResponse {
    let concepts: Vec<IslrConceptView> = ISLR_CONCEPTS
        .iter()
        .map(|c| IslrConceptView {
            code: c.code.to_string(),
            description: c.description.to_string(),
            rate: c.rate,
            sustraendo: c.sustraendo,
        })
        .collect();
    HttpResponse::Ok().json(concepts)
}
