use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{MySql, MySqlPool, QueryBuilder};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use super::{db_error, today};
use crate::auth::auth::AuthUser;
use crate::domain::currency::{Currency, convert};
use crate::error::AppError;
use crate::model::exchange_rate::ExchangeRate;
use crate::model::role::Role;
use crate::utils::db_utils::{Filters, SqlValue};
use crate::utils::pagination::Page;
use crate::utils::rate_cache;

#[derive(Deserialize, ToSchema)]
pub struct CreateExchangeRate {
    pub currency: Currency,
    #[schema(example = "2026-01-15", value_type = String, format = "date")]
    pub rate_date: NaiveDate,
    #[schema(example = "36.5000", value_type = String)]
    pub rate: Decimal,
    #[schema(example = "BCV")]
    pub source: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct RateQuery {
    pub currency: Option<Currency>,
    #[param(value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Deserialize, IntoParams)]
pub struct ConvertQuery {
    #[param(value_type = String, example = "100.00")]
    pub amount: Decimal,
    pub from: Currency,
    pub to: Currency,
    /// Defaults to today
    #[param(value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
}

#[derive(Serialize, ToSchema)]
pub struct Conversion {
    pub amount: Decimal,
    pub from: Currency,
    pub to: Currency,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    /// VES per unit of `from`
    pub from_rate: Decimal,
    /// VES per unit of `to`
    pub to_rate: Decimal,
    pub result: Decimal,
}

/// Register an official rate
#[utoipa::path(
    post,
    path = "/api/v1/exchange-rates",
    request_body = CreateExchangeRate,
    responses(
        (status = 201, description = "Rate stored", body = ExchangeRate),
        (status = 409, description = "A rate for that currency and date already exists"),
        (status = 422, description = "Non-positive rate or VES currency")
    ),
    security(("bearer_auth" = [])),
    tag = "Exchange rates"
)]
pub async fn create_rate(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateExchangeRate>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Finanzas])?;

    if payload.currency.is_local() {
        return Err(AppError::Validation("VES is the base currency and has no rate".into()));
    }
    if payload.rate <= Decimal::ZERO {
        return Err(AppError::Validation("Rate must be positive".into()));
    }
    let source = payload.source.clone().unwrap_or_else(|| "BCV".to_string());

    let result = sqlx::query(
        "INSERT INTO exchange_rates (currency, rate_date, rate, source) VALUES (?, ?, ?, ?)",
    )
    .bind(payload.currency.as_ref())
    .bind(payload.rate_date)
    .bind(payload.rate)
    .bind(&source)
    .execute(pool.get_ref())
    .await
    .map_err(|e| AppError::from_insert(e, "Rate already registered for that date"))?;

    rate_cache::invalidate(payload.currency).await;
    info!(currency = %payload.currency, rate = %payload.rate, date = %payload.rate_date, "Exchange rate stored");

    Ok(HttpResponse::Created().json(ExchangeRate {
        id: result.last_insert_id(),
        currency: payload.currency.to_string(),
        rate_date: payload.rate_date,
        rate: payload.rate,
        source,
    }))
}

/// List rates
#[utoipa::path(
    get,
    path = "/api/v1/exchange-rates",
    params(RateQuery),
    responses((status = 200, body = PaginatedExchangeRate)),
    security(("bearer_auth" = [])),
    tag = "Exchange rates"
)]
pub async fn list_rates(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<RateQuery>,
) -> Result<HttpResponse, AppError> {
    let page = Page::new(query.page, query.per_page);

    let mut filters = Filters::default();
    if let Some(currency) = query.currency {
        filters.add("currency = ?", vec![SqlValue::String(currency.to_string())]);
    }
    if let Some(from) = query.from {
        filters.add("rate_date >= ?", vec![SqlValue::Date(from)]);
    }
    if let Some(to) = query.to {
        filters.add("rate_date <= ?", vec![SqlValue::Date(to)]);
    }

    let mut count = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM exchange_rates");
    filters.write_where(&mut count);
    let total: i64 = count
        .build_query_scalar()
        .fetch_one(pool.get_ref())
        .await
        .map_err(db_error("count exchange rates"))?;

    let mut select =
        QueryBuilder::<MySql>::new("SELECT id, currency, rate_date, rate, source FROM exchange_rates");
    filters.write_where(&mut select);
    select
        .push(" ORDER BY rate_date DESC, currency LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());
    let data = select
        .build_query_as::<ExchangeRate>()
        .fetch_all(pool.get_ref())
        .await
        .map_err(db_error("list exchange rates"))?;

    Ok(HttpResponse::Ok().json(page.wrap(data, total)))
}

/// Latest rate on or before today
#[utoipa::path(
    get,
    path = "/api/v1/exchange-rates/latest/{currency}",
    params(("currency", description = "USD or EUR")),
    responses(
        (status = 200, body = ExchangeRate),
        (status = 404, description = "No rate registered yet")
    ),
    security(("bearer_auth" = [])),
    tag = "Exchange rates"
)]
pub async fn latest_rate(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let currency: Currency = super::requested(&path.into_inner().to_uppercase(), "currency")?;

    if currency.is_local() {
        return Ok(HttpResponse::Ok().json(json!({
            "currency": "VES", "rate_date": today(), "rate": Decimal::ONE, "source": "BASE"
        })));
    }

    let rate = rate_cache::latest_rate(pool.get_ref(), currency)
        .await
        .map_err(db_error("latest exchange rate"))?
        .ok_or_else(|| AppError::not_found(&format!("Exchange rate for {currency}")))?;

    Ok(HttpResponse::Ok().json(rate))
}

/// Convert an amount between currencies through VES
#[utoipa::path(
    get,
    path = "/api/v1/exchange-rates/convert",
    params(ConvertQuery),
    responses(
        (status = 200, body = Conversion),
        (status = 404, description = "Missing rate for one of the currencies")
    ),
    security(("bearer_auth" = [])),
    tag = "Exchange rates"
)]
pub async fn convert_amount(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ConvertQuery>,
) -> Result<HttpResponse, AppError> {
    let date = query.date.unwrap_or_else(today);

    let from_rate = rate_cache::ves_per_unit(pool.get_ref(), query.from, date)
        .await
        .map_err(db_error("conversion rate"))?
        .ok_or_else(|| AppError::not_found(&format!("Exchange rate for {} on {date}", query.from)))?;
    let to_rate = rate_cache::ves_per_unit(pool.get_ref(), query.to, date)
        .await
        .map_err(db_error("conversion rate"))?
        .ok_or_else(|| AppError::not_found(&format!("Exchange rate for {} on {date}", query.to)))?;

    let result = convert(query.amount, from_rate, to_rate)?;

    Ok(HttpResponse::Ok().json(Conversion {
        amount: query.amount,
        from: query.from,
        to: query.to,
        date,
        from_rate,
        to_rate,
        result,
    }))
}
