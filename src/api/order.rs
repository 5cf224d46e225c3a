use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{MySql, MySqlPool, QueryBuilder};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use super::{db_error, requested, stored, today};
use crate::auth::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::model::order::{Order, OrderLine, OrderStatus, OrderWithLines};
use crate::model::role::Role;
use crate::utils::db_utils::{Filters, SqlValue};
use crate::utils::pagination::Page;
use crate::utils::rif::normalize_rif;

const ORDER_COLUMNS: &str = "id, customer_rif, customer_name, order_date, status";

#[derive(Deserialize, ToSchema)]
pub struct OrderLineInput {
    #[schema(example = 1)]
    pub product_id: u64,
    #[schema(example = "2", value_type = String)]
    pub quantity: Decimal,
    /// Defaults to the product's list price
    #[schema(value_type = Option<String>)]
    pub unit_price: Option<Decimal>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateOrder {
    #[schema(example = "J-30000000-1")]
    pub customer_rif: String,
    #[schema(example = "Comercial Los Andes C.A.")]
    pub customer_name: String,
    /// Defaults to today
    #[schema(value_type = Option<String>, format = "date")]
    pub order_date: Option<NaiveDate>,
    pub lines: Vec<OrderLineInput>,
}

#[derive(Deserialize, IntoParams)]
pub struct OrderQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// draft, confirmed, invoiced or cancelled
    pub status: Option<String>,
    pub customer_rif: Option<String>,
}

pub(crate) async fn fetch_order(pool: &MySqlPool, order_id: u64) -> AppResult<OrderWithLines> {
    let order = sqlx::query_as::<_, Order>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?"))
        .bind(order_id)
        .fetch_optional(pool)
        .await
        .map_err(db_error("fetch order"))?
        .ok_or_else(|| AppError::not_found("Order"))?;

    let lines = sqlx::query_as::<_, OrderLine>(
        "SELECT id, order_id, product_id, quantity, unit_price FROM order_lines WHERE order_id = ? ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await
    .map_err(db_error("fetch order lines"))?;

    Ok(OrderWithLines { order, lines })
}

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrder,
    responses(
        (status = 201, body = OrderWithLines),
        (status = 404, description = "Unknown product"),
        (status = 422, description = "Invalid RIF, no lines or non-positive quantity")
    ),
    tag = "Sales",
    security(("bearer_auth" = []))
)]
pub async fn create_order(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateOrder>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Ventas])?;

    let customer_rif = normalize_rif(&payload.customer_rif)?;
    if payload.customer_name.trim().is_empty() {
        return Err(AppError::BadRequest("customer_name is required".into()));
    }
    if payload.lines.is_empty() {
        return Err(AppError::Validation("Order needs at least one line".into()));
    }
    if payload.lines.iter().any(|l| l.quantity <= Decimal::ZERO) {
        return Err(AppError::Validation("Line quantity must be positive".into()));
    }
    if payload
        .lines
        .iter()
        .any(|l| l.unit_price.is_some_and(|p| p < Decimal::ZERO))
    {
        return Err(AppError::Validation("Unit price must not be negative".into()));
    }

    let order_date = payload.order_date.unwrap_or_else(today);
    let mut tx = pool.begin().await.map_err(db_error("begin order"))?;

    let order_id = sqlx::query(
        "INSERT INTO orders (customer_rif, customer_name, order_date, status) VALUES (?, ?, ?, ?)",
    )
    .bind(&customer_rif)
    .bind(payload.customer_name.trim())
    .bind(order_date)
    .bind(OrderStatus::Draft.as_ref())
    .execute(&mut *tx)
    .await
    .map_err(db_error("insert order"))?
    .last_insert_id();

    for line in &payload.lines {
        let unit_price = match line.unit_price {
            Some(price) => price,
            None => {
                let row: Option<(Decimal,)> =
                    sqlx::query_as("SELECT price FROM products WHERE id = ? AND active = 1")
                        .bind(line.product_id)
                        .fetch_optional(&mut *tx)
                        .await
                        .map_err(db_error("fetch product price"))?;
                row.map(|(price,)| price)
                    .ok_or_else(|| AppError::not_found(&format!("Product {}", line.product_id)))?
            }
        };

        sqlx::query(
            "INSERT INTO order_lines (order_id, product_id, quantity, unit_price) VALUES (?, ?, ?, ?)",
        )
        .bind(order_id)
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(unit_price)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if crate::error::is_foreign_key(&e) {
                AppError::not_found(&format!("Product {}", line.product_id))
            } else {
                db_error("insert order line")(e)
            }
        })?;
    }

    tx.commit().await.map_err(db_error("commit order"))?;

    info!(order_id, %customer_rif, lines = payload.lines.len(), "Order created");
    Ok(HttpResponse::Created().json(fetch_order(pool.get_ref(), order_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{order_id}",
    params(("order_id", Path, description = "Order ID")),
    responses((status = 200, body = OrderWithLines), (status = 404, description = "Not found")),
    tag = "Sales",
    security(("bearer_auth" = []))
)]
pub async fn get_order(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Ventas, Role::Almacen, Role::Finanzas])?;
    Ok(HttpResponse::Ok().json(fetch_order(pool.get_ref(), path.into_inner()).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(OrderQuery),
    responses((status = 200, body = PaginatedOrder)),
    tag = "Sales",
    security(("bearer_auth" = []))
)]
pub async fn list_orders(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<OrderQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Ventas, Role::Almacen, Role::Finanzas])?;
    let page = Page::new(query.page, query.per_page);

    let mut filters = Filters::default();
    if let Some(status) = &query.status {
        let status: OrderStatus = requested(status, "status")?;
        filters.add("status = ?", vec![SqlValue::String(status.to_string())]);
    }
    if let Some(rif) = &query.customer_rif {
        filters.add("customer_rif = ?", vec![SqlValue::String(normalize_rif(rif)?)]);
    }

    let mut count = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM orders");
    filters.write_where(&mut count);
    let total: i64 = count
        .build_query_scalar()
        .fetch_one(pool.get_ref())
        .await
        .map_err(db_error("count orders"))?;

    let mut select = QueryBuilder::<MySql>::new(format!("SELECT {ORDER_COLUMNS} FROM orders"));
    filters.write_where(&mut select);
    select
        .push(" ORDER BY order_date DESC, id DESC LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    let orders = select
        .build_query_as::<Order>()
        .fetch_all(pool.get_ref())
        .await
        .map_err(db_error("list orders"))?;

    Ok(HttpResponse::Ok().json(page.wrap(orders, total)))
}

/// Moves an order to `target` when its current status is one of `from`.
async fn transition(
    pool: &MySqlPool,
    order_id: u64,
    from: &[OrderStatus],
    target: OrderStatus,
) -> AppResult<OrderWithLines> {
    let mut tx = pool.begin().await.map_err(db_error("begin order transition"))?;

    let (status,): (String,) = sqlx::query_as("SELECT status FROM orders WHERE id = ? FOR UPDATE")
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("lock order"))?
        .ok_or_else(|| AppError::not_found("Order"))?;

    let current: OrderStatus = stored(&status, "orders.status")?;
    if !from.contains(&current) {
        return Err(AppError::Conflict(format!(
            "Order is {current} and cannot become {target}"
        )));
    }

    sqlx::query("UPDATE orders SET status = ? WHERE id = ?")
        .bind(target.as_ref())
        .bind(order_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error("update order status"))?;

    tx.commit().await.map_err(db_error("commit order transition"))?;
    info!(order_id, from = %current, to = %target, "Order status changed");

    fetch_order(pool, order_id).await
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/{order_id}/confirm",
    params(("order_id", Path, description = "Order ID")),
    responses(
        (status = 200, body = OrderWithLines),
        (status = 409, description = "Order is not a draft")
    ),
    tag = "Sales",
    security(("bearer_auth" = []))
)]
pub async fn confirm_order(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Ventas])?;
    let order = transition(
        pool.get_ref(),
        path.into_inner(),
        &[OrderStatus::Draft],
        OrderStatus::Confirmed,
    )
    .await?;
    Ok(HttpResponse::Ok().json(order))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/{order_id}/cancel",
    params(("order_id", Path, description = "Order ID")),
    responses(
        (status = 200, body = OrderWithLines),
        (status = 409, description = "Order was already invoiced or cancelled")
    ),
    tag = "Sales",
    security(("bearer_auth" = []))
)]
pub async fn cancel_order(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Ventas])?;
    let order = transition(
        pool.get_ref(),
        path.into_inner(),
        &[OrderStatus::Draft, OrderStatus::Confirmed],
        OrderStatus::Cancelled,
    )
    .await?;
    Ok(HttpResponse::Ok().json(order))
}
