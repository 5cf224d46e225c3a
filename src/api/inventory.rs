use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use sqlx::{MySql, MySqlPool, QueryBuilder};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use super::{db_error, post_move, requested, today};
use crate::auth::auth::AuthUser;
use crate::domain::invoicing::TaxKind;
use crate::error::AppError;
use crate::model::product::{InventoryMove, MoveKind, Product, StockLevel, Unit};
use crate::model::role::Role;
use crate::utils::db_utils::{
    ColumnKind, Filters, SqlValue, build_update_sql, execute_update,
};
use crate::utils::pagination::Page;

pub(crate) const PRODUCT_COLUMNS: &str =
    "id, sku, name, unit, price, cost, tax_kind, min_stock, active";

const MOVE_COLUMNS: &str = "id, product_id, kind, quantity, reference, move_date, created_by";

const STOCK_SELECT: &str = r#"
    SELECT p.id AS product_id, p.sku, p.name,
           COALESCE(SUM(m.quantity), 0) AS stock, p.min_stock
    FROM products p
    LEFT JOIN inventory_moves m ON m.product_id = p.id
    WHERE p.active = 1
    GROUP BY p.id, p.sku, p.name, p.min_stock
"#;

const UPDATABLE: &[(&str, ColumnKind)] = &[
    ("name", ColumnKind::Text),
    ("unit", ColumnKind::Text),
    ("price", ColumnKind::Money),
    ("cost", ColumnKind::Money),
    ("tax_kind", ColumnKind::Text),
    ("min_stock", ColumnKind::Money),
    ("active", ColumnKind::Bool),
];

#[derive(Deserialize, ToSchema)]
pub struct CreateProduct {
    #[schema(example = "HAR-001")]
    pub sku: String,
    #[schema(example = "Harina de maíz 1kg")]
    pub name: String,
    pub unit: Unit,
    #[schema(example = "42.50", value_type = String)]
    pub price: Decimal,
    #[serde(default)]
    #[schema(example = "30.00", value_type = String)]
    pub cost: Decimal,
    pub tax_kind: TaxKind,
    #[serde(default)]
    #[schema(example = "10", value_type = String)]
    pub min_stock: Decimal,
}

#[derive(Deserialize, IntoParams)]
pub struct ProductQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Matches SKU or name
    pub search: Option<String>,
    pub active: Option<bool>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateMove {
    #[schema(example = 1)]
    pub product_id: u64,
    pub kind: MoveKind,
    /// Positive for entrada/salida; ajuste carries its own sign
    #[schema(example = "24", value_type = String)]
    pub quantity: Decimal,
    #[schema(example = "OC-2026-015")]
    pub reference: Option<String>,
    /// Defaults to today
    #[schema(value_type = Option<String>, format = "date")]
    pub move_date: Option<NaiveDate>,
}

#[derive(Deserialize, IntoParams)]
pub struct MoveQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub product_id: Option<u64>,
    #[param(value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,
}

fn validate_amounts(price: Decimal, cost: Decimal, min_stock: Decimal) -> Result<(), AppError> {
    if price < Decimal::ZERO || cost < Decimal::ZERO || min_stock < Decimal::ZERO {
        return Err(AppError::Validation(
            "price, cost and min_stock must not be negative".into(),
        ));
    }
    Ok(())
}

pub(crate) async fn fetch_product(pool: &MySqlPool, product_id: u64) -> Result<Product, AppError> {
    sqlx::query_as::<_, Product>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"))
        .bind(product_id)
        .fetch_optional(pool)
        .await
        .map_err(db_error("fetch product"))?
        .ok_or_else(|| AppError::not_found("Product"))
}

#[utoipa::path(
    post,
    path = "/api/v1/products",
    request_body = CreateProduct,
    responses(
        (status = 201, body = Product),
        (status = 409, description = "SKU already exists"),
        (status = 422, description = "Negative price, cost or min_stock")
    ),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn create_product(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateProduct>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Almacen])?;

    let sku = payload.sku.trim().to_uppercase();
    if sku.is_empty() || payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("sku and name are required".into()));
    }
    validate_amounts(payload.price, payload.cost, payload.min_stock)?;

    let product_id = sqlx::query(
        r#"
        INSERT INTO products (sku, name, unit, price, cost, tax_kind, min_stock)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&sku)
    .bind(payload.name.trim())
    .bind(payload.unit.as_ref())
    .bind(payload.price)
    .bind(payload.cost)
    .bind(payload.tax_kind.as_ref())
    .bind(payload.min_stock)
    .execute(pool.get_ref())
    .await
    .map_err(|e| AppError::from_insert(e, "SKU already exists"))?
    .last_insert_id();

    info!(product_id, %sku, "Product created");
    Ok(HttpResponse::Created().json(fetch_product(pool.get_ref(), product_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{product_id}",
    params(("product_id", Path, description = "Product ID")),
    responses((status = 200, body = Product), (status = 404, description = "Not found")),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn get_product(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(fetch_product(pool.get_ref(), path.into_inner()).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(ProductQuery),
    responses((status = 200, body = PaginatedProduct)),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn list_products(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ProductQuery>,
) -> Result<HttpResponse, AppError> {
    let page = Page::new(query.page, query.per_page);

    let mut filters = Filters::default();
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        filters.add(
            "(sku LIKE ? OR name LIKE ?)",
            vec![SqlValue::String(pattern.clone()), SqlValue::String(pattern)],
        );
    }
    if let Some(active) = query.active {
        filters.add("active = ?", vec![SqlValue::Bool(active)]);
    }

    let mut count = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM products");
    filters.write_where(&mut count);
    let total: i64 = count
        .build_query_scalar()
        .fetch_one(pool.get_ref())
        .await
        .map_err(db_error("count products"))?;

    let mut select = QueryBuilder::<MySql>::new(format!("SELECT {PRODUCT_COLUMNS} FROM products"));
    filters.write_where(&mut select);
    select
        .push(" ORDER BY sku LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    let products = select
        .build_query_as::<Product>()
        .fetch_all(pool.get_ref())
        .await
        .map_err(db_error("list products"))?;

    Ok(HttpResponse::Ok().json(page.wrap(products, total)))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/{product_id}",
    params(("product_id", Path, description = "Product ID")),
    request_body(content = Object, description = "Any of name, unit, price, cost, tax_kind, min_stock, active"),
    responses(
        (status = 200, body = Product),
        (status = 400, description = "Unknown field or bad value"),
        (status = 404, description = "Not found")
    ),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn update_product(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<Value>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Almacen])?;
    let product_id = path.into_inner();

    let update = build_update_sql("products", &payload, UPDATABLE, product_id)?;

    if let Some(SqlValue::String(unit)) = update.value_of("unit") {
        requested::<Unit>(unit, "unit")?;
    }
    if let Some(SqlValue::String(kind)) = update.value_of("tax_kind") {
        requested::<TaxKind>(kind, "tax_kind")?;
    }
    if update.values.contains(&SqlValue::Null) {
        return Err(AppError::BadRequest("Product fields cannot be null".into()));
    }
    for column in ["price", "cost", "min_stock"] {
        if let Some(SqlValue::Decimal(v)) = update.value_of(column) {
            if *v < Decimal::ZERO {
                return Err(AppError::Validation(format!("{column} must not be negative")));
            }
        }
    }

    let columns = update.columns.join(", ");
    let mut tx = pool.begin().await.map_err(db_error("begin product update"))?;
    let affected = execute_update(&mut tx, update)
        .await
        .map_err(db_error("update product"))?;
    tx.commit().await.map_err(db_error("commit product update"))?;

    let product = fetch_product(pool.get_ref(), product_id).await?;
    if affected > 0 {
        info!(product_id, %columns, "Product updated");
    }
    Ok(HttpResponse::Ok().json(product))
}

/// Register a stock movement
#[utoipa::path(
    post,
    path = "/api/v1/inventory/moves",
    request_body = CreateMove,
    responses(
        (status = 201, body = InventoryMove),
        (status = 404, description = "Product not found"),
        (status = 422, description = "Stock would go negative")
    ),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn create_move(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateMove>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Almacen])?;

    let move_date = payload.move_date.unwrap_or_else(today);
    let reference = payload.reference.as_deref().map(str::trim);

    let mut tx = pool.begin().await.map_err(db_error("begin inventory move"))?;
    let move_id = post_move(
        &mut tx,
        payload.product_id,
        payload.kind,
        payload.quantity,
        reference,
        move_date,
        Some(auth.user_id),
    )
    .await?;
    tx.commit().await.map_err(db_error("commit inventory move"))?;

    info!(
        move_id,
        product_id = payload.product_id,
        kind = %payload.kind,
        quantity = %payload.quantity,
        "Inventory move registered"
    );

    let posted = sqlx::query_as::<_, InventoryMove>(&format!(
        "SELECT {MOVE_COLUMNS} FROM inventory_moves WHERE id = ?"
    ))
    .bind(move_id)
    .fetch_one(pool.get_ref())
    .await
    .map_err(db_error("fetch inventory move"))?;

    Ok(HttpResponse::Created().json(posted))
}

#[utoipa::path(
    get,
    path = "/api/v1/inventory/moves",
    params(MoveQuery),
    responses((status = 200, body = PaginatedInventoryMove)),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn list_moves(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<MoveQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Almacen, Role::Ventas, Role::Finanzas])?;
    let page = Page::new(query.page, query.per_page);

    let mut filters = Filters::default();
    if let Some(product_id) = query.product_id {
        filters.add("product_id = ?", vec![SqlValue::U64(product_id)]);
    }
    if let Some(from) = query.from {
        filters.add("move_date >= ?", vec![SqlValue::Date(from)]);
    }
    if let Some(to) = query.to {
        filters.add("move_date <= ?", vec![SqlValue::Date(to)]);
    }

    let mut count = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM inventory_moves");
    filters.write_where(&mut count);
    let total: i64 = count
        .build_query_scalar()
        .fetch_one(pool.get_ref())
        .await
        .map_err(db_error("count inventory moves"))?;

    let mut select =
        QueryBuilder::<MySql>::new(format!("SELECT {MOVE_COLUMNS} FROM inventory_moves"));
    filters.write_where(&mut select);
    select
        .push(" ORDER BY move_date DESC, id DESC LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    let moves = select
        .build_query_as::<InventoryMove>()
        .fetch_all(pool.get_ref())
        .await
        .map_err(db_error("list inventory moves"))?;

    Ok(HttpResponse::Ok().json(page.wrap(moves, total)))
}

/// Stock on hand per active product
#[utoipa::path(
    get,
    path = "/api/v1/inventory/stock",
    responses((status = 200, body = [StockLevel])),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn stock(_auth: AuthUser, pool: web::Data<MySqlPool>) -> Result<HttpResponse, AppError> {
    let levels = sqlx::query_as::<_, StockLevel>(&format!("{STOCK_SELECT} ORDER BY p.sku"))
        .fetch_all(pool.get_ref())
        .await
        .map_err(db_error("stock levels"))?;
    Ok(HttpResponse::Ok().json(levels))
}

/// Products at or below their minimum stock
#[utoipa::path(
    get,
    path = "/api/v1/inventory/low-stock",
    responses((status = 200, body = [StockLevel])),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn low_stock(_auth: AuthUser, pool: web::Data<MySqlPool>) -> Result<HttpResponse, AppError> {
    let levels = sqlx::query_as::<_, StockLevel>(&format!(
        "{STOCK_SELECT} HAVING stock <= p.min_stock ORDER BY stock - p.min_stock, p.sku"
    ))
    .fetch_all(pool.get_ref())
    .await
    .map_err(db_error("low stock levels"))?;
    Ok(HttpResponse::Ok().json(levels))
}
