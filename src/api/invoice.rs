use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{MySql, MySqlPool, QueryBuilder, Transaction};
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};

use super::order::OrderLineInput;
use super::{db_error, post_move, requested, stored, today};
use crate::auth::auth::AuthUser;
use crate::config::{Config, LegalParams};
use crate::domain::currency::Currency;
use crate::domain::invoicing::{TaxKind, TaxableLine, compute_totals, control_number};
use crate::error::{AppError, AppResult};
use crate::model::invoice::{Invoice, InvoiceLine, InvoiceStatus, InvoiceWithLines};
use crate::model::order::OrderStatus;
use crate::model::product::MoveKind;
use crate::model::role::Role;
use crate::utils::db_utils::{Filters, SqlValue};
use crate::utils::pagination::Page;
use crate::utils::rif::normalize_rif;
use crate::utils::{rate_cache, sequences};

pub(crate) const INVOICE_COLUMNS: &str = "id, invoice_number, control_number, order_id, customer_rif, \
     customer_name, invoice_date, payment_currency, exchange_rate, exento, base_general, iva_general, \
     base_reducida, iva_reducida, subtotal, iva, igtf, total, status";

#[derive(Deserialize, ToSchema)]
pub struct CreateInvoice {
    #[schema(example = "J-30000000-1")]
    pub customer_rif: String,
    #[schema(example = "Comercial Los Andes C.A.")]
    pub customer_name: String,
    /// Defaults to VES; any other currency adds IGTF
    pub payment_currency: Option<Currency>,
    /// Defaults to today
    #[schema(value_type = Option<String>, format = "date")]
    pub invoice_date: Option<NaiveDate>,
    pub lines: Vec<OrderLineInput>,
}

#[derive(Deserialize, ToSchema, Default)]
pub struct InvoiceOrder {
    pub payment_currency: Option<Currency>,
    #[schema(value_type = Option<String>, format = "date")]
    pub invoice_date: Option<NaiveDate>,
}

#[derive(Deserialize, IntoParams)]
pub struct InvoiceQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    #[param(value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,
    /// issued or void
    pub status: Option<String>,
}

/// One line to invoice, before product data is looked up.
struct LineRequest {
    product_id: u64,
    quantity: Decimal,
    unit_price: Option<Decimal>,
}

struct IssueRequest<'a> {
    order_id: Option<u64>,
    customer_rif: &'a str,
    customer_name: &'a str,
    invoice_date: NaiveDate,
    payment_currency: Currency,
    lines: Vec<LineRequest>,
}

#[derive(sqlx::FromRow)]
struct ProductFacts {
    name: String,
    price: Decimal,
    tax_kind: String,
}

/// Numbers, totals, stores and posts stock for one invoice inside `tx`.
async fn issue_invoice(
    tx: &mut Transaction<'_, MySql>,
    request: IssueRequest<'_>,
    legal: &LegalParams,
    user_id: u64,
) -> AppResult<(u64, u64)> {
    let customer_rif = normalize_rif(request.customer_rif)?;
    if request.customer_name.trim().is_empty() {
        return Err(AppError::BadRequest("customer_name is required".into()));
    }

    let mut described = Vec::with_capacity(request.lines.len());
    for line in &request.lines {
        let product = sqlx::query_as::<_, ProductFacts>(
            "SELECT name, price, tax_kind FROM products WHERE id = ? AND active = 1",
        )
        .bind(line.product_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(db_error("fetch invoiced product"))?
        .ok_or_else(|| AppError::not_found(&format!("Product {}", line.product_id)))?;

        let tax_kind: TaxKind = stored(&product.tax_kind, "products.tax_kind")?;
        let taxable = TaxableLine {
            quantity: line.quantity,
            unit_price: line.unit_price.unwrap_or(product.price),
            tax_kind,
        };
        described.push((line.product_id, product.name, taxable));
    }

    let taxable: Vec<TaxableLine> = described.iter().map(|(_, _, t)| t.clone()).collect();
    let totals = compute_totals(&taxable, request.payment_currency, legal)?;

    let exchange_rate = if request.payment_currency.is_local() {
        Decimal::ONE
    } else {
        rate_cache::rate_on_tx(tx, request.payment_currency, request.invoice_date)
            .await
            .map_err(db_error("snapshot exchange rate"))?
            .map(|r| r.rate)
            .ok_or_else(|| {
                AppError::not_found(&format!(
                    "Exchange rate for {} on {}",
                    request.payment_currency, request.invoice_date
                ))
            })?
    };

    let invoice_number = sequences::next_value(tx, sequences::INVOICE_NUMBER)
        .await
        .map_err(db_error("next invoice number"))?;
    let control = control_number(
        sequences::next_value(tx, sequences::CONTROL_NUMBER)
            .await
            .map_err(db_error("next control number"))?,
    );

    let invoice_id = sqlx::query(
        r#"
        INSERT INTO invoices
        (invoice_number, control_number, order_id, customer_rif, customer_name, invoice_date,
         payment_currency, exchange_rate, exento, base_general, iva_general, base_reducida,
         iva_reducida, subtotal, iva, igtf, total, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(invoice_number)
    .bind(&control)
    .bind(request.order_id)
    .bind(&customer_rif)
    .bind(request.customer_name.trim())
    .bind(request.invoice_date)
    .bind(request.payment_currency.as_ref())
    .bind(exchange_rate)
    .bind(totals.exento)
    .bind(totals.base_general)
    .bind(totals.iva_general)
    .bind(totals.base_reducida)
    .bind(totals.iva_reducida)
    .bind(totals.subtotal)
    .bind(totals.iva)
    .bind(totals.igtf)
    .bind(totals.total)
    .bind(InvoiceStatus::Issued.as_ref())
    .execute(&mut **tx)
    .await
    .map_err(|e| AppError::from_insert(e, "Invoice or control number already used"))?
    .last_insert_id();

    let reference = format!("FAC-{invoice_number}");
    for (product_id, name, line) in &described {
        sqlx::query(
            r#"
            INSERT INTO invoice_lines (invoice_id, product_id, description, quantity, unit_price, tax_kind, amount)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(invoice_id)
        .bind(*product_id)
        .bind(name)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line.tax_kind.as_ref())
        .bind(line.amount())
        .execute(&mut **tx)
        .await
        .map_err(db_error("insert invoice line"))?;

        post_move(
            tx,
            *product_id,
            MoveKind::Salida,
            line.quantity,
            Some(reference.as_str()),
            request.invoice_date,
            Some(user_id),
        )
        .await?;
    }

    Ok((invoice_id, invoice_number))
}

pub(crate) async fn fetch_invoice(pool: &MySqlPool, invoice_id: u64) -> AppResult<InvoiceWithLines> {
    let invoice = sqlx::query_as::<_, Invoice>(&format!(
        "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?"
    ))
    .bind(invoice_id)
    .fetch_optional(pool)
    .await
    .map_err(db_error("fetch invoice"))?
    .ok_or_else(|| AppError::not_found("Invoice"))?;

    let lines = sqlx::query_as::<_, InvoiceLine>(
        r#"
        SELECT id, invoice_id, product_id, description, quantity, unit_price, tax_kind, amount
        FROM invoice_lines WHERE invoice_id = ? ORDER BY id
        "#,
    )
    .bind(invoice_id)
    .fetch_all(pool)
    .await
    .map_err(db_error("fetch invoice lines"))?;

    Ok(InvoiceWithLines { invoice, lines })
}

/// Issue an invoice directly
#[utoipa::path(
    post,
    path = "/api/v1/invoices",
    request_body = CreateInvoice,
    responses(
        (status = 201, body = InvoiceWithLines),
        (status = 404, description = "Unknown product or missing exchange rate"),
        (status = 422, description = "Invalid RIF, empty invoice or insufficient stock")
    ),
    tag = "Sales",
    security(("bearer_auth" = []))
)]
#[instrument(skip_all, fields(user = %auth.username))]
pub async fn create_invoice(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<CreateInvoice>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Ventas, Role::Finanzas])?;
    let payload = payload.into_inner();

    let request = IssueRequest {
        order_id: None,
        customer_rif: &payload.customer_rif,
        customer_name: &payload.customer_name,
        invoice_date: payload.invoice_date.unwrap_or_else(today),
        payment_currency: payload.payment_currency.unwrap_or(Currency::Ves),
        lines: payload
            .lines
            .iter()
            .map(|l| LineRequest {
                product_id: l.product_id,
                quantity: l.quantity,
                unit_price: l.unit_price,
            })
            .collect(),
    };

    let mut tx = pool.begin().await.map_err(db_error("begin invoice"))?;
    let (invoice_id, invoice_number) = issue_invoice(&mut tx, request, &config.legal, auth.user_id).await?;
    tx.commit().await.map_err(db_error("commit invoice"))?;

    info!(invoice_id, invoice_number, "Invoice issued");
    Ok(HttpResponse::Created().json(fetch_invoice(pool.get_ref(), invoice_id).await?))
}

/// Invoice a confirmed order
#[utoipa::path(
    post,
    path = "/api/v1/orders/{order_id}/invoice",
    params(("order_id", Path, description = "Order ID")),
    request_body(content = InvoiceOrder, description = "Optional payment currency and date"),
    responses(
        (status = 201, body = InvoiceWithLines),
        (status = 404, description = "Order not found or missing exchange rate"),
        (status = 409, description = "Order is not confirmed"),
        (status = 422, description = "Insufficient stock")
    ),
    tag = "Sales",
    security(("bearer_auth" = []))
)]
#[instrument(skip_all, fields(user = %auth.username))]
pub async fn invoice_order(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    payload: Option<web::Json<InvoiceOrder>>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Ventas, Role::Finanzas])?;
    let order_id = path.into_inner();
    let options = payload.map(web::Json::into_inner).unwrap_or_default();

    let mut tx = pool.begin().await.map_err(db_error("begin order invoice"))?;

    let (customer_rif, customer_name, status): (String, String, String) = sqlx::query_as(
        "SELECT customer_rif, customer_name, status FROM orders WHERE id = ? FOR UPDATE",
    )
    .bind(order_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(db_error("lock order"))?
    .ok_or_else(|| AppError::not_found("Order"))?;

    let status: OrderStatus = stored(&status, "orders.status")?;
    if status != OrderStatus::Confirmed {
        return Err(AppError::Conflict(format!("Order is {status}, only confirmed orders are invoiced")));
    }

    let lines: Vec<(u64, Decimal, Decimal)> = sqlx::query_as(
        "SELECT product_id, quantity, unit_price FROM order_lines WHERE order_id = ? ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(&mut *tx)
    .await
    .map_err(db_error("fetch order lines"))?;

    let request = IssueRequest {
        order_id: Some(order_id),
        customer_rif: &customer_rif,
        customer_name: &customer_name,
        invoice_date: options.invoice_date.unwrap_or_else(today),
        payment_currency: options.payment_currency.unwrap_or(Currency::Ves),
        lines: lines
            .into_iter()
            .map(|(product_id, quantity, unit_price)| LineRequest {
                product_id,
                quantity,
                unit_price: Some(unit_price),
            })
            .collect(),
    };
    let (invoice_id, invoice_number) = issue_invoice(&mut tx, request, &config.legal, auth.user_id).await?;

    sqlx::query("UPDATE orders SET status = ? WHERE id = ?")
        .bind(OrderStatus::Invoiced.as_ref())
        .bind(order_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error("mark order invoiced"))?;

    tx.commit().await.map_err(db_error("commit order invoice"))?;

    info!(order_id, invoice_id, invoice_number, "Order invoiced");
    Ok(HttpResponse::Created().json(fetch_invoice(pool.get_ref(), invoice_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/invoices/{invoice_id}",
    params(("invoice_id", Path, description = "Invoice ID")),
    responses((status = 200, body = InvoiceWithLines), (status = 404, description = "Not found")),
    tag = "Sales",
    security(("bearer_auth" = []))
)]
pub async fn get_invoice(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Ventas, Role::Finanzas])?;
    Ok(HttpResponse::Ok().json(fetch_invoice(pool.get_ref(), path.into_inner()).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/invoices",
    params(InvoiceQuery),
    responses((status = 200, body = PaginatedInvoice)),
    tag = "Sales",
    security(("bearer_auth" = []))
)]
pub async fn list_invoices(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<InvoiceQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Ventas, Role::Finanzas])?;
    let page = Page::new(query.page, query.per_page);

    let mut filters = Filters::default();
    if let Some(from) = query.from {
        filters.add("invoice_date >= ?", vec![SqlValue::Date(from)]);
    }
    if let Some(to) = query.to {
        filters.add("invoice_date <= ?", vec![SqlValue::Date(to)]);
    }
    if let Some(status) = &query.status {
        let status: InvoiceStatus = requested(status, "status")?;
        filters.add("status = ?", vec![SqlValue::String(status.to_string())]);
    }

    let mut count = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM invoices");
    filters.write_where(&mut count);
    let total: i64 = count
        .build_query_scalar()
        .fetch_one(pool.get_ref())
        .await
        .map_err(db_error("count invoices"))?;

    let mut select = QueryBuilder::<MySql>::new(format!("SELECT {INVOICE_COLUMNS} FROM invoices"));
    filters.write_where(&mut select);
    select
        .push(" ORDER BY invoice_number DESC LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    let invoices = select
        .build_query_as::<Invoice>()
        .fetch_all(pool.get_ref())
        .await
        .map_err(db_error("list invoices"))?;

    Ok(HttpResponse::Ok().json(page.wrap(invoices, total)))
}

/// Void an invoice and return its goods to stock
#[utoipa::path(
    put,
    path = "/api/v1/invoices/{invoice_id}/void",
    params(("invoice_id", Path, description = "Invoice ID")),
    responses(
        (status = 200, body = InvoiceWithLines),
        (status = 404, description = "Not found"),
        (status = 409, description = "Invoice already void")
    ),
    tag = "Sales",
    security(("bearer_auth" = []))
)]
#[instrument(skip_all, fields(user = %auth.username))]
pub async fn void_invoice(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_any(&[Role::Finanzas])?;
    let invoice_id = path.into_inner();

    let mut tx = pool.begin().await.map_err(db_error("begin void invoice"))?;

    let (invoice_number, status): (u64, String) =
        sqlx::query_as("SELECT invoice_number, status FROM invoices WHERE id = ? FOR UPDATE")
            .bind(invoice_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error("lock invoice"))?
            .ok_or_else(|| AppError::not_found("Invoice"))?;

    if stored::<InvoiceStatus>(&status, "invoices.status")? == InvoiceStatus::Void {
        return Err(AppError::Conflict(format!("Invoice {invoice_number} is already void")));
    }

    sqlx::query("UPDATE invoices SET status = ? WHERE id = ?")
        .bind(InvoiceStatus::Void.as_ref())
        .bind(invoice_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error("void invoice"))?;

    let lines: Vec<(u64, Decimal)> =
        sqlx::query_as("SELECT product_id, quantity FROM invoice_lines WHERE invoice_id = ? ORDER BY id")
            .bind(invoice_id)
            .fetch_all(&mut *tx)
            .await
            .map_err(db_error("fetch lines to reverse"))?;

    let reference = format!("ANU-FAC-{invoice_number}");
    let move_date = today();
    for (product_id, quantity) in lines {
        post_move(
            &mut tx,
            product_id,
            MoveKind::Entrada,
            quantity,
            Some(reference.as_str()),
            move_date,
            Some(auth.user_id),
        )
        .await?;
    }

    tx.commit().await.map_err(db_error("commit void invoice"))?;

    info!(invoice_id, invoice_number, "Invoice voided");
    Ok(HttpResponse::Ok().json(fetch_invoice(pool.get_ref(), invoice_id).await?))
}
