pub mod benefit;
pub mod contract;
pub mod employee;
pub mod exchange_rate;
pub mod fiscal;
pub mod health;
pub mod inventory;
pub mod invoice;
pub mod order;
pub mod payroll;
pub mod purchase;
pub mod termination;
pub mod treasury;

use std::str::FromStr;

use actix_web::{HttpResponse, http::header};
use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;
use sqlx::{MySql, Transaction};

use crate::error::AppError;
use crate::model::product::MoveKind;

/// Logs a failed query with its context and hands back the error for `?`.
pub(crate) fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| {
        tracing::error!(error = %e, context, "Database query failed");
        AppError::Database(e)
    }
}

/// Parses an enum stored as VARCHAR; a bad value in the table is a server fault.
pub(crate) fn stored<T: FromStr>(value: &str, column: &str) -> Result<T, AppError> {
    value
        .parse()
        .map_err(|_| AppError::Internal(format!("unexpected {column} value {value:?}")))
}

/// Parses an enum coming from a client request.
pub(crate) fn requested<T: FromStr>(value: &str, field: &str) -> Result<T, AppError> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid {field}: {value}")))
}

pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Stock on hand, with the product row locked until the transaction ends.
pub(crate) async fn locked_stock(
    tx: &mut Transaction<'_, MySql>,
    product_id: u64,
) -> Result<Decimal, AppError> {
    let exists: Option<(u64,)> = sqlx::query_as("SELECT id FROM products WHERE id = ? FOR UPDATE")
        .bind(product_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(db_error("lock product"))?;
    if exists.is_none() {
        return Err(AppError::not_found(&format!("Product {product_id}")));
    }

    let (stock,): (Decimal,) =
        sqlx::query_as("SELECT COALESCE(SUM(quantity), 0) FROM inventory_moves WHERE product_id = ?")
            .bind(product_id)
            .fetch_one(&mut **tx)
            .await
            .map_err(db_error("sum stock"))?;
    Ok(stock)
}

/// Writes a stock move, refusing any move that would leave stock below zero.
pub(crate) async fn post_move(
    tx: &mut Transaction<'_, MySql>,
    product_id: u64,
    kind: MoveKind,
    quantity: Decimal,
    reference: Option<&str>,
    move_date: NaiveDate,
    created_by: Option<u64>,
) -> Result<u64, AppError> {
    if quantity.is_zero() {
        return Err(AppError::Validation("Move quantity must not be zero".into()));
    }
    let signed = kind.signed(quantity);
    let stock = locked_stock(tx, product_id).await?;
    if stock + signed < Decimal::ZERO {
        return Err(AppError::Validation(format!(
            "Insufficient stock for product {product_id}: {stock} on hand, {} requested",
            -signed
        )));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO inventory_moves (product_id, kind, quantity, reference, move_date, created_by)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(product_id)
    .bind(kind.as_ref())
    .bind(signed)
    .bind(reference)
    .bind(move_date)
    .bind(created_by)
    .execute(&mut **tx)
    .await
    .map_err(db_error("insert inventory move"))?;

    Ok(result.last_insert_id())
}

/// Plain-text attachment for a rendered bank file. Ids left out of the batch
/// travel in the `skipped_header` header.
pub(crate) fn bank_file_response(
    file_name: &str,
    content: String,
    skipped_header: &'static str,
    skipped: &[u64],
) -> HttpResponse {
    let skipped = skipped
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(",");
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{file_name}\""),
        ))
        .insert_header((skipped_header, skipped))
        .body(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::payroll::RunStatus;
    use actix_web::http::StatusCode;

    #[test]
    fn parses_enums_from_requests_and_rows() {
        let status: RunStatus = requested(" approved ", "status").unwrap();
        assert_eq!(status, RunStatus::Approved);
        assert!(matches!(
            requested::<RunStatus>("closed", "status"),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            stored::<RunStatus>("closed", "payroll_runs.status"),
            Err(AppError::Internal(_))
        ));
    }

    #[test]
    fn bank_file_lists_skipped_ids() {
        let resp = bank_file_response("NOM-1.txt", "D\r\n".into(), "X-Skipped-Employees", &[4, 9]);
        assert_eq!(resp.status(), StatusCode::OK);
        let headers = resp.headers();
        assert_eq!(headers.get("X-Skipped-Employees").unwrap(), "4,9");
        assert_eq!(
            headers.get(header::CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=\"NOM-1.txt\""
        );
    }
}
