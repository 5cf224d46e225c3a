use sqlx::{MySql, Transaction};

pub const INVOICE_NUMBER: &str = "invoice_number";
pub const CONTROL_NUMBER: &str = "control_number";
pub const RETENTION_VOUCHER: &str = "retention_voucher";

/// Takes the next value of a named counter. The row stays locked until the
/// surrounding transaction ends, so two issuers never share a number.
pub async fn next_value(tx: &mut Transaction<'_, MySql>, name: &str) -> Result<u64, sqlx::Error> {
    let (value,): (u64,) =
        sqlx::query_as("SELECT next_value FROM sequences WHERE name = ? FOR UPDATE")
            .bind(name)
            .fetch_one(&mut **tx)
            .await?;

    sqlx::query("UPDATE sequences SET next_value = next_value + 1 WHERE name = ?")
        .bind(name)
        .execute(&mut **tx)
        .await?;

    Ok(value)
}
