use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{MySql, QueryBuilder, Transaction};
use std::str::FromStr;

use crate::error::AppError;

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    U64(u64),
    Decimal(Decimal),
    Bool(bool),
    Date(NaiveDate),
    Null,
}

/// How a whitelisted column expects its JSON value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnKind {
    Text,
    Money,
    Bool,
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
    /// Columns touched, in payload order
    pub columns: Vec<String>,
}

fn convert(column: &str, kind: ColumnKind, value: &Value) -> Result<SqlValue, AppError> {
    let bad = || AppError::BadRequest(format!("Invalid value for {column}"));

    match (kind, value) {
        (_, Value::Null) => Ok(SqlValue::Null),
        (ColumnKind::Text, Value::String(s)) => Ok(SqlValue::String(s.trim().to_string())),
        (ColumnKind::Money, Value::Number(n)) => Decimal::from_str(&n.to_string())
            .map(SqlValue::Decimal)
            .map_err(|_| bad()),
        (ColumnKind::Money, Value::String(s)) => {
            Decimal::from_str(s.trim()).map(SqlValue::Decimal).map_err(|_| bad())
        }
        (ColumnKind::Bool, Value::Bool(b)) => Ok(SqlValue::Bool(*b)),
        _ => Err(bad()),
    }
}

/// ===============================
/// Build dynamic UPDATE SQL
/// ===============================
/// Only columns present in `allowed` may be updated; anything else is a 400.
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    allowed: &[(&str, ColumnKind)],
    id_value: u64,
) -> Result<SqlUpdate, AppError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| AppError::BadRequest("Payload must be a JSON object".into()))?;

    if obj.is_empty() {
        return Err(AppError::BadRequest("No fields provided for update".into()));
    }

    let mut columns = Vec::with_capacity(obj.len());
    let mut values = Vec::with_capacity(obj.len() + 1);

    for (key, value) in obj {
        let (column, kind) = allowed
            .iter()
            .find(|(name, _)| *name == key.as_str())
            .ok_or_else(|| AppError::BadRequest(format!("Field {key} cannot be updated")))?;

        values.push(convert(column, *kind, value)?);
        columns.push(column.to_string());
    }

    // Build SET clause
    let set_clause = columns
        .iter()
        .map(|k| format!("{k} = ?"))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!("UPDATE {table} SET {set_clause} WHERE id = ?");

    // WHERE id = ?
    values.push(SqlValue::U64(id_value));

    Ok(SqlUpdate {
        sql,
        values,
        columns,
    })
}

impl SqlUpdate {
    pub fn value_of(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update(
    tx: &mut Transaction<'_, MySql>,
    update: SqlUpdate,
) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::Decimal(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(&mut **tx).await?;
    Ok(result.rows_affected())
}

/// ===============================
/// WHERE clause for list endpoints
/// ===============================
/// Each clause carries its own `?` placeholders, bound in order.
#[derive(Debug, Default)]
pub struct Filters {
    clauses: Vec<(&'static str, Vec<SqlValue>)>,
}

fn push_value(qb: &mut QueryBuilder<'_, MySql>, value: SqlValue) {
    match value {
        SqlValue::String(v) => qb.push_bind(v),
        SqlValue::U64(v) => qb.push_bind(v),
        SqlValue::Decimal(v) => qb.push_bind(v),
        SqlValue::Bool(v) => qb.push_bind(v),
        SqlValue::Date(v) => qb.push_bind(v),
        SqlValue::Null => qb.push_bind(None::<String>),
    };
}

impl Filters {
    pub fn add(&mut self, clause: &'static str, values: Vec<SqlValue>) -> &mut Self {
        self.clauses.push((clause, values));
        self
    }

    /// Appends ` WHERE a AND b ...` to the builder, binding every value.
    pub fn write_where(&self, qb: &mut QueryBuilder<'_, MySql>) {
        for (i, (clause, values)) in self.clauses.iter().enumerate() {
            qb.push(if i == 0 { " WHERE " } else { " AND " });
            let mut parts = clause.split('?');
            let mut values = values.iter().cloned();
            if let Some(first) = parts.next() {
                qb.push(first);
            }
            for part in parts {
                if let Some(value) = values.next() {
                    push_value(qb, value);
                }
                qb.push(part);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    const COLUMNS: &[(&str, ColumnKind)] = &[
        ("first_name", ColumnKind::Text),
        ("islr_rate", ColumnKind::Money),
        ("active", ColumnKind::Bool),
    ];

    #[test]
    fn builds_whitelisted_update() {
        let update = build_update_sql(
            "employees",
            &json!({"first_name": " Ana ", "islr_rate": "0.02"}),
            COLUMNS,
            7,
        )
        .unwrap();

        assert_eq!(
            update.sql,
            "UPDATE employees SET first_name = ?, islr_rate = ? WHERE id = ?"
        );
        assert_eq!(
            update.values,
            vec![
                SqlValue::String("Ana".into()),
                SqlValue::Decimal(dec!(0.02)),
                SqlValue::U64(7)
            ]
        );
        assert_eq!(update.value_of("islr_rate"), Some(&SqlValue::Decimal(dec!(0.02))));
    }

    #[test]
    fn rejects_unknown_columns() {
        let err = build_update_sql("employees", &json!({"status; DROP": "x"}), COLUMNS, 1)
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn filters_render_placeholders_in_order() {
        let mut filters = Filters::default();
        filters
            .add("status = ?", vec![SqlValue::String("active".into())])
            .add(
                "(first_name LIKE ? OR last_name LIKE ?)",
                vec![SqlValue::String("%an%".into()), SqlValue::String("%an%".into())],
            );

        let mut qb = QueryBuilder::<MySql>::new("SELECT id FROM employees");
        filters.write_where(&mut qb);
        assert_eq!(
            qb.sql(),
            "SELECT id FROM employees WHERE status = ? AND (first_name LIKE ? OR last_name LIKE ?)"
        );
    }

    #[test]
    fn rejects_wrong_types_and_empty_payloads() {
        assert!(build_update_sql("employees", &json!({"active": "yes"}), COLUMNS, 1).is_err());
        assert!(build_update_sql("employees", &json!({}), COLUMNS, 1).is_err());
        assert!(build_update_sql("employees", &json!([1, 2]), COLUMNS, 1).is_err());
    }
}
