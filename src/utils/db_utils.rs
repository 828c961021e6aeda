use actix_web::error::ErrorBadRequest;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use sqlx::MySqlPool;

use crate::model::tenant::TenantId;

/// SQL bindable value
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Json(Value),
    Null,
}

impl From<u64> for SqlValue {
    fn from(v: u64) -> Self {
        SqlValue::U64(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::String(v.to_string())
    }
}

#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// Which rows an update may touch besides the id match.
#[derive(Debug, Clone, Copy)]
pub enum Scope {
    /// `AND client_id = ?`
    Tenant(TenantId),
    /// Platform tables (clients) edited by super admins.
    Platform,
}

/// Builds a partial `UPDATE`. Only payload keys listed in `fields`
/// (`(json_key, column)`) are written; anything else is rejected so column
/// names never come from the request.
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    fields: &[(&str, &str)],
    id_column: &str,
    id_value: impl Into<SqlValue>,
    scope: Scope,
) -> Result<SqlUpdate, actix_web::Error> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ErrorBadRequest("Payload must be a JSON object"))?;

    let mut columns = Vec::with_capacity(obj.len());
    let mut values = Vec::with_capacity(obj.len() + 2);

    for (key, value) in obj {
        let column = fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, c)| *c)
            .ok_or_else(|| ErrorBadRequest(format!("Field not updatable: {}", key)))?;

        columns.push(format!("{} = ?", column));
        values.push(to_sql_value(value)?);
    }

    if columns.is_empty() {
        return Err(ErrorBadRequest("No fields provided for update"));
    }

    let mut sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        table,
        columns.join(", "),
        id_column
    );
    values.push(id_value.into());

    if let Scope::Tenant(tenant) = scope {
        sql.push_str(" AND client_id = ?");
        values.push(SqlValue::U64(tenant.get()));
    }

    Ok(SqlUpdate { sql, values })
}

fn to_sql_value(value: &Value) -> Result<SqlValue, actix_web::Error> {
    Ok(match value {
        Value::String(s) => {
            if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                SqlValue::Date(d)
            } else if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
                SqlValue::DateTime(dt)
            } else {
                SqlValue::String(s.clone())
            }
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::I64(i)
            } else if let Some(f) = n.as_f64() {
                SqlValue::F64(f)
            } else {
                return Err(ErrorBadRequest("Unsupported number"));
            }
        }
        Value::Bool(b) => SqlValue::Bool(*b),
        Value::Null => SqlValue::Null,
        Value::Object(_) | Value::Array(_) => SqlValue::Json(value.clone()),
    })
}

/// MySQL reports unique-key violations as SQLSTATE 23000.
pub fn is_duplicate_key(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23000"),
        _ => false,
    }
}

/// Execute the update, returning rows affected
pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::DateTime(v) => query.bind(v),
            SqlValue::Json(v) => query.bind(sqlx::types::Json(v)),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FIELDS: &[(&str, &str)] = &[("name", "name"), ("paymentMethod", "payment_method")];

    #[test]
    fn maps_json_keys_to_whitelisted_columns() {
        let update = build_update_sql(
            "invoices",
            &json!({"paymentMethod": "card"}),
            FIELDS,
            "id",
            5u64,
            Scope::Tenant(TenantId::new(2)),
        )
        .unwrap();

        assert_eq!(
            update.sql,
            "UPDATE invoices SET payment_method = ? WHERE id = ? AND client_id = ?"
        );
        assert_eq!(
            update.values,
            vec![
                SqlValue::String("card".into()),
                SqlValue::U64(5),
                SqlValue::U64(2)
            ]
        );
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = build_update_sql(
            "invoices",
            &json!({"client_id": 9}),
            FIELDS,
            "id",
            5u64,
            Scope::Tenant(TenantId::new(2)),
        );
        assert!(err.is_err());
    }

    #[test]
    fn rejects_empty_payload() {
        assert!(build_update_sql("clients", &json!({}), FIELDS, "id", 1u64, Scope::Platform).is_err());
        assert!(build_update_sql("clients", &json!([1]), FIELDS, "id", 1u64, Scope::Platform).is_err());
    }

    #[test]
    fn string_ids_bind_as_strings() {
        let update = build_update_sql(
            "devices",
            &json!({"name": "Analyzer"}),
            FIELDS,
            "id",
            "9f1c",
            Scope::Tenant(TenantId::new(2)),
        )
        .unwrap();
        assert_eq!(update.values[1], SqlValue::String("9f1c".into()));
    }

    #[test]
    fn platform_scope_has_no_tenant_clause() {
        let update =
            build_update_sql("clients", &json!({"name": "A"}), FIELDS, "id", 1u64, Scope::Platform)
                .unwrap();
        assert_eq!(update.sql, "UPDATE clients SET name = ? WHERE id = ?");
    }
}
