use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::types::Json;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    #[serde(skip)]
    pub client_id: u64,
    pub visit_id: Option<String>,
    pub patient_id: Option<u64>,
    pub patient_name: String,
    pub items: Json<Value>,
    pub total_amount: f64,
    pub paid_amount: f64,
    pub payment_method: String,
    pub status: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
    pub is_archived: bool,
}

/// `inv_<unix millis>` when the caller brings no id of its own.
pub fn generated_invoice_id(now: DateTime<Utc>) -> String {
    format!("inv_{}", now.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn generated_id_uses_millis() {
        let now = Utc.timestamp_millis_opt(1_767_225_600_123).unwrap();
        assert_eq!(generated_invoice_id(now), "inv_1767225600123");
    }
}
