use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use sqlx::types::Json;

pub const DEFAULT_TRIAL_DAYS: i64 = 30;

/// A tenant organisation.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Client {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub logo_url: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub status: String,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub subscription_ends_at: Option<DateTime<Utc>>,
    pub owner_user_id: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
    pub enabled_features: Option<Json<Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientView {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub logo_url: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub status: String,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub subscription_ends_at: Option<DateTime<Utc>>,
    pub owner_user_id: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
    pub enabled_features: Value,
}

impl From<Client> for ClientView {
    fn from(c: Client) -> Self {
        Self {
            id: c.id,
            name: c.name,
            slug: c.slug,
            logo_url: c.logo_url.unwrap_or_default(),
            phone: c.phone.unwrap_or_default(),
            email: c.email.unwrap_or_default(),
            address: c.address.unwrap_or_default(),
            status: c.status,
            trial_ends_at: c.trial_ends_at,
            subscription_ends_at: c.subscription_ends_at,
            owner_user_id: c.owner_user_id,
            created_at: c.created_at,
            updated_at: c.updated_at,
            is_active: c.is_active,
            enabled_features: c
                .enabled_features
                .map(|f| f.0)
                .unwrap_or_else(default_features),
        }
    }
}

pub fn default_features() -> Value {
    json!({
        "dental_lab": false,
        "implant_company": false,
        "academy": false,
        "device_results": false,
    })
}

/// Trial and subscription extensions stack on a still-running period and
/// restart from `now` once it has lapsed.
pub fn extended_until(current: Option<DateTime<Utc>>, now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    let base = match current {
        Some(end) if end > now => end,
        _ => now,
    };
    base + Duration::days(days)
}
