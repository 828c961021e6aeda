use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::password::CredentialEncoding;

/// Staff member tracked by the HR attendance module.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct HrEmployee {
    pub id: u64,
    pub client_id: u64,
    pub full_name: String,
    pub username: String,
    #[serde(skip)]
    pub password: String,
    #[serde(skip)]
    #[sqlx(try_from = "String")]
    pub password_encoding: CredentialEncoding,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HrEmployee {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(
    example = json!({
        "id": 7,
        "clientId": 1,
        "fullName": "Lina Haddad",
        "username": "lina",
        "phone": "+962790000000",
        "email": null,
        "status": "active",
        "bioRegistered": true,
        "schedule": {
            "workDays": [1, 2, 3, 4, 5],
            "startTime": "09:00",
            "endTime": "17:00",
            "graceMinutes": 10,
            "overtimeEnabled": true,
            "effectiveFrom": "2026-01-01",
            "effectiveTo": null
        }
    })
)]
pub struct EmployeeView {
    pub id: u64,
    pub client_id: u64,
    pub full_name: String,
    pub username: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub status: String,
    pub bio_registered: bool,
    pub schedule: Option<crate::model::schedule::ScheduleView>,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
    #[schema(format = "date-time", value_type = String)]
    pub updated_at: DateTime<Utc>,
}
