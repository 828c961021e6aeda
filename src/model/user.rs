use serde::Serialize;

use crate::auth::password::CredentialEncoding;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: u64,
    pub client_id: Option<u64>,
    pub clinic_id: Option<u64>,
    pub full_name: String,
    pub email: String,
    #[serde(skip)]
    pub password: String,
    #[serde(skip)]
    #[sqlx(try_from = "String")]
    pub password_encoding: CredentialEncoding,
    pub role_id: u8,
    pub is_active: bool,
}

/// Listing row: staff user joined with the clinic name.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct UserListing {
    pub id: u64,
    pub full_name: String,
    pub email: String,
    pub role_id: u8,
    pub clinic_name: Option<String>,
}
