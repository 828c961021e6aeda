use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct LoginReqDto {
    #[schema(example = "admin@clinic.com")]
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct HrLoginReqDto {
    /// Tenant slug the employee belongs to
    #[schema(example = "smile-dental")]
    pub client_slug: String,
    #[schema(example = "lina")]
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    pub sub: String,
    pub role: u8, // role id
    pub exp: usize,
    pub jti: String,

    pub token_type: TokenType,
    /// Tenant; absent only for platform super admins
    pub client_id: Option<u64>,
    /// Present only for HR employee logins
    pub hr_employee_id: Option<u64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum TokenType {
    Access,
    Refresh,
}

/// Identity encoded into a token pair.
#[derive(Debug, Clone)]
pub struct TokenSubject {
    pub user_id: u64,
    pub username: String,
    pub role: u8,
    pub client_id: Option<u64>,
    pub hr_employee_id: Option<u64>,
}

impl From<&Claims> for TokenSubject {
    fn from(c: &Claims) -> Self {
        Self {
            user_id: c.user_id,
            username: c.sub.clone(),
            role: c.role,
            client_id: c.client_id,
            hr_employee_id: c.hr_employee_id,
        }
    }
}
