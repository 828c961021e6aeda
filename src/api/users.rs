use crate::{
    api::{bad_request, server_error},
    auth::{
        auth::AuthUser,
        password::{CredentialEncoding, hash_password},
    },
    model::{
        role::{Action, Role},
        user::UserListing,
    },
    utils::db_utils::is_duplicate_key,
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use std::str::FromStr;
use tracing::{error, info};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateUser {
    #[serde(alias = "name")]
    pub full_name: String,
    pub email: String,
    pub password: String,
    #[schema(example = "doctor")]
    pub role: String,
    pub clinic_id: Option<u64>,
}

/// Roles an admin may hand out to staff accounts.
fn staff_role(name: &str) -> Option<Role> {
    match Role::from_str(name.trim()) {
        Ok(role @ (Role::Admin | Role::Doctor | Role::Receptionist)) => Some(role),
        _ => None,
    }
}

pub async fn list_users(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ManageUsers)?;
    let tenant = auth.tenant()?;

    let users = sqlx::query_as::<_, UserListing>(
        r#"
        SELECT u.id, u.full_name, u.email, u.role_id, c.name AS clinic_name
        FROM users u
        LEFT JOIN clinics c ON c.id = u.clinic_id
        WHERE u.client_id = ?
        ORDER BY u.id DESC
        "#,
    )
    .bind(tenant.get())
    .fetch_all(pool.get_ref())
    .await
    .map_err(server_error("GET /users failed"))?;

    Ok(HttpResponse::Ok().json(users))
}

pub async fn create_user(
    auth: AuthUser,
    payload: web::Json<CreateUser>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ManageUsers)?;
    let tenant = auth.tenant()?;

    let email = payload.email.trim().to_lowercase();
    if payload.full_name.trim().is_empty() || email.is_empty() || payload.password.is_empty() {
        return Ok(bad_request("name, email and password required"));
    }
    let Some(role) = staff_role(&payload.role) else {
        return Ok(bad_request("role must be admin, doctor or receptionist"));
    };

    let hashed = hash_password(&payload.password).map_err(|e| {
        error!(error = %e, "Failed to hash user password");
        actix_web::error::ErrorInternalServerError("Server error")
    })?;

    // clinic must belong to the caller's tenant
    let result = sqlx::query(
        r#"
        INSERT INTO users (client_id, clinic_id, full_name, email, password, password_encoding, role_id, is_active)
        SELECT ?, ?, ?, ?, ?, ?, ?, TRUE
        FROM DUAL
        WHERE ? IS NULL OR EXISTS (SELECT 1 FROM clinics WHERE id = ? AND client_id = ?)
        "#,
    )
    .bind(tenant.get())
    .bind(payload.clinic_id)
    .bind(payload.full_name.trim())
    .bind(&email)
    .bind(&hashed)
    .bind(CredentialEncoding::Hashed.as_ref())
    .bind(role.id())
    .bind(payload.clinic_id)
    .bind(payload.clinic_id)
    .bind(tenant.get())
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(r) if r.rows_affected() == 0 => Ok(bad_request("Unknown clinic")),
        Ok(r) => {
            let id = r.last_insert_id();
            info!(user_id = id, role = %role, %tenant, "Staff user created");
            Ok(HttpResponse::Created().json(json!({
                "id": id,
                "full_name": payload.full_name.trim(),
                "email": email,
                "role": role,
                "clinic_id": payload.clinic_id,
            })))
        }
        Err(e) if is_duplicate_key(&e) => {
            Ok(HttpResponse::Conflict().json(json!({"error": "User already exists"})))
        }
        Err(e) => Err(server_error("POST /users failed")(e)),
    }
}
