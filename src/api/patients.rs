use crate::{
    api::{bad_request, not_found, server_error},
    auth::{
        auth::AuthUser,
        password::{CredentialEncoding, generate_password, hash_password},
    },
    model::{
        patient::{Patient, make_username},
        role::Action,
        tenant::TenantId,
    },
    utils::db_utils::is_duplicate_key,
};
use actix_web::{HttpResponse, web};
use argon2::password_hash::rand_core::{OsRng, RngCore};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{error, info, warn};
use utoipa::ToSchema;

const PATIENT_COLUMNS: &str =
    "id, client_id, full_name, phone, notes, username, has_access, created_at";

#[derive(Deserialize, ToSchema)]
pub struct CreatePatient {
    #[schema(example = "Sami Khalil")]
    pub full_name: String,
    #[schema(example = "+962 79 123 4567")]
    pub phone: String,
    pub notes: Option<String>,
}

/// `-NNNN` appended to a username that is already taken.
fn collision_suffix() -> String {
    format!("-{}", 1000 + OsRng.next_u32() % 9000)
}

async fn insert_patient(
    pool: &MySqlPool,
    tenant: TenantId,
    payload: &CreatePatient,
    username: &str,
    hashed: &str,
) -> Result<Patient, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO patients (client_id, full_name, phone, notes, username, password, password_encoding, has_access)
        VALUES (?, ?, ?, ?, ?, ?, ?, TRUE)
        "#,
    )
    .bind(tenant.get())
    .bind(payload.full_name.trim())
    .bind(payload.phone.trim())
    .bind(payload.notes.as_deref())
    .bind(username)
    .bind(hashed)
    .bind(CredentialEncoding::Hashed.as_ref())
    .execute(pool)
    .await?;

    let sql = format!("SELECT {} FROM patients WHERE id = ?", PATIENT_COLUMNS);
    sqlx::query_as::<_, Patient>(&sql)
        .bind(result.last_insert_id())
        .fetch_one(pool)
        .await
}

fn hashed(password: &str) -> actix_web::Result<String> {
    hash_password(password).map_err(|e| {
        error!(error = %e, "Failed to hash patient password");
        actix_web::error::ErrorInternalServerError("Server error")
    })
}

/// Creates a patient with a portal login and returns the one-time password
pub async fn create_patient(
    auth: AuthUser,
    payload: web::Json<CreatePatient>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::CreatePatient)?;
    let tenant = auth.tenant()?;

    if payload.full_name.trim().is_empty() || payload.phone.trim().is_empty() {
        return Ok(bad_request("full_name and phone required"));
    }

    let mut username = make_username(&payload.phone);
    let mut password = generate_password();

    let first = insert_patient(&pool, tenant, &payload, &username, &hashed(&password)?).await;
    let patient = match first {
        Ok(p) => p,
        Err(e) if is_duplicate_key(&e) => {
            // one retry with a random suffix
            warn!(%username, %tenant, "Patient username taken, retrying with suffix");
            username.push_str(&collision_suffix());
            password = generate_password();
            match insert_patient(&pool, tenant, &payload, &username, &hashed(&password)?).await {
                Ok(p) => p,
                Err(e) if is_duplicate_key(&e) => {
                    return Ok(HttpResponse::Conflict()
                        .json(json!({"error": "Username already taken, try again"})));
                }
                Err(e) => return Err(server_error("POST /patients retry failed")(e)),
            }
        }
        Err(e) => return Err(server_error("POST /patients failed")(e)),
    };

    info!(patient_id = patient.id, %tenant, "Patient created");

    Ok(HttpResponse::Created().json(json!({
        "patient": patient,
        "credentials": { "username": username, "password": password }
    })))
}

pub async fn list_patients(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ViewPatients)?;
    let tenant = auth.tenant()?;

    let sql = format!(
        "SELECT {} FROM patients WHERE client_id = ? ORDER BY created_at DESC",
        PATIENT_COLUMNS
    );
    let patients = sqlx::query_as::<_, Patient>(&sql)
        .bind(tenant.get())
        .fetch_all(pool.get_ref())
        .await
        .map_err(server_error("GET /patients failed"))?;

    Ok(HttpResponse::Ok().json(patients))
}

pub async fn get_patient(
    auth: AuthUser,
    id: web::Path<u64>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ViewPatients)?;
    let tenant = auth.tenant()?;

    let sql = format!(
        "SELECT {} FROM patients WHERE id = ? AND client_id = ?",
        PATIENT_COLUMNS
    );
    let patient = sqlx::query_as::<_, Patient>(&sql)
        .bind(*id)
        .bind(tenant.get())
        .fetch_optional(pool.get_ref())
        .await
        .map_err(server_error("GET /patients/{id} failed"))?;

    Ok(match patient {
        Some(p) => HttpResponse::Ok().json(p),
        None => not_found("Patient"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_is_four_digits() {
        for _ in 0..50 {
            let suffix = collision_suffix();
            assert_eq!(suffix.len(), 5);
            let n: u32 = suffix[1..].parse().unwrap();
            assert!((1000..10000).contains(&n));
        }
    }
}
