use crate::{
    api::{bad_request, not_found, server_error},
    auth::{
        auth::AuthUser,
        password::{CredentialEncoding, hash_password},
    },
    model::{
        client::{Client, ClientView, DEFAULT_TRIAL_DAYS, extended_until},
        role::{Action, Role},
    },
    utils::db_utils::{Scope, build_update_sql, execute_update, is_duplicate_key},
};
use actix_web::{HttpResponse, web};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::MySqlPool;
use sqlx::types::Json;
use tracing::{error, info};
use utoipa::ToSchema;

const CLIENT_COLUMNS: &str = "id, name, slug, logo_url, phone, email, address, status, \
     trial_ends_at, subscription_ends_at, owner_user_id, created_at, updated_at, is_active, \
     enabled_features";

/// Tables holding tenant data, children before parents.
const TENANT_TABLES: &[&str] = &[
    "hr_attendance",
    "hr_webauthn_challenges",
    "hr_biometric_credentials",
    "hr_work_schedules",
    "hr_employees",
    "device_results",
    "devices",
    "invoices",
    "appointments",
    "patients",
    "users",
    "clinics",
];

const PATCHABLE: &[(&str, &str)] = &[
    ("name", "name"),
    ("phone", "phone"),
    ("email", "email"),
    ("address", "address"),
    ("logoUrl", "logo_url"),
];

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateClient {
    #[schema(example = "Smile Dental")]
    pub name: String,
    #[schema(example = "smile-dental")]
    pub slug: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    #[schema(example = 30)]
    pub trial_days: Option<i64>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateOwner {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ExtendBy {
    #[schema(example = 14)]
    pub days: i64,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrialEndDate {
    #[schema(format = "date-time", value_type = String)]
    pub end_date: DateTime<Utc>,
}

#[derive(Deserialize, ToSchema)]
pub struct Features {
    #[schema(value_type = Object)]
    pub features: Value,
}

async fn fetch_client(pool: &MySqlPool, id: u64) -> Result<Option<Client>, sqlx::Error> {
    let sql = format!("SELECT {} FROM clients WHERE id = ?", CLIENT_COLUMNS);
    sqlx::query_as::<_, Client>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Public: resolves a tenant from its URL slug
pub async fn get_by_slug(
    slug: web::Path<String>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    let sql = format!("SELECT {} FROM clients WHERE slug = ? LIMIT 1", CLIENT_COLUMNS);
    let client = sqlx::query_as::<_, Client>(&sql)
        .bind(slug.as_str())
        .fetch_optional(pool.get_ref())
        .await
        .map_err(server_error("GET /clients/by-slug failed"))?;

    Ok(match client {
        Some(c) => HttpResponse::Ok().json(ClientView::from(c)),
        None => not_found("Client"),
    })
}

pub async fn list_clients(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ManageClients)?;

    let sql = format!("SELECT {} FROM clients ORDER BY created_at DESC", CLIENT_COLUMNS);
    let clients = sqlx::query_as::<_, Client>(&sql)
        .fetch_all(pool.get_ref())
        .await
        .map_err(server_error("GET /clients failed"))?;

    Ok(HttpResponse::Ok().json(
        clients
            .into_iter()
            .map(ClientView::from)
            .collect::<Vec<_>>(),
    ))
}

pub async fn get_client(
    auth: AuthUser,
    id: web::Path<u64>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ManageClients)?;

    let client = fetch_client(&pool, *id)
        .await
        .map_err(server_error("GET /clients/{id} failed"))?;

    Ok(match client {
        Some(c) => HttpResponse::Ok().json(ClientView::from(c)),
        None => not_found("Client"),
    })
}

pub async fn create_client(
    auth: AuthUser,
    payload: web::Json<CreateClient>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ManageClients)?;

    let name = payload.name.trim();
    let slug = payload.slug.trim().to_lowercase();
    if name.is_empty() || slug.is_empty() {
        return Ok(bad_request("name and slug required"));
    }

    let days = payload
        .trial_days
        .filter(|d| *d > 0)
        .unwrap_or(DEFAULT_TRIAL_DAYS);
    let trial_ends_at = extended_until(None, Utc::now(), days);

    let result = sqlx::query(
        r#"
        INSERT INTO clients (name, slug, phone, email, address, status, trial_ends_at, is_active)
        VALUES (?, ?, ?, ?, ?, 'trial', ?, TRUE)
        "#,
    )
    .bind(name)
    .bind(&slug)
    .bind(payload.phone.as_deref().unwrap_or(""))
    .bind(payload.email.as_deref().unwrap_or(""))
    .bind(payload.address.as_deref().unwrap_or(""))
    .bind(trial_ends_at)
    .execute(pool.get_ref())
    .await;

    let id = match result {
        Ok(r) => r.last_insert_id(),
        Err(e) if is_duplicate_key(&e) => {
            return Ok(HttpResponse::Conflict().json(json!({"error": "Slug already exists"})));
        }
        Err(e) => return Err(server_error("POST /clients failed")(e)),
    };

    info!(client_id = id, slug = %slug, "Client created");

    let client = fetch_client(&pool, id)
        .await
        .map_err(server_error("POST /clients reload failed"))?;

    Ok(match client {
        Some(c) => HttpResponse::Created().json(ClientView::from(c)),
        None => not_found("Client"),
    })
}

/// Creates the tenant's admin account and links it as owner
pub async fn create_owner(
    auth: AuthUser,
    id: web::Path<u64>,
    payload: web::Json<CreateOwner>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ManageClients)?;
    let client_id = *id;

    let email = payload.email.trim().to_lowercase();
    if payload.name.trim().is_empty() || email.is_empty() || payload.password.is_empty() {
        return Ok(bad_request("name, email, and password required"));
    }

    let hashed = hash_password(&payload.password).map_err(|e| {
        error!(error = %e, "Failed to hash owner password");
        actix_web::error::ErrorInternalServerError("Server error")
    })?;

    let mut tx = pool
        .begin()
        .await
        .map_err(server_error("owner tx begin failed"))?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO users (client_id, full_name, email, password, password_encoding, role_id, is_active)
        SELECT id, ?, ?, ?, ?, ?, TRUE FROM clients WHERE id = ?
        "#,
    )
    .bind(payload.name.trim())
    .bind(&email)
    .bind(&hashed)
    .bind(CredentialEncoding::Hashed.as_ref())
    .bind(Role::Admin.id())
    .bind(client_id)
    .execute(&mut *tx)
    .await;

    let user_id = match inserted {
        Ok(r) if r.rows_affected() == 0 => return Ok(not_found("Client")),
        Ok(r) => r.last_insert_id(),
        Err(e) if is_duplicate_key(&e) => {
            return Ok(HttpResponse::Conflict().json(json!({"error": "User already exists"})));
        }
        Err(e) => return Err(server_error("POST /clients/{id}/owner failed")(e)),
    };

    sqlx::query("UPDATE clients SET owner_user_id = ?, updated_at = NOW() WHERE id = ?")
        .bind(user_id)
        .bind(client_id)
        .execute(&mut *tx)
        .await
        .map_err(server_error("owner link failed"))?;

    tx.commit()
        .await
        .map_err(server_error("owner tx commit failed"))?;

    Ok(HttpResponse::Created().json(json!({ "userId": user_id })))
}

/// Which end date an extension moves.
#[derive(Clone, Copy)]
enum Period {
    Trial,
    Subscription,
}

async fn extend(
    pool: &MySqlPool,
    client_id: u64,
    days: i64,
    period: Period,
) -> actix_web::Result<HttpResponse> {
    if days <= 0 {
        return Ok(bad_request("days required (positive number)"));
    }

    let mut tx = pool
        .begin()
        .await
        .map_err(server_error("extend tx begin failed"))?;

    let current = sqlx::query_as::<_, (Option<DateTime<Utc>>, Option<DateTime<Utc>>)>(
        "SELECT trial_ends_at, subscription_ends_at FROM clients WHERE id = ? FOR UPDATE",
    )
    .bind(client_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(server_error("extend lookup failed"))?;

    let Some((trial_ends_at, subscription_ends_at)) = current else {
        return Ok(not_found("Client"));
    };

    let now = Utc::now();
    let update = match period {
        Period::Trial => sqlx::query(
            "UPDATE clients SET trial_ends_at = ?, updated_at = NOW() WHERE id = ?",
        )
        .bind(extended_until(trial_ends_at, now, days)),
        Period::Subscription => sqlx::query(
            "UPDATE clients SET status = 'active', subscription_ends_at = ?, updated_at = NOW() WHERE id = ?",
        )
        .bind(extended_until(subscription_ends_at, now, days)),
    };

    update
        .bind(client_id)
        .execute(&mut *tx)
        .await
        .map_err(server_error("extend update failed"))?;

    tx.commit()
        .await
        .map_err(server_error("extend tx commit failed"))?;

    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

pub async fn extend_trial(
    auth: AuthUser,
    id: web::Path<u64>,
    payload: web::Json<ExtendBy>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ManageClients)?;
    extend(&pool, *id, payload.days, Period::Trial).await
}

pub async fn extend_subscription(
    auth: AuthUser,
    id: web::Path<u64>,
    payload: web::Json<ExtendBy>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ManageClients)?;
    extend(&pool, *id, payload.days, Period::Subscription).await
}

pub async fn set_trial_end_date(
    auth: AuthUser,
    id: web::Path<u64>,
    payload: web::Json<TrialEndDate>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ManageClients)?;

    let result = sqlx::query("UPDATE clients SET trial_ends_at = ?, updated_at = NOW() WHERE id = ?")
        .bind(payload.end_date)
        .bind(*id)
        .execute(pool.get_ref())
        .await
        .map_err(server_error("PUT trial-end-date failed"))?;

    if result.rows_affected() == 0 {
        return Ok(not_found("Client"));
    }
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

async fn set_status(pool: &MySqlPool, client_id: u64, status: &str) -> actix_web::Result<HttpResponse> {
    let result = sqlx::query("UPDATE clients SET status = ?, updated_at = NOW() WHERE id = ?")
        .bind(status)
        .bind(client_id)
        .execute(pool)
        .await
        .map_err(server_error("client status update failed"))?;

    if result.rows_affected() == 0 {
        return Ok(not_found("Client"));
    }
    info!(client_id, status, "Client status changed");
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

pub async fn suspend_client(
    auth: AuthUser,
    id: web::Path<u64>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ManageClients)?;
    set_status(&pool, *id, "suspended").await
}

pub async fn activate_client(
    auth: AuthUser,
    id: web::Path<u64>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ManageClients)?;
    set_status(&pool, *id, "active").await
}

pub async fn set_features(
    auth: AuthUser,
    id: web::Path<u64>,
    payload: web::Json<Features>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ManageClients)?;

    if !payload.features.is_object() {
        return Ok(bad_request("features object required"));
    }

    let result =
        sqlx::query("UPDATE clients SET enabled_features = ?, updated_at = NOW() WHERE id = ?")
            .bind(Json(&payload.features))
            .bind(*id)
            .execute(pool.get_ref())
            .await
            .map_err(server_error("PUT features failed"))?;

    if result.rows_affected() == 0 {
        return Ok(not_found("Client"));
    }
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

pub async fn update_client(
    auth: AuthUser,
    id: web::Path<u64>,
    payload: web::Json<Value>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ManageClients)?;

    let update = build_update_sql("clients", &payload, PATCHABLE, "id", *id, Scope::Platform)?;
    execute_update(pool.get_ref(), update)
        .await
        .map_err(server_error("PATCH /clients/{id} failed"))?;

    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

pub async fn client_stats(
    auth: AuthUser,
    id: web::Path<u64>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ManageClients)?;

    let (patients, users, appointments) = sqlx::query_as::<_, (i64, i64, i64)>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM patients WHERE client_id = ?),
            (SELECT COUNT(*) FROM users WHERE client_id = ?),
            (SELECT COUNT(*) FROM appointments WHERE client_id = ?)
        "#,
    )
    .bind(*id)
    .bind(*id)
    .bind(*id)
    .fetch_one(pool.get_ref())
    .await
    .map_err(server_error("GET /clients/{id}/stats failed"))?;

    Ok(HttpResponse::Ok().json(json!({
        "patientsCount": patients,
        "usersCount": users,
        "appointmentsCount": appointments,
    })))
}

/// Removes a tenant with all of its data in one transaction
pub async fn delete_client(
    auth: AuthUser,
    id: web::Path<u64>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ManageClients)?;
    let client_id = *id;

    let mut tx = pool
        .begin()
        .await
        .map_err(server_error("delete tx begin failed"))?;

    for table in TENANT_TABLES {
        let sql = match *table {
            // keyed by employee, not tenant
            "hr_webauthn_challenges" => "DELETE c FROM hr_webauthn_challenges c \
                 JOIN hr_employees e ON e.id = c.employee_id WHERE e.client_id = ?"
                .to_string(),
            other => format!("DELETE FROM {} WHERE client_id = ?", other),
        };
        sqlx::query(&sql)
            .bind(client_id)
            .execute(&mut *tx)
            .await
            .map_err(server_error("tenant data delete failed"))?;
    }

    let result = sqlx::query("DELETE FROM clients WHERE id = ?")
        .bind(client_id)
        .execute(&mut *tx)
        .await
        .map_err(server_error("client delete failed"))?;

    if result.rows_affected() == 0 {
        // dropping tx rolls back
        return Ok(not_found("Client"));
    }

    tx.commit()
        .await
        .map_err(server_error("delete tx commit failed"))?;

    info!(client_id, "Client deleted with all tenant data");
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}
