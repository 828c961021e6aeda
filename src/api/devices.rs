use crate::{
    api::{bad_request, not_found, server_error},
    auth::auth::AuthUser,
    model::{device::Device, role::Action},
    utils::db_utils::{Scope, build_update_sql, execute_update},
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::MySqlPool;
use sqlx::types::Json;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

const DEVICE_COLUMNS: &str = "id, client_id, clinic_id, name, type, connection_type, ip_address, \
     port, com_port, baud_rate, config, is_active, last_seen_at, created_at, updated_at";

const EDITABLE: &[(&str, &str)] = &[
    ("name", "name"),
    ("type", "type"),
    ("connectionType", "connection_type"),
    ("connection_type", "connection_type"),
    ("ipAddress", "ip_address"),
    ("ip_address", "ip_address"),
    ("port", "port"),
    ("comPort", "com_port"),
    ("com_port", "com_port"),
    ("baudRate", "baud_rate"),
    ("baud_rate", "baud_rate"),
    ("config", "config"),
    ("isActive", "is_active"),
    ("is_active", "is_active"),
];

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceQuery {
    pub clinic_id: Option<u64>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDevice {
    #[serde(alias = "clinic_id")]
    pub clinic_id: Option<u64>,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub device_type: String,
    #[serde(alias = "connection_type", default)]
    pub connection_type: String,
    #[serde(alias = "ip_address")]
    pub ip_address: Option<String>,
    pub port: Option<u32>,
    #[serde(alias = "com_port")]
    pub com_port: Option<String>,
    #[serde(alias = "baud_rate")]
    pub baud_rate: Option<u32>,
    #[schema(value_type = Object)]
    pub config: Option<Value>,
    #[serde(alias = "is_active")]
    pub is_active: Option<bool>,
}

/// With `clinicId` only that clinic's active devices are listed
pub async fn list_devices(
    auth: AuthUser,
    query: web::Query<DeviceQuery>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ViewDevices)?;
    let tenant = auth.tenant()?;

    let sql = format!(
        r#"
        SELECT {}
        FROM devices
        WHERE client_id = ?
          AND (? IS NULL OR (clinic_id = ? AND is_active = TRUE))
        ORDER BY created_at DESC
        "#,
        DEVICE_COLUMNS
    );
    let devices = sqlx::query_as::<_, Device>(&sql)
        .bind(tenant.get())
        .bind(query.clinic_id)
        .bind(query.clinic_id)
        .fetch_all(pool.get_ref())
        .await
        .map_err(server_error("GET /devices failed"))?;

    Ok(HttpResponse::Ok().json(devices))
}

pub async fn create_device(
    auth: AuthUser,
    payload: web::Json<CreateDevice>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ManageDevices)?;
    let tenant = auth.tenant()?;

    let Some(clinic_id) = payload.clinic_id else {
        return Ok(bad_request("name, type, connectionType, clinicId required"));
    };
    if payload.name.trim().is_empty()
        || payload.device_type.trim().is_empty()
        || payload.connection_type.trim().is_empty()
    {
        return Ok(bad_request("name, type, connectionType, clinicId required"));
    }

    let id = Uuid::new_v4().to_string();
    let config = payload.config.clone().unwrap_or_else(|| json!({}));

    let result = sqlx::query(
        r#"
        INSERT INTO devices (id, client_id, clinic_id, name, type, connection_type, ip_address,
                             port, com_port, baud_rate, config, is_active)
        SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?
        FROM clinics
        WHERE id = ? AND client_id = ?
        "#,
    )
    .bind(&id)
    .bind(tenant.get())
    .bind(clinic_id)
    .bind(payload.name.trim())
    .bind(payload.device_type.trim())
    .bind(payload.connection_type.trim())
    .bind(payload.ip_address.as_deref())
    .bind(payload.port)
    .bind(payload.com_port.as_deref())
    .bind(payload.baud_rate)
    .bind(Json(config))
    .bind(payload.is_active.unwrap_or(true))
    .bind(clinic_id)
    .bind(tenant.get())
    .execute(pool.get_ref())
    .await
    .map_err(server_error("POST /devices failed"))?;

    if result.rows_affected() == 0 {
        return Ok(not_found("Clinic"));
    }

    let sql = format!("SELECT {} FROM devices WHERE id = ?", DEVICE_COLUMNS);
    let device = sqlx::query_as::<_, Device>(&sql)
        .bind(&id)
        .fetch_one(pool.get_ref())
        .await
        .map_err(server_error("device reload failed"))?;

    info!(device_id = %device.id, clinic_id, "Device registered");
    Ok(HttpResponse::Created().json(device))
}

pub async fn update_device(
    auth: AuthUser,
    id: web::Path<String>,
    payload: web::Json<Value>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ManageDevices)?;
    let tenant = auth.tenant()?;

    let update = build_update_sql(
        "devices",
        &payload,
        EDITABLE,
        "id",
        id.as_str(),
        Scope::Tenant(tenant),
    )?;

    let affected = execute_update(pool.get_ref(), update)
        .await
        .map_err(server_error("PUT /devices/{id} failed"))?;

    if affected == 0 {
        return Ok(not_found("Device"));
    }
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

pub async fn touch_last_seen(
    auth: AuthUser,
    id: web::Path<String>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ViewDevices)?;
    let tenant = auth.tenant()?;

    let result = sqlx::query("UPDATE devices SET last_seen_at = NOW() WHERE id = ? AND client_id = ?")
        .bind(id.as_str())
        .bind(tenant.get())
        .execute(pool.get_ref())
        .await
        .map_err(server_error("PUT /devices/{id}/last-seen failed"))?;

    if result.rows_affected() == 0 {
        return Ok(not_found("Device"));
    }
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

pub async fn delete_device(
    auth: AuthUser,
    id: web::Path<String>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ManageDevices)?;
    let tenant = auth.tenant()?;

    let result = sqlx::query("DELETE FROM devices WHERE id = ? AND client_id = ?")
        .bind(id.as_str())
        .bind(tenant.get())
        .execute(pool.get_ref())
        .await
        .map_err(server_error("DELETE /devices/{id} failed"))?;

    if result.rows_affected() == 0 {
        return Ok(not_found("Device"));
    }
    info!(device_id = %id, "Device deleted");
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}
