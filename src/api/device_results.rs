use crate::{
    api::{bad_request, not_found, server_error},
    auth::auth::AuthUser,
    model::{
        device_result::{DeviceResult, PatientLookup, lookup_order},
        role::Action,
        tenant::TenantId,
    },
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, info};
use utoipa::ToSchema;
use uuid::Uuid;

const LIST_LIMIT: u32 = 200;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultQuery {
    pub status: Option<String>,
    pub patient_id: Option<u64>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResult {
    #[serde(alias = "device_id", default)]
    pub device_id: String,
    #[serde(alias = "patient_identifier", default)]
    pub patient_identifier: String,
    #[serde(alias = "test_code", default)]
    pub test_code: String,
    #[serde(alias = "test_name")]
    pub test_name: Option<String>,
    #[serde(default)]
    pub value: String,
    pub unit: Option<String>,
    #[serde(alias = "reference_range")]
    pub reference_range: Option<String>,
    #[serde(alias = "is_abnormal", default)]
    pub is_abnormal: bool,
    #[serde(alias = "raw_message")]
    pub raw_message: Option<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManualMatch {
    #[serde(alias = "patient_id")]
    pub patient_id: Option<u64>,
    #[serde(alias = "matched_by")]
    pub matched_by: Option<String>,
}

/// First patient of the tenant the identifier resolves to.
async fn auto_match(
    pool: &MySqlPool,
    tenant: TenantId,
    identifier: &str,
) -> Result<Option<u64>, sqlx::Error> {
    for lookup in lookup_order(identifier) {
        let sql = format!(
            "SELECT id FROM patients WHERE {} = ? AND client_id = ? LIMIT 1",
            lookup.column()
        );
        let query = sqlx::query_scalar::<_, u64>(&sql);
        let query = match lookup {
            PatientLookup::Id(id) => query.bind(id),
            PatientLookup::Phone(v) | PatientLookup::FullName(v) => query.bind(v),
        };

        if let Some(id) = query.bind(tenant.get()).fetch_optional(pool).await? {
            debug!(patient_id = id, by = lookup.column(), "Device result auto-matched");
            return Ok(Some(id));
        }
    }
    Ok(None)
}

pub async fn list_results(
    auth: AuthUser,
    query: web::Query<ResultQuery>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ViewDeviceResults)?;
    let tenant = auth.tenant()?;
    let status = query.status.as_deref().filter(|s| !s.is_empty());

    let results = sqlx::query_as::<_, DeviceResult>(
        r#"
        SELECT dr.id, dr.client_id, dr.device_id, d.name AS device_name, d.type AS device_type,
               dr.patient_identifier, dr.test_code, dr.test_name, dr.value, dr.unit,
               dr.reference_range, dr.is_abnormal, dr.raw_message, dr.status,
               dr.matched_patient_id, p.full_name AS patient_name, dr.matched_at,
               dr.matched_by, dr.error_message, dr.created_at
        FROM device_results dr
        LEFT JOIN devices d ON d.id = dr.device_id
        LEFT JOIN patients p ON p.id = dr.matched_patient_id
        WHERE dr.client_id = ?
          AND (? IS NULL OR dr.status = ?)
          AND (? IS NULL OR dr.matched_patient_id = ?)
        ORDER BY dr.created_at DESC
        LIMIT ?
        "#,
    )
    .bind(tenant.get())
    .bind(status)
    .bind(status)
    .bind(query.patient_id)
    .bind(query.patient_id)
    .bind(LIST_LIMIT)
    .fetch_all(pool.get_ref())
    .await
    .map_err(server_error("GET /device-results failed"))?;

    Ok(HttpResponse::Ok().json(results))
}

pub async fn pending_count(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ViewDeviceResults)?;
    let Some(tenant) = auth.client_id else {
        return Ok(HttpResponse::Ok().json(json!({ "count": 0 })));
    };

    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM device_results WHERE client_id = ? AND status = 'pending'",
    )
    .bind(tenant)
    .fetch_one(pool.get_ref())
    .await
    .map_err(server_error("GET /device-results/pending-count failed"))?;

    Ok(HttpResponse::Ok().json(json!({ "count": count })))
}

/// Stores a reading and tries to link it to a patient
pub async fn submit_result(
    auth: AuthUser,
    payload: web::Json<SubmitResult>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::SubmitDeviceResults)?;
    let tenant = auth.tenant()?;

    let identifier = payload.patient_identifier.trim();
    if payload.device_id.is_empty()
        || identifier.is_empty()
        || payload.test_code.is_empty()
        || payload.value.is_empty()
    {
        return Ok(bad_request(
            "deviceId, patientIdentifier, testCode, value required",
        ));
    }

    let device = sqlx::query_scalar::<_, String>("SELECT id FROM devices WHERE id = ? AND client_id = ?")
        .bind(&payload.device_id)
        .bind(tenant.get())
        .fetch_optional(pool.get_ref())
        .await
        .map_err(server_error("device lookup failed"))?;
    if device.is_none() {
        return Ok(not_found("Device"));
    }

    let matched = auto_match(&pool, tenant, identifier)
        .await
        .map_err(server_error("device result auto-match failed"))?;
    let status = if matched.is_some() { "matched" } else { "pending" };

    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO device_results (
            id, client_id, device_id, patient_identifier, test_code, test_name,
            value, unit, reference_range, is_abnormal, raw_message,
            status, matched_patient_id, matched_at, matched_by
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                IF(? IS NULL, NULL, NOW()), IF(? IS NULL, NULL, 'auto'))
        "#,
    )
    .bind(&id)
    .bind(tenant.get())
    .bind(&payload.device_id)
    .bind(identifier)
    .bind(&payload.test_code)
    .bind(payload.test_name.as_deref())
    .bind(&payload.value)
    .bind(payload.unit.as_deref())
    .bind(payload.reference_range.as_deref())
    .bind(payload.is_abnormal)
    .bind(payload.raw_message.as_deref())
    .bind(status)
    .bind(matched)
    .bind(matched)
    .bind(matched)
    .execute(pool.get_ref())
    .await
    .map_err(server_error("POST /device-results failed"))?;

    info!(result_id = %id, status, "Device result stored");

    Ok(HttpResponse::Created().json(json!({
        "id": id,
        "status": status,
        "matchedPatientId": matched,
    })))
}

pub async fn match_result(
    auth: AuthUser,
    id: web::Path<String>,
    payload: web::Json<ManualMatch>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ReviewDeviceResults)?;
    let tenant = auth.tenant()?;

    let Some(patient_id) = payload.patient_id else {
        return Ok(bad_request("patientId required"));
    };
    let by = payload.matched_by.as_deref().unwrap_or("manual");

    let result = sqlx::query(
        r#"
        UPDATE device_results
        SET status = 'matched', matched_patient_id = ?, matched_at = NOW(), matched_by = ?
        WHERE id = ? AND status = 'pending' AND client_id = ?
          AND EXISTS (SELECT 1 FROM patients WHERE id = ? AND client_id = ?)
        "#,
    )
    .bind(patient_id)
    .bind(by)
    .bind(id.as_str())
    .bind(tenant.get())
    .bind(patient_id)
    .bind(tenant.get())
    .execute(pool.get_ref())
    .await
    .map_err(server_error("PUT /device-results/{id}/match failed"))?;

    if result.rows_affected() == 0 {
        return Ok(not_found("Pending result or patient"));
    }
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

pub async fn reject_result(
    auth: AuthUser,
    id: web::Path<String>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ReviewDeviceResults)?;
    let tenant = auth.tenant()?;

    let result =
        sqlx::query("UPDATE device_results SET status = 'rejected' WHERE id = ? AND client_id = ?")
            .bind(id.as_str())
            .bind(tenant.get())
            .execute(pool.get_ref())
            .await
            .map_err(server_error("PUT /device-results/{id}/reject failed"))?;

    if result.rows_affected() == 0 {
        return Ok(not_found("Device result"));
    }
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}
