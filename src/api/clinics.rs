use crate::{
    api::{bad_request, server_error},
    auth::auth::AuthUser,
    config::Config,
    model::{clinic::Clinic, role::Action},
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateClinic {
    #[schema(example = "Downtown Branch")]
    pub name: String,
    #[serde(rename = "type")]
    pub clinic_type: Option<String>,
    pub phone: Option<String>,
}

const CLINIC_COLUMNS: &str =
    "id, client_id, name, type, phone, latitude, longitude, allowed_radius_meters";

pub async fn list_clinics(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ViewClinics)?;
    let tenant = auth.tenant()?;

    let sql = format!(
        "SELECT {} FROM clinics WHERE client_id = ? ORDER BY id ASC",
        CLINIC_COLUMNS
    );
    let clinics = sqlx::query_as::<_, Clinic>(&sql)
        .bind(tenant.get())
        .fetch_all(pool.get_ref())
        .await
        .map_err(server_error("GET /clinics failed"))?;

    Ok(HttpResponse::Ok().json(clinics))
}

pub async fn create_clinic(
    auth: AuthUser,
    payload: web::Json<CreateClinic>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ManageClinics)?;
    let tenant = auth.tenant()?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Ok(bad_request("name required"));
    }

    let result = sqlx::query(
        "INSERT INTO clinics (client_id, name, type, phone, allowed_radius_meters) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(tenant.get())
    .bind(name)
    .bind(payload.clinic_type.as_deref())
    .bind(payload.phone.as_deref())
    .bind(config.default_radius_meters)
    .execute(pool.get_ref())
    .await
    .map_err(server_error("POST /clinics failed"))?;

    let clinic = Clinic {
        id: result.last_insert_id(),
        client_id: tenant.get(),
        name: name.to_string(),
        clinic_type: payload.clinic_type.clone(),
        phone: payload.phone.clone(),
        latitude: None,
        longitude: None,
        allowed_radius_meters: config.default_radius_meters,
    };

    info!(clinic_id = clinic.id, %tenant, "Clinic created");
    Ok(HttpResponse::Created().json(clinic))
}
