use crate::{
    api::not_found,
    auth::auth::AuthUser,
    config::Config,
    hr::error::HrError,
    model::role::Action,
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct LocationUpdate {
    /// Defaults to the tenant's first clinic.
    pub clinic_id: Option<u64>,
    #[schema(example = 31.9539)]
    pub latitude: Option<f64>,
    #[schema(example = 35.9106)]
    pub longitude: Option<f64>,
    #[schema(example = 100)]
    pub allowed_radius_meters: Option<u32>,
}

impl LocationUpdate {
    fn coordinates(&self) -> Result<(f64, f64), HrError> {
        let (Some(lat), Some(lng)) = (self.latitude, self.longitude) else {
            return Err(HrError::Invalid("latitude and longitude required".into()));
        };
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return Err(HrError::Invalid("coordinates out of range".into()));
        }
        Ok((lat, lng))
    }
}

#[derive(Debug, Serialize, ToSchema, sqlx::FromRow)]
pub struct ClinicPin {
    pub id: u64,
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub allowed_radius_meters: u32,
}

/// Set a clinic's geo-fence
#[utoipa::path(
    patch,
    path = "/api/hr/clinic/location",
    request_body = LocationUpdate,
    responses(
        (status = 200, description = "Location saved", body = Object, example = json!({
            "clinic_id": 1, "latitude": 31.9539, "longitude": 35.9106, "allowed_radius_meters": 100
        })),
        (status = 400, description = "Missing or invalid coordinates"),
        (status = 404, description = "Clinic not found")
    ),
    tag = "HR",
    security(("bearer_auth" = []))
)]
pub async fn update_location(
    auth: AuthUser,
    payload: web::Json<LocationUpdate>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ManageHr)?;
    let tenant = auth.tenant()?;

    let (latitude, longitude) = payload.coordinates()?;
    let radius = payload
        .allowed_radius_meters
        .unwrap_or(config.default_radius_meters);

    let target = match payload.clinic_id {
        Some(id) => Some(id),
        None => sqlx::query_scalar::<_, u64>(
            "SELECT id FROM clinics WHERE client_id = ? ORDER BY id LIMIT 1",
        )
        .bind(tenant.get())
        .fetch_optional(pool.get_ref())
        .await
        .map_err(HrError::from)?,
    };
    let Some(clinic_id) = target else {
        return Ok(not_found("Clinic"));
    };

    let result = sqlx::query(
        r#"
        UPDATE clinics
        SET latitude = ?, longitude = ?, allowed_radius_meters = ?, location_updated_at = NOW()
        WHERE id = ? AND client_id = ?
        "#,
    )
    .bind(latitude)
    .bind(longitude)
    .bind(radius)
    .bind(clinic_id)
    .bind(tenant.get())
    .execute(pool.get_ref())
    .await
    .map_err(HrError::from)?;

    if result.rows_affected() == 0 {
        return Ok(not_found("Clinic"));
    }

    info!(clinic_id, latitude, longitude, radius, %tenant, "Clinic location updated");

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "clinic_id": clinic_id,
        "latitude": latitude,
        "longitude": longitude,
        "allowed_radius_meters": radius,
    })))
}

/// Locations of the tenant's clinics
#[utoipa::path(
    get,
    path = "/api/hr/clinic/location",
    responses((status = 200, description = "Clinic pins", body = [ClinicPin])),
    tag = "HR",
    security(("bearer_auth" = []))
)]
pub async fn list_locations(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ViewClinicLocations)?;
    let tenant = auth.tenant()?;

    let pins = sqlx::query_as::<_, ClinicPin>(
        r#"
        SELECT id, name, latitude, longitude, allowed_radius_meters
        FROM clinics
        WHERE client_id = ?
        ORDER BY id
        "#,
    )
    .bind(tenant.get())
    .fetch_all(pool.get_ref())
    .await
    .map_err(HrError::from)?;

    Ok(HttpResponse::Ok().json(pins))
}
