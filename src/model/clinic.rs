use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Clinic {
    pub id: u64,
    pub client_id: u64,
    pub name: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub clinic_type: Option<String>,
    pub phone: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub allowed_radius_meters: u32,
}

/// A clinic whose geo-fence is configured.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow, ToSchema)]
pub struct ClinicLocation {
    pub clinic_id: u64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub allowed_radius_meters: u32,
}

impl Clinic {
    /// `None` until an admin has set both coordinates.
    pub fn location(&self) -> Option<ClinicLocation> {
        Some(ClinicLocation {
            clinic_id: self.id,
            name: self.name.clone(),
            latitude: self.latitude?,
            longitude: self.longitude?,
            allowed_radius_meters: self.allowed_radius_meters,
        })
    }
}
