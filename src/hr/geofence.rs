use crate::hr::error::HrError;
use crate::model::clinic::ClinicLocation;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoMatch<'a> {
    pub clinic: &'a ClinicLocation,
    pub distance: f64,
}

/// Great-circle distance in metres.
pub fn haversine(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lng = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos()
            * b.latitude.to_radians().cos()
            * (d_lng / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_M * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Checks `point` against the clinics in listing order. The first clinic
/// whose radius contains the point wins, even when a later one is nearer.
///
/// A miss reports the distance to the first listed clinic and its radius.
pub fn evaluate(point: GeoPoint, clinics: &[ClinicLocation]) -> Result<GeoMatch<'_>, HrError> {
    let first = clinics.first().ok_or(HrError::NoClinicLocation)?;

    for clinic in clinics {
        let distance = haversine(point, clinic.point());
        if distance <= f64::from(clinic.allowed_radius_meters) {
            return Ok(GeoMatch { clinic, distance });
        }
    }

    Err(HrError::OutsideRange {
        distance: haversine(point, first.point()).round() as u32,
        limit: first.allowed_radius_meters,
        clinic_name: first.name.clone(),
    })
}

impl ClinicLocation {
    pub fn point(&self) -> GeoPoint {
        GeoPoint {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}
