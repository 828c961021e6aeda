use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Appointment {
    pub id: u64,
    pub client_id: u64,
    pub clinic_id: Option<u64>,
    pub patient_id: u64,
    pub doctor_id: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: String,
    pub updated_by: Option<u64>,
}

/// Statuses that free the doctor's slot.
pub const RELEASED_STATUSES: [&str; 2] = ["cancelled", "no_show"];

/// Half-open `[start, end)` intervals; back-to-back slots do not overlap.
pub fn slots_overlap(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    other_start: DateTime<Utc>,
    other_end: DateTime<Utc>,
) -> bool {
    start < other_end && end > other_start
}

impl Appointment {
    /// Whether this booking keeps `[start, end)` from being booked again.
    pub fn blocks(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        !RELEASED_STATUSES.contains(&self.status.as_str())
            && slots_overlap(start, end, self.start_time, self.end_time)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAppointment {
    #[schema(example = 12)]
    pub patient_id: u64,
    #[schema(example = 3)]
    pub doctor_id: u64,
    #[schema(example = "2026-03-02T09:00:00Z", format = "date-time", value_type = String)]
    pub start_time: DateTime<Utc>,
    #[schema(example = "2026-03-02T09:30:00Z", format = "date-time", value_type = String)]
    pub end_time: DateTime<Utc>,
}

impl CreateAppointment {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.end_time <= self.start_time {
            return Err("end_time must be after start_time");
        }
        Ok(())
    }
}
