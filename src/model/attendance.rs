use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AttendanceStatus {
    /// Checked in on a day the schedule does not list.
    Weekend,
    /// Checked in, not yet out.
    Incomplete,
    Normal,
    Late,
}

impl TryFrom<String> for AttendanceStatus {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One row per employee per work-date.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct AttendanceRecord {
    pub id: u64,
    pub client_id: u64,
    pub employee_id: u64,
    pub work_date: NaiveDate,
    pub check_in: Option<NaiveDateTime>,
    pub check_in_lat: Option<f64>,
    pub check_in_lng: Option<f64>,
    pub device_info: Option<String>,
    pub check_out: Option<NaiveDateTime>,
    pub check_out_lat: Option<f64>,
    pub check_out_lng: Option<f64>,
    pub total_minutes: u32,
    pub late_minutes: u32,
    pub early_leave_minutes: u32,
    pub overtime_minutes: u32,
    #[sqlx(try_from = "String")]
    pub status: AttendanceStatus,
}

/// Day entry as returned by listings and monthly reports.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceDay {
    #[schema(example = "2026-03-02", format = "date", value_type = String)]
    pub work_date: NaiveDate,
    #[schema(format = "date-time", value_type = String, nullable = true)]
    pub check_in: Option<NaiveDateTime>,
    #[schema(format = "date-time", value_type = String, nullable = true)]
    pub check_out: Option<NaiveDateTime>,
    pub total_minutes: u32,
    pub late_minutes: u32,
    pub early_leave_minutes: u32,
    pub overtime_minutes: u32,
    pub status: AttendanceStatus,
}

impl From<&AttendanceRecord> for AttendanceDay {
    fn from(r: &AttendanceRecord) -> Self {
        Self {
            work_date: r.work_date,
            check_in: r.check_in,
            check_out: r.check_out,
            total_minutes: r.total_minutes,
            late_minutes: r.late_minutes,
            early_leave_minutes: r.early_leave_minutes,
            overtime_minutes: r.overtime_minutes,
            status: r.status,
        }
    }
}
