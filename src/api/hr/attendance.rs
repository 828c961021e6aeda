use crate::{
    api::hr::local_now,
    auth::auth::AuthUser,
    hr::{
        error::HrError,
        session::{AttendanceSession, Punch},
        store::MySqlHrStore,
    },
    model::{attendance::AttendanceStatus, role::Action},
};
use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::instrument;
use utoipa::ToSchema;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PunchRequest {
    #[schema(example = 31.9539)]
    pub latitude: Option<f64>,
    #[schema(example = 35.9106)]
    pub longitude: Option<f64>,
    #[schema(example = "iPhone 15 / Safari")]
    pub device_info: Option<String>,
}

impl From<PunchRequest> for Punch {
    fn from(p: PunchRequest) -> Self {
        Punch {
            latitude: p.latitude,
            longitude: p.longitude,
            device_info: p.device_info,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AttendanceQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub employee_id: Option<u64>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceListing {
    pub id: u64,
    pub employee_id: u64,
    pub employee_name: String,
    #[schema(format = "date", value_type = String)]
    pub work_date: NaiveDate,
    #[schema(format = "date-time", value_type = String, nullable = true)]
    pub check_in: Option<NaiveDateTime>,
    #[schema(format = "date-time", value_type = String, nullable = true)]
    pub check_out: Option<NaiveDateTime>,
    pub total_minutes: u32,
    pub late_minutes: u32,
    pub early_leave_minutes: u32,
    pub overtime_minutes: u32,
    #[sqlx(try_from = "String")]
    pub status: AttendanceStatus,
}

fn iso(at: NaiveDateTime) -> String {
    at.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Geo-fenced check-in for the signed-in employee
#[utoipa::path(
    post,
    path = "/api/hr/attendance/check-in",
    request_body = PunchRequest,
    responses(
        (status = 200, description = "Checked in", body = Object, example = json!({
            "message": "Checked in", "time": "2026-03-02T09:05:00", "clinicName": "Downtown"
        })),
        (status = 400, description = "GPS_REQUIRED, NO_CLINIC_LOCATION, OUTSIDE_RANGE or NO_BIOMETRIC", body = Object, example = json!({
            "error": "OUTSIDE_RANGE", "message": "You are 250m from Downtown. Max allowed: 100m.", "distance": 250
        })),
        (status = 409, description = "ALREADY_CHECKED_IN")
    ),
    tag = "HR Attendance",
    security(("bearer_auth" = []))
)]
#[instrument(name = "hr_check_in", skip_all, fields(employee_id = auth.hr_employee_id))]
pub async fn check_in(
    auth: AuthUser,
    payload: web::Json<PunchRequest>,
    store: web::Data<MySqlHrStore>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::HrSelfService)?;
    let tenant = auth.tenant()?;
    let employee_id = auth.hr_employee_id()?;

    let punch = Punch::from(payload.into_inner());
    let done = AttendanceSession::new(store.get_ref(), tenant)
        .check_in(employee_id, &punch, local_now())
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Checked in",
        "time": iso(done.at),
        "clinicName": done.clinic_name,
    })))
}

/// Geo-fenced check-out; computes the day's minutes
#[utoipa::path(
    post,
    path = "/api/hr/attendance/check-out",
    request_body = PunchRequest,
    responses(
        (status = 200, description = "Checked out", body = Object, example = json!({
            "message": "Checked out", "time": "2026-03-02T17:30:00",
            "totalMinutes": 505, "lateMinutes": 0, "overtimeMinutes": 30
        })),
        (status = 400, description = "GPS_REQUIRED, OUTSIDE_RANGE or NOT_CHECKED_IN"),
        (status = 409, description = "ALREADY_CHECKED_OUT")
    ),
    tag = "HR Attendance",
    security(("bearer_auth" = []))
)]
#[instrument(name = "hr_check_out", skip_all, fields(employee_id = auth.hr_employee_id))]
pub async fn check_out(
    auth: AuthUser,
    payload: web::Json<PunchRequest>,
    store: web::Data<MySqlHrStore>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::HrSelfService)?;
    let tenant = auth.tenant()?;
    let employee_id = auth.hr_employee_id()?;

    let punch = Punch::from(payload.into_inner());
    let done = AttendanceSession::new(store.get_ref(), tenant)
        .check_out(employee_id, &punch, local_now())
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Checked out",
        "time": iso(done.at),
        "totalMinutes": done.metrics.total_minutes,
        "lateMinutes": done.metrics.late_minutes,
        "overtimeMinutes": done.metrics.overtime_minutes,
    })))
}

/// Attendance rows of the tenant, optionally filtered
#[utoipa::path(
    get,
    path = "/api/hr/attendance",
    params(
        ("from", Query, description = "First work date (YYYY-MM-DD)"),
        ("to", Query, description = "Last work date (YYYY-MM-DD)"),
        ("employee_id", Query, description = "Only this employee"),
        ("status", Query, description = "weekend | incomplete | normal | late")
    ),
    responses((status = 200, description = "Attendance rows", body = [AttendanceListing])),
    tag = "HR Attendance",
    security(("bearer_auth" = []))
)]
pub async fn list_attendance(
    auth: AuthUser,
    query: web::Query<AttendanceQuery>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ManageHr)?;
    let tenant = auth.tenant()?;

    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(s) => Some(
            s.parse::<AttendanceStatus>()
                .map_err(|_| HrError::Invalid(format!("Unknown status: {}", s)))?,
        ),
        None => None,
    };
    let status = status.as_ref().map(AsRef::<str>::as_ref);

    let rows = sqlx::query_as::<_, AttendanceListing>(
        r#"
        SELECT a.id, a.employee_id, e.full_name AS employee_name, a.work_date, a.check_in,
               a.check_out, a.total_minutes, a.late_minutes, a.early_leave_minutes,
               a.overtime_minutes, a.status
        FROM hr_attendance a
        JOIN hr_employees e ON e.id = a.employee_id
        WHERE a.client_id = ?
          AND (? IS NULL OR a.work_date >= ?)
          AND (? IS NULL OR a.work_date <= ?)
          AND (? IS NULL OR a.employee_id = ?)
          AND (? IS NULL OR a.status = ?)
        ORDER BY a.work_date DESC, e.full_name
        "#,
    )
    .bind(tenant.get())
    .bind(query.from)
    .bind(query.from)
    .bind(query.to)
    .bind(query.to)
    .bind(query.employee_id)
    .bind(query.employee_id)
    .bind(status)
    .bind(status)
    .fetch_all(pool.get_ref())
    .await
    .map_err(HrError::from)?;

    Ok(HttpResponse::Ok().json(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punch_request_maps_to_punch() {
        let req: PunchRequest = serde_json::from_value(json!({
            "latitude": 31.95,
            "longitude": 35.91,
            "device_info": "Pixel"
        }))
        .unwrap();
        let punch = Punch::from(req);
        assert_eq!(punch.latitude, Some(31.95));
        assert_eq!(punch.device_info.as_deref(), Some("Pixel"));
    }

    #[test]
    fn times_are_reported_without_offset() {
        let at = NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(9, 5, 0)
            .unwrap();
        assert_eq!(iso(at), "2026-03-02T09:05:00");
    }
}
