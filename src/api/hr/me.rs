use crate::{
    api::hr::{employees::EMPLOYEE_COLUMNS, local_now},
    auth::auth::AuthUser,
    hr::{
        error::HrError,
        schedule::resolve_for_date,
        store::{AttendanceStore, MySqlHrStore},
    },
    model::{
        attendance::AttendanceDay, employee::HrEmployee, role::Action, schedule::ScheduleView,
    },
};
use actix_web::{HttpResponse, web};
use serde::Serialize;
use sqlx::MySqlPool;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub id: u64,
    pub full_name: String,
    pub username: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub status: String,
    pub bio_registered: bool,
    pub bio_count: u64,
    pub schedule: Option<ScheduleView>,
    pub today_attendance: Option<AttendanceDay>,
}

/// The signed-in employee's profile, schedule and today's record
#[utoipa::path(
    get,
    path = "/api/hr/me",
    responses(
        (status = 200, description = "Profile", body = MeResponse),
        (status = 404, description = "Employee not found")
    ),
    tag = "HR",
    security(("bearer_auth" = []))
)]
pub async fn get_me(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    store: web::Data<MySqlHrStore>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::HrSelfService)?;
    let tenant = auth.tenant()?;
    let employee_id = auth.hr_employee_id()?;
    let today = local_now().date();

    let sql = format!(
        "SELECT {} FROM hr_employees WHERE id = ? AND client_id = ?",
        EMPLOYEE_COLUMNS
    );
    let employee = sqlx::query_as::<_, HrEmployee>(&sql)
        .bind(employee_id)
        .bind(tenant.get())
        .fetch_optional(pool.get_ref())
        .await
        .map_err(HrError::from)?
        .ok_or(HrError::NotFound)?;

    let schedules = store.schedules_for_employee(tenant, employee_id).await?;
    let bio_count = store.credential_count(tenant, employee_id).await?;
    let today_record = store.attendance_for_date(tenant, employee_id, today).await?;

    Ok(HttpResponse::Ok().json(MeResponse {
        id: employee.id,
        full_name: employee.full_name,
        username: employee.username,
        phone: employee.phone,
        email: employee.email,
        status: employee.status,
        bio_registered: bio_count > 0,
        bio_count,
        schedule: resolve_for_date(&schedules, today).map(ScheduleView::from),
        today_attendance: today_record.as_ref().map(AttendanceDay::from),
    }))
}
