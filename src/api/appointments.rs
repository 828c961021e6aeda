use crate::{
    api::{bad_request, not_found, server_error},
    auth::auth::AuthUser,
    model::{
        appointment::{Appointment, CreateAppointment},
        role::{Action, Role},
    },
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

const APPOINTMENT_COLUMNS: &str =
    "id, client_id, clinic_id, patient_id, doctor_id, start_time, end_time, status, updated_by";

pub const STATUSES: &[&str] = &["scheduled", "confirmed", "completed", "cancelled", "no_show"];

#[derive(Deserialize)]
pub struct DayQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Deserialize, ToSchema)]
pub struct StatusUpdate {
    #[schema(example = "completed")]
    pub status: String,
}

/// Doctors only ever see their own bookings.
fn doctor_filter(auth: &AuthUser) -> Option<u64> {
    auth.is_doctor().then_some(auth.user_id)
}

async fn list_where(
    auth: &AuthUser,
    pool: &MySqlPool,
    window: &str,
    date: Option<NaiveDate>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ViewAppointments)?;
    let tenant = auth.tenant()?;
    let doctor = doctor_filter(auth);

    let sql = format!(
        r#"
        SELECT {}
        FROM appointments
        WHERE client_id = ?
          AND (? IS NULL OR doctor_id = ?)
          AND {}
        ORDER BY start_time
        "#,
        APPOINTMENT_COLUMNS, window
    );

    let mut query = sqlx::query_as::<_, Appointment>(&sql)
        .bind(tenant.get())
        .bind(doctor)
        .bind(doctor);
    if let Some(d) = date {
        query = query.bind(d);
    }

    let rows = query
        .fetch_all(pool)
        .await
        .map_err(server_error("appointment listing failed"))?;

    Ok(HttpResponse::Ok().json(rows))
}

pub async fn today(auth: AuthUser, pool: web::Data<MySqlPool>) -> actix_web::Result<HttpResponse> {
    list_where(&auth, &pool, "DATE(start_time) = CURDATE()", None).await
}

pub async fn week(auth: AuthUser, pool: web::Data<MySqlPool>) -> actix_web::Result<HttpResponse> {
    list_where(
        &auth,
        &pool,
        "start_time >= CURDATE() AND start_time < CURDATE() + INTERVAL 7 DAY",
        None,
    )
    .await
}

pub async fn day(
    auth: AuthUser,
    query: web::Query<DayQuery>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    let Some(date) = query.date else {
        return Ok(bad_request("date required"));
    };
    list_where(&auth, &pool, "DATE(start_time) = ?", Some(date)).await
}

/// Books a slot; the doctor row is locked so overlapping bookings serialize
pub async fn create_appointment(
    auth: AuthUser,
    payload: web::Json<CreateAppointment>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::CreateAppointment)?;
    let tenant = auth.tenant()?;

    if let Err(msg) = payload.validate() {
        return Ok(bad_request(msg));
    }

    let mut tx = pool
        .begin()
        .await
        .map_err(server_error("appointment tx begin failed"))?;

    let doctor = sqlx::query_scalar::<_, u64>(
        "SELECT id FROM users WHERE id = ? AND client_id = ? AND role_id = ? FOR UPDATE",
    )
    .bind(payload.doctor_id)
    .bind(tenant.get())
    .bind(Role::Doctor.id())
    .fetch_optional(&mut *tx)
    .await
    .map_err(server_error("doctor lookup failed"))?;
    if doctor.is_none() {
        return Ok(not_found("Doctor"));
    }

    let patient = sqlx::query_scalar::<_, u64>("SELECT id FROM patients WHERE id = ? AND client_id = ?")
        .bind(payload.patient_id)
        .bind(tenant.get())
        .fetch_optional(&mut *tx)
        .await
        .map_err(server_error("patient lookup failed"))?;
    if patient.is_none() {
        return Ok(not_found("Patient"));
    }

    // status and boundary rules live in Appointment::blocks
    let sql = format!(
        "SELECT {} FROM appointments WHERE doctor_id = ? AND end_time > ? AND start_time < ?",
        APPOINTMENT_COLUMNS
    );
    let existing = sqlx::query_as::<_, Appointment>(&sql)
        .bind(payload.doctor_id)
        .bind(payload.start_time)
        .bind(payload.end_time)
        .fetch_all(&mut *tx)
        .await
        .map_err(server_error("overlap check failed"))?;

    if existing
        .iter()
        .any(|a| a.blocks(payload.start_time, payload.end_time))
    {
        return Ok(HttpResponse::Conflict().json(json!({"error": "Doctor already booked"})));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO appointments (client_id, clinic_id, patient_id, doctor_id, start_time, end_time, status, updated_by)
        VALUES (?, (SELECT clinic_id FROM users WHERE id = ?), ?, ?, ?, ?, 'scheduled', ?)
        "#,
    )
    .bind(tenant.get())
    .bind(payload.doctor_id)
    .bind(payload.patient_id)
    .bind(payload.doctor_id)
    .bind(payload.start_time)
    .bind(payload.end_time)
    .bind(auth.user_id)
    .execute(&mut *tx)
    .await
    .map_err(server_error("POST /appointments failed"))?;

    let sql = format!("SELECT {} FROM appointments WHERE id = ?", APPOINTMENT_COLUMNS);
    let appointment = sqlx::query_as::<_, Appointment>(&sql)
        .bind(result.last_insert_id())
        .fetch_one(&mut *tx)
        .await
        .map_err(server_error("appointment reload failed"))?;

    tx.commit()
        .await
        .map_err(server_error("appointment tx commit failed"))?;

    info!(appointment_id = appointment.id, doctor_id = appointment.doctor_id, "Appointment booked");
    Ok(HttpResponse::Created().json(appointment))
}

pub async fn update_status(
    auth: AuthUser,
    id: web::Path<u64>,
    payload: web::Json<StatusUpdate>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::UpdateAppointmentStatus)?;
    let tenant = auth.tenant()?;

    let status = payload.status.trim();
    if !STATUSES.contains(&status) {
        return Ok(bad_request("Unknown appointment status"));
    }

    let result = sqlx::query(
        "UPDATE appointments SET status = ?, updated_by = ? WHERE id = ? AND client_id = ?",
    )
    .bind(status)
    .bind(auth.user_id)
    .bind(*id)
    .bind(tenant.get())
    .execute(pool.get_ref())
    .await
    .map_err(server_error("PUT /appointments/{id}/status failed"))?;

    if result.rows_affected() == 0 {
        return Ok(not_found("Appointment"));
    }
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}
