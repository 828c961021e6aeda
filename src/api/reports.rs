use crate::{
    api::{bad_request, server_error},
    auth::auth::AuthUser,
    model::role::Action,
};
use actix_web::{HttpResponse, web};
use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;

#[derive(Deserialize)]
pub struct RangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Inclusive `from..=to` as a half-open datetime window.
fn window(query: &RangeQuery) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let (from, to) = (query.from?, query.to?);
    if to < from {
        return None;
    }
    let end = to.checked_add_days(Days::new(1))?;
    Some((from.and_hms_opt(0, 0, 0)?, end.and_hms_opt(0, 0, 0)?))
}

#[derive(Serialize, sqlx::FromRow)]
pub struct DoctorLoad {
    pub doctor: String,
    pub total: i64,
}

#[derive(Serialize, sqlx::FromRow)]
pub struct Cancellations {
    pub status: String,
    pub total: i64,
}

#[derive(Serialize, sqlx::FromRow)]
pub struct PeakHour {
    pub hour: i64,
    pub total: i64,
}

const RANGE_REQUIRED: &str = "from and to (YYYY-MM-DD) required";

pub async fn doctor_load(
    auth: AuthUser,
    query: web::Query<RangeQuery>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ViewReports)?;
    let tenant = auth.tenant()?;
    let Some((from, to)) = window(&query) else {
        return Ok(bad_request(RANGE_REQUIRED));
    };

    let rows = sqlx::query_as::<_, DoctorLoad>(
        r#"
        SELECT u.full_name AS doctor, COUNT(a.id) AS total
        FROM appointments a
        JOIN users u ON u.id = a.doctor_id
        WHERE a.client_id = ? AND a.start_time >= ? AND a.start_time < ?
        GROUP BY u.id, u.full_name
        ORDER BY total DESC
        "#,
    )
    .bind(tenant.get())
    .bind(from)
    .bind(to)
    .fetch_all(pool.get_ref())
    .await
    .map_err(server_error("GET /reports/doctor-load failed"))?;

    Ok(HttpResponse::Ok().json(rows))
}

pub async fn cancellations(
    auth: AuthUser,
    query: web::Query<RangeQuery>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ViewReports)?;
    let tenant = auth.tenant()?;
    let Some((from, to)) = window(&query) else {
        return Ok(bad_request(RANGE_REQUIRED));
    };

    let rows = sqlx::query_as::<_, Cancellations>(
        r#"
        SELECT status, COUNT(*) AS total
        FROM appointments
        WHERE client_id = ?
          AND status IN ('cancelled', 'no_show')
          AND start_time >= ? AND start_time < ?
        GROUP BY status
        "#,
    )
    .bind(tenant.get())
    .bind(from)
    .bind(to)
    .fetch_all(pool.get_ref())
    .await
    .map_err(server_error("GET /reports/cancellations failed"))?;

    Ok(HttpResponse::Ok().json(rows))
}

pub async fn peak_hours(
    auth: AuthUser,
    query: web::Query<RangeQuery>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ViewReports)?;
    let tenant = auth.tenant()?;
    let Some((from, to)) = window(&query) else {
        return Ok(bad_request(RANGE_REQUIRED));
    };

    let rows = sqlx::query_as::<_, PeakHour>(
        r#"
        SELECT CAST(HOUR(start_time) AS SIGNED) AS hour, COUNT(*) AS total
        FROM appointments
        WHERE client_id = ? AND start_time >= ? AND start_time < ?
        GROUP BY hour
        ORDER BY total DESC
        "#,
    )
    .bind(tenant.get())
    .bind(from)
    .bind(to)
    .fetch_all(pool.get_ref())
    .await
    .map_err(server_error("GET /reports/peak-hours failed"))?;

    Ok(HttpResponse::Ok().json(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn window_includes_the_whole_last_day() {
        let q = RangeQuery { from: Some(date(1)), to: Some(date(7)) };
        let (from, to) = window(&q).unwrap();
        assert_eq!(from, date(1).and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(to, date(8).and_hms_opt(0, 0, 0).unwrap());
    }

    #[test]
    fn window_needs_both_ends_in_order() {
        assert!(window(&RangeQuery { from: Some(date(1)), to: None }).is_none());
        assert!(window(&RangeQuery { from: Some(date(9)), to: Some(date(1)) }).is_none());
    }
}
