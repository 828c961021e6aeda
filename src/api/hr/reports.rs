use crate::{
    auth::auth::AuthUser,
    hr::{
        error::HrError,
        report::{MonthlyReport, month_bounds, monthly_report},
        store::ATTENDANCE_COLUMNS,
    },
    model::{attendance::AttendanceRecord, role::Action, tenant::TenantId},
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::MySqlPool;

#[derive(Debug, Deserialize)]
pub struct MonthlyQuery {
    pub employee_id: Option<u64>,
    pub month: Option<String>,
}

fn month_query() -> String {
    format!(
        "SELECT {} FROM hr_attendance \
         WHERE client_id = ? AND employee_id = ? AND work_date BETWEEN ? AND ? \
         ORDER BY work_date",
        ATTENDANCE_COLUMNS
    )
}

async fn build(
    pool: &MySqlPool,
    tenant: TenantId,
    employee_id: u64,
    month: &str,
) -> Result<MonthlyReport, HrError> {
    let (first, last) = month_bounds(month)?;

    let sql = month_query();
    let records = sqlx::query_as::<_, AttendanceRecord>(&sql)
        .bind(tenant.get())
        .bind(employee_id)
        .bind(first)
        .bind(last)
        .fetch_all(pool)
        .await?;

    Ok(monthly_report(month, employee_id, &records))
}

/// Monthly attendance; employees only ever get their own
#[utoipa::path(
    get,
    path = "/api/hr/reports/monthly",
    params(
        ("employee_id", Query, description = "Required for admins; ignored for employees"),
        ("month", Query, description = "YYYY-MM")
    ),
    responses(
        (status = 200, description = "Per-day rows and summary", body = MonthlyReport),
        (status = 400, description = "employee_id and month (YYYY-MM) required")
    ),
    tag = "HR Reports",
    security(("bearer_auth" = []))
)]
pub async fn monthly(
    auth: AuthUser,
    query: web::Query<MonthlyQuery>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ViewMonthlyReport)?;
    let tenant = auth.tenant()?;

    let employee_id = match auth.hr_employee_id {
        Some(own) => Some(own),
        None => query.employee_id,
    };
    let (Some(employee_id), Some(month)) = (employee_id, query.month.as_deref()) else {
        return Err(HrError::Invalid("employee_id and month (YYYY-MM) required".into()).into());
    };

    let report = build(&pool, tenant, employee_id, month).await?;
    Ok(HttpResponse::Ok().json(report))
}

/// Monthly attendance of the signed-in employee
#[utoipa::path(
    get,
    path = "/api/hr/reports/my-monthly",
    params(("month", Query, description = "YYYY-MM")),
    responses(
        (status = 200, description = "Per-day rows and summary", body = MonthlyReport),
        (status = 400, description = "month (YYYY-MM) required")
    ),
    tag = "HR Reports",
    security(("bearer_auth" = []))
)]
pub async fn my_monthly(
    auth: AuthUser,
    query: web::Query<MonthlyQuery>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::HrSelfService)?;
    let tenant = auth.tenant()?;
    let employee_id = auth.hr_employee_id()?;

    let Some(month) = query.month.as_deref() else {
        return Err(HrError::Invalid("month (YYYY-MM) required".into()).into());
    };

    let report = build(&pool, tenant, employee_id, month).await?;
    Ok(HttpResponse::Ok().json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_query_reads_the_store_row_shape() {
        let sql = month_query();
        assert!(sql.starts_with(&format!("SELECT {} FROM hr_attendance", ATTENDANCE_COLUMNS)));
        assert!(sql.contains("client_id = ? AND employee_id = ?"));
        assert_eq!(sql.matches('?').count(), 4);
    }
}
