use std::collections::HashMap;

use crate::{
    api::hr::local_now,
    auth::{
        auth::AuthUser,
        password::{CredentialEncoding, generate_password, hash_password},
    },
    hr::{
        error::HrError,
        schedule::{PriorSchedule, ScheduleDraft, ScheduleInput, plan_schedule_change, resolve_for_date},
    },
    model::{
        employee::{EmployeeView, HrEmployee},
        role::Action,
        schedule::{ScheduleView, WorkSchedule},
        tenant::TenantId,
    },
    utils::{db_utils::is_duplicate_key, username_cache, username_filter},
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::types::Json;
use sqlx::{MySql, MySqlPool, Transaction};
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

pub(crate) const EMPLOYEE_COLUMNS: &str = "id, client_id, full_name, username, password, \
     password_encoding, phone, email, status, created_at, updated_at";

const SCHEDULE_COLUMNS: &str = "id, client_id, employee_id, work_days, start_time, end_time, \
     grace_minutes, overtime_enabled, effective_from, effective_to";

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateHrEmployee {
    #[schema(example = "Lina Haddad")]
    pub full_name: String,
    #[schema(example = "lina")]
    pub username: String,
    pub password: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    #[serde(flatten)]
    pub schedule: ScheduleInput,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateHrEmployee {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    #[schema(example = "active")]
    pub status: Option<String>,
    /// Any schedule field starts a new schedule slice.
    #[serde(flatten)]
    pub schedule: ScheduleInput,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ResetPassword {
    /// Generated when absent.
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UsernameQuery {
    pub username: String,
}

fn normalize_username(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// true => available, false => taken
pub async fn is_username_available(
    tenant: TenantId,
    username: &str,
    pool: &MySqlPool,
) -> Result<bool, HrError> {
    // cuckoo filter: a miss means never seen
    if !username_filter::might_exist(tenant, username) {
        return Ok(true);
    }

    // moka cache: a hit means taken
    if username_cache::is_taken(tenant, username).await {
        return Ok(false);
    }

    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM hr_employees WHERE client_id = ? AND username = ?)",
    )
    .bind(tenant.get())
    .bind(username)
    .fetch_one(pool)
    .await?;

    if exists {
        username_cache::mark_taken(tenant, username).await;
    }
    Ok(!exists)
}

async fn insert_schedule(
    tx: &mut Transaction<'_, MySql>,
    tenant: TenantId,
    employee_id: u64,
    draft: &ScheduleDraft,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO hr_work_schedules
            (client_id, employee_id, work_days, start_time, end_time, grace_minutes,
             overtime_enabled, effective_from, effective_to)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, NULL)
        "#,
    )
    .bind(tenant.get())
    .bind(employee_id)
    .bind(Json(&draft.work_days))
    .bind(draft.start_time)
    .bind(draft.end_time)
    .bind(draft.grace_minutes)
    .bind(draft.overtime_enabled)
    .bind(draft.effective_from)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Closes or supersedes the open slice and writes the new one.
async fn replace_schedule(
    tx: &mut Transaction<'_, MySql>,
    tenant: TenantId,
    employee_id: u64,
    draft: &ScheduleDraft,
) -> Result<(), HrError> {
    let sql = format!(
        "SELECT {} FROM hr_work_schedules \
         WHERE client_id = ? AND employee_id = ? AND effective_to IS NULL FOR UPDATE",
        SCHEDULE_COLUMNS
    );
    let open = sqlx::query_as::<_, WorkSchedule>(&sql)
        .bind(tenant.get())
        .bind(employee_id)
        .fetch_optional(&mut **tx)
        .await?;

    match plan_schedule_change(open.as_ref(), draft.effective_from)? {
        PriorSchedule::Untouched => {}
        PriorSchedule::Close { id, effective_to } => {
            sqlx::query("UPDATE hr_work_schedules SET effective_to = ? WHERE id = ?")
                .bind(effective_to)
                .bind(id)
                .execute(&mut **tx)
                .await?;
        }
        PriorSchedule::Supersede { id } => {
            sqlx::query("DELETE FROM hr_work_schedules WHERE id = ?")
                .bind(id)
                .execute(&mut **tx)
                .await?;
        }
    }

    insert_schedule(tx, tenant, employee_id, draft).await?;
    Ok(())
}

/// List HR employees with today's schedule
#[utoipa::path(
    get,
    path = "/api/hr/employees",
    responses((status = 200, description = "Employees of the tenant", body = [EmployeeView])),
    tag = "HR",
    security(("bearer_auth" = []))
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ManageHr)?;
    let tenant = auth.tenant()?;
    let today = local_now().date();

    let sql = format!(
        "SELECT {} FROM hr_employees WHERE client_id = ? ORDER BY created_at DESC",
        EMPLOYEE_COLUMNS
    );
    let employees = sqlx::query_as::<_, HrEmployee>(&sql)
        .bind(tenant.get())
        .fetch_all(pool.get_ref())
        .await
        .map_err(HrError::from)?;

    let sql = format!(
        "SELECT {} FROM hr_work_schedules \
         WHERE client_id = ? AND effective_from <= ? AND (effective_to IS NULL OR effective_to >= ?)",
        SCHEDULE_COLUMNS
    );
    let schedules = sqlx::query_as::<_, WorkSchedule>(&sql)
        .bind(tenant.get())
        .bind(today)
        .bind(today)
        .fetch_all(pool.get_ref())
        .await
        .map_err(HrError::from)?;

    let bio: HashMap<u64, i64> = sqlx::query_as::<_, (u64, i64)>(
        "SELECT employee_id, COUNT(*) FROM hr_biometric_credentials WHERE client_id = ? GROUP BY employee_id",
    )
    .bind(tenant.get())
    .fetch_all(pool.get_ref())
    .await
    .map_err(HrError::from)?
    .into_iter()
    .collect();

    let mut by_employee: HashMap<u64, Vec<WorkSchedule>> = HashMap::new();
    for s in schedules {
        by_employee.entry(s.employee_id).or_default().push(s);
    }

    let views: Vec<EmployeeView> = employees
        .into_iter()
        .map(|e| {
            let schedule = by_employee
                .get(&e.id)
                .and_then(|slices| resolve_for_date(slices, today))
                .map(ScheduleView::from);
            EmployeeView {
                bio_registered: bio.get(&e.id).is_some_and(|n| *n > 0),
                schedule,
                id: e.id,
                client_id: e.client_id,
                full_name: e.full_name,
                username: e.username,
                phone: e.phone,
                email: e.email,
                status: e.status,
                created_at: e.created_at,
                updated_at: e.updated_at,
            }
        })
        .collect();

    Ok(HttpResponse::Ok().json(views))
}

/// Create an HR employee with an initial schedule
#[utoipa::path(
    post,
    path = "/api/hr/employees",
    request_body = CreateHrEmployee,
    responses(
        (status = 201, description = "Employee created", body = Object, example = json!({"id": 7, "username": "lina"})),
        (status = 400, description = "Missing fields or invalid schedule"),
        (status = 409, description = "Username already exists for this client")
    ),
    tag = "HR",
    security(("bearer_auth" = []))
)]
#[instrument(name = "hr_create_employee", skip(auth, payload, pool), fields(username = %payload.username))]
pub async fn create_employee(
    auth: AuthUser,
    payload: web::Json<CreateHrEmployee>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ManageHr)?;
    let tenant = auth.tenant()?;
    let payload = payload.into_inner();

    let username = normalize_username(&payload.username);
    if payload.full_name.trim().is_empty() || username.is_empty() || payload.password.is_empty() {
        return Err(HrError::Invalid("full_name, username, password required".into()).into());
    }

    let draft = payload.schedule.into_draft(local_now().date())?;

    if !is_username_available(tenant, &username, &pool).await? {
        return Ok(HttpResponse::Conflict()
            .json(json!({"error": "Username already exists for this client"})));
    }

    let hashed =
        hash_password(&payload.password).map_err(|e| HrError::Internal(e.to_string()))?;

    let mut tx = pool.begin().await.map_err(HrError::from)?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO hr_employees (client_id, full_name, username, password, password_encoding, phone, email, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, 'active')
        "#,
    )
    .bind(tenant.get())
    .bind(payload.full_name.trim())
    .bind(&username)
    .bind(&hashed)
    .bind(CredentialEncoding::Hashed.as_ref())
    .bind(payload.phone.as_deref())
    .bind(payload.email.as_deref())
    .execute(&mut *tx)
    .await;

    let employee_id = match inserted {
        Ok(r) => r.last_insert_id(),
        Err(e) if is_duplicate_key(&e) => {
            username_cache::mark_taken(tenant, &username).await;
            return Ok(HttpResponse::Conflict()
                .json(json!({"error": "Username already exists for this client"})));
        }
        Err(e) => return Err(HrError::from(e).into()),
    };

    insert_schedule(&mut tx, tenant, employee_id, &draft)
        .await
        .map_err(HrError::from)?;
    tx.commit().await.map_err(HrError::from)?;

    username_filter::insert(tenant, &username);
    username_cache::mark_taken(tenant, &username).await;

    info!(employee_id, %tenant, "HR employee created");
    Ok(HttpResponse::Created().json(json!({ "id": employee_id, "username": username })))
}

/// Update an employee; schedule fields start a new schedule slice
#[utoipa::path(
    put,
    path = "/api/hr/employees/{id}",
    params(("id", Path, description = "Employee ID")),
    request_body = UpdateHrEmployee,
    responses(
        (status = 200, description = "Updated"),
        (status = 400, description = "Invalid status or schedule"),
        (status = 404, description = "Employee not found")
    ),
    tag = "HR",
    security(("bearer_auth" = []))
)]
pub async fn update_employee(
    auth: AuthUser,
    id: web::Path<u64>,
    payload: web::Json<UpdateHrEmployee>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ManageHr)?;
    let tenant = auth.tenant()?;
    let employee_id = id.into_inner();
    let payload = payload.into_inner();

    if let Some(status) = payload.status.as_deref() {
        if !matches!(status, "active" | "inactive") {
            return Err(HrError::Invalid("status must be active or inactive".into()).into());
        }
    }

    let draft = if payload.schedule.is_empty() {
        None
    } else {
        Some(payload.schedule.into_draft(local_now().date())?)
    };

    let mut tx = pool.begin().await.map_err(HrError::from)?;

    let updated = sqlx::query(
        r#"
        UPDATE hr_employees SET
            full_name = COALESCE(?, full_name),
            phone = COALESCE(?, phone),
            email = COALESCE(?, email),
            status = COALESCE(?, status),
            updated_at = NOW()
        WHERE id = ? AND client_id = ?
        "#,
    )
    .bind(payload.full_name.as_deref().map(str::trim))
    .bind(payload.phone.as_deref())
    .bind(payload.email.as_deref())
    .bind(payload.status.as_deref())
    .bind(employee_id)
    .bind(tenant.get())
    .execute(&mut *tx)
    .await
    .map_err(HrError::from)?;

    if updated.rows_affected() == 0 {
        return Err(HrError::NotFound.into());
    }

    if let Some(draft) = draft {
        debug!(employee_id, from = %draft.effective_from, "Replacing schedule");
        replace_schedule(&mut tx, tenant, employee_id, &draft).await?;
    }

    tx.commit().await.map_err(HrError::from)?;

    info!(employee_id, %tenant, "HR employee updated");
    Ok(HttpResponse::Ok().json(json!({ "message": "Updated" })))
}

/// Soft-deactivate an employee
#[utoipa::path(
    delete,
    path = "/api/hr/employees/{id}",
    params(("id", Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Deactivated"),
        (status = 404, description = "Employee not found")
    ),
    tag = "HR",
    security(("bearer_auth" = []))
)]
pub async fn deactivate_employee(
    auth: AuthUser,
    id: web::Path<u64>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ManageHr)?;
    let tenant = auth.tenant()?;

    let result = sqlx::query(
        "UPDATE hr_employees SET status = 'inactive', updated_at = NOW() WHERE id = ? AND client_id = ?",
    )
    .bind(*id)
    .bind(tenant.get())
    .execute(pool.get_ref())
    .await
    .map_err(HrError::from)?;

    if result.rows_affected() == 0 {
        return Err(HrError::NotFound.into());
    }
    info!(employee_id = *id, %tenant, "HR employee deactivated");
    Ok(HttpResponse::Ok().json(json!({ "message": "Deactivated" })))
}

/// Reset a password and return it once
#[utoipa::path(
    post,
    path = "/api/hr/employees/{id}/reset-password",
    params(("id", Path, description = "Employee ID")),
    request_body = ResetPassword,
    responses(
        (status = 200, description = "New password", body = Object, example = json!({"password": "q3Zp_x9A"})),
        (status = 404, description = "Employee not found")
    ),
    tag = "HR",
    security(("bearer_auth" = []))
)]
pub async fn reset_password(
    auth: AuthUser,
    id: web::Path<u64>,
    payload: Option<web::Json<ResetPassword>>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ManageHr)?;
    let tenant = auth.tenant()?;

    let password = payload
        .and_then(|p| p.into_inner().password)
        .filter(|p| !p.is_empty())
        .unwrap_or_else(generate_password);
    let hashed = hash_password(&password).map_err(|e| HrError::Internal(e.to_string()))?;

    let result = sqlx::query(
        r#"
        UPDATE hr_employees SET password = ?, password_encoding = ?, updated_at = NOW()
        WHERE id = ? AND client_id = ?
        "#,
    )
    .bind(&hashed)
    .bind(CredentialEncoding::Hashed.as_ref())
    .bind(*id)
    .bind(tenant.get())
    .execute(pool.get_ref())
    .await
    .map_err(HrError::from)?;

    if result.rows_affected() == 0 {
        return Err(HrError::NotFound.into());
    }
    info!(employee_id = *id, "HR employee password reset");
    Ok(HttpResponse::Ok().json(json!({ "password": password })))
}

/// Check whether a username is still free in this tenant
#[utoipa::path(
    get,
    path = "/api/hr/employees/username-available",
    params(("username", Query, description = "Username to check")),
    responses((status = 200, description = "Availability", body = Object, example = json!({"available": true}))),
    tag = "HR",
    security(("bearer_auth" = []))
)]
pub async fn username_available(
    auth: AuthUser,
    query: web::Query<UsernameQuery>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ManageHr)?;
    let tenant = auth.tenant()?;

    let username = normalize_username(&query.username);
    if username.is_empty() {
        return Err(HrError::Invalid("username required".into()).into());
    }

    let available = is_username_available(tenant, &username, &pool).await?;
    Ok(HttpResponse::Ok().json(json!({ "available": available })))
}
