use crate::{
    api::hr::{employees::EMPLOYEE_COLUMNS, local_now},
    auth::auth::AuthUser,
    hr::{error::HrError, store::MySqlHrStore, webauthn::BiometricCeremony},
    model::{employee::HrEmployee, role::Action},
};
use actix_web::{HttpResponse, web};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{info, instrument};

/// Begin passkey registration
#[utoipa::path(
    post,
    path = "/api/hr/webauthn/register/options",
    responses(
        (status = 200, description = "PublicKeyCredentialCreationOptions", body = Object),
        (status = 404, description = "Employee not found")
    ),
    tag = "HR WebAuthn",
    security(("bearer_auth" = []))
)]
pub async fn register_options(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    store: web::Data<MySqlHrStore>,
    ceremony: web::Data<BiometricCeremony>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::HrSelfService)?;
    let tenant = auth.tenant()?;
    let employee_id = auth.hr_employee_id()?;

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
        .filter(HrEmployee::is_active)
        .ok_or(HrError::NotFound)?;

    let options = ceremony
        .register_options(store.get_ref(), tenant, &employee, local_now())
        .await?;

    Ok(HttpResponse::Ok().json(options))
}

/// Finish passkey registration
#[utoipa::path(
    post,
    path = "/api/hr/webauthn/register/verify",
    request_body(content = Object, description = "RegistrationResponseJSON plus optional deviceName"),
    responses(
        (status = 200, description = "Registered", body = Object, example = json!({"verified": true})),
        (status = 400, description = "CHALLENGE_EXPIRED or VERIFICATION_FAILED")
    ),
    tag = "HR WebAuthn",
    security(("bearer_auth" = []))
)]
#[instrument(name = "hr_register_verify", skip_all, fields(employee_id = auth.hr_employee_id))]
pub async fn register_verify(
    auth: AuthUser,
    body: web::Json<Value>,
    store: web::Data<MySqlHrStore>,
    ceremony: web::Data<BiometricCeremony>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::HrSelfService)?;
    let tenant = auth.tenant()?;
    let employee_id = auth.hr_employee_id()?;

    ceremony
        .register_verify(store.get_ref(), tenant, employee_id, &body, local_now())
        .await?;

    info!("Biometric credential registered");
    Ok(HttpResponse::Ok().json(json!({ "verified": true })))
}

/// Begin a biometric assertion
#[utoipa::path(
    post,
    path = "/api/hr/webauthn/authenticate/options",
    responses(
        (status = 200, description = "PublicKeyCredentialRequestOptions", body = Object),
        (status = 400, description = "NO_BIOMETRIC")
    ),
    tag = "HR WebAuthn",
    security(("bearer_auth" = []))
)]
pub async fn authenticate_options(
    auth: AuthUser,
    store: web::Data<MySqlHrStore>,
    ceremony: web::Data<BiometricCeremony>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::HrSelfService)?;
    let tenant = auth.tenant()?;
    let employee_id = auth.hr_employee_id()?;

    let options = ceremony
        .authenticate_options(store.get_ref(), tenant, employee_id, local_now())
        .await?;

    Ok(HttpResponse::Ok().json(options))
}

/// Finish a biometric assertion
#[utoipa::path(
    post,
    path = "/api/hr/webauthn/authenticate/verify",
    request_body(content = Object, description = "AuthenticationResponseJSON"),
    responses(
        (status = 200, description = "Verified", body = Object, example = json!({"verified": true})),
        (status = 400, description = "CHALLENGE_EXPIRED, CREDENTIAL_NOT_FOUND or VERIFICATION_FAILED")
    ),
    tag = "HR WebAuthn",
    security(("bearer_auth" = []))
)]
#[instrument(name = "hr_authenticate_verify", skip_all, fields(employee_id = auth.hr_employee_id))]
pub async fn authenticate_verify(
    auth: AuthUser,
    body: web::Json<Value>,
    store: web::Data<MySqlHrStore>,
    ceremony: web::Data<BiometricCeremony>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::HrSelfService)?;
    let tenant = auth.tenant()?;
    let employee_id = auth.hr_employee_id()?;

    ceremony
        .authenticate_verify(store.get_ref(), tenant, employee_id, &body, local_now())
        .await?;

    info!("Biometric assertion verified");
    Ok(HttpResponse::Ok().json(json!({ "verified": true })))
}
