use crate::{
    auth::{
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::{CredentialEncoding, verify_password},
    },
    config::Config,
    model::{employee::HrEmployee, role::Role, user::User},
    models::{HrLoginReqDto, LoginReqDto, TokenSubject, TokenType},
};
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    access_token: String,
    refresh_token: String,
    #[schema(value_type = Object)]
    user: serde_json::Value,
}

/// Issues an access/refresh pair and records the refresh `jti`.
async fn issue_tokens(
    subject: &TokenSubject,
    pool: &MySqlPool,
    config: &Config,
) -> Result<(String, String), HttpResponse> {
    let access_token = generate_access_token(subject, &config.jwt_secret, config.access_token_ttl)
        .map_err(|e| {
            error!(error = %e, "Failed to sign access token");
            HttpResponse::InternalServerError().finish()
        })?;

    let (refresh_token, refresh_claims) =
        generate_refresh_token(subject, &config.jwt_secret, config.refresh_token_ttl).map_err(
            |e| {
                error!(error = %e, "Failed to sign refresh token");
                HttpResponse::InternalServerError().finish()
            },
        )?;

    debug!(
        user_id = subject.user_id,
        jti = %refresh_claims.jti,
        "Storing refresh token"
    );

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, role_id, jti, expires_at)
        VALUES (?, ?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(subject.user_id)
    .bind(subject.role)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(pool)
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to store refresh token");
        HttpResponse::InternalServerError().finish()
    })?;

    Ok((access_token, refresh_token))
}

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Staff login (admins, doctors, receptionists, platform super admins)
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Token pair issued", body = LoginResponse),
        (status = 400, description = "Email or password missing"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, payload),
    fields(email = %payload.email)
)]
pub async fn login(
    payload: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    info!("Login request received");

    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || payload.password.is_empty() {
        return HttpResponse::BadRequest().json(json!({"error": "Email and password required"}));
    }

    let user = match sqlx::query_as::<_, User>(
        r#"
        SELECT id, client_id, clinic_id, full_name, email, password, password_encoding,
               role_id, is_active
        FROM users
        WHERE email = ?
        "#,
    )
    .bind(&email)
    .fetch_optional(pool.get_ref())
    .await
    {
        Ok(Some(user)) => user,
        Ok(None) => {
            info!("Invalid credentials: user not found");
            return HttpResponse::Unauthorized().json(json!({"error": "Invalid credentials"}));
        }
        Err(e) => {
            error!(error = %e, "Database error while fetching user");
            return HttpResponse::InternalServerError().json(json!({"error": "Server error"}));
        }
    };

    if !user.is_active
        || !verify_password(&payload.password, &user.password, user.password_encoding)
    {
        info!(user_id = user.id, "Invalid credentials");
        return HttpResponse::Unauthorized().json(json!({"error": "Invalid credentials"}));
    }

    let Some(role) = Role::from_id(user.role_id) else {
        warn!(user_id = user.id, role_id = user.role_id, "User has unknown role");
        return HttpResponse::Unauthorized().json(json!({"error": "Invalid credentials"}));
    };

    let subject = TokenSubject {
        user_id: user.id,
        username: user.email.clone(),
        role: role.id(),
        client_id: user.client_id,
        hr_employee_id: None,
    };

    let (access_token, refresh_token) = match issue_tokens(&subject, &pool, &config).await {
        Ok(pair) => pair,
        Err(resp) => return resp,
    };

    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(user.id)
        .execute(pool.get_ref())
        .await
    {
        // not fatal for the login
        error!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = user.id, role = %role, "Login successful");

    HttpResponse::Ok().json(LoginResponse {
        access_token,
        refresh_token,
        user: json!({
            "id": user.id,
            "email": user.email,
            "fullName": user.full_name,
            "role": role,
            "clientId": user.client_id,
            "clinicId": user.clinic_id,
        }),
    })
}

/// HR employee login, scoped by the tenant slug
#[utoipa::path(
    post,
    path = "/auth/hr/login",
    request_body = HrLoginReqDto,
    responses(
        (status = 200, description = "Token pair issued", body = LoginResponse),
        (status = 401, description = "Invalid credentials or inactive account")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_hr_login",
    skip(pool, config, payload),
    fields(client_slug = %payload.client_slug, username = %payload.username)
)]
pub async fn hr_login(
    payload: web::Json<HrLoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    info!("HR login request received");

    let username = payload.username.trim().to_lowercase();
    if payload.client_slug.trim().is_empty() || username.is_empty() || payload.password.is_empty()
    {
        return HttpResponse::BadRequest()
            .json(json!({"error": "client_slug, username and password required"}));
    }

    let employee = match sqlx::query_as::<_, HrEmployee>(
        r#"
        SELECT e.id, e.client_id, e.full_name, e.username, e.password, e.password_encoding,
               e.phone, e.email, e.status, e.created_at, e.updated_at
        FROM hr_employees e
        JOIN clients c ON c.id = e.client_id
        WHERE c.slug = ? AND c.is_active = TRUE AND e.username = ?
        "#,
    )
    .bind(payload.client_slug.trim())
    .bind(&username)
    .fetch_optional(pool.get_ref())
    .await
    {
        Ok(Some(e)) => e,
        Ok(None) => {
            info!("Invalid credentials: employee not found");
            return HttpResponse::Unauthorized().json(json!({"error": "Invalid credentials"}));
        }
        Err(e) => {
            error!(error = %e, "Database error while fetching employee");
            return HttpResponse::InternalServerError().json(json!({"error": "Server error"}));
        }
    };

    if !employee.is_active() {
        info!(employee_id = employee.id, "Inactive employee tried to log in");
        return HttpResponse::Unauthorized().json(json!({"error": "Account is inactive"}));
    }

    if !verify_password(&payload.password, &employee.password, employee.password_encoding) {
        info!(employee_id = employee.id, "Invalid credentials: password mismatch");
        return HttpResponse::Unauthorized().json(json!({"error": "Invalid credentials"}));
    }

    if employee.password_encoding == CredentialEncoding::Plain {
        warn!(employee_id = employee.id, "Employee still has a plain-text password");
    }

    let subject = TokenSubject {
        user_id: employee.id,
        username: employee.username.clone(),
        role: Role::HrEmployee.id(),
        client_id: Some(employee.client_id),
        hr_employee_id: Some(employee.id),
    };

    let (access_token, refresh_token) = match issue_tokens(&subject, &pool, &config).await {
        Ok(pair) => pair,
        Err(resp) => return resp,
    };

    info!(employee_id = employee.id, "HR login successful");

    HttpResponse::Ok().json(LoginResponse {
        access_token,
        refresh_token,
        user: json!({
            "id": employee.id,
            "username": employee.username,
            "fullName": employee.full_name,
            "role": Role::HrEmployee,
            "clientId": employee.client_id,
            "hrEmployeeId": employee.id,
        }),
    })
}

/// Rotates a refresh token: the presented one is revoked, a new pair issued
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New token pair"),
        (status = 401, description = "Missing, invalid or revoked refresh token")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let Some(token) = bearer(&req) else {
        return HttpResponse::Unauthorized().json(json!({"error": "No token"}));
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) if c.token_type == TokenType::Refresh => c,
        _ => return HttpResponse::Unauthorized().finish(),
    };

    // revoke only if still live; zero rows means reused or unknown
    let revoked = match sqlx::query(
        "UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ? AND revoked = FALSE",
    )
    .bind(&claims.jti)
    .execute(pool.get_ref())
    .await
    {
        Ok(r) => r.rows_affected(),
        Err(e) => {
            error!(error = %e, "Failed to revoke refresh token");
            return HttpResponse::InternalServerError().finish();
        }
    };

    if revoked == 0 {
        warn!(jti = %claims.jti, "Refresh token reuse or unknown jti");
        return HttpResponse::Unauthorized().finish();
    }

    let subject = TokenSubject::from(&claims);
    match issue_tokens(&subject, &pool, &config).await {
        Ok((access_token, refresh_token)) => HttpResponse::Ok().json(json!({
            "access_token": access_token,
            "refresh_token": refresh_token
        })),
        Err(resp) => resp,
    }
}

/// Revokes the presented refresh token; always 204
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Logged out")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let Some(token) = bearer(&req) else {
        return HttpResponse::NoContent().finish();
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) if c.token_type == TokenType::Refresh => c,
        _ => return HttpResponse::NoContent().finish(),
    };

    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token on logout");
    }

    HttpResponse::NoContent().finish()
}
