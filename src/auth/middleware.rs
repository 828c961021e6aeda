use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::config::Config;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    http::header::{AUTHORIZATION, HeaderMap},
    web::Data,
};
use serde_json::{Value, json};
use tracing::debug;

/// Token from `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Result<&str, &'static str> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or("Missing Authorization header")?
        .to_str()
        .map_err(|_| "Invalid Authorization header encoding")?;

    match value.strip_prefix("Bearer ").map(str::trim) {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err("Authorization header must start with Bearer"),
    }
}

fn reject(req: ServiceRequest, body: Value) -> ServiceResponse<BoxBody> {
    let resp = HttpResponse::Unauthorized().json(body);
    req.into_response(resp.map_into_boxed_body())
}

/// Resolves the caller for every route under the protected scope.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?;

    let claims = match bearer_token(req.headers()) {
        Ok(token) => verify_token(token, &config.jwt_secret),
        Err(reason) => return Ok(reject(req, json!({ "error": reason }))),
    };

    let auth_user = match claims.map(AuthUser::try_from) {
        Ok(Ok(user)) => user,
        Ok(Err(reason)) => return Ok(reject(req, json!({ "error": reason }))),
        Err(e) => {
            return Ok(reject(
                req,
                json!({ "error": "Invalid or expired token", "details": e }),
            ));
        }
    };

    debug!(
        user_id = auth_user.user_id,
        role = %auth_user.role,
        client_id = ?auth_user.client_id,
        "Authenticated request"
    );

    req.extensions_mut().insert(auth_user);

    next.call(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::header::HeaderValue;

    fn headers(value: &'static str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(AUTHORIZATION, HeaderValue::from_static(value));
        map
    }

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")), Ok("abc.def"));
    }

    #[test]
    fn rejects_missing_or_foreign_schemes() {
        assert_eq!(
            bearer_token(&HeaderMap::new()),
            Err("Missing Authorization header")
        );
        assert!(bearer_token(&headers("Basic dXNlcjpwYXNz")).is_err());
        assert!(bearer_token(&headers("Bearer ")).is_err());
    }
}
