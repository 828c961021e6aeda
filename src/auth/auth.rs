use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::model::role::{Action, Role};
use crate::model::tenant::TenantId;
use crate::models::{Claims, TokenType};
use actix_web::{
    FromRequest, HttpMessage, HttpRequest,
    dev::Payload,
    error::{ErrorForbidden, ErrorUnauthorized},
    web::Data,
};
use futures::future::{Ready, ready};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Tenant; `None` only for platform super admins
    pub client_id: Option<u64>,
    /// Present only if this login belongs to an HR employee
    pub hr_employee_id: Option<u64>,
}

impl TryFrom<Claims> for AuthUser {
    type Error = &'static str;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        if claims.token_type != TokenType::Access {
            return Err("Access token required");
        }
        let role = Role::from_id(claims.role).ok_or("Invalid role")?;

        Ok(AuthUser {
            user_id: claims.user_id,
            username: claims.sub,
            role,
            client_id: claims.client_id,
            hr_employee_id: claims.hr_employee_id,
        })
    }
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // set by auth_middleware on protected scopes
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let token = match req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            Some(t) => t,
            None => return ready(Err(ErrorUnauthorized("Missing token"))),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => {
                return ready(Err(actix_web::error::ErrorInternalServerError(
                    "Config missing",
                )));
            }
        };

        let claims = match verify_token(token, &config.jwt_secret) {
            Ok(c) => c,
            Err(_) => return ready(Err(ErrorUnauthorized("Invalid token"))),
        };

        ready(AuthUser::try_from(claims).map_err(ErrorUnauthorized))
    }
}

impl AuthUser {
    /// Consults the capability table once for this request.
    pub fn require(&self, action: Action) -> actix_web::Result<()> {
        if self.role.permits(action) {
            Ok(())
        } else {
            Err(ErrorForbidden("Forbidden"))
        }
    }

    /// Tenant scope for every tenant-bound query.
    pub fn tenant(&self) -> actix_web::Result<TenantId> {
        self.client_id
            .map(TenantId::new)
            .ok_or_else(|| ErrorForbidden("Tenant context required"))
    }

    /// Nullable tenant filter: super admins without a tenant see every row.
    pub fn tenant_filter(&self) -> actix_web::Result<Option<u64>> {
        if self.is_super_admin() {
            return Ok(self.client_id);
        }
        self.tenant().map(|t| Some(t.get()))
    }

    pub fn hr_employee_id(&self) -> actix_web::Result<u64> {
        self.hr_employee_id
            .ok_or_else(|| ErrorForbidden("HR employee login required"))
    }

    pub fn is_super_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }

    pub fn is_doctor(&self) -> bool {
        self.role == Role::Doctor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TokenSubject;

    fn claims(role: u8, token_type: TokenType) -> Claims {
        let subject = TokenSubject {
            user_id: 4,
            username: "sara".into(),
            role,
            client_id: Some(9),
            hr_employee_id: None,
        };
        Claims {
            user_id: subject.user_id,
            sub: subject.username,
            role: subject.role,
            exp: 0,
            jti: "j".into(),
            token_type,
            client_id: subject.client_id,
            hr_employee_id: subject.hr_employee_id,
        }
    }

    #[test]
    fn refresh_tokens_are_not_accepted_as_access() {
        assert!(AuthUser::try_from(claims(2, TokenType::Refresh)).is_err());
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(AuthUser::try_from(claims(42, TokenType::Access)).is_err());
    }

    #[test]
    fn require_consults_capabilities() {
        let user = AuthUser::try_from(claims(4, TokenType::Access)).unwrap();
        assert!(user.require(Action::CreatePatient).is_ok());
        assert!(user.require(Action::ManageHr).is_err());
        assert_eq!(user.tenant().unwrap(), TenantId::new(9));
        assert!(user.hr_employee_id().is_err());
    }

    #[test]
    fn super_admin_has_no_tenant() {
        let mut c = claims(1, TokenType::Access);
        c.client_id = None;
        let user = AuthUser::try_from(c).unwrap();
        assert!(user.is_super_admin());
        assert!(user.tenant().is_err());
        assert_eq!(user.tenant_filter().unwrap(), None);
    }

    #[test]
    fn tenant_filter_pins_regular_users() {
        let user = AuthUser::try_from(claims(3, TokenType::Access)).unwrap();
        assert_eq!(user.tenant_filter().unwrap(), Some(9));

        let mut c = claims(3, TokenType::Access);
        c.client_id = None;
        let orphan = AuthUser::try_from(c).unwrap();
        assert!(orphan.tenant_filter().is_err());
    }
}
