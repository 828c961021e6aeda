use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde_json::json;

/// Failures of the attendance core. Each kind has a stable machine code
/// (`code()`) and a human message (`Display`).
#[derive(Debug, Display)]
pub enum HrError {
    #[display(fmt = "No clinic location configured. Ask admin to set clinic location.")]
    NoClinicLocation,
    #[display(fmt = "You are {}m from {}. Max allowed: {}m.", distance, clinic_name, limit)]
    OutsideRange {
        distance: u32,
        limit: u32,
        clinic_name: String,
    },
    #[display(fmt = "Register biometrics first")]
    NoBiometric,
    #[display(fmt = "Already checked in today")]
    AlreadyCheckedIn,
    #[display(fmt = "Already checked out today")]
    AlreadyCheckedOut,
    #[display(fmt = "Must check in first")]
    NotCheckedIn,
    #[display(fmt = "Challenge expired")]
    ChallengeExpired,
    #[display(fmt = "Credential not found")]
    CredentialNotFound,
    #[display(fmt = "Biometric verification failed")]
    VerificationFailed,
    #[display(fmt = "Location is required")]
    GpsRequired,
    #[display(fmt = "{}", _0)]
    Invalid(String),
    #[display(fmt = "Employee not found")]
    NotFound,
    #[display(fmt = "Server error")]
    Database(sqlx::Error),
    #[display(fmt = "Server error")]
    Internal(String),
}

impl HrError {
    pub fn code(&self) -> &'static str {
        match self {
            HrError::NoClinicLocation => "NO_CLINIC_LOCATION",
            HrError::OutsideRange { .. } => "OUTSIDE_RANGE",
            HrError::NoBiometric => "NO_BIOMETRIC",
            HrError::AlreadyCheckedIn => "ALREADY_CHECKED_IN",
            HrError::AlreadyCheckedOut => "ALREADY_CHECKED_OUT",
            HrError::NotCheckedIn => "NOT_CHECKED_IN",
            HrError::ChallengeExpired => "CHALLENGE_EXPIRED",
            HrError::CredentialNotFound => "CREDENTIAL_NOT_FOUND",
            HrError::VerificationFailed => "VERIFICATION_FAILED",
            HrError::GpsRequired => "GPS_REQUIRED",
            HrError::Invalid(_) => "INVALID_INPUT",
            HrError::NotFound => "NOT_FOUND",
            HrError::Database(_) | HrError::Internal(_) => "SERVER_ERROR",
        }
    }
}

impl From<sqlx::Error> for HrError {
    fn from(e: sqlx::Error) -> Self {
        HrError::Database(e)
    }
}

impl ResponseError for HrError {
    fn status_code(&self) -> StatusCode {
        match self {
            HrError::AlreadyCheckedIn | HrError::AlreadyCheckedOut => StatusCode::CONFLICT,
            HrError::NotFound => StatusCode::NOT_FOUND,
            HrError::Database(_) | HrError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            HrError::Database(e) => {
                tracing::error!(error = %e, "HR store failure");
                json!({ "error": "Server error" })
            }
            HrError::Internal(e) => {
                tracing::error!(error = %e, "HR internal failure");
                json!({ "error": "Server error" })
            }
            HrError::OutsideRange { distance, .. } => json!({
                "error": self.code(),
                "message": self.to_string(),
                "distance": distance,
            }),
            _ => json!({ "error": self.code(), "message": self.to_string() }),
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn outside_range_reports_distance() {
        let err = HrError::OutsideRange {
            distance: 240,
            limit: 100,
            clinic_name: "Main".into(),
        };
        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "OUTSIDE_RANGE");
        assert_eq!(value["distance"], 240);
        assert_eq!(value["message"], "You are 240m from Main. Max allowed: 100m.");
    }

    #[actix_web::test]
    async fn store_failures_are_generic() {
        let resp = HrError::Database(sqlx::Error::RowNotFound).error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({ "error": "Server error" }));
    }

    #[test]
    fn state_conflicts_are_409() {
        assert_eq!(HrError::AlreadyCheckedIn.status_code(), StatusCode::CONFLICT);
        assert_eq!(HrError::AlreadyCheckedOut.status_code(), StatusCode::CONFLICT);
        assert_eq!(HrError::NotCheckedIn.status_code(), StatusCode::BAD_REQUEST);
    }
}
