pub mod appointments;
pub mod clients;
pub mod clinics;
pub mod device_results;
pub mod devices;
pub mod hr;
pub mod invoices;
pub mod patients;
pub mod reports;
pub mod users;

use actix_web::{HttpResponse, error::InternalError};
use serde_json::json;
use tracing::error;

/// Logs a store failure and answers with the generic 500 body.
pub fn server_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> actix_web::Error {
    move |e| {
        error!(error = %e, "{}", context);
        InternalError::from_response(
            e,
            HttpResponse::InternalServerError().json(json!({"error": "Server error"})),
        )
        .into()
    }
}

pub fn not_found(what: &str) -> HttpResponse {
    HttpResponse::NotFound().json(json!({ "error": format!("{} not found", what) }))
}

pub fn bad_request(message: &str) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({ "error": message }))
}
