use crate::{
    api::{bad_request, not_found, server_error},
    auth::auth::AuthUser,
    model::{
        invoice::{Invoice, generated_invoice_id},
        role::Action,
    },
    utils::db_utils::{Scope, build_update_sql, execute_update, is_duplicate_key},
};
use actix_web::{HttpResponse, web};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::MySqlPool;
use sqlx::types::Json;
use tracing::info;
use utoipa::ToSchema;

const INVOICE_COLUMNS: &str = "id, client_id, visit_id, patient_id, patient_name, items, \
     total_amount, paid_amount, payment_method, status, created_at, created_by, updated_at, \
     updated_by, is_archived";

/// Both spellings are accepted for every editable field.
const EDITABLE: &[(&str, &str)] = &[
    ("items", "items"),
    ("totalAmount", "total_amount"),
    ("total_amount", "total_amount"),
    ("paidAmount", "paid_amount"),
    ("paid_amount", "paid_amount"),
    ("paymentMethod", "payment_method"),
    ("payment_method", "payment_method"),
    ("status", "status"),
];

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoice {
    pub id: Option<String>,
    #[serde(alias = "visit_id")]
    pub visit_id: Option<String>,
    #[serde(alias = "patient_id")]
    pub patient_id: Option<u64>,
    #[serde(alias = "patient_name", default)]
    pub patient_name: String,
    #[schema(value_type = Vec<Object>)]
    #[serde(default)]
    pub items: Vec<Value>,
    #[serde(alias = "total_amount", default)]
    pub total_amount: f64,
    #[serde(alias = "paid_amount", default)]
    pub paid_amount: f64,
    #[serde(alias = "payment_method")]
    pub payment_method: Option<String>,
    pub status: Option<String>,
}

pub async fn list_invoices(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::ViewInvoices)?;
    let tenant = auth.tenant_filter()?;

    let sql = format!(
        "SELECT {} FROM invoices WHERE (? IS NULL OR client_id = ?) ORDER BY created_at DESC",
        INVOICE_COLUMNS
    );
    let invoices = sqlx::query_as::<_, Invoice>(&sql)
        .bind(tenant)
        .bind(tenant)
        .fetch_all(pool.get_ref())
        .await
        .map_err(server_error("GET /invoices failed"))?;

    Ok(HttpResponse::Ok().json(invoices))
}

pub async fn create_invoice(
    auth: AuthUser,
    payload: web::Json<CreateInvoice>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::EditInvoices)?;
    let tenant = auth.tenant()?;

    let id = payload
        .id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| generated_invoice_id(Utc::now()));

    let result = sqlx::query(
        r#"
        INSERT INTO invoices (
            id, client_id, visit_id, patient_id, patient_name, items,
            total_amount, paid_amount, payment_method, status,
            created_by, updated_by, is_archived
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, FALSE)
        "#,
    )
    .bind(&id)
    .bind(tenant.get())
    .bind(payload.visit_id.as_deref())
    .bind(payload.patient_id)
    .bind(&payload.patient_name)
    .bind(Json(&payload.items))
    .bind(payload.total_amount)
    .bind(payload.paid_amount)
    .bind(payload.payment_method.as_deref().unwrap_or("cash"))
    .bind(payload.status.as_deref().unwrap_or("unpaid"))
    .bind(&auth.username)
    .bind(&auth.username)
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(_) => {}
        Err(e) if is_duplicate_key(&e) => {
            return Ok(HttpResponse::Conflict().json(json!({"error": "Invoice id already exists"})));
        }
        Err(e) => return Err(server_error("POST /invoices failed")(e)),
    }

    let sql = format!("SELECT {} FROM invoices WHERE id = ?", INVOICE_COLUMNS);
    let invoice = sqlx::query_as::<_, Invoice>(&sql)
        .bind(&id)
        .fetch_one(pool.get_ref())
        .await
        .map_err(server_error("invoice reload failed"))?;

    info!(invoice_id = %invoice.id, %tenant, "Invoice created");
    Ok(HttpResponse::Created().json(invoice))
}

pub async fn update_invoice(
    auth: AuthUser,
    id: web::Path<String>,
    payload: web::Json<Value>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::EditInvoices)?;
    let tenant = auth.tenant()?;

    let update = build_update_sql(
        "invoices",
        &payload,
        EDITABLE,
        "id",
        id.as_str(),
        Scope::Tenant(tenant),
    )?;

    let affected = execute_update(pool.get_ref(), update)
        .await
        .map_err(server_error("PUT /invoices/{id} failed"))?;

    if affected == 0 {
        return Ok(not_found("Invoice"));
    }
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

pub async fn delete_invoice(
    auth: AuthUser,
    id: web::Path<String>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require(Action::DeleteInvoices)?;
    let tenant = auth.tenant_filter()?;

    if id.trim().is_empty() {
        return Ok(bad_request("invoice id required"));
    }

    let result = sqlx::query("DELETE FROM invoices WHERE id = ? AND (? IS NULL OR client_id = ?)")
        .bind(id.as_str())
        .bind(tenant)
        .bind(tenant)
        .execute(pool.get_ref())
        .await
        .map_err(server_error("DELETE /invoices/{id} failed"))?;

    if result.rows_affected() == 0 {
        return Ok(not_found("Invoice"));
    }
    info!(invoice_id = %id, "Invoice deleted");
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}
