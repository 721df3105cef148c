//! handlers/account_handler.rs
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::{
    handlers::error_response,
    models::batch_model::ApiResponse,
    services::{account_service::AccountService, quota_service::QuotaService},
};

#[derive(Deserialize)]
pub struct CreditRequest {
    pub amount: u64,
}

#[derive(Deserialize)]
pub struct ActiveRequest {
    pub active: bool,
}

fn client_email(path: web::Path<String>) -> String {
    path.into_inner().trim().to_lowercase()
}

/// GET /api/accounts/{email}/balance
pub async fn get_balance_endpoint(
    path: web::Path<String>,
    quota: web::Data<QuotaService>,
) -> HttpResponse {
    let email = client_email(path);
    match quota.current_balance(&email).await {
        Ok(balance) => HttpResponse::Ok().json(ApiResponse::ok(
            "Balance retrieved",
            json!({ "email": email, "balance": balance }),
        )),
        Err(e) => error_response(&e),
    }
}

/// POST /api/accounts/{email}/tokens
pub async fn credit_tokens_endpoint(
    path: web::Path<String>,
    body: web::Json<CreditRequest>,
    quota: web::Data<QuotaService>,
) -> HttpResponse {
    let email = client_email(path);
    match quota.credit(&email, body.amount).await {
        Ok(balance) => HttpResponse::Ok().json(ApiResponse::ok(
            format!("{} tokens credited", body.amount),
            json!({ "email": email, "balance": balance }),
        )),
        Err(e) => error_response(&e),
    }
}

/// POST /api/accounts/{email}/active
pub async fn set_active_endpoint(
    path: web::Path<String>,
    body: web::Json<ActiveRequest>,
    quota: web::Data<QuotaService>,
) -> HttpResponse {
    let email = client_email(path);
    match quota.set_active(&email, body.active).await {
        Ok(()) => HttpResponse::Ok().json(ApiResponse::ok(
            "Account updated",
            json!({ "email": email, "active": body.active }),
        )),
        Err(e) => error_response(&e),
    }
}

/// POST /api/accounts/{email}/verification
pub async fn send_verification_endpoint(
    path: web::Path<String>,
    account_service: web::Data<AccountService>,
) -> HttpResponse {
    let email = client_email(path);
    match account_service.request_verification(&email).await {
        Ok(attempts) => HttpResponse::Ok().json(ApiResponse::ok(
            "Verification email sent",
            json!({ "email": email, "attempts": attempts }),
        )),
        Err(e) => error_response(&e),
    }
}
