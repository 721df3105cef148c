//! handlers/mod.rs
//! Módulo que agrupa los distintos handlers (lotes, operaciones, cuentas, reportes, logs).

use actix_web::{http::StatusCode, HttpResponse};

use crate::models::{
    batch_model::ApiResponse,
    error_model::{ErrorKind, QuotaReason, ServiceError},
};

pub mod account_handler;
pub mod batch_handler;
pub mod log_handler;
pub mod operation_handler;
pub mod report_handler;

/// Código HTTP según el tipo de error.
pub fn error_status(err: &ServiceError) -> StatusCode {
    match err.kind() {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Quota if err.quota_reason() == Some(QuotaReason::AccountNotFound) => {
            StatusCode::NOT_FOUND
        }
        ErrorKind::Quota => StatusCode::PAYMENT_REQUIRED,
        ErrorKind::FeatureDisabled => StatusCode::FORBIDDEN,
        ErrorKind::Credential | ErrorKind::Correlation => StatusCode::BAD_GATEWAY,
        ErrorKind::Dispatch | ErrorKind::Persistence => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Traduce un `ServiceError` a la respuesta HTTP estructurada.
pub fn error_response(err: &ServiceError) -> HttpResponse {
    HttpResponse::build(error_status(err)).json(ApiResponse::from_error(err))
}
