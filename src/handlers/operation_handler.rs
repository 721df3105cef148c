//! handlers/operation_handler.rs
use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::{
    handlers::error_response,
    models::{batch_model::ApiResponse, error_model::ServiceError},
    services::operation_service::OperationService,
};

#[derive(Deserialize)]
pub struct PaginationQuery {
    page: Option<u64>,
    page_size: Option<u64>,
}

fn history_error(e: anyhow::Error) -> HttpResponse {
    log::error!("(operation_handler) Error consultando historial: {:?}", e);
    error_response(&ServiceError::Persistence(format!(
        "operation history: {:#}",
        e
    )))
}

/// GET /api/operations
pub async fn list_operations_endpoint(
    op_service: web::Data<OperationService>,
    query: web::Query<PaginationQuery>,
) -> HttpResponse {
    let page = query.page.unwrap_or(1);
    let page_size = query.page_size.unwrap_or(10);

    match op_service.list_operations(page, page_size).await {
        Ok(list) => HttpResponse::Ok().json(list),
        Err(e) => history_error(e),
    }
}

/// GET /api/operations/{id}
pub async fn get_operation_endpoint(
    op_service: web::Data<OperationService>,
    path: web::Path<String>,
) -> HttpResponse {
    let op_id = path.into_inner();

    match op_service.find_operation(&op_id).await {
        Ok(Some(op_record)) => HttpResponse::Ok().json(op_record),
        Ok(None) => HttpResponse::NotFound().json(
            ApiResponse::failure(format!("operation {} not found", op_id)).with_operation(&op_id),
        ),
        Err(e) => history_error(e),
    }
}
