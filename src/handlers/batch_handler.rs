//! handlers/batch_handler.rs
use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::{
    handlers::{error_response, error_status},
    models::{
        batch_model::{ApiResponse, BatchRequest},
        error_model::ServiceError,
        operation_model::CreateOperationRequest,
    },
    services::{batch_service::BatchService, operation_service::OperationService},
};

/// POST /api/batches
pub async fn submit_batch_endpoint(
    body: web::Json<BatchRequest>,
    batch_service: web::Data<BatchService>,
    operation_service: web::Data<OperationService>,
) -> HttpResponse {
    let req_body = body.into_inner();

    // Crear la operación
    let create_op_req = CreateOperationRequest {
        channel: req_body.channel.to_string(),
        is_draft: req_body.is_draft,
    };

    let op_id = match operation_service.create_operation(create_op_req).await {
        Ok(id) => id,
        Err(e) => {
            log::error!("(submit_batch_endpoint) Error creando operación: {:?}", e);
            return error_response(&ServiceError::Persistence(format!(
                "operation creation failed: {:#}",
                e
            )));
        }
    };

    // Asíncrono o síncrono
    if req_body.async_send {
        // el resultado queda en el historial de operaciones
        batch_service.spawn_batch(op_id.clone(), req_body);

        HttpResponse::Accepted().json(
            ApiResponse::ok("Batch queued for async processing", serde_json::Value::Null)
                .with_operation(&op_id),
        )
    } else {
        match batch_service.process_batch(&op_id, req_body).await {
            Ok(summary) => HttpResponse::Ok().json(
                ApiResponse::ok("Batch processed", json!(summary)).with_operation(&op_id),
            ),
            Err(e) => HttpResponse::build(error_status(&e))
                .json(ApiResponse::from_error(&e).with_operation(&op_id)),
        }
    }
}
