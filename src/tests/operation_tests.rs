//! tests/operation_tests.rs
//! Pruebas unitarias para `OperationService` (SQLite en memoria).

#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, test, web, App};
    use serde_json::json;

    use crate::handlers::operation_handler::get_operation_endpoint;
    use crate::models::operation_model::{CreateOperationRequest, OperationCompletion};
    use crate::services::operation_service::OperationService;
    use crate::tests::support::test_pool;

    async fn service() -> OperationService {
        let service = OperationService::new(test_pool().await);
        service.run_migrations().await.unwrap();
        // idempotente
        service.run_migrations().await.unwrap();
        service
    }

    #[actix_rt::test]
    async fn operation_lifecycle_is_recorded() {
        let service = service().await;

        let op_id = service
            .create_operation(CreateOperationRequest {
                channel: "sms".to_string(),
                is_draft: true,
            })
            .await
            .unwrap();
        let created = service.get_operation(&op_id).await.unwrap();
        assert_eq!(created.status, "pending");
        assert!(created.is_draft);
        assert_eq!(created.client_email, None);

        service
            .complete_operation(
                &op_id,
                &OperationCompletion {
                    client_email: "ana@example.com".to_string(),
                    recipient_count: 4,
                    sent_count: 3,
                    failed_count: 1,
                    log_file: Some("ana_sms_20240301-101500.txt".to_string()),
                },
            )
            .await
            .unwrap();

        let done = service.get_operation(&op_id).await.unwrap();
        assert_eq!(done.status, "done");
        assert_eq!(done.recipient_count, 4);
        assert_eq!(done.failed_count, 1);
        assert_eq!(done.log_file.as_deref(), Some("ana_sms_20240301-101500.txt"));
        assert!(done.updated_at >= done.created_at);
    }

    #[actix_rt::test]
    async fn failures_keep_their_message() {
        let service = service().await;
        let op_id = service
            .create_operation(CreateOperationRequest {
                channel: "email".to_string(),
                is_draft: false,
            })
            .await
            .unwrap();

        service
            .mark_operation_failed(&op_id, "quota error: inactive".to_string())
            .await
            .unwrap();

        let record = service.get_operation(&op_id).await.unwrap();
        assert_eq!(record.status, "failed");
        assert_eq!(record.error_message.as_deref(), Some("quota error: inactive"));
    }

    #[actix_rt::test]
    async fn list_is_paginated() {
        let service = service().await;
        for _ in 0..5 {
            service
                .create_operation(CreateOperationRequest {
                    channel: "email".to_string(),
                    is_draft: false,
                })
                .await
                .unwrap();
        }

        let page = service.list_operations(2, 2).await.unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.page, 2);
        assert_eq!(page.items.len(), 2);

        let last = service.list_operations(3, 2).await.unwrap();
        assert_eq!(last.items.len(), 1);

        assert!(service.get_operation("missing").await.is_err());
        assert!(service.find_operation("missing").await.unwrap().is_none());
    }

    #[actix_rt::test]
    async fn unknown_operation_is_a_structured_not_found() {
        let service = service().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(service))
                .route("/operations/{id}", web::get().to(get_operation_endpoint)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/operations/missing")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["status"], json!("error"));
        assert_eq!(body["operation_id"], json!("missing"));
        assert_eq!(body["message"], json!("operation missing not found"));
    }
}
