//! app.rs
use crate::handlers::{
    account_handler, batch_handler, log_handler, operation_handler, report_handler,
};
use actix_web::web;

pub fn init_app(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(
                web::scope("/batches")
                    .route("", web::post().to(batch_handler::submit_batch_endpoint)),
            )
            .service(
                web::scope("/operations")
                    .route(
                        "",
                        web::get().to(operation_handler::list_operations_endpoint),
                    )
                    .route(
                        "/{id}",
                        web::get().to(operation_handler::get_operation_endpoint),
                    ),
            )
            .service(
                web::scope("/reports").route(
                    "/monthly",
                    web::post().to(report_handler::run_monthly_reports_endpoint),
                ),
            )
            .service(
                web::scope("/accounts/{email}")
                    .route(
                        "/balance",
                        web::get().to(account_handler::get_balance_endpoint),
                    )
                    .route(
                        "/tokens",
                        web::post().to(account_handler::credit_tokens_endpoint),
                    )
                    .route(
                        "/active",
                        web::post().to(account_handler::set_active_endpoint),
                    )
                    .route(
                        "/verification",
                        web::post().to(account_handler::send_verification_endpoint),
                    ),
            )
            .service(
                web::scope("/logs")
                    .route("/{filename}", web::get().to(log_handler::serve_log_file)),
            ),
    );
}
