//! handlers/report_handler.rs
use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::json;

use crate::{
    handlers::error_response, models::batch_model::ApiResponse,
    services::report_service::ReportService,
};

/// POST /api/reports/monthly
/// Corre el reporte mensual ahora, sin esperar al programado.
pub async fn run_monthly_reports_endpoint(report_service: web::Data<ReportService>) -> HttpResponse {
    match report_service.run_monthly_reports(Utc::now()).await {
        Ok(outcomes) => {
            let failed = outcomes.iter().filter(|o| !o.success).count();
            HttpResponse::Ok().json(ApiResponse::ok(
                format!("{} client reports processed, {} failed", outcomes.len(), failed),
                json!(outcomes),
            ))
        }
        Err(e) => error_response(&e),
    }
}
