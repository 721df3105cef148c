use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registro de un lote en la tabla `batch_operations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOperationRecord {
    pub id: String,
    pub channel: String,
    pub client_email: Option<String>,
    pub is_draft: bool,
    pub status: String, // "pending", "running", "done", "failed"
    pub error_message: Option<String>,
    pub recipient_count: i64,
    pub sent_count: i64,
    pub failed_count: i64,
    pub log_file: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Datos para crear una operación de lote
#[derive(Debug, Clone)]
pub struct CreateOperationRequest {
    pub channel: String,
    pub is_draft: bool,
}

/// Contadores finales de un lote terminado.
#[derive(Debug, Clone)]
pub struct OperationCompletion {
    pub client_email: String,
    pub recipient_count: i64,
    pub sent_count: i64,
    pub failed_count: i64,
    pub log_file: Option<String>,
}

/// Para listar operaciones con paginación
#[derive(Debug, Clone, Serialize)]
pub struct ListOperationsResponse {
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub items: Vec<BatchOperationRecord>,
}
