//! models/batch_model.rs
//! Requests/responses de lotes y resultados de despacho.

use serde::{Deserialize, Serialize};

use crate::models::{
    error_model::{ErrorKind, ServiceError},
    recipient_model::{Channel, InvalidAddress, SheetData},
};

#[derive(Debug, Clone, Deserialize)]
pub struct BatchRequest {
    pub channel: Channel,
    pub sheet: SheetData,

    /// Borrador: sólo al propio cliente, sin tocar la cuota.
    #[serde(default)]
    pub is_draft: bool,

    /// Procesar en segundo plano y responder sólo con el id de operación.
    #[serde(default)]
    pub async_send: bool,
}

/// Resultado de un envío individual.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Sent { address: String, message_id: String },
    Failed { address: String, cause: String },
}

impl DispatchOutcome {
    pub fn address(&self) -> &str {
        match self {
            DispatchOutcome::Sent { address, .. } | DispatchOutcome::Failed { address, .. } => {
                address
            }
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, DispatchOutcome::Sent { .. })
    }

    /// Línea legible para el log de auditoría.
    pub fn log_line(&self) -> String {
        match self {
            DispatchOutcome::Sent {
                address,
                message_id,
            } => format!("[SENT] {} (message id: {})", address, message_id),
            DispatchOutcome::Failed { address, cause } => {
                format!("[FAILED] {}: {}", address, cause)
            }
        }
    }

    pub fn as_error(&self) -> Option<ServiceError> {
        match self {
            DispatchOutcome::Failed { address, cause } => Some(ServiceError::Dispatch {
                recipient: address.clone(),
                cause: cause.clone(),
            }),
            DispatchOutcome::Sent { .. } => None,
        }
    }
}

/// Resultados de un lote, en orden de finalización.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    pub outcomes: Vec<DispatchOutcome>,
    pub lines: Vec<String>,
}

impl DispatchReport {
    pub fn push(&mut self, outcome: DispatchOutcome) {
        self.lines.push(outcome.log_line());
        self.outcomes.push(outcome);
    }

    pub fn sent_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_sent()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.sent_count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &DispatchOutcome> {
        self.outcomes.iter().filter(|o| !o.is_sent())
    }
}

/// Resumen de un lote procesado.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub operation_id: String,
    pub channel: Channel,
    pub is_draft: bool,
    pub client_email: String,
    pub recipient_count: usize,
    pub invalid_addresses: Vec<InvalidAddress>,
    pub sent: usize,
    pub failed: usize,
    pub outcomes: Vec<String>,
    pub tokens_charged: u64,
    pub remaining_balance: u64,
    pub log_file: String,
    pub log_location: String,
}

/// Respuesta genérica de la API.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub details: serde_json::Value,
}

impl ApiResponse {
    pub fn ok(message: impl Into<String>, details: serde_json::Value) -> Self {
        ApiResponse {
            success: true,
            status: "ok".to_string(),
            message: message.into(),
            operation_id: None,
            error_kind: None,
            details,
        }
    }

    pub fn from_error(err: &ServiceError) -> Self {
        ApiResponse {
            success: false,
            status: "error".to_string(),
            message: err.to_string(),
            operation_id: None,
            error_kind: Some(err.kind()),
            details: err.details(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            status: "error".to_string(),
            message: message.into(),
            operation_id: None,
            error_kind: None,
            details: serde_json::Value::Null,
        }
    }

    pub fn with_operation(mut self, operation_id: &str) -> Self {
        self.operation_id = Some(operation_id.to_string());
        self
    }
}
