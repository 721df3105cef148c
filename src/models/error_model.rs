//! models/error_model.rs
//! Errores tipados del núcleo. Los adaptadores externos devuelven `anyhow::Result`
//! y se traducen a `ServiceError` en la frontera de cada servicio.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Quota,
    Dispatch,
    Persistence,
    Correlation,
    Credential,
    FeatureDisabled,
}

/// Motivo por el que un cliente no puede enviar un lote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaReason {
    AccountNotFound,
    Inactive,
    Unverified,
    Insufficient,
}

impl fmt::Display for QuotaReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let txt = match self {
            QuotaReason::AccountNotFound => "account not found",
            QuotaReason::Inactive => "account is inactive",
            QuotaReason::Unverified => "account email is not verified",
            QuotaReason::Insufficient => "insufficient token balance",
        };
        f.write_str(txt)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Campo faltante o mal formado en la planilla.
    #[error("validation error: field '{field}': {message}")]
    MissingField { field: String, message: String },

    /// Fila de destinatario inválida (p.e. cantidad de parámetros).
    #[error("validation error: row {row}: {message}")]
    InvalidRow { row: usize, message: String },

    #[error("quota error: {reason} (required={required}, balance={balance})")]
    Quota {
        reason: QuotaReason,
        required: u64,
        balance: u64,
    },

    #[error("dispatch error for {recipient}: {cause}")]
    Dispatch { recipient: String, cause: String },

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("correlation error: {0}")]
    Correlation(String),

    #[error("credential error: {0}")]
    Credential(String),

    #[error("feature disabled: {0}")]
    FeatureDisabled(&'static str),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::MissingField { .. } | ServiceError::InvalidRow { .. } => {
                ErrorKind::Validation
            }
            ServiceError::Quota { .. } => ErrorKind::Quota,
            ServiceError::Dispatch { .. } => ErrorKind::Dispatch,
            ServiceError::Persistence(_) => ErrorKind::Persistence,
            ServiceError::Correlation(_) => ErrorKind::Correlation,
            ServiceError::Credential(_) => ErrorKind::Credential,
            ServiceError::FeatureDisabled(_) => ErrorKind::FeatureDisabled,
        }
    }

    pub fn missing_field(field: &str, message: impl Into<String>) -> Self {
        ServiceError::MissingField {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn quota_reason(&self) -> Option<QuotaReason> {
        match self {
            ServiceError::Quota { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    /// Detalles estructurados para la respuesta HTTP.
    pub fn details(&self) -> serde_json::Value {
        match self {
            ServiceError::MissingField { field, .. } => serde_json::json!({ "field": field }),
            ServiceError::InvalidRow { row, .. } => serde_json::json!({ "row": row }),
            ServiceError::Quota {
                reason,
                required,
                balance,
            } => serde_json::json!({
                "reason": reason,
                "required": required,
                "balance": balance
            }),
            ServiceError::Dispatch { recipient, .. } => {
                serde_json::json!({ "recipient": recipient })
            }
            ServiceError::FeatureDisabled(flag) => serde_json::json!({ "flag": flag }),
            _ => serde_json::Value::Null,
        }
    }
}
