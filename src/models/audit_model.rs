//! models/audit_model.rs

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{
    batch_model::DispatchOutcome,
    recipient_model::{ChannelContent, ClientIdentity, InvalidAddress, RecipientRecord},
};

/// Artefacto de texto inmutable de un lote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditLog {
    pub file_name: String,
    pub content: String,
}

/// Todo lo que determina el contenido del log de auditoría.
#[derive(Debug, Clone)]
pub struct AuditInput<'a> {
    pub client: &'a ClientIdentity,
    pub content: &'a ChannelContent,
    pub is_draft: bool,
    pub recipients: &'a [RecipientRecord],
    pub invalid_addresses: &'a [InvalidAddress],
    pub outcomes: &'a [DispatchOutcome],
    pub remaining_balance: Option<u64>,
    pub error: Option<&'a str>,
    pub timestamp: DateTime<Utc>,
}
