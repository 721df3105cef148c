//! models/report_model.rs
//! Eventos de entrega y reporte mensual de uso.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EmailEventType {
    Send,
    Delivery,
    Bounce,
    Complaint,
    DeliveryDelay,
}

impl EmailEventType {
    pub const ALL: [EmailEventType; 5] = [
        EmailEventType::Send,
        EmailEventType::Delivery,
        EmailEventType::Bounce,
        EmailEventType::Complaint,
        EmailEventType::DeliveryDelay,
    ];

    /// `None` para tipos desconocidos (Open, Click, Reject, ...).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Send" => Some(EmailEventType::Send),
            "Delivery" => Some(EmailEventType::Delivery),
            "Bounce" => Some(EmailEventType::Bounce),
            "Complaint" => Some(EmailEventType::Complaint),
            "DeliveryDelay" => Some(EmailEventType::DeliveryDelay),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EmailEventType::Send => "Send",
            EmailEventType::Delivery => "Delivery",
            EmailEventType::Bounce => "Bounce",
            EmailEventType::Complaint => "Complaint",
            EmailEventType::DeliveryDelay => "DeliveryDelay",
        }
    }
}

/// Evento de email tal como lo entrega la fuente; `event_type` queda como texto
/// porque la fuente puede traer tipos que no agregamos.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailDeliveryEvent {
    pub event_type: String,
    pub recipients: Vec<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Registro de un SMS enviado por el cliente.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsSendEvent {
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogStreamInfo {
    pub name: String,
    pub last_event_at: Option<DateTime<Utc>>,
}

/// Línea de un stream del proveedor; `message` es el JSON crudo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderLogEvent {
    pub timestamp: DateTime<Utc>,
    pub message: serde_json::Value,
}

// Formato de entrega que publica el proveedor SMS en sus streams.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDeliveryNotification {
    pub message_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDeliveryDetails {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub phone_carrier: Option<String>,
    #[serde(default)]
    pub provider_response: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderDeliveryLog {
    pub notification: ProviderDeliveryNotification,
    pub delivery: ProviderDeliveryDetails,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmsDeliveryRecord {
    pub message_id: String,
    pub mobile_number: String,
    pub phone_carrier: String,
    pub provider_response: String,
    pub status: String,
}

impl ProviderDeliveryLog {
    pub fn into_record(self) -> SmsDeliveryRecord {
        SmsDeliveryRecord {
            message_id: self.notification.message_id,
            mobile_number: self.delivery.destination.unwrap_or_default(),
            phone_carrier: self.delivery.phone_carrier.unwrap_or_default(),
            provider_response: self.delivery.provider_response.unwrap_or_default(),
            status: self.status.unwrap_or_else(|| "UNKNOWN".to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmailUsage {
    pub counts: BTreeMap<EmailEventType, u64>,
    pub recipients: BTreeMap<EmailEventType, Vec<String>>,
}

impl EmailUsage {
    pub fn count(&self, event_type: EmailEventType) -> u64 {
        self.counts.get(&event_type).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageReport {
    pub client_email: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub email: EmailUsage,
    pub sms: Vec<SmsDeliveryRecord>,
    pub balance: u64,
}

/// Resultado de procesar el reporte de un cliente.
#[derive(Debug, Clone, Serialize)]
pub struct ClientReportOutcome {
    pub client_email: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
