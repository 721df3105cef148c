//! models/recipient_model.rs
//! Planilla de entrada, destinatarios y contenido por canal.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::account_model::WhatsAppCredentials;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
    #[serde(alias = "whats_app")]
    WhatsApp,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
            Channel::WhatsApp => "whatsapp",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Grilla de una hoja de cálculo: filas de celdas opcionales.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SheetData {
    pub rows: Vec<Vec<Option<String>>>,
}

impl SheetData {
    pub fn from_rows<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator<Item = &'static str>,
    {
        SheetData {
            rows: rows
                .into_iter()
                .map(|row| {
                    row.into_iter()
                        .map(|cell| {
                            if cell.trim().is_empty() {
                                None
                            } else {
                                Some(cell.to_string())
                            }
                        })
                        .collect()
                })
                .collect(),
        }
    }
}

/// Un destinatario del lote. Vive sólo mientras dura el lote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipientRecord {
    pub address: String,
    pub parameters: Vec<String>,
    /// Número de fila (1-based) en la planilla; 0 para el destinatario de borrador.
    pub row: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidAddress {
    pub row: usize,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientIdentity {
    pub name: String,
    pub email: String,
    pub mobile: Option<String>,
}

impl ClientIdentity {
    /// Parte local del email, usada como prefijo de archivos.
    pub fn local_part(&self) -> &str {
        self.email.split('@').next().unwrap_or(&self.email)
    }
}

/// Contenido específico de cada canal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "channel", rename_all = "lowercase")]
pub enum ChannelContent {
    Email {
        subject: String,
        paragraphs: Vec<String>,
    },
    Sms {
        message: String,
    },
    #[serde(rename = "whatsapp")]
    WhatsApp {
        template_name: String,
        language_code: String,
        credentials: WhatsAppCredentials,
    },
}

/// Mensaje listo para entregar a un transporte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    Email {
        to: String,
        subject: String,
        html: String,
    },
    Sms {
        to: String,
        body: String,
    },
    WhatsApp {
        to: String,
        template_name: String,
        language_code: String,
        parameters: Vec<String>,
        credentials: WhatsAppCredentials,
    },
}

impl ChannelContent {
    pub fn channel(&self) -> Channel {
        match self {
            ChannelContent::Email { .. } => Channel::Email,
            ChannelContent::Sms { .. } => Channel::Sms,
            ChannelContent::WhatsApp { .. } => Channel::WhatsApp,
        }
    }

    /// Texto completo del cuerpo, tal como se cuenta para placeholders.
    pub fn body(&self) -> String {
        match self {
            ChannelContent::Email { paragraphs, .. } => paragraphs.join("\n"),
            ChannelContent::Sms { message } => message.clone(),
            ChannelContent::WhatsApp { template_name, .. } => template_name.clone(),
        }
    }

    /// Segmento usado en el nombre del archivo de log.
    pub fn slug_source(&self) -> &str {
        match self {
            ChannelContent::Email { subject, .. } => subject,
            ChannelContent::Sms { .. } => "sms",
            ChannelContent::WhatsApp { template_name, .. } => template_name,
        }
    }

    pub fn render_for(&self, recipient: &RecipientRecord) -> OutboundMessage {
        match self {
            ChannelContent::Email {
                subject,
                paragraphs,
            } => {
                let mut params = recipient.parameters.iter().map(String::as_str);
                let html = paragraphs
                    .iter()
                    .map(|p| {
                        let taken: Vec<&str> =
                            params.by_ref().take(count_placeholders(p)).collect();
                        let escaped: Vec<String> = taken.into_iter().map(escape_html).collect();
                        format!("<p>{}</p>", fill_placeholders(p, &escaped))
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                OutboundMessage::Email {
                    to: recipient.address.clone(),
                    subject: subject.clone(),
                    html,
                }
            }
            ChannelContent::Sms { message } => OutboundMessage::Sms {
                to: recipient.address.clone(),
                body: fill_placeholders(message, &recipient.parameters),
            },
            ChannelContent::WhatsApp {
                template_name,
                language_code,
                credentials,
            } => OutboundMessage::WhatsApp {
                to: recipient.address.clone(),
                template_name: template_name.clone(),
                language_code: language_code.clone(),
                parameters: recipient.parameters.clone(),
                credentials: credentials.clone(),
            },
        }
    }
}

pub fn count_placeholders(text: &str) -> usize {
    text.matches("{}").count()
}

/// Reemplaza cada `{}` en orden por el parámetro correspondiente.
/// Los placeholders sin parámetro quedan vacíos.
pub fn fill_placeholders<S: AsRef<str>>(template: &str, params: &[S]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut params = params.iter();
    let mut pieces = template.split("{}").peekable();
    while let Some(piece) = pieces.next() {
        out.push_str(piece);
        if pieces.peek().is_some() {
            if let Some(p) = params.next() {
                out.push_str(p.as_ref());
            }
        }
    }
    out
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Resultado de la extracción de una planilla.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedBatch {
    pub client: ClientIdentity,
    pub content: ChannelContent,
    pub recipients: Vec<RecipientRecord>,
    pub invalid_addresses: Vec<InvalidAddress>,
}
