//! services/extractor_service.rs
//! Lectura y validación de la planilla de destinatarios.
//!
//! Esquema lógico (igual para los tres canales, cambian las etiquetas):
//!
//! ```text
//! fila 0          encabezado (se ignora)
//! filas 1..k      <etiqueta> | <valor> [| <valor> ...]     metadata
//! fila k+1        email | mobile                          encabezado de destinatarios
//! filas k+2..     <dirección> | <param 1> | <param 2> ...
//! ```

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use regex::Regex;

use crate::models::{
    account_model::WhatsAppCredentials,
    error_model::ServiceError,
    recipient_model::{
        count_placeholders, Channel, ChannelContent, ClientIdentity, ExtractedBatch,
        InvalidAddress, RecipientRecord, SheetData,
    },
};

const EMAIL_PATTERN: &str = r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$";
const MOBILE_PATTERN: &str = r"^\+\d{4,17}$";
const DEFAULT_WHATSAPP_LANGUAGE: &str = "en_US";

#[derive(Clone, Debug)]
pub struct ExtractorService {
    email_re: Regex,
    mobile_re: Regex,
}

/// Bloque de metadata indexado por etiqueta normalizada.
struct MetadataBlock {
    fields: HashMap<String, Vec<String>>,
}

impl MetadataBlock {
    fn from_rows(rows: &[Vec<Option<String>>]) -> Self {
        let mut fields = HashMap::new();
        for row in rows {
            let Some(label) = cell(row, 0) else { continue };
            let values: Vec<String> = row
                .iter()
                .skip(1)
                .filter_map(|c| c.as_deref().map(str::trim))
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .collect();
            // primera aparición de la etiqueta gana
            fields
                .entry(label.to_ascii_lowercase())
                .or_insert(values);
        }
        MetadataBlock { fields }
    }

    fn optional(&self, field: &str) -> Option<String> {
        self.fields.get(field).and_then(|v| v.first()).cloned()
    }

    fn required(&self, field: &str) -> Result<String, ServiceError> {
        match self.fields.get(field) {
            None => Err(ServiceError::missing_field(field, "required field is missing")),
            Some(values) => values
                .first()
                .cloned()
                .ok_or_else(|| ServiceError::missing_field(field, "required field is empty")),
        }
    }

    fn required_all(&self, field: &str) -> Result<Vec<String>, ServiceError> {
        match self.fields.get(field) {
            None => Err(ServiceError::missing_field(field, "required field is missing")),
            Some(values) if values.is_empty() => Err(ServiceError::missing_field(
                field,
                "required field is empty",
            )),
            Some(values) => Ok(values.clone()),
        }
    }
}

fn cell(row: &[Option<String>], idx: usize) -> Option<&str> {
    row.get(idx)
        .and_then(|c| c.as_deref())
        .map(str::trim)
        .filter(|c| !c.is_empty())
}

fn recipients_header(channel: Channel) -> &'static str {
    match channel {
        Channel::Email => "email",
        Channel::Sms | Channel::WhatsApp => "mobile",
    }
}

impl ExtractorService {
    pub fn new() -> Result<Self> {
        Ok(Self {
            email_re: Regex::new(EMAIL_PATTERN).context("Regex de email inválida")?,
            mobile_re: Regex::new(MOBILE_PATTERN).context("Regex de móvil inválida")?,
        })
    }

    pub fn normalize_email(raw: &str) -> String {
        raw.trim().to_lowercase()
    }

    /// Quita espacios y todo lo que no sea dígito, salvo un `+` inicial.
    pub fn normalize_mobile(raw: &str) -> String {
        let trimmed = raw.trim();
        let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
        if trimmed.starts_with('+') {
            format!("+{}", digits)
        } else {
            digits
        }
    }

    pub fn normalize_address(channel: Channel, raw: &str) -> String {
        match channel {
            Channel::Email => Self::normalize_email(raw),
            Channel::Sms | Channel::WhatsApp => Self::normalize_mobile(raw),
        }
    }

    pub fn is_valid_email(&self, address: &str) -> bool {
        self.email_re.is_match(address)
    }

    pub fn is_valid_mobile(&self, mobile: &str) -> bool {
        self.mobile_re.is_match(mobile)
    }

    /// Valida una dirección ya normalizada.
    pub fn is_valid_address(&self, channel: Channel, address: &str) -> bool {
        match channel {
            Channel::Email => self.is_valid_email(address),
            Channel::Sms | Channel::WhatsApp => self.is_valid_mobile(address),
        }
    }

    /// Convierte la planilla en un lote validado y sin duplicados.
    pub fn extract(&self, channel: Channel, sheet: &SheetData) -> Result<ExtractedBatch, ServiceError> {
        let rows = &sheet.rows;
        let header_label = recipients_header(channel);

        let header_idx = rows
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, row)| {
                cell(row, 0)
                    .map(|label| label.eq_ignore_ascii_case(header_label))
                    .unwrap_or(false)
            })
            .map(|(idx, _)| idx)
            .ok_or_else(|| {
                ServiceError::missing_field(header_label, "recipients header row not found")
            })?;

        let metadata = MetadataBlock::from_rows(&rows[1..header_idx]);
        let client = self.extract_client(channel, &metadata)?;
        let content = Self::extract_content(channel, &metadata)?;

        let mut recipients = Vec::new();
        let mut invalid_addresses = Vec::new();
        let mut seen = HashSet::new();

        for (idx, row) in rows.iter().enumerate().skip(header_idx + 1) {
            let row_number = idx + 1;
            let last_filled = row.iter().rposition(|c| {
                c.as_deref().map(|v| !v.trim().is_empty()).unwrap_or(false)
            });
            let Some(last_filled) = last_filled else {
                continue;
            };

            let raw_address = cell(row, 0).unwrap_or_default();
            let address = Self::normalize_address(channel, raw_address);
            if !self.is_valid_address(channel, &address) {
                log::info!(
                    "(extract) Fila {}: dirección inválida '{}'",
                    row_number,
                    raw_address
                );
                invalid_addresses.push(InvalidAddress {
                    row: row_number,
                    address: raw_address.to_string(),
                });
                continue;
            }

            if !seen.insert(address.clone()) {
                log::debug!(
                    "(extract) Fila {}: '{}' duplicado, se ignora",
                    row_number,
                    address
                );
                continue;
            }

            let parameters = row
                .iter()
                .take(last_filled + 1)
                .skip(1)
                .map(|c| c.as_deref().map(str::trim).unwrap_or_default().to_string())
                .collect();

            recipients.push(RecipientRecord {
                address,
                parameters,
                row: row_number,
            });
        }

        let batch = ExtractedBatch {
            client,
            content,
            recipients,
            invalid_addresses,
        };

        self.validate_placeholders(&batch.content, &batch.recipients)?;

        log::info!(
            "(extract) Canal={} cliente={} destinatarios={} inválidos={}",
            channel,
            batch.client.email,
            batch.recipients.len(),
            batch.invalid_addresses.len()
        );
        Ok(batch)
    }

    /// Cada destinatario debe traer tantos parámetros como `{}` tenga el cuerpo.
    /// WhatsApp usa plantillas del proveedor y no se valida.
    pub fn validate_placeholders(
        &self,
        content: &ChannelContent,
        recipients: &[RecipientRecord],
    ) -> Result<(), ServiceError> {
        if content.channel() == Channel::WhatsApp {
            return Ok(());
        }

        let expected = count_placeholders(&content.body());
        match recipients
            .iter()
            .find(|r| r.parameters.len() != expected)
        {
            Some(r) => Err(ServiceError::InvalidRow {
                row: r.row,
                message: format!(
                    "recipient '{}' has {} parameters but the message has {} placeholders",
                    r.address,
                    r.parameters.len(),
                    expected
                ),
            }),
            None => Ok(()),
        }
    }

    /// Destinatarios efectivos del lote. En borrador, sólo el propio cliente.
    pub fn batch_recipients(
        &self,
        batch: &ExtractedBatch,
        is_draft: bool,
    ) -> Result<Vec<RecipientRecord>, ServiceError> {
        if !is_draft {
            if batch.recipients.is_empty() {
                return Err(ServiceError::missing_field(
                    "recipients",
                    "no valid recipients in sheet",
                ));
            }
            return Ok(batch.recipients.clone());
        }

        let channel = batch.content.channel();
        let address = match channel {
            Channel::Email => batch.client.email.clone(),
            Channel::Sms | Channel::WhatsApp => {
                let mobile = batch.client.mobile.clone().unwrap_or_default();
                if !self.is_valid_mobile(&mobile) {
                    return Err(ServiceError::missing_field(
                        "client_mobile",
                        "client mobile is not a valid number for a draft",
                    ));
                }
                mobile
            }
        };

        let parameters = batch
            .recipients
            .first()
            .map(|r| r.parameters.clone())
            .unwrap_or_default();

        let draft = vec![RecipientRecord {
            address,
            parameters,
            row: 0,
        }];
        self.validate_placeholders(&batch.content, &draft)?;
        Ok(draft)
    }

    fn extract_client(
        &self,
        channel: Channel,
        metadata: &MetadataBlock,
    ) -> Result<ClientIdentity, ServiceError> {
        let name = metadata.required("client_name")?;
        let email = Self::normalize_email(&metadata.required("client_email")?);
        if !self.is_valid_email(&email) {
            return Err(ServiceError::missing_field(
                "client_email",
                format!("'{}' is not a valid email", email),
            ));
        }

        let mobile = match channel {
            Channel::Email => metadata.optional("client_mobile"),
            Channel::Sms | Channel::WhatsApp => Some(metadata.required("client_mobile")?),
        }
        .map(|m| Self::normalize_mobile(&m));

        Ok(ClientIdentity {
            name,
            email,
            mobile,
        })
    }

    fn extract_content(
        channel: Channel,
        metadata: &MetadataBlock,
    ) -> Result<ChannelContent, ServiceError> {
        match channel {
            Channel::Email => Ok(ChannelContent::Email {
                subject: metadata.required("subject")?,
                paragraphs: metadata.required_all("paragraphs")?,
            }),
            Channel::Sms => Ok(ChannelContent::Sms {
                message: metadata.required("message")?,
            }),
            Channel::WhatsApp => Ok(ChannelContent::WhatsApp {
                template_name: metadata.required("template_name")?,
                language_code: metadata
                    .optional("language_code")
                    .unwrap_or_else(|| DEFAULT_WHATSAPP_LANGUAGE.to_string()),
                credentials: WhatsAppCredentials {
                    access_token: metadata.required("access_token")?,
                    phone_number_id: metadata.required("phone_number_id")?,
                },
            }),
        }
    }
}
