//! services/audit_service.rs
//! Construcción del log de auditoría de un lote y su publicación
//! (almacenamiento + email al cliente).

use std::{fmt::Write as _, path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    config::app_config::{Feature, FeatureFlags},
    models::{
        audit_model::{AuditInput, AuditLog},
        error_model::ServiceError,
        recipient_model::ChannelContent,
        report_model::UsageReport,
    },
};

const SLUG_MAX_LEN: usize = 40;

/// Almacenamiento de artefactos de texto. Devuelve la ubicación final.
#[async_trait]
pub trait LogStore: Send + Sync {
    async fn put(&self, key: &str, content: &str) -> Result<String>;
}

/// Envío de artefactos por email al cliente.
#[async_trait]
pub trait NotificationMailer: Send + Sync {
    async fn send_audit_log(&self, to: &str, audit_log: &AuditLog) -> Result<()>;

    async fn send_usage_report(
        &self,
        to: &str,
        report: &UsageReport,
        file_name: &str,
        content: &str,
    ) -> Result<()>;
}

/// Guarda artefactos en disco, bajo `./files/logs` por defecto.
#[derive(Clone, Debug)]
pub struct LocalLogStore {
    root: PathBuf,
}

impl LocalLogStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Ruta segura dentro de `root`; rechaza separadores y `..`.
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains('/') || key.contains('\\') || key.contains("..") {
            return Err(anyhow!("Nombre de archivo inválido: '{}'", key));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl LogStore for LocalLogStore {
    async fn put(&self, key: &str, content: &str) -> Result<String> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("No se pudo crear {:?}", self.root))?;
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("No se pudo guardar log en {:?}", path))?;
        Ok(path.to_string_lossy().to_string())
    }
}

/// minúsculas, lo no alfanumérico colapsa a `-`
pub fn slugify(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    let mut last_dash = true;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
        if slug.len() >= SLUG_MAX_LEN {
            break;
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "batch".to_string()
    } else {
        slug
    }
}

pub fn artifact_file_name(local_part: &str, slug_source: &str, timestamp: DateTime<Utc>) -> String {
    format!(
        "{}_{}_{}.txt",
        slugify(local_part),
        slugify(slug_source),
        timestamp.format("%Y%m%d-%H%M%S")
    )
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "==== {} ====", title);
}

/// Función pura: mismo input, mismo artefacto.
pub fn build_audit_log(input: &AuditInput<'_>) -> AuditLog {
    let file_name = artifact_file_name(
        input.client.local_part(),
        input.content.slug_source(),
        input.timestamp,
    );

    let mut out = String::new();

    section(&mut out, "CLIENT");
    let _ = writeln!(out, "Name: {}", input.client.name);
    let _ = writeln!(out, "Email: {}", input.client.email);
    let _ = writeln!(
        out,
        "Mobile: {}",
        input.client.mobile.as_deref().unwrap_or("-")
    );
    let _ = writeln!(out, "Channel: {}", input.content.channel());
    let _ = writeln!(out, "Draft: {}", if input.is_draft { "yes" } else { "no" });
    out.push('\n');

    section(&mut out, "TIMESTAMP");
    let _ = writeln!(out, "{}", input.timestamp.to_rfc3339());
    out.push('\n');

    section(&mut out, "REMAINING TOKENS");
    match input.remaining_balance {
        Some(balance) => {
            let _ = writeln!(out, "{}", balance);
        }
        None => {
            let _ = writeln!(out, "unknown");
        }
    }
    out.push('\n');

    section(&mut out, "CONTENT");
    match input.content {
        ChannelContent::Email {
            subject,
            paragraphs,
        } => {
            let _ = writeln!(out, "Subject: {}", subject);
            for (i, p) in paragraphs.iter().enumerate() {
                let _ = writeln!(out, "Paragraph {}: {}", i + 1, p);
            }
        }
        ChannelContent::Sms { message } => {
            let _ = writeln!(out, "Message: {}", message);
        }
        ChannelContent::WhatsApp {
            template_name,
            language_code,
            credentials,
        } => {
            let _ = writeln!(out, "Template: {}", template_name);
            let _ = writeln!(out, "Language: {}", language_code);
            let _ = writeln!(out, "Phone number id: {}", credentials.phone_number_id);
        }
    }
    out.push('\n');

    section(
        &mut out,
        &format!("RECIPIENTS ({})", input.recipients.len()),
    );
    for r in input.recipients {
        if r.parameters.is_empty() {
            let _ = writeln!(out, "{}", r.address);
        } else {
            let _ = writeln!(out, "{} | {}", r.address, r.parameters.join(" | "));
        }
    }
    out.push('\n');

    section(
        &mut out,
        &format!("INVALID ADDRESSES ({})", input.invalid_addresses.len()),
    );
    for inv in input.invalid_addresses {
        let _ = writeln!(out, "row {}: {}", inv.row, inv.address);
    }
    out.push('\n');

    let sent = input.outcomes.iter().filter(|o| o.is_sent()).count();
    section(
        &mut out,
        &format!(
            "DISPATCH RESULTS (sent {} / failed {})",
            sent,
            input.outcomes.len() - sent
        ),
    );
    for outcome in input.outcomes {
        let _ = writeln!(out, "{}", outcome.log_line());
    }

    if let Some(error) = input.error {
        out.push('\n');
        section(&mut out, "ERROR");
        let _ = writeln!(out, "{}", error);
    }

    AuditLog {
        file_name,
        content: out,
    }
}

/// Sube y envía por email el log de un lote.
#[derive(Clone)]
pub struct AuditService {
    store: Arc<dyn LogStore>,
    mailer: Arc<dyn NotificationMailer>,
    flags: FeatureFlags,
}

impl AuditService {
    pub fn new(
        store: Arc<dyn LogStore>,
        mailer: Arc<dyn NotificationMailer>,
        flags: FeatureFlags,
    ) -> Self {
        Self {
            store,
            mailer,
            flags,
        }
    }

    /// Cualquier falla es terminal para el lote; no se reintenta.
    pub async fn publish(&self, audit_log: &AuditLog, client_email: &str) -> Result<String, ServiceError> {
        self.flags.require(Feature::UploadLog)?;
        let location = self
            .store
            .put(&audit_log.file_name, &audit_log.content)
            .await
            .map_err(|e| {
                log::error!("(publish) Error guardando {}: {:?}", audit_log.file_name, e);
                ServiceError::Persistence(format!("could not store {}: {}", audit_log.file_name, e))
            })?;
        log::info!("(publish) Log {} guardado en {}", audit_log.file_name, location);

        self.flags.require(Feature::EmailLog)?;
        self.mailer
            .send_audit_log(client_email, audit_log)
            .await
            .map_err(|e| {
                log::error!("(publish) Error enviando {} a {}: {:?}", audit_log.file_name, client_email, e);
                ServiceError::Persistence(format!(
                    "could not email {} to {}: {}",
                    audit_log.file_name, client_email, e
                ))
            })?;
        log::info!("(publish) Log {} enviado a {}", audit_log.file_name, client_email);

        Ok(location)
    }
}
