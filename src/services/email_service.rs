//! services/email_service.rs

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{
        header::{ContentDisposition, ContentType},
        Body, Mailbox, MultiPart, SinglePart,
    },
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use uuid::Uuid;

use crate::{
    config::app_config::SmtpSettings,
    models::{audit_model::AuditLog, report_model::UsageReport},
    services::{audit_service::NotificationMailer, transport_service::EmailTransport},
};

const SMTP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// SMTP para el canal email y para enviar artefactos (logs, reportes).
#[derive(Debug, Clone)]
pub struct EmailService {
    settings: SmtpSettings,
}

impl EmailService {
    pub fn new(settings: SmtpSettings) -> Self {
        Self { settings }
    }

    fn build_mailer(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let tls_params = TlsParameters::new(self.settings.host.clone())?;
        Ok(
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.settings.host)?
                .port(self.settings.port)
                .credentials(Credentials::new(
                    self.settings.user.clone(),
                    self.settings.pass.clone(),
                ))
                .tls(Tls::Required(tls_params))
                .build(),
        )
    }

    fn message_id(&self) -> String {
        let domain = self
            .settings
            .user
            .split('@')
            .nth(1)
            .filter(|d| !d.is_empty())
            .unwrap_or("bulk-dispatch.local");
        format!("<{}@{}>", Uuid::new_v4(), domain)
    }

    /// Envía un correo HTML (con adjuntos opcionales) y devuelve el Message-ID.
    pub async fn send_html(
        &self,
        to: &str,
        subject: &str,
        html: &str,
        attachments: Vec<EmailAttachment>,
    ) -> Result<String> {
        let from: Mailbox = format!("{} <{}>", self.settings.from_name, self.settings.user)
            .parse()
            .context("Invalid from address")?;
        let to: Mailbox = to.parse().context("Invalid recipient address")?;

        // Construir cuerpo en HTML
        let html_part = SinglePart::builder()
            .header(ContentType::parse("text/html; charset=utf-8")?)
            .body(html.to_string());

        let mut multipart = MultiPart::mixed().singlepart(html_part);
        for attach in attachments {
            let part = SinglePart::builder()
                .header(ContentType::parse(attach.content_type.as_str())?)
                .header(ContentDisposition::attachment(&attach.filename))
                .body(Body::new(attach.data));
            multipart = multipart.singlepart(part);
        }

        let message_id = self.message_id();
        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .message_id(Some(message_id.clone()))
            .multipart(multipart)?;

        let mailer = self.build_mailer()?;
        tokio::time::timeout(SMTP_TIMEOUT, mailer.send(message))
            .await
            .context("SMTP timeout")??;

        Ok(message_id)
    }
}

#[async_trait]
impl EmailTransport for EmailService {
    async fn send_email(&self, to: &str, subject: &str, html: &str) -> Result<String> {
        self.send_html(to, subject, html, vec![]).await
    }
}

#[async_trait]
impl NotificationMailer for EmailService {
    async fn send_audit_log(&self, to: &str, audit_log: &AuditLog) -> Result<()> {
        let html = format!(
            "<p>Adjuntamos el registro de su envío masivo.</p><p>Archivo: <b>{}</b></p>",
            audit_log.file_name
        );
        self.send_html(
            to,
            &format!("Registro de envío: {}", audit_log.file_name),
            &html,
            vec![EmailAttachment {
                filename: audit_log.file_name.clone(),
                content_type: "text/plain; charset=utf-8".to_string(),
                data: audit_log.content.clone().into_bytes(),
            }],
        )
        .await
        .context("(send_audit_log) Fallo en SMTP")?;
        Ok(())
    }

    async fn send_usage_report(
        &self,
        to: &str,
        report: &UsageReport,
        file_name: &str,
        content: &str,
    ) -> Result<()> {
        let html = format!(
            "<p>Reporte de uso del {} al {}.</p><p>Saldo actual: <b>{}</b> tokens.</p>",
            report.window_start.format("%Y-%m-%d"),
            report.window_end.format("%Y-%m-%d"),
            report.balance
        );
        self.send_html(
            to,
            "Reporte mensual de entregas",
            &html,
            vec![EmailAttachment {
                filename: file_name.to_string(),
                content_type: "text/plain; charset=utf-8".to_string(),
                data: content.as_bytes().to_vec(),
            }],
        )
        .await
        .context("(send_usage_report) Fallo en SMTP")?;
        Ok(())
    }
}
