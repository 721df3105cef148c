//! services/transport_service.rs
//! Contratos de envío por canal y adaptadores HTTP de SMS y WhatsApp.
//! El transporte de email (SMTP) vive en `email_service`.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    config::app_config::{SmsSettings, WhatsAppSettings},
    models::{account_model::WhatsAppCredentials, recipient_model::OutboundMessage},
};

/// Todos los transportes devuelven el id de mensaje del proveedor.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, html: &str) -> Result<String>;
}

#[async_trait]
pub trait SmsTransport: Send + Sync {
    async fn send_sms(&self, to: &str, body: &str) -> Result<String>;
}

#[async_trait]
pub trait WhatsAppTransport: Send + Sync {
    async fn send_template(
        &self,
        credentials: &WhatsAppCredentials,
        to: &str,
        template_name: &str,
        language_code: &str,
        parameters: &[String],
    ) -> Result<String>;
}

/// Los tres transportes, enrutados según el tipo de mensaje.
#[derive(Clone)]
pub struct Transports {
    pub email: Arc<dyn EmailTransport>,
    pub sms: Arc<dyn SmsTransport>,
    pub whatsapp: Arc<dyn WhatsAppTransport>,
}

impl Transports {
    pub async fn send(&self, message: &OutboundMessage) -> Result<String> {
        match message {
            OutboundMessage::Email { to, subject, html } => {
                self.email.send_email(to, subject, html).await
            }
            OutboundMessage::Sms { to, body } => self.sms.send_sms(to, body).await,
            OutboundMessage::WhatsApp {
                to,
                template_name,
                language_code,
                parameters,
                credentials,
            } => {
                self.whatsapp
                    .send_template(credentials, to, template_name, language_code, parameters)
                    .await
            }
        }
    }
}

async fn error_body(resp: reqwest::Response) -> String {
    let status = resp.status();
    let body_txt = resp.text().await.unwrap_or_default();
    format!("status={} body='{}'", status, body_txt)
}

// ---------------------------------------------------------------------------
// SMS
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SmsGatewayResponse {
    #[serde(alias = "MessageId", alias = "messageId")]
    message_id: String,
}

/// Gateway SMS genérico: `POST {api_url}/messages {to, body}`.
#[derive(Clone)]
pub struct HttpSmsTransport {
    settings: SmsSettings,
    http_client: Client,
}

impl HttpSmsTransport {
    pub fn new(settings: SmsSettings) -> Self {
        Self {
            settings,
            http_client: Client::new(),
        }
    }
}

#[async_trait]
impl SmsTransport for HttpSmsTransport {
    async fn send_sms(&self, to: &str, body: &str) -> Result<String> {
        let url = format!("{}/messages", self.settings.api_url.trim_end_matches('/'));
        log::debug!("(send_sms) POST {} to={}", url, to);

        let resp = self
            .http_client
            .post(&url)
            .bearer_auth(&self.settings.api_key)
            .json(&serde_json::json!({ "to": to, "body": body }))
            .send()
            .await
            .context("(send_sms) Fallo al POST del SMS")?;

        if !resp.status().is_success() {
            let e = error_body(resp).await;
            log::error!("(send_sms) -> Fallo al enviar SMS a '{}': {}", to, e);
            return Err(anyhow!("SMS gateway rejected message: {}", e));
        }

        let parsed = resp
            .json::<SmsGatewayResponse>()
            .await
            .context("(send_sms) Respuesta del gateway sin message_id")?;
        Ok(parsed.message_id)
    }
}

// ---------------------------------------------------------------------------
// WhatsApp (Cloud API)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct WhatsAppMessageId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct WhatsAppSendResponse {
    #[serde(default)]
    messages: Vec<WhatsAppMessageId>,
}

#[derive(Clone)]
pub struct CloudWhatsAppTransport {
    settings: WhatsAppSettings,
    http_client: Client,
}

impl CloudWhatsAppTransport {
    pub fn new(settings: WhatsAppSettings) -> Self {
        Self {
            settings,
            http_client: Client::new(),
        }
    }

    pub fn template_payload(
        to: &str,
        template_name: &str,
        language_code: &str,
        parameters: &[String],
    ) -> serde_json::Value {
        let params: Vec<serde_json::Value> = parameters
            .iter()
            .map(|p| serde_json::json!({ "type": "text", "text": p }))
            .collect();

        let mut template = serde_json::json!({
            "name": template_name,
            "language": { "code": language_code }
        });
        if !params.is_empty() {
            template["components"] = serde_json::json!([
                { "type": "body", "parameters": params }
            ]);
        }

        serde_json::json!({
            "messaging_product": "whatsapp",
            "to": to.trim_start_matches('+'),
            "type": "template",
            "template": template
        })
    }
}

#[async_trait]
impl WhatsAppTransport for CloudWhatsAppTransport {
    async fn send_template(
        &self,
        credentials: &WhatsAppCredentials,
        to: &str,
        template_name: &str,
        language_code: &str,
        parameters: &[String],
    ) -> Result<String> {
        let send_url = format!(
            "{}/{}/messages",
            self.settings.api_url.trim_end_matches('/'),
            urlencoding::encode(&credentials.phone_number_id)
        );
        let payload = Self::template_payload(to, template_name, language_code, parameters);

        let r = self
            .http_client
            .post(&send_url)
            .bearer_auth(&credentials.access_token)
            .json(&payload)
            .send()
            .await
            .context("(send_template) Fallo al POST de plantilla")?;

        log::debug!(
            "(send_template) -> Envío plantilla '{}' a '{}': status={}",
            template_name,
            to,
            r.status()
        );
        if !r.status().is_success() {
            let e = error_body(r).await;
            log::error!("(send_template) -> Fallo al enviar a '{}': {}", to, e);
            return Err(anyhow!("WhatsApp API rejected message: {}", e));
        }

        let parsed = r
            .json::<WhatsAppSendResponse>()
            .await
            .context("(send_template) Respuesta de WhatsApp inválida")?;
        parsed
            .messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .ok_or_else(|| anyhow!("WhatsApp API response carried no message id"))
    }
}
