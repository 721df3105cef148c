//! services/event_source_service.rs
//! Fuentes de eventos de entrega (email y SMS) usadas por el reporte mensual.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::app_config::EventsSettings,
    models::report_model::{EmailDeliveryEvent, LogStreamInfo, ProviderLogEvent, SmsSendEvent},
};

#[async_trait]
pub trait EmailEventSource: Send + Sync {
    /// Eventos donde `sender` es el remitente. La fuente puede ignorar `since`;
    /// el correlador vuelve a filtrar.
    async fn events_for_sender(
        &self,
        sender: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<EmailDeliveryEvent>>;
}

#[async_trait]
pub trait SmsLogSource: Send + Sync {
    /// Envíos registrados en el stream propio del cliente.
    async fn send_events(&self, stream: &str, since: DateTime<Utc>) -> Result<Vec<SmsSendEvent>>;

    /// Streams de entregas del proveedor (sin orden garantizado).
    async fn provider_streams(&self) -> Result<Vec<LogStreamInfo>>;

    async fn stream_events(&self, stream: &str) -> Result<Vec<ProviderLogEvent>>;
}

/// Escribe los envíos SMS en el stream del cliente que luego lee el reporte.
#[async_trait]
pub trait SmsSendRecorder: Send + Sync {
    async fn record_sends(&self, stream: &str, events: &[SmsSendEvent]) -> Result<()>;
}

/// API HTTP de eventos. Implementa ambas fuentes y el registro de envíos SMS.
#[derive(Clone)]
pub struct HttpDeliveryEventSource {
    settings: EventsSettings,
    http_client: Client,
}

impl HttpDeliveryEventSource {
    pub fn new(settings: EventsSettings) -> Self {
        Self {
            settings,
            http_client: Client::new(),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.settings.api_url.trim_end_matches('/'), path);
        log::debug!("(get_json) GET {}", url);

        let resp = self
            .http_client
            .get(&url)
            .bearer_auth(&self.settings.api_token)
            .send()
            .await
            .with_context(|| format!("Fallo al hacer GET {}", url))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body_txt = resp.text().await.unwrap_or_default();
            return Err(anyhow!("GET {} failed: status={} body='{}'", url, status, body_txt));
        }

        resp.json::<T>()
            .await
            .with_context(|| format!("Respuesta inválida de {}", url))
    }

    async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        let url = format!("{}{}", self.settings.api_url.trim_end_matches('/'), path);
        log::debug!("(post_json) POST {}", url);

        let resp = self
            .http_client
            .post(&url)
            .bearer_auth(&self.settings.api_token)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Fallo al hacer POST {}", url))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body_txt = resp.text().await.unwrap_or_default();
            return Err(anyhow!("POST {} failed: status={} body='{}'", url, status, body_txt));
        }
        Ok(())
    }
}

#[async_trait]
impl EmailEventSource for HttpDeliveryEventSource {
    async fn events_for_sender(
        &self,
        sender: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<EmailDeliveryEvent>> {
        self.get_json(&format!(
            "/email-events?sender={}&since={}",
            urlencoding::encode(sender),
            urlencoding::encode(&since.to_rfc3339())
        ))
        .await
    }
}

#[async_trait]
impl SmsLogSource for HttpDeliveryEventSource {
    async fn send_events(&self, stream: &str, since: DateTime<Utc>) -> Result<Vec<SmsSendEvent>> {
        self.get_json(&format!(
            "/log-streams/{}/events?since={}",
            urlencoding::encode(stream),
            urlencoding::encode(&since.to_rfc3339())
        ))
        .await
    }

    async fn provider_streams(&self) -> Result<Vec<LogStreamInfo>> {
        self.get_json(&format!(
            "/log-groups/{}/streams",
            urlencoding::encode(&self.settings.sms_provider_log_group)
        ))
        .await
    }

    async fn stream_events(&self, stream: &str) -> Result<Vec<ProviderLogEvent>> {
        self.get_json(&format!(
            "/log-groups/{}/streams/{}/events",
            urlencoding::encode(&self.settings.sms_provider_log_group),
            urlencoding::encode(stream)
        ))
        .await
    }
}

#[async_trait]
impl SmsSendRecorder for HttpDeliveryEventSource {
    async fn record_sends(&self, stream: &str, events: &[SmsSendEvent]) -> Result<()> {
        self.post_json(
            &format!("/log-streams/{}/events", urlencoding::encode(stream)),
            events,
        )
        .await
    }
}
