//! services/report_service.rs
//! Reporte mensual de entregas por cliente.
//!
//! Para cada cliente elegible se juntan los eventos de email de los últimos
//! 30 días y se cruzan los envíos SMS con los streams de entregas del
//! proveedor. Cada cliente se procesa por separado: un error queda en su
//! `ClientReportOutcome` y no afecta a los demás.

use std::{collections::HashMap, fmt::Write as _, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};

use crate::{
    config::app_config::{Feature, FeatureFlags},
    models::{
        account_model::ClientAccount,
        error_model::ServiceError,
        report_model::{
            ClientReportOutcome, EmailDeliveryEvent, EmailEventType, EmailUsage, LogStreamInfo,
            ProviderDeliveryLog, ProviderLogEvent, SmsDeliveryRecord, UsageReport,
        },
    },
    services::{
        audit_service::{artifact_file_name, LogStore, NotificationMailer},
        event_source_service::{EmailEventSource, SmsLogSource},
        identity_service::IdentityProvider,
    },
};

pub const REPORT_WINDOW_DAYS: i64 = 30;

/// Inicio de la ventana de correlación para `now`.
pub fn window_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now - chrono::Duration::days(REPORT_WINDOW_DAYS)
}

fn correlation_err(what: impl std::fmt::Display, e: anyhow::Error) -> ServiceError {
    ServiceError::Correlation(format!("{}: {:#}", what, e))
}

fn in_window(ts: DateTime<Utc>, since: DateTime<Utc>, until: DateTime<Utc>) -> bool {
    ts >= since && ts <= until
}

/// Conteos y destinatarios por tipo de evento. Ignora tipos desconocidos y
/// eventos fuera de `[since, until]`.
pub fn aggregate_email_events(
    events: &[EmailDeliveryEvent],
    since: DateTime<Utc>,
    until: DateTime<Utc>,
) -> EmailUsage {
    let mut usage = EmailUsage::default();

    for event in events {
        if !in_window(event.timestamp, since, until) {
            continue;
        }
        let Some(event_type) = EmailEventType::parse(&event.event_type) else {
            log::debug!(
                "(aggregate_email_events) Tipo ignorado: '{}'",
                event.event_type
            );
            continue;
        };

        *usage.counts.entry(event_type).or_insert(0) += 1;
        let seen = usage.recipients.entry(event_type).or_default();
        for recipient in &event.recipients {
            let recipient = recipient.trim().to_lowercase();
            if !recipient.is_empty() && !seen.contains(&recipient) {
                seen.push(recipient);
            }
        }
    }

    usage
}

/// Una línea de stream del proveedor puede venir como objeto o como texto JSON.
pub fn parse_delivery_log(event: &ProviderLogEvent) -> Option<ProviderDeliveryLog> {
    match &event.message {
        serde_json::Value::String(raw) => serde_json::from_str(raw).ok(),
        other => serde_json::from_value(other.clone()).ok(),
    }
}

/// Más reciente primero; streams sin fecha al final.
pub fn order_streams(mut streams: Vec<LogStreamInfo>) -> Vec<LogStreamInfo> {
    streams.sort_by(|a, b| b.last_event_at.cmp(&a.last_event_at));
    streams
}

pub fn render_report(report: &UsageReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "==== CLIENT ====");
    let _ = writeln!(out, "Email: {}", report.client_email);
    let _ = writeln!(out, "Remaining tokens: {}", report.balance);
    out.push('\n');

    let _ = writeln!(out, "==== PERIOD ====");
    let _ = writeln!(
        out,
        "{} - {}",
        report.window_start.to_rfc3339(),
        report.window_end.to_rfc3339()
    );
    out.push('\n');

    let _ = writeln!(out, "==== EMAIL EVENTS ====");
    for event_type in EmailEventType::ALL {
        let _ = writeln!(
            out,
            "{}: {}",
            event_type.as_str(),
            report.email.count(event_type)
        );
        if let Some(recipients) = report.email.recipients.get(&event_type) {
            for r in recipients {
                let _ = writeln!(out, "  - {}", r);
            }
        }
    }
    out.push('\n');

    let _ = writeln!(out, "==== SMS DELIVERIES ({}) ====", report.sms.len());
    for record in &report.sms {
        let _ = writeln!(
            out,
            "{} | {} | {} | {} | {}",
            record.message_id,
            record.mobile_number,
            record.phone_carrier,
            record.status,
            record.provider_response
        );
    }

    out
}

#[derive(Clone)]
pub struct ReportService {
    identity: Arc<dyn IdentityProvider>,
    email_events: Arc<dyn EmailEventSource>,
    sms_logs: Arc<dyn SmsLogSource>,
    store: Arc<dyn LogStore>,
    mailer: Arc<dyn NotificationMailer>,
    flags: FeatureFlags,
    process_all_clients: bool,
}

impl ReportService {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        email_events: Arc<dyn EmailEventSource>,
        sms_logs: Arc<dyn SmsLogSource>,
        store: Arc<dyn LogStore>,
        mailer: Arc<dyn NotificationMailer>,
        flags: FeatureFlags,
        process_all_clients: bool,
    ) -> Self {
        Self {
            identity,
            email_events,
            sms_logs,
            store,
            mailer,
            flags,
            process_all_clients,
        }
    }

    /// Corre el reporte para los clientes elegibles. Sólo falla completo si el
    /// flag está apagado o no se pudo listar las cuentas.
    pub async fn run_monthly_reports(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ClientReportOutcome>, ServiceError> {
        self.flags.require(Feature::MonthlyReport)?;

        let accounts = self.identity.list_accounts().await.map_err(|e| {
            log::error!("(run_monthly_reports) Error listando cuentas: {:?}", e);
            ServiceError::Credential(format!("could not list accounts: {:#}", e))
        })?;

        let eligible: Vec<ClientAccount> = accounts
            .into_iter()
            .filter(ClientAccount::is_report_eligible)
            .collect();
        let limit = if self.process_all_clients {
            eligible.len()
        } else {
            1
        };
        log::info!(
            "(run_monthly_reports) {} clientes elegibles, se procesan {}",
            eligible.len(),
            limit.min(eligible.len())
        );

        let mut outcomes = Vec::new();
        for account in eligible.into_iter().take(limit) {
            let outcome = match self.report_for_client(&account, now).await {
                Ok(file_name) => {
                    log::info!(
                        "(run_monthly_reports) Reporte {} enviado a {}",
                        file_name,
                        account.email
                    );
                    ClientReportOutcome {
                        client_email: account.email.clone(),
                        success: true,
                        report_file: Some(file_name),
                        error: None,
                    }
                }
                Err(e) => {
                    log::error!(
                        "(run_monthly_reports) Reporte de {} falló: {}",
                        account.email,
                        e
                    );
                    ClientReportOutcome {
                        client_email: account.email.clone(),
                        success: false,
                        report_file: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    /// Arma, guarda y envía el reporte de un cliente. Devuelve el nombre del archivo.
    pub async fn report_for_client(
        &self,
        account: &ClientAccount,
        now: DateTime<Utc>,
    ) -> Result<String, ServiceError> {
        let report = self.build_report(account, now).await?;
        let content = render_report(&report);

        let local_part = account.email.split('@').next().unwrap_or(&account.email);
        let file_name = artifact_file_name(local_part, "monthly-report", now);

        self.store.put(&file_name, &content).await.map_err(|e| {
            ServiceError::Persistence(format!("could not store {}: {:#}", file_name, e))
        })?;
        self.mailer
            .send_usage_report(&account.email, &report, &file_name, &content)
            .await
            .map_err(|e| {
                ServiceError::Persistence(format!(
                    "could not email {} to {}: {:#}",
                    file_name, account.email, e
                ))
            })?;

        Ok(file_name)
    }

    pub async fn build_report(
        &self,
        account: &ClientAccount,
        now: DateTime<Utc>,
    ) -> Result<UsageReport, ServiceError> {
        let since = window_start(now);

        let email_events = self
            .email_events
            .events_for_sender(&account.email, since)
            .await
            .map_err(|e| {
                ServiceError::Correlation(format!(
                    "email events for {}: {:#}",
                    account.email, e
                ))
            })?;
        let email = aggregate_email_events(&email_events, since, now);

        let sms = self.correlate_sms(account, since, now).await?;

        Ok(UsageReport {
            client_email: account.email.clone(),
            window_start: since,
            window_end: now,
            email,
            sms,
            balance: account.balance,
        })
    }

    /// Cruza cada envío SMS del cliente con los streams de entregas del proveedor.
    /// Los envíos sin entrega encontrada no aparecen en el reporte.
    pub async fn correlate_sms(
        &self,
        account: &ClientAccount,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<SmsDeliveryRecord>, ServiceError> {
        let stream = account.sms_log_stream();
        let sends: Vec<_> = self
            .sms_logs
            .send_events(&stream, since)
            .await
            .map_err(|e| correlation_err(format!("sms sends in {}", stream), e))?
            .into_iter()
            .filter(|s| in_window(s.timestamp, since, until))
            .collect();

        if sends.is_empty() {
            return Ok(Vec::new());
        }

        let streams = order_streams(
            self.sms_logs
                .provider_streams()
                .await
                .map_err(|e| correlation_err("provider streams", e))?,
        );

        // cada stream se descarga una sola vez por reporte
        let mut cache: HashMap<String, Vec<ProviderDeliveryLog>> = HashMap::new();
        let mut records = Vec::new();

        for send in &sends {
            let mut found = None;
            for info in &streams {
                if !cache.contains_key(&info.name) {
                    let events = self
                        .sms_logs
                        .stream_events(&info.name)
                        .await
                        .map_err(|e| correlation_err(format!("stream {}", info.name), e))?;
                    let parsed = events.iter().filter_map(parse_delivery_log).collect();
                    cache.insert(info.name.clone(), parsed);
                }

                found = cache
                    .get(&info.name)
                    .and_then(|logs| {
                        logs.iter()
                            .find(|l| l.notification.message_id == send.message_id)
                    })
                    .cloned();
                if found.is_some() {
                    break;
                }
            }

            match found {
                Some(delivery) => records.push(delivery.into_record()),
                None => log::debug!(
                    "(correlate_sms) Sin entrega para message_id={}",
                    send.message_id
                ),
            }
        }

        Ok(records)
    }

    /// Corre el reporte cada `every` en segundo plano.
    pub fn spawn_schedule(self, every: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // el primer tick es inmediato
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match self.run_monthly_reports(Utc::now()).await {
                    Ok(outcomes) => log::info!(
                        "(spawn_schedule) Corrida terminada: {} clientes, {} fallidos",
                        outcomes.len(),
                        outcomes.iter().filter(|o| !o.success).count()
                    ),
                    Err(e) => log::error!("(spawn_schedule) Corrida falló: {}", e),
                }
            }
        })
    }
}
