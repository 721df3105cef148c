//! tests/support.rs
//! Colaboradores en memoria compartidos por las pruebas.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicU32, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};

use crate::{
    config::app_config::{ChannelCosts, FeatureFlags},
    models::{
        account_model::{AccountPatch, ClientAccount, WhatsAppCredentials},
        audit_model::AuditLog,
        recipient_model::SheetData,
        report_model::{
            EmailDeliveryEvent, LogStreamInfo, ProviderLogEvent, SmsSendEvent, UsageReport,
        },
    },
    services::{
        audit_service::{AuditService, LogStore, NotificationMailer},
        batch_service::BatchService,
        dispatch_service::DispatchService,
        event_source_service::{EmailEventSource, SmsLogSource, SmsSendRecorder},
        extractor_service::ExtractorService,
        identity_service::IdentityProvider,
        operation_service::OperationService,
        quota_service::QuotaService,
        transport_service::{EmailTransport, SmsTransport, Transports, WhatsAppTransport},
    },
};

pub fn account(email: &str, balance: u64) -> ClientAccount {
    ClientAccount {
        id: format!("auth0|{}", email),
        email: email.to_string(),
        name: Some("Cliente".to_string()),
        mobile: Some("+5215512345678".to_string()),
        active: true,
        email_verified: true,
        balance,
        whatsapp: None,
    }
}

// ---------------------------------------------------------------------------
// Proveedor de identidad
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockIdentity {
    pub accounts: Mutex<HashMap<String, ClientAccount>>,
    pub patches: Mutex<Vec<(String, AccountPatch)>>,
    pub fail_list: bool,
    pub fail_reads: bool,
    pub fail_patches: bool,
    /// Intentos de verificación que fallan antes del primero exitoso.
    pub verification_failures: AtomicU32,
    pub verification_calls: AtomicU32,
}

impl MockIdentity {
    pub fn with_accounts(accounts: Vec<ClientAccount>) -> Self {
        let map = accounts
            .into_iter()
            .map(|a| (a.email.clone(), a))
            .collect();
        MockIdentity {
            accounts: Mutex::new(map),
            ..MockIdentity::default()
        }
    }

    pub fn balance_of(&self, email: &str) -> u64 {
        self.accounts.lock().unwrap()[email].balance
    }

    pub fn patch_count(&self) -> usize {
        self.patches.lock().unwrap().len()
    }
}

#[async_trait]
impl IdentityProvider for MockIdentity {
    async fn find_account(&self, email: &str) -> Result<Option<ClientAccount>> {
        if self.fail_reads {
            return Err(anyhow!("identity provider unavailable"));
        }
        Ok(self.accounts.lock().unwrap().get(email).cloned())
    }

    async fn list_accounts(&self) -> Result<Vec<ClientAccount>> {
        if self.fail_list {
            return Err(anyhow!("identity provider unavailable"));
        }
        let mut accounts: Vec<_> = self.accounts.lock().unwrap().values().cloned().collect();
        accounts.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(accounts)
    }

    async fn update_account(&self, account_id: &str, patch: &AccountPatch) -> Result<()> {
        if self.fail_patches {
            return Err(anyhow!("management api rejected the patch"));
        }
        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts
            .values_mut()
            .find(|a| a.id == account_id)
            .ok_or_else(|| anyhow!("unknown account {}", account_id))?;
        if let Some(balance) = patch.balance {
            account.balance = balance;
        }
        if let Some(active) = patch.active {
            account.active = active;
        }
        if let Some(wa) = &patch.whatsapp {
            account.whatsapp = Some(wa.clone());
        }
        self.patches
            .lock()
            .unwrap()
            .push((account_id.to_string(), patch.clone()));
        Ok(())
    }

    async fn send_verification_email(&self, _account_id: &str) -> Result<()> {
        self.verification_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.verification_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.verification_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(anyhow!("user not found yet"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Transportes
// ---------------------------------------------------------------------------

/// Registra cada envío; falla para las direcciones de `failing`.
#[derive(Default)]
pub struct RecordingTransport {
    pub failing: HashSet<String>,
    pub delay: Option<Duration>,
    pub sent: Mutex<Vec<(String, String)>>,
    pub calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl RecordingTransport {
    pub fn failing_for(addresses: &[&str]) -> Self {
        RecordingTransport {
            failing: addresses.iter().map(|a| a.to_string()).collect(),
            ..RecordingTransport::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn destinations(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(to, _)| to.clone()).collect()
    }

    async fn record(&self, to: &str, body: String) -> Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(to) {
            return Err(anyhow!("provider rejected {}", to));
        }
        self.sent.lock().unwrap().push((to.to_string(), body));
        Ok(format!("msg-{}", n))
    }
}

#[async_trait]
impl EmailTransport for RecordingTransport {
    async fn send_email(&self, to: &str, _subject: &str, html: &str) -> Result<String> {
        self.record(to, html.to_string()).await
    }
}

#[async_trait]
impl SmsTransport for RecordingTransport {
    async fn send_sms(&self, to: &str, body: &str) -> Result<String> {
        self.record(to, body.to_string()).await
    }
}

#[async_trait]
impl WhatsAppTransport for RecordingTransport {
    async fn send_template(
        &self,
        _credentials: &WhatsAppCredentials,
        to: &str,
        template_name: &str,
        _language_code: &str,
        parameters: &[String],
    ) -> Result<String> {
        self.record(to, format!("{}:{}", template_name, parameters.join(",")))
            .await
    }
}

pub fn transports(transport: Arc<RecordingTransport>) -> Transports {
    Transports {
        email: transport.clone(),
        sms: transport.clone(),
        whatsapp: transport,
    }
}

// ---------------------------------------------------------------------------
// Almacenamiento y correo de artefactos
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryLogStore {
    pub files: Mutex<HashMap<String, String>>,
    pub fail: bool,
}

#[async_trait]
impl LogStore for MemoryLogStore {
    async fn put(&self, key: &str, content: &str) -> Result<String> {
        if self.fail {
            return Err(anyhow!("bucket unavailable"));
        }
        self.files
            .lock()
            .unwrap()
            .insert(key.to_string(), content.to_string());
        Ok(format!("memory://{}", key))
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    pub audit_logs: Mutex<Vec<(String, AuditLog)>>,
    pub reports: Mutex<Vec<(String, String, u64)>>,
    /// Destinatarios para los que el envío falla.
    pub failing: HashSet<String>,
}

#[async_trait]
impl NotificationMailer for RecordingMailer {
    async fn send_audit_log(&self, to: &str, log: &AuditLog) -> Result<()> {
        if self.failing.contains(to) {
            return Err(anyhow!("smtp down"));
        }
        self.audit_logs
            .lock()
            .unwrap()
            .push((to.to_string(), log.clone()));
        Ok(())
    }

    async fn send_usage_report(
        &self,
        to: &str,
        report: &UsageReport,
        file_name: &str,
        _content: &str,
    ) -> Result<()> {
        if self.failing.contains(to) {
            return Err(anyhow!("smtp down"));
        }
        self.reports
            .lock()
            .unwrap()
            .push((to.to_string(), file_name.to_string(), report.balance));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fuentes de eventos
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockEventSource {
    pub email_events: HashMap<String, Vec<EmailDeliveryEvent>>,
    pub failing_senders: HashSet<String>,
    pub sms_sends: HashMap<String, Vec<SmsSendEvent>>,
    pub streams: Vec<LogStreamInfo>,
    pub stream_contents: HashMap<String, Vec<ProviderLogEvent>>,
    pub stream_fetches: Mutex<Vec<String>>,
    /// Envíos escritos por `SmsSendRecorder`, por stream.
    pub recorded: Mutex<HashMap<String, Vec<SmsSendEvent>>>,
    pub fail_recording: bool,
}

impl MockEventSource {
    pub fn fetches(&self) -> Vec<String> {
        self.stream_fetches.lock().unwrap().clone()
    }

    pub fn recorded_in(&self, stream: &str) -> Vec<SmsSendEvent> {
        self.recorded
            .lock()
            .unwrap()
            .get(stream)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl SmsSendRecorder for MockEventSource {
    async fn record_sends(&self, stream: &str, events: &[SmsSendEvent]) -> Result<()> {
        if self.fail_recording {
            return Err(anyhow!("log api unavailable"));
        }
        self.recorded
            .lock()
            .unwrap()
            .entry(stream.to_string())
            .or_default()
            .extend_from_slice(events);
        Ok(())
    }
}

#[async_trait]
impl EmailEventSource for MockEventSource {
    async fn events_for_sender(
        &self,
        sender: &str,
        _since: DateTime<Utc>,
    ) -> Result<Vec<EmailDeliveryEvent>> {
        if self.failing_senders.contains(sender) {
            return Err(anyhow!("event store timeout"));
        }
        Ok(self.email_events.get(sender).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl SmsLogSource for MockEventSource {
    async fn send_events(&self, stream: &str, _since: DateTime<Utc>) -> Result<Vec<SmsSendEvent>> {
        let mut sends = self.sms_sends.get(stream).cloned().unwrap_or_default();
        sends.extend(self.recorded_in(stream));
        Ok(sends)
    }

    async fn provider_streams(&self) -> Result<Vec<LogStreamInfo>> {
        Ok(self.streams.clone())
    }

    async fn stream_events(&self, stream: &str) -> Result<Vec<ProviderLogEvent>> {
        self.stream_fetches.lock().unwrap().push(stream.to_string());
        Ok(self.stream_contents.get(stream).cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Planillas y armado de servicios
// ---------------------------------------------------------------------------

/// Planilla de email con dos párrafos y un placeholder en cada uno.
pub fn email_sheet(recipients: Vec<Vec<&'static str>>) -> SheetData {
    let mut rows: Vec<Vec<&'static str>> = vec![
        vec!["field", "value"],
        vec!["client_name", "Ana Pérez"],
        vec!["client_email", "Ana@Example.com"],
        vec!["client_mobile", "+52 1 55 1234 5678"],
        vec!["subject", "Promo de marzo"],
        vec!["paragraphs", "Hola {},", "Tu código es {}."],
        vec!["email", "param 1", "param 2"],
    ];
    rows.extend(recipients);
    SheetData::from_rows(rows)
}

pub fn sms_sheet(recipients: Vec<Vec<&'static str>>) -> SheetData {
    let mut rows: Vec<Vec<&'static str>> = vec![
        vec!["field", "value"],
        vec!["client_name", "Ana Pérez"],
        vec!["client_email", "ana@example.com"],
        vec!["client_mobile", "+5215512345678"],
        vec!["message", "Hola {}, tu cita es mañana"],
        vec!["mobile", "param 1"],
    ];
    rows.extend(recipients);
    SheetData::from_rows(rows)
}

pub fn whatsapp_sheet(recipients: Vec<Vec<&'static str>>) -> SheetData {
    let mut rows: Vec<Vec<&'static str>> = vec![
        vec!["field", "value"],
        vec!["client_name", "Ana Pérez"],
        vec!["client_email", "ana@example.com"],
        vec!["client_mobile", "+5215512345678"],
        vec!["template_name", "appointment_reminder"],
        vec!["access_token", "EAAG-token"],
        vec!["phone_number_id", "1098765"],
        vec!["mobile", "param 1"],
    ];
    rows.extend(recipients);
    SheetData::from_rows(rows)
}

pub async fn test_pool() -> Pool<Sqlite> {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite")
}

/// Todo lo necesario para correr lotes contra colaboradores en memoria.
pub struct BatchHarness {
    pub identity: Arc<MockIdentity>,
    pub transport: Arc<RecordingTransport>,
    pub store: Arc<MemoryLogStore>,
    pub mailer: Arc<RecordingMailer>,
    pub events: Arc<MockEventSource>,
    pub operations: OperationService,
    pub service: BatchService,
}

pub struct HarnessOptions {
    pub accounts: Vec<ClientAccount>,
    pub transport: RecordingTransport,
    pub store: MemoryLogStore,
    pub mailer: RecordingMailer,
    pub events: MockEventSource,
    pub identity_fails_patches: bool,
    pub flags: FeatureFlags,
    pub costs: ChannelCosts,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        HarnessOptions {
            accounts: vec![account("ana@example.com", 10)],
            transport: RecordingTransport::default(),
            store: MemoryLogStore::default(),
            mailer: RecordingMailer::default(),
            events: MockEventSource::default(),
            identity_fails_patches: false,
            flags: FeatureFlags::all_enabled(),
            costs: ChannelCosts::default(),
        }
    }
}

pub async fn batch_harness(opts: HarnessOptions) -> BatchHarness {
    let identity = Arc::new(MockIdentity {
        fail_patches: opts.identity_fails_patches,
        ..MockIdentity::with_accounts(opts.accounts)
    });
    let transport = Arc::new(opts.transport);
    let store = Arc::new(opts.store);
    let mailer = Arc::new(opts.mailer);
    let events = Arc::new(opts.events);

    let operations = OperationService::new(test_pool().await);
    operations.run_migrations().await.expect("migrations");

    let service = BatchService::new(
        ExtractorService::new().expect("extractor"),
        QuotaService::new(identity.clone(), opts.costs),
        DispatchService::new(transports(transport.clone()), 4, Duration::from_secs(5)),
        AuditService::new(store.clone(), mailer.clone(), opts.flags.clone()),
        operations.clone(),
        events.clone(),
        opts.flags,
    );

    BatchHarness {
        identity,
        transport,
        store,
        mailer,
        events,
        operations,
        service,
    }
}
