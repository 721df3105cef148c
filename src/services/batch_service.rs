use std::sync::Arc;

use chrono::Utc;

use crate::{
    config::app_config::{Feature, FeatureFlags},
    models::{
        audit_model::AuditInput,
        batch_model::{BatchRequest, BatchSummary, DispatchOutcome},
        error_model::ServiceError,
        operation_model::OperationCompletion,
        recipient_model::{Channel, ChannelContent},
        report_model::SmsSendEvent,
    },
    services::{
        audit_service::{build_audit_log, AuditService},
        dispatch_service::DispatchService,
        event_source_service::SmsSendRecorder,
        extractor_service::ExtractorService,
        operation_service::OperationService,
        quota_service::QuotaService,
    },
};

/// Orquesta un lote completo:
/// extracción -> cuota -> despacho -> descuento -> log de auditoría.
#[derive(Clone)]
pub struct BatchService {
    extractor: ExtractorService,
    quota: QuotaService,
    dispatcher: DispatchService,
    audit: AuditService,
    operation_service: OperationService,
    sms_recorder: Arc<dyn SmsSendRecorder>,
    flags: FeatureFlags,
}

fn history_err(e: anyhow::Error) -> ServiceError {
    ServiceError::Persistence(format!("operation history: {:#}", e))
}

impl BatchService {
    pub fn new(
        extractor: ExtractorService,
        quota: QuotaService,
        dispatcher: DispatchService,
        audit: AuditService,
        operation_service: OperationService,
        sms_recorder: Arc<dyn SmsSendRecorder>,
        flags: FeatureFlags,
    ) -> Self {
        Self {
            extractor,
            quota,
            dispatcher,
            audit,
            operation_service,
            sms_recorder,
            flags,
        }
    }

    /// Corre el lote en segundo plano; el resultado queda en el historial.
    pub fn spawn_batch(&self, op_id: String, req: BatchRequest) -> tokio::task::JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            if let Err(e) = service.process_batch(&op_id, req).await {
                log::error!("(spawn_batch) Lote async op_id={} falló: {}", op_id, e);
            }
        })
    }

    /// Procesa el lote y deja el resultado en el historial de operaciones.
    pub async fn process_batch(
        &self,
        op_id: &str,
        req: BatchRequest,
    ) -> Result<BatchSummary, ServiceError> {
        log::info!(
            "(process_batch) Iniciando lote op_id={} channel={} draft={}",
            op_id,
            req.channel,
            req.is_draft
        );

        self.operation_service
            .update_operation_status(op_id, "running", None)
            .await
            .map_err(history_err)?;

        let result = self.run(op_id, &req).await;

        match &result {
            Ok(summary) => {
                let completion = OperationCompletion {
                    client_email: summary.client_email.clone(),
                    recipient_count: summary.recipient_count as i64,
                    sent_count: summary.sent as i64,
                    failed_count: summary.failed as i64,
                    log_file: Some(summary.log_file.clone()),
                };
                self.operation_service
                    .complete_operation(op_id, &completion)
                    .await
                    .map_err(history_err)?;
                log::info!(
                    "(process_batch) Lote op_id={} terminado: enviados={} fallidos={}",
                    op_id,
                    summary.sent,
                    summary.failed
                );
            }
            Err(e) => {
                log::error!("(process_batch) Lote op_id={} falló: {}", op_id, e);
                if let Err(db_err) = self
                    .operation_service
                    .mark_operation_failed(op_id, e.to_string())
                    .await
                {
                    log::error!(
                        "(process_batch) No se pudo marcar op_id={} como failed: {:?}",
                        op_id,
                        db_err
                    );
                }
            }
        }

        result
    }

    async fn run(&self, op_id: &str, req: &BatchRequest) -> Result<BatchSummary, ServiceError> {
        // 1) Planilla -> lote validado (aborta antes de cualquier envío)
        let batch = self.extractor.extract(req.channel, &req.sheet)?;
        let recipients = self.extractor.batch_recipients(&batch, req.is_draft)?;
        let client_email = batch.client.email.clone();

        // 2) Flags y cuota
        self.flags.require(Feature::send_for(req.channel))?;
        let required = self.quota.required_tokens(req.channel, recipients.len());

        let account = if req.is_draft {
            self.quota.load_account(&client_email).await?
        } else {
            self.quota
                .check_eligibility(&client_email, recipients.len(), req.channel)
                .await?
        };

        if let ChannelContent::WhatsApp { credentials, .. } = &batch.content {
            self.quota
                .store_whatsapp_credentials(&account, credentials)
                .await?;
        }

        // 3) Despacho
        let report = self.dispatcher.dispatch(&batch.content, &recipients).await;
        for failure in report.failures().filter_map(DispatchOutcome::as_error) {
            log::warn!("(run) op_id={} {}", op_id, failure);
        }
        if req.channel == Channel::Sms && !req.is_draft {
            self.record_sms_sends(&account.sms_log_stream(), &report.outcomes)
                .await;
        }

        // 4) Descuento: una sola vez, después del despacho y nunca en borrador
        let (remaining_balance, tokens_charged, deduct_error) = if req.is_draft {
            (Some(account.balance), 0, None)
        } else {
            match self.quota.deduct(&client_email, required).await {
                Ok(balance) => (Some(balance), required, None),
                Err(e) => (None, 0, Some(e)),
            }
        };

        // 5) Log de auditoría
        let error_text = deduct_error.as_ref().map(ToString::to_string);
        let audit_log = build_audit_log(&AuditInput {
            client: &batch.client,
            content: &batch.content,
            is_draft: req.is_draft,
            recipients: &recipients,
            invalid_addresses: &batch.invalid_addresses,
            outcomes: &report.outcomes,
            remaining_balance,
            error: error_text.as_deref(),
            timestamp: Utc::now(),
        });

        let published = self.audit.publish(&audit_log, &client_email).await;
        if let Some(e) = deduct_error {
            if let Err(publish_err) = &published {
                log::error!(
                    "(run) op_id={} tampoco se pudo publicar el log: {}",
                    op_id,
                    publish_err
                );
            }
            return Err(e);
        }
        let log_location = published?;

        Ok(BatchSummary {
            operation_id: op_id.to_string(),
            channel: req.channel,
            is_draft: req.is_draft,
            client_email,
            recipient_count: recipients.len(),
            invalid_addresses: batch.invalid_addresses.clone(),
            sent: report.sent_count(),
            failed: report.failed_count(),
            outcomes: report.lines,
            tokens_charged,
            remaining_balance: remaining_balance.unwrap_or(account.balance),
            log_file: audit_log.file_name,
            log_location,
        })
    }

    /// Deja en el stream del cliente cada SMS aceptado por el proveedor. Un
    /// error acá sólo queda en el log.
    async fn record_sms_sends(&self, stream: &str, outcomes: &[DispatchOutcome]) {
        let sent_at = Utc::now();
        let events: Vec<SmsSendEvent> = outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                DispatchOutcome::Sent { message_id, .. } => Some(SmsSendEvent {
                    message_id: message_id.clone(),
                    timestamp: sent_at,
                }),
                DispatchOutcome::Failed { .. } => None,
            })
            .collect();
        if events.is_empty() {
            return;
        }

        match self.sms_recorder.record_sends(stream, &events).await {
            Ok(()) => log::info!(
                "(record_sms_sends) {} envíos registrados en {}",
                events.len(),
                stream
            ),
            Err(e) => log::warn!(
                "(record_sms_sends) No se pudieron registrar envíos en {}: {:?}",
                stream,
                e
            ),
        }
    }
}
