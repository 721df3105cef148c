//! services/dispatch_service.rs
//! Reparte un lote en un envío por destinatario.
//!
//! Política única para los tres canales: la falla de un destinatario queda
//! registrada en su `DispatchOutcome` y nunca cancela a los demás ni hace
//! fallar el lote. Se espera a todos los envíos y se guardan en orden de
//! finalización.

use std::time::Duration;

use futures_util::{
    stream::{self, StreamExt},
    FutureExt,
};

use crate::{
    models::{
        batch_model::{DispatchOutcome, DispatchReport},
        recipient_model::{ChannelContent, OutboundMessage, RecipientRecord},
    },
    services::transport_service::Transports,
};

/// Cantidad máxima de envíos simultáneos por defecto
pub const DEFAULT_MAX_CONCURRENT_SENDS: usize = 16;

#[derive(Clone)]
pub struct DispatchService {
    transports: Transports,
    max_concurrent: usize,
    send_timeout: Duration,
}

impl DispatchService {
    pub fn new(transports: Transports, max_concurrent: usize, send_timeout: Duration) -> Self {
        Self {
            transports,
            max_concurrent: max_concurrent.max(1),
            send_timeout,
        }
    }

    pub async fn dispatch(
        &self,
        content: &ChannelContent,
        recipients: &[RecipientRecord],
    ) -> DispatchReport {
        log::info!(
            "(dispatch) Enviando {} mensajes por {} (máx {} simultáneos)",
            recipients.len(),
            content.channel(),
            self.max_concurrent
        );

        // cada envío es dueño de su mensaje para poder correr en `tokio::spawn`
        let sends: Vec<_> = recipients
            .iter()
            .map(|recipient| {
                let message = content.render_for(recipient);
                let address = recipient.address.clone();
                send_one(self.transports.clone(), message, address, self.send_timeout).boxed()
            })
            .collect();
        let mut sends = stream::iter(sends).buffer_unordered(self.max_concurrent);

        let mut report = DispatchReport::default();
        while let Some(outcome) = sends.next().await {
            report.push(outcome);
        }

        log::info!(
            "(dispatch) Finalizado: enviados={} fallidos={}",
            report.sent_count(),
            report.failed_count()
        );
        report
    }
}

async fn send_one(
    transports: Transports,
    message: OutboundMessage,
    address: String,
    send_timeout: Duration,
) -> DispatchOutcome {
    match tokio::time::timeout(send_timeout, transports.send(&message)).await {
        Ok(Ok(message_id)) => {
            log::debug!("(send_one) -> '{}' enviado, id={}", address, message_id);
            DispatchOutcome::Sent {
                address,
                message_id,
            }
        }
        Ok(Err(e)) => {
            log::error!("(send_one) -> Fallo al enviar a '{}': {:?}", address, e);
            DispatchOutcome::Failed {
                address,
                cause: format!("{:#}", e),
            }
        }
        Err(_) => {
            log::error!(
                "(send_one) -> Timeout enviando a '{}' ({:?})",
                address,
                send_timeout
            );
            DispatchOutcome::Failed {
                address,
                cause: format!("timed out after {}s", send_timeout.as_secs()),
            }
        }
    }
}
