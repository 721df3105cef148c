use std::{sync::Arc, time::Duration};

use crate::{
    config::app_config::{Feature, FeatureFlags},
    models::error_model::ServiceError,
    services::identity_service::IdentityProvider,
};

/// Operaciones de cuenta que no son parte del ledger.
#[derive(Clone)]
pub struct AccountService {
    identity: Arc<dyn IdentityProvider>,
    flags: FeatureFlags,
    max_attempts: u32,
    backoff: Duration,
}

impl AccountService {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        flags: FeatureFlags,
        max_attempts: u32,
        backoff: Duration,
    ) -> Self {
        Self {
            identity,
            flags,
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Pide al proveedor el email de verificación. Una cuenta recién creada
    /// puede tardar en aparecer, así que se reintenta con espera fija.
    pub async fn request_verification(&self, email: &str) -> Result<u32, ServiceError> {
        self.flags.require(Feature::VerificationEmail)?;

        let mut last_error = String::new();
        for attempt in 1..=self.max_attempts {
            match self.try_send_verification(email).await {
                Ok(()) => {
                    log::info!(
                        "(request_verification) Email de verificación enviado a {} (intento {})",
                        email,
                        attempt
                    );
                    return Ok(attempt);
                }
                Err(e) => {
                    log::warn!(
                        "(request_verification) Intento {}/{} falló para {}: {}",
                        attempt,
                        self.max_attempts,
                        email,
                        e
                    );
                    last_error = e;
                }
            }
            if attempt < self.max_attempts {
                tokio::time::sleep(self.backoff).await;
            }
        }

        Err(ServiceError::Credential(format!(
            "verification email for {} failed after {} attempts: {}",
            email, self.max_attempts, last_error
        )))
    }

    async fn try_send_verification(&self, email: &str) -> Result<(), String> {
        let account = self
            .identity
            .find_account(email)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("account {} not found", email))?;

        self.identity
            .send_verification_email(&account.id)
            .await
            .map_err(|e| e.to_string())
    }
}
