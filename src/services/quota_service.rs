//! services/quota_service.rs
//! Ledger de tokens por cliente sobre el proveedor de identidad.
//!
//! El saldo vive en un registro remoto sin bloqueo: cada descuento es
//! leer-calcular-escribir. Dentro de este proceso las escrituras de un mismo
//! cliente se serializan con un mutex por cliente; dos procesos distintos
//! todavía pueden pisarse.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;

use crate::{
    config::app_config::ChannelCosts,
    models::{
        account_model::{AccountPatch, ClientAccount, WhatsAppCredentials},
        error_model::{QuotaReason, ServiceError},
        recipient_model::Channel,
    },
    services::identity_service::IdentityProvider,
};

#[derive(Clone)]
pub struct QuotaService {
    identity: Arc<dyn IdentityProvider>,
    costs: ChannelCosts,
    client_locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl QuotaService {
    pub fn new(identity: Arc<dyn IdentityProvider>, costs: ChannelCosts) -> Self {
        Self {
            identity,
            costs,
            client_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// `batch_size × costo(canal)`
    pub fn required_tokens(&self, channel: Channel, batch_size: usize) -> u64 {
        (batch_size as u64).saturating_mul(self.costs.cost_per_item(channel))
    }

    async fn lock_for(&self, email: &str) -> Arc<Mutex<()>> {
        let mut map = self.client_locks.lock().await;
        map.entry(email.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Saca el mutex del mapa si nadie más lo tiene tomado ni esperando.
    async fn release_lock(&self, email: &str, lock: Arc<Mutex<()>>) {
        let mut map = self.client_locks.lock().await;
        // el mapa y `lock` son las únicas referencias
        if Arc::strong_count(&lock) == 2 {
            map.remove(email);
        }
    }

    #[cfg(test)]
    pub(crate) async fn tracked_clients(&self) -> usize {
        self.client_locks.lock().await.len()
    }

    pub async fn load_account(&self, email: &str) -> Result<ClientAccount, ServiceError> {
        let account = self.identity.find_account(email).await.map_err(|e| {
            log::error!("(load_account) Error consultando cuenta {}: {:?}", email, e);
            ServiceError::Credential(format!("could not read account {}: {}", email, e))
        })?;

        account.ok_or(ServiceError::Quota {
            reason: QuotaReason::AccountNotFound,
            required: 0,
            balance: 0,
        })
    }

    /// Cuenta existente, activa, verificada y con saldo suficiente.
    pub async fn check_eligibility(
        &self,
        email: &str,
        batch_size: usize,
        channel: Channel,
    ) -> Result<ClientAccount, ServiceError> {
        let required = self.required_tokens(channel, batch_size);
        let account = self.load_account(email).await.map_err(|e| match e {
            ServiceError::Quota { reason, .. } => ServiceError::Quota {
                reason,
                required,
                balance: 0,
            },
            other => other,
        })?;

        let reason = if !account.active {
            Some(QuotaReason::Inactive)
        } else if !account.email_verified {
            Some(QuotaReason::Unverified)
        } else if account.balance < required {
            Some(QuotaReason::Insufficient)
        } else {
            None
        };

        if let Some(reason) = reason {
            log::warn!(
                "(check_eligibility) Cliente {} no elegible: {} (required={}, balance={})",
                email,
                reason,
                required,
                account.balance
            );
            return Err(ServiceError::Quota {
                reason,
                required,
                balance: account.balance,
            });
        }

        log::info!(
            "(check_eligibility) Cliente {} elegible: required={}, balance={}",
            email,
            required,
            account.balance
        );
        Ok(account)
    }

    /// Descuenta `amount` tokens y devuelve el nuevo saldo.
    pub async fn deduct(&self, email: &str, amount: u64) -> Result<u64, ServiceError> {
        let lock = self.lock_for(email).await;
        let result = {
            let _guard = lock.lock().await;
            self.apply_deduction(email, amount).await
        };
        self.release_lock(email, lock).await;
        result
    }

    async fn apply_deduction(&self, email: &str, amount: u64) -> Result<u64, ServiceError> {
        let account = self.load_account(email).await?;
        if account.balance < amount {
            log::warn!(
                "(deduct) Saldo de {} ({}) menor al descuento ({}); queda en 0",
                email,
                account.balance,
                amount
            );
        }
        let new_balance = account.balance.saturating_sub(amount);
        self.write_balance(&account, new_balance).await?;

        log::info!(
            "(deduct) {} tokens descontados a {}: {} -> {}",
            amount,
            email,
            account.balance,
            new_balance
        );
        Ok(new_balance)
    }

    /// Recarga de tokens.
    pub async fn credit(&self, email: &str, amount: u64) -> Result<u64, ServiceError> {
        let lock = self.lock_for(email).await;
        let result = {
            let _guard = lock.lock().await;
            self.apply_credit(email, amount).await
        };
        self.release_lock(email, lock).await;
        result
    }

    async fn apply_credit(&self, email: &str, amount: u64) -> Result<u64, ServiceError> {
        let account = self.load_account(email).await?;
        let new_balance = account.balance.saturating_add(amount);
        self.write_balance(&account, new_balance).await?;

        log::info!(
            "(credit) {} tokens acreditados a {}: {} -> {}",
            amount,
            email,
            account.balance,
            new_balance
        );
        Ok(new_balance)
    }

    pub async fn current_balance(&self, email: &str) -> Result<u64, ServiceError> {
        Ok(self.load_account(email).await?.balance)
    }

    pub async fn set_active(&self, email: &str, active: bool) -> Result<(), ServiceError> {
        let account = self.load_account(email).await?;
        self.patch(
            &account,
            AccountPatch {
                active: Some(active),
                ..AccountPatch::default()
            },
        )
        .await
    }

    /// Guarda las credenciales de WhatsApp en la cuenta si cambiaron.
    pub async fn store_whatsapp_credentials(
        &self,
        account: &ClientAccount,
        credentials: &WhatsAppCredentials,
    ) -> Result<(), ServiceError> {
        if account.whatsapp.as_ref() == Some(credentials) {
            return Ok(());
        }
        log::info!(
            "(store_whatsapp_credentials) Actualizando credenciales WhatsApp de {}",
            account.email
        );
        self.patch(
            account,
            AccountPatch {
                whatsapp: Some(credentials.clone()),
                ..AccountPatch::default()
            },
        )
        .await
    }

    async fn write_balance(&self, account: &ClientAccount, balance: u64) -> Result<(), ServiceError> {
        self.patch(
            account,
            AccountPatch {
                balance: Some(balance),
                ..AccountPatch::default()
            },
        )
        .await
    }

    async fn patch(&self, account: &ClientAccount, patch: AccountPatch) -> Result<(), ServiceError> {
        self.identity
            .update_account(&account.id, &patch)
            .await
            .map_err(|e| {
                log::error!("(patch) Error actualizando cuenta {}: {:?}", account.email, e);
                ServiceError::Credential(format!("could not update account {}: {}", account.email, e))
            })
    }
}
