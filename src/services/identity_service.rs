//! services/identity_service.rs
//! Acceso al proveedor de identidad (cuentas de clientes).

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;

use crate::{
    config::app_config::IdentitySettings,
    models::account_model::{AccountPatch, ClientAccount, ProviderUser},
};

const PAGE_SIZE: usize = 50;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn find_account(&self, email: &str) -> Result<Option<ClientAccount>>;

    async fn list_accounts(&self) -> Result<Vec<ClientAccount>>;

    async fn update_account(&self, account_id: &str, patch: &AccountPatch) -> Result<()>;

    async fn send_verification_email(&self, account_id: &str) -> Result<()>;
}

/// Cliente HTTP para una API de administración estilo Auth0
/// (`/api/v2/users-by-email`, `/api/v2/users/{id}`, `/api/v2/jobs/verification-email`).
#[derive(Clone)]
pub struct HttpIdentityProvider {
    settings: IdentitySettings,
    http_client: Client,
}

impl HttpIdentityProvider {
    pub fn new(settings: IdentitySettings) -> Self {
        Self {
            settings,
            http_client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.settings.api_url.trim_end_matches('/'), path)
    }

    async fn check(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let body_txt = resp.text().await.unwrap_or_default();
        log::error!(
            "(identity) {} falló: status={} body='{}'",
            what,
            status,
            body_txt
        );
        Err(anyhow!("{} failed with status {}: {}", what, status, body_txt))
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn find_account(&self, email: &str) -> Result<Option<ClientAccount>> {
        let url = self.url(&format!(
            "/api/v2/users-by-email?email={}",
            urlencoding::encode(email)
        ));
        log::debug!("(find_account) GET {}", url);

        let resp = self
            .http_client
            .get(&url)
            .bearer_auth(&self.settings.api_token)
            .send()
            .await
            .context("Fallo al hacer GET users-by-email")?;
        let resp = Self::check(resp, "users-by-email").await?;

        let users = resp
            .json::<Vec<ProviderUser>>()
            .await
            .context("Respuesta users-by-email inválida")?;

        Ok(users.into_iter().next().map(ProviderUser::into_account))
    }

    async fn list_accounts(&self) -> Result<Vec<ClientAccount>> {
        let mut accounts = Vec::new();
        let mut page = 0usize;
        loop {
            let url = self.url(&format!(
                "/api/v2/users?page={}&per_page={}",
                page, PAGE_SIZE
            ));
            let resp = self
                .http_client
                .get(&url)
                .bearer_auth(&self.settings.api_token)
                .send()
                .await
                .context("Fallo al listar usuarios")?;
            let resp = Self::check(resp, "list users").await?;
            let users = resp
                .json::<Vec<ProviderUser>>()
                .await
                .context("Respuesta de usuarios inválida")?;

            let fetched = users.len();
            accounts.extend(users.into_iter().map(ProviderUser::into_account));
            if fetched < PAGE_SIZE {
                break;
            }
            page += 1;
        }

        log::info!("(list_accounts) {} cuentas obtenidas", accounts.len());
        Ok(accounts)
    }

    async fn update_account(&self, account_id: &str, patch: &AccountPatch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let url = self.url(&format!("/api/v2/users/{}", urlencoding::encode(account_id)));
        let resp = self
            .http_client
            .patch(&url)
            .bearer_auth(&self.settings.api_token)
            .json(&patch.to_provider_body())
            .send()
            .await
            .context("Fallo al hacer PATCH del usuario")?;
        Self::check(resp, "patch user").await?;
        Ok(())
    }

    async fn send_verification_email(&self, account_id: &str) -> Result<()> {
        let url = self.url("/api/v2/jobs/verification-email");
        let resp = self
            .http_client
            .post(&url)
            .bearer_auth(&self.settings.api_token)
            .json(&serde_json::json!({ "user_id": account_id }))
            .send()
            .await
            .context("Fallo al solicitar email de verificación")?;
        Self::check(resp, "verification-email").await?;
        Ok(())
    }
}
