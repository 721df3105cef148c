//! models/account_model.rs
//! Cuenta de cliente y capa de adaptación con el proveedor de identidad.
//!
//! El proveedor guarda la metadata en `app_metadata` con nombres snake_case
//! propios (`tokens`, `is_active`, `wa_access_token`, ...). Sólo este módulo
//! conoce esos nombres; el resto del código usa `ClientAccount` y `AccountPatch`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhatsAppCredentials {
    #[serde(skip_serializing)]
    pub access_token: String,
    pub phone_number_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientAccount {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub mobile: Option<String>,
    pub active: bool,
    pub email_verified: bool,
    pub balance: u64,
    pub whatsapp: Option<WhatsAppCredentials>,
}

impl ClientAccount {
    /// Cliente candidato al reporte mensual.
    pub fn is_report_eligible(&self) -> bool {
        self.email_verified && self.active && self.balance > 0
    }

    /// Nombre del stream donde se registran los envíos SMS del cliente.
    pub fn sms_log_stream(&self) -> String {
        let sanitized: String = self
            .email
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!("sms-sends/{}", sanitized)
    }
}

/// Cambios parciales sobre la metadata de una cuenta.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountPatch {
    pub balance: Option<u64>,
    pub active: Option<bool>,
    pub whatsapp: Option<WhatsAppCredentials>,
}

// ---------------------------------------------------------------------------
// Formato crudo del proveedor de identidad
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderAppMetadata {
    #[serde(default)]
    pub tokens: Option<i64>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub mobile_number: Option<String>,
    #[serde(default)]
    pub wa_access_token: Option<String>,
    #[serde(default)]
    pub wa_phone_number_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderUser {
    pub user_id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub app_metadata: ProviderAppMetadata,
}

impl ProviderUser {
    pub fn into_account(self) -> ClientAccount {
        let meta = self.app_metadata;
        let whatsapp = match (meta.wa_access_token, meta.wa_phone_number_id) {
            (Some(access_token), Some(phone_number_id))
                if !access_token.is_empty() && !phone_number_id.is_empty() =>
            {
                Some(WhatsAppCredentials {
                    access_token,
                    phone_number_id,
                })
            }
            _ => None,
        };

        ClientAccount {
            id: self.user_id,
            email: self.email.trim().to_lowercase(),
            name: self.name,
            mobile: meta.mobile_number,
            active: meta.is_active.unwrap_or(false),
            email_verified: self.email_verified,
            // saldos negativos o ausentes se tratan como cero
            balance: meta.tokens.unwrap_or(0).max(0) as u64,
            whatsapp,
        }
    }
}

impl AccountPatch {
    /// Cuerpo JSON del PATCH hacia el proveedor.
    pub fn to_provider_body(&self) -> serde_json::Value {
        let mut meta = serde_json::Map::new();
        if let Some(balance) = self.balance {
            meta.insert("tokens".into(), serde_json::json!(balance));
        }
        if let Some(active) = self.active {
            meta.insert("is_active".into(), serde_json::json!(active));
        }
        if let Some(wa) = &self.whatsapp {
            meta.insert("wa_access_token".into(), serde_json::json!(wa.access_token));
            meta.insert(
                "wa_phone_number_id".into(),
                serde_json::json!(wa.phone_number_id),
            );
        }
        serde_json::json!({ "app_metadata": meta })
    }

    pub fn is_empty(&self) -> bool {
        self.balance.is_none() && self.active.is_none() && self.whatsapp.is_none()
    }
}
