//! config/app_config.rs
//! Configuración del servicio leída desde el entorno (.env), con valores por defecto.

use std::{env, str::FromStr, time::Duration};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::{
    models::{error_model::ServiceError, recipient_model::Channel},
    services::dispatch_service::DEFAULT_MAX_CONCURRENT_SENDS,
};

/// Operaciones con efectos secundarios que se pueden apagar por entorno.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Feature {
    SendEmail,
    SendSms,
    SendWhatsApp,
    UploadLog,
    EmailLog,
    VerificationEmail,
    MonthlyReport,
}

impl Feature {
    /// Nombre de la variable de entorno que controla el flag.
    pub fn env_var(&self) -> &'static str {
        match self {
            Feature::SendEmail => "ENABLE_SEND_EMAIL",
            Feature::SendSms => "ENABLE_SEND_SMS",
            Feature::SendWhatsApp => "ENABLE_SEND_WHATSAPP",
            Feature::UploadLog => "ENABLE_UPLOAD_LOG",
            Feature::EmailLog => "ENABLE_EMAIL_LOG",
            Feature::VerificationEmail => "ENABLE_VERIFICATION_EMAIL",
            Feature::MonthlyReport => "ENABLE_MONTHLY_REPORT",
        }
    }

    pub fn send_for(channel: Channel) -> Self {
        match channel {
            Channel::Email => Feature::SendEmail,
            Channel::Sms => Feature::SendSms,
            Channel::WhatsApp => Feature::SendWhatsApp,
        }
    }
}

/// Flags booleanos. Todos apagados por defecto: un flag apagado
/// hace fallar la operación, nunca la ignora en silencio.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureFlags {
    pub send_email: bool,
    pub send_sms: bool,
    pub send_whatsapp: bool,
    pub upload_log: bool,
    pub email_log: bool,
    pub verification_email: bool,
    pub monthly_report: bool,
}

impl FeatureFlags {
    pub fn all_enabled() -> Self {
        FeatureFlags {
            send_email: true,
            send_sms: true,
            send_whatsapp: true,
            upload_log: true,
            email_log: true,
            verification_email: true,
            monthly_report: true,
        }
    }

    pub fn is_enabled(&self, feature: Feature) -> bool {
        match feature {
            Feature::SendEmail => self.send_email,
            Feature::SendSms => self.send_sms,
            Feature::SendWhatsApp => self.send_whatsapp,
            Feature::UploadLog => self.upload_log,
            Feature::EmailLog => self.email_log,
            Feature::VerificationEmail => self.verification_email,
            Feature::MonthlyReport => self.monthly_report,
        }
    }

    pub fn set(&mut self, feature: Feature, enabled: bool) {
        match feature {
            Feature::SendEmail => self.send_email = enabled,
            Feature::SendSms => self.send_sms = enabled,
            Feature::SendWhatsApp => self.send_whatsapp = enabled,
            Feature::UploadLog => self.upload_log = enabled,
            Feature::EmailLog => self.email_log = enabled,
            Feature::VerificationEmail => self.verification_email = enabled,
            Feature::MonthlyReport => self.monthly_report = enabled,
        }
    }

    /// Falla con `FeatureDisabled` si el flag está apagado.
    pub fn require(&self, feature: Feature) -> Result<(), ServiceError> {
        if self.is_enabled(feature) {
            Ok(())
        } else {
            log::warn!(
                "(require) Operación bloqueada: {} está deshabilitado",
                feature.env_var()
            );
            Err(ServiceError::FeatureDisabled(feature.env_var()))
        }
    }

    fn from_env() -> Result<Self> {
        let mut flags = FeatureFlags::default();
        for feature in [
            Feature::SendEmail,
            Feature::SendSms,
            Feature::SendWhatsApp,
            Feature::UploadLog,
            Feature::EmailLog,
            Feature::VerificationEmail,
            Feature::MonthlyReport,
        ] {
            flags.set(feature, env_bool(feature.env_var(), false)?);
        }
        Ok(flags)
    }
}

/// Costo en tokens por destinatario para cada canal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChannelCosts {
    pub email: u64,
    pub sms: u64,
    pub whatsapp: u64,
}

impl ChannelCosts {
    pub fn cost_per_item(&self, channel: Channel) -> u64 {
        match channel {
            Channel::Email => self.email,
            Channel::Sms => self.sms,
            Channel::WhatsApp => self.whatsapp,
        }
    }
}

impl Default for ChannelCosts {
    fn default() -> Self {
        ChannelCosts {
            email: 1,
            sms: 1,
            whatsapp: 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub from_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct SmsSettings {
    pub api_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct WhatsAppSettings {
    /// Base del Graph API, p.e. https://graph.facebook.com/v17.0
    pub api_url: String,
}

impl Default for WhatsAppSettings {
    fn default() -> Self {
        WhatsAppSettings {
            api_url: "https://graph.facebook.com/v17.0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IdentitySettings {
    pub api_url: String,
    pub api_token: String,
}

#[derive(Debug, Clone, Default)]
pub struct EventsSettings {
    pub api_url: String,
    pub api_token: String,
    /// Grupo de logs donde el proveedor SMS publica sus entregas.
    pub sms_provider_log_group: String,
}

/// Configuración completa del servicio.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_host: String,
    pub server_port: u16,
    pub database_path: String,
    pub log_dir: String,
    pub costs: ChannelCosts,
    pub flags: FeatureFlags,
    pub max_concurrent_sends: usize,
    pub send_timeout: Duration,
    pub verification_max_attempts: u32,
    pub verification_backoff: Duration,
    /// false: sólo el primer cliente elegible por corrida (comportamiento histórico).
    pub report_all_clients: bool,
    /// 0 desactiva el reporte programado.
    pub report_interval_hours: u64,
    pub smtp: SmtpSettings,
    pub sms: SmsSettings,
    pub whatsapp: WhatsAppSettings,
    pub identity: IdentitySettings,
    pub events: EventsSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            server_host: "0.0.0.0".to_string(),
            server_port: 5022,
            database_path: "data/operations.db".to_string(),
            log_dir: "./files/logs".to_string(),
            costs: ChannelCosts::default(),
            flags: FeatureFlags::default(),
            max_concurrent_sends: DEFAULT_MAX_CONCURRENT_SENDS,
            send_timeout: Duration::from_secs(30),
            verification_max_attempts: 3,
            verification_backoff: Duration::from_secs(1),
            report_all_clients: false,
            report_interval_hours: 0,
            smtp: SmtpSettings {
                port: 587,
                ..SmtpSettings::default()
            },
            sms: SmsSettings::default(),
            whatsapp: WhatsAppSettings::default(),
            identity: IdentitySettings::default(),
            events: EventsSettings::default(),
        }
    }
}

impl AppConfig {
    /// Lee la configuración del entorno. Llamar después de `dotenv()`.
    pub fn from_env() -> Result<Self> {
        let defaults = AppConfig::default();

        let config = AppConfig {
            server_host: env_string("SERVER_HOST", &defaults.server_host),
            server_port: env_parse("SERVER_PORT", defaults.server_port)?,
            database_path: env_string("DATABASE_PATH", &defaults.database_path),
            log_dir: env_string("LOG_DIR", &defaults.log_dir),
            costs: ChannelCosts {
                email: env_parse("COST_PER_EMAIL", defaults.costs.email)?,
                sms: env_parse("COST_PER_SMS", defaults.costs.sms)?,
                whatsapp: env_parse("COST_PER_WHATSAPP", defaults.costs.whatsapp)?,
            },
            flags: FeatureFlags::from_env()?,
            max_concurrent_sends: env_parse("MAX_CONCURRENT_SENDS", defaults.max_concurrent_sends)?
                .max(1),
            send_timeout: send_timeout_from_secs(env_parse(
                "SEND_TIMEOUT_SECS",
                defaults.send_timeout.as_secs(),
            )?),
            verification_max_attempts: env_parse(
                "VERIFICATION_MAX_ATTEMPTS",
                defaults.verification_max_attempts,
            )?
            .max(1),
            verification_backoff: defaults.verification_backoff,
            report_all_clients: env_bool("REPORT_ALL_CLIENTS", defaults.report_all_clients)?,
            report_interval_hours: env_parse(
                "REPORT_INTERVAL_HOURS",
                defaults.report_interval_hours,
            )?,
            smtp: SmtpSettings {
                host: env_string("SMTP_HOST", ""),
                port: env_parse("SMTP_PORT", defaults.smtp.port)?,
                user: env_string("SMTP_USER", ""),
                pass: env_string("SMTP_PASS", ""),
                from_name: env_string("SMTP_FROM_NAME", "Bulk Dispatch"),
            },
            sms: SmsSettings {
                api_url: env_string("SMS_API_URL", ""),
                api_key: env_string("SMS_API_KEY", ""),
            },
            whatsapp: WhatsAppSettings {
                api_url: env_string("WHATSAPP_API_URL", &defaults.whatsapp.api_url),
            },
            identity: IdentitySettings {
                api_url: env_string("IDP_API_URL", ""),
                api_token: env_string("IDP_API_TOKEN", ""),
            },
            events: EventsSettings {
                api_url: env_string("EVENTS_API_URL", ""),
                api_token: env_string("EVENTS_API_TOKEN", ""),
                sms_provider_log_group: env_string(
                    "SMS_PROVIDER_LOG_GROUP",
                    "sms-delivery-logs",
                ),
            },
        };

        log::info!(
            "(from_env) Config cargada: port={}, max_concurrent_sends={}, flags={:?}",
            config.server_port,
            config.max_concurrent_sends,
            config.flags
        );
        Ok(config)
    }
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("Valor inválido para {}: '{}' ({})", key, raw, e)),
        Err(_) => Ok(default),
    }
}

fn env_bool(key: &str, default: bool) -> Result<bool> {
    match env::var(key) {
        Ok(raw) => parse_bool(&raw).ok_or_else(|| anyhow!("Valor booleano inválido para {}: '{}'", key, raw)),
        Err(_) => Ok(default),
    }
}

/// Timeout por envío; con 0 todo envío expiraría, se lleva a 1 segundo.
pub fn send_timeout_from_secs(secs: u64) -> Duration {
    Duration::from_secs(secs.max(1))
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
