use std::{str::FromStr, sync::Arc, time::Duration};

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Sqlite,
};

use crate::config::app_config::AppConfig;
use crate::logger::init_logger;
use crate::services::{
    account_service::AccountService,
    audit_service::{AuditService, LocalLogStore},
    batch_service::BatchService,
    dispatch_service::DispatchService,
    email_service::EmailService,
    event_source_service::HttpDeliveryEventSource,
    extractor_service::ExtractorService,
    identity_service::{HttpIdentityProvider, IdentityProvider},
    operation_service::OperationService,
    quota_service::QuotaService,
    report_service::ReportService,
    transport_service::{CloudWhatsAppTransport, HttpSmsTransport, Transports},
};

mod app;
mod config;
mod handlers;
mod logger;
mod models;
mod services;

#[cfg(test)]
mod tests;

async fn setup_database(database_path: &str) -> anyhow::Result<Pool<Sqlite>> {
    // 1) Crear carpeta de la base si no existe
    if let Some(parent) = std::path::Path::new(database_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("No se pudo crear directorio {:?}", parent))?;
        }
    }

    let db_url = format!("sqlite:{}", database_path);
    log::info!("Conectando a SQLite en {}", db_url);

    // 2) Conectarnos con SQLx
    let options = SqliteConnectOptions::from_str(&db_url)?.create_if_missing(true);
    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .context("No se pudo conectar a la base de datos SQLite.")?;

    Ok(db_pool)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok(); // Cargar .env al inicio
    init_logger();

    let config = AppConfig::from_env()?;

    // Conectarnos a la DB
    let db_pool = setup_database(&config.database_path).await?;

    // OperationService
    let operation_service = OperationService::new(db_pool.clone());
    operation_service
        .run_migrations()
        .await
        .context("Fallo en migraciones de 'batch_operations'")?;

    // Colaboradores externos
    let identity: Arc<dyn IdentityProvider> =
        Arc::new(HttpIdentityProvider::new(config.identity.clone()));
    let email_service = Arc::new(EmailService::new(config.smtp.clone()));
    let log_store = LocalLogStore::new(&config.log_dir);
    let events = Arc::new(HttpDeliveryEventSource::new(config.events.clone()));

    let transports = Transports {
        email: email_service.clone(),
        sms: Arc::new(HttpSmsTransport::new(config.sms.clone())),
        whatsapp: Arc::new(CloudWhatsAppTransport::new(config.whatsapp.clone())),
    };

    // Servicios del núcleo
    let quota_service = QuotaService::new(identity.clone(), config.costs);
    let audit_service = AuditService::new(
        Arc::new(log_store.clone()),
        email_service.clone(),
        config.flags.clone(),
    );
    let batch_service = BatchService::new(
        ExtractorService::new()?,
        quota_service.clone(),
        DispatchService::new(
            transports,
            config.max_concurrent_sends,
            config.send_timeout,
        ),
        audit_service,
        operation_service.clone(),
        events.clone(),
        config.flags.clone(),
    );
    let account_service = AccountService::new(
        identity.clone(),
        config.flags.clone(),
        config.verification_max_attempts,
        config.verification_backoff,
    );
    let report_service = ReportService::new(
        identity.clone(),
        events.clone(),
        events,
        Arc::new(log_store.clone()),
        email_service,
        config.flags.clone(),
        config.report_all_clients,
    );

    // Reporte programado
    if config.report_interval_hours > 0 {
        log::info!(
            "Reporte mensual programado cada {} horas",
            config.report_interval_hours
        );
        report_service
            .clone()
            .spawn_schedule(Duration::from_secs(config.report_interval_hours * 3600));
    }

    // Levantar servidor
    log::info!(
        "Levantando servidor en {}:{}",
        config.server_host,
        config.server_port
    );
    HttpServer::new(move || {
        App::new()
            // Aumentar límite si recibes planillas muy grandes
            .app_data(web::JsonConfig::default().limit(16 * 1024 * 1024))
            .app_data(web::Data::new(operation_service.clone()))
            .app_data(web::Data::new(batch_service.clone()))
            .app_data(web::Data::new(quota_service.clone()))
            .app_data(web::Data::new(account_service.clone()))
            .app_data(web::Data::new(report_service.clone()))
            .app_data(web::Data::new(log_store.clone()))
            .configure(app::init_app)
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .run()
    .await?;

    Ok(())
}
