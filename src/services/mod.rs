//! services/mod.rs
//! Módulo que agrupa distintos "servicios" o "capas de negocio" de la app.

pub mod account_service;
pub mod audit_service;
pub mod batch_service;
pub mod dispatch_service;
pub mod email_service;
pub mod event_source_service;
pub mod extractor_service;
pub mod identity_service;
pub mod operation_service;
pub mod quota_service;
pub mod report_service;
pub mod transport_service;
