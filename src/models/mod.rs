//! models/mod.rs
//! Módulo raíz para modelos/estructuras compartidas.

pub mod account_model;
pub mod audit_model;
pub mod batch_model;
pub mod error_model;
pub mod operation_model;
pub mod recipient_model;
pub mod report_model;
