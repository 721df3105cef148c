//! config/mod.rs
//! Configuración global del servicio (variables de entorno, flags, costos).

pub mod app_config;
