//! handlers/log_handler.rs
use actix_files::NamedFile;
use actix_web::web;

use crate::services::audit_service::LocalLogStore;

/// GET /api/logs/{filename}
/// Sirve un log de auditoría o reporte guardado en disco.
///
/// Ejemplo de URL: http://localhost:5022/api/logs/ana_promo-de-marzo_20240301-101500.txt
pub async fn serve_log_file(
    path: web::Path<String>,
    store: web::Data<LocalLogStore>,
) -> Result<NamedFile, actix_web::Error> {
    let filename = path.into_inner();
    let file_path = store.path_for(&filename).map_err(|e| {
        log::warn!("(serve_log_file) {}", e);
        actix_web::error::ErrorBadRequest(e.to_string())
    })?;

    // Retorna 404 si no existe.
    Ok(NamedFile::open_async(file_path).await?)
}
