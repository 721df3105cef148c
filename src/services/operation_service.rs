use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Pool, Row, Sqlite};
use uuid::Uuid;

use crate::models::operation_model::{
    BatchOperationRecord, CreateOperationRequest, ListOperationsResponse, OperationCompletion,
};

const SELECT_COLUMNS: &str = r#"
    id, channel, client_email, is_draft, status, error_message,
    recipient_count, sent_count, failed_count, log_file, created_at, updated_at
"#;

/// Historial de lotes en SQLite.
#[derive(Clone, Debug)]
pub struct OperationService {
    db_pool: Pool<Sqlite>,
}

impl OperationService {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        OperationService { db_pool }
    }

    /// Crea el esquema si no existe
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS batch_operations (
                id TEXT PRIMARY KEY NOT NULL,
                channel TEXT NOT NULL,
                client_email TEXT,
                is_draft INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL,
                error_message TEXT,
                recipient_count INTEGER NOT NULL DEFAULT 0,
                sent_count INTEGER NOT NULL DEFAULT 0,
                failed_count INTEGER NOT NULL DEFAULT 0,
                log_file TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.db_pool)
        .await
        .context("Fallo al crear tabla batch_operations")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_batch_operations_created ON batch_operations(created_at)",
        )
        .execute(&self.db_pool)
        .await
        .context("Fallo al crear índice de batch_operations")?;

        Ok(())
    }

    /// Crea la operación en DB con estado "pending"
    pub async fn create_operation(&self, req: CreateOperationRequest) -> Result<String> {
        let op_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO batch_operations (
                id, channel, client_email, is_draft, status, error_message,
                recipient_count, sent_count, failed_count, log_file,
                created_at, updated_at
            )
            VALUES (?1, ?2, NULL, ?3, 'pending', NULL, 0, 0, 0, NULL, ?4, ?4)
            "#,
        )
        .bind(&op_id)
        .bind(&req.channel)
        .bind(req.is_draft as i64)
        .bind(&now)
        .execute(&self.db_pool)
        .await
        .context("Fallo al insertar operation")?;

        log::info!(
            "(create_operation) Operación {} creada (channel={}, draft={})",
            op_id,
            req.channel,
            req.is_draft
        );
        Ok(op_id)
    }

    pub async fn update_operation_status(
        &self,
        operation_id: &str,
        status: &str,
        error: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"UPDATE batch_operations SET status = ?1, error_message = ?2, updated_at = ?3 WHERE id = ?4"#,
        )
        .bind(status)
        .bind(error)
        .bind(now)
        .bind(operation_id)
        .execute(&self.db_pool)
        .await
        .context("Failed to update operation status")?;
        Ok(())
    }

    /// Marca la operación como terminada y guarda los contadores.
    pub async fn complete_operation(
        &self,
        operation_id: &str,
        completion: &OperationCompletion,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            UPDATE batch_operations
            SET status = 'done',
                error_message = NULL,
                client_email = ?2,
                recipient_count = ?3,
                sent_count = ?4,
                failed_count = ?5,
                log_file = ?6,
                updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(operation_id)
        .bind(&completion.client_email)
        .bind(completion.recipient_count)
        .bind(completion.sent_count)
        .bind(completion.failed_count)
        .bind(&completion.log_file)
        .bind(now)
        .execute(&self.db_pool)
        .await
        .context("Fallo al completar operación")?;

        Ok(())
    }

    pub async fn mark_operation_failed(&self, op_id: &str, error: String) -> Result<()> {
        self.update_operation_status(op_id, "failed", Some(&error))
            .await
    }

    /// Obtiene la info de una operación
    pub async fn get_operation(&self, op_id: &str) -> Result<BatchOperationRecord> {
        self.find_operation(op_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("No se encontró operación con id={}", op_id))
    }

    /// `None` si no existe; los errores de la base se propagan aparte.
    pub async fn find_operation(&self, op_id: &str) -> Result<Option<BatchOperationRecord>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM batch_operations WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(op_id)
            .fetch_optional(&self.db_pool)
            .await
            .context("Fallo al consultar batch_operations")?;

        row.as_ref().map(row_to_record).transpose()
    }

    /// Lista operaciones con paginación
    pub async fn list_operations(
        &self,
        page: u64,
        page_size: u64,
    ) -> Result<ListOperationsResponse> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, 200);
        let offset = (page - 1) * page_size;

        let total_row = sqlx::query("SELECT COUNT(*) AS cnt FROM batch_operations")
            .fetch_one(&self.db_pool)
            .await?;
        let total: i64 = total_row.try_get("cnt")?;

        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM batch_operations ORDER BY created_at DESC LIMIT ?1 OFFSET ?2"
        );
        let rows = sqlx::query(&sql)
            .bind(page_size as i64)
            .bind(offset as i64)
            .fetch_all(&self.db_pool)
            .await?;

        let items = rows
            .iter()
            .map(row_to_record)
            .collect::<Result<Vec<_>>>()?;

        Ok(ListOperationsResponse {
            total: total.max(0) as u64,
            page,
            page_size,
            items,
        })
    }
}

fn row_to_record(row: &SqliteRow) -> Result<BatchOperationRecord> {
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;
    let is_draft: i64 = row.try_get("is_draft")?;

    Ok(BatchOperationRecord {
        id: row.try_get("id")?,
        channel: row.try_get("channel")?,
        client_email: row.try_get("client_email")?,
        is_draft: is_draft != 0,
        status: row.try_get("status")?,
        error_message: row.try_get("error_message")?,
        recipient_count: row.try_get("recipient_count")?,
        sent_count: row.try_get("sent_count")?,
        failed_count: row.try_get("failed_count")?,
        log_file: row.try_get("log_file")?,
        created_at: created_at.parse::<DateTime<Utc>>()?,
        updated_at: updated_at.parse::<DateTime<Utc>>()?,
    })
}
