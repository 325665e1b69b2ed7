//! SQL implementation of the session type repository

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::error::DbError;
use crate::models::SessionType;
use crate::repositories::rows::session_type_from_row;
use crate::repository::SessionTypeRepository;
use crate::DbClient;

#[derive(Debug, Clone)]
pub struct SqlSessionTypeRepository {
    db_client: DbClient,
}

impl SqlSessionTypeRepository {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }
}

#[async_trait]
impl SessionTypeRepository for SqlSessionTypeRepository {
    async fn init_schema(&self) -> Result<(), DbError> {
        debug!("Initializing session type schema");

        let query = r#"
            CREATE TABLE IF NOT EXISTS session_types (
                id TEXT PRIMARY KEY,
                builder_id TEXT NOT NULL,
                title TEXT NOT NULL,
                duration_minutes BIGINT NOT NULL,
                price_minor BIGINT NOT NULL DEFAULT 0,
                currency TEXT NOT NULL,
                is_active BIGINT NOT NULL DEFAULT 1,
                requires_auth BIGINT NOT NULL DEFAULT 0
            )
        "#;

        self.db_client.execute(query).await?;

        info!("Session type schema initialized successfully");
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<SessionType>, DbError> {
        debug!("Finding session type: {}", id);

        let query = r#"
            SELECT id, builder_id, title, duration_minutes, price_minor, currency,
                   is_active, requires_auth
            FROM session_types
            WHERE id = $1
        "#;

        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to find session type: {}", e);
                DbError::QueryError(e.to_string())
            })?;

        row.as_ref().map(session_type_from_row).transpose()
    }

    async fn upsert(&self, session_type: SessionType) -> Result<SessionType, DbError> {
        debug!("Upserting session type: {}", session_type.id);

        let query = if self.find_by_id(&session_type.id).await?.is_some() {
            r#"
                UPDATE session_types
                SET builder_id = $1, title = $2, duration_minutes = $3, price_minor = $4,
                    currency = $5, is_active = $6, requires_auth = $7
                WHERE id = $8
            "#
        } else {
            r#"
                INSERT INTO session_types
                    (builder_id, title, duration_minutes, price_minor, currency,
                     is_active, requires_auth, id)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#
        };

        sqlx::query(query)
            .bind(&session_type.builder_id)
            .bind(&session_type.title)
            .bind(session_type.duration_minutes)
            .bind(session_type.price_minor)
            .bind(&session_type.currency)
            .bind(i64::from(session_type.is_active))
            .bind(i64::from(session_type.requires_auth))
            .bind(&session_type.id)
            .execute(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to store session type: {}", e);
                DbError::from_query(e)
            })?;

        Ok(session_type)
    }
}
