//! SQL implementation of the event mapping repository

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::error::DbError;
use crate::models::{format_timestamp, now_utc, EventMapping};
use crate::repositories::rows::event_mapping_from_row;
use crate::repository::EventMappingRepository;
use crate::DbClient;

const SELECT_MAPPING: &str = r#"
    SELECT session_type_id, provider_event_type_id, provider_event_type_uri,
           created_at, updated_at
    FROM event_mappings
"#;

#[derive(Debug, Clone)]
pub struct SqlEventMappingRepository {
    db_client: DbClient,
}

impl SqlEventMappingRepository {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }

    async fn find_where(&self, clause: &str, value: &str) -> Result<Option<EventMapping>, DbError> {
        let query = format!("{} WHERE {} = $1", SELECT_MAPPING, clause);
        let row = sqlx::query(&query)
            .bind(value)
            .fetch_optional(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to find event mapping: {}", e);
                DbError::QueryError(e.to_string())
            })?;

        row.as_ref().map(event_mapping_from_row).transpose()
    }
}

#[async_trait]
impl EventMappingRepository for SqlEventMappingRepository {
    async fn init_schema(&self) -> Result<(), DbError> {
        debug!("Initializing event mapping schema");

        let query = r#"
            CREATE TABLE IF NOT EXISTS event_mappings (
                session_type_id TEXT PRIMARY KEY,
                provider_event_type_id TEXT NOT NULL,
                provider_event_type_uri TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
        "#;

        self.db_client.execute(query).await?;

        info!("Event mapping schema initialized successfully");
        Ok(())
    }

    async fn find_by_session_type(
        &self,
        session_type_id: &str,
    ) -> Result<Option<EventMapping>, DbError> {
        debug!("Finding event mapping for session type: {}", session_type_id);
        self.find_where("session_type_id", session_type_id).await
    }

    async fn find_by_event_type_uri(&self, uri: &str) -> Result<Option<EventMapping>, DbError> {
        debug!("Finding event mapping for provider event type: {}", uri);
        self.find_where("provider_event_type_uri", uri).await
    }

    async fn upsert(
        &self,
        session_type_id: &str,
        provider_event_type_id: &str,
        provider_event_type_uri: &str,
    ) -> Result<EventMapping, DbError> {
        let now = now_utc();
        let now_text = format_timestamp(&now);

        if let Some(existing) = self.find_by_session_type(session_type_id).await? {
            debug!("Updating event mapping for session type: {}", session_type_id);

            let query = r#"
                UPDATE event_mappings
                SET provider_event_type_id = $1, provider_event_type_uri = $2, updated_at = $3
                WHERE session_type_id = $4
            "#;

            sqlx::query(query)
                .bind(provider_event_type_id)
                .bind(provider_event_type_uri)
                .bind(&now_text)
                .bind(session_type_id)
                .execute(self.db_client.pool())
                .await
                .map_err(|e| {
                    error!("Failed to update event mapping: {}", e);
                    DbError::from_query(e)
                })?;

            return Ok(EventMapping {
                provider_event_type_id: provider_event_type_id.to_string(),
                provider_event_type_uri: provider_event_type_uri.to_string(),
                updated_at: now,
                ..existing
            });
        }

        debug!("Creating event mapping for session type: {}", session_type_id);

        let query = r#"
            INSERT INTO event_mappings
                (session_type_id, provider_event_type_id, provider_event_type_uri,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
        "#;

        sqlx::query(query)
            .bind(session_type_id)
            .bind(provider_event_type_id)
            .bind(provider_event_type_uri)
            .bind(&now_text)
            .bind(&now_text)
            .execute(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to insert event mapping: {}", e);
                DbError::from_query(e)
            })?;

        info!("Event mapping stored for session type: {}", session_type_id);
        Ok(EventMapping {
            session_type_id: session_type_id.to_string(),
            provider_event_type_id: provider_event_type_id.to_string(),
            provider_event_type_uri: provider_event_type_uri.to_string(),
            created_at: now,
            updated_at: now,
        })
    }
}
