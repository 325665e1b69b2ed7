//! Factories for database clients and SQL repositories.

use crate::client::DbClient;
use crate::error::DbError;
use crate::repositories::{
    SqlBookingRepository, SqlEventMappingRepository, SqlSessionTypeRepository,
    SqlWebhookEventRepository,
};
use crate::memory::InMemoryStore;
use crate::repository::{
    BookingRepository, EventMappingRepository, RepositoryFactory, SessionTypeRepository,
    WebhookEventRepository,
};
use slotsync_config::AppConfig;
use std::sync::Arc;
use tracing::{debug, info};

/// Builds [`DbClient`]s from the different configuration sources.
#[derive(Debug, Clone, Default)]
pub struct DbClientFactory;

impl DbClientFactory {
    pub fn new() -> Self {
        Self
    }

    pub async fn from_app_config(&self, config: &AppConfig) -> Result<DbClient, DbError> {
        debug!("Creating database client from application configuration");
        DbClient::new(config).await
    }

    pub async fn from_url(&self, db_url: &str) -> Result<DbClient, DbError> {
        debug!("Creating database client from URL");
        DbClient::from_url(db_url).await
    }
}

/// Hands out the SQL repositories, all sharing one pool.
#[derive(Debug, Clone, Default)]
pub struct SqlRepositoryFactory;

impl SqlRepositoryFactory {
    pub fn new() -> Self {
        Self
    }
}

impl RepositoryFactory<SqlSessionTypeRepository, DbClient> for SqlRepositoryFactory {
    fn create_repository(&self, db_client: DbClient) -> SqlSessionTypeRepository {
        SqlSessionTypeRepository::new(db_client)
    }
}

impl RepositoryFactory<SqlEventMappingRepository, DbClient> for SqlRepositoryFactory {
    fn create_repository(&self, db_client: DbClient) -> SqlEventMappingRepository {
        SqlEventMappingRepository::new(db_client)
    }
}

impl RepositoryFactory<SqlBookingRepository, DbClient> for SqlRepositoryFactory {
    fn create_repository(&self, db_client: DbClient) -> SqlBookingRepository {
        SqlBookingRepository::new(db_client)
    }
}

impl RepositoryFactory<SqlWebhookEventRepository, DbClient> for SqlRepositoryFactory {
    fn create_repository(&self, db_client: DbClient) -> SqlWebhookEventRepository {
        SqlWebhookEventRepository::new(db_client)
    }
}

/// The full set of repositories one backend instance works with.
#[derive(Clone)]
pub struct Repositories {
    pub session_types: Arc<dyn SessionTypeRepository>,
    pub event_mappings: Arc<dyn EventMappingRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub webhook_events: Arc<dyn WebhookEventRepository>,
}

impl Repositories {
    /// SQL repositories sharing the client's pool.
    pub fn sql(db_client: DbClient) -> Self {
        let factory = SqlRepositoryFactory::new();
        let session_types: SqlSessionTypeRepository = factory.create_repository(db_client.clone());
        let event_mappings: SqlEventMappingRepository =
            factory.create_repository(db_client.clone());
        let bookings: SqlBookingRepository = factory.create_repository(db_client.clone());
        let webhook_events: SqlWebhookEventRepository = factory.create_repository(db_client);

        Self {
            session_types: Arc::new(session_types),
            event_mappings: Arc::new(event_mappings),
            bookings: Arc::new(bookings),
            webhook_events: Arc::new(webhook_events),
        }
    }

    pub fn in_memory(store: &InMemoryStore) -> Self {
        Self {
            session_types: store.session_types(),
            event_mappings: store.event_mappings(),
            bookings: store.bookings(),
            webhook_events: store.webhook_events(),
        }
    }

    /// Creates every table that does not exist yet.
    pub async fn init_schemas(&self) -> Result<(), DbError> {
        self.session_types.init_schema().await?;
        self.event_mappings.init_schema().await?;
        self.bookings.init_schema().await?;
        self.webhook_events.init_schema().await?;
        info!("Database schemas initialized");
        Ok(())
    }
}

impl std::fmt::Debug for Repositories {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repositories").finish_non_exhaustive()
    }
}
