use std::sync::Arc;

use slotsync_booking::{BookingApiState, SigningSecretManager};
use slotsync_common::is_provider_enabled;
use slotsync_common::services::ServiceFactory;
use slotsync_config::{AppConfig, WebhookConfig};
use slotsync_db::{DbClient, DbClientFactory, DbError, InMemoryStore, Repositories};
use slotsync_provider::HttpProviderClient;
use tracing::{info, warn};

use crate::service_factory::SlotsyncServiceFactory;

/// Where bookings are persisted.
#[derive(Clone)]
pub enum Storage {
    Sql(DbClient),
    /// Process-local; everything is lost on restart.
    InMemory,
}

/// Application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,
    /// Present when the provider is enabled and its client could be built.
    pub booking: Option<Arc<BookingApiState>>,
}

impl AppState {
    pub async fn new(config: &AppConfig) -> Result<Self, DbError> {
        let (storage, repos) = match config.database.as_ref() {
            Some(_) => {
                let client = DbClientFactory::new().from_app_config(config).await?;
                (Storage::Sql(client.clone()), Repositories::sql(client))
            }
            None => {
                warn!("No [database] section; bookings are kept in memory only");
                (Storage::InMemory, Repositories::in_memory(&InMemoryStore::new()))
            }
        };
        repos.init_schemas().await?;

        let booking = if is_provider_enabled(config) {
            build_booking_state(config, repos)
        } else {
            info!("Provider disabled in configuration; booking routes are not mounted");
            None
        };

        Ok(Self {
            storage,
            booking,
        })
    }

    pub async fn database_healthy(&self) -> bool {
        match &self.storage {
            Storage::Sql(client) => client.is_healthy().await,
            Storage::InMemory => true,
        }
    }
}

fn build_booking_state(config: &AppConfig, repos: Repositories) -> Option<Arc<BookingApiState>> {
    let provider = match HttpProviderClient::from_app_config(config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            warn!("Scheduling provider client unavailable, booking routes disabled: {}", e);
            return None;
        }
    };
    let payments = SlotsyncServiceFactory::new(config).payment_service();
    let webhook_config = config.webhook.clone().unwrap_or_else(|| {
        warn!("No [webhook] section; subscriptions need an explicit callback_url");
        WebhookConfig::default()
    });

    let state = BookingApiState::new(
        repos,
        provider,
        payments,
        Arc::new(SigningSecretManager::from_env()),
        webhook_config,
        config.booking.clone(),
    );
    #[cfg(feature = "stripe")]
    let state = state.with_stripe_webhook_secret(slotsync_config::env_vars::get_secret_env_var(
        slotsync_config::env_vars::STRIPE_WEBHOOK_SECRET,
    ));

    Some(Arc::new(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotsync_config::{BookingConfig, ServerConfig};

    #[tokio::test]
    async fn falls_back_to_memory_without_database_section() {
        let config = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 0,
            },
            use_provider: false,
            use_stripe: false,
            database: None,
            provider: None,
            webhook: None,
            booking: BookingConfig::default(),
            stripe: None,
        };

        let state = AppState::new(&config).await.unwrap();
        assert!(matches!(state.storage, Storage::InMemory));
        assert!(state.booking.is_none());
        assert!(state.database_healthy().await);
    }
}
