//! Persistence for slotsync
//!
//! Session types, provider event mappings, bookings and received webhook
//! events, stored through an SQLx `Any` pool. The backend is chosen by the
//! database URL; SQLite and PostgreSQL drivers are enabled through feature
//! flags. Queries use `$n` placeholders, which MySQL does not accept.
//!
//! Every repository is an object-safe trait with a SQL implementation and an
//! in-memory one from [`memory::InMemoryStore`].
//!
//! # Example
//!
//! ```rust,no_run
//! use slotsync_db::{DbClient, Repositories};
//!
//! async fn setup_db() -> Result<Repositories, Box<dyn std::error::Error>> {
//!     let db_client = DbClient::from_url("sqlite:data/slotsync.db").await?;
//!     let repositories = Repositories::sql(db_client);
//!     repositories.init_schemas().await?;
//!     Ok(repositories)
//! }
//! ```

pub mod client;
pub mod error;
pub mod factory;
pub mod memory;
pub mod models;
pub mod repositories;
pub mod repository;

pub use client::{DbClient, DbTransaction};
pub use error::DbError;
pub use factory::{DbClientFactory, Repositories, SqlRepositoryFactory};
pub use memory::InMemoryStore;
pub use models::{
    Booking, BookingState, BookingStatus, BookingUpdate, CompletionOutcome, EventMapping,
    PaymentStatus, SessionType, WebhookEventRecord,
};
pub use repository::{
    BookingRepository, EventMappingRepository, RepositoryFactory, SessionTypeRepository,
    WebhookEventRepository,
};
