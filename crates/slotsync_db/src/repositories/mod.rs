//! SQL repository implementations

mod rows;

pub mod booking_sql;
pub mod event_mapping_sql;
pub mod session_type_sql;
pub mod webhook_event_sql;

pub use booking_sql::SqlBookingRepository;
pub use event_mapping_sql::SqlEventMappingRepository;
pub use session_type_sql::SqlSessionTypeRepository;
pub use webhook_event_sql::SqlWebhookEventRepository;
