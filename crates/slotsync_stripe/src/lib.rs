pub mod error;
pub mod logic;
pub mod service;

pub use error::StripeError;
pub use logic::{
    parse_event, parse_payment_notification, verify_stripe_signature, CheckoutSession,
    PaymentNotification, StripeEvent, DEFAULT_SIGNATURE_TOLERANCE_SECS,
};
pub use service::StripePaymentService;
