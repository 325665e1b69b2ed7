// --- File: crates/slotsync_common/src/services.rs ---
//! Collaborator abstractions.
//!
//! The booking core talks to the payment processor only through [`PaymentService`],
//! so the processor can be swapped or faked without touching orchestration code.

use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Type alias for a boxed future that returns a Result
pub type BoxFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// A wrapper error type that implements std::error::Error for Box<dyn std::error::Error + Send + Sync>
#[derive(Debug)]
pub struct BoxedError(pub Box<dyn StdError + Send + Sync>);

impl fmt::Display for BoxedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl StdError for BoxedError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

impl From<Box<dyn StdError + Send + Sync>> for BoxedError {
    fn from(err: Box<dyn StdError + Send + Sync>) -> Self {
        BoxedError(err)
    }
}

/// "Charge amount X for booking Y".
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentRequest {
    /// Local booking id, echoed back by the processor when it reports the outcome.
    pub booking_id: String,
    /// Amount in the currency's minor unit (cents).
    pub amount_minor: i64,
    /// ISO 4217 code, lower- or upper-case.
    pub currency: String,
    pub description: String,
    pub customer_email: Option<String>,
}

/// What the client needs to complete a payment.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentHandle {
    /// Processor-side reference (e.g. a checkout session id).
    pub reference: String,
    /// Hosted payment page, when the processor offers one.
    pub checkout_url: Option<String>,
    pub processor: String,
}

/// Initiates payments with an external processor.
///
/// Payment capture and its state live with the processor. The outcome comes back
/// asynchronously and is reported to the booking core separately.
pub trait PaymentService: Send + Sync {
    /// Error type returned by payment service operations.
    type Error: std::error::Error + Send + Sync + 'static;

    fn initiate_payment(&self, request: PaymentRequest) -> BoxFuture<'_, PaymentHandle, Self::Error>;
}

/// Type-erases the error of a concrete [`PaymentService`] so it can be stored as
/// `Arc<dyn PaymentService<Error = BoxedError>>`.
pub struct BoxedPaymentService<S> {
    inner: S,
}

impl<S> BoxedPaymentService<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S: PaymentService> PaymentService for BoxedPaymentService<S> {
    type Error = BoxedError;

    fn initiate_payment(&self, request: PaymentRequest) -> BoxFuture<'_, PaymentHandle, Self::Error> {
        Box::pin(async move {
            self.inner
                .initiate_payment(request)
                .await
                .map_err(|e| BoxedError(Box::new(e)))
        })
    }
}

/// Provides the collaborator services enabled by configuration.
pub trait ServiceFactory: Send + Sync {
    fn payment_service(&self) -> Option<Arc<dyn PaymentService<Error = BoxedError>>>;
}
