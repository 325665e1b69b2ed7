mod app_state;
mod service_factory;

use std::error::Error;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde_json::{json, Value};
use slotsync_common::logging;
use slotsync_config::{env_vars, load_config};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use app_state::AppState;

async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let database = state.database_healthy().await;
    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "status": if database { "ok" } else { "degraded" },
            "database": database,
            "booking": state.booking.is_some(),
        })),
    )
}

fn build_app(state: AppState) -> Router {
    let mut api_router = Router::new()
        .route("/", get(|| async { "Welcome to the slotsync API!" }))
        .route("/health", get(health))
        .with_state(state.clone());

    if let Some(booking) = state.booking.clone() {
        let admin_secret = env_vars::get_secret_env_var(env_vars::ADMIN_SHARED_SECRET);
        if admin_secret.is_none() {
            warn!("No admin shared secret configured; admin booking routes will refuse every request");
        }
        api_router = api_router.merge(slotsync_booking::routes::routes(booking, admin_secret));
    }

    #[allow(unused_mut)] // for the features it needs to be mutable
    let mut app = Router::new().nest("/api", api_router);

    #[cfg(feature = "openapi")]
    {
        use slotsync_booking::doc::BookingApiDoc;
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;

        #[derive(OpenApi)]
        #[openapi(
            info(
                title = "slotsync API",
                version = "0.1.0",
                description = "Availability, booking and webhook endpoints"
            ),
            servers((url = "/api", description = "Main API Prefix")),
        )]
        struct ApiDoc;

        let mut openapi_doc = ApiDoc::openapi();
        openapi_doc.merge(BookingApiDoc::openapi());
        #[cfg(feature = "stripe")]
        openapi_doc.merge(slotsync_booking::doc::StripeWebhookApiDoc::openapi());
        info!("Adding Swagger UI at /api/docs");

        app = app.merge(SwaggerUi::new("/api/docs").url("/api/docs/openapi.json", openapi_doc));
    }

    app.layer(TraceLayer::new_for_http())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    logging::init();

    let config = load_config()?;
    let state = AppState::new(&config).await?;
    let app = build_app(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Starting server at http://{}", addr);
    info!("API endpoints available at http://{}/api", addr);

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
