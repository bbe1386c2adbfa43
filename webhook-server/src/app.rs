use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use webhook_core::dispatcher::Dispatcher;
use webhook_core::ingestion::Ingestion;
use webhook_core::management::Management;
use webhook_core::store::Store;

use crate::auth::{auth_middleware, AuthMode};
use crate::routes::{messages, webhooks};

/// Shared application state available to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub ingestion: Arc<Ingestion>,
    pub management: Arc<Management>,
    pub auth_mode: Arc<AuthMode>,
}

/// Create the Axum router with all webhook-delivery routes mounted.
pub fn create_app(
    store: Arc<dyn Store>,
    dispatcher: Arc<dyn Dispatcher>,
    config: Arc<webhook_core::config::EngineConfig>,
    auth_mode: AuthMode,
) -> Router {
    let auth_mode = Arc::new(auth_mode);
    let ingestion = Arc::new(Ingestion::new(Arc::clone(&store), Arc::clone(&dispatcher), config));
    let management = Arc::new(Management::new(Arc::clone(&store), dispatcher));

    let state = AppState {
        store,
        ingestion,
        management,
        auth_mode: Arc::clone(&auth_mode),
    };

    let webhook_routes = Router::new()
        .route("/", post(webhooks::register_webhook))
        .route("/{name}/events", post(webhooks::receive_event))
        .route("/{name}/health", get(webhooks::get_health));

    let message_routes = Router::new()
        .route("/", get(messages::search_messages))
        .route("/bulk-retry", post(messages::bulk_retry_messages))
        .route("/{id}", get(messages::get_message))
        .route("/{id}/cancel", post(messages::cancel_message))
        .route("/{id}/retry", post(messages::retry_message));

    Router::new()
        .nest("/webhooks", webhook_routes)
        .nest("/messages", message_routes)
        .with_state(state)
        .layer(middleware::from_fn_with_state(auth_mode, auth_middleware))
}
