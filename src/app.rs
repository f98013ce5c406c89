use std::collections::HashMap;
use std::sync::Arc;

use axum::http::Method;
use axum::routing::get;
use axum::Router;
use chrono::Duration;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::authz::{AccessEvaluator, DefaultAccessEvaluator};
use crate::config::AppConfig;
use crate::errors::AppError;
use crate::events::{init_event_bus, start_activity_listener, EventBus};
use crate::rbac::{PermissionStore, StagedEdit};
use crate::routes::{editors, health, rbac};

/// Open "Configure" dialogs keyed by session id
pub type EditorRegistry = Arc<RwLock<HashMap<Uuid, StagedEdit>>>;

pub const DEFAULT_EDITOR_TTL_MINUTES: i64 = 30;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<PermissionStore>>,
    pub editors: EditorRegistry,
    pub evaluator: Arc<dyn AccessEvaluator>,
    pub event_bus: EventBus,
    /// Editors older than this are evicted when a new one is opened
    pub editor_ttl: Duration,
}

impl AppState {
    pub fn new(store: PermissionStore, event_bus: EventBus) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
            editors: Arc::new(RwLock::new(HashMap::new())),
            evaluator: Arc::new(DefaultAccessEvaluator::new()),
            event_bus,
            editor_ttl: Duration::minutes(DEFAULT_EDITOR_TTL_MINUTES),
        }
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn AccessEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_editor_ttl(mut self, ttl: Duration) -> Self {
        self.editor_ttl = ttl;
        self
    }
}

pub async fn create_app(config: &AppConfig) -> Result<Router, AppError> {
    let store = config.build_store()?;
    let state = AppState::new(store, spawn_event_bus()).with_editor_ttl(config.editor_ttl());
    Ok(router(state))
}

/// Builds the router around an existing store and starts the activity listener.
pub fn create_app_with_store(store: PermissionStore) -> Router {
    router(AppState::new(store, spawn_event_bus()))
}

/// Creates the activity bus and spawns its listener.
pub fn spawn_event_bus() -> EventBus {
    let (event_bus, rx) = init_event_bus();
    tokio::spawn(start_activity_listener(rx));
    event_bus
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health::health))
        .nest("/rbac", rbac::routes().merge(editors::routes()))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
