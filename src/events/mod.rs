use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

pub mod loggable;
pub use loggable::{Loggable, Severity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent<T> {
    pub id: Uuid,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
    pub subject: String,
    pub payload: T,
}

impl<T> DomainEvent<T> {
    pub fn new(name: impl Into<String>, subject: impl Into<String>, payload: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            occurred_at: Utc::now(),
            subject: subject.into(),
            payload,
        }
    }
}

pub type EventBus = broadcast::Sender<Value>;

pub fn init_event_bus() -> (EventBus, broadcast::Receiver<Value>) {
    broadcast::channel(1024)
}

/// Request context for activity logging (IP, User-Agent, etc.)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl RequestContext {
    /// Extract context from Axum request headers
    pub fn from_headers(headers: &axum::http::HeaderMap) -> Self {
        let ip = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
            .or_else(|| {
                headers
                    .get("x-real-ip")
                    .and_then(|v| v.to_str().ok())
                    .map(String::from)
            });

        let user_agent = headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        Self { ip, user_agent }
    }
}

/// Structured activity payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityPayload {
    pub change: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<RequestContext>,
    pub severity: Severity,
}

/// Publishes a change for any entity implementing `Loggable`.
///
/// # Arguments
/// * `event_bus` - The event bus to send the event to.
/// * `action` - What happened (e.g., "granted", "toggled", "committed").
/// * `entity` - The change being logged.
/// * `context` - Optional request context (IP, User-Agent).
pub fn log_activity<T: Loggable>(
    event_bus: &EventBus,
    action: &str,
    entity: &T,
    context: Option<RequestContext>,
) {
    // e.g. "permission.granted"
    let event_name = format!("{}.{}", T::entity_type(), action);

    let payload = ActivityPayload {
        change: serde_json::to_value(entity).unwrap_or_default(),
        context,
        severity: entity.severity_for_action(action),
    };

    let event = DomainEvent::new(
        event_name,
        entity.subject(),
        serde_json::to_value(&payload).unwrap_or_default(),
    );

    // No subscribers is fine; the listener may not be running in tests
    let _ = event_bus.send(serde_json::to_value(event).unwrap_or_default());
}

/// Drains the bus into the log until every sender is dropped.
pub async fn start_activity_listener(mut rx: broadcast::Receiver<Value>) {
    tracing::info!("Activity listener started");
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "activity listener lagged");
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        let name = event.get("name").and_then(|v| v.as_str()).unwrap_or("unknown");
        let subject = event.get("subject").and_then(|v| v.as_str()).unwrap_or_default();
        let severity = event
            .get("payload")
            .and_then(|p| p.get("severity"))
            .and_then(|s| s.as_str())
            .unwrap_or(Severity::default().as_str());
        let change = event.get("payload").and_then(|p| p.get("change"));

        match severity {
            "critical" => tracing::warn!(event = name, subject, ?change, "activity"),
            "noise" => tracing::debug!(event = name, subject, ?change, "activity"),
            _ => tracing::info!(event = name, subject, ?change, "activity"),
        }
    }
    tracing::info!("Activity listener stopped");
}
