use serde::{Deserialize, Serialize};

/// Severity levels for activity events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Grants and revocations
    Critical,
    /// Visibility and other navigation changes (default)
    #[default]
    Important,
    /// Editor bookkeeping
    Noise,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Important => "important",
            Severity::Noise => "noise",
        }
    }
}

/// Trait for changes that are recorded in the activity stream.
pub trait Loggable: Serialize + Send + Sync {
    /// The entity type name (e.g., "permission", "visibility")
    /// This becomes the prefix in event names like "permission.granted"
    fn entity_type() -> &'static str;

    /// What the change is about, usually a role or a permission key
    fn subject(&self) -> String;

    fn severity(&self) -> Severity {
        Severity::Important
    }

    /// Override severity based on action (e.g., "reset" -> Critical)
    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "reset" | "revoked" => Severity::Critical,
            "opened" | "cancelled" | "staged" | "expired" => Severity::Noise,
            _ => self.severity(),
        }
    }
}
