use std::path::PathBuf;
use std::sync::Arc;

use chrono::Duration;

use crate::app::DEFAULT_EDITOR_TTL_MINUTES;
use crate::errors::AppError;
use crate::rbac::{Hierarchy, PermissionStore, Seed};

const DEFAULT_PORT: u16 = 8000;
/// One week
const MAX_EDITOR_TTL_MINUTES: i64 = 10_080;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    /// JSON hierarchy file; the built-in ERP tree is used when unset
    pub hierarchy_path: Option<PathBuf>,
    /// Admin starts with every node visible and every action granted
    pub seed_admin: bool,
    /// Idle "Configure" dialogs are dropped after this many minutes
    pub editor_ttl_minutes: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            hierarchy_path: None,
            seed_admin: true,
            editor_ttl_minutes: DEFAULT_EDITOR_TTL_MINUTES,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let port = lookup("APP_PORT")
            .map(|val| val.parse::<u16>())
            .unwrap_or(Ok(DEFAULT_PORT))
            .map_err(|_| AppError::configuration("APP_PORT must be a valid port number"))?;

        let hierarchy_path = lookup("RBAC_HIERARCHY_PATH")
            .map(|val| val.trim().to_string())
            .filter(|val| !val.is_empty())
            .map(PathBuf::from);

        let seed_admin = match lookup("RBAC_SEED_ADMIN").map(|val| val.trim().to_lowercase()) {
            None => true,
            Some(val) => match val.as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => return Err(AppError::configuration("RBAC_SEED_ADMIN must be a boolean")),
            },
        };

        let editor_ttl_minutes = lookup("RBAC_EDITOR_TTL_MINUTES")
            .map(|val| val.trim().parse::<i64>())
            .unwrap_or(Ok(DEFAULT_EDITOR_TTL_MINUTES))
            .ok()
            .filter(|minutes| (1..=MAX_EDITOR_TTL_MINUTES).contains(minutes))
            .ok_or_else(|| AppError::configuration("RBAC_EDITOR_TTL_MINUTES must be between 1 and 10080"))?;

        Ok(Self {
            port,
            hierarchy_path,
            seed_admin,
            editor_ttl_minutes,
        })
    }

    pub fn load_hierarchy(&self) -> Result<Hierarchy, AppError> {
        match &self.hierarchy_path {
            Some(path) => {
                tracing::info!(path = %path.display(), "loading hierarchy file");
                Ok(Hierarchy::from_file(path)?)
            }
            None => Ok(Hierarchy::erp_default()),
        }
    }

    pub fn editor_ttl(&self) -> Duration {
        Duration::minutes(self.editor_ttl_minutes)
    }

    pub fn seed(&self) -> Seed {
        if self.seed_admin {
            Seed::admin()
        } else {
            Seed::default()
        }
    }

    pub fn build_store(&self) -> Result<PermissionStore, AppError> {
        let hierarchy = Arc::new(self.load_hierarchy()?);
        Ok(PermissionStore::seeded(hierarchy, &self.seed()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn parses_values() {
        let config = AppConfig::from_lookup(lookup(&[
            ("APP_PORT", "9100"),
            ("RBAC_HIERARCHY_PATH", "/etc/erp/hierarchy.json"),
            ("RBAC_SEED_ADMIN", "off"),
            ("RBAC_EDITOR_TTL_MINUTES", "5"),
        ]))
        .unwrap();
        assert_eq!(config.editor_ttl(), Duration::minutes(5));
        assert_eq!(config.port, 9100);
        assert_eq!(config.hierarchy_path, Some(PathBuf::from("/etc/erp/hierarchy.json")));
        assert!(!config.seed_admin);
        assert_eq!(config.seed(), Seed::default());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[("APP_PORT", "eighty")])),
            Err(AppError::Configuration(_))
        ));
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[("RBAC_SEED_ADMIN", "maybe")])),
            Err(AppError::Configuration(_))
        ));
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[("RBAC_EDITOR_TTL_MINUTES", "0")])),
            Err(AppError::Configuration(_))
        ));
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[("RBAC_EDITOR_TTL_MINUTES", "999999999999999")])),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn missing_hierarchy_file_is_a_configuration_error() {
        let config = AppConfig {
            hierarchy_path: Some(PathBuf::from("/nonexistent/hierarchy.json")),
            ..AppConfig::default()
        };
        assert!(matches!(config.load_hierarchy(), Err(AppError::Configuration(_))));
    }
}
