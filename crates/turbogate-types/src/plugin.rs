//! Plugin configuration and lifecycle status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Declarative plugin descriptor
///
/// Only consulted while constructing and registering a plugin, never at
/// request time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Whether the plugin takes part in request execution
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Unique plugin name
    pub name: String,
    /// Filesystem path for externally loaded plugins
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Plugin version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Opaque plugin-specific settings, passed to `initialize`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

fn default_enabled() -> bool {
    true
}

impl PluginConfig {
    /// Enabled descriptor for a plugin name
    #[must_use]
    pub fn enabled(name: impl Into<String>) -> Self {
        Self {
            enabled: true,
            name: name.into(),
            path: None,
            version: None,
            config: None,
        }
    }

    /// Disabled descriptor for a plugin name
    #[must_use]
    pub fn disabled(name: impl Into<String>) -> Self {
        Self {
            enabled: false,
            ..Self::enabled(name)
        }
    }

    /// Attach plugin-specific settings
    #[must_use]
    pub fn with_config(mut self, config: Value) -> Self {
        self.config = Some(config);
        self
    }

    /// Attach an external plugin path
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Attach a version
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

/// Lifecycle state of a registered plugin
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginState {
    /// Known but not yet initialized
    #[default]
    Uninitialized,
    /// Initialization in progress
    Loading,
    /// Participating in request execution
    Active,
    /// Initialization or construction failed
    Error,
    /// Retained but excluded from execution
    Disabled,
    /// Cleaned up and removed
    Unloaded,
    /// Loaded from an external path, not yet active
    Loaded,
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Loading => "loading",
            Self::Active => "active",
            Self::Error => "error",
            Self::Disabled => "disabled",
            Self::Unloaded => "unloaded",
            Self::Loaded => "loaded",
        };
        f.write_str(name)
    }
}

/// Lifecycle status of one plugin, with a log of its transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginStatus {
    /// Plugin name
    pub name: String,
    /// Current state
    pub status: PluginState,
    /// Timestamped transition and failure messages
    #[serde(default)]
    pub logs: Vec<String>,
}

impl PluginStatus {
    /// Fresh status in `uninitialized`
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: PluginState::Uninitialized,
            logs: Vec::new(),
        }
    }

    /// Move to `state`, appending a log line
    pub fn transition(&mut self, state: PluginState, message: impl AsRef<str>) {
        self.transition_at(Utc::now(), state, message);
    }

    /// Move to `state` at a given time, appending a log line
    pub fn transition_at(
        &mut self,
        at: DateTime<Utc>,
        state: PluginState,
        message: impl AsRef<str>,
    ) {
        self.status = state;
        self.logs.push(format!(
            "{} [{}] {}",
            at.to_rfc3339(),
            state,
            message.as_ref()
        ));
    }

    /// Whether the plugin is currently executing on requests
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == PluginState::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_config_defaults_to_enabled() {
        let config: PluginConfig = serde_json::from_str(r#"{"name":"cache"}"#).unwrap();
        assert!(config.enabled);
        assert_eq!(config.path, None);

        let disabled = PluginConfig::disabled("cache");
        assert!(!disabled.enabled);
    }

    #[test]
    fn test_state_serializes_lowercase() {
        let json = serde_json::to_string(&PluginState::Disabled).unwrap();
        assert_eq!(json, "\"disabled\"");
    }

    #[test]
    fn test_transition_appends_log() {
        let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let mut status = PluginStatus::new("logging");
        status.transition_at(at, PluginState::Loading, "initializing");
        status.transition_at(at, PluginState::Active, "registered");

        assert!(status.is_active());
        assert_eq!(
            status.logs,
            vec![
                "2025-01-02T03:04:05+00:00 [loading] initializing".to_string(),
                "2025-01-02T03:04:05+00:00 [active] registered".to_string(),
            ]
        );
    }
}
