//! Engine configuration.
//!
//! All fields have defaults, so a partial JSON document (or `{}`) is a valid
//! configuration:
//!
//! ```rust
//! use trellis_core::{EngineConfig, RenderMode};
//!
//! let config = EngineConfig::from_json(r#"{"render_mode": "fine_grained"}"#).unwrap();
//! assert_eq!(config.render_mode, RenderMode::FineGrained);
//! assert_eq!(config.placeholder_class, "loading");
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How dynamic child lists are patched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Every reactive unit patches on its own; child lists are replaced wholesale.
    FineGrained,
    /// Child lists go through the keyed diff with node recycling.
    #[default]
    Reconciling,
}

/// Thresholds separating a tap from a scroll or drag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TapConfig {
    /// Maximum pointer travel, in pixels, between touch start and end.
    pub max_movement: f64,
    /// Maximum touch duration in milliseconds.
    pub max_duration_ms: u64,
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            max_movement: 10.0,
            max_duration_ms: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub render_mode: RenderMode,

    /// Render roots off-tree and attach them once every deferred value settled.
    pub hydrate: bool,

    /// Class applied to nodes whose content is still pending.
    pub placeholder_class: String,

    /// Class applied to nodes whose deferred content was rejected.
    pub error_class: String,

    /// Detached nodes kept per tag for reuse.
    pub recycle_pool_limit: usize,

    /// Reconciliation failures tolerated before falling back to fine-grained mode.
    pub reconcile_failure_limit: usize,

    pub max_tracking_depth: usize,
    pub max_notify_depth: usize,
    pub max_component_depth: usize,

    pub tap: TapConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            render_mode: RenderMode::default(),
            hydrate: false,
            placeholder_class: "loading".to_string(),
            error_class: "error".to_string(),
            recycle_pool_limit: 32,
            reconcile_failure_limit: 3,
            max_tracking_depth: 100,
            max_notify_depth: 100,
            max_component_depth: 64,
            tap: TapConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.placeholder_class.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "placeholder_class",
                reason: "must not be empty",
            });
        }
        if self.error_class.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "error_class",
                reason: "must not be empty",
            });
        }
        if self.placeholder_class == self.error_class {
            return Err(ConfigError::Invalid {
                field: "error_class",
                reason: "must differ from placeholder_class",
            });
        }
        if self.max_tracking_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "max_tracking_depth",
                reason: "must be at least 1",
            });
        }
        if self.max_notify_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "max_notify_depth",
                reason: "must be at least 1",
            });
        }
        if self.max_component_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "max_component_depth",
                reason: "must be at least 1",
            });
        }
        if !(self.tap.max_movement.is_finite() && self.tap.max_movement >= 0.0) {
            return Err(ConfigError::Invalid {
                field: "tap.max_movement",
                reason: "must be a non-negative number",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn parses_nested_tap_config() {
        let json = r#"{
            "hydrate": true,
            "recycle_pool_limit": 4,
            "tap": {"max_movement": 4.5}
        }"#;

        let config = EngineConfig::from_json(json).unwrap();
        assert!(config.hydrate);
        assert_eq!(config.recycle_pool_limit, 4);
        assert_eq!(config.tap.max_movement, 4.5);
        assert_eq!(config.tap.max_duration_ms, 300);
    }

    #[test]
    fn rejects_identical_marker_classes() {
        let json = r#"{"placeholder_class": "x", "error_class": "x"}"#;
        let err = EngineConfig::from_json(json).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "error_class", .. }));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            EngineConfig::from_json("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
