//! Editor configuration and per-realm settings.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::RealmError;

// ---------------------------------------------------------------------------
// EditorConfig
// ---------------------------------------------------------------------------

/// Editor-wide behaviour switches. Every field has a default, so a config
/// file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Element types attached to every entity created by the factory.
    pub default_elements: Vec<String>,
    /// Pretty-print realm files on save.
    pub pretty_save: bool,
    /// Fail a load that produced any repair warning.
    pub strict_load: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            default_elements: vec!["Transform".to_owned(), "BoxCollider".to_owned()],
            pretty_save: true,
            strict_load: false,
        }
    }
}

impl EditorConfig {
    /// Read a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RealmError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| RealmError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, RealmError> {
        serde_json::from_str(text).map_err(|e| RealmError::Parse {
            message: e.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// RealmSettings
// ---------------------------------------------------------------------------

/// Settings stored with each realm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealmSettings {
    pub use_realm_bounds: bool,
    /// Edge length of the realm bounds. Never below 1.
    pub realm_size: f32,
}

impl RealmSettings {
    pub const MIN_REALM_SIZE: f32 = 1.0;

    pub fn new(use_realm_bounds: bool, realm_size: f32) -> Self {
        let mut s = Self {
            use_realm_bounds,
            realm_size,
        };
        s.validate();
        s
    }

    /// Clamp `realm_size` into range. NaN becomes the minimum.
    pub fn validate(&mut self) {
        if self.realm_size.is_nan() || self.realm_size < Self::MIN_REALM_SIZE {
            self.realm_size = Self::MIN_REALM_SIZE;
        }
    }
}

impl Default for RealmSettings {
    fn default() -> Self {
        Self {
            use_realm_bounds: true,
            realm_size: 1000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let cfg = EditorConfig::from_json(r#"{ "strict_load": true }"#).unwrap();
        assert!(cfg.strict_load);
        assert!(cfg.pretty_save);
        assert_eq!(cfg.default_elements, ["Transform", "BoxCollider"]);
    }

    #[test]
    fn bad_config_is_a_parse_error() {
        assert!(matches!(
            EditorConfig::from_json("{ nope"),
            Err(RealmError::Parse { .. })
        ));
    }

    #[test]
    fn realm_size_is_clamped() {
        assert_eq!(RealmSettings::new(true, 0.25).realm_size, 1.0);
        assert_eq!(RealmSettings::new(false, f32::NAN).realm_size, 1.0);
        assert_eq!(RealmSettings::new(true, 64.0).realm_size, 64.0);
    }
}
