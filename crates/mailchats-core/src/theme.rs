//! UI theme persisted to theme.json

use crate::progress::{ProgressEvent, ProgressHub};
use mailchats_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeVariant {
    Professional,
    Vibrant,
    Tint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Appearance {
    Light,
    Dark,
    System,
}

/// Theme settings shared with the frontend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeConfig {
    pub variant: ThemeVariant,
    pub primary: String,
    pub appearance: Appearance,
    pub radius: f64,
    pub name: String,
}

impl ThemeConfig {
    /// Parse and validate an incoming theme
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let invalid = || Error::Validation("Invalid theme configuration".into());
        let theme: ThemeConfig = serde_json::from_value(value).map_err(|_| invalid())?;
        if theme.primary.trim().is_empty() || theme.name.trim().is_empty() {
            return Err(invalid());
        }
        Ok(theme)
    }
}

/// Reads and writes the theme file
pub struct ThemeStore {
    path: PathBuf,
    hub: ProgressHub,
}

impl ThemeStore {
    pub fn new(path: impl Into<PathBuf>, hub: ProgressHub) -> Self {
        Self {
            path: path.into(),
            hub,
        }
    }

    /// Current theme as stored on disk
    pub async fn get(&self) -> Result<serde_json::Value> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::NotFound("Theme file not found".into()))
            }
            Err(e) => {
                error!("Error reading theme: {}", e);
                return Err(Error::Internal("Failed to read theme".into()));
            }
        };

        serde_json::from_str(&data).map_err(|e| {
            error!("Error parsing theme: {}", e);
            Error::Internal("Failed to read theme".into())
        })
    }

    /// Validate, write and broadcast a new theme
    pub async fn update(&self, value: serde_json::Value) -> Result<ThemeConfig> {
        let theme = ThemeConfig::from_value(value)?;

        let json = serde_json::to_string_pretty(&theme)
            .map_err(|e| Error::Internal(format!("Failed to encode theme: {}", e)))?;
        tokio::fs::write(&self.path, json).await.map_err(|e| {
            error!("Error updating theme: {}", e);
            Error::Internal("Failed to update theme".into())
        })?;

        info!(name = %theme.name, "Theme updated");
        let broadcast = serde_json::to_value(&theme)
            .map_err(|e| Error::Internal(format!("Failed to encode theme: {}", e)))?;
        self.hub
            .publish(ProgressEvent::ThemeChanged { theme: broadcast });

        Ok(theme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn theme_json() -> serde_json::Value {
        json!({
            "variant": "vibrant",
            "primary": "#4a6cf7",
            "appearance": "dark",
            "radius": 0.5,
            "name": "Ocean"
        })
    }

    #[tokio::test]
    async fn test_get_without_file() {
        let dir = TempDir::new().unwrap();
        let store = ThemeStore::new(dir.path().join("theme.json"), ProgressHub::default());
        let err = store.get().await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(err.to_string(), "Theme file not found");
    }

    #[tokio::test]
    async fn test_update_writes_and_broadcasts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("theme.json");
        let hub = ProgressHub::default();
        let mut rx = hub.subscribe();
        let store = ThemeStore::new(&path, hub);

        let theme = store.update(theme_json()).await.unwrap();
        assert_eq!(theme.variant, ThemeVariant::Vibrant);
        assert_eq!(theme.appearance, Appearance::Dark);

        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert!(on_disk.contains("\n  \"variant\": \"vibrant\""));
        assert_eq!(store.get().await.unwrap(), theme_json());

        assert_eq!(
            rx.recv().await.unwrap(),
            ProgressEvent::ThemeChanged {
                theme: theme_json()
            }
        );
    }

    #[tokio::test]
    async fn test_update_rejects_invalid() {
        let dir = TempDir::new().unwrap();
        let store = ThemeStore::new(dir.path().join("theme.json"), ProgressHub::default());

        let mut missing = theme_json();
        missing.as_object_mut().unwrap().remove("radius");
        let mut empty_name = theme_json();
        empty_name["name"] = json!("");
        let mut bad_variant = theme_json();
        bad_variant["variant"] = json!("neon");

        for value in [missing, empty_name, bad_variant, json!(null)] {
            let err = store.update(value).await.unwrap_err();
            assert_eq!(err.to_string(), "Invalid theme configuration");
        }
        assert!(!dir.path().join("theme.json").exists());
    }
}
