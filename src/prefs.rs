use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{Error, Result};

pub const THEME_KEY: &str = "cineVaultTheme";
pub const SESSION_KEY: &str = "cineVaultSession";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            _ => Err(anyhow::anyhow!("theme must be 'light' or 'dark'")),
        }
    }
}

/// Small persistent key-value store backed by one JSON file.
#[derive(Debug, Clone)]
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Map<String, Value> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Map::new(),
            Err(e) => {
                warn!("Failed to read local state {:?}: {}", self.path, e);
                return Map::new();
            }
        };
        match serde_json::from_slice::<Map<String, Value>>(&raw) {
            Ok(map) => map,
            Err(e) => {
                warn!("Ignoring corrupt local state {:?}: {}", self.path, e);
                Map::new()
            }
        }
    }

    async fn store(&self, map: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(Error::Save)?;
        }
        let body = serde_json::to_vec_pretty(map)
            .map_err(|e| Error::invalid(format!("unserializable local state: {}", e)))?;
        tokio::fs::write(&self.path, body).await.map_err(Error::Save)
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.load()
            .await
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.load().await;
        map.insert(key.to_string(), Value::String(value.to_string()));
        self.store(&map).await
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        let mut map = self.load().await;
        if map.remove(key).is_some() {
            self.store(&map).await?;
        }
        Ok(())
    }

    /// Unknown or missing values fall back to the default theme.
    pub async fn theme(&self) -> Theme {
        self.get(THEME_KEY)
            .await
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }

    pub async fn set_theme(&self, theme: Theme) -> Result<()> {
        self.set(THEME_KEY, theme.as_str()).await
    }
}
