// Persisted preferences - the only state kept between runs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub auth_token: Option<String>,

    /// X-Plex-Client-Identifier for this install
    pub device_id: Option<String>,

    pub selected_server_id: Option<String>,
    pub selected_server_name: Option<String>,
    pub selected_libraries: Vec<String>,
}

/// Preferences bound to the file they were loaded from
#[derive(Debug)]
pub struct PrefsStore {
    path: PathBuf,
    prefs: Preferences,
}

impl PrefsStore {
    /// Load preferences, starting empty if the file does not exist yet
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let prefs = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No preferences at {}, starting fresh", path.display());
                Preferences::default()
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };

        Ok(Self { path, prefs })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> &Preferences {
        &self.prefs
    }

    pub async fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let contents =
            toml::to_string_pretty(&self.prefs).context("Failed to serialize preferences")?;
        tokio::fs::write(&self.path, contents)
            .await
            .with_context(|| format!("Failed to write {}", self.path.display()))?;

        tracing::debug!("Saved preferences to {}", self.path.display());
        Ok(())
    }

    /// Stable device id, generated and saved on first use
    pub async fn device_id(&mut self) -> Result<String> {
        if let Some(id) = &self.prefs.device_id {
            return Ok(id.clone());
        }

        let id = uuid::Uuid::new_v4().to_string();
        tracing::info!("Generated device id {}", id);
        self.prefs.device_id = Some(id.clone());
        self.save().await?;
        Ok(id)
    }

    pub async fn set_auth_token(&mut self, token: Option<String>) -> Result<()> {
        self.prefs.auth_token = token;
        self.save().await
    }

    /// Apply a change and write the file
    pub async fn update<F>(&mut self, change: F) -> Result<()>
    where
        F: FnOnce(&mut Preferences),
    {
        change(&mut self.prefs);
        self.save().await
    }
}
