use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub remote_url: String,
    pub api_key: String,
    /// Background drain interval. The background task is advisory; the
    /// outbox itself guarantees delivery across restarts.
    pub sync_interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_url: String::new(),
            api_key: String::new(),
            sync_interval_secs: 60,
        }
    }
}

impl SyncConfig {
    /// Load from a JSON file; a missing or unreadable file yields defaults.
    pub fn load(path: PathBuf) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, path: &PathBuf) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write sync config to {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = SyncConfig::load(dir.path().join("missing.json"));
        assert_eq!(config.sync_interval_secs, 60);
        assert!(config.remote_url.is_empty());
    }

    #[test]
    fn save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sync.json");

        let config = SyncConfig {
            remote_url: "https://example.test".into(),
            api_key: "key".into(),
            sync_interval_secs: 15,
        };
        config.save(&path).unwrap();

        let reloaded = SyncConfig::load(path);
        assert_eq!(reloaded.remote_url, "https://example.test");
        assert_eq!(reloaded.sync_interval_secs, 15);
    }

    #[test]
    fn corrupt_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sync.json");
        fs::write(&path, "{ not valid").unwrap();

        let config = SyncConfig::load(path);
        assert_eq!(config.sync_interval_secs, 60);
    }
}
