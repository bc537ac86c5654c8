pub mod settings;

pub use settings::HostSettings;

use crate::models::{Configuration, ConfigurationError};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;

/// On-disk layout of the store file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    configurations: Vec<Configuration>,
}

/// Persisted scan configurations, keyed by id.
///
/// Backed by a single YAML file. Entries keep the order they were added in;
/// re-adding an id moves it to the end. Nothing touches the disk until
/// [`save()`](Self::save).
#[derive(Debug, Clone)]
pub struct ConfigurationStore {
    path: Utf8PathBuf,
    configurations: IndexMap<i64, Configuration>,
}

impl ConfigurationStore {
    /// Open the store at `path`.
    ///
    /// # Arguments
    /// * `path` - YAML file holding the configurations (e.g., "axishud/configurations.yaml")
    ///
    /// # Returns
    /// The loaded store, or an empty one if the file doesn't exist
    pub fn open<P: AsRef<Utf8Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            tracing::warn!("Configuration store not found at {}, starting empty", path);
            return Ok(Self {
                path,
                configurations: IndexMap::new(),
            });
        }

        let file_contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read configuration store: {}", path))?;

        let file: StoreFile = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse configuration store: {}", path))?;

        let mut configurations = IndexMap::with_capacity(file.configurations.len());
        for conf in file.configurations {
            if !conf.has_identity() {
                tracing::warn!("Skipping stored configuration without id: {}", conf);
                continue;
            }
            configurations.shift_remove(&conf.id());
            configurations.insert(conf.id(), conf);
        }

        tracing::info!(
            "Loaded {} configurations from {}",
            configurations.len(),
            path
        );
        Ok(Self {
            path,
            configurations,
        })
    }

    /// Ids of every stored configuration, in store order.
    pub fn all_ids(&self) -> Vec<i64> {
        self.configurations.keys().copied().collect()
    }

    pub fn find_by_id(&self, id: i64) -> Option<&Configuration> {
        self.configurations.get(&id)
    }

    pub fn len(&self) -> usize {
        self.configurations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
    }

    /// Add a configuration, replacing any stored one with the same id.
    ///
    /// # Returns
    /// `ConfigurationError::UnassignedIdentity` if the configuration has no id,
    /// or the validation error if its speeds or width are out of range
    pub fn add(&mut self, configuration: Configuration) -> Result<(), ConfigurationError> {
        configuration.validate_for_storage()?;

        let id = configuration.id();
        if self.configurations.shift_remove(&id).is_some() {
            tracing::debug!("Replacing stored configuration {}", id);
        }
        self.configurations.insert(id, configuration);
        Ok(())
    }

    /// Remove `configuration` if an identical entry is stored.
    pub fn remove(&mut self, configuration: &Configuration) -> bool {
        match self.configurations.get(&configuration.id()) {
            Some(stored) if stored == configuration => {
                self.configurations.shift_remove(&configuration.id());
                true
            }
            _ => false,
        }
    }

    /// Remove whatever is stored under `id`.
    pub fn remove_id(&mut self, id: i64) -> Option<Configuration> {
        self.configurations.shift_remove(&id)
    }

    /// Write the store back to its file.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create store directory: {}", parent))?;
            }
        }

        let file = StoreFile {
            configurations: self.configurations.values().cloned().collect(),
        };
        let yaml_string = serde_yaml_ng::to_string(&file)
            .context("Failed to serialize configuration store to YAML")?;

        fs::write(&self.path, yaml_string)
            .with_context(|| format!("Failed to write configuration store: {}", self.path))?;

        tracing::info!(
            "Saved {} configurations to {}",
            self.configurations.len(),
            self.path
        );
        Ok(())
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}
