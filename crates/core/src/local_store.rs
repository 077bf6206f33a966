use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{config_dir, ConfigError};

pub const SERVERS_KEY: &str = "servers";
const LOCAL_STORE_FILE_NAME: &str = "local.toml";

#[derive(Debug, Error)]
pub enum LocalStoreError {
    #[error("failed to resolve config directory: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to read local store at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse local store at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to create directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize local store: {source}")]
    Serialize {
        #[source]
        source: toml::ser::Error,
    },
    #[error("failed to write local store at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub trait LocalStore {
    fn get(&self, key: &str) -> Option<&str>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), LocalStoreError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LocalDocument {
    #[serde(default)]
    values: BTreeMap<String, String>,
}

/// [`LocalStore`] persisted as TOML; every `set` is written through.
#[derive(Debug, Clone)]
pub struct FileLocalStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileLocalStore {
    pub fn load_default() -> Result<Self, LocalStoreError> {
        let path = config_dir()?.join(LOCAL_STORE_FILE_NAME);
        Self::load_from_path(path)
    }

    pub fn load_from_path(path: impl Into<PathBuf>) -> Result<Self, LocalStoreError> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self {
                path,
                values: BTreeMap::new(),
            });
        }

        let raw = fs::read_to_string(&path).map_err(|source| LocalStoreError::Read {
            path: path.clone(),
            source,
        })?;

        if raw.trim().is_empty() {
            return Ok(Self {
                path,
                values: BTreeMap::new(),
            });
        }

        let doc: LocalDocument =
            toml::from_str(&raw).map_err(|source| LocalStoreError::Parse {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            path,
            values: doc.values,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), LocalStoreError> {
        if let Some(parent_dir) = self.path.parent() {
            fs::create_dir_all(parent_dir).map_err(|source| LocalStoreError::CreateDir {
                path: parent_dir.to_path_buf(),
                source,
            })?;
        }

        let doc = LocalDocument {
            values: self.values.clone(),
        };
        let rendered = toml::to_string_pretty(&doc)
            .map_err(|source| LocalStoreError::Serialize { source })?;

        fs::write(&self.path, rendered).map_err(|source| LocalStoreError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

impl LocalStore for FileLocalStore {
    fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), LocalStoreError> {
        self.values.insert(key.to_string(), value.to_string());
        self.persist()
    }
}

#[must_use]
pub fn load_servers(store: &impl LocalStore) -> String {
    store.get(SERVERS_KEY).unwrap_or_default().to_string()
}

pub fn save_servers(
    store: &mut impl LocalStore,
    servers: Option<&str>,
) -> Result<(), LocalStoreError> {
    store.set(SERVERS_KEY, servers.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use tempfile::TempDir;

    use super::{load_servers, save_servers, FileLocalStore, LocalStore};

    fn temp_store_path(temp_dir: &TempDir) -> PathBuf {
        temp_dir.path().join("nested").join("local.toml")
    }

    #[test]
    fn missing_store_reads_empty_servers() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let store =
            FileLocalStore::load_from_path(temp_store_path(&temp_dir)).expect("failed to load");

        assert_eq!(store.get("servers"), None);
        assert_eq!(load_servers(&store), "");
    }

    #[test]
    fn servers_survive_reload() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let path = temp_store_path(&temp_dir);

        let mut store = FileLocalStore::load_from_path(&path).expect("failed to load");
        save_servers(&mut store, Some("app01:8080,app02:8080")).expect("failed to save");

        let reloaded = FileLocalStore::load_from_path(&path).expect("failed to reload");
        assert_eq!(load_servers(&reloaded), "app01:8080,app02:8080");
    }

    #[test]
    fn clearing_servers_stores_empty_string() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let path = temp_store_path(&temp_dir);

        let mut store = FileLocalStore::load_from_path(&path).expect("failed to load");
        save_servers(&mut store, Some("app01:8080")).expect("failed to save");
        save_servers(&mut store, None).expect("failed to clear");

        let reloaded = FileLocalStore::load_from_path(&path).expect("failed to reload");
        assert_eq!(reloaded.get("servers"), Some(""));
    }

    #[test]
    fn blank_file_loads_empty_store() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let path = temp_dir.path().join("local.toml");
        std::fs::write(&path, "  \n").expect("write blank file");

        let store = FileLocalStore::load_from_path(&path).expect("failed to load");
        assert_eq!(load_servers(&store), "");
    }
}
