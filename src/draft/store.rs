use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use crate::error::DoseResult;

/// Key-value port for draft storage. The engine never assumes a concrete
/// storage technology behind this trait.
pub trait PersistenceStore {
    fn get(&self, key: &str) -> DoseResult<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> DoseResult<()>;
    fn remove(&mut self, key: &str) -> DoseResult<()>;
    fn keys_with_prefix(&self, prefix: &str) -> DoseResult<Vec<String>>;
}

/// In-memory store, used by tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistenceStore for MemoryStore {
    fn get(&self, key: &str) -> DoseResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> DoseResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> DoseResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> DoseResult<Vec<String>> {
        Ok(self
            .entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// File-backed store: one JSON document holding all entries, rewritten on
/// every mutation. Draft payloads are small, so simplicity wins over
/// incremental writes.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    pub fn open<P: AsRef<Path>>(path: P) -> DoseResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, entries })
    }

    fn persist(&self) -> DoseResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

impl PersistenceStore for FileStore {
    fn get(&self, key: &str) -> DoseResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> DoseResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        self.persist()
    }

    fn remove(&mut self, key: &str) -> DoseResult<()> {
        self.entries.remove(key);
        self.persist()
    }

    fn keys_with_prefix(&self, prefix: &str) -> DoseResult<Vec<String>> {
        Ok(self
            .entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
