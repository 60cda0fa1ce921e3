//! Key-value persistence.
//!
//! The store is the only shared resource in the system. It guarantees
//! atomicity per single key: there are no multi-key transactions, no
//! locking and no compare-and-swap. Concurrent read-modify-write cycles
//! against the same key can lose updates; callers accept that.
//!
//! Two implementations are provided:
//!
//! - [`MemoryStore`]: a `RwLock<HashMap>` used by unit tests and suitable
//!   for ephemeral deployments.
//! - [`FileStore`]: one file per key under `<data_dir>/<namespace>/`.

use crate::config::CoreConfig;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::sync::{Arc, RwLock};

#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("failed to read key: {0}")]
    Read(std::io::Error),
    #[error("failed to write key: {0}")]
    Write(std::io::Error),
    #[error("failed to delete key: {0}")]
    Delete(std::io::Error),
    #[error("failed to list keys: {0}")]
    List(std::io::Error),
    #[error("store lock poisoned")]
    Poisoned,
}

pub type KvResult<T> = std::result::Result<T, KvError>;

/// The namespaces used by the PromptHub store.
///
/// This enum is deliberately *closed*: prompt records and tag records live
/// in separate namespaces (spiritually, separate KV tables), and nothing
/// else writes to the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Prompt records, keyed by `prompt_<id>`. Legacy tag records from the
    /// pre-split layout also live here under a `tag_` prefix.
    Prompts,
    /// Tag records, keyed by the raw lowercase tag name.
    Tags,
}

impl Namespace {
    pub(crate) fn dir_name(self) -> &'static str {
        match self {
            Namespace::Prompts => "prompts",
            Namespace::Tags => "tags",
        }
    }
}

/// Per-key-atomic string store with prefix listing.
///
/// `delete` of an absent key is a no-op; existence checks belong to the
/// caller. `list_keys` returns keys sorted ascending so scans are
/// deterministic.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, ns: Namespace, key: &str) -> KvResult<Option<String>>;
    fn put(&self, ns: Namespace, key: &str, value: &str) -> KvResult<()>;
    fn delete(&self, ns: Namespace, key: &str) -> KvResult<()>;
    fn list_keys(&self, ns: Namespace, prefix: &str) -> KvResult<Vec<String>>;
}

// Leaves headroom under NAME_MAX for the file store's temp-file suffix.
const MAX_KEY_LEN: usize = 200;

/// Validates that a key is safe to use as a store key (and, for the file
/// store, as a file name).
///
/// Keys are user-influenced (tag names become keys verbatim), so this
/// applies guardrails rather than a strict whitelist:
/// - rejects empty keys
/// - bounds the length to avoid pathological inputs
/// - rejects path separators, NUL and control characters
/// - rejects leading dots (`.`, `..` and hidden-file names, which the
///   file store reserves for its temp files)
fn validate_key(key: &str) -> KvResult<()> {
    if key.is_empty() {
        return Err(KvError::InvalidKey("key cannot be empty".into()));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(KvError::InvalidKey(format!(
            "key exceeds maximum length of {} bytes",
            MAX_KEY_LEN
        )));
    }
    if key.starts_with('.') {
        return Err(KvError::InvalidKey(format!(
            "key '{}' must not start with '.'",
            key
        )));
    }
    if key.chars().any(|c| c == '/' || c == '\\' || c.is_control()) {
        return Err(KvError::InvalidKey(
            "key contains path separators or control characters".into(),
        ));
    }
    Ok(())
}

/// In-memory store backed by a `RwLock<HashMap>`.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<(Namespace, String), String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, ns: Namespace, key: &str) -> KvResult<Option<String>> {
        validate_key(key)?;
        let entries = self.entries.read().map_err(|_| KvError::Poisoned)?;
        Ok(entries.get(&(ns, key.to_string())).cloned())
    }

    fn put(&self, ns: Namespace, key: &str, value: &str) -> KvResult<()> {
        validate_key(key)?;
        let mut entries = self.entries.write().map_err(|_| KvError::Poisoned)?;
        entries.insert((ns, key.to_string()), value.to_string());
        Ok(())
    }

    fn delete(&self, ns: Namespace, key: &str) -> KvResult<()> {
        validate_key(key)?;
        let mut entries = self.entries.write().map_err(|_| KvError::Poisoned)?;
        entries.remove(&(ns, key.to_string()));
        Ok(())
    }

    fn list_keys(&self, ns: Namespace, prefix: &str) -> KvResult<Vec<String>> {
        let entries = self.entries.read().map_err(|_| KvError::Poisoned)?;
        let mut keys: Vec<String> = entries
            .keys()
            .filter(|(entry_ns, key)| *entry_ns == ns && key.starts_with(prefix))
            .map(|(_, key)| key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}

/// File-backed store: one file per key under `<data_dir>/<namespace>/`.
///
/// Writes go through a rename so a crash mid-write cannot leave a
/// half-written record behind; that is the per-key atomicity the rest of
/// the system relies on.
#[derive(Clone)]
pub struct FileStore {
    cfg: Arc<CoreConfig>,
}

impl FileStore {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self { cfg }
    }

    fn namespace_dir(&self, ns: Namespace) -> std::path::PathBuf {
        self.cfg.data_dir().join(ns.dir_name())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, ns: Namespace, key: &str) -> KvResult<Option<String>> {
        validate_key(key)?;
        let path = self.namespace_dir(ns).join(key);
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(KvError::Read(e)),
        }
    }

    fn put(&self, ns: Namespace, key: &str, value: &str) -> KvResult<()> {
        validate_key(key)?;
        let dir = self.namespace_dir(ns);
        fs::create_dir_all(&dir).map_err(KvError::Write)?;

        // Write to a temp name in the same directory, then rename into
        // place: rename within a directory is atomic on POSIX.
        let tmp = dir.join(format!(".{}.tmp", key));
        fs::write(&tmp, value).map_err(KvError::Write)?;
        fs::rename(&tmp, dir.join(key)).map_err(KvError::Write)?;
        Ok(())
    }

    fn delete(&self, ns: Namespace, key: &str) -> KvResult<()> {
        validate_key(key)?;
        let path = self.namespace_dir(ns).join(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(KvError::Delete(e)),
        }
    }

    fn list_keys(&self, ns: Namespace, prefix: &str) -> KvResult<Vec<String>> {
        let dir = self.namespace_dir(ns);
        let iter = match fs::read_dir(&dir) {
            Ok(it) => it,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(KvError::List(e)),
        };

        let mut keys = Vec::new();
        for entry in iter {
            let entry = entry.map_err(KvError::List)?;
            if !entry.path().is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                // Skip leftovers from interrupted writes.
                if name.starts_with('.') {
                    continue;
                }
                if name.starts_with(prefix) {
                    keys.push(name.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn file_store(dir: &Path) -> FileStore {
        FileStore::new(Arc::new(CoreConfig::new(dir.to_path_buf())))
    }

    fn check_contract(store: &dyn KeyValueStore) {
        assert_eq!(
            store.get(Namespace::Prompts, "missing").expect("get should succeed"),
            None,
            "absent key should read as None"
        );

        store
            .put(Namespace::Prompts, "prompt_a", "{\"id\":\"a\"}")
            .expect("put should succeed");
        assert_eq!(
            store.get(Namespace::Prompts, "prompt_a").expect("get should succeed"),
            Some("{\"id\":\"a\"}".to_string())
        );

        // Overwrite is a plain replace.
        store
            .put(Namespace::Prompts, "prompt_a", "{\"id\":\"a2\"}")
            .expect("put should succeed");
        assert_eq!(
            store.get(Namespace::Prompts, "prompt_a").expect("get should succeed"),
            Some("{\"id\":\"a2\"}".to_string())
        );

        store
            .delete(Namespace::Prompts, "prompt_a")
            .expect("delete should succeed");
        assert_eq!(
            store.get(Namespace::Prompts, "prompt_a").expect("get should succeed"),
            None
        );

        // Deleting an absent key is a no-op.
        store
            .delete(Namespace::Prompts, "prompt_a")
            .expect("delete of absent key should succeed");
    }

    #[test]
    fn test_memory_store_contract() {
        check_contract(&MemoryStore::new());
    }

    #[test]
    fn test_file_store_contract() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        check_contract(&file_store(temp_dir.path()));
    }

    #[test]
    fn test_list_keys_filters_by_prefix_and_sorts() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let stores: Vec<Box<dyn KeyValueStore>> = vec![
            Box::new(MemoryStore::new()),
            Box::new(file_store(temp_dir.path())),
        ];

        for store in &stores {
            store.put(Namespace::Prompts, "prompt_b", "1").unwrap();
            store.put(Namespace::Prompts, "prompt_a", "2").unwrap();
            store.put(Namespace::Prompts, "tag_x", "3").unwrap();

            let keys = store
                .list_keys(Namespace::Prompts, "prompt_")
                .expect("list_keys should succeed");
            assert_eq!(keys, vec!["prompt_a", "prompt_b"]);

            let all = store
                .list_keys(Namespace::Prompts, "")
                .expect("list_keys should succeed");
            assert_eq!(all, vec!["prompt_a", "prompt_b", "tag_x"]);
        }
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let store = MemoryStore::new();
        store.put(Namespace::Prompts, "rust", "prompt side").unwrap();
        store.put(Namespace::Tags, "rust", "tag side").unwrap();

        assert_eq!(
            store.get(Namespace::Prompts, "rust").unwrap(),
            Some("prompt side".to_string())
        );
        assert_eq!(
            store.get(Namespace::Tags, "rust").unwrap(),
            Some("tag side".to_string())
        );

        store.delete(Namespace::Tags, "rust").unwrap();
        assert_eq!(
            store.get(Namespace::Prompts, "rust").unwrap(),
            Some("prompt side".to_string()),
            "deleting in one namespace should not touch the other"
        );
    }

    #[test]
    fn test_file_store_list_keys_empty_for_missing_dir() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = file_store(temp_dir.path());
        let keys = store
            .list_keys(Namespace::Tags, "")
            .expect("list_keys should succeed");
        assert!(keys.is_empty(), "missing namespace dir should list empty");
    }

    #[test]
    fn test_invalid_keys_rejected() {
        let store = MemoryStore::new();
        let too_long = "x".repeat(300);
        for bad in [
            "",
            ".",
            "..",
            ".hidden",
            "a/b",
            "a\\b",
            "nul\0key",
            too_long.as_str(),
        ] {
            let err = store
                .put(Namespace::Tags, bad, "v")
                .expect_err("invalid key should be rejected");
            assert!(
                matches!(err, KvError::InvalidKey(_)),
                "expected InvalidKey for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_file_store_permits_spaces_and_unicode_in_keys() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = file_store(temp_dir.path());

        store
            .put(Namespace::Tags, "machine learning", "{\"count\":1}")
            .expect("put should succeed");
        store
            .put(Namespace::Tags, "提示词", "{\"count\":2}")
            .expect("put should succeed");

        assert_eq!(
            store.get(Namespace::Tags, "machine learning").unwrap(),
            Some("{\"count\":1}".to_string())
        );
        assert_eq!(
            store.get(Namespace::Tags, "提示词").unwrap(),
            Some("{\"count\":2}".to_string())
        );
    }
}
