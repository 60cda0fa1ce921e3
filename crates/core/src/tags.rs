//! Tag index: a denormalized reverse index from tag name to the prompts
//! referencing it.
//!
//! Each distinct lowercase tag name owns one record in the tag namespace,
//! keyed by the name itself. The invariant after any completed
//! reconciliation is `count == prompt_ids.len()`; a record reaching count
//! zero is deleted, never persisted as zero.
//!
//! The store is per-key atomic only, so two concurrent reconciliations of
//! the same tag can both read the pre-update record and each write a stale
//! result, losing one update. That read-modify-write race is a documented
//! property of the deployment, accepted over serializing all writes
//! through a single-writer queue.

use crate::error::{HubError, HubResult};
use crate::prompt::normalize_tags;
use crate::store::{KeyValueStore, Namespace};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use utoipa::ToSchema;

/// Key prefix of legacy tag records in the prompt namespace, from before
/// tags moved to their own namespace.
pub const LEGACY_TAG_PREFIX: &str = "tag_";

/// A tag record as served by the API: the name plus the referencing
/// prompts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TagRecord {
    pub name: String,
    pub count: usize,
    pub prompt_ids: Vec<String>,
}

/// Stored value shape. The name is the store key, not repeated in the
/// value.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTag {
    count: usize,
    prompt_ids: Vec<String>,
}

/// Summary of a legacy-tag migration run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, ToSchema)]
pub struct MigrationStats {
    pub total: usize,
    pub migrated: usize,
    pub errors: usize,
}

/// Maintains tag records in response to prompt tag-set changes.
#[derive(Clone)]
pub struct TagIndex {
    store: Arc<dyn KeyValueStore>,
}

impl TagIndex {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Reconciles the index after a prompt's tag set changed from
    /// `old_tags` to `new_tags`.
    ///
    /// Both lists are normalized (lowercased, set-deduplicated) before the
    /// set differences are taken, so tags present in both sets are never
    /// rewritten. Removals are processed before additions, keeping
    /// deletion-before-recreation deterministic when a name collides with
    /// itself case-insensitively.
    ///
    /// Failures on individual tags are logged and skipped: tag-count drift
    /// is acceptable, blocking the prompt mutation that triggered the
    /// reconciliation is not.
    pub fn reconcile(&self, old_tags: &[String], new_tags: &[String], prompt_id: &str) {
        let old: BTreeSet<String> = normalize_tags(old_tags).into_iter().collect();
        let new: BTreeSet<String> = normalize_tags(new_tags).into_iter().collect();

        for tag in old.difference(&new) {
            if let Err(e) = self.remove_reference(tag, prompt_id) {
                tracing::warn!("failed to detach tag '{}' from prompt {}: {}", tag, prompt_id, e);
            }
        }

        for tag in new.difference(&old) {
            if let Err(e) = self.add_reference(tag, prompt_id) {
                tracing::warn!("failed to attach tag '{}' to prompt {}: {}", tag, prompt_id, e);
            }
        }
    }

    /// Lists every tag record, sorted by count descending (name ascending
    /// as tiebreak). Unparseable records are logged and dropped rather
    /// than failing the whole listing.
    pub fn list_all(&self) -> HubResult<Vec<TagRecord>> {
        let keys = self.store.list_keys(Namespace::Tags, "")?;

        let mut records = Vec::new();
        for key in keys {
            let Some(value) = self.store.get(Namespace::Tags, &key)? else {
                continue;
            };
            match serde_json::from_str::<StoredTag>(&value) {
                Ok(stored) => records.push(TagRecord {
                    name: key,
                    count: stored.count,
                    prompt_ids: stored.prompt_ids,
                }),
                Err(e) => {
                    tracing::warn!("failed to parse tag record '{}': {}", key, e);
                }
            }
        }

        records.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        Ok(records)
    }

    /// Point lookup of one tag record by (case-folded) name.
    pub fn get(&self, name: &str) -> HubResult<TagRecord> {
        let key = name.trim().to_lowercase();
        let value = self
            .store
            .get(Namespace::Tags, &key)?
            .ok_or_else(|| HubError::NotFound(format!("tag '{}' not found", key)))?;
        let stored: StoredTag =
            serde_json::from_str(&value).map_err(HubError::Deserialization)?;
        Ok(TagRecord {
            name: key,
            count: stored.count,
            prompt_ids: stored.prompt_ids,
        })
    }

    /// One-time copy of legacy `tag_`-prefixed records from the prompt
    /// namespace into the tag namespace.
    ///
    /// Individual keys that cannot be read, parsed or written are counted
    /// as errors and skipped; only a failure of the initial listing aborts
    /// the run.
    pub fn migrate_legacy_tags(&self) -> HubResult<MigrationStats> {
        let keys = self.store.list_keys(Namespace::Prompts, LEGACY_TAG_PREFIX)?;

        let mut stats = MigrationStats {
            total: keys.len(),
            ..MigrationStats::default()
        };

        for key in keys {
            match self.migrate_one(&key) {
                Ok(()) => stats.migrated += 1,
                Err(e) => {
                    tracing::warn!("failed to migrate legacy tag key '{}': {}", key, e);
                    stats.errors += 1;
                }
            }
        }

        tracing::info!(
            "legacy tag migration: {} total, {} migrated, {} errors",
            stats.total,
            stats.migrated,
            stats.errors
        );
        Ok(stats)
    }

    fn migrate_one(&self, key: &str) -> HubResult<()> {
        let value = self
            .store
            .get(Namespace::Prompts, key)?
            .ok_or_else(|| HubError::NotFound(format!("legacy key '{}' vanished", key)))?;

        // Parse to verify the value is a well-formed tag record, but copy
        // the original bytes unchanged.
        serde_json::from_str::<StoredTag>(&value).map_err(HubError::Deserialization)?;

        let name = key
            .strip_prefix(LEGACY_TAG_PREFIX)
            .unwrap_or(key)
            .trim()
            .to_lowercase();
        if name.is_empty() {
            return Err(HubError::InvalidInput(format!(
                "legacy key '{}' has an empty tag name",
                key
            )));
        }

        self.store.put(Namespace::Tags, &name, &value)?;
        Ok(())
    }

    fn remove_reference(&self, tag: &str, prompt_id: &str) -> HubResult<()> {
        let Some(value) = self.store.get(Namespace::Tags, tag)? else {
            // Nothing to detach from.
            return Ok(());
        };
        let mut stored: StoredTag =
            serde_json::from_str(&value).map_err(HubError::Deserialization)?;

        let before = stored.prompt_ids.len();
        stored.prompt_ids.retain(|id| id != prompt_id);
        if stored.prompt_ids.len() == before {
            return Ok(());
        }
        stored.count = stored.prompt_ids.len();

        if stored.count == 0 {
            self.store.delete(Namespace::Tags, tag)?;
        } else {
            self.persist(tag, &stored)?;
        }
        Ok(())
    }

    fn add_reference(&self, tag: &str, prompt_id: &str) -> HubResult<()> {
        let stored = match self.store.get(Namespace::Tags, tag)? {
            None => StoredTag {
                count: 1,
                prompt_ids: vec![prompt_id.to_string()],
            },
            Some(value) => {
                let mut stored: StoredTag =
                    serde_json::from_str(&value).map_err(HubError::Deserialization)?;
                if stored.prompt_ids.iter().any(|id| id == prompt_id) {
                    // Already referenced; no redundant write.
                    return Ok(());
                }
                stored.prompt_ids.push(prompt_id.to_string());
                stored.count = stored.prompt_ids.len();
                stored
            }
        };
        self.persist(tag, &stored)
    }

    fn persist(&self, tag: &str, stored: &StoredTag) -> HubResult<()> {
        let value = serde_json::to_string(stored).map_err(HubError::Serialization)?;
        self.store.put(Namespace::Tags, tag, &value)?;
        Ok(())
    }
}
