//! Prompt repository: CRUD over prompt records in the key-value store.
//!
//! Records are stored as JSON under `prompt_<id>` keys in the prompt
//! namespace. Every mutation triggers exactly one tag-index
//! reconciliation. The prompt write and the tag writes are separate keys
//! with no transaction across them; a crash between the two steps can
//! leave the index and the prompt store inconsistent, which the system
//! accepts.

use crate::error::{HubError, HubResult};
use crate::prompt::{normalize_tags, Prompt, PromptInput};
use crate::store::{KeyValueStore, Namespace};
use crate::tags::TagIndex;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// Key prefix for prompt records.
pub const PROMPT_KEY_PREFIX: &str = "prompt_";

fn prompt_key(id: &str) -> String {
    format!("{}{}", PROMPT_KEY_PREFIX, id)
}

/// CRUD service for prompt records.
///
/// Constructed once per process and passed into request handlers; holds
/// the store and the tag index it keeps consistent.
#[derive(Clone)]
pub struct PromptRepository {
    store: Arc<dyn KeyValueStore>,
    tags: TagIndex,
}

impl PromptRepository {
    pub fn new(store: Arc<dyn KeyValueStore>, tags: TagIndex) -> Self {
        Self { store, tags }
    }

    /// Lists every prompt record. Entries that fail to parse are logged
    /// and dropped so one bad record cannot break the whole listing.
    pub fn list(&self) -> HubResult<Vec<Prompt>> {
        let keys = self.store.list_keys(Namespace::Prompts, PROMPT_KEY_PREFIX)?;

        let mut prompts = Vec::new();
        for key in keys {
            let Some(value) = self.store.get(Namespace::Prompts, &key)? else {
                continue;
            };
            match serde_json::from_str::<Prompt>(&value) {
                Ok(prompt) => prompts.push(prompt),
                Err(e) => {
                    tracing::warn!("failed to parse prompt record '{}': {}", key, e);
                }
            }
        }
        Ok(prompts)
    }

    /// Point lookup by id. A parse failure of the requested record is an
    /// error here, unlike in [`list`](Self::list).
    pub fn get(&self, id: &str) -> HubResult<Prompt> {
        let value = self
            .store
            .get(Namespace::Prompts, &prompt_key(id))?
            .ok_or_else(|| HubError::NotFound(format!("prompt '{}' not found", id)))?;
        serde_json::from_str(&value).map_err(HubError::Deserialization)
    }

    /// Creates a prompt with a freshly generated id, then reconciles the
    /// tag index from the empty tag set.
    pub fn create(&self, input: PromptInput) -> HubResult<Prompt> {
        validate_required(&input)?;

        let tags = normalize_tags(input.tags.as_deref().unwrap_or_default());
        let prompt = Prompt {
            id: Uuid::new_v4().to_string(),
            title: input.title,
            content: input.content,
            description: input.description.unwrap_or_default(),
            tags,
            created_at: input
                .created_at
                .unwrap_or_else(|| Utc::now().to_rfc3339()),
            updated_at: None,
        };

        self.persist(&prompt)?;
        self.tags.reconcile(&[], &prompt.tags, &prompt.id);
        Ok(prompt)
    }

    /// Updates an existing prompt in place (same id), then reconciles the
    /// tag index against the previous tag set.
    pub fn update(&self, id: &str, input: PromptInput) -> HubResult<Prompt> {
        let existing = self.get(id)?;
        validate_required(&input)?;

        let tags = match input.tags {
            Some(tags) => normalize_tags(&tags),
            None => existing.tags.clone(),
        };
        let updated = Prompt {
            id: existing.id.clone(),
            title: input.title,
            content: input.content,
            description: input
                .description
                .unwrap_or_else(|| existing.description.clone()),
            tags,
            created_at: existing.created_at.clone(),
            updated_at: Some(
                input.updated_at.unwrap_or_else(|| Utc::now().to_rfc3339()),
            ),
        };

        self.persist(&updated)?;
        self.tags.reconcile(&existing.tags, &updated.tags, id);
        Ok(updated)
    }

    /// Deletes a prompt, detaching it from every tag it referenced.
    ///
    /// The existing record is loaded only to recover its tag list; if it
    /// no longer parses, the tags are treated as empty (best effort) and
    /// the key is removed anyway.
    pub fn delete(&self, id: &str) -> HubResult<()> {
        let key = prompt_key(id);
        let value = self
            .store
            .get(Namespace::Prompts, &key)?
            .ok_or_else(|| HubError::NotFound(format!("prompt '{}' not found", id)))?;

        let old_tags = match serde_json::from_str::<Prompt>(&value) {
            Ok(prompt) => prompt.tags,
            Err(e) => {
                tracing::warn!(
                    "failed to parse prompt record '{}' during delete, detaching no tags: {}",
                    key,
                    e
                );
                Vec::new()
            }
        };

        self.tags.reconcile(&old_tags, &[], id);
        self.store.delete(Namespace::Prompts, &key)?;
        Ok(())
    }

    fn persist(&self, prompt: &Prompt) -> HubResult<()> {
        let value = serde_json::to_string(prompt).map_err(HubError::Serialization)?;
        self.store
            .put(Namespace::Prompts, &prompt_key(&prompt.id), &value)?;
        Ok(())
    }
}

fn validate_required(input: &PromptInput) -> HubResult<()> {
    if input.title.trim().is_empty() {
        return Err(HubError::InvalidInput("title is required".into()));
    }
    if input.content.trim().is_empty() {
        return Err(HubError::InvalidInput("content is required".into()));
    }
    Ok(())
}
