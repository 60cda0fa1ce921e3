//! Prompt records and boundary payloads.
//!
//! Wire field names are camelCase to match the JSON API consumed by the
//! frontend (`createdAt`, `updatedAt`).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use utoipa::ToSchema;

/// A stored prompt record.
///
/// Identity is `id`, generated once at creation and immutable afterwards.
/// `tags` are lowercased and deduplicated at write time, preserving first
/// occurrence order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Typed create/update payload.
///
/// Schema shape is enforced at deserialization; field-level rules (title
/// and content must be non-empty) are checked by the repository so both
/// yield the same validation error. `title` and `content` default to empty
/// strings here so a missing field is reported as a validation failure
/// rather than a deserialization one.
#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PromptInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Normalizes a tag list: trims, lowercases, drops empties and duplicates.
///
/// First occurrence order is preserved so the stored record keeps the
/// author's ordering.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut normalized = Vec::new();
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() {
            continue;
        }
        if seen.insert(tag.clone()) {
            normalized.push(tag);
        }
    }
    normalized
}
