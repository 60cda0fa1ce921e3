//! # PromptHub Core
//!
//! Core business logic for the PromptHub prompt-management service.
//!
//! This crate contains pure data operations over a key-value store:
//! - Prompt CRUD with JSON records keyed by generated IDs
//! - A denormalized tag index (tag name -> referencing prompt IDs and count)
//!   reconciled on every prompt mutation
//! - A one-time migration of legacy tag records into the tag namespace
//!
//! **No API concerns**: HTTP routing, payload parsing and response
//! formatting belong in the `prompthub` binary crate.

pub mod config;
pub mod error;
pub mod prompt;
pub mod prompts;
pub mod store;
pub mod tags;

pub use config::CoreConfig;
pub use error::{HubError, HubResult};
pub use prompt::{normalize_tags, Prompt, PromptInput};
pub use prompts::PromptRepository;
pub use store::{FileStore, KeyValueStore, KvError, KvResult, MemoryStore, Namespace};
pub use tags::{MigrationStats, TagIndex, TagRecord};
