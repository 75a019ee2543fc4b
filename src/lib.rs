#![warn(missing_docs)]
//! Core library for cartlens: product-page excerpting, prompt building, and
//! normalization of language-model replies into product records.

pub mod cart;
pub mod config;
pub mod excerpt;
pub mod extractor;
pub mod hints;
pub mod model;
pub mod pipeline;
pub mod profile;
pub mod prompt;
pub mod record;
pub mod reply;
pub mod snapshot;
pub mod store;

pub use cart::{Cart, CartEntry, SaveOutcome, CART_KEY};
pub use config::{ModelConfig, AVAILABLE_MODELS};
pub use excerpt::{ExcerptDocument, Fragment};
pub use extractor::{build_excerpt, ConfigError, ExtractionConfig, ExtractionMode, Extractor};
pub use hints::{extract_hints, ProductHints, ProductImage};
pub use model::{ModelInvoker, OpenRouterInvoker, RemoteErrorKind, RemoteServiceError};
pub use pipeline::{process, Pipeline, ProcessError, Processed, Stage};
pub use profile::{ProfileError, Role, SelectorProfile, Take};
pub use prompt::build_prompt;
pub use record::{ProductRecord, FIELD_NAMES, NOT_AVAILABLE};
pub use reply::{normalize_reply, ReplyError};
pub use snapshot::{HttpSnapshot, MarkupSnapshot, PageSnapshot, SnapshotError, SnapshotProvider};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore, StoreError};
