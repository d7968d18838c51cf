//! # promptdex Core
//!
//! This crate provides the core functionality for the promptdex prompt
//! library engine.
//!
//! promptdex treats a directory of plain text documents as a searchable,
//! renderable prompt library: each file carries a YAML front matter block
//! describing the prompt and its parameters, followed by a Handlebars
//! template body.
//!
//! # Modules
//!
//! - [`frontmatter`] - Front matter splitting and schema validation
//! - [`record`] - The indexed document model, excerpts and tag derivation
//! - [`loader`] - Loading a single file into a record
//! - [`crawler`] - Directory enumeration and bulk loading
//! - [`search`] - Weighted fuzzy search with recency ranking
//! - [`index`] - The live per-root index with filesystem watching
//! - [`registry`] - One shared index per resolved root
//! - [`params`] - Parameter normalization and validation
//! - [`renderer`] - Handlebars rendering with formatting helpers
//!
//! # Examples
//!
//! ```rust
//! use promptdex_core::registry::IndexRegistry;
//! use promptdex_core::renderer::Renderer;
//! use promptdex_core::params::ParameterValue;
//! use std::collections::BTreeMap;
//! use tempfile::TempDir;
//!
//! // A prompt library with a single document.
//! let library = TempDir::new().unwrap();
//! std::fs::write(
//!     library.path().join("greeting.md"),
//!     "---\nschema_version: 1\ntitle: Greeting\n---\nHello {{name}}!",
//! )
//! .unwrap();
//!
//! let registry = IndexRegistry::new();
//! let index = registry.get_or_init(library.path()).unwrap();
//! let results = index.search("greeting", None);
//! assert_eq!(results[0].record.id, "greeting.md");
//!
//! let mut params = BTreeMap::new();
//! params.insert("name".to_string(), ParameterValue::Text("world".to_string()));
//! let rendered = Renderer::new()
//!     .render(&results[0].record, &params, &serde_json::Map::new())
//!     .unwrap();
//! assert_eq!(rendered.output, "Hello world!");
//! ```

pub mod crawler;
pub mod frontmatter;
pub mod index;
pub mod loader;
pub mod params;
pub mod record;
pub mod registry;
pub mod renderer;
pub mod search;

mod watcher;

pub use index::{Index, IndexError, SubscriptionId};
pub use record::Record;
pub use registry::IndexRegistry;
pub use renderer::{RenderError, RenderedPrompt, Renderer};
pub use search::SearchResult;
