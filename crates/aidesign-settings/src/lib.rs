//! Pipeline settings engine: loader, relationship graph, builder and validation.
//!
//! A settings document is parsed into an [`aidesign_xml::Document`], edited in
//! place with a [`PipelineBuilder`], and materialized into a [`PipelineGraph`]
//! plus a flat [`DataSchema`] by [`load`]. [`Settings`] ties a document to the
//! file it was opened from.
//!
//! ```
//! use aidesign_settings::{ModuleSpec, Settings};
//!
//! let mut settings = Settings::new();
//! let mut builder = settings.builder();
//! builder
//!     .append_module(&ModuleSpec::new("DataProcessing", "norm1", "Normalizer").option("norm", "l2"))
//!     .unwrap();
//!
//! let loaded = settings.load().unwrap();
//! let norm1 = loaded.pipeline.find("norm1").unwrap();
//! assert_eq!(norm1.plugin_name(), Some("Normalizer"));
//! ```

pub mod builder;
pub mod graph;
pub mod loader;
pub mod registry;
pub mod relationships;
pub mod session;
pub mod validation;

pub use builder::{attach_plugin, new_document, LoopSpec, ModuleSpec, PipelineBuilder};
pub use graph::{Edge, EntryKind, PipelineEntry, PipelineGraph, PluginBinding, Relationships};
pub use loader::{load, load_with_options, DataSchema, LoadOptions, LoadedSettings, UnknownTag};
pub use registry::{valid_tags, TagCategory, EXIT_POINT_KEY};
pub use relationships::{add_relationships, Role};
pub use session::Settings;
pub use validation::{validate, validate_or_raise, validate_with, default_rules, Diagnostic, LintRule, Severity};
