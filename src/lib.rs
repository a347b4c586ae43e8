//! Weft – a multi-language scriptlet-document engine
//!
//! This crate compiles a document that mixes literal text with embedded code
//! spans ("scriptlets") in any number of pluggable languages into an
//! optimized, immutable sequence of segments, and executes it against a
//! swappable language backend:
//! - Delimiter-driven parsing with comment/expression/include/in-flow sigils
//!   and custom span plugins
//! - Segment collapsing so same-language runs become a single program
//! - A capability-trait adapter contract dispatched through a registry
//! - Compute-once program preparation, safe under concurrency
//! - Enterable mode: run a document once, then invoke its named entry points
//!   repeatedly with low per-call overhead

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Built-in language adapters.
pub mod adapters;
/// Document compilation pipeline and compiled documents.
pub mod document;
/// Adapter contract, registry, contexts and program lifecycle.
pub mod engine;
/// Error types for all engine operations.
pub mod error;
/// Document repository contract and in-memory implementation.
pub mod repository;
/// Small shared utilities.
pub mod util;

// Re-export key types for convenience
pub use document::{DelimiterPair, Executable, ParsingConfig, Segment, SegmentKind};
pub use engine::{AdapterCatalog, AdapterRegistry, ExecutionContext, LanguageAdapter, Program};
pub use error::{EngineError, Result};

/// Current version of the weft engine
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
