//! Engine core: the adapter contract and execution machinery
//!
//! A document compiles into a sequence of segments; each program segment is
//! handed to a language adapter to produce a program, optionally prepared
//! ahead of time, and executed against a per-invocation context. This module
//! defines that seam: the capability trait adapters implement, the registry
//! that dispatches on language tags, the compute-once preparation cell, the
//! execution context, and the artifact store backends may persist into.

/// Language adapter and program capability traits.
pub mod adapter;
/// Filesystem cache for compiled program artifacts.
pub mod artifact;
/// Per-invocation execution state.
pub mod context;
/// Compute-once preparation wrapper around backend programs.
pub mod program;
/// Adapter catalog and immutable registry snapshots.
pub mod registry;

pub use adapter::{AdapterRef, EntryValue, LanguageAdapter, Program, ProgramScope};
pub use artifact::ArtifactCache;
pub use context::{ExecutionContext, Service};
pub use program::PreparedProgram;
pub use registry::{AdapterCatalog, AdapterRegistry};
