//! Document compilation pipeline
//!
//! A raw document interleaving literal text with delimited scriptlet spans is
//! parsed into typed segments, optimized by the collapser, and bound to
//! backend programs, yielding an immutable [`Executable`]. The Executable
//! drives execution against a context, enterable registration, and entry
//! invocation.

/// Segment collapsing optimization pass.
pub(crate) mod collapse;
/// Parsing configuration: delimiters, sigils, plugins, collaborators.
pub mod config;
/// Compiled documents and their execution.
pub mod executable;
/// Delimiter-driven span parser.
pub(crate) mod parser;
/// Typed spans of a compiled document.
pub mod segment;

pub use config::{
    AtomicSequence, DelimiterPair, ParsingConfig, PluginAction, SequenceGenerator, SpanPlugin,
};
pub use executable::{DocumentService, Executable};
pub use segment::{Segment, SegmentKind, SourcePos};
