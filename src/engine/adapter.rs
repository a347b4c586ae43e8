//! Language adapter capability contract
//!
//! Each pluggable language backend implements [`LanguageAdapter`]: metadata
//! (tag, file extensions, thread safety), the code-generation functions the
//! parser and collapser call, program creation, and named entry invocation.
//! Backends are independent modules dispatched through the registry; the
//! engine never subclasses or special-cases a language.

use std::sync::Arc;

use crate::document::Executable;
use crate::engine::context::ExecutionContext;
use crate::error::{BackendError, EnterResult, ExecResult};

/// Neutral value type exchanged with backends at the entry-invocation boundary.
pub type EntryValue = serde_json::Value;

/// Shared handle to a registered language adapter.
pub type AdapterRef = Arc<dyn LanguageAdapter>;

/// Identity and position of one program segment within its document.
///
/// Passed to [`LanguageAdapter::create_program`] so a backend can key external
/// caches by document name and program position without holding a reference to
/// the still-under-construction Executable.
#[derive(Debug, Clone)]
pub struct ProgramScope {
    /// Name of the owning document.
    pub document: String,
    /// Partition of the owning document, if any.
    pub partition: Option<String>,
    /// Language tag of the segment.
    pub language: String,
    /// Dense 0-based index among the document's program segments.
    pub position: usize,
    /// 1-based line of the segment's start delimiter.
    pub line: u32,
    /// 1-based column of the segment's start delimiter.
    pub column: u32,
}

/// Capability contract implemented by each language backend.
pub trait LanguageAdapter: Send + Sync {
    /// Primary language tag this adapter answers to.
    fn tag(&self) -> &str;

    /// File extensions resolved to this adapter by repository integrations.
    fn extensions(&self) -> &[&str] {
        &[]
    }

    /// Whether programs of this language may execute concurrently.
    ///
    /// When `false`, the engine serializes all `execute` calls through this
    /// adapter process-wide.
    fn is_thread_safe(&self) -> bool;

    /// Code that writes `text` verbatim to the context's output sink.
    fn literal_output_code(&self, text: &str) -> String;

    /// Code that evaluates `expression` and writes its result to the output sink.
    fn expression_output_code(&self, expression: &str) -> String;

    /// Code that resolves `expression` to a document name and includes that
    /// document's output in place.
    fn expression_include_code(&self, expression: &str) -> String;

    /// Compile or wrap `code` into a program bound to one segment.
    fn create_program(
        &self,
        code: &str,
        scope: &ProgramScope,
    ) -> std::result::Result<Box<dyn Program>, BackendError>;

    /// Resolve and invoke a named entry point in a previously executed context.
    fn enter(
        &self,
        entry_point: &str,
        executable: &Executable,
        context: &ExecutionContext,
        args: &[EntryValue],
    ) -> EnterResult<EntryValue>;

    /// Release backend resources attached to a context (idempotent).
    fn release_context(&self, context: &ExecutionContext) {
        let _ = context;
    }
}

/// A compiled or interpretable unit produced by an adapter for one segment.
pub trait Program: Send + Sync {
    /// Final source code of this program after collapsing.
    fn source_code(&self) -> &str;

    /// Ahead-of-time preparation (compilation, caching).
    ///
    /// The engine guarantees at most one successful invocation per program;
    /// implementations need not guard against re-entry themselves.
    fn prepare(&self) -> std::result::Result<(), BackendError> {
        Ok(())
    }

    /// Run the program against the given context.
    fn execute(&self, context: &ExecutionContext) -> ExecResult<()>;
}
