//! Error types for the weft engine
//!
//! Domain errors use thiserror; conversions to `anyhow` happen at control
//! boundaries (the CLI). Execution errors carry a stack of document frames,
//! innermost first, so a failure inside an included or in-flow document still
//! names every document/line/column it crossed on the way out.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Boxed error produced by a language backend.
pub type BackendError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// One document frame in an error trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorFrame {
    /// Name of the document the error crossed.
    pub document: String,
    /// 1-based line within that document.
    pub line: u32,
    /// 1-based column within that document.
    pub column: u32,
}

impl ErrorFrame {
    /// Construct a frame for the given document position.
    pub fn new(document: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            document: document.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for ErrorFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.document, self.line, self.column)
    }
}

/// Stack of error frames accumulated while an error propagates outward.
///
/// The first frame is the innermost document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameStack(Vec<ErrorFrame>);

impl FrameStack {
    /// Empty frame stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame as the error crosses a document boundary.
    pub fn push(&mut self, frame: ErrorFrame) {
        self.0.push(frame);
    }

    /// Frames recorded so far, innermost first.
    pub fn frames(&self) -> &[ErrorFrame] {
        &self.0
    }
}

impl fmt::Display for FrameStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, frame) in self.0.iter().enumerate() {
            if index == 0 {
                write!(f, " at {}", frame)?;
            } else {
                write!(f, " <- {}", frame)?;
            }
        }
        Ok(())
    }
}

/// Parse-time errors. All of these abort construction of the Executable;
/// no partial Executable is ever returned.
#[derive(Debug, Error)]
pub enum ParseError {
    /// A start delimiter had no matching end delimiter.
    #[error("unterminated scriptlet span in '{document}' at {line}:{column}")]
    UnterminatedSpan {
        /// Document being parsed
        document: String,
        /// Line of the dangling start delimiter
        line: u32,
        /// Column of the dangling start delimiter
        column: u32,
    },

    /// A span referenced a language tag with no registered adapter.
    #[error("unknown language tag '{tag}' in '{document}' at {line}:{column}")]
    UnknownLanguage {
        /// The offending tag
        tag: String,
        /// Document being parsed
        document: String,
        /// Line of the span
        line: u32,
        /// Column of the span
        column: u32,
    },

    /// A registered span plugin rejected its span.
    #[error("plugin '{code}' rejected span in '{document}' at {line}:{column}: {detail}")]
    Plugin {
        /// Plugin sigil code
        code: String,
        /// Document being parsed
        document: String,
        /// Line of the span
        line: u32,
        /// Column of the span
        column: u32,
        /// Plugin-supplied detail
        detail: String,
    },

    /// An in-flow span was found but no document repository was configured.
    #[error("in-flow span in '{document}' at {line}:{column} requires a document repository")]
    MissingRepository {
        /// Document being parsed
        document: String,
        /// Line of the span
        line: u32,
        /// Column of the span
        column: u32,
    },

    /// The parsing configuration itself is invalid (e.g. overlapping plugin codes).
    #[error("invalid parsing configuration: {0}")]
    Config(String),
}

/// Convenience result alias for parsing operations.
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Backend compilation failure surfaced while creating or preparing a program.
#[derive(Debug, Error)]
#[error("preparation failed in '{document}' at program {position} (language '{language}'): {source}")]
pub struct PrepareError {
    /// Document owning the failed program segment
    pub document: String,
    /// Language tag of the failed segment
    pub language: String,
    /// Dense program position within the document
    pub position: usize,
    /// Backend cause
    #[source]
    pub source: BackendError,
}

/// Convenience result alias for preparation.
pub type PrepareResult<T> = std::result::Result<T, PrepareError>;

/// Runtime failure while executing a compiled document.
#[derive(Debug, Error)]
pub enum ExecError {
    /// Lazy preparation failed on first execution.
    #[error(transparent)]
    Prepare(#[from] PrepareError),

    /// A scriptlet program failed at runtime.
    #[error("program in language '{language}' failed{frames}: {source}")]
    Program {
        /// Language tag of the failing program
        language: String,
        /// Accumulated document frames, innermost first
        frames: FrameStack,
        /// Backend cause
        #[source]
        source: BackendError,
    },

    /// A segment's language tag resolved to no registered adapter.
    #[error("no adapter registered for language '{tag}'{frames}")]
    MissingAdapter {
        /// The unresolved tag
        tag: String,
        /// Accumulated document frames, innermost first
        frames: FrameStack,
    },

    /// Writing to the context's output sink failed.
    #[error("output sink write failed{frames}")]
    Output {
        /// Accumulated document frames, innermost first
        frames: FrameStack,
        /// IO cause
        #[source]
        source: io::Error,
    },

    /// Resolving or executing an included document failed.
    #[error("include of '{name}' failed{frames}: {source}")]
    Include {
        /// Name of the included document
        name: String,
        /// Accumulated document frames, innermost first
        frames: FrameStack,
        /// Underlying failure
        #[source]
        source: Box<EngineError>,
    },
}

impl ExecError {
    /// Wrap a backend runtime failure.
    pub fn backend(language: impl Into<String>, source: impl Into<BackendError>) -> Self {
        ExecError::Program {
            language: language.into(),
            frames: FrameStack::new(),
            source: source.into(),
        }
    }

    /// Append a document frame as the error propagates outward.
    pub fn with_frame(mut self, frame: ErrorFrame) -> Self {
        match &mut self {
            ExecError::Program { frames, .. }
            | ExecError::MissingAdapter { frames, .. }
            | ExecError::Output { frames, .. }
            | ExecError::Include { frames, .. } => frames.push(frame),
            // Preparation errors already carry document/position context.
            ExecError::Prepare(_) => {}
        }
        self
    }

    /// Frames recorded so far, innermost first.
    pub fn frames(&self) -> &[ErrorFrame] {
        match self {
            ExecError::Program { frames, .. }
            | ExecError::MissingAdapter { frames, .. }
            | ExecError::Output { frames, .. }
            | ExecError::Include { frames, .. } => frames.frames(),
            ExecError::Prepare(_) => &[],
        }
    }
}

impl From<io::Error> for ExecError {
    fn from(source: io::Error) -> Self {
        ExecError::Output {
            frames: FrameStack::new(),
            source,
        }
    }
}

/// Convenience result alias for execution.
pub type ExecResult<T> = std::result::Result<T, ExecError>;

/// Failure to invoke a named entry point on an enterable context.
///
/// These are returned to the caller; they are never fatal to the Executable.
#[derive(Debug, Error)]
pub enum EnterError {
    /// No context has been registered under the entering key.
    #[error("no enterable context is registered for key '{0}'")]
    NoContext(String),

    /// The entered context has never executed a program.
    #[error("no program has executed in the entered context")]
    NoActiveAdapter,

    /// The adapter could not resolve the requested entry point.
    #[error("no entry point named '{name}' (language '{language}')")]
    NoSuchEntryPoint {
        /// Requested entry point
        name: String,
        /// Language asked to resolve it
        language: String,
    },

    /// Entry invocation failed inside the backend.
    #[error("entry invocation failed in language '{language}': {source}")]
    Backend {
        /// Language of the invoked adapter
        language: String,
        /// Backend cause
        #[source]
        source: BackendError,
    },
}

/// Convenience result alias for entry invocation.
pub type EnterResult<T> = std::result::Result<T, EnterError>;

/// Document repository failures.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Named document does not exist.
    #[error("document '{0}' not found")]
    NotFound(String),

    /// Backing store failed.
    #[error("repository storage failed: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Convenience result alias for repository operations.
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// Compiled-artifact cache failures.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// Stored artifact does not match its recorded content hash.
    #[error("artifact integrity check failed for {path}")]
    HashMismatch {
        /// Path of the corrupt artifact
        path: PathBuf,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Top-level engine error.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Parse-time failure
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Preparation failure
    #[error("prepare error: {0}")]
    Prepare(#[from] PrepareError),

    /// Execution failure
    #[error("execution error: {0}")]
    Exec(#[from] ExecError),

    /// Entry invocation failure
    #[error("enter error: {0}")]
    Enter(#[from] EnterError),

    /// Repository failure
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Result type using [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;
