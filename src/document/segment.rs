//! Typed spans of a compiled document

use serde::{Deserialize, Serialize};

use crate::engine::program::PreparedProgram;

/// 1-based source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePos {
    /// Line number, starting at 1.
    pub line: u32,
    /// Column number, starting at 1.
    pub column: u32,
}

impl SourcePos {
    /// Position of the start of a document.
    pub fn start() -> Self {
        Self { line: 1, column: 1 }
    }
}

/// What a segment is: literal text, or a program in some language.
#[derive(Debug)]
pub enum SegmentKind {
    /// Verbatim text written straight to the output sink.
    Literal,
    /// A compiled scriptlet.
    Program {
        /// Language tag the program executes under.
        language: String,
        /// Dense 0-based index among the document's program segments.
        position: usize,
        /// The program itself, owned exclusively by this segment.
        program: PreparedProgram,
    },
}

/// A contiguous span of a compiled document.
///
/// Literal segments hold no program by construction; program segments carry a
/// dense `position` assigned after collapsing.
#[derive(Debug)]
pub struct Segment {
    source: String,
    pos: SourcePos,
    kind: SegmentKind,
}

impl Segment {
    pub(crate) fn literal(source: String, pos: SourcePos) -> Self {
        Self {
            source,
            pos,
            kind: SegmentKind::Literal,
        }
    }

    pub(crate) fn program_segment(
        source: String,
        pos: SourcePos,
        language: String,
        position: usize,
        program: PreparedProgram,
    ) -> Self {
        Self {
            source,
            pos,
            kind: SegmentKind::Program {
                language,
                position,
                program,
            },
        }
    }

    /// Source text of the segment (program source for program segments).
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Position of the segment's first character (or start delimiter).
    pub fn pos(&self) -> SourcePos {
        self.pos
    }

    /// Segment kind.
    pub fn kind(&self) -> &SegmentKind {
        &self.kind
    }

    /// Whether this segment is a program.
    pub fn is_program(&self) -> bool {
        matches!(self.kind, SegmentKind::Program { .. })
    }

    /// Language tag, for program segments.
    pub fn language(&self) -> Option<&str> {
        match &self.kind {
            SegmentKind::Literal => None,
            SegmentKind::Program { language, .. } => Some(language),
        }
    }

    /// Dense program position, for program segments.
    pub fn position(&self) -> Option<usize> {
        match &self.kind {
            SegmentKind::Literal => None,
            SegmentKind::Program { position, .. } => Some(*position),
        }
    }

    /// The prepared program, for program segments.
    pub fn program(&self) -> Option<&PreparedProgram> {
        match &self.kind {
            SegmentKind::Literal => None,
            SegmentKind::Program { program, .. } => Some(program),
        }
    }
}

/// Pipeline segment before programs exist: what the parser emits and the
/// collapser rewrites.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Draft {
    pub source: String,
    pub pos: SourcePos,
    pub kind: DraftKind,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DraftKind {
    Literal,
    Code {
        language: String,
    },
    /// An in-flow span awaiting materialization into a synthetic document
    /// plus an include call in the enclosing language.
    InFlow {
        language: String,
        enclosing: String,
    },
}

impl Draft {
    pub(crate) fn literal(source: impl Into<String>, pos: SourcePos) -> Self {
        Self {
            source: source.into(),
            pos,
            kind: DraftKind::Literal,
        }
    }

    pub(crate) fn code(source: impl Into<String>, pos: SourcePos, language: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            pos,
            kind: DraftKind::Code {
                language: language.into(),
            },
        }
    }
}
