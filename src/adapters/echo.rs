//! Built-in line-oriented demonstration adapter
//!
//! "echo" is a deliberately tiny language that exists so the engine can run
//! and be tested without a real backend. A program is a sequence of lines:
//!
//! - `emit <text>` writes text (with `\n`/`\\` escapes) to the output sink
//! - `eval <expr>` evaluates an integer expression (`+ - *`, left to right,
//!   no precedence) and writes the result
//! - `def <name> <body>` records a named entry point in the context
//! - `include <json-string>` includes a named document via the document
//!   service (looked up under [`DEFAULT_SELF_SERVICE`])
//! - `fail <message>` aborts execution with a backend error
//!
//! Blank lines are ignored. Instructions are parsed during preparation, so a
//! malformed program fails at prepare time, not mid-output.
//!
//! Programs are line-oriented and the collapser concatenates same-language
//! spans verbatim, so a span directly followed by another span should end
//! with a newline. Code the adapter generates itself is newline-delimited on
//! both sides and composes either way.

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::document::config::DEFAULT_SELF_SERVICE;
use crate::document::{DocumentService, Executable};
use crate::engine::adapter::{EntryValue, LanguageAdapter, Program, ProgramScope};
use crate::engine::context::ExecutionContext;
use crate::error::{BackendError, EnterError, EnterResult, ExecError, ExecResult};

/// Service name under which echo programs record entry-point definitions.
const ENTRIES_SERVICE: &str = "echo:entries";

/// Entry points defined by `def` instructions, shared through the context.
#[derive(Default)]
struct EchoEntries(RwLock<HashMap<String, String>>);

#[derive(Default)]
struct EchoStats {
    prepares: AtomicUsize,
    releases: AtomicUsize,
}

/// The built-in echo language adapter.
pub struct EchoAdapter {
    tag: String,
    thread_safe: bool,
    stats: Arc<EchoStats>,
}

impl EchoAdapter {
    /// Adapter under the default `echo` tag.
    pub fn new() -> Self {
        Self::with_tag("echo")
    }

    /// Adapter under a custom tag (useful for multi-language tests).
    pub fn with_tag(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            thread_safe: true,
            stats: Arc::default(),
        }
    }

    /// Adapter that declares itself not thread-safe, so the engine serializes
    /// all execution through it.
    pub fn serialized(tag: impl Into<String>) -> Self {
        Self {
            thread_safe: false,
            ..Self::with_tag(tag)
        }
    }

    /// Number of program preparations performed so far.
    pub fn prepare_count(&self) -> usize {
        self.stats.prepares.load(Ordering::SeqCst)
    }

    /// Number of release-hook invocations so far.
    pub fn release_count(&self) -> usize {
        self.stats.releases.load(Ordering::SeqCst)
    }
}

impl Default for EchoAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAdapter for EchoAdapter {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn extensions(&self) -> &[&str] {
        if self.tag == "echo" { &["echo"] } else { &[] }
    }

    fn is_thread_safe(&self) -> bool {
        self.thread_safe
    }

    // Generated code is newline-delimited on both sides so it stays
    // line-separated from hand-written span code after collapsing.

    fn literal_output_code(&self, text: &str) -> String {
        format!("\nemit {}\n", escape(text))
    }

    fn expression_output_code(&self, expression: &str) -> String {
        format!("\neval {}\n", expression)
    }

    fn expression_include_code(&self, expression: &str) -> String {
        format!("\ninclude {}\n", expression)
    }

    fn create_program(
        &self,
        code: &str,
        _scope: &ProgramScope,
    ) -> std::result::Result<Box<dyn Program>, BackendError> {
        Ok(Box::new(EchoProgram {
            source: code.to_string(),
            language: self.tag.clone(),
            stats: Arc::clone(&self.stats),
            ops: OnceCell::new(),
        }))
    }

    fn enter(
        &self,
        entry_point: &str,
        _executable: &Executable,
        context: &ExecutionContext,
        args: &[EntryValue],
    ) -> EnterResult<EntryValue> {
        let missing = || EnterError::NoSuchEntryPoint {
            name: entry_point.to_string(),
            language: self.tag.clone(),
        };
        let entries = context
            .service_as::<EchoEntries>(ENTRIES_SERVICE)
            .ok_or_else(missing)?;
        let body = entries.0.read().get(entry_point).cloned().ok_or_else(missing)?;

        let mut rendered = body;
        for arg in args {
            rendered.push(' ');
            match arg {
                EntryValue::String(text) => rendered.push_str(text),
                other => rendered.push_str(&other.to_string()),
            }
        }
        Ok(EntryValue::String(rendered))
    }

    fn release_context(&self, _context: &ExecutionContext) {
        self.stats.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// One parsed echo instruction.
#[derive(Debug, Clone)]
enum Op {
    Emit(String),
    Eval(Vec<Token>),
    Def { name: String, body: String },
    Include(String),
    Fail(String),
}

struct EchoProgram {
    source: String,
    language: String,
    stats: Arc<EchoStats>,
    ops: OnceCell<Vec<Op>>,
}

impl Program for EchoProgram {
    fn source_code(&self) -> &str {
        &self.source
    }

    fn prepare(&self) -> std::result::Result<(), BackendError> {
        let ops = parse_ops(&self.source)?;
        self.stats.prepares.fetch_add(1, Ordering::SeqCst);
        let _ = self.ops.set(ops);
        Ok(())
    }

    fn execute(&self, context: &ExecutionContext) -> ExecResult<()> {
        let ops = self.ops.get().ok_or_else(|| {
            ExecError::backend(&self.language, "program executed before preparation")
        })?;

        for op in ops {
            match op {
                Op::Emit(text) => context.write_output(text)?,
                Op::Eval(tokens) => context.write_output(&evaluate(tokens).to_string())?,
                Op::Def { name, body } => {
                    let entries = match context.service_as::<EchoEntries>(ENTRIES_SERVICE) {
                        Some(entries) => entries,
                        None => {
                            let entries = Arc::new(EchoEntries::default());
                            context.insert_service(ENTRIES_SERVICE, entries.clone());
                            entries
                        }
                    };
                    entries.0.write().insert(name.clone(), body.clone());
                }
                Op::Include(expression) => {
                    let name: String =
                        serde_json::from_str(expression.trim()).map_err(|err| {
                            ExecError::backend(
                                &self.language,
                                format!("include expects a string literal: {err}"),
                            )
                        })?;
                    let service = context
                        .service_as::<DocumentService>(DEFAULT_SELF_SERVICE)
                        .ok_or_else(|| {
                            ExecError::backend(&self.language, "no document service installed")
                        })?;
                    service.include(&name, context).map_err(|err| {
                        ExecError::Include {
                            name: name.clone(),
                            frames: Default::default(),
                            source: Box::new(err),
                        }
                    })?;
                }
                Op::Fail(message) => {
                    return Err(ExecError::backend(&self.language, message.clone()));
                }
            }
        }
        Ok(())
    }
}

fn parse_ops(source: &str) -> std::result::Result<Vec<Op>, BackendError> {
    let mut ops = Vec::new();
    for raw in source.lines() {
        // Leading whitespace carries no meaning; emit payloads keep theirs
        // because the instruction keyword anchors the line.
        let line = raw.trim_start();
        if line.is_empty() {
            continue;
        }
        let op = if let Some(text) = line.strip_prefix("emit ") {
            Op::Emit(unescape(text))
        } else if line == "emit" {
            Op::Emit(String::new())
        } else if let Some(expression) = line.strip_prefix("eval ") {
            Op::Eval(tokenize(expression)?)
        } else if let Some(rest) = line.strip_prefix("def ") {
            let (name, body) = match rest.split_once(char::is_whitespace) {
                Some((name, body)) => (name, body),
                None => (rest, ""),
            };
            if name.is_empty() {
                return Err("def requires an entry point name".into());
            }
            Op::Def {
                name: name.to_string(),
                body: body.to_string(),
            }
        } else if let Some(expression) = line.strip_prefix("include ") {
            Op::Include(expression.to_string())
        } else if let Some(message) = line.strip_prefix("fail ") {
            Op::Fail(message.to_string())
        } else {
            return Err(format!("unknown echo instruction '{line}'").into());
        };
        ops.push(op);
    }
    Ok(ops)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Num(i64),
    Plus,
    Minus,
    Star,
}

fn tokenize(expression: &str) -> std::result::Result<Vec<Token>, BackendError> {
    let mut tokens = Vec::new();
    let mut chars = expression.chars().peekable();
    while let Some(&ch) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '0'..='9' => {
                let mut value: i64 = 0;
                while let Some(digit) = chars.peek().and_then(|c| c.to_digit(10)) {
                    value = value * 10 + i64::from(digit);
                    chars.next();
                }
                tokens.push(Token::Num(value));
            }
            '+' => {
                tokens.push(Token::Plus);
                chars.next();
            }
            '-' => {
                tokens.push(Token::Minus);
                chars.next();
            }
            '*' => {
                tokens.push(Token::Star);
                chars.next();
            }
            other => {
                return Err(format!("invalid character '{other}' in expression").into());
            }
        }
    }

    // Expressions must alternate number, operator, number, ...
    if tokens.is_empty() {
        return Err("empty expression".into());
    }
    for (index, token) in tokens.iter().enumerate() {
        let expect_number = index % 2 == 0;
        if expect_number != matches!(token, Token::Num(_)) {
            return Err(format!("malformed expression '{expression}'").into());
        }
    }
    if tokens.len() % 2 == 0 {
        return Err(format!("dangling operator in '{expression}'").into());
    }
    Ok(tokens)
}

fn evaluate(tokens: &[Token]) -> i64 {
    let mut result = match tokens[0] {
        Token::Num(value) => value,
        _ => 0,
    };
    let mut index = 1;
    while index + 1 < tokens.len() {
        let Token::Num(operand) = tokens[index + 1] else {
            break;
        };
        result = match tokens[index] {
            Token::Plus => result.wrapping_add(operand),
            Token::Minus => result.wrapping_sub(operand),
            Token::Star => result.wrapping_mul(operand),
            Token::Num(_) => break,
        };
        index += 2;
    }
    result
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_code_round_trips_through_escaping() {
        let adapter = EchoAdapter::new();
        let code = adapter.literal_output_code("line one\nback\\slash");
        assert_eq!(code, "\nemit line one\\nback\\\\slash\n");
        let ops = parse_ops(&code).unwrap();
        assert_eq!(ops.len(), 1);
        match &ops[0] {
            Op::Emit(text) => assert_eq!(text, "line one\nback\\slash"),
            other => panic!("unexpected op: {other:?}"),
        }
    }

    #[test]
    fn generated_code_concatenates_with_span_code() {
        let adapter = EchoAdapter::new();
        // A hand-written span without a trailing newline followed by folded
        // literal code must stay two distinct instructions.
        let mut source = String::from(" emit a");
        source.push_str(&adapter.literal_output_code("b"));
        let ops = parse_ops(&source).unwrap();
        assert_eq!(ops.len(), 2);
    }

    #[test]
    fn expressions_evaluate_left_to_right() {
        assert_eq!(evaluate(&tokenize("1+1").unwrap()), 2);
        assert_eq!(evaluate(&tokenize("2 + 3 * 4").unwrap()), 20);
        assert_eq!(evaluate(&tokenize("10 - 2 - 3").unwrap()), 5);
    }

    #[test]
    fn malformed_programs_fail_at_prepare() {
        assert!(parse_ops("emit ok\nnonsense here\n").is_err());
        assert!(tokenize("1 + x").is_err());
        assert!(tokenize("1 +").is_err());
        assert!(tokenize("+ 1").is_err());
    }
}
