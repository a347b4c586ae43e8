//! Delimiter-driven document parser
//!
//! Scans raw text for the first occurrence of either configured start
//! delimiter; whichever is found first fixes the delimiter style for the
//! entire document (the other style's tokens stay literal). Each enclosed
//! span is classified, in order, as: registered plugin sigil, comment,
//! expression, include, in-flow, or plain scriptlet. The language tag is the
//! maximal non-whitespace run immediately after sigil stripping; its absence
//! means "inherit the last-used language", defaulting to the configured tag
//! on the first span.

use crate::document::config::{DelimiterPair, ParsingConfig, PluginAction};
use crate::document::segment::{Draft, DraftKind, SourcePos};
use crate::engine::registry::AdapterRegistry;
use crate::error::{ParseError, ParseResult};

/// Parser output: the linear draft list plus the delimiter style that was
/// committed to (None for pure-literal documents).
#[derive(Debug)]
pub(crate) struct ParsedDocument {
    pub drafts: Vec<Draft>,
    pub delimiters: Option<DelimiterPair>,
}

/// Split raw text into classified drafts.
pub(crate) fn parse_document(
    name: &str,
    source: &str,
    config: &ParsingConfig,
    registry: &AdapterRegistry,
) -> ParseResult<ParsedDocument> {
    let style = match detect_style(source, &config.delimiters) {
        Some(style) => style.clone(),
        None => {
            // The trivial case: the whole document is one literal segment.
            let mut drafts = Vec::new();
            if !source.is_empty() {
                drafts.push(Draft::literal(source, SourcePos::start()));
            }
            return Ok(ParsedDocument {
                drafts,
                delimiters: None,
            });
        }
    };
    tracing::debug!(document = name, start = %style.start, "delimiter style committed");

    let mut scanner = Scanner {
        name,
        config,
        registry,
        cursor: Cursor::start(),
        drafts: Vec::new(),
        active: None,
    };

    let (start, end) = (style.start.as_str(), style.end.as_str());
    let mut rest = source;
    loop {
        match rest.find(start) {
            None => {
                if !rest.is_empty() {
                    scanner.push_literal(rest);
                }
                break;
            }
            Some(index) => {
                let (literal, tail) = rest.split_at(index);
                if !literal.is_empty() {
                    scanner.push_literal(literal);
                }
                let span_pos = scanner.cursor.pos();
                let after_start = &tail[start.len()..];
                scanner.cursor.advance(start);
                let Some(end_index) = after_start.find(end) else {
                    return Err(ParseError::UnterminatedSpan {
                        document: name.to_string(),
                        line: span_pos.line,
                        column: span_pos.column,
                    });
                };
                let body = &after_start[..end_index];
                scanner.classify(body, span_pos)?;
                scanner.cursor.advance(body);
                scanner.cursor.advance(end);
                rest = &after_start[end_index + end.len()..];
            }
        }
    }

    Ok(ParsedDocument {
        drafts: scanner.drafts,
        delimiters: Some(style),
    })
}

/// Pick the delimiter style whose start token occurs earliest; ties go to the
/// first-configured pair.
fn detect_style<'a>(source: &str, pairs: &'a [DelimiterPair; 2]) -> Option<&'a DelimiterPair> {
    match (source.find(&pairs[0].start), source.find(&pairs[1].start)) {
        (Some(first), Some(second)) if second < first => Some(&pairs[1]),
        (Some(_), _) => Some(&pairs[0]),
        (None, Some(_)) => Some(&pairs[1]),
        (None, None) => None,
    }
}

/// 1-based line/column tracker.
struct Cursor {
    line: u32,
    column: u32,
}

impl Cursor {
    fn start() -> Self {
        Self { line: 1, column: 1 }
    }

    fn pos(&self) -> SourcePos {
        SourcePos {
            line: self.line,
            column: self.column,
        }
    }

    fn advance(&mut self, text: &str) {
        for ch in text.chars() {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }
}

struct Scanner<'a> {
    name: &'a str,
    config: &'a ParsingConfig,
    registry: &'a AdapterRegistry,
    cursor: Cursor,
    drafts: Vec<Draft>,
    /// Last-used language for tag inheritance.
    active: Option<String>,
}

impl Scanner<'_> {
    fn push_literal(&mut self, text: &str) {
        let pos = self.cursor.pos();
        self.drafts.push(Draft::literal(text, pos));
        self.cursor.advance(text);
    }

    fn classify(&mut self, body: &str, pos: SourcePos) -> ParseResult<()> {
        // Registered plugin sigils take precedence over builtin sigils.
        for plugin in self.config.plugins() {
            let Some(rest) = body.strip_prefix(plugin.code()) else {
                continue;
            };
            let action = plugin.process(rest).map_err(|detail| ParseError::Plugin {
                code: plugin.code().to_string(),
                document: self.name.to_string(),
                line: pos.line,
                column: pos.column,
                detail,
            })?;
            match action {
                PluginAction::Drop => {}
                PluginAction::Literal(text) => self.drafts.push(Draft::literal(text, pos)),
                PluginAction::Scriptlet { language, code } => {
                    self.require_language(&language, pos)?;
                    self.active = Some(language.clone());
                    self.drafts.push(Draft::code(code, pos, language));
                }
            }
            return Ok(());
        }

        if body.strip_prefix(self.config.comment_sigil.as_str()).is_some() {
            // Comment spans are dropped entirely.
            return Ok(());
        }

        if let Some(rest) = body.strip_prefix(self.config.expression_sigil.as_str()) {
            let (language, expression) = self.resolve_tagged(rest, pos)?;
            let adapter = self.adapter(&language, pos)?;
            let code = adapter.expression_output_code(expression.trim());
            self.active = Some(language.clone());
            self.drafts.push(Draft::code(code, pos, language));
            return Ok(());
        }

        if let Some(rest) = body.strip_prefix(self.config.include_sigil.as_str()) {
            let (language, expression) = self.resolve_tagged(rest, pos)?;
            let adapter = self.adapter(&language, pos)?;
            let code = adapter.expression_include_code(expression.trim());
            self.active = Some(language.clone());
            self.drafts.push(Draft::code(code, pos, language));
            return Ok(());
        }

        if let Some(rest) = body.strip_prefix(self.config.inflow_sigil.as_str()) {
            let (tag, remainder) = split_tag(rest);
            let enclosing = self.inherited();
            self.require_language(&enclosing, pos)?;
            let language = match tag {
                Some(tag) => tag.to_string(),
                None => enclosing.clone(),
            };
            self.require_language(&language, pos)?;
            if language == enclosing {
                // Same-language in-flow needs no nested document.
                self.drafts.push(Draft::code(remainder, pos, language));
            } else {
                self.drafts.push(Draft {
                    source: remainder.to_string(),
                    pos,
                    kind: DraftKind::InFlow {
                        language,
                        enclosing,
                    },
                });
            }
            return Ok(());
        }

        // Plain scriptlet.
        let (language, code) = self.resolve_tagged(body, pos)?;
        self.active = Some(language.clone());
        self.drafts.push(Draft::code(code, pos, language));
        Ok(())
    }

    fn inherited(&self) -> String {
        self.active
            .clone()
            .unwrap_or_else(|| self.config.default_language.clone())
    }

    fn resolve_tagged<'b>(&self, text: &'b str, pos: SourcePos) -> ParseResult<(String, &'b str)> {
        let (tag, remainder) = split_tag(text);
        let language = match tag {
            Some(tag) => tag.to_string(),
            None => self.inherited(),
        };
        self.require_language(&language, pos)?;
        Ok((language, remainder))
    }

    fn require_language(&self, tag: &str, pos: SourcePos) -> ParseResult<()> {
        if self.registry.has_tag(tag) {
            Ok(())
        } else {
            Err(ParseError::UnknownLanguage {
                tag: tag.to_string(),
                document: self.name.to_string(),
                line: pos.line,
                column: pos.column,
            })
        }
    }

    fn adapter(
        &self,
        tag: &str,
        pos: SourcePos,
    ) -> ParseResult<crate::engine::adapter::AdapterRef> {
        self.registry.get(tag).ok_or_else(|| ParseError::UnknownLanguage {
            tag: tag.to_string(),
            document: self.name.to_string(),
            line: pos.line,
            column: pos.column,
        })
    }
}

/// Split a span body into its leading language-tag token and the remainder.
///
/// The tag is the maximal non-whitespace run starting at the first byte; if
/// the body starts with whitespace (or is empty) there is no tag. One
/// separating whitespace character after the tag is consumed.
fn split_tag(text: &str) -> (Option<&str>, &str) {
    let tag_len = text
        .find(|ch: char| ch.is_whitespace())
        .unwrap_or(text.len());
    if tag_len == 0 {
        return (None, text);
    }
    let tag = &text[..tag_len];
    let mut remainder = &text[tag_len..];
    if let Some(ch) = remainder.chars().next() {
        if ch.is_whitespace() {
            remainder = &remainder[ch.len_utf8()..];
        }
    }
    (Some(tag), remainder)
}
