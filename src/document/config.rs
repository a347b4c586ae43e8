//! Parsing configuration
//!
//! Carries the two delimiter-pair options, the special-span sigils, the
//! default language tag, custom span plugins, and the collaborators the
//! compile pipeline needs (document repository, in-flow name sequence).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{ParseError, ParseResult};
use crate::repository::DocumentRepository;

/// Service name under which the engine exposes the per-call document service
/// unless the configuration overrides it.
pub const DEFAULT_SELF_SERVICE: &str = "document";

/// One start/end delimiter pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelimiterPair {
    /// Token opening a scriptlet span.
    pub start: String,
    /// Token closing a scriptlet span.
    pub end: String,
}

impl DelimiterPair {
    /// Construct a delimiter pair.
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }
}

/// What a span plugin decided to do with its span.
pub enum PluginAction {
    /// Consume the span entirely (directive-style plugins).
    Drop,
    /// Replace the span with literal output text.
    Literal(String),
    /// Replace the span with a scriptlet in the given language.
    Scriptlet {
        /// Language tag of the produced code.
        language: String,
        /// Program source to emit.
        code: String,
    },
}

/// Custom span handler matched by an exact sigil code at span start.
///
/// Plugin codes are checked before the builtin comment/expression/include/
/// in-flow sigils. Codes must be unique and non-overlapping (no code may be a
/// prefix of another registered code or of a builtin sigil), which keeps
/// classification independent of registration order.
pub trait SpanPlugin: Send + Sync {
    /// Sigil code matched immediately after the start delimiter.
    fn code(&self) -> &str;

    /// Process the span body (text after the sigil code).
    ///
    /// An `Err` detail becomes a fatal parse error at the span's position.
    fn process(&self, body: &str) -> std::result::Result<PluginAction, String>;
}

/// Generator of unique identifiers for in-flow synthetic document names.
pub trait SequenceGenerator: Send + Sync {
    /// Next identifier; must never repeat within the generator's lifetime.
    fn next(&self) -> u64;
}

/// Default monotonically increasing sequence.
#[derive(Debug, Default)]
pub struct AtomicSequence(AtomicU64);

impl SequenceGenerator for AtomicSequence {
    fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

/// Configuration for parsing one document into an Executable.
#[derive(Clone)]
pub struct ParsingConfig {
    /// The two interchangeable delimiter pairs; whichever occurs first in a
    /// document fixes the style for that whole document.
    pub delimiters: [DelimiterPair; 2],
    /// Sigil marking a comment span (span dropped entirely).
    pub comment_sigil: String,
    /// Sigil marking an expression span.
    pub expression_sigil: String,
    /// Sigil marking an include span.
    pub include_sigil: String,
    /// Sigil marking an in-flow span.
    pub inflow_sigil: String,
    /// Language tag assumed when the first span carries no tag.
    pub default_language: String,
    /// Prepare every program during construction instead of lazily.
    pub prepare_eagerly: bool,
    /// Service name under which the engine exposes the per-call document service.
    pub self_service_name: String,
    /// Document repository; required only if in-flow spans occur.
    pub repository: Option<Arc<dyn DocumentRepository>>,
    /// Sequence for unique in-flow document names.
    pub sequence: Arc<dyn SequenceGenerator>,
    plugins: Vec<Arc<dyn SpanPlugin>>,
}

impl ParsingConfig {
    /// Default configuration for a given default language tag.
    ///
    /// Delimiters default to `<% %>` and `<? ?>`; sigils to `#` (comment),
    /// `=` (expression), `&` (include) and `:` (in-flow).
    pub fn new(default_language: impl Into<String>) -> Self {
        Self {
            delimiters: [
                DelimiterPair::new("<%", "%>"),
                DelimiterPair::new("<?", "?>"),
            ],
            comment_sigil: "#".to_string(),
            expression_sigil: "=".to_string(),
            include_sigil: "&".to_string(),
            inflow_sigil: ":".to_string(),
            default_language: default_language.into(),
            prepare_eagerly: false,
            self_service_name: DEFAULT_SELF_SERVICE.to_string(),
            repository: None,
            sequence: Arc::new(AtomicSequence::default()),
            plugins: Vec::new(),
        }
    }

    /// Attach a document repository (required for in-flow spans and includes).
    pub fn with_repository(mut self, repository: Arc<dyn DocumentRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Request eager (construction-time) preparation of every program.
    pub fn with_eager_preparation(mut self) -> Self {
        self.prepare_eagerly = true;
        self
    }

    /// Register a custom span plugin.
    ///
    /// Rejects empty codes and codes that overlap (by prefix) another plugin
    /// or a builtin sigil.
    pub fn register_plugin(&mut self, plugin: Arc<dyn SpanPlugin>) -> ParseResult<()> {
        let code = plugin.code().to_string();
        if code.is_empty() {
            return Err(ParseError::Config("plugin sigil code must be non-empty".into()));
        }
        let builtin = [
            &self.comment_sigil,
            &self.expression_sigil,
            &self.include_sigil,
            &self.inflow_sigil,
        ];
        for sigil in builtin {
            if code.starts_with(sigil.as_str()) || sigil.starts_with(&code) {
                return Err(ParseError::Config(format!(
                    "plugin sigil '{}' overlaps builtin sigil '{}'",
                    code, sigil
                )));
            }
        }
        for existing in &self.plugins {
            let other = existing.code();
            if code.starts_with(other) || other.starts_with(&code) {
                return Err(ParseError::Config(format!(
                    "plugin sigil '{}' overlaps registered sigil '{}'",
                    code, other
                )));
            }
        }
        self.plugins.push(plugin);
        Ok(())
    }

    /// Registered span plugins, in registration order.
    pub fn plugins(&self) -> &[Arc<dyn SpanPlugin>] {
        &self.plugins
    }
}

impl fmt::Debug for ParsingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParsingConfig")
            .field("delimiters", &self.delimiters)
            .field("comment_sigil", &self.comment_sigil)
            .field("expression_sigil", &self.expression_sigil)
            .field("include_sigil", &self.include_sigil)
            .field("inflow_sigil", &self.inflow_sigil)
            .field("default_language", &self.default_language)
            .field("prepare_eagerly", &self.prepare_eagerly)
            .field("self_service_name", &self.self_service_name)
            .field("repository", &self.repository.is_some())
            .field("plugins", &self.plugins.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NamedPlugin(&'static str);

    impl SpanPlugin for NamedPlugin {
        fn code(&self) -> &str {
            self.0
        }

        fn process(&self, _body: &str) -> Result<PluginAction, String> {
            Ok(PluginAction::Drop)
        }
    }

    #[test]
    fn overlapping_plugin_codes_are_rejected() {
        let mut config = ParsingConfig::new("x");
        config.register_plugin(Arc::new(NamedPlugin("@@"))).unwrap();
        assert!(config.register_plugin(Arc::new(NamedPlugin("@@"))).is_err());
        assert!(config.register_plugin(Arc::new(NamedPlugin("@@x"))).is_err());
        assert!(config.register_plugin(Arc::new(NamedPlugin("@"))).is_err());
        // Builtin sigils are protected too.
        assert!(config.register_plugin(Arc::new(NamedPlugin("="))).is_err());
        assert!(config.register_plugin(Arc::new(NamedPlugin("=x"))).is_err());
        config.register_plugin(Arc::new(NamedPlugin("!!"))).unwrap();
        assert_eq!(config.plugins().len(), 2);
    }
}
