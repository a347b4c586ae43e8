//! Language adapter catalog and registry
//!
//! Provides a process-wide catalog for registering language adapters prior to
//! document compilation. Each compile takes an immutable snapshot of the
//! catalog so a document's adapter set cannot change under it. Insertion is
//! first-wins per tag and per extension; a second adapter claiming a taken tag
//! is rejected rather than silently replacing the first.

use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

use super::adapter::{AdapterRef, LanguageAdapter};

/// An adapter together with its process-wide execution lock.
///
/// The lock is created once at registration so every registry snapshot shares
/// it; it serializes `execute` calls for adapters that are not thread-safe.
#[derive(Clone)]
pub(crate) struct RegisteredAdapter {
    pub(crate) adapter: AdapterRef,
    pub(crate) lock: Arc<Mutex<()>>,
}

/// Catalog of language adapter registrations.
pub struct AdapterCatalog {
    tags: RwLock<HashMap<String, RegisteredAdapter>>,
    extensions: RwLock<HashMap<String, String>>,
}

static CATALOG: Lazy<AdapterCatalog> = Lazy::new(AdapterCatalog::new);

impl AdapterCatalog {
    /// Create an empty catalog (tests typically use private catalogs).
    pub fn new() -> Self {
        Self {
            tags: RwLock::new(HashMap::new()),
            extensions: RwLock::new(HashMap::new()),
        }
    }

    /// Access the process-wide catalog singleton.
    pub fn global() -> &'static Self {
        &CATALOG
    }

    /// Register an adapter under its primary tag and extensions.
    ///
    /// Returns `false` if the tag was already claimed; the existing adapter
    /// stays in place. Extension claims are likewise first-wins.
    pub fn register(&self, adapter: impl LanguageAdapter + 'static) -> bool {
        self.register_arc(Arc::new(adapter))
    }

    /// Register an already-shared adapter handle.
    pub fn register_arc(&self, adapter: AdapterRef) -> bool {
        let tag = adapter.tag().to_string();
        let mut tags = self.tags.write();
        if tags.contains_key(&tag) {
            tracing::warn!(tag = %tag, "adapter tag already registered; keeping first");
            return false;
        }

        let mut extensions = self.extensions.write();
        for extension in adapter.extensions() {
            extensions
                .entry((*extension).to_string())
                .or_insert_with(|| tag.clone());
        }

        tags.insert(
            tag,
            RegisteredAdapter {
                adapter,
                lock: Arc::new(Mutex::new(())),
            },
        );
        true
    }

    /// Produce an immutable snapshot for one compilation/execution lifetime.
    pub fn snapshot(&self) -> AdapterRegistry {
        let tags = self.tags.read();
        let extensions = self.extensions.read();
        AdapterRegistry {
            tags: Arc::new(tags.clone()),
            extensions: Arc::new(extensions.clone()),
        }
    }
}

impl Default for AdapterCatalog {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable snapshot of the adapter catalog.
#[derive(Clone)]
pub struct AdapterRegistry {
    tags: Arc<HashMap<String, RegisteredAdapter>>,
    extensions: Arc<HashMap<String, String>>,
}

impl AdapterRegistry {
    /// A registry with no adapters, for documents known to be pure literal.
    pub fn empty() -> Self {
        Self {
            tags: Arc::new(HashMap::new()),
            extensions: Arc::new(HashMap::new()),
        }
    }

    /// Look up an adapter by language tag.
    pub fn get(&self, tag: &str) -> Option<AdapterRef> {
        self.tags.get(tag).map(|entry| entry.adapter.clone())
    }

    /// Look up an adapter by file extension.
    ///
    /// Used by repository integrations to pick a default tag for a whole
    /// document when none is embedded.
    pub fn by_extension(&self, extension: &str) -> Option<AdapterRef> {
        self.extensions
            .get(extension)
            .and_then(|tag| self.get(tag))
    }

    /// Whether a tag resolves to a registered adapter.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains_key(tag)
    }

    /// All registered language tags.
    pub fn list_tags(&self) -> Vec<String> {
        self.tags.keys().cloned().collect()
    }

    pub(crate) fn entry(&self, tag: &str) -> Option<&RegisteredAdapter> {
        self.tags.get(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Executable;
    use crate::engine::adapter::{EntryValue, Program, ProgramScope};
    use crate::engine::context::ExecutionContext;
    use crate::error::{BackendError, EnterError, EnterResult};

    struct StubAdapter {
        tag: &'static str,
        exts: Vec<&'static str>,
    }

    impl LanguageAdapter for StubAdapter {
        fn tag(&self) -> &str {
            self.tag
        }

        fn extensions(&self) -> &[&str] {
            &self.exts
        }

        fn is_thread_safe(&self) -> bool {
            true
        }

        fn literal_output_code(&self, text: &str) -> String {
            text.to_string()
        }

        fn expression_output_code(&self, expression: &str) -> String {
            expression.to_string()
        }

        fn expression_include_code(&self, expression: &str) -> String {
            expression.to_string()
        }

        fn create_program(
            &self,
            _code: &str,
            _scope: &ProgramScope,
        ) -> Result<Box<dyn Program>, BackendError> {
            Err("stub".into())
        }

        fn enter(
            &self,
            entry_point: &str,
            _executable: &Executable,
            _context: &ExecutionContext,
            _args: &[EntryValue],
        ) -> EnterResult<EntryValue> {
            Err(EnterError::NoSuchEntryPoint {
                name: entry_point.to_string(),
                language: self.tag.to_string(),
            })
        }
    }

    #[test]
    fn first_registration_wins() {
        let catalog = AdapterCatalog::new();
        assert!(catalog.register(StubAdapter {
            tag: "x",
            exts: vec!["xs"],
        }));
        assert!(!catalog.register(StubAdapter {
            tag: "x",
            exts: vec!["alt"],
        }));

        let registry = catalog.snapshot();
        assert!(registry.has_tag("x"));
        assert_eq!(registry.by_extension("xs").map(|a| a.tag().to_string()), Some("x".into()));
        // The loser's extensions were not claimed either.
        assert!(registry.by_extension("alt").is_none());
    }

    #[test]
    fn snapshot_is_isolated_from_later_registrations() {
        let catalog = AdapterCatalog::new();
        let registry = catalog.snapshot();
        catalog.register(StubAdapter {
            tag: "late",
            exts: vec![],
        });
        assert!(!registry.has_tag("late"));
        assert!(catalog.snapshot().has_tag("late"));
    }
}
