//! Document repository contract
//!
//! Repositories resolve document names to source text (and, when available, a
//! previously compiled Executable) and accept registrations of synthetic
//! documents produced by in-flow materialization. Writes follow first-write-
//! wins semantics so concurrent registration of the same name is safe.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::document::Executable;
use crate::error::{RepositoryError, RepositoryResult};

/// A document as stored by a repository.
#[derive(Clone)]
pub struct StoredDocument {
    /// Raw document text.
    pub text: String,
    /// Default language tag for the document (may be empty).
    pub tag: String,
    /// Compiled form, when the repository has one cached.
    pub executable: Option<Arc<Executable>>,
}

/// External collaborator that stores and resolves named documents.
pub trait DocumentRepository: Send + Sync {
    /// Resolve a document by name.
    fn get_document(&self, name: &str) -> RepositoryResult<StoredDocument>;

    /// Store a document under a name, first write wins.
    ///
    /// Returns `true` if this call created the entry, `false` if the name was
    /// already taken (the existing entry is left untouched).
    fn set_document(
        &self,
        name: &str,
        text: &str,
        tag: &str,
        executable: Arc<Executable>,
    ) -> RepositoryResult<bool>;
}

/// In-memory repository, suitable for tests and embedded use.
#[derive(Default)]
pub struct MemoryRepository {
    documents: RwLock<HashMap<String, StoredDocument>>,
}

impl MemoryRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document with raw text only (no compiled form).
    pub fn insert_text(&self, name: impl Into<String>, text: impl Into<String>, tag: impl Into<String>) {
        self.documents.write().entry(name.into()).or_insert(StoredDocument {
            text: text.into(),
            tag: tag.into(),
            executable: None,
        });
    }

    /// Names of all stored documents.
    pub fn names(&self) -> Vec<String> {
        self.documents.read().keys().cloned().collect()
    }
}

impl DocumentRepository for MemoryRepository {
    fn get_document(&self, name: &str) -> RepositoryResult<StoredDocument> {
        self.documents
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(name.to_string()))
    }

    fn set_document(
        &self,
        name: &str,
        text: &str,
        tag: &str,
        executable: Arc<Executable>,
    ) -> RepositoryResult<bool> {
        let mut documents = self.documents.write();
        if documents.contains_key(name) {
            return Ok(false);
        }
        documents.insert(
            name.to_string(),
            StoredDocument {
                text: text.to_string(),
                tag: tag.to_string(),
                executable: Some(executable),
            },
        );
        Ok(true)
    }
}
