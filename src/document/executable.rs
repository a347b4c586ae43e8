//! Compiled documents
//!
//! An [`Executable`] is the immutable compiled form of one input document: an
//! ordered segment list plus metadata. It is produced by the parse →
//! materialize → collapse → program-creation pipeline and drives execution,
//! enterable registration, entry invocation and release.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::document::collapse::collapse;
use crate::document::config::ParsingConfig;
use crate::document::parser::parse_document;
use crate::document::segment::{Draft, DraftKind, Segment, SegmentKind, SourcePos};
use crate::engine::adapter::{EntryValue, ProgramScope};
use crate::engine::context::{ExecutionContext, Service};
use crate::engine::program::PreparedProgram;
use crate::engine::registry::AdapterRegistry;
use crate::error::{
    EngineError, EnterError, EnterResult, ErrorFrame, ExecError, ExecResult, ParseError,
    PrepareError, RepositoryError, Result,
};

/// The immutable compiled form of one document.
pub struct Executable {
    name: String,
    partition: Option<String>,
    timestamp: i64,
    segments: Vec<Segment>,
    start_delimiter: Option<String>,
    end_delimiter: Option<String>,
    attributes: RwLock<HashMap<String, EntryValue>>,
    last_executed_at: AtomicI64,
    enterable: Mutex<HashMap<String, Arc<ExecutionContext>>>,
    registry: AdapterRegistry,
    config: ParsingConfig,
}

impl std::fmt::Debug for Executable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executable")
            .field("name", &self.name)
            .field("partition", &self.partition)
            .field("timestamp", &self.timestamp)
            .field("segments", &self.segments)
            .field("start_delimiter", &self.start_delimiter)
            .field("end_delimiter", &self.end_delimiter)
            .finish_non_exhaustive()
    }
}

impl Executable {
    /// Compile a document from raw text.
    pub fn compile(
        name: impl Into<String>,
        source: &str,
        config: &ParsingConfig,
        registry: &AdapterRegistry,
    ) -> Result<Arc<Self>> {
        Self::compile_in_partition(name, None, source, config, registry)
    }

    /// Compile a document that belongs to a named partition.
    pub fn compile_in_partition(
        name: impl Into<String>,
        partition: Option<&str>,
        source: &str,
        config: &ParsingConfig,
        registry: &AdapterRegistry,
    ) -> Result<Arc<Self>> {
        let name = name.into();
        let parsed = parse_document(&name, source, config, registry)?;
        let delimiters = parsed.delimiters;
        let drafts = materialize_inflow(&name, parsed.drafts, delimiters.as_ref(), config, registry)?;
        let drafts = collapse(&name, drafts, registry)?;

        let mut segments = Vec::with_capacity(drafts.len());
        let mut position = 0usize;
        for draft in drafts {
            match draft.kind {
                DraftKind::Literal => segments.push(Segment::literal(draft.source, draft.pos)),
                DraftKind::Code { language } => {
                    let adapter =
                        registry
                            .get(&language)
                            .ok_or_else(|| ParseError::UnknownLanguage {
                                tag: language.clone(),
                                document: name.clone(),
                                line: draft.pos.line,
                                column: draft.pos.column,
                            })?;
                    let scope = ProgramScope {
                        document: name.clone(),
                        partition: partition.map(str::to_string),
                        language: language.clone(),
                        position,
                        line: draft.pos.line,
                        column: draft.pos.column,
                    };
                    let program = adapter
                        .create_program(&draft.source, &scope)
                        .map_err(|source| PrepareError {
                            document: name.clone(),
                            language: language.clone(),
                            position,
                            source,
                        })?;
                    let prepared = PreparedProgram::new(program, scope);
                    if config.prepare_eagerly {
                        prepared.prepare()?;
                    }
                    segments.push(Segment::program_segment(
                        draft.source,
                        draft.pos,
                        language,
                        position,
                        prepared,
                    ));
                    position += 1;
                }
                DraftKind::InFlow { .. } => {
                    unreachable!("in-flow drafts are materialized before collapsing")
                }
            }
        }

        tracing::debug!(
            document = %name,
            segments = segments.len(),
            programs = position,
            "compiled document"
        );

        Ok(Arc::new(Self {
            name,
            partition: partition.map(str::to_string),
            timestamp: Utc::now().timestamp_millis(),
            segments,
            start_delimiter: delimiters.as_ref().map(|d| d.start.clone()),
            end_delimiter: delimiters.map(|d| d.end),
            attributes: RwLock::new(HashMap::new()),
            last_executed_at: AtomicI64::new(0),
            enterable: Mutex::new(HashMap::new()),
            registry: registry.clone(),
            config: config.clone(),
        }))
    }

    /// Document name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Partition the document belongs to, if any.
    pub fn partition(&self) -> Option<&str> {
        self.partition.as_deref()
    }

    /// Construction timestamp (epoch milliseconds).
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Ordered segment list.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Start delimiter committed to, if any span was found.
    pub fn start_delimiter(&self) -> Option<&str> {
        self.start_delimiter.as_deref()
    }

    /// End delimiter committed to, if any span was found.
    pub fn end_delimiter(&self) -> Option<&str> {
        self.end_delimiter.as_deref()
    }

    /// Whether the document contains no program segments.
    ///
    /// Callers may special-case such documents and skip adapter machinery
    /// entirely; `execute` takes the same shortcut internally.
    pub fn is_pure_literal(&self) -> bool {
        self.segments.iter().all(|segment| !segment.is_program())
    }

    /// Epoch milliseconds of the most recent successful execution.
    pub fn last_executed_at(&self) -> Option<i64> {
        match self.last_executed_at.load(Ordering::Acquire) {
            0 => None,
            at => Some(at),
        }
    }

    /// Read a named attribute.
    pub fn attribute(&self, name: &str) -> Option<EntryValue> {
        self.attributes.read().get(name).cloned()
    }

    /// Set a named attribute, returning the previous value.
    pub fn set_attribute(&self, name: impl Into<String>, value: EntryValue) -> Option<EntryValue> {
        self.attributes.write().insert(name.into(), value)
    }

    fn frame(&self, pos: SourcePos) -> ErrorFrame {
        ErrorFrame::new(&self.name, pos.line, pos.column)
    }

    /// Execute the document against a context.
    ///
    /// Literal segments are written verbatim to the context's output sink;
    /// program segments execute through their adapter, serialized by the
    /// adapter's process-wide lock when the adapter is not thread-safe. The
    /// first error aborts the remaining segments.
    pub fn execute(self: &Arc<Self>, context: &ExecutionContext) -> ExecResult<()> {
        for segment in &self.segments {
            match segment.kind() {
                SegmentKind::Literal => {
                    context
                        .write_output(segment.source())
                        .map_err(|err| ExecError::from(err).with_frame(self.frame(segment.pos())))?;
                }
                SegmentKind::Program {
                    language, program, ..
                } => {
                    let entry = self.registry.entry(language).ok_or_else(|| {
                        ExecError::MissingAdapter {
                            tag: language.clone(),
                            frames: Default::default(),
                        }
                        .with_frame(self.frame(segment.pos()))
                    })?;
                    let adapter = entry.adapter.clone();
                    let frozen = context.is_immutable();
                    if !frozen {
                        context.note_adapter(adapter.clone());
                    }

                    // Serialize all execution through a non-thread-safe
                    // adapter, process-wide, for the duration of the call.
                    let lock = entry.lock.clone();
                    let _guard = (!adapter.is_thread_safe()).then(|| lock.lock());

                    let result = if frozen {
                        // Frozen contexts are reused as-is; no per-call
                        // service mutation happens.
                        program.execute(context)
                    } else {
                        let service: Service = Arc::new(DocumentService {
                            executable: Arc::clone(self),
                        });
                        let displaced =
                            context.swap_service(&self.config.self_service_name, service);
                        let result = program.execute(context);
                        context.restore_service(&self.config.self_service_name, displaced);
                        result
                    };
                    result.map_err(|err| err.with_frame(self.frame(segment.pos())))?;
                }
            }
        }
        self.last_executed_at
            .store(Utc::now().timestamp_millis(), Ordering::Release);
        Ok(())
    }

    /// Execute once, then register the context for repeated entry calls.
    ///
    /// On success the context is frozen (immutable and enterable). If another
    /// context is already registered under `key`, returns `Ok(false)` and the
    /// caller's context is not consumed: it stays mutable and unregistered.
    pub fn make_enterable(
        self: &Arc<Self>,
        key: impl Into<String>,
        context: Arc<ExecutionContext>,
    ) -> ExecResult<bool> {
        let key = key.into();
        self.execute(&context)?;

        let mut enterable = self.enterable.lock();
        match enterable.entry(key) {
            Entry::Occupied(occupied) => {
                tracing::debug!(document = %self.name, key = %occupied.key(), "enterable key already taken");
                Ok(false)
            }
            Entry::Vacant(vacant) => {
                context.freeze();
                tracing::info!(document = %self.name, key = %vacant.key(), "context registered as enterable");
                vacant.insert(context);
                Ok(true)
            }
        }
    }

    /// Invoke a named entry point on the context registered under `key`.
    ///
    /// The entry point is resolved by the last adapter that executed in that
    /// context. No adapter lock is taken here: enterable mode trades that
    /// safety for low per-call overhead, so entry into a non-thread-safe
    /// adapter must be serialized by the caller.
    pub fn enter(
        &self,
        key: &str,
        entry_point: &str,
        args: &[EntryValue],
    ) -> EnterResult<EntryValue> {
        let context = self
            .enterable
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| EnterError::NoContext(key.to_string()))?;
        let adapter = context.last_adapter().ok_or(EnterError::NoActiveAdapter)?;
        adapter.enter(entry_point, self, &context, args)
    }

    /// Release every enterable context, invoking each touched adapter's
    /// release hook once per context. Idempotent: a second call is a no-op.
    pub fn release(&self) {
        let contexts: Vec<(String, Arc<ExecutionContext>)> =
            self.enterable.lock().drain().collect();
        for (key, context) in contexts {
            for adapter in context.adapters_touched() {
                adapter.release_context(&context);
            }
            tracing::debug!(document = %self.name, key = %key, "released enterable context");
        }
    }
}

/// Per-call service installed while a program executes, exposing the owning
/// document back to scriptlets.
pub struct DocumentService {
    executable: Arc<Executable>,
}

impl DocumentService {
    /// The document currently executing.
    pub fn executable(&self) -> &Arc<Executable> {
        &self.executable
    }

    /// Include a named document's output into the running context.
    ///
    /// Resolves `name` through the configured repository, reusing a cached
    /// compiled form when the repository has one, compiling (and caching back)
    /// otherwise. The stored document's tag, when present, becomes the default
    /// language for that compilation.
    pub fn include(&self, name: &str, context: &ExecutionContext) -> Result<()> {
        let repository = self
            .executable
            .config
            .repository
            .as_ref()
            .ok_or_else(|| RepositoryError::Storage("no document repository configured".into()))?;

        let stored = repository.get_document(name)?;
        let nested = match stored.executable {
            Some(nested) => nested,
            None => {
                let mut config = self.executable.config.clone();
                if !stored.tag.is_empty() {
                    config.default_language = stored.tag.clone();
                }
                let nested =
                    Executable::compile(name, &stored.text, &config, &self.executable.registry)?;
                let _ = repository.set_document(name, &stored.text, &stored.tag, Arc::clone(&nested));
                nested
            }
        };
        nested.execute(context).map_err(EngineError::from)
    }
}

/// Replace in-flow drafts with include calls, registering the synthesized
/// nested documents with the configured repository.
fn materialize_inflow(
    name: &str,
    drafts: Vec<Draft>,
    delimiters: Option<&crate::document::config::DelimiterPair>,
    config: &ParsingConfig,
    registry: &AdapterRegistry,
) -> Result<Vec<Draft>> {
    if !drafts
        .iter()
        .any(|draft| matches!(draft.kind, DraftKind::InFlow { .. }))
    {
        return Ok(drafts);
    }

    // An in-flow draft implies at least one span, hence a committed style.
    let style = delimiters.expect("in-flow span without delimiter style");

    let mut out = Vec::with_capacity(drafts.len());
    for draft in drafts {
        let Draft { source, pos, kind } = draft;
        match kind {
            DraftKind::InFlow {
                language,
                enclosing,
            } => {
                let repository = config.repository.as_ref().ok_or_else(|| {
                    ParseError::MissingRepository {
                        document: name.to_string(),
                        line: pos.line,
                        column: pos.column,
                    }
                })?;

                // Build the span text back into a one-segment document.
                let synthetic_name =
                    format!("{}#inflow-{}", name, config.sequence.next());
                let text = format!(
                    "{}{} {}{}",
                    style.start, language, source, style.end
                );
                let nested = Executable::compile(&synthetic_name, &text, config, registry)?;
                repository.set_document(&synthetic_name, &text, &language, nested)?;
                tracing::debug!(
                    document = name,
                    synthetic = %synthetic_name,
                    language = %language,
                    "materialized in-flow span"
                );

                // The outer document includes the synthetic one through the
                // ordinary include code path of the enclosing language.
                let adapter =
                    registry
                        .get(&enclosing)
                        .ok_or_else(|| ParseError::UnknownLanguage {
                            tag: enclosing.clone(),
                            document: name.to_string(),
                            line: pos.line,
                            column: pos.column,
                        })?;
                let name_literal = EntryValue::String(synthetic_name).to_string();
                let code = adapter.expression_include_code(&name_literal);
                out.push(Draft::code(code, pos, enclosing));
            }
            kind => out.push(Draft { source, pos, kind }),
        }
    }
    Ok(out)
}
