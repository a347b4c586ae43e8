//! Program lifecycle: the compute-once preparation cell
//!
//! Each program segment owns exactly one [`PreparedProgram`]. Preparation is
//! memoized in an explicit cell owned here (not in any static map): concurrent
//! callers racing to prepare the same program observe the work of exactly one
//! winner, with losers blocking on the in-flight computation.

use once_cell::sync::OnceCell;
use std::fmt;

use super::adapter::{Program, ProgramScope};
use crate::engine::context::ExecutionContext;
use crate::error::{ExecResult, PrepareError, PrepareResult};

/// A backend program together with its memoized preparation state.
pub struct PreparedProgram {
    program: Box<dyn Program>,
    scope: ProgramScope,
    prepared: OnceCell<()>,
}

impl PreparedProgram {
    pub(crate) fn new(program: Box<dyn Program>, scope: ProgramScope) -> Self {
        Self {
            program,
            scope,
            prepared: OnceCell::new(),
        }
    }

    /// Final source code of the underlying program.
    pub fn source_code(&self) -> &str {
        self.program.source_code()
    }

    /// Identity of the segment this program belongs to.
    pub fn scope(&self) -> &ProgramScope {
        &self.scope
    }

    /// Whether preparation has already succeeded.
    pub fn is_prepared(&self) -> bool {
        self.prepared.get().is_some()
    }

    /// Prepare the program, memoizing success.
    ///
    /// A failure is reported but not cached, so a later caller may retry;
    /// racers always serialize through the cell, so a success has exactly one
    /// underlying side effect.
    pub fn prepare(&self) -> PrepareResult<()> {
        self.prepared
            .get_or_try_init(|| {
                self.program.prepare().map_err(|source| PrepareError {
                    document: self.scope.document.clone(),
                    language: self.scope.language.clone(),
                    position: self.scope.position,
                    source,
                })
            })
            .map(|_| ())
    }

    /// Execute the program, preparing it first if that has not happened yet.
    pub fn execute(&self, context: &ExecutionContext) -> ExecResult<()> {
        self.prepare()?;
        self.program.execute(context)
    }
}

impl fmt::Debug for PreparedProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedProgram")
            .field("language", &self.scope.language)
            .field("position", &self.scope.position)
            .field("prepared", &self.is_prepared())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProgram {
        prepares: Arc<AtomicUsize>,
        fail_first: AtomicUsize,
    }

    impl Program for CountingProgram {
        fn source_code(&self) -> &str {
            ""
        }

        fn prepare(&self) -> Result<(), crate::error::BackendError> {
            if self.fail_first.load(Ordering::SeqCst) > 0 {
                self.fail_first.fetch_sub(1, Ordering::SeqCst);
                return Err("transient".into());
            }
            self.prepares.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn execute(&self, _context: &ExecutionContext) -> ExecResult<()> {
            Ok(())
        }
    }

    fn scope() -> ProgramScope {
        ProgramScope {
            document: "test".into(),
            partition: None,
            language: "x".into(),
            position: 0,
            line: 1,
            column: 1,
        }
    }

    #[test]
    fn successful_preparation_is_cached() {
        let prepares = Arc::new(AtomicUsize::new(0));
        let prepared = PreparedProgram::new(
            Box::new(CountingProgram {
                prepares: prepares.clone(),
                fail_first: AtomicUsize::new(0),
            }),
            scope(),
        );
        prepared.prepare().unwrap();
        prepared.prepare().unwrap();
        assert_eq!(prepares.load(Ordering::SeqCst), 1);
        assert!(prepared.is_prepared());
    }

    #[test]
    fn failed_preparation_may_retry() {
        let prepares = Arc::new(AtomicUsize::new(0));
        let prepared = PreparedProgram::new(
            Box::new(CountingProgram {
                prepares: prepares.clone(),
                fail_first: AtomicUsize::new(1),
            }),
            scope(),
        );
        assert!(prepared.prepare().is_err());
        assert!(!prepared.is_prepared());
        prepared.prepare().unwrap();
        assert_eq!(prepares.load(Ordering::SeqCst), 1);
    }
}
