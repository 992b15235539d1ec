//! Evaluation context threaded through the execution engine

use std::io::Write;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::ast::Function;
use crate::error::EvalError;
use crate::sync::LaneCtx;

/// Where `print` output goes. Shared so parallel lanes interleave whole
/// lines rather than bytes, and so tests can capture output.
pub type Output = Arc<Mutex<dyn Write + Send>>;

/// Configuration and shared state for evaluation.
///
/// This is passed through all statement and expression handlers. It is
/// cheap to clone; parallel lanes each carry a clone with their own
/// [`LaneCtx`] attached.
#[derive(Clone)]
pub struct EvalContext {
    functions: Arc<IndexMap<String, Arc<Function>>>,
    output: Output,
    lane: Option<LaneCtx>,
    quiet: bool,
}

impl EvalContext {
    /// Create a context over a function table, writing to `output`.
    pub fn new(functions: Arc<IndexMap<String, Arc<Function>>>, output: Output) -> Self {
        EvalContext {
            functions,
            output,
            lane: None,
            quiet: false,
        }
    }

    /// Look up a function by name.
    pub fn lookup_function(&self, name: &str) -> Result<Arc<Function>, EvalError> {
        self.functions
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::UndefinedFunction {
                name: name.to_string(),
            })
    }

    /// The lane this context executes in, if inside a parallel call.
    pub fn lane(&self) -> Option<&LaneCtx> {
        self.lane.as_ref()
    }

    /// A clone of this context bound to a parallel lane.
    pub fn with_lane(&self, lane: LaneCtx) -> Self {
        EvalContext {
            lane: Some(lane),
            ..self.clone()
        }
    }

    /// A clone of this context with `print` output suppressed. Used by
    /// the try block's verification replay, which re-runs statements
    /// whose output has already been written.
    pub fn with_quiet(&self) -> Self {
        EvalContext {
            quiet: true,
            ..self.clone()
        }
    }

    /// Whether a sibling lane has failed and execution should unwind.
    pub fn is_cancelled(&self) -> bool {
        self.lane.as_ref().is_some_and(LaneCtx::cancelled)
    }

    /// Write one line of program output.
    pub fn write_line(&self, text: &str) -> Result<(), EvalError> {
        if self.quiet {
            return Ok(());
        }
        let mut out = self.output.lock();
        writeln!(out, "{}", text)?;
        Ok(())
    }
}
