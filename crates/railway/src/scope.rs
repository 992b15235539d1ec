//! Scopes: name → cell binding maps with ownership and leak tracking

use std::sync::Arc;

use indexmap::IndexMap;

use crate::cell::{Cell, CellRef};
use crate::error::EvalError;

/// One entry in a scope: a cell handle plus the ownership facts the
/// engine needs to enforce the language's information discipline.
#[derive(Clone)]
pub struct Binding {
    /// The cell this name resolves to
    pub cell: CellRef,
    /// Borrowed bindings share the caller's cell and may not be
    /// destroyed, stolen, pushed or promoted
    pub is_borrowed: bool,
    /// Mono bindings exist only during forward execution
    pub is_mono: bool,
}

impl Binding {
    /// An owned binding.
    pub fn owned(cell: CellRef, is_mono: bool) -> Self {
        Binding {
            cell,
            is_borrowed: false,
            is_mono,
        }
    }

    /// A borrowed binding sharing someone else's cell.
    pub fn borrowed(cell: CellRef, is_mono: bool) -> Self {
        Binding {
            cell,
            is_borrowed: true,
            is_mono,
        }
    }
}

/// Deep copy of a scope's bindings, used by try blocks to rewind a
/// partially-executed body.
pub struct ScopeSnapshot {
    entries: Vec<(String, bool, bool, Cell)>,
}

/// A mapping from identifier to variable cell.
///
/// A scope is flat: nested blocks do not create new scopes, and names
/// introduced in an inner block live until explicitly destroyed. No two
/// bindings may share a name at the same time. Globals are a read-only
/// fallback for resolution; a local binding shadows the global under
/// that name for as long as it lives.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use indexmap::IndexMap;
/// use railway::cell::Cell;
/// use railway::scope::{Binding, Scope};
/// use railway::Value;
///
/// let mut scope = Scope::new("demo", Arc::new(IndexMap::new()));
/// let cell = Cell::shared(Value::integer(6));
/// scope.bind("x", Binding::owned(cell, false)).unwrap();
///
/// assert!(scope.resolve("x").is_ok());
/// assert!(scope.resolve("y").is_err());
///
/// scope.unbind("x").unwrap();
/// assert!(scope.is_empty());
/// ```
pub struct Scope {
    name: String,
    bindings: IndexMap<String, Binding>,
    globals: Arc<IndexMap<String, CellRef>>,
}

impl Scope {
    /// Create an empty scope. `name` labels diagnostics (usually the
    /// enclosing function's name).
    pub fn new(name: impl Into<String>, globals: Arc<IndexMap<String, CellRef>>) -> Self {
        Scope {
            name: name.into(),
            bindings: IndexMap::new(),
            globals,
        }
    }

    /// A child scope for a callee, sharing the global table.
    pub fn child(&self, name: impl Into<String>) -> Scope {
        Scope::new(name, Arc::clone(&self.globals))
    }

    /// The label this scope reports in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle to the shared global table.
    pub fn globals(&self) -> Arc<IndexMap<String, CellRef>> {
        Arc::clone(&self.globals)
    }

    /// Whether no local bindings are live.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Whether `name` is locally bound.
    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Create a binding. Fails if the name is already bound.
    pub fn bind(&mut self, name: impl Into<String>, binding: Binding) -> Result<(), EvalError> {
        let name = name.into();
        if self.bindings.contains_key(&name) {
            return Err(EvalError::AlreadyExists { name });
        }
        self.bindings.insert(name, binding);
        Ok(())
    }

    /// Resolve a name to its cell: the local binding if one lives, else
    /// the global cell, else an exists-error.
    pub fn resolve(&self, name: &str) -> Result<CellRef, EvalError> {
        if let Some(binding) = self.bindings.get(name) {
            return Ok(Arc::clone(&binding.cell));
        }
        if let Some(cell) = self.globals.get(name) {
            return Ok(Arc::clone(cell));
        }
        Err(EvalError::Undefined {
            name: name.to_string(),
        })
    }

    /// The local binding for a name. Globals are deliberately not
    /// consulted: every mutating statement goes through here, which is
    /// what keeps the global table read-only.
    pub fn binding(&self, name: &str) -> Result<&Binding, EvalError> {
        self.bindings.get(name).ok_or_else(|| EvalError::Undefined {
            name: name.to_string(),
        })
    }

    /// Remove a binding, returning it. Fails if not locally bound.
    pub fn unbind(&mut self, name: &str) -> Result<Binding, EvalError> {
        self.bindings
            .shift_remove(name)
            .ok_or_else(|| EvalError::Undefined {
                name: name.to_string(),
            })
    }

    /// The currently live local names, in binding order.
    pub fn snapshot_names(&self) -> Vec<String> {
        self.bindings.keys().cloned().collect()
    }

    /// The first live mono binding, if any. Used by the direction-change
    /// check in do/yield/undo blocks.
    pub fn first_mono_name(&self) -> Option<&str> {
        self.bindings
            .iter()
            .find(|(_, b)| b.is_mono)
            .map(|(name, _)| name.as_str())
    }

    /// Verify that every live non-mono binding is named in `allowed`;
    /// the first one that is not raises an information-leak error. Mono
    /// bindings carry no reversibility obligation and are exempt.
    pub fn leak_check(&self, allowed: impl Fn(&str) -> bool, func: &str) -> Result<(), EvalError> {
        for (name, binding) in &self.bindings {
            if binding.is_mono {
                continue;
            }
            if !allowed(name) {
                return Err(EvalError::InformationLeak {
                    name: name.clone(),
                    func: func.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Deep-copy the live bindings so a try block can rewind to this
    /// point after a caught failure.
    pub fn snapshot(&self) -> ScopeSnapshot {
        ScopeSnapshot {
            entries: self
                .bindings
                .iter()
                .map(|(name, b)| {
                    (
                        name.clone(),
                        b.is_mono,
                        b.is_borrowed,
                        b.cell.read().clone(),
                    )
                })
                .collect(),
        }
    }

    /// Restore a snapshot taken earlier on this scope. Bindings that
    /// survived keep their cell identity (so sharing with a caller is
    /// preserved) and have their contents written back; bindings created
    /// since are dropped; bindings destroyed since are recreated.
    pub fn restore(&mut self, snapshot: &ScopeSnapshot) {
        let mut restored = IndexMap::new();
        for (name, is_mono, is_borrowed, cell) in &snapshot.entries {
            let binding = match self.bindings.shift_remove(name) {
                Some(existing) => {
                    *existing.cell.write() = cell.clone();
                    existing
                }
                None => Binding {
                    cell: Arc::new(parking_lot::RwLock::new(cell.clone())),
                    is_borrowed: *is_borrowed,
                    is_mono: *is_mono,
                },
            };
            restored.insert(name.clone(), binding);
        }
        self.bindings = restored;
    }
}
