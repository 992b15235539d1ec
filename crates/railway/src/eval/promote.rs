//! Promote: the mono → non-mono transition
//!
//! Forwards, `promote .x => x` moves the mono binding to a non-mono
//! binding of the same value. Backwards it demotes: the non-mono binding
//! is destroyed and nothing replaces it, since the value is re-derivable
//! the next time the code runs forwards.

use crate::ast::PromoteStmt;
use crate::context::EvalContext;
use crate::error::EvalError;
use crate::scope::{Binding, Scope};

pub(crate) fn exec(
    p: &PromoteStmt,
    scope: &mut Scope,
    _ctx: &EvalContext,
    backwards: bool,
) -> Result<(), EvalError> {
    if backwards {
        let binding = scope.binding(&p.dst)?;
        if binding.is_borrowed {
            return Err(EvalError::Ownership {
                message: format!("demoting a borrowed reference to `{}`", p.dst),
            });
        }
        scope.unbind(&p.dst)?;
        Ok(())
    } else {
        let binding = scope.binding(&p.src)?;
        if binding.is_borrowed {
            return Err(EvalError::Ownership {
                message: format!("promoting borrowed reference `{}`", p.src),
            });
        }
        let moved = scope.unbind(&p.src)?;
        scope.bind(&p.dst, Binding::owned(moved.cell, false))
    }
}
