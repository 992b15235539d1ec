//! Do/yield/undo blocks
//!
//! The do-block runs forwards, the yield-block runs in the ambient
//! direction, then the do-block runs backwards. The construct is its own
//! inverse and leaves no residue from the do-block in the surrounding
//! scope. Mono state may not be live at either direction flip.

use crate::ast::DoYieldUndo;
use crate::context::EvalContext;
use crate::error::EvalError;
use crate::eval::exec_stmts;
use crate::scope::Scope;

pub(crate) fn exec(
    d: &DoYieldUndo,
    scope: &mut Scope,
    ctx: &EvalContext,
    backwards: bool,
) -> Result<(), EvalError> {
    exec_stmts(&d.do_body, scope, ctx, false)?;
    if backwards {
        if let Some(name) = scope.first_mono_name() {
            return Err(EvalError::DirectionChange {
                name: name.to_string(),
            });
        }
    }
    exec_stmts(&d.yield_body, scope, ctx, backwards)?;
    if !backwards {
        if let Some(name) = scope.first_mono_name() {
            return Err(EvalError::DirectionChange {
                name: name.to_string(),
            });
        }
    }
    exec_stmts(&d.do_body, scope, ctx, true)
}
