//! Try/catch blocks: search over candidate values
//!
//! Forwards, candidates are tried in order; a truthy `catch` rewinds the
//! partially-executed body to the try entry (here by scope snapshot,
//! observationally the same as running the partial body backwards) and
//! the next candidate is tried. A pass leaves the iterator variable
//! bound, which is what tells the reversed execution which branch ran.

use crate::ast::{Expr, TryStmt};
use crate::cell::Cell;
use crate::context::EvalContext;
use crate::error::EvalError;
use crate::eval::exec_stmts;
use crate::eval::expr::eval_expr;
use crate::eval::loops::ForIter;
use crate::scope::{Binding, Scope};
use crate::value::Value;

pub(crate) fn exec(
    t: &TryStmt,
    scope: &mut Scope,
    ctx: &EvalContext,
    backwards: bool,
) -> Result<(), EvalError> {
    if backwards {
        exec_backwards(t, scope, ctx)
    } else {
        run_search(t, scope, ctx).map(|_| ())
    }
}

/// A `catch` statement: raise the rewind signal when its condition is
/// truthy. The signal is intercepted by the enclosing try.
pub(crate) fn exec_catch(
    cond: &Expr,
    scope: &mut Scope,
    ctx: &EvalContext,
) -> Result<(), EvalError> {
    if eval_expr(cond, scope, ctx)?.is_truthy() {
        Err(EvalError::CatchSignal)
    } else {
        Ok(())
    }
}

/// Iterate candidates until the body completes without a truthy catch.
/// On success the iterator variable stays bound to the passing value,
/// the body's effects stay applied, and the passing value is returned.
fn run_search(t: &TryStmt, scope: &mut Scope, ctx: &EvalContext) -> Result<Value, EvalError> {
    let iter = ForIter::from_expr(&t.iterator, scope, ctx)?;
    let snapshot = scope.snapshot();
    for i in 0..iter.len() {
        let candidate = iter.get(i, scope, ctx)?;
        scope.bind(
            &t.name,
            Binding::owned(Cell::shared(candidate.clone()), false),
        )?;
        match exec_stmts(&t.body, scope, ctx, false) {
            Ok(()) => return Ok(candidate),
            Err(EvalError::CatchSignal) => {
                scope.restore(&snapshot);
            }
            Err(err) => return Err(err),
        }
    }
    Err(EvalError::ExhaustedTry)
}

/// Reversal: undo the body once with the bound value, then defend
/// invertibility by replaying the whole search from scratch (output
/// suppressed) and checking that the candidate which passes is the value
/// that was bound. Finally the iterator variable is unbound.
fn exec_backwards(t: &TryStmt, scope: &mut Scope, ctx: &EvalContext) -> Result<(), EvalError> {
    exec_stmts(&t.body, scope, ctx, true)?;
    let binding = scope.unbind(&t.name)?;
    let bound = binding.cell.read().value();

    let quiet = ctx.with_quiet();
    let snapshot = scope.snapshot();
    let replayed = run_search(t, scope, &quiet)?;
    scope.restore(&snapshot);

    if replayed != bound {
        return Err(EvalError::Value {
            message: format!(
                "reversed try block: replay passes with {} but `{}` held {}",
                replayed, t.name, bound
            ),
        });
    }
    Ok(())
}
