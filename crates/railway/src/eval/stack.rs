//! Push and pop: ownership transfer between scope bindings and array
//! tails. Push run backwards is pop, and vice versa.

use crate::ast::{Lookup, MoveStmt};
use crate::cell::Cell;
use crate::context::EvalContext;
use crate::error::EvalError;
use crate::eval::expr::eval_indices;
use crate::scope::{Binding, Scope};

pub(crate) fn exec_push(
    m: &MoveStmt,
    scope: &mut Scope,
    ctx: &EvalContext,
    backwards: bool,
) -> Result<(), EvalError> {
    if backwards {
        pop_eval(&m.dst, &m.src, scope, ctx)
    } else {
        push_eval(&m.src, &m.dst, scope, ctx)
    }
}

pub(crate) fn exec_pop(
    m: &MoveStmt,
    scope: &mut Scope,
    ctx: &EvalContext,
    backwards: bool,
) -> Result<(), EvalError> {
    if backwards {
        push_eval(&m.dst, &m.src, scope, ctx)
    } else {
        pop_eval(&m.src, &m.dst, scope, ctx)
    }
}

/// `push src => dst`: the cell bound to `src` leaves the scope and its
/// value is appended to the array at `dst`.
fn push_eval(
    src: &Lookup,
    dst: &Lookup,
    scope: &mut Scope,
    ctx: &EvalContext,
) -> Result<(), EvalError> {
    {
        let src_binding = scope.binding(&src.name)?;
        if src_binding.is_borrowed {
            return Err(EvalError::Ownership {
                message: format!("pushing borrowed reference `{}`", src.name),
            });
        }
    }
    let dst_indices = eval_indices(dst, scope, ctx)?;
    let dst_cell = scope.binding(&dst.name)?.cell.clone();
    let value = scope.binding(&src.name)?.cell.read().value();
    dst_cell.write().push(&dst_indices, value, &dst.name)?;
    scope.unbind(&src.name)?;
    Ok(())
}

/// `pop src => dst`: the last element of the array at `src` becomes a
/// fresh binding named `dst`.
fn pop_eval(
    src: &Lookup,
    dst: &Lookup,
    scope: &mut Scope,
    ctx: &EvalContext,
) -> Result<(), EvalError> {
    if scope.contains(&dst.name) {
        return Err(EvalError::AlreadyExists {
            name: dst.name.clone(),
        });
    }
    let src_indices = eval_indices(src, scope, ctx)?;
    let src_cell = scope.binding(&src.name)?.cell.clone();
    let value = src_cell.write().pop(&src_indices, &src.name)?;
    scope.bind(
        &dst.name,
        Binding::owned(Cell::shared(value), dst.is_mono_name()),
    )
}
