//! Assignment statements: `let` and `unlet`
//!
//! Unassignment is assignment with the direction flipped, so both
//! dispatchers funnel into the same pair of primitives.

use crate::ast::Assignment;
use crate::cell::Cell;
use crate::context::EvalContext;
use crate::error::EvalError;
use crate::eval::expr::eval_expr;
use crate::scope::{Binding, Scope};

pub(crate) fn exec_let(
    a: &Assignment,
    is_mono: bool,
    scope: &mut Scope,
    ctx: &EvalContext,
    backwards: bool,
) -> Result<(), EvalError> {
    if backwards {
        unlet_eval(a, is_mono, scope, ctx)
    } else {
        let_eval(a, scope, ctx)
    }
}

pub(crate) fn exec_unlet(
    a: &Assignment,
    is_mono: bool,
    scope: &mut Scope,
    ctx: &EvalContext,
    backwards: bool,
) -> Result<(), EvalError> {
    if backwards {
        let_eval(a, scope, ctx)
    } else {
        unlet_eval(a, is_mono, scope, ctx)
    }
}

fn let_eval(a: &Assignment, scope: &mut Scope, ctx: &EvalContext) -> Result<(), EvalError> {
    let value = eval_expr(&a.rhs, scope, ctx)?;
    scope.bind(
        &a.lookup.name,
        Binding::owned(Cell::shared(value), a.lookup.is_mono_name()),
    )
}

fn unlet_eval(
    a: &Assignment,
    is_mono: bool,
    scope: &mut Scope,
    ctx: &EvalContext,
) -> Result<(), EvalError> {
    let name = &a.lookup.name;
    {
        let binding = scope.binding(name)?;
        if binding.is_borrowed {
            return Err(EvalError::Ownership {
                message: format!("unletting borrowed reference `{}`", name),
            });
        }
        // Mono unassignments carry no reversibility obligation, so the
        // value match is only enforced on bi-directional statements.
        if !is_mono {
            let expected = eval_expr(&a.rhs, scope, ctx)?;
            let actual = binding.cell.read().value();
            if actual.type_name() != expected.type_name() {
                return Err(EvalError::Type {
                    message: format!(
                        "trying to unlet {} `{}` using {}",
                        actual.type_name(),
                        name,
                        expected.type_name()
                    ),
                });
            }
            if actual != expected {
                return Err(EvalError::UnletMismatch {
                    name: name.clone(),
                    actual: actual.to_string(),
                    expected: expected.to_string(),
                });
            }
        }
    }
    scope.unbind(name)?;
    Ok(())
}
