//! Modification statements: `x += e` and friends

use crate::ast::Modification;
use crate::context::EvalContext;
use crate::error::EvalError;
use crate::eval::expr::{eval_indices, eval_number};
use crate::scope::Scope;
use crate::value::Value;

pub(crate) fn exec(
    m: &Modification,
    scope: &mut Scope,
    ctx: &EvalContext,
    backwards: bool,
) -> Result<(), EvalError> {
    let op = if backwards {
        // Non-invertible operators only ever reach the engine on mono
        // statements, which the dispatcher skips on the backward pass.
        m.op.inverse().ok_or_else(|| EvalError::Value {
            message: format!("operator `{}` has no inverse", m.op.symbol()),
        })?
    } else {
        m.op
    };

    let rhs = eval_number(&m.expr, scope, ctx, op.symbol())?;
    let indices = eval_indices(&m.lookup, scope, ctx)?;
    let cell = scope.binding(&m.lookup.name)?.cell.clone();

    let current = {
        let guard = cell.read();
        match guard.get(&indices, &m.lookup.name)? {
            Value::Number(n) => n,
            Value::Array(_) => {
                return Err(EvalError::Type {
                    message: format!(
                        "modifying `{}` which holds an array, not a number",
                        m.lookup.name
                    ),
                });
            }
        }
    };
    let result = op.apply(&m.lookup.name, &current, &rhs)?;
    let outcome = cell.write().set(&indices, Value::Number(result), &m.lookup.name);
    outcome
}
