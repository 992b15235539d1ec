//! Loop and for statements

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::ast::{is_mono_name, Expr, ForStmt, LoopStmt};
use crate::cell::Cell;
use crate::context::EvalContext;
use crate::error::EvalError;
use crate::eval::exec_stmts;
use crate::eval::expr::{eval_expr, eval_number};
use crate::scope::{Binding, Scope};
use crate::value::{Rational, Value};

fn eval_truthy(expr: &Expr, scope: &Scope, ctx: &EvalContext) -> Result<bool, EvalError> {
    Ok(eval_expr(expr, scope, ctx)?.is_truthy())
}

/// A loop runs while its driving condition holds. The opposite-direction
/// condition must be false at entry and true after every iteration; those
/// two assertions are exactly what the reversed execution relies on.
pub(crate) fn exec_loop(
    stmt: &LoopStmt,
    scope: &mut Scope,
    ctx: &EvalContext,
    backwards: bool,
) -> Result<(), EvalError> {
    if backwards && !stmt.mod_reverse {
        return Ok(());
    }
    if stmt.mono {
        // Mono loops only exist going forwards and carry no assertions.
        while eval_truthy(&stmt.forward, scope, ctx)? {
            exec_stmts(&stmt.body, scope, ctx, false)?;
        }
        return Ok(());
    }
    let backward = stmt.backward.as_ref().ok_or_else(|| EvalError::Value {
        message: "bi-directional loop is missing its reverse condition".to_string(),
    })?;
    let (condition, assertion) = if backwards {
        (backward, &stmt.forward)
    } else {
        (&stmt.forward, backward)
    };

    if eval_truthy(assertion, scope, ctx)? {
        return Err(EvalError::LoopAssertion {
            message: "reverse condition is true before loop start".to_string(),
        });
    }
    while eval_truthy(condition, scope, ctx)? {
        exec_stmts(&stmt.body, scope, ctx, backwards)?;
        if !eval_truthy(assertion, scope, ctx)? {
            return Err(EvalError::LoopAssertion {
                message: "iteration condition holds when the reverse condition does not"
                    .to_string(),
            });
        }
    }
    Ok(())
}

/// For loops copy elements one at a time into the loop variable; the
/// copy prevents aliasing, and the variable is checked against the source
/// element after each iteration so the reversed run sees the same
/// sequence.
pub(crate) fn exec_for(
    stmt: &ForStmt,
    scope: &mut Scope,
    ctx: &EvalContext,
    backwards: bool,
) -> Result<(), EvalError> {
    let iter = ForIter::from_expr(&stmt.iterator, scope, ctx)?;
    let len = iter.len();
    let mono = is_mono_name(&stmt.name);

    let positions: Vec<usize> = if backwards {
        (0..len).rev().collect()
    } else {
        (0..len).collect()
    };
    for i in positions {
        let element = iter.get(i, scope, ctx)?;
        if let Value::Array(_) = element {
            return Err(EvalError::Type {
                message: format!("assigning an array to for-loop variable `{}`", stmt.name),
            });
        }
        let cell = Cell::shared(element.clone());
        scope.bind(
            &stmt.name,
            Binding {
                cell: cell.clone(),
                is_borrowed: true,
                is_mono: mono,
            },
        )?;
        exec_stmts(&stmt.body, scope, ctx, backwards)?;
        let after = cell.read().value();
        if after != element {
            return Err(EvalError::Value {
                message: format!(
                    "for-loop variable `{}` has value {} after an iteration, but the source \
                     array holds {}",
                    stmt.name, after, element
                ),
            });
        }
        scope.unbind(&stmt.name)?;
    }
    Ok(())
}

/// An iterable for `for` and `try`: a materialised array, or a lazy
/// range that computes its i-th element per step.
pub(crate) enum ForIter {
    Eager(Vec<Value>),
    Range {
        start: Rational,
        step: Rational,
        len: usize,
    },
}

impl ForIter {
    pub(crate) fn from_expr(
        expr: &Expr,
        scope: &Scope,
        ctx: &EvalContext,
    ) -> Result<Self, EvalError> {
        if let Expr::ArrayRange { start, stop, step } = expr {
            let start = eval_number(start, scope, ctx, "array range")?;
            let stop = eval_number(stop, scope, ctx, "array range")?;
            let step = match step {
                Some(step) => eval_number(step, scope, ctx, "array range")?,
                None => Rational::from_integer(BigInt::from(1)),
            };
            if step.is_zero() {
                return Err(EvalError::Value {
                    message: "step value for an array range must be non-zero".to_string(),
                });
            }
            let span = (&stop - &start) / &step;
            let len = if span.is_positive() {
                span.ceil()
                    .to_integer()
                    .to_usize()
                    .ok_or_else(|| EvalError::Value {
                        message: "array range is too long to iterate".to_string(),
                    })?
            } else {
                0
            };
            return Ok(ForIter::Range { start, step, len });
        }
        match eval_expr(expr, scope, ctx)? {
            Value::Array(items) => Ok(ForIter::Eager(items)),
            Value::Number(_) => Err(EvalError::Type {
                message: "iterating over a number, not an array".to_string(),
            }),
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            ForIter::Eager(items) => items.len(),
            ForIter::Range { len, .. } => *len,
        }
    }

    pub(crate) fn get(
        &self,
        i: usize,
        _scope: &Scope,
        _ctx: &EvalContext,
    ) -> Result<Value, EvalError> {
        match self {
            ForIter::Eager(items) => items.get(i).cloned().ok_or_else(|| EvalError::MemAccess {
                message: format!("iterator index {} out of bounds", i),
            }),
            ForIter::Range { start, step, .. } => {
                let offset = step * Rational::from_integer(BigInt::from(i));
                Ok(Value::Number(start + offset))
            }
        }
    }
}
