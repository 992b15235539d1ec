//! Expression evaluation

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::ast::{Expr, Lookup};
use crate::context::EvalContext;
use crate::error::EvalError;
use crate::ops::BinOp;
use crate::scope::Scope;
use crate::value::{Rational, Value};

/// Evaluate an expression to a value.
pub fn eval_expr(expr: &Expr, scope: &Scope, ctx: &EvalContext) -> Result<Value, EvalError> {
    match expr {
        Expr::Number(n) => Ok(Value::Number(n.clone())),
        Expr::Lookup(lookup) => eval_lookup(lookup, scope, ctx),
        Expr::Length(name) => {
            let cell = scope.resolve(name)?;
            let cell = cell.read();
            if !cell.is_array() {
                return Err(EvalError::Type {
                    message: format!("variable `{}` has no length as it is not an array", name),
                });
            }
            Ok(Value::Number(Rational::from_integer(BigInt::from(
                cell.len(),
            ))))
        }
        Expr::ThreadId => {
            let tid = ctx.lane().map(|l| l.tid).unwrap_or(0);
            Ok(Value::Number(Rational::from_integer(BigInt::from(tid))))
        }
        Expr::NumThreads => {
            let lanes = ctx.lane().map(|l| l.lanes).unwrap_or(1);
            Ok(Value::Number(Rational::from_integer(BigInt::from(lanes))))
        }
        Expr::Unary { op, expr } => {
            let value = eval_number(expr, scope, ctx, op.symbol())?;
            Ok(Value::Number(op.apply(&value)))
        }
        Expr::Binary { op, lhs, rhs } => eval_binary(*op, lhs, rhs, scope, ctx),
        Expr::ArrayLiteral(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(eval_expr(item, scope, ctx)?);
            }
            Ok(Value::Array(values))
        }
        Expr::ArrayRange { start, stop, step } => eval_range(start, stop, step.as_deref(), scope, ctx),
        Expr::ArrayTensor { fill, dims } => eval_tensor(fill, dims, scope, ctx),
    }
}

/// Evaluate an expression that must produce a number. `what` names the
/// operation for the type error.
pub fn eval_number(
    expr: &Expr,
    scope: &Scope,
    ctx: &EvalContext,
    what: &str,
) -> Result<Rational, EvalError> {
    match eval_expr(expr, scope, ctx)? {
        Value::Number(n) => Ok(n),
        Value::Array(_) => Err(EvalError::Type {
            message: format!("operation `{}` does not accept arrays", what),
        }),
    }
}

/// Evaluate the index expressions of a lookup to concrete offsets.
/// Indices must be non-negative integers within `usize`.
pub fn eval_indices(
    lookup: &Lookup,
    scope: &Scope,
    ctx: &EvalContext,
) -> Result<Vec<usize>, EvalError> {
    let mut indices = Vec::with_capacity(lookup.index.len());
    for expr in &lookup.index {
        let n = eval_number(expr, scope, ctx, "indexing")?;
        if !n.is_integer() || n.is_negative() {
            return Err(EvalError::MemAccess {
                message: format!("index {} into `{}` is not a valid offset", n, lookup.name),
            });
        }
        let idx = n.to_integer().to_usize().ok_or_else(|| EvalError::MemAccess {
            message: format!("index {} into `{}` is out of range", n, lookup.name),
        })?;
        indices.push(idx);
    }
    Ok(indices)
}

/// Evaluate a lookup: resolve the cell and read through the index path.
pub fn eval_lookup(lookup: &Lookup, scope: &Scope, ctx: &EvalContext) -> Result<Value, EvalError> {
    let indices = eval_indices(lookup, scope, ctx)?;
    let cell = scope.resolve(&lookup.name)?;
    let value = cell.read().get(&indices, &lookup.name)?;
    Ok(value)
}

fn eval_binary(
    op: BinOp,
    lhs: &Expr,
    rhs: &Expr,
    scope: &Scope,
    ctx: &EvalContext,
) -> Result<Value, EvalError> {
    // `&` and `|` short-circuit over truthiness, arrays included.
    match op {
        BinOp::And => {
            if !eval_expr(lhs, scope, ctx)?.is_truthy() {
                return Ok(Value::zero());
            }
            return Ok(Value::from_bool(eval_expr(rhs, scope, ctx)?.is_truthy()));
        }
        BinOp::Or => {
            if eval_expr(lhs, scope, ctx)?.is_truthy() {
                return Ok(Value::one());
            }
            return Ok(Value::from_bool(eval_expr(rhs, scope, ctx)?.is_truthy()));
        }
        _ => {}
    }
    let a = eval_number(lhs, scope, ctx, op.symbol())?;
    let b = eval_number(rhs, scope, ctx, op.symbol())?;
    Ok(Value::Number(op.apply(&a, &b)?))
}

fn eval_range(
    start: &Expr,
    stop: &Expr,
    step: Option<&Expr>,
    scope: &Scope,
    ctx: &EvalContext,
) -> Result<Value, EvalError> {
    let mut value = eval_number(start, scope, ctx, "array range")?;
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
    let ascending = step.is_positive();
    let mut out = Vec::new();
    while (ascending && value < stop) || (!ascending && value > stop) {
        out.push(Value::Number(value.clone()));
        value = value + &step;
    }
    Ok(Value::Array(out))
}

fn eval_tensor(
    fill: &Expr,
    dims: &Expr,
    scope: &Scope,
    ctx: &EvalContext,
) -> Result<Value, EvalError> {
    let dims_value = eval_expr(dims, scope, ctx)?;
    let Value::Array(dim_values) = dims_value else {
        return Err(EvalError::MemAccess {
            message: "tensor dimensions should be an array, got a number".to_string(),
        });
    };
    if dim_values.is_empty() {
        return Err(EvalError::MemAccess {
            message: "empty array given as tensor dimensions".to_string(),
        });
    }
    let mut dims = Vec::with_capacity(dim_values.len());
    for value in &dim_values {
        let Value::Number(n) = value else {
            return Err(EvalError::MemAccess {
                message: "tensor dimensions should be an array of numbers only".to_string(),
            });
        };
        if !n.is_integer() || n.is_negative() {
            return Err(EvalError::MemAccess {
                message: "tensor dimensions must be non-negative integers".to_string(),
            });
        }
        dims.push(n.to_integer().to_usize().ok_or_else(|| EvalError::MemAccess {
            message: "tensor dimension out of range".to_string(),
        })?);
    }
    if dims[..dims.len() - 1].iter().any(|&d| d == 0) {
        return Err(EvalError::MemAccess {
            message: "only the final dimension of a tensor may be zero".to_string(),
        });
    }
    let fill = eval_expr(fill, scope, ctx)?;
    Ok(build_tensor(&dims, &fill))
}

fn build_tensor(dims: &[usize], fill: &Value) -> Value {
    if dims.len() == 1 {
        Value::Array(vec![fill.clone(); dims[0]])
    } else {
        Value::Array((0..dims[0]).map(|_| build_tensor(&dims[1..], fill)).collect())
    }
}
