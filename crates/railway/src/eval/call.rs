//! Call and uncall
//!
//! An uncall is the same statement with the direction flipped and the
//! stolen/returned roles swapped, so a single routine serves all four
//! combinations of `uncall` and ambient direction. The leak check on the
//! callee scope runs on every completion; it is what guarantees no
//! information escapes a function unaccounted for.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::ast::{is_mono_name, CallStmt, Function};
use crate::cell::CellRef;
use crate::context::EvalContext;
use crate::error::EvalError;
use crate::eval::{exec_stmts, parallel};
use crate::scope::{Binding, Scope};

pub(crate) fn exec(
    call: &CallStmt,
    scope: &mut Scope,
    ctx: &EvalContext,
    backwards: bool,
) -> Result<(), EvalError> {
    let func = ctx.lookup_function(&call.func)?;
    let effective_back = backwards ^ call.is_uncall;
    trace!(func = %call.func, backwards = effective_back, "call");

    if call.lanes.is_some() {
        return parallel::exec_call(call, &func, scope, ctx, effective_back);
    }

    if func.undoreturn && effective_back {
        return destroy_copies(call, scope);
    }

    let (input_args, output_args) = direction_names(call, effective_back);
    let (input_params, output_params) = direction_params(&func, effective_back);
    check_arity(call, &func, input_args, input_params, output_args, output_params)?;

    // Build the callee scope: stolen cells move, borrowed cells share.
    let mut callee = scope.child(func.name.clone());
    for (arg, param) in input_args.iter().zip(input_params) {
        let binding = steal(scope, arg, &call.func)?;
        check_mono_match(binding.is_mono, param, &call.func, effective_back)?;
        callee.bind(param, Binding::owned(binding.cell, is_mono_name(param)))?;
    }
    for (arg, param) in call.borrowed.iter().zip(&func.borrowed_params) {
        let binding = scope.binding(arg)?;
        check_mono_match(binding.is_mono, param, &call.func, effective_back)?;
        let cell = Arc::clone(&binding.cell);
        callee.bind(param, Binding::borrowed(cell, is_mono_name(param)))?;
    }

    let outcome = run_body(&func, &mut callee, ctx, effective_back)?;

    // An undoreturn body has been undone; its stolen inputs flow back to
    // the caller under their original names.
    for (cell, arg) in outcome.restored.into_iter().zip(input_args) {
        scope.bind(arg, Binding::owned(cell, is_mono_name(arg)))?;
    }
    for ((cell, param), name) in outcome
        .outputs
        .into_iter()
        .zip(output_params)
        .zip(output_args)
    {
        check_mono_match(is_mono_name(param), name, &call.func, effective_back)?;
        scope.bind(name, Binding::owned(cell, is_mono_name(name)))?;
    }
    Ok(())
}

/// What a completed callee hands back to the call site.
pub(crate) struct BodyOutcome {
    /// Cells for the output parameters, in declaration order. For an
    /// undoreturn function these are copies.
    pub outputs: Vec<CellRef>,
    /// For an undoreturn function, the stolen parameter cells, which
    /// return to the caller. Empty otherwise.
    pub restored: Vec<CellRef>,
}

/// Run a callee body in `backwards` direction inside an already-populated
/// scope, collect the outputs, and enforce the leak condition.
pub(crate) fn run_body(
    func: &Function,
    callee: &mut Scope,
    ctx: &EvalContext,
    backwards: bool,
) -> Result<BodyOutcome, EvalError> {
    if func.undoreturn {
        // The backward direction of an undoreturn call never builds a
        // callee scope, so this path only runs forwards.
        exec_stmts(&func.body, callee, ctx, false)?;
        let mut outputs = Vec::with_capacity(func.return_params.len());
        for param in &func.return_params {
            let binding = callee.binding(param)?;
            outputs.push(Arc::new(RwLock::new(binding.cell.read().clone())));
        }
        exec_stmts(&func.body, callee, ctx, true)?;
        let mut restored = Vec::with_capacity(func.stolen_params.len());
        for param in &func.stolen_params {
            restored.push(callee.unbind(param)?.cell);
        }
        callee.leak_check(
            |name| func.borrowed_params.iter().any(|p| p == name),
            &func.name,
        )?;
        return Ok(BodyOutcome { outputs, restored });
    }

    exec_stmts(&func.body, callee, ctx, backwards)?;
    let output_params = if backwards {
        &func.stolen_params
    } else {
        &func.return_params
    };
    let mut outputs = Vec::with_capacity(output_params.len());
    for param in output_params {
        let binding = callee.unbind(param)?;
        if binding.is_borrowed {
            return Err(EvalError::Ownership {
                message: format!(
                    "function `{}` returns borrowed reference `{}`",
                    func.name, param
                ),
            });
        }
        outputs.push(binding.cell);
    }
    callee.leak_check(
        |name| func.borrowed_params.iter().any(|p| p == name),
        &func.name,
    )?;
    Ok(BodyOutcome {
        outputs,
        restored: Vec::new(),
    })
}

/// Backward direction of an undoreturn call: the return copies are
/// simply destroyed in the caller.
pub(crate) fn destroy_copies(call: &CallStmt, scope: &mut Scope) -> Result<(), EvalError> {
    for name in &call.returns {
        let binding = scope.binding(name)?;
        if binding.is_borrowed {
            return Err(EvalError::Ownership {
                message: format!("destroying borrowed reference `{}`", name),
            });
        }
        scope.unbind(name)?;
    }
    Ok(())
}

/// The caller-side name lists that act as inputs and outputs for the
/// effective direction.
pub(crate) fn direction_names(call: &CallStmt, backwards: bool) -> (&[String], &[String]) {
    if backwards {
        (&call.returns, &call.stolen)
    } else {
        (&call.stolen, &call.returns)
    }
}

/// The parameter lists that receive inputs and produce outputs for the
/// effective direction.
pub(crate) fn direction_params(func: &Function, backwards: bool) -> (&[String], &[String]) {
    if backwards {
        (&func.return_params, &func.stolen_params)
    } else {
        (&func.stolen_params, &func.return_params)
    }
}

pub(crate) fn check_arity(
    call: &CallStmt,
    func: &Function,
    input_args: &[String],
    input_params: &[String],
    output_args: &[String],
    output_params: &[String],
) -> Result<(), EvalError> {
    if input_args.len() != input_params.len() {
        return Err(EvalError::Call {
            message: format!(
                "function `{}` expects {} stolen references, got {}",
                call.func,
                input_params.len(),
                input_args.len()
            ),
        });
    }
    if output_args.len() != output_params.len() {
        return Err(EvalError::Call {
            message: format!(
                "function `{}` returns {} variables but the result is assigned to {}",
                call.func,
                output_params.len(),
                output_args.len()
            ),
        });
    }
    if call.borrowed.len() != func.borrowed_params.len() {
        return Err(EvalError::Call {
            message: format!(
                "function `{}` expects {} borrowed references, got {}",
                call.func,
                func.borrowed_params.len(),
                call.borrowed.len()
            ),
        });
    }
    Ok(())
}

/// Remove a caller binding that is about to move into a callee.
pub(crate) fn steal(scope: &mut Scope, arg: &str, func: &str) -> Result<Binding, EvalError> {
    {
        let binding = scope.binding(arg)?;
        if binding.is_borrowed {
            return Err(EvalError::Ownership {
                message: format!(
                    "`{}` is a borrowed reference and may not be stolen by function `{}`",
                    arg, func
                ),
            });
        }
    }
    scope.unbind(arg)
}

/// Mono values may only bind to mono names, and vice versa.
pub(crate) fn check_mono_match(
    value_mono: bool,
    target: &str,
    func: &str,
    uncalling: bool,
) -> Result<(), EvalError> {
    let verb = if uncalling { "uncalling" } else { "calling" };
    if value_mono && !is_mono_name(target) {
        return Err(EvalError::IllegalMono {
            message: format!(
                "{} `{}` using a mono value for non-mono `{}`",
                verb, func, target
            ),
        });
    }
    if !value_mono && is_mono_name(target) {
        return Err(EvalError::IllegalMono {
            message: format!(
                "{} `{}` using a non-mono value for mono `{}`",
                verb, func, target
            ),
        });
    }
    Ok(())
}
