//! Parallel calls, barriers, and the directional mutex
//!
//! A parallel call spawns one OS thread per lane. Lanes share the
//! borrowed cells and nothing else: each receives the lane-j slice of
//! every stolen-argument array, and per-lane returns are regathered into
//! arrays of length N for the caller. A failure in any lane cancels its
//! siblings and surfaces the originating error.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;

use num_traits::{Signed, ToPrimitive};
use tracing::trace;

use crate::ast::{is_mono_name, CallStmt, Function, MutexStmt};
use crate::cell::{Cell, CellRef};
use crate::context::EvalContext;
use crate::error::EvalError;
use crate::eval::call::{
    check_arity, check_mono_match, destroy_copies, direction_names, direction_params, run_body,
    steal, BodyOutcome,
};
use crate::eval::exec_stmts;
use crate::eval::expr::eval_number;
use crate::scope::{Binding, Scope};
use crate::sync::{LaneCtx, SyncRegistry};
use crate::value::Value;

/// A barrier outside a parallel context has nothing to wait for.
pub(crate) fn exec_barrier(name: &str, ctx: &EvalContext) -> Result<(), EvalError> {
    match ctx.lane() {
        Some(lane) => lane.sync.barrier(name, &lane.cancel),
        None => Ok(()),
    }
}

pub(crate) fn exec_mutex(
    m: &MutexStmt,
    scope: &mut Scope,
    ctx: &EvalContext,
    backwards: bool,
) -> Result<(), EvalError> {
    let Some(lane) = ctx.lane() else {
        return exec_stmts(&m.body, scope, ctx, backwards);
    };
    lane.sync.mutex_enter(&m.name, lane.tid, backwards, &lane.cancel)?;
    let result = exec_stmts(&m.body, scope, ctx, backwards);
    lane.sync.mutex_exit(&m.name, backwards);
    result
}

pub(crate) fn exec_call(
    call: &CallStmt,
    func: &Arc<Function>,
    scope: &mut Scope,
    ctx: &EvalContext,
    effective_back: bool,
) -> Result<(), EvalError> {
    let lanes_expr = call.lanes.as_ref().ok_or_else(|| EvalError::Call {
        message: "parallel call without a lane count".to_string(),
    })?;
    let lanes_value = eval_number(lanes_expr, scope, ctx, "lane count")?;
    if !lanes_value.is_integer() || !lanes_value.is_positive() {
        return Err(EvalError::Value {
            message: format!("lane count {} is not a positive integer", lanes_value),
        });
    }
    let lanes = lanes_value
        .to_integer()
        .to_usize()
        .ok_or_else(|| EvalError::Value {
            message: "lane count out of range".to_string(),
        })?;
    trace!(func = %call.func, lanes, backwards = effective_back, "parallel call");

    if func.undoreturn && effective_back {
        return destroy_copies(call, scope);
    }

    let (input_args, output_args) = direction_names(call, effective_back);
    let (input_params, output_params) = direction_params(func, effective_back);
    check_arity(call, func, input_args, input_params, output_args, output_params)?;

    // Steal the lane-sliced arguments. Each must be an array of exactly
    // one element per lane.
    let mut lane_inputs: Vec<Vec<Value>> = (0..lanes).map(|_| Vec::new()).collect();
    for (arg, param) in input_args.iter().zip(input_params) {
        let binding = steal(scope, arg, &call.func)?;
        check_mono_match(binding.is_mono, param, &call.func, effective_back)?;
        let value = binding.cell.read().value();
        let Value::Array(items) = value else {
            return Err(EvalError::Type {
                message: format!(
                    "parallel call slices `{}` which is a number, not an array",
                    arg
                ),
            });
        };
        if items.len() != lanes {
            return Err(EvalError::Call {
                message: format!(
                    "stolen argument `{}` has {} elements for {} lanes",
                    arg,
                    items.len(),
                    lanes
                ),
            });
        }
        for (lane, item) in items.into_iter().enumerate() {
            lane_inputs[lane].push(item);
        }
    }

    // Borrowed cells are shared by every lane.
    let mut borrowed: Vec<(String, CellRef, bool)> = Vec::with_capacity(call.borrowed.len());
    for (arg, param) in call.borrowed.iter().zip(&func.borrowed_params) {
        let binding = scope.binding(arg)?;
        check_mono_match(binding.is_mono, param, &call.func, effective_back)?;
        borrowed.push((
            param.clone(),
            Arc::clone(&binding.cell),
            is_mono_name(param),
        ));
    }

    let sync = SyncRegistry::new(lanes);
    let cancel = Arc::new(AtomicBool::new(false));
    let globals = scope.globals();

    let mut results: Vec<Result<BodyOutcome, EvalError>> = Vec::with_capacity(lanes);
    thread::scope(|s| {
        let mut handles = Vec::with_capacity(lanes);
        for (tid, inputs) in lane_inputs.into_iter().enumerate() {
            let lane_ctx = LaneCtx {
                tid,
                lanes,
                sync: Arc::clone(&sync),
                cancel: Arc::clone(&cancel),
            };
            let lane_eval_ctx = ctx.with_lane(lane_ctx.clone());
            let func = Arc::clone(func);
            let globals = Arc::clone(&globals);
            let borrowed = borrowed.clone();
            handles.push(s.spawn(move || {
                let result = (|| {
                    let mut callee = Scope::new(func.name.clone(), globals);
                    for (value, param) in inputs.into_iter().zip(input_params) {
                        callee
                            .bind(param, Binding::owned(Cell::shared(value), is_mono_name(param)))?;
                    }
                    for (param, cell, mono) in borrowed {
                        callee.bind(param, Binding::borrowed(cell, mono))?;
                    }
                    run_body(&func, &mut callee, &lane_eval_ctx, effective_back)
                })();
                // any failure, setup included, must wake blocked siblings
                if result.is_err() {
                    lane_ctx.cancel_all();
                }
                result
            }));
        }
        for handle in handles {
            results.push(match handle.join() {
                Ok(result) => result,
                Err(_) => Err(EvalError::Value {
                    message: "parallel lane panicked".to_string(),
                }),
            });
        }
    });

    // Prefer the originating error over sympathetic cancellations.
    let mut outcomes = Vec::with_capacity(lanes);
    let mut first_error: Option<EvalError> = None;
    for result in results {
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(err) => match &first_error {
                None => first_error = Some(err),
                Some(EvalError::Cancelled) if !matches!(err, EvalError::Cancelled) => {
                    first_error = Some(err);
                }
                Some(_) => {}
            },
        }
    }
    if let Some(err) = first_error {
        return Err(err);
    }

    // Regather per-lane cells into arrays of length N for the caller.
    if func.undoreturn {
        // The undone stolen slices flow back under their original names.
        for (k, name) in input_args.iter().enumerate() {
            let items: Vec<Value> = outcomes
                .iter()
                .map(|o| o.restored[k].read().value())
                .collect();
            scope.bind(
                name,
                Binding::owned(Cell::shared(Value::Array(items)), is_mono_name(name)),
            )?;
        }
    }
    for (k, (param, name)) in output_params.iter().zip(output_args).enumerate() {
        check_mono_match(is_mono_name(param), name, &call.func, effective_back)?;
        let items: Vec<Value> = outcomes
            .iter()
            .map(|o| o.outputs[k].read().value())
            .collect();
        scope.bind(
            name,
            Binding::owned(Cell::shared(Value::Array(items)), is_mono_name(name)),
        )?;
    }
    Ok(())
}
