//! Swap statements: `swap a <=> b`, their own inverse

use std::sync::Arc;

use crate::ast::SwapStmt;
use crate::context::EvalContext;
use crate::error::EvalError;
use crate::eval::expr::eval_indices;
use crate::scope::Scope;

pub(crate) fn exec(s: &SwapStmt, scope: &mut Scope, ctx: &EvalContext) -> Result<(), EvalError> {
    let lhs_indices = eval_indices(&s.lhs, scope, ctx)?;
    let rhs_indices = eval_indices(&s.rhs, scope, ctx)?;
    let lhs_cell = scope.binding(&s.lhs.name)?.cell.clone();
    let rhs_cell = scope.binding(&s.rhs.name)?.cell.clone();

    if Arc::ptr_eq(&lhs_cell, &rhs_cell) {
        // Two locations inside one cell, e.g. `swap a[0] <=> a[1]`.
        let mut guard = lhs_cell.write();
        let a = guard.get(&lhs_indices, &s.lhs.name)?;
        let b = guard.get(&rhs_indices, &s.rhs.name)?;
        guard.set(&lhs_indices, b, &s.lhs.name)?;
        guard.set(&rhs_indices, a, &s.rhs.name)?;
    } else {
        let a = lhs_cell.read().get(&lhs_indices, &s.lhs.name)?;
        let b = rhs_cell.read().get(&rhs_indices, &s.rhs.name)?;
        lhs_cell.write().set(&lhs_indices, b, &s.lhs.name)?;
        rhs_cell.write().set(&rhs_indices, a, &s.rhs.name)?;
    }
    Ok(())
}
