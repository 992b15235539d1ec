//! If statements with dual conditions
//!
//! The forward condition must hold before the branch and the backward
//! condition after, both meaning "true-branch was taken". The agreement
//! check is the reversibility invariant, not a diagnostic.

use crate::ast::IfStmt;
use crate::context::EvalContext;
use crate::error::EvalError;
use crate::eval::expr::eval_expr;
use crate::eval::exec_stmts;
use crate::scope::Scope;

pub(crate) fn exec(
    stmt: &IfStmt,
    scope: &mut Scope,
    ctx: &EvalContext,
    backwards: bool,
) -> Result<(), EvalError> {
    if backwards && !stmt.mod_reverse {
        return Ok(());
    }
    let (enter, exit) = if backwards {
        (&stmt.exit, &stmt.enter)
    } else {
        (&stmt.enter, &stmt.exit)
    };

    let took_then = eval_expr(enter, scope, ctx)?.is_truthy();
    let body = if took_then {
        &stmt.then_body
    } else {
        &stmt.else_body
    };
    exec_stmts(body, scope, ctx, backwards)?;

    if !stmt.mono {
        let exit_result = eval_expr(exit, scope, ctx)?.is_truthy();
        if exit_result != took_then {
            return Err(EvalError::IfAssertion);
        }
    }
    Ok(())
}
