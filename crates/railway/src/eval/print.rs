//! Print: the one sanctioned impure operation

use crate::ast::{PrintItem, PrintStmt};
use crate::context::EvalContext;
use crate::error::EvalError;
use crate::eval::expr::eval_expr;
use crate::scope::Scope;

pub(crate) fn exec(
    p: &PrintStmt,
    scope: &mut Scope,
    ctx: &EvalContext,
    backwards: bool,
) -> Result<(), EvalError> {
    // No backwards effect: already-written output is never rolled back.
    if backwards {
        return Ok(());
    }
    let mut parts = Vec::with_capacity(p.items.len());
    for item in &p.items {
        match item {
            PrintItem::Text(text) => parts.push(text.clone()),
            PrintItem::Expr(expr) => parts.push(eval_expr(expr, scope, ctx)?.to_string()),
        }
    }
    ctx.write_line(&parts.join(" "))
}
