//! The reversible execution engine
//!
//! A recursive AST walker under a single `backwards` flag. Statement
//! sequences run in reverse order when `backwards` is true, every handler
//! consults the flag for its behavioural changes, and mono statements are
//! skipped entirely on the backward pass. There is one code path for both
//! directions; splitting them would be the fastest way to let the two
//! semantics drift apart.

pub mod assign;
pub mod call;
pub mod do_undo;
pub mod expr;
pub mod if_stmt;
pub mod loops;
pub mod modification;
pub mod parallel;
pub mod print;
pub mod promote;
pub mod stack;
pub mod swap;
pub mod try_stmt;

use tracing::trace;

use crate::ast::{Stmt, StmtKind};
use crate::context::EvalContext;
use crate::error::EvalError;
use crate::scope::Scope;

/// Execute a statement sequence in the given direction. Backwards means
/// last statement first, each statement itself reversed.
pub fn exec_stmts(
    stmts: &[Stmt],
    scope: &mut Scope,
    ctx: &EvalContext,
    backwards: bool,
) -> Result<(), EvalError> {
    if backwards {
        for stmt in stmts.iter().rev() {
            exec_stmt(stmt, scope, ctx, backwards)?;
        }
    } else {
        for stmt in stmts {
            exec_stmt(stmt, scope, ctx, backwards)?;
        }
    }
    Ok(())
}

/// Execute one statement in the given direction.
pub fn exec_stmt(
    stmt: &Stmt,
    scope: &mut Scope,
    ctx: &EvalContext,
    backwards: bool,
) -> Result<(), EvalError> {
    if ctx.is_cancelled() {
        return Err(EvalError::Cancelled);
    }
    if backwards && stmt.is_mono {
        return Ok(());
    }
    trace!(kind = kind_name(&stmt.kind), backwards, "exec");
    match &stmt.kind {
        StmtKind::Modification(m) => modification::exec(m, scope, ctx, backwards),
        StmtKind::Let(a) => assign::exec_let(a, stmt.is_mono, scope, ctx, backwards),
        StmtKind::Unlet(a) => assign::exec_unlet(a, stmt.is_mono, scope, ctx, backwards),
        StmtKind::Swap(s) => swap::exec(s, scope, ctx),
        StmtKind::Push(m) => stack::exec_push(m, scope, ctx, backwards),
        StmtKind::Pop(m) => stack::exec_pop(m, scope, ctx, backwards),
        StmtKind::If(i) => if_stmt::exec(i, scope, ctx, backwards),
        StmtKind::Loop(l) => loops::exec_loop(l, scope, ctx, backwards),
        StmtKind::For(f) => loops::exec_for(f, scope, ctx, backwards),
        StmtKind::DoYieldUndo(d) => do_undo::exec(d, scope, ctx, backwards),
        StmtKind::Try(t) => try_stmt::exec(t, scope, ctx, backwards),
        StmtKind::Catch(cond) => try_stmt::exec_catch(cond, scope, ctx),
        StmtKind::Call(c) => call::exec(c, scope, ctx, backwards),
        StmtKind::Print(p) => print::exec(p, scope, ctx, backwards),
        StmtKind::Promote(p) => promote::exec(p, scope, ctx, backwards),
        StmtKind::Barrier(name) => parallel::exec_barrier(name, ctx),
        StmtKind::Mutex(m) => parallel::exec_mutex(m, scope, ctx, backwards),
    }
}

fn kind_name(kind: &StmtKind) -> &'static str {
    match kind {
        StmtKind::Modification(_) => "modification",
        StmtKind::Let(_) => "let",
        StmtKind::Unlet(_) => "unlet",
        StmtKind::Swap(_) => "swap",
        StmtKind::Push(_) => "push",
        StmtKind::Pop(_) => "pop",
        StmtKind::If(_) => "if",
        StmtKind::Loop(_) => "loop",
        StmtKind::For(_) => "for",
        StmtKind::DoYieldUndo(_) => "do-yield-undo",
        StmtKind::Try(_) => "try",
        StmtKind::Catch(_) => "catch",
        StmtKind::Call(_) => "call",
        StmtKind::Print(_) => "print",
        StmtKind::Promote(_) => "promote",
        StmtKind::Barrier(_) => "barrier",
        StmtKind::Mutex(_) => "mutex",
    }
}
