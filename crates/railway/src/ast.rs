//! AST nodes for expressions and statements
//!
//! Every statement carries enough information to be replayed in either
//! time direction: its variant, a mono bit (skip the statement when time
//! runs backwards) and a mod-reverse bit (whether it can touch non-mono
//! state at all, used to skip whole constructs on the backward pass).

use crate::ops::{BinOp, ModOp, UnaryOp};
use crate::value::Rational;

/// Whether an identifier is mono (exists only in forward time).
pub fn is_mono_name(name: &str) -> bool {
    name.starts_with('.')
}

// ═══════════════════════════════════════════════════════════════════════
// Expressions
// ═══════════════════════════════════════════════════════════════════════

/// A variable reference: a name plus zero or more index expressions.
#[derive(Debug, Clone)]
pub struct Lookup {
    /// The referenced name (a leading `.` marks it mono)
    pub name: String,
    /// Index expressions, outermost first
    pub index: Vec<Expr>,
}

impl Lookup {
    /// A bare-name lookup.
    pub fn bare(name: impl Into<String>) -> Self {
        Lookup {
            name: name.into(),
            index: Vec::new(),
        }
    }

    /// Whether the referenced name itself is mono.
    pub fn is_mono_name(&self) -> bool {
        is_mono_name(&self.name)
    }

    /// Whether any part of this lookup carries mono taint.
    pub fn has_mono(&self) -> bool {
        self.is_mono_name() || self.index.iter().any(Expr::has_mono)
    }

    /// Whether this lookup mentions `name` anywhere.
    pub fn uses_name(&self, name: &str) -> bool {
        self.name == name || self.index.iter().any(|e| e.uses_name(name))
    }
}

/// An expression node.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A numeric literal
    Number(Rational),
    /// A variable reference
    Lookup(Lookup),
    /// `#a`: the element count of the array bound to a name
    Length(String),
    /// `TID`: the lane index inside a parallel call (0 sequentially)
    ThreadId,
    /// `#TID`: the lane count of the parallel call (1 sequentially)
    NumThreads,
    /// A prefix operator application
    Unary {
        /// The operator
        op: UnaryOp,
        /// The operand
        expr: Box<Expr>,
    },
    /// A binary operator application
    Binary {
        /// The operator
        op: BinOp,
        /// Left operand
        lhs: Box<Expr>,
        /// Right operand
        rhs: Box<Expr>,
    },
    /// `[a, b, c]`
    ArrayLiteral(Vec<Expr>),
    /// `[start to stop by step]`, step defaulting to 1
    ArrayRange {
        /// First element
        start: Box<Expr>,
        /// Exclusive bound
        stop: Box<Expr>,
        /// Stride, `None` for 1
        step: Option<Box<Expr>>,
    },
    /// `[fill tensor dims]`: a nested array of copies of `fill`
    ArrayTensor {
        /// The element to replicate
        fill: Box<Expr>,
        /// An array of per-dimension lengths
        dims: Box<Expr>,
    },
}

impl Expr {
    /// Mono taint, propagated upward from mono identifiers.
    pub fn has_mono(&self) -> bool {
        match self {
            Expr::Number(_) | Expr::ThreadId | Expr::NumThreads => false,
            Expr::Lookup(lookup) => lookup.has_mono(),
            Expr::Length(name) => is_mono_name(name),
            Expr::Unary { expr, .. } => expr.has_mono(),
            Expr::Binary { lhs, rhs, .. } => lhs.has_mono() || rhs.has_mono(),
            Expr::ArrayLiteral(items) => items.iter().any(Expr::has_mono),
            Expr::ArrayRange { start, stop, step } => {
                start.has_mono()
                    || stop.has_mono()
                    || step.as_ref().is_some_and(|s| s.has_mono())
            }
            Expr::ArrayTensor { fill, dims } => fill.has_mono() || dims.has_mono(),
        }
    }

    /// Whether the expression mentions `name` anywhere.
    pub fn uses_name(&self, name: &str) -> bool {
        match self {
            Expr::Number(_) | Expr::ThreadId | Expr::NumThreads => false,
            Expr::Lookup(lookup) => lookup.uses_name(name),
            Expr::Length(n) => n == name,
            Expr::Unary { expr, .. } => expr.uses_name(name),
            Expr::Binary { lhs, rhs, .. } => lhs.uses_name(name) || rhs.uses_name(name),
            Expr::ArrayLiteral(items) => items.iter().any(|e| e.uses_name(name)),
            Expr::ArrayRange { start, stop, step } => {
                start.uses_name(name)
                    || stop.uses_name(name)
                    || step.as_ref().is_some_and(|s| s.uses_name(name))
            }
            Expr::ArrayTensor { fill, dims } => fill.uses_name(name) || dims.uses_name(name),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Statements
// ═══════════════════════════════════════════════════════════════════════

/// An in-place modification: `lookup op= expr`.
#[derive(Debug, Clone)]
pub struct Modification {
    /// The modified location
    pub lookup: Lookup,
    /// The operator; its [`crate::ops::ModOp::inverse`] runs backwards
    pub op: ModOp,
    /// The right-hand side
    pub expr: Expr,
}

/// A `let` or `unlet`: both directions of the same statement.
#[derive(Debug, Clone)]
pub struct Assignment {
    /// The created (or destroyed) name
    pub lookup: Lookup,
    /// The initialiser, which the destruction direction must match
    pub rhs: Expr,
}

/// `swap a <=> b`.
#[derive(Debug, Clone)]
pub struct SwapStmt {
    /// Left location
    pub lhs: Lookup,
    /// Right location
    pub rhs: Lookup,
}

/// `push src => dst` or `pop src => dst`: ownership transfer between a
/// scope binding and an array tail.
#[derive(Debug, Clone)]
pub struct MoveStmt {
    /// The source location
    pub src: Lookup,
    /// The destination location
    pub dst: Lookup,
}

/// `if (enter) … else … fi (exit)`.
#[derive(Debug, Clone)]
pub struct IfStmt {
    /// Condition branched on going forwards
    pub enter: Expr,
    /// The true branch
    pub then_body: Vec<Stmt>,
    /// The false branch
    pub else_body: Vec<Stmt>,
    /// Condition branched on going backwards; must agree with `enter`
    pub exit: Expr,
    /// Mono-directional: no exit assertion, skipped backwards
    pub mono: bool,
    /// Whether any branch can touch non-mono state
    pub mod_reverse: bool,
}

/// `loop (forward) … pool (backward)`.
#[derive(Debug, Clone)]
pub struct LoopStmt {
    /// Iteration condition going forwards, per-iteration assertion
    /// going backwards
    pub forward: Expr,
    /// The body
    pub body: Vec<Stmt>,
    /// Iteration condition going backwards; `None` only for mono loops
    pub backward: Option<Expr>,
    /// Mono-directional: no assertions, skipped backwards
    pub mono: bool,
    /// Whether the body can touch non-mono state
    pub mod_reverse: bool,
}

/// `for (name in iterator) … rof`.
#[derive(Debug, Clone)]
pub struct ForStmt {
    /// The loop variable, rebound per element
    pub name: String,
    /// The iterated expression (arrays eagerly, ranges lazily)
    pub iterator: Expr,
    /// The body
    pub body: Vec<Stmt>,
}

/// `do … yield … undo`.
#[derive(Debug, Clone)]
pub struct DoYieldUndo {
    /// Run forwards, then (after the yield block) backwards
    pub do_body: Vec<Stmt>,
    /// Run in the ambient direction between the two do passes
    pub yield_body: Vec<Stmt>,
}

/// `try (name in iterator) … yrt`.
#[derive(Debug, Clone)]
pub struct TryStmt {
    /// The iterator variable, left bound by a passing iteration
    pub name: String,
    /// Candidate values
    pub iterator: Expr,
    /// The body, containing `catch` statements
    pub body: Vec<Stmt>,
}

/// A call site: `(stolen) => call f{lanes}(borrowed) => (returns)`.
///
/// `uncall` is the same statement with the direction flipped and the
/// stolen/returned roles swapped; the engine holds a single handler.
#[derive(Debug, Clone)]
pub struct CallStmt {
    /// Whether this is an `uncall`
    pub is_uncall: bool,
    /// The callee name
    pub func: String,
    /// Lane count: `Some` makes this a parallel call
    pub lanes: Option<Expr>,
    /// Names stolen from the caller scope
    pub stolen: Vec<String>,
    /// Names borrowed (shared, left in the caller)
    pub borrowed: Vec<String>,
    /// Names that receive the returned cells
    pub returns: Vec<String>,
}

/// One `print` argument.
#[derive(Debug, Clone)]
pub enum PrintItem {
    /// A string literal, written verbatim
    Text(String),
    /// An expression, written in value form
    Expr(Expr),
}

/// `print (a, "text", b)`.
#[derive(Debug, Clone)]
pub struct PrintStmt {
    /// The arguments, space-separated on output
    pub items: Vec<PrintItem>,
}

/// `promote .src => dst`.
#[derive(Debug, Clone)]
pub struct PromoteStmt {
    /// The mono source binding
    pub src: String,
    /// The non-mono destination binding
    pub dst: String,
}

/// `mutex "name" … xetum`.
#[derive(Debug, Clone)]
pub struct MutexStmt {
    /// The critical-section name
    pub name: String,
    /// The guarded body
    pub body: Vec<Stmt>,
}

/// A statement variant.
#[derive(Debug, Clone)]
pub enum StmtKind {
    /// In-place modification
    Modification(Modification),
    /// Binding creation
    Let(Assignment),
    /// Binding destruction by value
    Unlet(Assignment),
    /// Content exchange; self-inverse
    Swap(SwapStmt),
    /// Move a cell onto an array tail
    Push(MoveStmt),
    /// Move an array tail into a binding
    Pop(MoveStmt),
    /// Branch with dual conditions
    If(IfStmt),
    /// Loop with dual conditions
    Loop(LoopStmt),
    /// Iteration over an array
    For(ForStmt),
    /// Self-inverting compute block
    DoYieldUndo(DoYieldUndo),
    /// Search over candidate values
    Try(TryStmt),
    /// Rewind signal inside a try body
    Catch(Expr),
    /// Function call or uncall, sequential or parallel
    Call(CallStmt),
    /// The one sanctioned impure operation
    Print(PrintStmt),
    /// Mono → non-mono transition
    Promote(PromoteStmt),
    /// Named synchronisation point; its own inverse
    Barrier(String),
    /// Named directional critical section
    Mutex(MutexStmt),
}

/// A statement with its direction metadata.
#[derive(Debug, Clone)]
pub struct Stmt {
    /// The statement variant
    pub kind: StmtKind,
    /// Mono statements are skipped entirely during backward execution
    pub is_mono: bool,
    /// Whether the statement can modify non-mono state; constructs where
    /// this is false have nothing to replay backwards
    pub mod_reverse: bool,
}

// ═══════════════════════════════════════════════════════════════════════
// Functions
// ═══════════════════════════════════════════════════════════════════════

/// A function definition.
#[derive(Debug, Clone)]
pub struct Function {
    /// The function name (a leading `.` marks the whole function mono)
    pub name: String,
    /// Parameters bound to the caller's cells, shared
    pub borrowed_params: Vec<String>,
    /// Parameters moved out of the caller scope
    pub stolen_params: Vec<String>,
    /// The body, replayable in either direction
    pub body: Vec<Stmt>,
    /// Names whose cells move to the caller on return
    pub return_params: Vec<String>,
    /// Whether the function returns copies and undoes its own body
    pub undoreturn: bool,
}

impl Function {
    /// Whether the function is mono (forward-only).
    pub fn is_mono(&self) -> bool {
        is_mono_name(&self.name)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Display (diagnostics and tree-shape assertions)
// ═══════════════════════════════════════════════════════════════════════

impl std::fmt::Display for Lookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        for idx in &self.index {
            write!(f, "[{}]", idx)?;
        }
        Ok(())
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Number(n) => {
                use num_traits::One;
                if n.denom().is_one() {
                    write!(f, "{}", n.numer())
                } else {
                    write!(f, "{}/{}", n.numer(), n.denom())
                }
            }
            Expr::Lookup(lookup) => write!(f, "{}", lookup),
            Expr::Length(name) => write!(f, "#{}", name),
            Expr::ThreadId => write!(f, "TID"),
            Expr::NumThreads => write!(f, "#TID"),
            Expr::Unary { op, expr } => write!(f, "{}{}", op.symbol(), expr),
            Expr::Binary { op, lhs, rhs } => write!(f, "({} {} {})", lhs, op.symbol(), rhs),
            Expr::ArrayLiteral(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Expr::ArrayRange { start, stop, step } => {
                write!(f, "[{} to {}", start, stop)?;
                if let Some(step) = step {
                    write!(f, " by {}", step)?;
                }
                write!(f, "]")
            }
            Expr::ArrayTensor { fill, dims } => write!(f, "[{} tensor {}]", fill, dims),
        }
    }
}
