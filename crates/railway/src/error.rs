//! Error types for Railway parsing and execution

use thiserror::Error;

/// Errors raised while turning source text into a program.
///
/// Everything in this enum is detected before a single statement runs:
/// lexing faults, malformed statements and expressions, and the syntactic
/// reversibility discipline (self-modification, mono taint, aliasing).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Input that matches no token rule
    #[error("unrecognised input at line {line}, column {col}")]
    Lexing {
        /// 1-based source line
        line: usize,
        /// 0-based source column
        col: usize,
    },

    /// A statement or expression that does not fit the grammar
    #[error("parse error at `{token}` (line {line}): {message}")]
    Malformed {
        /// The offending token text
        token: String,
        /// Source line of the offending token
        line: usize,
        /// What was expected instead
        message: String,
    },

    /// The token stream ended mid-construct
    #[error("unexpected end of input: {message}")]
    UnexpectedEof {
        /// Which construct was left open
        message: String,
    },

    /// The left-hand side of a modification appears in its own right-hand side
    #[error("self-modification: {message}")]
    SelfModification {
        /// Names the variable and the offending position
        message: String,
    },

    /// A variable used inside its own initialiser
    #[error("variable `{name}` is used during its own (un)initialisation")]
    CircularDefinition {
        /// The variable being defined
        name: String,
    },

    /// A modification operator with no inverse applied to a non-mono target
    #[error("non-invertible operator `{op}` modifies non-mono variable `{name}`")]
    NonInvertibleModification {
        /// The operator symbol, e.g. `**=`
        op: String,
        /// The modification target
        name: String,
    },

    /// Mono-directional information flowing into non-mono state
    #[error("illegal mono usage: {message}")]
    IllegalMono {
        /// Names the tainted value and its destination
        message: String,
    },

    /// A construct that modifies nothing non-mono but is not marked mono
    #[error("expected mono: {message}")]
    ExpectedMono {
        /// Names the construct
        message: String,
    },

    /// Two functions share a name
    #[error("function `{name}` has multiple definitions")]
    DuplicateDefinition {
        /// The function name
        name: String,
    },

    /// A name appearing twice where the language requires uniqueness
    #[error("name conflict: {message}")]
    NameConflict {
        /// Names the duplicate and where it occurs
        message: String,
    },

    /// A statement shape that would create two routes to one cell
    #[error("aliasing: {message}")]
    Aliasing {
        /// Names the statement and the aliased variable
        message: String,
    },
}

impl ParseError {
    /// Build a [`ParseError::Malformed`] from a token's text and line.
    pub fn malformed(token: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        ParseError::Malformed {
            token: token.into(),
            line,
            message: message.into(),
        }
    }
}

/// Errors raised while a program is running.
///
/// All of these are fatal to the program: they tear down the current call
/// stack (and parallel context, if any) and reach the driver. The
/// reversibility assertions ([`EvalError::LoopAssertion`],
/// [`EvalError::IfAssertion`], [`EvalError::UnletMismatch`]) are not
/// diagnostics that may be disabled; they are what makes the language
/// reversible.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// Reference to a name with no binding in scope
    #[error("variable `{name}` is not defined")]
    Undefined {
        /// The unresolvable name
        name: String,
    },

    /// A binding created where one already lives
    #[error("variable `{name}` already exists")]
    AlreadyExists {
        /// The colliding name
        name: String,
    },

    /// Call of a function that was never declared
    #[error("function `{name}` is not defined")]
    UndefinedFunction {
        /// The unresolvable function name
        name: String,
    },

    /// Unlet whose right-hand side disagrees with the stored value
    #[error("variable `{name}` has value {actual}, not {expected}, during uninitialisation")]
    UnletMismatch {
        /// The variable being unlet
        name: String,
        /// The value found in the cell
        actual: String,
        /// The value the unlet expression produced
        expected: String,
    },

    /// A loop's entry or per-iteration condition agreement failed
    #[error("loop assertion failed: {message}")]
    LoopAssertion {
        /// Which condition disagreed, and when
        message: String,
    },

    /// An if statement's forward and backward conditions disagreed
    #[error("if assertion failed: exit condition disagrees with the branch taken")]
    IfAssertion,

    /// Index out of bounds, or indexing into the wrong shape of value
    #[error("memory access: {message}")]
    MemAccess {
        /// Names the variable and index
        message: String,
    },

    /// An operand of the wrong runtime type
    #[error("type error: {message}")]
    Type {
        /// Names the operation and operand
        message: String,
    },

    /// In-place multiplication by zero (its reversal would divide by zero)
    #[error("multiplying variable `{name}` by zero")]
    ZeroMultiplication {
        /// The modification target
        name: String,
    },

    /// Division by zero, in-place or in an expression
    #[error("division by zero")]
    DivisionByZero,

    /// A function returned while an undeclared binding was still alive
    #[error("variable `{name}` is still in scope of function `{func}` at the end of a (un)call")]
    InformationLeak {
        /// The leaked binding
        name: String,
        /// The function whose scope leaked
        func: String,
    },

    /// A try block ran out of candidate values
    #[error("try exhausted: no iterator value passes the block")]
    ExhaustedTry,

    /// Parallel lanes attempted a mutex in opposing time directions
    #[error("mutex \"{name}\": lanes entered in opposing directions")]
    MutexDirection {
        /// The mutex name
        name: String,
    },

    /// A value outside an operation's domain
    #[error("value error: {message}")]
    Value {
        /// Names the operation and the offending value
        message: String,
    },

    /// An operation that would destroy or steal a borrowed reference
    #[error("ownership: {message}")]
    Ownership {
        /// Names the borrowed variable and the operation
        message: String,
    },

    /// Mono/non-mono mismatch between an argument and a parameter
    #[error("illegal mono usage: {message}")]
    IllegalMono {
        /// Names the argument and parameter
        message: String,
    },

    /// Time direction flipped while mono state was live
    #[error("changing direction of time whilst mono variable `{name}` is in scope")]
    DirectionChange {
        /// The live mono binding
        name: String,
    },

    /// A malformed call site (arity, placement)
    #[error("call error: {message}")]
    Call {
        /// Names the call and the mismatch
        message: String,
    },

    /// A sibling lane failed; this lane was torn down sympathetically
    #[error("parallel lane cancelled by a sibling failure")]
    Cancelled,

    /// Internal signal: a `catch` condition fired. Intercepted by the
    /// enclosing try block; reaching the driver means a stray `catch`.
    #[doc(hidden)]
    #[error("catch outside of a try block")]
    CatchSignal,

    /// Failure writing program output
    #[error("output error: {0}")]
    Io(String),
}

impl From<std::io::Error> for EvalError {
    fn from(err: std::io::Error) -> Self {
        EvalError::Io(err.to_string())
    }
}
