//! # Railway
//!
//! A tree-walking interpreter for the Railway reversible programming
//! language. Every legal program can be executed both forwards and
//! backwards deterministically: each statement carries enough information
//! to be replayed in either time direction, and the runtime assertions
//! (if/loop condition agreement, the unlet value match, the scope leak
//! check) are the invariants that make the reversal exact.
//!
//! ## Architecture
//!
//! - **Value model**: exact rationals and heterogeneous arrays, nothing
//!   else ([`value`])
//! - **Variable cells**: owning, indexable storage moved or shared
//!   between scopes ([`cell`], [`scope`])
//! - **Parser**: line-oriented, with the syntactic reversibility checks
//!   ([`lexer`], [`parser`])
//! - **Execution engine**: one recursive AST walker under a `backwards`
//!   flag ([`eval`])
//! - **Concurrency**: parallel calls over OS threads, named barriers and
//!   the directional mutex ([`sync`])
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//!
//! let source = "
//! func main()()
//!     let x = 6
//!     x += 5
//!     print (x)
//!     unlet x = 11
//! return ()
//! ";
//! let program = railway::parse_program(source).unwrap();
//!
//! let buffer: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
//! program.run_with_output(buffer.clone()).unwrap();
//! assert_eq!(&*buffer.lock(), b"11\n");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod cell;
pub mod context;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod ops;
pub mod parser;
pub mod program;
pub mod scope;
pub mod sync;
pub mod value;

pub use context::{EvalContext, Output};
pub use error::{EvalError, ParseError};
pub use parser::parse_program;
pub use program::Program;
pub use value::{Rational, Value};

/// Railway version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
