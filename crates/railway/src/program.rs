//! Program assembly: the function table, the global table, and the
//! `call main` entry point

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::ast::{CallStmt, Expr, Function};
use crate::cell::{Cell, CellRef};
use crate::context::{EvalContext, Output};
use crate::error::EvalError;
use crate::eval;
use crate::eval::expr::eval_expr;
use crate::scope::{Binding, Scope};
use crate::value::Value;

/// A `global` declaration, evaluated once before `main` runs.
#[derive(Debug)]
pub struct GlobalDecl {
    /// The global's name
    pub name: String,
    /// Its initialiser (defaults to `0` in the surface syntax)
    pub rhs: Expr,
}

/// A parsed program: functions plus global declarations.
#[derive(Debug)]
pub struct Program {
    /// The function table, in declaration order
    pub functions: IndexMap<String, Arc<Function>>,
    /// Global declarations, in declaration order
    pub globals: Vec<GlobalDecl>,
}

impl Program {
    /// Run `main` forwards, writing program output to stdout.
    pub fn run(&self) -> Result<(), EvalError> {
        self.run_with_output(Arc::new(Mutex::new(std::io::stdout())))
    }

    /// Run `main` forwards, writing program output to `output`.
    ///
    /// The driver scope carries an `argv` placeholder (an empty array);
    /// if `main` declares a single stolen parameter, the placeholder is
    /// passed to it.
    pub fn run_with_output(&self, output: Output) -> Result<(), EvalError> {
        let functions = Arc::new(self.functions.clone());
        let ctx = EvalContext::new(Arc::clone(&functions), output);
        let globals = self.eval_globals(&ctx)?;

        let main = functions
            .get("main")
            .or_else(|| functions.get(".main"))
            .cloned()
            .ok_or_else(|| EvalError::UndefinedFunction {
                name: "main".to_string(),
            })?;
        if !main.borrowed_params.is_empty() {
            return Err(EvalError::Call {
                message: format!("`{}` may not borrow parameters", main.name),
            });
        }
        if main.stolen_params.len() > 1 {
            return Err(EvalError::Call {
                message: format!("`{}` takes at most one stolen parameter", main.name),
            });
        }

        let mut driver = Scope::new("<driver>", globals);
        driver.bind(
            "argv",
            Binding::owned(Cell::shared(Value::Array(Vec::new())), false),
        )?;
        let stolen = if main.stolen_params.len() == 1 {
            vec!["argv".to_string()]
        } else {
            Vec::new()
        };
        let call = CallStmt {
            is_uncall: false,
            func: main.name.clone(),
            lanes: None,
            stolen,
            borrowed: Vec::new(),
            returns: main.return_params.clone(),
        };
        eval::call::exec(&call, &mut driver, &ctx, false)
    }

    /// Evaluate the global declarations in order. Later globals may read
    /// earlier ones; nothing may read a local (there are none yet).
    fn eval_globals(&self, ctx: &EvalContext) -> Result<Arc<IndexMap<String, CellRef>>, EvalError> {
        let mut globals: IndexMap<String, CellRef> = IndexMap::new();
        for decl in &self.globals {
            let scope = Scope::new("<globals>", Arc::new(globals.clone()));
            let value = eval_expr(&decl.rhs, &scope, ctx)?;
            globals.insert(decl.name.clone(), Cell::shared(value));
        }
        Ok(Arc::new(globals))
    }
}
