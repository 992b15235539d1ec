//! The Railway parser
//!
//! The parser consumes the token stream one logical line at a time and
//! builds the function table. Beyond shape-checking, it carries the first
//! line of defence for reversibility: the self-modification check on
//! modifications, the mono-taint discipline, the aliasing rules on
//! push/pop/swap, and the bracket rules on if/loop/try.

use std::collections::VecDeque;
use std::sync::Arc;

use indexmap::IndexMap;
use num_bigint::BigInt;

use crate::ast::{
    is_mono_name, Assignment, CallStmt, DoYieldUndo, Expr, ForStmt, Function, IfStmt, Lookup,
    LoopStmt, Modification, MoveStmt, MutexStmt, PrintItem, PrintStmt, PromoteStmt, Stmt,
    StmtKind, SwapStmt, TryStmt,
};
use crate::error::ParseError;
use crate::lexer::{tokenise, Token, TokenKind};
use crate::ops::{BinOp, ModOp, UnaryOp};
use crate::program::{GlobalDecl, Program};
use crate::value::Rational;

/// Words that may not be used as variable or function names.
const KEYWORDS: &[&str] = &[
    "func", "return", "undoreturn", "global", "let", "unlet", "if", "else", "fi", "loop", "pool",
    "for", "rof", "in", "to", "by", "tensor", "do", "yield", "undo", "try", "catch", "yrt", "call",
    "uncall", "push", "pop", "swap", "print", "promote", "barrier", "mutex", "xetum", "TID",
];

fn is_keyword(text: &str) -> bool {
    KEYWORDS.contains(&text)
}

/// Parse a complete source file into a program.
pub fn parse_program(src: &str) -> Result<Program, ParseError> {
    let tokens = tokenise(src)?;
    Parser::new(tokens).parse_module()
}

/// Parse a single expression, mostly useful in tests and the REPL-less
/// debugging paths.
pub fn parse_expression(src: &str) -> Result<Expr, ParseError> {
    let tokens = tokenise(src)?;
    let line: Vec<Token> = tokens
        .into_iter()
        .filter(|t| t.kind != TokenKind::Newline)
        .collect();
    parse_expr(&line, 1)
}

// ═══════════════════════════════════════════════════════════════════════
// Line cursor
// ═══════════════════════════════════════════════════════════════════════

/// A cursor over the tokens of one logical line.
struct Cursor<'a> {
    toks: &'a [Token],
    pos: usize,
    line: usize,
}

impl<'a> Cursor<'a> {
    fn new(toks: &'a [Token]) -> Self {
        let line = toks.first().map(|t| t.line).unwrap_or(0);
        Cursor { toks, pos: 0, line }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.toks.get(self.pos)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.toks.len()
    }

    fn rest(&self) -> &'a [Token] {
        &self.toks[self.pos..]
    }

    fn bump(&mut self) -> Result<&'a Token, ParseError> {
        let tok = self.toks.get(self.pos).ok_or(ParseError::UnexpectedEof {
            message: format!("line {} ends mid-statement", self.line),
        })?;
        self.pos += 1;
        Ok(tok)
    }

    fn expect(&mut self, text: &str) -> Result<&'a Token, ParseError> {
        let tok = self.bump()?;
        if tok.is(text) {
            Ok(tok)
        } else {
            Err(ParseError::malformed(
                &tok.text,
                tok.line,
                format!("expected `{}`", text),
            ))
        }
    }

    fn expect_name(&mut self) -> Result<String, ParseError> {
        let tok = self.bump()?;
        if tok.kind != TokenKind::Name || is_keyword(&tok.text) {
            return Err(ParseError::malformed(
                &tok.text,
                tok.line,
                "expected a name",
            ));
        }
        Ok(tok.text.clone())
    }

    fn expect_end(&self) -> Result<(), ParseError> {
        match self.peek() {
            None => Ok(()),
            Some(tok) => Err(ParseError::malformed(
                &tok.text,
                tok.line,
                "expected end of line",
            )),
        }
    }

    /// Consume a parenthesised token group, returning the tokens between
    /// the brackets.
    fn group(&mut self, open: &str, close: &str) -> Result<&'a [Token], ParseError> {
        self.expect(open)?;
        let start = self.pos;
        let mut depth = 1usize;
        while let Some(tok) = self.toks.get(self.pos) {
            if tok.is(open) {
                depth += 1;
            } else if tok.is(close) {
                depth -= 1;
                if depth == 0 {
                    let inner = &self.toks[start..self.pos];
                    self.pos += 1;
                    return Ok(inner);
                }
            }
            self.pos += 1;
        }
        Err(ParseError::UnexpectedEof {
            message: format!("unmatched `{}` on line {}", open, self.line),
        })
    }

    /// A comma-separated tuple of names in parentheses, e.g. `(a, b)`.
    fn name_tuple(&mut self) -> Result<Vec<String>, ParseError> {
        let mut names = Vec::new();
        self.expect("(")?;
        if self.peek().is_some_and(|t| t.is(")")) {
            self.pos += 1;
            return Ok(names);
        }
        loop {
            names.push(self.expect_name()?);
            let tok = self.bump()?;
            if tok.is(")") {
                return Ok(names);
            }
            if !tok.is(",") {
                return Err(ParseError::malformed(
                    &tok.text,
                    tok.line,
                    "expected `,` or `)`",
                ));
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// The parser proper
// ═══════════════════════════════════════════════════════════════════════

struct Parser {
    lines: VecDeque<Vec<Token>>,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        let mut lines = VecDeque::new();
        let mut current = Vec::new();
        for tok in tokens {
            if tok.kind == TokenKind::Newline {
                if !current.is_empty() {
                    lines.push_back(std::mem::take(&mut current));
                }
            } else {
                current.push(tok);
            }
        }
        if !current.is_empty() {
            lines.push_back(current);
        }
        Parser { lines }
    }

    fn peek_keyword(&self) -> Option<&str> {
        self.lines
            .front()
            .and_then(|line| line.first())
            .map(|t| t.text.as_str())
    }

    fn front_line_number(&self) -> usize {
        self.lines
            .front()
            .and_then(|line| line.first())
            .map(|t| t.line)
            .unwrap_or(0)
    }

    fn next_line(&mut self, context: &str) -> Result<Vec<Token>, ParseError> {
        self.lines.pop_front().ok_or(ParseError::UnexpectedEof {
            message: format!("input ended while parsing {}", context),
        })
    }

    /// Consume a line that must consist of the single keyword `kwd`.
    fn bare_line(&mut self, kwd: &str) -> Result<(), ParseError> {
        let line = self.next_line(kwd)?;
        let mut c = Cursor::new(&line);
        c.expect(kwd)?;
        c.expect_end()
    }

    // ───────────────────────── file level ─────────────────────────

    fn parse_module(mut self) -> Result<Program, ParseError> {
        let mut functions: IndexMap<String, Arc<Function>> = IndexMap::new();
        let mut globals: Vec<GlobalDecl> = Vec::new();
        while let Some(kwd) = self.peek_keyword() {
            match kwd {
                "func" => {
                    let func = self.parse_func()?;
                    if functions.contains_key(&func.name) {
                        return Err(ParseError::DuplicateDefinition { name: func.name });
                    }
                    functions.insert(func.name.clone(), Arc::new(func));
                }
                "global" => {
                    let decl = self.parse_global()?;
                    if globals.iter().any(|g| g.name == decl.name) {
                        return Err(ParseError::NameConflict {
                            message: format!("global `{}` declared twice", decl.name),
                        });
                    }
                    globals.push(decl);
                }
                other => {
                    let line_no = self.front_line_number();
                    return Err(ParseError::malformed(
                        other,
                        line_no,
                        "expected `func` or `global` at file level",
                    ));
                }
            }
        }
        Ok(Program { functions, globals })
    }

    fn parse_global(&mut self) -> Result<GlobalDecl, ParseError> {
        let line = self.next_line("a global declaration")?;
        let mut c = Cursor::new(&line);
        c.expect("global")?;
        let name = c.expect_name()?;
        if is_mono_name(&name) {
            return Err(ParseError::IllegalMono {
                message: format!("global variable `{}` cannot be mono", name),
            });
        }
        let rhs = if c.at_end() {
            Expr::Number(Rational::from_integer(BigInt::from(0)))
        } else {
            c.expect("=")?;
            parse_expr(c.rest(), c.line)?
        };
        if rhs.uses_name(&name) {
            return Err(ParseError::CircularDefinition { name });
        }
        if rhs.has_mono() {
            return Err(ParseError::IllegalMono {
                message: format!("global `{}` initialised with mono information", name),
            });
        }
        Ok(GlobalDecl { name, rhs })
    }

    fn parse_func(&mut self) -> Result<Function, ParseError> {
        let line = self.next_line("a function header")?;
        let mut c = Cursor::new(&line);
        c.expect("func")?;
        let name = c.expect_name()?;
        let borrowed_params = c.name_tuple()?;
        let stolen_params = c.name_tuple()?;
        c.expect_end()?;

        let body = self.parse_body(&["return", "undoreturn"], &name)?;

        let ret_line = self.next_line("a return line")?;
        let mut rc = Cursor::new(&ret_line);
        let undoreturn = rc.bump()?.is("undoreturn");
        let return_params = rc.name_tuple()?;
        rc.expect_end()?;

        check_unique(
            borrowed_params.iter().chain(&stolen_params),
            &format!("the signature of function `{}`", name),
        )?;
        check_unique(
            return_params.iter(),
            &format!("the return list of function `{}`", name),
        )?;

        let mod_reverse = body.iter().any(|s| s.mod_reverse);
        if is_mono_name(&name) && mod_reverse {
            return Err(ParseError::IllegalMono {
                message: format!(
                    "function `{}` is marked mono but modifies non-mono variables",
                    name
                ),
            });
        }
        if !is_mono_name(&name) && !mod_reverse {
            return Err(ParseError::ExpectedMono {
                message: format!(
                    "function `{}` modifies no non-mono variables, so should be marked mono",
                    name
                ),
            });
        }

        Ok(Function {
            name,
            borrowed_params,
            stolen_params,
            body,
            return_params,
            undoreturn,
        })
    }

    // ───────────────────────── statements ─────────────────────────

    fn parse_body(&mut self, terminators: &[&str], context: &str) -> Result<Vec<Stmt>, ParseError> {
        let mut stmts = Vec::new();
        loop {
            let Some(kwd) = self.peek_keyword() else {
                return Err(ParseError::UnexpectedEof {
                    message: format!(
                        "input ended inside `{}` (expected one of {})",
                        context,
                        terminators.join("/")
                    ),
                });
            };
            if terminators.contains(&kwd) {
                return Ok(stmts);
            }
            stmts.push(self.parse_statement()?);
        }
    }

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        let kwd = self.peek_keyword().ok_or(ParseError::UnexpectedEof {
            message: "expected a statement".to_string(),
        })?;
        match kwd {
            "let" | "unlet" => self.parse_let_unlet(),
            "swap" => self.parse_swap(),
            "push" | "pop" => self.parse_push_pop(),
            "promote" => self.parse_promote(),
            "if" => self.parse_if(),
            "loop" => self.parse_loop(),
            "for" => self.parse_for(),
            "do" => self.parse_do(),
            "try" => self.parse_try(),
            "catch" => self.parse_catch(),
            "print" => self.parse_print(),
            "barrier" => self.parse_barrier(),
            "mutex" => self.parse_mutex(),
            "call" | "uncall" | "(" => self.parse_call(),
            "else" | "fi" | "pool" | "rof" | "yield" | "undo" | "yrt" | "xetum" | "return"
            | "undoreturn" | "func" | "global" => {
                let line_no = self.front_line_number();
                Err(ParseError::malformed(
                    kwd,
                    line_no,
                    "reached an unexpected keyword",
                ))
            }
            _ => self.parse_modification(),
        }
    }

    fn parse_let_unlet(&mut self) -> Result<Stmt, ParseError> {
        let line = self.next_line("a let/unlet statement")?;
        let mut c = Cursor::new(&line);
        let is_let = c.bump()?.is("let");
        let name = c.expect_name()?;
        let rhs = if c.at_end() {
            Expr::Number(Rational::from_integer(BigInt::from(0)))
        } else {
            c.expect("=")?;
            parse_expr(c.rest(), c.line)?
        };

        let mononame = is_mono_name(&name);
        let is_mono = mononame || rhs.has_mono();
        if is_mono && !mononame {
            return Err(ParseError::IllegalMono {
                message: format!(
                    "{} non-mono `{}` using mono information",
                    if is_let { "letting" } else { "unletting" },
                    name
                ),
            });
        }
        if rhs.uses_name(&name) {
            return Err(ParseError::CircularDefinition { name });
        }
        let assignment = Assignment {
            lookup: Lookup::bare(name),
            rhs,
        };
        Ok(Stmt {
            kind: if is_let {
                StmtKind::Let(assignment)
            } else {
                StmtKind::Unlet(assignment)
            },
            is_mono,
            mod_reverse: !mononame,
        })
    }

    fn parse_modification(&mut self) -> Result<Stmt, ParseError> {
        let line = self.next_line("a modification statement")?;
        let split = find_sym_at_depth0(&line, |text| ModOp::from_symbol(text).is_some())
            .map(|idx| (idx, ModOp::from_symbol(&line[idx].text)));
        let Some((op_idx, Some(op))) = split else {
            let tok = &line[0];
            return Err(ParseError::malformed(
                &tok.text,
                tok.line,
                "expected a statement",
            ));
        };
        let op_tok = &line[op_idx];
        let lhs_toks = &line[..op_idx];
        let rhs_toks = &line[op_idx + 1..];
        if lhs_toks.is_empty() || rhs_toks.is_empty() {
            return Err(ParseError::malformed(
                &op_tok.text,
                op_tok.line,
                "modification needs a target and a right-hand side",
            ));
        }

        let lhs = parse_lookup(lhs_toks)?;

        // The syntactic self-modification check runs over the raw token
        // sequence, index expressions included. Conservative by design.
        if rhs_toks
            .iter()
            .any(|t| t.kind == TokenKind::Name && t.text == lhs.name)
        {
            return Err(ParseError::SelfModification {
                message: format!(
                    "`{}` appears on both sides of `{}`",
                    lhs.name,
                    op.symbol()
                ),
            });
        }
        if lhs.index.iter().any(|e| e.uses_name(&lhs.name)) {
            return Err(ParseError::SelfModification {
                message: format!("using `{}` to index itself", lhs.name),
            });
        }

        let expr = parse_expr(rhs_toks, op_tok.line)?;
        let is_mono = lhs.has_mono() || expr.has_mono();
        if !is_mono && op.inverse().is_none() {
            return Err(ParseError::NonInvertibleModification {
                op: op.symbol().to_string(),
                name: lhs.name.clone(),
            });
        }
        let mod_reverse = !lhs.is_mono_name();
        if is_mono && mod_reverse {
            return Err(ParseError::IllegalMono {
                message: format!(
                    "modifying non-mono variable `{}` using mono information",
                    lhs.name
                ),
            });
        }
        Ok(Stmt {
            kind: StmtKind::Modification(Modification { lookup: lhs, op, expr }),
            is_mono,
            mod_reverse,
        })
    }

    fn parse_swap(&mut self) -> Result<Stmt, ParseError> {
        let line = self.next_line("a swap statement")?;
        let mut c = Cursor::new(&line);
        c.expect("swap")?;
        let rest = c.rest();
        let Some(arrow) = find_sym_at_depth0(rest, |t| t == "<=>") else {
            let tok = &line[0];
            return Err(ParseError::malformed(
                &tok.text,
                tok.line,
                "expected `<=>` in swap",
            ));
        };
        let lhs = parse_lookup(&rest[..arrow])?;
        let rhs = parse_lookup(&rest[arrow + 1..])?;

        let is_mono = lhs.has_mono() || rhs.has_mono();
        let mod_reverse = !(lhs.is_mono_name() && rhs.is_mono_name());
        if is_mono && mod_reverse {
            return Err(ParseError::IllegalMono {
                message: format!("using mono information to swap non-mono `{} <=> {}`", lhs, rhs),
            });
        }
        if lhs.index.iter().any(|e| e.uses_name(&rhs.name))
            || rhs.index.iter().any(|e| e.uses_name(&lhs.name))
        {
            return Err(ParseError::SelfModification {
                message: format!(
                    "swap uses information from one side as an index on the other: `{} <=> {}`",
                    lhs, rhs
                ),
            });
        }
        Ok(Stmt {
            kind: StmtKind::Swap(SwapStmt { lhs, rhs }),
            is_mono,
            mod_reverse,
        })
    }

    fn parse_push_pop(&mut self) -> Result<Stmt, ParseError> {
        let line = self.next_line("a push/pop statement")?;
        let mut c = Cursor::new(&line);
        let is_push = c.bump()?.is("push");
        let rest = c.rest();
        let Some(arrow) = find_sym_at_depth0(rest, |t| t == "=>") else {
            let tok = &line[0];
            return Err(ParseError::malformed(
                &tok.text,
                tok.line,
                "expected `=>`",
            ));
        };
        let src = parse_lookup(&rest[..arrow])?;
        let dst = parse_lookup(&rest[arrow + 1..])?;
        let is_mono = src.has_mono() || dst.has_mono();
        let mod_reverse = !src.is_mono_name() || !dst.is_mono_name();

        if is_push {
            if !src.index.is_empty() {
                return Err(ParseError::Aliasing {
                    message: format!(
                        "pushing an element of array `{}` would cause aliasing",
                        src.name
                    ),
                });
            }
            if !dst.is_mono_name()
                && (src.uses_name(&dst.name)
                    || dst.index.iter().any(|e| e.uses_name(&dst.name)))
            {
                return Err(ParseError::SelfModification {
                    message: format!("push modifies variable `{}` using itself", dst.name),
                });
            }
            if !src.is_mono_name() && dst.index.iter().any(|e| e.uses_name(&src.name)) {
                return Err(ParseError::SelfModification {
                    message: format!(
                        "push source `{}` is used in the destination `{}`",
                        src.name, dst
                    ),
                });
            }
            if is_mono && !dst.is_mono_name() {
                return Err(ParseError::IllegalMono {
                    message: format!("pushing onto non-mono `{}` using mono information", dst.name),
                });
            }
            if is_mono && !src.is_mono_name() {
                return Err(ParseError::IllegalMono {
                    message: format!("pushing non-mono `{}` using mono information", src.name),
                });
            }
        } else {
            if !dst.index.is_empty() {
                return Err(ParseError::Aliasing {
                    message: format!("pop destination `{}` should be a bare name", dst),
                });
            }
            if src.index.iter().any(|e| e.uses_name(&src.name)) {
                return Err(ParseError::SelfModification {
                    message: format!("pop modifies variable `{}` using itself", src.name),
                });
            }
            if is_mono && !dst.is_mono_name() {
                return Err(ParseError::IllegalMono {
                    message: format!("pop creates non-mono `{}` using mono information", dst.name),
                });
            }
            if is_mono && !src.is_mono_name() {
                return Err(ParseError::IllegalMono {
                    message: format!("pop modifies non-mono `{}` using mono information", src.name),
                });
            }
        }

        Ok(Stmt {
            kind: if is_push {
                StmtKind::Push(MoveStmt { src, dst })
            } else {
                StmtKind::Pop(MoveStmt { src, dst })
            },
            is_mono,
            mod_reverse,
        })
    }

    fn parse_promote(&mut self) -> Result<Stmt, ParseError> {
        let line = self.next_line("a promote statement")?;
        let mut c = Cursor::new(&line);
        c.expect("promote")?;
        let src = c.expect_name()?;
        c.expect("=>")?;
        let dst = c.expect_name()?;
        c.expect_end()?;
        if !is_mono_name(&src) {
            return Err(ParseError::ExpectedMono {
                message: format!("promoting non-mono variable `{}`", src),
            });
        }
        if is_mono_name(&dst) {
            return Err(ParseError::IllegalMono {
                message: format!("promoting to mono variable `{}`", dst),
            });
        }
        Ok(Stmt {
            kind: StmtKind::Promote(PromoteStmt { src, dst }),
            is_mono: false,
            mod_reverse: true,
        })
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        let head = self.next_line("an if statement")?;
        let mut c = Cursor::new(&head);
        c.expect("if")?;
        let enter_toks = c.group("(", ")")?;
        c.expect_end()?;
        let enter = parse_expr(enter_toks, c.line)?;

        let then_body = self.parse_body(&["else", "fi"], "if")?;
        let else_body = if self.peek_keyword() == Some("else") {
            self.bare_line("else")?;
            self.parse_body(&["fi"], "else")?
        } else {
            Vec::new()
        };

        let fi_line = self.next_line("a fi line")?;
        let mut fc = Cursor::new(&fi_line);
        fc.expect("fi")?;
        let exit_toks = fc.group("(", ")")?;
        fc.expect_end()?;
        let explicit_exit = !exit_toks.is_empty();
        let exit = if explicit_exit {
            parse_expr(exit_toks, fc.line)?
        } else {
            enter.clone()
        };

        let is_mono = enter.has_mono() || exit.has_mono();
        if is_mono && explicit_exit {
            return Err(ParseError::IllegalMono {
                message: "a mono-directional if-statement may not carry a reverse condition"
                    .to_string(),
            });
        }
        let mod_reverse = then_body.iter().chain(&else_body).any(|s| s.mod_reverse);
        if is_mono && mod_reverse {
            return Err(ParseError::IllegalMono {
                message: "branch condition uses mono information but the branch affects non-mono \
                          variables"
                    .to_string(),
            });
        }
        Ok(Stmt {
            kind: StmtKind::If(IfStmt {
                enter,
                then_body,
                else_body,
                exit,
                mono: is_mono,
                mod_reverse,
            }),
            is_mono,
            mod_reverse,
        })
    }

    fn parse_loop(&mut self) -> Result<Stmt, ParseError> {
        let head = self.next_line("a loop statement")?;
        let mut c = Cursor::new(&head);
        c.expect("loop")?;
        let fwd_toks = c.group("(", ")")?;
        c.expect_end()?;
        let forward = parse_expr(fwd_toks, c.line)?;

        let body = self.parse_body(&["pool"], "loop")?;

        let pool_line = self.next_line("a pool line")?;
        let mut pc = Cursor::new(&pool_line);
        pc.expect("pool")?;
        let back_toks = pc.group("(", ")")?;
        pc.expect_end()?;
        let backward = if back_toks.is_empty() {
            None
        } else {
            Some(parse_expr(back_toks, pc.line)?)
        };

        let is_mono =
            forward.has_mono() || backward.as_ref().is_some_and(|b| b.has_mono());
        if is_mono == backward.is_some() {
            return Err(ParseError::malformed(
                "pool",
                pc.line,
                "a loop takes a reverse condition if and only if it is bi-directional",
            ));
        }
        let mod_reverse = body.iter().any(|s| s.mod_reverse);
        if is_mono && mod_reverse {
            return Err(ParseError::IllegalMono {
                message: "loop condition uses mono information and the body modifies non-mono \
                          variables"
                    .to_string(),
            });
        }
        Ok(Stmt {
            kind: StmtKind::Loop(LoopStmt {
                forward,
                body,
                backward,
                mono: is_mono,
                mod_reverse,
            }),
            is_mono,
            mod_reverse,
        })
    }

    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        let head = self.next_line("a for statement")?;
        let mut c = Cursor::new(&head);
        c.expect("for")?;
        let group = c.group("(", ")")?;
        c.expect_end()?;
        let mut gc = Cursor::new(group);
        let name = gc.expect_name()?;
        gc.expect("in")?;
        let iterator = parse_expr(gc.rest(), gc.line)?;

        let body = self.parse_body(&["rof"], "for")?;
        self.bare_line("rof")?;

        if iterator.has_mono() && !is_mono_name(&name) {
            return Err(ParseError::IllegalMono {
                message: format!(
                    "for loop uses non-mono name `{}` for elements of a mono iterator",
                    name
                ),
            });
        }
        let is_mono = iterator.has_mono();
        let mod_reverse = body.iter().any(|s| s.mod_reverse);
        if is_mono && mod_reverse {
            return Err(ParseError::IllegalMono {
                message: "for loop is mono-directional but modifies non-mono variables".to_string(),
            });
        }
        Ok(Stmt {
            kind: StmtKind::For(ForStmt {
                name,
                iterator,
                body,
            }),
            is_mono,
            mod_reverse,
        })
    }

    fn parse_do(&mut self) -> Result<Stmt, ParseError> {
        self.bare_line("do")?;
        let do_body = self.parse_body(&["yield", "undo"], "do")?;
        let yield_body = if self.peek_keyword() == Some("yield") {
            self.bare_line("yield")?;
            self.parse_body(&["undo"], "yield")?
        } else {
            Vec::new()
        };
        self.bare_line("undo")?;
        let mod_reverse = do_body.iter().chain(&yield_body).any(|s| s.mod_reverse);
        Ok(Stmt {
            kind: StmtKind::DoYieldUndo(DoYieldUndo {
                do_body,
                yield_body,
            }),
            is_mono: false,
            mod_reverse,
        })
    }

    fn parse_try(&mut self) -> Result<Stmt, ParseError> {
        let head = self.next_line("a try statement")?;
        let mut c = Cursor::new(&head);
        c.expect("try")?;
        let group = c.group("(", ")")?;
        c.expect_end()?;
        let mut gc = Cursor::new(group);
        let name = gc.expect_name()?;
        gc.expect("in")?;
        let iterator = parse_expr(gc.rest(), gc.line)?;

        if is_mono_name(&name) {
            return Err(ParseError::IllegalMono {
                message: format!("try statement assigns to mono name `{}`", name),
            });
        }
        if iterator.has_mono() {
            return Err(ParseError::IllegalMono {
                message: "try statement has mono-directional information in its iterator"
                    .to_string(),
            });
        }

        let body = self.parse_body(&["yrt"], "try")?;
        self.bare_line("yrt")?;
        Ok(Stmt {
            kind: StmtKind::Try(TryStmt {
                name,
                iterator,
                body,
            }),
            is_mono: false,
            mod_reverse: true,
        })
    }

    fn parse_catch(&mut self) -> Result<Stmt, ParseError> {
        let line = self.next_line("a catch statement")?;
        let mut c = Cursor::new(&line);
        c.expect("catch")?;
        let group = c.group("(", ")")?;
        c.expect_end()?;
        let cond = parse_expr(group, c.line)?;
        Ok(Stmt {
            kind: StmtKind::Catch(cond),
            is_mono: true,
            mod_reverse: false,
        })
    }

    fn parse_print(&mut self) -> Result<Stmt, ParseError> {
        let line = self.next_line("a print statement")?;
        let mut c = Cursor::new(&line);
        c.expect("print")?;
        let group = c.group("(", ")")?;
        c.expect_end()?;

        let mut items = Vec::new();
        if !group.is_empty() {
            for part in split_at_depth0(group, ",") {
                if part.len() == 1 && part[0].kind == TokenKind::Str {
                    items.push(PrintItem::Text(part[0].text.clone()));
                } else {
                    items.push(PrintItem::Expr(parse_expr(part, c.line)?));
                }
            }
        }
        let is_mono = items.iter().any(|item| match item {
            PrintItem::Text(_) => false,
            PrintItem::Expr(e) => e.has_mono(),
        });
        Ok(Stmt {
            kind: StmtKind::Print(PrintStmt { items }),
            is_mono,
            mod_reverse: false,
        })
    }

    fn parse_barrier(&mut self) -> Result<Stmt, ParseError> {
        let line = self.next_line("a barrier statement")?;
        let mut c = Cursor::new(&line);
        c.expect("barrier")?;
        let tok = c.bump()?;
        if tok.kind != TokenKind::Str {
            return Err(ParseError::malformed(
                &tok.text,
                tok.line,
                "expected a string barrier name",
            ));
        }
        c.expect_end()?;
        Ok(Stmt {
            kind: StmtKind::Barrier(tok.text.clone()),
            is_mono: false,
            mod_reverse: false,
        })
    }

    fn parse_mutex(&mut self) -> Result<Stmt, ParseError> {
        let line = self.next_line("a mutex statement")?;
        let mut c = Cursor::new(&line);
        c.expect("mutex")?;
        let tok = c.bump()?;
        if tok.kind != TokenKind::Str {
            return Err(ParseError::malformed(
                &tok.text,
                tok.line,
                "expected a string mutex name",
            ));
        }
        c.expect_end()?;
        let name = tok.text.clone();
        let body = self.parse_body(&["xetum"], "mutex")?;
        self.bare_line("xetum")?;
        Ok(Stmt {
            kind: StmtKind::Mutex(MutexStmt { name, body }),
            is_mono: false,
            mod_reverse: true,
        })
    }

    fn parse_call(&mut self) -> Result<Stmt, ParseError> {
        let line = self.next_line("a call statement")?;
        let mut c = Cursor::new(&line);

        let stolen = if c.peek().is_some_and(|t| t.is("(")) {
            let names = c.name_tuple()?;
            c.expect("=>")?;
            names
        } else {
            Vec::new()
        };

        let kw = c.bump()?;
        let is_uncall = match kw.text.as_str() {
            "call" => false,
            "uncall" => true,
            _ => {
                return Err(ParseError::malformed(
                    &kw.text,
                    kw.line,
                    "expected `call` or `uncall`",
                ));
            }
        };
        let func = c.expect_name()?;

        let lanes = if c.peek().is_some_and(|t| t.is("{")) {
            let group = c.group("{", "}")?;
            Some(parse_expr(group, c.line)?)
        } else {
            None
        };

        let borrowed = c.name_tuple()?;

        let returns = if c.at_end() {
            Vec::new()
        } else {
            c.expect("=>")?;
            c.name_tuple()?
        };
        c.expect_end()?;

        check_unique(
            borrowed.iter(),
            &format!("the borrowed arguments of a call to `{}`", func),
        )?;
        check_unique(
            stolen.iter(),
            &format!("the stolen arguments of a call to `{}`", func),
        )?;
        check_unique(
            returns.iter(),
            &format!("the results of a call to `{}`", func),
        )?;

        let mod_reverse = !is_mono_name(&func);
        Ok(Stmt {
            kind: StmtKind::Call(CallStmt {
                is_uncall,
                func,
                lanes,
                stolen,
                borrowed,
                returns,
            }),
            is_mono: !mod_reverse,
            mod_reverse,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Token-slice helpers
// ═══════════════════════════════════════════════════════════════════════

fn depth_delta(tok: &Token) -> i32 {
    if tok.is("(") || tok.is("[") || tok.is("{") {
        1
    } else if tok.is(")") || tok.is("]") || tok.is("}") {
        -1
    } else {
        0
    }
}

/// Index of the first symbol at bracket depth 0 satisfying `pred`.
fn find_sym_at_depth0(toks: &[Token], pred: impl Fn(&str) -> bool) -> Option<usize> {
    let mut depth = 0i32;
    for (i, tok) in toks.iter().enumerate() {
        if depth == 0 && tok.kind == TokenKind::Sym && pred(&tok.text) {
            return Some(i);
        }
        depth += depth_delta(tok);
    }
    None
}

/// Split a token slice on a separator symbol at bracket depth 0.
fn split_at_depth0<'a>(toks: &'a [Token], sep: &str) -> Vec<&'a [Token]> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, tok) in toks.iter().enumerate() {
        if depth == 0 && tok.is(sep) {
            parts.push(&toks[start..i]);
            start = i + 1;
        }
        depth += depth_delta(tok);
    }
    parts.push(&toks[start..]);
    parts
}

/// Parse `name[idx]…` from a complete token slice.
fn parse_lookup(toks: &[Token]) -> Result<Lookup, ParseError> {
    let mut c = Cursor::new(toks);
    let name = c.expect_name()?;
    let mut index = Vec::new();
    while c.peek().is_some_and(|t| t.is("[")) {
        let group = c.group("[", "]")?;
        index.push(parse_expr(group, c.line)?);
    }
    c.expect_end()?;
    Ok(Lookup { name, index })
}

fn check_unique<'a>(
    names: impl Iterator<Item = &'a String>,
    context: &str,
) -> Result<(), ParseError> {
    let mut seen = std::collections::HashSet::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(ParseError::NameConflict {
                message: format!("`{}` appears twice in {}", name, context),
            });
        }
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
// Expressions
// ═══════════════════════════════════════════════════════════════════════

/// Parse an infix expression from a token slice.
///
/// Operands and binary operators are collected in alternation at bracket
/// depth 0, with leading unary prefixes per operand and sub-brackets
/// parsed recursively, then folded by precedence climbing. The resulting
/// tree is left-associative at equal precedence.
pub fn parse_expr(toks: &[Token], line: usize) -> Result<Expr, ParseError> {
    if toks.is_empty() {
        return Err(ParseError::UnexpectedEof {
            message: format!("empty expression on line {}", line),
        });
    }
    let mut c = Cursor::new(toks);
    let first = parse_operand(&mut c)?;
    let mut rest: Vec<(BinOp, Expr)> = Vec::new();
    while !c.at_end() {
        let tok = c.bump()?;
        let op = if tok.kind == TokenKind::Sym {
            BinOp::from_symbol(&tok.text)
        } else {
            None
        };
        let Some(op) = op else {
            return Err(ParseError::malformed(
                &tok.text,
                tok.line,
                "expected a binary operator",
            ));
        };
        if c.at_end() {
            return Err(ParseError::malformed(
                &tok.text,
                tok.line,
                "expected an operand after the operator",
            ));
        }
        rest.push((op, parse_operand(&mut c)?));
    }
    let mut it = rest.into_iter().peekable();
    Ok(climb(first, &mut it, u8::MAX))
}

/// Fold a flat operand/operator sequence into a tree. `limit` is the
/// loosest precedence this level may absorb; strictly tighter operators
/// bind into the right-hand side, so equal precedence associates left.
fn climb(
    mut lhs: Expr,
    it: &mut std::iter::Peekable<std::vec::IntoIter<(BinOp, Expr)>>,
    limit: u8,
) -> Expr {
    while let Some((op, _)) = it.peek() {
        if op.precedence() > limit {
            break;
        }
        let Some((op, mut rhs)) = it.next() else {
            break;
        };
        while let Some((next, _)) = it.peek() {
            if next.precedence() < op.precedence() {
                rhs = climb(rhs, it, op.precedence() - 1);
            } else {
                break;
            }
        }
        lhs = Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        };
    }
    lhs
}

/// One operand: unary prefixes, then an atom, then index suffixes.
fn parse_operand(c: &mut Cursor<'_>) -> Result<Expr, ParseError> {
    let mut prefixes = Vec::new();
    while let Some(tok) = c.peek() {
        if tok.is("-") {
            prefixes.push(UnaryOp::Neg);
        } else if tok.is("!") {
            prefixes.push(UnaryOp::Not);
        } else {
            break;
        }
        c.pos += 1;
    }

    let tok = c.bump()?;
    let atom = match (tok.kind, tok.text.as_str()) {
        (TokenKind::Sym, "(") => {
            c.pos -= 1;
            let group = c.group("(", ")")?;
            parse_expr(group, tok.line)?
        }
        (TokenKind::Sym, "[") => {
            c.pos -= 1;
            let group = c.group("[", "]")?;
            parse_bracket(group, tok.line)?
        }
        (TokenKind::Number, _) => Expr::Number(parse_number(tok)?),
        (TokenKind::Sym, "#") => {
            let name = c.bump()?;
            if name.kind != TokenKind::Name {
                return Err(ParseError::malformed(
                    &name.text,
                    name.line,
                    "expected a name after `#`",
                ));
            }
            if name.text == "TID" {
                Expr::NumThreads
            } else {
                Expr::Length(name.text.clone())
            }
        }
        (TokenKind::Name, "TID") => Expr::ThreadId,
        (TokenKind::Name, text) if !is_keyword(text) => {
            let mut lookup = Lookup::bare(text);
            while c.peek().is_some_and(|t| t.is("[")) {
                let group = c.group("[", "]")?;
                lookup.index.push(parse_expr(group, tok.line)?);
            }
            Expr::Lookup(lookup)
        }
        _ => {
            return Err(ParseError::malformed(
                &tok.text,
                tok.line,
                "expected an operand",
            ));
        }
    };

    Ok(prefixes
        .into_iter()
        .rev()
        .fold(atom, |expr, op| Expr::Unary {
            op,
            expr: Box::new(expr),
        }))
}

/// The inside of a `[…]` operand: array literal, range, or tensor.
fn parse_bracket(toks: &[Token], line: usize) -> Result<Expr, ParseError> {
    if let Some(idx) = find_name_at_depth0(toks, "tensor") {
        let fill = parse_expr(&toks[..idx], line)?;
        let dims = parse_expr(&toks[idx + 1..], line)?;
        return Ok(Expr::ArrayTensor {
            fill: Box::new(fill),
            dims: Box::new(dims),
        });
    }
    if let Some(idx) = find_name_at_depth0(toks, "to") {
        let start = parse_expr(&toks[..idx], line)?;
        let after = &toks[idx + 1..];
        let (stop, step) = match find_name_at_depth0(after, "by") {
            Some(by) => (
                parse_expr(&after[..by], line)?,
                Some(Box::new(parse_expr(&after[by + 1..], line)?)),
            ),
            None => (parse_expr(after, line)?, None),
        };
        return Ok(Expr::ArrayRange {
            start: Box::new(start),
            stop: Box::new(stop),
            step,
        });
    }
    if toks.is_empty() {
        return Ok(Expr::ArrayLiteral(Vec::new()));
    }
    let mut items = Vec::new();
    for part in split_at_depth0(toks, ",") {
        items.push(parse_expr(part, line)?);
    }
    Ok(Expr::ArrayLiteral(items))
}

fn find_name_at_depth0(toks: &[Token], name: &str) -> Option<usize> {
    let mut depth = 0i32;
    for (i, tok) in toks.iter().enumerate() {
        if depth == 0 && tok.kind == TokenKind::Name && tok.text == name {
            return Some(i);
        }
        depth += depth_delta(tok);
    }
    None
}

/// Numeric literals match `\d+(/\d+)?`; the fraction is reduced here.
fn parse_number(tok: &Token) -> Result<Rational, ParseError> {
    let bad = || ParseError::malformed(&tok.text, tok.line, "malformed number literal");
    match tok.text.split_once('/') {
        None => {
            let n: BigInt = tok.text.parse().map_err(|_| bad())?;
            Ok(Rational::from_integer(n))
        }
        Some((numer, denom)) => {
            let n: BigInt = numer.parse().map_err(|_| bad())?;
            let d: BigInt = denom.parse().map_err(|_| bad())?;
            if d == BigInt::from(0) {
                return Err(ParseError::malformed(
                    &tok.text,
                    tok.line,
                    "zero denominator in number literal",
                ));
            }
            Ok(Rational::new(n, d))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(src: &str) -> String {
        parse_expression(src).unwrap().to_string()
    }

    #[test]
    fn left_associative_at_equal_precedence() {
        assert_eq!(shape("2 - 3 - 4"), "((2 - 3) - 4)");
        assert_eq!(shape("2 ** 3 ** 2"), "((2 ** 3) ** 2)");
        assert_eq!(shape("16 / 4 / 2"), "((16 / 4) / 2)");
    }

    #[test]
    fn precedence_shapes() {
        assert_eq!(shape("2 - 3 * 4"), "(2 - (3 * 4))");
        assert_eq!(shape("2 * 3 - 4"), "((2 * 3) - 4)");
        assert_eq!(shape("1 + 2 < 3 * 4"), "((1 + 2) < (3 * 4))");
        assert_eq!(shape("a & b = c"), "(a & (b = c))");
        assert_eq!(shape("2 * 3 ** 2 + 1"), "((2 * (3 ** 2)) + 1)");
    }

    #[test]
    fn parens_override_precedence() {
        assert_eq!(shape("(2 - 3) * 4"), "((2 - 3) * 4)");
        assert_eq!(shape("2 * (3 + 4)"), "(2 * (3 + 4))");
    }

    #[test]
    fn unary_binds_tighter_than_binops() {
        assert_eq!(shape("-x ** 2"), "(-x ** 2)");
        assert_eq!(shape("!a & b"), "(!a & b)");
        assert_eq!(shape("- - 3"), "--3");
    }

    #[test]
    fn lookups_ranges_and_tensors() {
        assert_eq!(shape("a[i][j + 1]"), "a[i][(j + 1)]");
        assert_eq!(shape("[1, 2, x]"), "[1, 2, x]");
        assert_eq!(shape("[0 to n by 2]"), "[0 to n by 2]");
        assert_eq!(shape("[0 tensor [2, 3]]"), "[0 tensor [2, 3]]");
        assert_eq!(shape("#arr + #TID + TID"), "((#arr + #TID) + TID)");
    }

    #[test]
    fn malformed_expressions_are_rejected() {
        assert!(parse_expression("1 +").is_err());
        assert!(parse_expression("* 2").is_err());
        assert!(parse_expression("(1 + 2").is_err());
        assert!(parse_expression("1 2").is_err());
    }
}
