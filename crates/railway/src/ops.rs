//! Operator tables: pure functions over rationals, plus the inverse
//! mapping used when modifications run backwards

use num_traits::{One, Pow, ToPrimitive, Zero};

use crate::error::EvalError;
use crate::value::Rational;

fn truthy(n: &Rational) -> bool {
    !n.is_zero()
}

fn from_bool(b: bool) -> Rational {
    if b {
        Rational::one()
    } else {
        Rational::zero()
    }
}

fn floor_div(a: &Rational, b: &Rational) -> Result<Rational, EvalError> {
    if b.is_zero() {
        return Err(EvalError::DivisionByZero);
    }
    Ok((a / b).floor())
}

fn pow(a: &Rational, b: &Rational) -> Result<Rational, EvalError> {
    if !b.is_integer() {
        return Err(EvalError::Value {
            message: format!("exponent {} is not an integer", b),
        });
    }
    let exponent = b.to_integer().to_i32().ok_or_else(|| EvalError::Value {
        message: "exponent out of range".to_string(),
    })?;
    if exponent < 0 && a.is_zero() {
        return Err(EvalError::DivisionByZero);
    }
    Ok(a.clone().pow(exponent))
}

// ═══════════════════════════════════════════════════════════════════════
// Binary operators
// ═══════════════════════════════════════════════════════════════════════

/// A binary operator usable in expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    /// `**`
    Pow,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `//` (floored)
    IntDiv,
    /// `%` (sign follows the divisor)
    Mod,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `<`
    Less,
    /// `<=`
    Leq,
    /// `>`
    Great,
    /// `>=`
    Geq,
    /// `=`
    Eq,
    /// `!=`
    Neq,
    /// `^` on truthiness
    Xor,
    /// `|` on truthiness
    Or,
    /// `&` on truthiness
    And,
}

impl BinOp {
    /// Map an operator token to its table entry.
    pub fn from_symbol(sym: &str) -> Option<BinOp> {
        Some(match sym {
            "**" => BinOp::Pow,
            "*" => BinOp::Mul,
            "/" => BinOp::Div,
            "//" => BinOp::IntDiv,
            "%" => BinOp::Mod,
            "+" => BinOp::Add,
            "-" => BinOp::Sub,
            "<" => BinOp::Less,
            "<=" => BinOp::Leq,
            ">" => BinOp::Great,
            ">=" => BinOp::Geq,
            "=" | "==" => BinOp::Eq,
            "!=" => BinOp::Neq,
            "^" => BinOp::Xor,
            "|" => BinOp::Or,
            "&" => BinOp::And,
            _ => return None,
        })
    }

    /// The surface symbol, for diagnostics.
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Pow => "**",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::IntDiv => "//",
            BinOp::Mod => "%",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Less => "<",
            BinOp::Leq => "<=",
            BinOp::Great => ">",
            BinOp::Geq => ">=",
            BinOp::Eq => "=",
            BinOp::Neq => "!=",
            BinOp::Xor => "^",
            BinOp::Or => "|",
            BinOp::And => "&",
        }
    }

    /// Binding tightness, 1 tightest. All operators are left-associative
    /// at equal precedence.
    pub fn precedence(self) -> u8 {
        match self {
            BinOp::Pow => 1,
            BinOp::Mul | BinOp::Div | BinOp::IntDiv | BinOp::Mod => 2,
            BinOp::Add | BinOp::Sub => 3,
            BinOp::Less | BinOp::Leq | BinOp::Great | BinOp::Geq | BinOp::Eq | BinOp::Neq => 4,
            BinOp::Xor | BinOp::Or | BinOp::And => 5,
        }
    }

    /// Apply the operator to two rationals.
    pub fn apply(self, a: &Rational, b: &Rational) -> Result<Rational, EvalError> {
        Ok(match self {
            BinOp::Pow => return pow(a, b),
            BinOp::Mul => a * b,
            BinOp::Div => {
                if b.is_zero() {
                    return Err(EvalError::DivisionByZero);
                }
                a / b
            }
            BinOp::IntDiv => return floor_div(a, b),
            BinOp::Mod => {
                let quotient = floor_div(a, b)?;
                a - b * quotient
            }
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Less => from_bool(a < b),
            BinOp::Leq => from_bool(a <= b),
            BinOp::Great => from_bool(a > b),
            BinOp::Geq => from_bool(a >= b),
            BinOp::Eq => from_bool(a == b),
            BinOp::Neq => from_bool(a != b),
            BinOp::Xor => from_bool(truthy(a) ^ truthy(b)),
            BinOp::Or => from_bool(truthy(a) | truthy(b)),
            BinOp::And => from_bool(truthy(a) & truthy(b)),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Unary operators
// ═══════════════════════════════════════════════════════════════════════

/// A prefix operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Arithmetic negation `-`
    Neg,
    /// Logical not `!`
    Not,
}

impl UnaryOp {
    /// Apply the operator to a rational.
    pub fn apply(self, a: &Rational) -> Rational {
        match self {
            UnaryOp::Neg => -a.clone(),
            UnaryOp::Not => from_bool(!truthy(a)),
        }
    }

    /// The surface symbol, for diagnostics.
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Modification operators
// ═══════════════════════════════════════════════════════════════════════

/// An in-place modification operator usable as a statement.
///
/// The invertible subset (`+=`, `-=`, `*=`, `/=`) carries a designated
/// inverse used when the statement runs backwards; the rest are only
/// legal on mono targets, which never run backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModOp {
    /// `+=`
    Add,
    /// `-=`
    Sub,
    /// `*=`
    Mul,
    /// `/=`
    Div,
    /// `^=` (mono only: truthiness coercion discards the operand's
    /// magnitude, so there is nothing to reverse with)
    Xor,
    /// `**=` (mono only)
    Pow,
    /// `//=` (mono only)
    IntDiv,
    /// `%=` (mono only)
    Mod,
    /// `|=` (mono only)
    Or,
    /// `&=` (mono only)
    And,
}

impl ModOp {
    /// Map a modification token to its table entry.
    pub fn from_symbol(sym: &str) -> Option<ModOp> {
        Some(match sym {
            "+=" => ModOp::Add,
            "-=" => ModOp::Sub,
            "*=" => ModOp::Mul,
            "/=" => ModOp::Div,
            "^=" => ModOp::Xor,
            "**=" => ModOp::Pow,
            "//=" => ModOp::IntDiv,
            "%=" => ModOp::Mod,
            "|=" => ModOp::Or,
            "&=" => ModOp::And,
            _ => return None,
        })
    }

    /// The surface symbol, for diagnostics.
    pub fn symbol(self) -> &'static str {
        match self {
            ModOp::Add => "+=",
            ModOp::Sub => "-=",
            ModOp::Mul => "*=",
            ModOp::Div => "/=",
            ModOp::Xor => "^=",
            ModOp::Pow => "**=",
            ModOp::IntDiv => "//=",
            ModOp::Mod => "%=",
            ModOp::Or => "|=",
            ModOp::And => "&=",
        }
    }

    /// The operator that undoes this one, if it has one.
    pub fn inverse(self) -> Option<ModOp> {
        Some(match self {
            ModOp::Add => ModOp::Sub,
            ModOp::Sub => ModOp::Add,
            ModOp::Mul => ModOp::Div,
            ModOp::Div => ModOp::Mul,
            _ => return None,
        })
    }

    /// Apply the operator in place semantics: `a op b`, where `a` is the
    /// current value of `target` and `b` the evaluated right-hand side.
    ///
    /// Multiplication by zero is rejected here rather than at reversal
    /// time: its inverse would be a division by zero.
    pub fn apply(self, target: &str, a: &Rational, b: &Rational) -> Result<Rational, EvalError> {
        match self {
            ModOp::Add => Ok(a + b),
            ModOp::Sub => Ok(a - b),
            ModOp::Mul => {
                if b.is_zero() {
                    Err(EvalError::ZeroMultiplication {
                        name: target.to_string(),
                    })
                } else {
                    Ok(a * b)
                }
            }
            ModOp::Div => {
                if b.is_zero() {
                    Err(EvalError::DivisionByZero)
                } else {
                    Ok(a / b)
                }
            }
            ModOp::Xor => Ok(from_bool(truthy(a) ^ truthy(b))),
            ModOp::Pow => pow(a, b),
            ModOp::IntDiv => floor_div(a, b),
            ModOp::Mod => BinOp::Mod.apply(a, b),
            ModOp::Or => Ok(from_bool(truthy(a) | truthy(b))),
            ModOp::And => Ok(from_bool(truthy(a) & truthy(b))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    fn rat(n: i64, d: i64) -> Rational {
        Rational::new(BigInt::from(n), BigInt::from(d))
    }

    fn int(n: i64) -> Rational {
        Rational::from_integer(BigInt::from(n))
    }

    #[test]
    fn modops_and_inverses_round_trip() {
        let start = rat(7, 3);
        let operand = rat(5, 2);
        for op in [ModOp::Add, ModOp::Sub, ModOp::Mul, ModOp::Div] {
            let forward = op.apply("x", &start, &operand).unwrap();
            let back = op
                .inverse()
                .unwrap()
                .apply("x", &forward, &operand)
                .unwrap();
            assert_eq!(back, start, "{} did not invert", op.symbol());
        }
    }

    #[test]
    fn noninvertible_modops_have_no_inverse() {
        for op in [
            ModOp::Xor,
            ModOp::Pow,
            ModOp::IntDiv,
            ModOp::Mod,
            ModOp::Or,
            ModOp::And,
        ] {
            assert!(op.inverse().is_none(), "{} should be one-way", op.symbol());
        }
        // xor still flips truthiness when a mono statement runs forwards
        let one = ModOp::Xor.apply("x", &int(0), &int(5)).unwrap();
        assert_eq!(one, int(1));
        assert_eq!(ModOp::Xor.apply("x", &one, &int(5)).unwrap(), int(0));
    }

    #[test]
    fn zero_guards() {
        assert_eq!(
            ModOp::Mul.apply("n", &int(4), &int(0)),
            Err(EvalError::ZeroMultiplication { name: "n".into() })
        );
        assert_eq!(
            ModOp::Div.apply("n", &int(4), &int(0)),
            Err(EvalError::DivisionByZero)
        );
        assert_eq!(
            BinOp::Div.apply(&int(1), &int(0)),
            Err(EvalError::DivisionByZero)
        );
        assert_eq!(
            BinOp::Pow.apply(&int(0), &int(-1)),
            Err(EvalError::DivisionByZero)
        );
    }

    #[test]
    fn floored_division_and_modulo() {
        assert_eq!(BinOp::IntDiv.apply(&int(-7), &int(2)).unwrap(), int(-4));
        assert_eq!(BinOp::Mod.apply(&int(-7), &int(2)).unwrap(), int(1));
        assert_eq!(BinOp::Mod.apply(&int(7), &int(-2)).unwrap(), int(-1));
        assert_eq!(BinOp::IntDiv.apply(&rat(5, 2), &int(1)).unwrap(), int(2));
    }

    #[test]
    fn pow_requires_integer_exponent() {
        assert_eq!(BinOp::Pow.apply(&int(2), &int(10)).unwrap(), int(1024));
        assert_eq!(BinOp::Pow.apply(&int(2), &int(-2)).unwrap(), rat(1, 4));
        assert!(matches!(
            BinOp::Pow.apply(&int(2), &rat(1, 2)),
            Err(EvalError::Value { .. })
        ));
    }

    #[test]
    fn comparisons_and_boolean_coercion() {
        assert_eq!(BinOp::Less.apply(&rat(1, 3), &rat(1, 2)).unwrap(), int(1));
        assert_eq!(BinOp::Eq.apply(&rat(2, 4), &rat(1, 2)).unwrap(), int(1));
        assert_eq!(BinOp::And.apply(&rat(1, 9), &int(0)).unwrap(), int(0));
        assert_eq!(BinOp::Or.apply(&int(0), &rat(-3, 7)).unwrap(), int(1));
        assert_eq!(UnaryOp::Not.apply(&int(0)), int(1));
        assert_eq!(UnaryOp::Neg.apply(&rat(1, 3)), rat(-1, 3));
    }

    #[test]
    fn precedence_table() {
        assert_eq!(BinOp::Pow.precedence(), 1);
        assert_eq!(BinOp::Mul.precedence(), 2);
        assert_eq!(BinOp::Sub.precedence(), 3);
        assert_eq!(BinOp::Neq.precedence(), 4);
        assert_eq!(BinOp::And.precedence(), 5);
    }
}
