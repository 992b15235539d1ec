//! Value constructors and conversion traits

use num_bigint::BigInt;
use num_traits::{One, Zero};

use super::{Rational, Value};

impl Value {
    /// The rational zero.
    pub fn zero() -> Self {
        Value::Number(Rational::zero())
    }

    /// The rational one.
    pub fn one() -> Self {
        Value::Number(Rational::one())
    }

    /// An integer-valued rational.
    pub fn integer(n: i64) -> Self {
        Value::Number(Rational::from_integer(BigInt::from(n)))
    }

    /// The reduced fraction `numer/denom`. `denom` must be nonzero.
    pub fn fraction(numer: i64, denom: i64) -> Self {
        Value::Number(Rational::new(BigInt::from(numer), BigInt::from(denom)))
    }

    /// `1` for true, `0` for false.
    pub fn from_bool(b: bool) -> Self {
        if b {
            Value::one()
        } else {
            Value::zero()
        }
    }
}

impl From<Rational> for Value {
    fn from(n: Rational) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::integer(n)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fractions_reduce() {
        assert_eq!(Value::fraction(10, 8), Value::fraction(5, 4));
        assert_eq!(Value::fraction(6, 3), Value::integer(2));
    }

    #[test]
    fn truthiness() {
        assert!(!Value::zero().is_truthy());
        assert!(Value::fraction(-1, 7).is_truthy());
        assert!(!Value::Array(vec![]).is_truthy());
        assert!(Value::Array(vec![Value::zero()]).is_truthy());
    }

    #[test]
    fn exact_thirds_sum_to_one() {
        let third = Value::fraction(1, 3);
        let Value::Number(t) = &third else {
            unreachable!()
        };
        let sum = t + t + t;
        assert_eq!(Value::Number(sum), Value::one());
    }
}
