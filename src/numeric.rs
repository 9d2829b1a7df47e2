use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use num_bigint::{BigInt as BigInteger, Sign};
use num_traits::{FromPrimitive, ToPrimitive, Zero};

use crate::error::{EvalResult, InterpreterError};

// ============================================================================
// Numeric Type System
// ============================================================================

#[derive(Debug, Clone)]
pub enum Number {
    /// Primary integer type - promotes to BigInt on overflow
    Int(i64),

    /// Arbitrary precision integer
    BigInt(Arc<BigInteger>),

    /// IEEE 754 double precision floating point
    Float(f64),
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Number::Int(n) => write!(f, "{n}"),
            Number::BigInt(n) => write!(f, "{n}"),
            Number::Float(x) if x.is_nan() => write!(f, "NaN"),
            Number::Float(x) if x.is_infinite() => {
                write!(f, "{}", if *x > 0.0 { "+Inf" } else { "-Inf" })
            }
            Number::Float(x) => write!(f, "{x}"),
        }
    }
}

// ============================================================================
// Equality and Comparison
// ============================================================================

/// The value a number denotes, independent of representation. Integral
/// floats fold into the integers and every NaN is the same value, so equality
/// is reflexive and agrees with hashing.
#[derive(PartialEq, Eq, Hash)]
enum Canonical<'a> {
    Int(i64),
    Big(Cow<'a, BigInteger>),
    Float(u64),
    NaN,
}

const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;

impl Number {
    fn canonical(&self) -> Canonical<'_> {
        match self {
            Number::Int(n) => Canonical::Int(*n),
            Number::BigInt(n) => match n.to_i64() {
                Some(small) => Canonical::Int(small),
                None => Canonical::Big(Cow::Borrowed(n.as_ref())),
            },
            Number::Float(x) if x.is_nan() => Canonical::NaN,
            Number::Float(x) if x.is_finite() && x.fract() == 0.0 => {
                if (-TWO_POW_63..TWO_POW_63).contains(x) {
                    Canonical::Int(*x as i64)
                } else {
                    match BigInteger::from_f64(*x) {
                        Some(big) => Canonical::Big(Cow::Owned(big)),
                        None => Canonical::Float(x.to_bits()),
                    }
                }
            }
            Number::Float(x) => Canonical::Float(x.to_bits()),
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for Number {}

impl Hash for Number {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}

impl PartialOrd for Number {
    /// Integers compare exactly. A NaN is equal to itself and unordered
    /// against everything else.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        use Canonical::*;

        match (self.canonical(), other.canonical()) {
            (NaN, NaN) => Some(Ordering::Equal),
            (NaN, _) | (_, NaN) => None,

            (Int(a), Int(b)) => Some(a.cmp(&b)),
            (Int(a), Big(b)) => Some(BigInteger::from(a).cmp(&*b)),
            (Big(a), Int(b)) => Some((*a).cmp(&BigInteger::from(b))),
            (Big(a), Big(b)) => Some(a.cmp(&b)),

            _ => self.to_float().partial_cmp(&other.to_float()),
        }
    }
}

impl Number {
    /// Convert to float (may lose precision)
    pub fn to_float(&self) -> f64 {
        match self {
            Number::Int(n) => *n as f64,
            Number::BigInt(n) => n.to_f64().unwrap_or(f64::INFINITY),
            Number::Float(x) => *x,
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Number::Int(n) => *n == 0,
            Number::BigInt(n) => n.is_zero(),
            Number::Float(x) => *x == 0.0,
        }
    }

    /// Demote a big integer back to `Int` when it fits
    fn normalize(big: BigInteger) -> Number {
        match big.to_i64() {
            Some(n) => Number::Int(n),
            None => Number::BigInt(Arc::new(big)),
        }
    }

    fn to_big(&self) -> Option<BigInteger> {
        match self {
            Number::Int(n) => Some(BigInteger::from(*n)),
            Number::BigInt(n) => Some(n.as_ref().clone()),
            Number::Float(_) => None,
        }
    }
}

/// Largest integer power `pow` will build, in bits
pub const MAX_POW_BITS: u64 = 1 << 20;

// ============================================================================
// Arithmetic Operations
// ============================================================================

impl Number {
    fn integral<I, B, F>(
        &self,
        other: &Number,
        checked: I,
        big: B,
        float: F,
    ) -> EvalResult<Number>
    where
        I: Fn(i64, i64) -> Option<i64>,
        B: Fn(BigInteger, BigInteger) -> BigInteger,
        F: Fn(f64, f64) -> f64,
    {
        use Number::*;

        match (self, other) {
            (Int(a), Int(b)) => match checked(*a, *b) {
                Some(result) => Ok(Int(result)),
                None => Ok(Self::normalize(big(BigInteger::from(*a), BigInteger::from(*b)))),
            },
            (Float(_), _) | (_, Float(_)) => Ok(Float(float(self.to_float(), other.to_float()))),
            _ => match (self.to_big(), other.to_big()) {
                (Some(a), Some(b)) => Ok(Self::normalize(big(a, b))),
                _ => Err(InterpreterError::type_error(
                    "arithmetic",
                    format!("unsupported operands {self} and {other}"),
                )),
            },
        }
    }

    pub fn add(&self, other: &Number) -> EvalResult<Number> {
        self.integral(other, i64::checked_add, |a, b| a + b, |a, b| a + b)
    }

    pub fn sub(&self, other: &Number) -> EvalResult<Number> {
        self.integral(other, i64::checked_sub, |a, b| a - b, |a, b| a - b)
    }

    pub fn mul(&self, other: &Number) -> EvalResult<Number> {
        self.integral(other, i64::checked_mul, |a, b| a * b, |a, b| a * b)
    }

    /// Division. Integer division that leaves a remainder yields a float.
    pub fn div(&self, other: &Number) -> EvalResult<Number> {
        if other.is_zero() {
            return Err(InterpreterError::value("/", "division by zero"));
        }
        match (self, other) {
            (Number::Int(a), Number::Int(b)) if a.checked_rem(*b) == Some(0) => {
                match a.checked_div(*b) {
                    Some(q) => Ok(Number::Int(q)),
                    None => Ok(Self::normalize(BigInteger::from(*a) / BigInteger::from(*b))),
                }
            }
            _ => match (self.to_big(), other.to_big()) {
                (Some(a), Some(b)) if (&a % &b).is_zero() => Ok(Self::normalize(a / b)),
                _ => Ok(Number::Float(self.to_float() / other.to_float())),
            },
        }
    }

    pub fn rem(&self, other: &Number) -> EvalResult<Number> {
        if other.is_zero() {
            return Err(InterpreterError::value("mod", "division by zero"));
        }
        self.integral(other, i64::checked_rem, |a, b| a % b, |a, b| a % b)
    }

    /// Exponentiation. Negative or fractional exponents yield a float.
    /// Integer results wider than `MAX_POW_BITS` are refused.
    pub fn pow(&self, exponent: &Number) -> EvalResult<Number> {
        let (base, e) = match (self.to_big(), exponent) {
            (Some(base), Number::Int(e)) if *e >= 0 => (base, e.unsigned_abs()),
            _ => return Ok(Number::Float(self.to_float().powf(exponent.to_float()))),
        };
        if base.bits() <= 1 {
            // 0, 1 and -1 never grow
            return Ok(if base.is_zero() {
                Number::Int(if e == 0 { 1 } else { 0 })
            } else if base.sign() == Sign::Minus && e % 2 == 1 {
                Number::Int(-1)
            } else {
                Number::Int(1)
            });
        }
        if (base.bits() - 1).saturating_mul(e) > MAX_POW_BITS {
            return Err(InterpreterError::value(
                "pow",
                format!("result too large for {self} ^ {e}"),
            ));
        }
        // Bounded above, so the exponent fits in u32
        Ok(Self::normalize(base.pow(e as u32)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_promotes_on_overflow() {
        let sum = Number::Int(i64::MAX).add(&Number::Int(1)).unwrap();
        assert!(matches!(sum, Number::BigInt(_)));
        assert_eq!(sum.sub(&Number::Int(1)).unwrap(), Number::Int(i64::MAX));
    }

    #[test]
    fn test_mixed_int_float() {
        let sum = Number::Int(2).add(&Number::Float(0.5)).unwrap();
        assert_eq!(sum, Number::Float(2.5));
    }

    #[test]
    fn test_exact_division_stays_integral() {
        assert_eq!(Number::Int(6).div(&Number::Int(3)).unwrap(), Number::Int(2));
        assert_eq!(Number::Int(7).div(&Number::Int(2)).unwrap(), Number::Float(3.5));
    }

    #[test]
    fn test_division_by_zero() {
        assert!(Number::Int(1).div(&Number::Int(0)).is_err());
        assert!(Number::Int(1).rem(&Number::Int(0)).is_err());
    }

    #[test]
    fn test_pow() {
        assert_eq!(Number::Int(2).pow(&Number::Int(10)).unwrap(), Number::Int(1024));
        assert!(matches!(
            Number::Int(2).pow(&Number::Int(100)).unwrap(),
            Number::BigInt(_)
        ));
        assert_eq!(Number::Int(2).pow(&Number::Int(-1)).unwrap(), Number::Float(0.5));
    }

    #[test]
    fn test_ordering_across_representations() {
        assert!(Number::Int(1) < Number::Float(1.5));
        assert!(Number::Int(i64::MAX).add(&Number::Int(1)).unwrap() > Number::Int(0));
    }

    #[test]
    fn test_pow_refuses_huge_results() {
        let err = Number::Int(10).pow(&Number::Int(4_000_000_000)).unwrap_err();
        assert_eq!(err.kind, crate::ErrorKind::Value);
        assert!(err.message.contains("too large"));

        // Trivial bases stay cheap whatever the exponent
        assert_eq!(Number::Int(1).pow(&Number::Int(i64::MAX)).unwrap(), Number::Int(1));
        assert_eq!(Number::Int(-1).pow(&Number::Int(4_000_000_001)).unwrap(), Number::Int(-1));
        assert_eq!(Number::Int(0).pow(&Number::Int(4_000_000_000)).unwrap(), Number::Int(0));
        assert_eq!(Number::Int(0).pow(&Number::Int(0)).unwrap(), Number::Int(1));

        // Right at the bound is still computed
        let edge = Number::Int(2).pow(&Number::Int(MAX_POW_BITS as i64)).unwrap();
        assert!(matches!(edge, Number::BigInt(_)));
    }

    #[test]
    fn test_nan_equals_itself() {
        let nan = Number::Float(f64::NAN);
        assert_eq!(nan, nan.clone());
        assert_eq!(nan.partial_cmp(&nan), Some(Ordering::Equal));
        assert_eq!(nan.partial_cmp(&Number::Int(0)), None);
        assert_ne!(nan, Number::Float(0.0));
    }

    fn hash_of(n: &Number) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        let mut hasher = DefaultHasher::new();
        n.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_equality_is_exact_across_representations() {
        let two_53 = 1i64 << 53;
        // 2^53 + 1 rounds to 2^53 as a float, but they are different numbers
        assert_ne!(Number::Int(two_53 + 1), Number::Float(two_53 as f64));
        assert_eq!(Number::Int(two_53), Number::Float(two_53 as f64));
        assert!(Number::Int(two_53 + 1) > Number::Float(two_53 as f64));

        // Equal values hash alike
        let pairs = [
            (Number::Int(2), Number::Float(2.0)),
            (Number::Int(0), Number::Float(-0.0)),
            (
                Number::normalize(BigInteger::from(1u8) << 70),
                Number::Float(2f64.powi(70)),
            ),
            (Number::BigInt(Arc::new(BigInteger::from(7))), Number::Int(7)),
            (Number::Float(f64::NAN), Number::Float(-f64::NAN)),
        ];
        for (a, b) in &pairs {
            assert_eq!(a, b);
            assert_eq!(hash_of(a), hash_of(b));
        }
    }

    #[test]
    fn test_big_integer_float_equality_is_transitive() {
        let big = Number::normalize((BigInteger::from(1u8) << 70) + 1);
        let float = Number::Float(2f64.powi(70));
        let exact = Number::normalize(BigInteger::from(1u8) << 70);
        assert_ne!(big, float);
        assert_eq!(float, exact);
        assert_ne!(big, exact);
        assert!(big > float);
    }
}
