//! Exact rational numbers for numeric keywords.
//!
//! Draft 2020-12 compares numbers by mathematical value: `1.0` and `1` are
//! the same number, `integer` means "number with a zero fractional part",
//! and `multipleOf` must hold exactly for decimal divisors such as `0.0001`.
//! Binary floats cannot express those semantics, so every number that takes
//! part in a comparison is decoded from its lexical JSON form into an
//! arbitrary-precision ratio first.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{pow, Signed, ToPrimitive, Zero};
use std::fmt;
use std::str::FromStr;

/// Exponents past this magnitude would allocate absurd amounts of memory for
/// the power-of-ten scaling; such numbers fail to decode instead.
const MAX_EXPONENT_MAGNITUDE: i64 = 65_536;

/// An exact rational decoded from the lexical form of a JSON number.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Rational(BigRational);

impl Rational {
    /// Decodes a rational from the lexical text of a JSON number.
    ///
    /// Accepts exactly the JSON number grammar: an optional minus sign, an
    /// integer part, an optional fraction, and an optional decimal exponent.
    /// Returns `None` for anything else.
    pub fn parse(lexical: &str) -> Option<Rational> {
        let (negative, rest) = match lexical.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, lexical),
        };

        let (mantissa, exponent) = match rest.find(|c| c == 'e' || c == 'E') {
            Some(at) => (&rest[..at], rest[at + 1..].trim_start_matches('+')),
            None => (rest, ""),
        };
        let exponent: i64 = if exponent.is_empty() {
            0
        } else {
            exponent.parse().ok()?
        };

        let (int_part, frac_part) = match mantissa.find('.') {
            Some(at) => (&mantissa[..at], &mantissa[at + 1..]),
            None => (mantissa, ""),
        };
        if int_part.is_empty() || !is_digits(int_part) {
            return None;
        }
        if !frac_part.is_empty() && !is_digits(frac_part) {
            return None;
        }
        if mantissa.contains('.') && frac_part.is_empty() {
            return None;
        }

        let digits = format!("{}{}", int_part, frac_part);
        let mut numer = BigInt::from_str(&digits).ok()?;
        if negative {
            numer = -numer;
        }

        let scale = exponent.checked_sub(frac_part.len() as i64)?;
        if scale.abs() > MAX_EXPONENT_MAGNITUDE {
            return None;
        }

        let rational = if scale >= 0 {
            BigRational::from_integer(numer * pow(BigInt::from(10), scale as usize))
        } else {
            BigRational::new(numer, pow(BigInt::from(10), (-scale) as usize))
        };

        Some(Rational(rational))
    }

    /// Decodes a rational from a parsed JSON number.
    pub fn from_number(number: &serde_json::Number) -> Option<Rational> {
        Rational::parse(&number.to_string())
    }

    /// Whether the number has no fractional part. `1.0` counts as an
    /// integer, per the draft's `integer` type.
    pub fn is_integer(&self) -> bool {
        self.0.is_integer()
    }

    /// Whether `self / divisor` is a whole number. A zero divisor never
    /// matches.
    pub fn is_multiple_of(&self, divisor: &Rational) -> bool {
        if divisor.0.is_zero() {
            return false;
        }
        (&self.0 / &divisor.0).is_integer()
    }

    /// The number as a `u64`, when it is a non-negative integer that fits.
    pub fn to_u64(&self) -> Option<u64> {
        if !self.0.is_integer() || self.0.is_negative() {
            return None;
        }
        self.0.to_integer().to_u64()
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.0.is_integer() {
            write!(f, "{}", self.0.to_integer())
        } else {
            write!(f, "{}", self.0)
        }
    }
}

fn is_digits(text: &str) -> bool {
    text.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rat(lexical: &str) -> Rational {
        Rational::parse(lexical).expect("lexical number should parse")
    }

    #[test]
    fn decimals_decode_exactly() {
        assert_eq!(rat("1.1"), Rational(BigRational::new(11.into(), 10.into())));
        assert_eq!(rat("-0.5"), Rational(BigRational::new((-1).into(), 2.into())));
        assert_eq!(rat("1.10"), rat("1.1"));
    }

    #[test]
    fn exponents_scale() {
        assert_eq!(rat("1e3"), rat("1000"));
        assert_eq!(rat("1.5e2"), rat("150"));
        assert_eq!(rat("25e-3"), rat("0.025"));
        assert_eq!(rat("1E+2"), rat("100"));
    }

    #[test]
    fn rejects_non_numbers() {
        assert_eq!(Rational::parse("abc"), None);
        assert_eq!(Rational::parse(""), None);
        assert_eq!(Rational::parse("1."), None);
        assert_eq!(Rational::parse(".5"), None);
        assert_eq!(Rational::parse("1e999999999999"), None);
    }

    #[test]
    fn integer_recognition() {
        assert!(rat("1").is_integer());
        assert!(rat("1.0").is_integer());
        assert!(rat("1e2").is_integer());
        assert!(!rat("1.5").is_integer());
    }

    #[test]
    fn exact_ordering() {
        // The classic float trap: 1.1 must not equal itself "rounded".
        assert!(rat("1.1") < rat("1.10000001"));
        assert!(!(rat("1.1") < rat("1.1")));
        assert!(rat("1.0") < rat("1.1"));
    }

    #[test]
    fn multiple_of_decimals() {
        assert!(rat("0.0075").is_multiple_of(&rat("0.0001")));
        assert!(rat("4.5").is_multiple_of(&rat("1.5")));
        assert!(!rat("4.6").is_multiple_of(&rat("1.5")));
        assert!(!rat("1").is_multiple_of(&rat("0")));
    }

    #[test]
    fn u64_bounds() {
        assert_eq!(rat("3").to_u64(), Some(3));
        assert_eq!(rat("3.0").to_u64(), Some(3));
        assert_eq!(rat("3.5").to_u64(), None);
        assert_eq!(rat("-3").to_u64(), None);
    }
}
