//! Monetary amounts in minor currency units.

use core::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::value_object::ValueObject;

const MINOR_PER_UNIT: i64 = 100;

/// An amount of money stored as a whole number of minor units (cents).
///
/// Prices and totals never go through floating point. The textual form always
/// has two decimals (`"150.00"`, `"-0.05"`), which is also the JSON form.
/// Deserialization additionally accepts JSON numbers with at most two decimals.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl ValueObject for Money {}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoneyParseError {
    #[error("empty amount")]
    Empty,

    #[error("malformed amount '{0}'")]
    Malformed(String),

    #[error("amount '{0}' has more than two decimal places")]
    TooPrecise(String),

    #[error("amount '{0}' is out of range")]
    OutOfRange(String),
}

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Whole currency units (`Money::from_major(5)` is `5.00`).
    pub fn from_major(major: i64) -> Option<Self> {
        major.checked_mul(MINOR_PER_UNIT).map(Self)
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// `self × quantity`, `None` on overflow.
    pub fn checked_mul(self, quantity: i64) -> Option<Self> {
        self.0.checked_mul(quantity).map(Self)
    }

    pub fn checked_add(self, other: Money) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn saturating_add(self, other: Money) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl core::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, Money::saturating_add)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let unit = MINOR_PER_UNIT as u64;
        write!(f, "{sign}{}.{:02}", abs / unit, abs % unit)
    }
}

impl FromStr for Money {
    type Err = MoneyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        if raw.is_empty() {
            return Err(MoneyParseError::Empty);
        }

        let (negative, digits) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };

        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };

        let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if (whole.is_empty() && frac.is_empty()) || !all_digits(whole) || !all_digits(frac) {
            return Err(MoneyParseError::Malformed(raw.to_string()));
        }
        if frac.len() > 2 {
            return Err(MoneyParseError::TooPrecise(raw.to_string()));
        }

        let out_of_range = || MoneyParseError::OutOfRange(raw.to_string());

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| out_of_range())?
        };
        let frac: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| out_of_range())? * 10,
            _ => frac.parse().map_err(|_| out_of_range())?,
        };

        let minor = whole
            .checked_mul(MINOR_PER_UNIT)
            .and_then(|m| m.checked_add(frac))
            .ok_or_else(out_of_range)?;

        Ok(Self(if negative { -minor } else { minor }))
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MoneyVisitor)
    }
}

struct MoneyVisitor;

impl Visitor<'_> for MoneyVisitor {
    type Value = Money;

    fn expecting(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("a decimal amount such as \"12.50\" or 12.5")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
        Money::from_major(v).ok_or_else(|| E::custom(MoneyParseError::OutOfRange(v.to_string())))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
        i64::try_from(v)
            .ok()
            .and_then(Money::from_major)
            .ok_or_else(|| E::custom(MoneyParseError::OutOfRange(v.to_string())))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
        if !v.is_finite() {
            return Err(E::custom(MoneyParseError::Malformed(v.to_string())));
        }
        // Shortest round-trip form, so `1.005` stays `1.005` and is refused.
        v.to_string().parse().map_err(E::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_forms() {
        assert_eq!("5".parse::<Money>().unwrap(), Money::from_minor(500));
        assert_eq!("5.5".parse::<Money>().unwrap(), Money::from_minor(550));
        assert_eq!("5.05".parse::<Money>().unwrap(), Money::from_minor(505));
        assert_eq!(".75".parse::<Money>().unwrap(), Money::from_minor(75));
        assert_eq!("-1.25".parse::<Money>().unwrap(), Money::from_minor(-125));
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!("".parse::<Money>(), Err(MoneyParseError::Empty));
        assert!(matches!("1.234".parse::<Money>(), Err(MoneyParseError::TooPrecise(_))));
        assert!(matches!("12a".parse::<Money>(), Err(MoneyParseError::Malformed(_))));
        assert!(matches!(".".parse::<Money>(), Err(MoneyParseError::Malformed(_))));
        assert!(matches!(
            "99999999999999999999".parse::<Money>(),
            Err(MoneyParseError::OutOfRange(_))
        ));
    }

    #[test]
    fn displays_two_decimals() {
        assert_eq!(Money::from_minor(15000).to_string(), "150.00");
        assert_eq!(Money::from_minor(7).to_string(), "0.07");
        assert_eq!(Money::from_minor(-5).to_string(), "-0.05");
    }

    #[test]
    fn multiplication_detects_overflow() {
        assert_eq!(Money::from_minor(500).checked_mul(30), Some(Money::from_minor(15000)));
        assert_eq!(Money::from_minor(i64::MAX).checked_mul(2), None);
    }

    #[test]
    fn json_accepts_strings_and_numbers() {
        let from_str: Money = serde_json::from_str("\"5.00\"").unwrap();
        let from_int: Money = serde_json::from_str("5").unwrap();
        let from_float: Money = serde_json::from_str("5.1").unwrap();
        assert_eq!(from_str, Money::from_minor(500));
        assert_eq!(from_int, Money::from_minor(500));
        assert_eq!(from_float, Money::from_minor(510));
        assert_eq!(serde_json::to_string(&from_float).unwrap(), "\"5.10\"");
    }

    #[test]
    fn json_numbers_finer_than_a_cent_are_refused() {
        let err = serde_json::from_str::<Money>("1.005").unwrap_err();
        assert!(err.to_string().contains("more than two decimal places"), "{err}");
        assert!(serde_json::from_str::<Money>("\"1.005\"").is_err());
        assert_eq!(serde_json::from_str::<Money>("1.25").unwrap(), Money::from_minor(125));
    }

    #[test]
    fn sum_saturates_instead_of_panicking() {
        let total: Money = [Money::from_minor(i64::MAX), Money::from_minor(1)].into_iter().sum();
        assert_eq!(total, Money::from_minor(i64::MAX));
    }
}
