//! # Amount — Fixed-Point Token Quantities
//!
//! A monetary quantity in micro-EKH: an integer count of the smallest
//! indivisible unit, `1 EKH = 1_000_000 micro`. No floating point in
//! arithmetic — all balance math is checked integer math.
//!
//! ## Wire format
//!
//! Peers and the persisted store speak JSON numbers with up to six
//! decimal places: `12.5`, `100`, `0.001`. Serialization emits integral
//! values as integers and fractional values as decimals; deserialization
//! additionally accepts decimal strings. The representable range is
//! capped below 2^50 micro (≈ 1.1 billion EKH), which keeps the
//! divide-then-multiply float path through JSON within a quarter micro
//! of error — rounding always recovers the exact integer.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Micro-units per whole EKH (6 decimal places).
pub const MICROS_PER_EKH: u64 = 1_000_000;

/// Largest representable amount in micro-EKH. Kept below 2^50 so the
/// JSON float path cannot lose precision (see module docs).
pub const MAX_AMOUNT_MICRO: u64 = (1u64 << 50) - 1;

/// A non-negative token quantity with 6 decimal places of precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(u64);

impl Amount {
    /// The zero amount.
    pub const ZERO: Amount = Amount(0);

    /// Constructs from a raw micro-EKH count.
    pub fn from_micro(micro: u64) -> Self {
        Amount(micro)
    }

    /// Constructs from a whole number of EKH. Saturates at the
    /// representable maximum rather than wrapping.
    pub fn from_ekh(whole: u64) -> Self {
        Amount(whole.saturating_mul(MICROS_PER_EKH).min(MAX_AMOUNT_MICRO))
    }

    /// Raw micro-EKH count.
    pub fn micro(self) -> u64 {
        self.0
    }

    /// `true` if the amount is zero.
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Checked addition. `None` on overflow past the representable range.
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        let sum = self.0.checked_add(other.0)?;
        (sum <= MAX_AMOUNT_MICRO).then_some(Amount(sum))
    }

    /// Checked subtraction. `None` if `other` exceeds `self`.
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Subtraction clamped at zero. Used when replaying an
    /// already-validated chain, where underflow cannot occur.
    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0))
    }

    /// Checked sum over an iterator. `None` on overflow.
    pub fn checked_sum<I: IntoIterator<Item = Amount>>(amounts: I) -> Option<Amount> {
        amounts
            .into_iter()
            .try_fold(Amount::ZERO, |acc, a| acc.checked_add(a))
    }
}

// ---------------------------------------------------------------------------
// Display / FromStr
// ---------------------------------------------------------------------------

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / MICROS_PER_EKH;
        let frac = self.0 % MICROS_PER_EKH;
        if frac == 0 {
            write!(f, "{whole}")
        } else {
            let digits = format!("{frac:06}");
            write!(f, "{whole}.{}", digits.trim_end_matches('0'))
        }
    }
}

impl FromStr for Amount {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.starts_with('-') || s.starts_with('+') {
            return Err(format!("invalid amount: {s:?}"));
        }

        let (whole_str, frac_str) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if frac_str.len() > 6 {
            return Err(format!("amount {s:?} exceeds 6 decimal places"));
        }

        let whole: u64 = whole_str
            .parse()
            .map_err(|_| format!("invalid amount: {s:?}"))?;
        let frac: u64 = if frac_str.is_empty() {
            0
        } else {
            let padded = format!("{frac_str:0<6}");
            padded.parse().map_err(|_| format!("invalid amount: {s:?}"))?
        };

        let micro = whole
            .checked_mul(MICROS_PER_EKH)
            .and_then(|m| m.checked_add(frac))
            .filter(|m| *m <= MAX_AMOUNT_MICRO)
            .ok_or_else(|| format!("amount {s:?} out of range"))?;

        Ok(Amount(micro))
    }
}

// ---------------------------------------------------------------------------
// Serde
// ---------------------------------------------------------------------------

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0 % MICROS_PER_EKH == 0 {
            serializer.serialize_u64(self.0 / MICROS_PER_EKH)
        } else {
            serializer.serialize_f64(self.0 as f64 / MICROS_PER_EKH as f64)
        }
    }
}

struct AmountVisitor;

impl Visitor<'_> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative number with at most 6 decimal places")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
        v.checked_mul(MICROS_PER_EKH)
            .filter(|m| *m <= MAX_AMOUNT_MICRO)
            .map(Amount)
            .ok_or_else(|| E::custom(format!("amount {v} out of range")))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
        let v = u64::try_from(v).map_err(|_| E::custom("amount must be non-negative"))?;
        self.visit_u64(v)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Amount, E> {
        if !v.is_finite() || v < 0.0 {
            return Err(E::custom("amount must be a finite non-negative number"));
        }
        let micro = (v * MICROS_PER_EKH as f64).round();
        if micro > MAX_AMOUNT_MICRO as f64 {
            return Err(E::custom(format!("amount {v} out of range")));
        }
        Ok(Amount(micro as u64))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
        v.parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn display_trims_trailing_zeros() {
        assert_eq!(Amount::from_micro(12_500_000).to_string(), "12.5");
        assert_eq!(Amount::from_micro(100_000_000).to_string(), "100");
        assert_eq!(Amount::from_micro(1_000).to_string(), "0.001");
        assert_eq!(Amount::ZERO.to_string(), "0");
        assert_eq!(Amount::from_micro(1).to_string(), "0.000001");
    }

    #[test]
    fn parse_accepts_decimals_and_integers() {
        assert_eq!("12.5".parse::<Amount>().unwrap(), Amount::from_micro(12_500_000));
        assert_eq!("100".parse::<Amount>().unwrap(), Amount::from_ekh(100));
        assert_eq!("0.001".parse::<Amount>().unwrap(), Amount::from_micro(1_000));
        assert_eq!("0".parse::<Amount>().unwrap(), Amount::ZERO);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("".parse::<Amount>().is_err());
        assert!("-1".parse::<Amount>().is_err());
        assert!("1.2345678".parse::<Amount>().is_err()); // 7 decimal places
        assert!("1.2.3".parse::<Amount>().is_err());
        assert!("abc".parse::<Amount>().is_err());
    }

    #[test]
    fn json_integral_values_serialize_as_integers() {
        assert_eq!(serde_json::to_string(&Amount::from_ekh(100)).unwrap(), "100");
        assert_eq!(serde_json::to_string(&Amount::ZERO).unwrap(), "0");
    }

    #[test]
    fn json_fractional_values_serialize_as_decimals() {
        assert_eq!(
            serde_json::to_string(&Amount::from_micro(12_500_000)).unwrap(),
            "12.5"
        );
        assert_eq!(
            serde_json::to_string(&Amount::from_micro(1_000)).unwrap(),
            "0.001"
        );
    }

    #[test]
    fn json_deserializes_numbers_and_strings() {
        assert_eq!(
            serde_json::from_str::<Amount>("12.5").unwrap(),
            Amount::from_micro(12_500_000)
        );
        assert_eq!(
            serde_json::from_str::<Amount>("100").unwrap(),
            Amount::from_ekh(100)
        );
        assert_eq!(
            serde_json::from_str::<Amount>("\"0.25\"").unwrap(),
            Amount::from_micro(250_000)
        );
        assert!(serde_json::from_str::<Amount>("-3").is_err());
    }

    #[test]
    fn checked_arithmetic() {
        let a = Amount::from_ekh(10);
        let b = Amount::from_micro(500_000);
        assert_eq!(a.checked_add(b), Some(Amount::from_micro(10_500_000)));
        assert_eq!(a.checked_sub(b), Some(Amount::from_micro(9_500_000)));
        assert_eq!(b.checked_sub(a), None);
        assert_eq!(
            Amount::from_micro(MAX_AMOUNT_MICRO).checked_add(Amount::from_micro(1)),
            None
        );
    }

    #[test]
    fn checked_sum_detects_overflow() {
        let ok = Amount::checked_sum([Amount::from_ekh(1), Amount::from_ekh(2)]);
        assert_eq!(ok, Some(Amount::from_ekh(3)));

        let overflow =
            Amount::checked_sum([Amount::from_micro(MAX_AMOUNT_MICRO), Amount::from_micro(1)]);
        assert_eq!(overflow, None);
    }

    proptest! {
        #[test]
        fn display_parse_roundtrip(micro in 0u64..=MAX_AMOUNT_MICRO) {
            let amount = Amount::from_micro(micro);
            let back: Amount = amount.to_string().parse().unwrap();
            prop_assert_eq!(back, amount);
        }

        #[test]
        fn json_roundtrip(micro in 0u64..=MAX_AMOUNT_MICRO) {
            let amount = Amount::from_micro(micro);
            let json = serde_json::to_string(&amount).unwrap();
            let back: Amount = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(back, amount);
        }
    }
}
