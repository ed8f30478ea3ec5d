use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use thiserror::Error;

/// Money held as integer cents; rendered and parsed as a decimal with two places.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount {
    cents: u64,
}

impl Amount {
    pub const ZERO: Self = Self { cents: 0 };

    pub const fn from_cents(cents: u64) -> Self {
        Self { cents }
    }

    /// Whole currency units, for literals and constants.
    ///
    /// # Panics
    ///
    /// When `units * 100` overflows `u64`; use [`Amount::checked_from_units`]
    /// for values that come from input.
    pub const fn from_units(units: u64) -> Self {
        match Self::checked_from_units(units) {
            Some(amount) => amount,
            None => panic!("amount overflows u64 cents"),
        }
    }

    pub const fn checked_from_units(units: u64) -> Option<Self> {
        match units.checked_mul(100) {
            Some(cents) => Some(Self { cents }),
            None => None,
        }
    }

    pub fn cents(self) -> u64 {
        self.cents
    }

    pub fn is_positive(self) -> bool {
        self.cents > 0
    }

    /// Price of `count` tickets, `None` on overflow.
    pub fn times(self, count: usize) -> Option<Self> {
        let count = u64::try_from(count).ok()?;
        self.cents.checked_mul(count).map(Self::from_cents)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("'{value}' is not a valid amount")]
pub struct AmountParseError {
    pub value: String,
}

impl FromStr for Amount {
    type Err = AmountParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let err = || AmountParseError {
            value: value.to_string(),
        };
        let trimmed = value.trim();
        let trimmed = trimmed.strip_prefix('$').unwrap_or(trimmed);
        let (whole, frac) = match trimmed.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (trimmed, ""),
        };
        if whole.is_empty() || frac.len() > 2 {
            return Err(err());
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(err());
        }
        let units: u64 = whole.parse().map_err(|_| err())?;
        let cents: u64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<u64>().map_err(|_| err())? * 10,
            _ => frac.parse().map_err(|_| err())?,
        };
        units
            .checked_mul(100)
            .and_then(|c| c.checked_add(cents))
            .map(Self::from_cents)
            .ok_or_else(err)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}.{:02}", self.cents / 100, self.cents % 100)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&format_args!("{}.{:02}", self.cents / 100, self.cents % 100))
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_prices() {
        assert_eq!("2".parse::<Amount>().unwrap(), Amount::from_cents(200));
        assert_eq!("2.5".parse::<Amount>().unwrap(), Amount::from_cents(250));
        assert_eq!("$0.75".parse::<Amount>().unwrap(), Amount::from_cents(75));
        assert!("2.505".parse::<Amount>().is_err());
        assert!("-1".parse::<Amount>().is_err());
        assert!("".parse::<Amount>().is_err());
        assert!(".5".parse::<Amount>().is_err());
    }

    #[test]
    fn multiplies_and_renders() {
        let price = Amount::from_units(2);
        assert_eq!(price.times(2), Some(Amount::from_units(4)));
        assert_eq!(price.times(2).unwrap().to_string(), "$4.00");
        assert_eq!(Amount::from_cents(u64::MAX).times(2), None);
        assert!(!Amount::ZERO.is_positive());
    }

    #[test]
    fn unit_construction_detects_overflow() {
        assert_eq!(Amount::checked_from_units(3), Some(Amount::from_cents(300)));
        assert_eq!(Amount::checked_from_units(u64::MAX / 100 + 1), None);
        let units = std::hint::black_box(u64::MAX);
        assert!(std::panic::catch_unwind(|| Amount::from_units(units)).is_err());
    }

    #[test]
    fn serde_uses_plain_decimal() {
        let json = serde_json::to_string(&Amount::from_cents(1205)).unwrap();
        assert_eq!(json, "\"12.05\"");
        assert_eq!(
            serde_json::from_str::<Amount>(&json).unwrap(),
            Amount::from_cents(1205)
        );
    }
}
