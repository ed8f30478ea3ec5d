// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! The fixed 00-99 number domain.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use thiserror::Error;

/// Size of the number domain.
pub const NUMBER_COUNT: u8 = 100;

/// One of the 100 raffle numbers. Always rendered as two digits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TicketNumber(u8);

impl TicketNumber {
    pub fn new(value: u8) -> Option<Self> {
        (value < NUMBER_COUNT).then_some(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("'{value}' is not a raffle number (expected 00-99)")]
pub struct InvalidNumber {
    pub value: String,
}

/// True iff `value` is one of the canonical strings "00".."99".
pub fn is_valid_number(value: &str) -> bool {
    value.len() == 2 && value.bytes().all(|b| b.is_ascii_digit())
}

impl FromStr for TicketNumber {
    type Err = InvalidNumber;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if !is_valid_number(value) {
            return Err(InvalidNumber {
                value: value.to_string(),
            });
        }
        let bytes = value.as_bytes();
        Ok(Self((bytes[0] - b'0') * 10 + (bytes[1] - b'0')))
    }
}

impl fmt::Display for TicketNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

impl Serialize for TicketNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TicketNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Ascending iterator over the whole domain. Cloning restarts from the clone point.
#[derive(Clone, Debug)]
pub struct AllNumbers {
    next: u8,
}

impl Iterator for AllNumbers {
    type Item = TicketNumber;

    fn next(&mut self) -> Option<Self::Item> {
        let number = TicketNumber::new(self.next)?;
        self.next += 1;
        Some(number)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = NUMBER_COUNT.saturating_sub(self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for AllNumbers {}

pub fn all_numbers() -> AllNumbers {
    AllNumbers { next: 0 }
}

/// Parses a list of canonical strings, failing on the first invalid entry.
pub fn parse_numbers<S: AsRef<str>>(values: &[S]) -> Result<Vec<TicketNumber>, InvalidNumber> {
    values.iter().map(|value| value.as_ref().parse()).collect()
}

/// Comma separated rendering used in log lines and error messages.
pub fn format_numbers<'a>(numbers: impl IntoIterator<Item = &'a TicketNumber>) -> String {
    numbers
        .into_iter()
        .map(TicketNumber::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
