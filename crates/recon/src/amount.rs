//! Decimal amount text → integer minor units (two decimal places).
//!
//! Works digit-by-digit on the text, so it is exact for any number of
//! fractional digits and never touches floating point. Rounding is applied to
//! the magnitude before the sign, so `half_up` rounds halves away from zero.

use std::cmp::Ordering;
use std::fmt;

use crate::config::RoundingMode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmountIssue {
    Missing,
    Invalid(String),
}

impl fmt::Display for AmountIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "missing amount"),
            Self::Invalid(value) => write!(f, "invalid amount: {value}"),
        }
    }
}

/// Parse `value` (optional sign, digits, optional `.` and fraction digits)
/// into minor units, rounding the third fractional digit onward per `mode`.
/// An absent whole part reads as `0`, so `"-"`, `"."` and `".5"` parse.
pub fn parse_minor_units(value: &str, mode: RoundingMode) -> Result<i64, AmountIssue> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AmountIssue::Missing);
    }
    let invalid = || AmountIssue::Invalid(value.to_string());

    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let (whole_str, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if !is_digits(whole_str) || !is_digits(fraction) {
        return Err(invalid());
    }

    let mut whole: i64 = 0;
    for d in whole_str.bytes() {
        whole = whole
            .checked_mul(10)
            .and_then(|w| w.checked_add(i64::from(d - b'0')))
            .ok_or_else(invalid)?;
    }

    let frac = fraction.as_bytes();
    let digit = |i: usize| frac.get(i).map_or(0, |d| d - b'0');
    let mut cents = i64::from(digit(0)) * 10 + i64::from(digit(1));
    let rest = frac.get(3..).unwrap_or(&[]);

    if rounds_up(mode, cents, digit(2), rest) {
        cents += 1;
    }
    if cents >= 100 {
        whole = whole.checked_add(cents / 100).ok_or_else(invalid)?;
        cents %= 100;
    }

    let magnitude = whole
        .checked_mul(100)
        .and_then(|w| w.checked_add(cents))
        .ok_or_else(invalid)?;
    Ok(if negative { -magnitude } else { magnitude })
}

/// Decide whether the truncated cents move up by one, given the first dropped
/// digit and every digit after it.
fn rounds_up(mode: RoundingMode, cents: i64, dropped: u8, rest: &[u8]) -> bool {
    match mode {
        RoundingMode::HalfUp => dropped >= 5,
        RoundingMode::Bankers => match dropped.cmp(&5) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => rest.iter().any(|d| *d != b'0') || cents % 2 == 1,
        },
    }
}

fn is_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}
