//! Purchase amount validation.
//!
//! The user types a SOL amount as text. It is parsed as an exact decimal and
//! scaled to lamports without going through floating point, then checked
//! against the sale's minimum and maximum. Bounds are compared against the
//! exact value, before rounding, so `0.0009999999999` is below a `0.001`
//! minimum even though it rounds up to it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PresaleError;

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;
const SOL_DECIMALS: usize = 9;

/// An amount of SOL in base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lamports(u64);

impl Lamports {
    pub const fn new(lamports: u64) -> Self {
        Self(lamports)
    }

    /// Whole SOL; `None` when it does not fit in a `u64` of lamports.
    pub const fn from_sol(sol: u64) -> Option<Self> {
        match sol.checked_mul(LAMPORTS_PER_SOL) {
            Some(lamports) => Some(Self(lamports)),
            None => None,
        }
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Formats as a SOL decimal without trailing zeros, e.g. `0.05`.
impl fmt::Display for Lamports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / LAMPORTS_PER_SOL;
        let frac = self.0 % LAMPORTS_PER_SOL;
        if frac == 0 {
            return write!(f, "{whole}");
        }
        let digits = format!("{frac:0width$}", width = SOL_DECIMALS);
        write!(f, "{whole}.{}", digits.trim_end_matches('0'))
    }
}

/// Bounds a purchase must fall within.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountPolicy {
    pub min_lamports: Lamports,
    pub max_lamports: Lamports,
}

impl Default for AmountPolicy {
    /// 0.001 SOL to 10,000 SOL.
    fn default() -> Self {
        Self {
            min_lamports: Lamports::new(LAMPORTS_PER_SOL / 1_000),
            max_lamports: Lamports::new(10_000 * LAMPORTS_PER_SOL),
        }
    }
}

impl AmountPolicy {
    pub fn check(&self) -> Result<(), PresaleError> {
        if self.min_lamports.get() == 0 {
            return Err(PresaleError::Config("minimum purchase must be positive".into()));
        }
        if self.min_lamports > self.max_lamports {
            return Err(PresaleError::Config(format!(
                "minimum purchase {} SOL exceeds maximum {} SOL",
                self.min_lamports, self.max_lamports
            )));
        }
        Ok(())
    }

    /// Parse `raw` and return its lamport value if it is within bounds.
    pub fn validate(&self, raw: &str) -> Result<Lamports, PresaleError> {
        let input = raw.trim();
        let parsed = parse_decimal(input)?;

        let out_of_range = || PresaleError::OutOfRange {
            input: input.to_string(),
            min: self.min_lamports.to_string(),
            max: self.max_lamports.to_string(),
        };

        if parsed.negative && !parsed.is_zero() {
            return Err(out_of_range());
        }
        let truncated = parsed.truncated.ok_or_else(out_of_range)?;
        let min = self.min_lamports.get() as u128;
        let max = self.max_lamports.get() as u128;

        if truncated < min || truncated > max || (truncated == max && parsed.has_remainder) {
            return Err(out_of_range());
        }

        let lamports = truncated + u128::from(parsed.round_up);
        u64::try_from(lamports).map(Lamports).map_err(|_| out_of_range())
    }
}

/// Validate `raw` against the default policy.
pub fn validate(raw: &str) -> Result<Lamports, PresaleError> {
    AmountPolicy::default().validate(raw)
}

struct ParsedDecimal {
    negative: bool,
    /// Value in whole lamports, truncated. `None` when it overflows.
    truncated: Option<u128>,
    /// Any non-zero digit past the ninth decimal.
    has_remainder: bool,
    /// Tenth decimal is 5 or more.
    round_up: bool,
}

impl ParsedDecimal {
    fn is_zero(&self) -> bool {
        self.truncated == Some(0) && !self.has_remainder
    }
}

fn parse_decimal(input: &str) -> Result<ParsedDecimal, PresaleError> {
    let invalid = |reason: &str| PresaleError::InvalidFormat {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    if input.is_empty() {
        return Err(invalid("enter an amount"));
    }

    let (negative, unsigned) = match input.as_bytes()[0] {
        b'-' => (true, &input[1..]),
        b'+' => (false, &input[1..]),
        _ => (false, input),
    };

    let lowered = unsigned.to_ascii_lowercase();
    if matches!(lowered.as_str(), "nan" | "inf" | "infinity") {
        return Err(invalid("not a finite number"));
    }

    let (whole, frac) = match unsigned.split_once('.') {
        Some((w, f)) => (w, f),
        None => (unsigned, ""),
    };
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(whole) || !all_digits(frac) || (whole.is_empty() && frac.is_empty()) {
        return Err(invalid("not a decimal number"));
    }

    let mut truncated: Option<u128> = Some(0);
    for b in whole.bytes() {
        truncated = truncated
            .and_then(|v| v.checked_mul(10))
            .and_then(|v| v.checked_add(u128::from(b - b'0')));
    }
    truncated = truncated.and_then(|v| v.checked_mul(LAMPORTS_PER_SOL as u128));

    let frac = frac.as_bytes();
    let mut frac_lamports: u128 = 0;
    for i in 0..SOL_DECIMALS {
        let digit = frac.get(i).map_or(0, |b| b - b'0');
        frac_lamports = frac_lamports * 10 + u128::from(digit);
    }
    let tail = frac.get(SOL_DECIMALS..).unwrap_or(&[]);
    let has_remainder = tail.iter().any(|b| *b != b'0');
    let round_up = tail.first().is_some_and(|b| *b >= b'5');

    Ok(ParsedDecimal {
        negative,
        truncated: truncated.and_then(|v| v.checked_add(frac_lamports)),
        has_remainder,
        round_up,
    })
}
