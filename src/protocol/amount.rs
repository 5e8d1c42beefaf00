use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;
use std::str::FromStr;
use thiserror::Error;

/// USDC uses 6 decimals on every chain the protocol is deployed to
pub const USDC_DECIMALS: u32 = 6;

const UNIT: u128 = 1_000_000;
const BPS_DENOMINATOR: u128 = 10_000;
/// Smallest amount shown without the "< 0.01" shorthand (0.01 USDC)
const DISPLAY_FLOOR: u128 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("amount must not be negative")]
    Negative,
    #[error("'{0}' is not a decimal number")]
    Invalid(String),
    #[error("amount has more than {USDC_DECIMALS} decimal places")]
    TooPrecise,
    #[error("amount is too large")]
    Overflow,
}

/// Fixed-point USDC amount stored in base units (1 USDC = 1_000_000 units)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Usdc(u128);

impl Usdc {
    pub const ZERO: Usdc = Usdc(0);
    /// Largest amount accepted from text; basis point maths stays exact below it
    pub const MAX: Usdc = Usdc(u128::MAX / BPS_DENOMINATOR);

    pub const fn from_units(units: u128) -> Self {
        Usdc(units)
    }

    pub const fn from_whole(whole: u64) -> Self {
        Usdc(whole as u128 * UNIT)
    }

    pub fn units(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Portion of this amount expressed in basis points, rounded down
    pub fn percent_bps(&self, bps: u32) -> Usdc {
        let bps = bps as u128;
        let whole = (self.0 / BPS_DENOMINATOR).saturating_mul(bps);
        let rest = (self.0 % BPS_DENOMINATOR) * bps / BPS_DENOMINATOR;
        Usdc(whole.saturating_add(rest))
    }

    pub fn checked_sub(&self, other: Usdc) -> Option<Usdc> {
        self.0.checked_sub(other.0).map(Usdc)
    }

    pub fn saturating_sub(&self, other: Usdc) -> Usdc {
        Usdc(self.0.saturating_sub(other.0))
    }

    /// Canonical decimal form with trailing zeros trimmed ("10", "1.5")
    pub fn format_units(&self) -> String {
        let whole = self.0 / UNIT;
        let frac = self.0 % UNIT;
        if frac == 0 {
            return whole.to_string();
        }
        let frac = format!("{:06}", frac);
        format!("{}.{}", whole, frac.trim_end_matches('0'))
    }

    /// Fixed number of decimals, rounding half up ("3.00")
    pub fn to_fixed(&self, decimals: u32) -> String {
        let decimals = decimals.min(USDC_DECIMALS);
        let scale = 10u128.pow(USDC_DECIMALS - decimals);
        let rounded = match self.0.checked_add(scale / 2) {
            Some(value) => value / scale,
            None => self.0 / scale + u128::from(self.0 % scale >= scale / 2),
        };
        if decimals == 0 {
            return rounded.to_string();
        }
        let divisor = 10u128.pow(decimals);
        format!(
            "{}.{:0width$}",
            rounded / divisor,
            rounded % divisor,
            width = decimals as usize
        )
    }

    /// Human display with thousands separators, at most `max_decimals`
    /// fraction digits and no padding; tiny positive amounts read "< 0.01"
    pub fn display(&self, max_decimals: u32) -> String {
        if self.0 > 0 && self.0 < DISPLAY_FLOOR {
            return "< 0.01".to_string();
        }
        let fixed = self.to_fixed(max_decimals);
        let (whole, frac) = match fixed.split_once('.') {
            Some((w, f)) => (w.to_string(), f.trim_end_matches('0').to_string()),
            None => (fixed.clone(), String::new()),
        };
        let grouped = group_thousands(&whole);
        if frac.is_empty() {
            grouped
        } else {
            format!("{}.{}", grouped, frac)
        }
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

impl FromStr for Usdc {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AmountError::Empty);
        }
        if s.starts_with('-') {
            return Err(AmountError::Negative);
        }
        let body = s.strip_prefix('+').unwrap_or(s);
        let (whole, frac) = body.split_once('.').unwrap_or((body, ""));

        let is_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if (whole.is_empty() && frac.is_empty()) || !is_digits(whole) || !is_digits(frac) {
            return Err(AmountError::Invalid(s.to_string()));
        }
        if frac.len() > USDC_DECIMALS as usize {
            return Err(AmountError::TooPrecise);
        }

        let whole_units: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| AmountError::Overflow)?
        };
        let frac_units: u128 = if frac.is_empty() {
            0
        } else {
            format!("{:0<width$}", frac, width = USDC_DECIMALS as usize)
                .parse()
                .map_err(|_| AmountError::Invalid(s.to_string()))?
        };

        whole_units
            .checked_mul(UNIT)
            .and_then(|w| w.checked_add(frac_units))
            .filter(|units| *units <= Usdc::MAX.0)
            .map(Usdc)
            .ok_or(AmountError::Overflow)
    }
}

impl TryFrom<String> for Usdc {
    type Error = AmountError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Usdc> for String {
    fn from(value: Usdc) -> Self {
        value.format_units()
    }
}

impl fmt::Display for Usdc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_units())
    }
}

impl Add for Usdc {
    type Output = Usdc;

    fn add(self, rhs: Usdc) -> Usdc {
        Usdc(self.0.saturating_add(rhs.0))
    }
}
