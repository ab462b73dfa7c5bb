//! Fixed-point currency amounts.
//!
//! Amounts are held as integer cents and cross the JSON boundary as
//! decimals with at most two fractional digits.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::TypesError;

/// A currency amount in cents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "Decimal", try_from = "Decimal")]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Largest representable magnitude: 99,999,999.99.
    pub const MAX: Money = Money(9_999_999_999);

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Decimal {
        Decimal::new(value.0, 2)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = TypesError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        if value.normalize().scale() > 2 {
            return Err(TypesError::InvalidAmount(format!(
                "{value} has more than two decimal places"
            )));
        }
        let cents = value
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|c| c.to_i64())
            .ok_or_else(|| TypesError::InvalidAmount(format!("{value} is out of range")))?;
        if cents.abs() > Money::MAX.0 {
            return Err(TypesError::InvalidAmount(format!(
                "{value} exceeds {}",
                Money::MAX
            )));
        }
        Ok(Money(cents))
    }
}

impl FromStr for Money {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim())
            .map_err(|e| TypesError::InvalidAmount(format!("{s}: {e}")))?;
        Money::try_from(value)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Decimal::from(*self))
    }
}
