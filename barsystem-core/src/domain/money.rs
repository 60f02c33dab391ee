//! Money amounts in minor currency units

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::result::{Error, Result};

/// An amount of money stored as integer cents
///
/// The service exchanges every price, total and balance in cents. Rendering
/// goes through integer division only, so the two-decimal string of a value
/// is exact no matter how many deposits and purchases produced it.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Price of `quantity` units at this unit price
    pub fn times(self, quantity: u32) -> Self {
        Self(self.0 * i64::from(quantity))
    }

    /// Parse an operator-entered major-unit amount such as `12,50` or `3`
    ///
    /// A comma is accepted as decimal separator. Amounts with more than two
    /// significant decimals are rejected instead of being rounded.
    pub fn parse_major(input: &str) -> Result<Self> {
        let normalized = input.trim().replace(',', ".");
        let value = Decimal::from_str(&normalized)
            .map_err(|_| Error::validation(format!("'{}' is not an amount", input.trim())))?
            .normalize();

        if value.scale() > 2 {
            return Err(Error::validation(format!(
                "'{}' has more than two decimals",
                input.trim()
            )));
        }

        value
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|cents| cents.to_i64())
            .map(Self)
            .ok_or_else(|| Error::validation(format!("'{}' is out of range", input.trim())))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let rendered = format!("{}{}.{:02}", sign, abs / 100, abs % 100);
        f.pad(&rendered)
    }
}

impl FromStr for Money {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_major(s)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}
