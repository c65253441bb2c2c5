//! The `Points` quantity type.
//!
//! Points are the virtual currency of the platform: an integer amount with no
//! fractional unit. All ledger arithmetic goes through checked operations so
//! an overflow surfaces as an error instead of a wrapped balance.

use std::fmt;
use std::iter::Sum;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by point arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PointsError {
    /// Arithmetic overflowed the underlying integer.
    #[error("points arithmetic overflow")]
    Overflow,
    /// A negative amount where only non-negative amounts are valid.
    #[error("negative points amount")]
    Negative,
}

/// An amount of points.
///
/// Stored as `i64`; the sign is meaningful in intermediate arithmetic
/// (a derived balance is a difference of sums) but every committed amount
/// in the ledger is non-negative.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Points(i64);

impl Points {
    /// Zero points.
    pub const ZERO: Self = Self(0);

    /// Create an amount from a raw i64.
    #[must_use]
    pub const fn new(amount: i64) -> Self {
        Self(amount)
    }

    /// Get the underlying i64 value.
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }

    /// Whether the amount is strictly positive.
    #[must_use]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Whether the amount is negative.
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Checked addition.
    ///
    /// # Errors
    ///
    /// Returns `PointsError::Overflow` if the sum does not fit in `i64`.
    pub fn checked_add(self, other: Self) -> Result<Self, PointsError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(PointsError::Overflow)
    }

    /// Checked subtraction.
    ///
    /// # Errors
    ///
    /// Returns `PointsError::Overflow` if the difference does not fit in `i64`.
    pub fn checked_sub(self, other: Self) -> Result<Self, PointsError> {
        self.0
            .checked_sub(other.0)
            .map(Self)
            .ok_or(PointsError::Overflow)
    }

    /// Checked multiplication by a unit count (basket line: cost x quantity).
    ///
    /// # Errors
    ///
    /// Returns `PointsError::Overflow` if the product does not fit in `i64`.
    pub fn checked_mul(self, quantity: u32) -> Result<Self, PointsError> {
        self.0
            .checked_mul(i64::from(quantity))
            .map(Self)
            .ok_or(PointsError::Overflow)
    }

    /// Points earned for a daily step count: one point per 100 steps,
    /// exact integer division.
    #[must_use]
    pub const fn from_steps(steps: u32) -> Self {
        Self(steps as i64 / 100)
    }
}

impl fmt::Display for Points {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} pts", self.0)
    }
}

impl From<i64> for Points {
    fn from(amount: i64) -> Self {
        Self(amount)
    }
}

impl From<Points> for i64 {
    fn from(points: Points) -> Self {
        points.0
    }
}

impl Sum for Points {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        // Balances are far below i64 range; a wrapped sum here would mean the
        // ledger already holds impossible amounts.
        Self(iter.map(|p| p.0).sum())
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Points {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <i64 as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Points {
    fn decode(
        value: sqlx::postgres::PgValueRef<'r>,
    ) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <i64 as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(amount))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Points {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <i64 as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_steps_floors() {
        assert_eq!(Points::from_steps(1250), Points::new(12));
        assert_eq!(Points::from_steps(99), Points::ZERO);
        assert_eq!(Points::from_steps(100), Points::new(1));
        assert_eq!(Points::from_steps(0), Points::ZERO);
    }

    #[test]
    fn test_checked_arithmetic() {
        let a = Points::new(100);
        let b = Points::new(30);
        assert_eq!(a.checked_sub(b), Ok(Points::new(70)));
        assert_eq!(b.checked_mul(4), Ok(Points::new(120)));
        assert_eq!(
            Points::new(i64::MAX).checked_add(Points::new(1)),
            Err(PointsError::Overflow)
        );
    }

    #[test]
    fn test_sum() {
        let total: Points = [Points::new(50), Points::new(50), Points::new(30)]
            .into_iter()
            .sum();
        assert_eq!(total, Points::new(130));
    }

    #[test]
    fn test_serde_transparent() {
        let json = serde_json::to_string(&Points::new(12)).expect("serialize");
        assert_eq!(json, "12");
    }
}
