use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;

use crate::op;

pub const ISK_CURRENCY_CODE: &str = "ISK";

//--------------------------------------        Isk          ---------------------------------------------------------
/// An amount of in-game currency. Reference prices carry fractional cents, so this is a thin wrapper over `f64`
/// rather than a fixed-point integer.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Isk(f64);

op!(binary Isk, Add, add);
op!(binary Isk, Sub, sub);
op!(inplace Isk, SubAssign, sub_assign);
op!(unary Isk, Neg, neg);

impl Mul<i64> for Isk {
    type Output = Self;

    #[allow(clippy::cast_precision_loss)]
    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * rhs as f64)
    }
}

impl Sum for Isk {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl From<f64> for Isk {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

impl Display for Isk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:0.2} {ISK_CURRENCY_CODE}", self.0)
    }
}

impl Isk {
    pub fn value(&self) -> f64 {
        self.0
    }

    /// Applies a mark-up or mark-down expressed as a percentage, e.g. `90.0` for 90% of the price.
    pub fn percent(&self, percentage: f64) -> Self {
        Self(self.0 * percentage / 100.0)
    }

    /// True for finite, strictly positive amounts. Anything else is not a usable price.
    pub fn is_positive(&self) -> bool {
        self.0.is_finite() && self.0 > 0.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn arithmetic() {
        let price = Isk::from(8.0);
        assert_eq!(price * 100, Isk::from(800.0));
        assert_eq!(Isk::from(5.0).percent(90.0), Isk::from(4.5));
        assert_eq!(Isk::from(1.5) + Isk::from(2.0) - Isk::from(0.5), Isk::from(3.0));
        let total: Isk = vec![Isk::from(1.0), Isk::from(2.25)].into_iter().sum();
        assert_eq!(total, Isk::from(3.25));
    }

    #[test]
    fn usable_prices() {
        assert!(Isk::from(0.01).is_positive());
        assert!(!Isk::from(0.0).is_positive());
        assert!(!Isk::from(-3.0).is_positive());
        assert!(!Isk::from(f64::NAN).is_positive());
    }

    #[test]
    fn display() {
        assert_eq!(Isk::from(4.5).to_string(), "4.50 ISK");
    }
}
