//! Value objects shared by the price-list model.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Money amount represented in cents to avoid floating point issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money {
    /// Amount in cents (e.g., 1000 = $10.00)
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Returns the share of this amount left after the margin is taken,
    /// rounded half-up to the cent.
    ///
    /// Returns `None` when the intermediate product overflows.
    pub fn less_margin(&self, margin: Margin) -> Option<Money> {
        let kept = i64::from(100 - margin.percent());
        let scaled = self.cents.checked_mul(kept)?.checked_add(50)?;
        Some(Money {
            cents: scaled.div_euclid(100),
        })
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.unsigned_abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

/// Retailer margin as a whole percentage in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Margin(u32);

impl Margin {
    /// Creates a margin, rejecting values above 100%.
    pub fn new(percent: u32) -> Result<Self, ValidationError> {
        if percent > 100 {
            return Err(ValidationError::InvalidMargin { percent });
        }
        Ok(Self(percent))
    }

    /// Returns the margin percentage.
    pub fn percent(&self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for Margin {
    type Error = ValidationError;

    fn try_from(percent: u32) -> Result<Self, Self::Error> {
        Self::new(percent)
    }
}

impl From<Margin> for u32 {
    fn from(margin: Margin) -> Self {
        margin.0
    }
}

impl std::fmt::Display for Margin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}
