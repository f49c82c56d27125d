//! Value objects for the booking domain.

use serde::{Deserialize, Serialize};

/// Money amount represented in cents to avoid floating point issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in cents (e.g., 1000 = 10.00)
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Converts a decimal amount in major units (as sent by the inventory
    /// service) to cents, rounding to the nearest cent.
    pub fn from_major(amount: f64) -> Self {
        Self {
            cents: (amount * 100.0).round() as i64,
        }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the amount in major units.
    pub fn as_major(&self) -> f64 {
        self.cents as f64 / 100.0
    }

    /// Multiplies by a quantity.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money {
            cents: self.cents * i64::from(quantity),
        }
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

/// Journey type chosen by the booker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripType {
    #[default]
    OneWay,
    RoundTrip,
}

impl TripType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripType::OneWay => "ONE_WAY",
            TripType::RoundTrip => "ROUND_TRIP",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ONE_WAY" => Some(TripType::OneWay),
            "ROUND_TRIP" => Some(TripType::RoundTrip),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "MALE",
            Gender::Female => "FEMALE",
            Gender::Other => "OTHER",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "MALE" => Some(Gender::Male),
            "FEMALE" => Some(Gender::Female),
            "OTHER" => Some(Gender::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MealType {
    Veg,
    NonVeg,
}

impl MealType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::Veg => "VEG",
            MealType::NonVeg => "NON_VEG",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "VEG" => Some(MealType::Veg),
            "NON_VEG" => Some(MealType::NonVeg),
            _ => None,
        }
    }
}

/// Normalizes a seat number for comparison and storage (trimmed, uppercase).
///
/// Returns `None` for blank input.
pub fn normalize_seat(seat: &str) -> Option<String> {
    let trimmed = seat.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_uppercase())
    }
}

/// Normalizes a list of seat numbers, dropping blanks and keeping order.
pub fn normalize_seats<'a>(seats: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    seats.into_iter().filter_map(normalize_seat).collect()
}
