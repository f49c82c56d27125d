use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Length of the random suffix used in generated identifiers.
const SUFFIX_LEN: usize = 8;

/// Builds `"{prefix}-XXXXXXXX"` from the first hex digits of a fresh v4 UUID.
fn random_code(prefix: &str) -> String {
    let simple = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", simple[..SUFFIX_LEN].to_uppercase())
}

/// Identifier of a flight owned by the inventory authority.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlightId(String);

impl FlightId {
    /// Creates a flight ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the flight ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Passenger name record: the externally visible booking identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pnr(String);

impl Pnr {
    /// Prefix of every generated PNR.
    pub const PREFIX: &'static str = "PNR";

    /// Generates a new random PNR (`PNR-XXXXXXXX`).
    pub fn generate() -> Self {
        Self(random_code(Self::PREFIX))
    }

    /// Wraps an existing PNR value.
    pub fn new(pnr: impl Into<String>) -> Self {
        Self(pnr.into())
    }

    /// Returns the PNR as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Correlation token shared only between the booking saga and the
/// inventory authority. Never returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingReference(String);

impl BookingReference {
    /// Prefix of every generated booking reference.
    pub const PREFIX: &'static str = "BR";

    /// Generates a new random reference (`BR-XXXXXXXX`).
    pub fn generate() -> Self {
        Self(random_code(Self::PREFIX))
    }

    /// Wraps an existing reference value.
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Returns the reference as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Cancellation releases seats under the booking's PNR.
impl From<&Pnr> for BookingReference {
    fn from(pnr: &Pnr) -> Self {
        Self(pnr.0.clone())
    }
}

macro_rules! string_id_impls {
    ($($ty:ty),+) => {
        $(
            impl std::fmt::Display for $ty {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl From<String> for $ty {
                fn from(s: String) -> Self {
                    Self(s)
                }
            }

            impl From<&str> for $ty {
                fn from(s: &str) -> Self {
                    Self(s.to_string())
                }
            }

            impl AsRef<str> for $ty {
                fn as_ref(&self) -> &str {
                    &self.0
                }
            }
        )+
    };
}

string_id_impls!(FlightId, Pnr, BookingReference);
