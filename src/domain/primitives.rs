//! Domain primitives: record identifiers and time helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Wrap an existing identifier.
            pub fn new(id: impl Into<String>) -> Self {
                $name(id.into())
            }

            /// Generate a fresh random identifier.
            pub fn generate() -> Self {
                $name(uuid::Uuid::new_v4().to_string())
            }

            /// Get the identifier as a string reference.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(
    /// Identifier of a boost campaign.
    BoostId
);
string_id!(
    /// Identifier of a seller earning record.
    EarningId
);
string_id!(
    /// Identifier of a disposal request.
    DisposalId
);
string_id!(
    /// Identifier of a marketplace order.
    OrderId
);
string_id!(
    /// Identifier of a product listing.
    ProductId
);
string_id!(
    /// Identifier of a user (buyer or seller).
    UserId
);

/// Convert an instant to epoch milliseconds for storage.
pub fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

/// Convert stored epoch milliseconds back to an instant.
///
/// Returns `None` when the value is outside chrono's representable range.
pub fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}
