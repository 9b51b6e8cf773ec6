//! Opaque string identifiers. No numeric interpretation is ever applied.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(RouteId);
string_id!(StopId);
string_id!(TripId);
string_id!(ServiceId);
string_id!(
    /// GTFS `direction_id`, kept textual. Absent values become `"0"`.
    DirectionId
);

impl DirectionId {
    pub fn default_direction() -> Self {
        Self::new("0")
    }

    /// Short label used in served-by lists.
    pub fn short_label(&self) -> String {
        match self.as_str() {
            "0" => "In".to_string(),
            "1" => "Out".to_string(),
            other => other.to_string(),
        }
    }

    pub fn long_label(&self) -> String {
        match self.as_str() {
            "0" => "Inbound".to_string(),
            "1" => "Outbound".to_string(),
            other => format!("Direction {other}"),
        }
    }
}
