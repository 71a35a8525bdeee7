// /////////////////////////////////////////////////////////////////////////////
// Task Scheduler
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Identifiers
//!
//! Globally-unique, time-ordered string identifiers for tasks, resources,
//! and allocator aliases. The specification treats unique-ID generation as
//! an opaque primitive, so these are thin ULID-backed newtypes without the
//! category-specific validation the teacher crate's `GenericId<T>` performs
//! for its domain entities — only the type-safety and time-ordering are
//! worth carrying here.

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

macro_rules! string_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Generates a new globally-unique, time-ordered identifier.
            pub fn new() -> Self {
                Self(Ulid::new().to_string())
            }

            /// Wraps an existing string as an identifier (e.g. a caller-supplied key).
            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(TaskKey, "Stable unique identifier for a submitted task.");
string_id!(ResourceKey, "Stable unique identifier for a concrete Resource.");
string_id!(Alias, "Logical name shared by interchangeable Resources under one allocator.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_unique() {
        let a = TaskKey::new();
        let b = TaskKey::new();
        assert_ne!(a, b);
    }

    #[test]
    fn display_round_trips_through_string() {
        let key = ResourceKey::from("gpu-0");
        assert_eq!(key.as_str(), "gpu-0");
        assert_eq!(format!("{}", key), "gpu-0");
    }
}
