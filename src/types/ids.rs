//! Identifier newtypes for stored records.
//!
//! Identities are assigned by the store and increase strictly within each
//! record kind, so the order in which records were created is the order of
//! their ids. The newtypes keep a job id from being passed where a function
//! id is expected.

use serde::{Deserialize, Serialize};

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wraps a raw identifier.
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Returns the raw identifier.
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

record_id!(
    /// Identifier of a registered function.
    FunctionId
);

record_id!(
    /// Identifier of a job.
    ///
    /// ```
    /// use fnstore::JobId;
    ///
    /// let first = JobId::new(1);
    /// let second = JobId::new(2);
    /// assert!(first < second);
    /// assert_eq!(second.to_string(), "2");
    /// assert_eq!(serde_json::to_value(first).unwrap(), 1);
    /// ```
    JobId
);

record_id!(
    /// Identifier of a job collection.
    CollectionId
);
