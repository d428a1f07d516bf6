//! Opaque identifiers for courses, sequences and units.
//!
//! The LMS hands these out as usage keys (`block-v1:Org+Course+Run+type@...`).
//! We never parse them; they are compared and echoed back verbatim.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! opaque_ref {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the raw identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Route segments are malformed when blank.
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

opaque_ref!(
    /// Identifier of a course run.
    CourseRef
);
opaque_ref!(
    /// Identifier of a sequence (subsection) within a course.
    SequenceRef
);
opaque_ref!(
    /// Identifier of a unit (vertical) within a sequence.
    UnitRef
);
