//! Validated identifier types used across the Weft crates.
//!
//! All identifiers share the same rules and follow the parse-don't-validate
//! pattern: `parse()` returns a `Result`, and the serde representation round
//! trips through the underlying `String` with validation on the way in.
//!
//! Validation rules:
//! - Non-empty, at most 128 characters
//! - No leading or trailing whitespace
//! - Only alphanumeric characters, hyphens, underscores, and dots

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length for any identifier.
const MAX_ID_LENGTH: usize = 128;

/// Error type for identifier validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdValidationError {
    /// The identifier string is empty
    #[error("identifier cannot be empty")]
    Empty,
    /// The identifier contains only whitespace
    #[error("identifier cannot be whitespace-only")]
    WhitespaceOnly,
    /// The identifier has leading or trailing whitespace
    #[error("identifier cannot have leading or trailing whitespace")]
    LeadingTrailingWhitespace,
    /// The identifier exceeds the maximum allowed length
    #[error("identifier too long: {0} characters (max 128)")]
    TooLong(usize),
    /// The identifier contains invalid characters
    #[error(
        "identifier can only contain alphanumeric characters, hyphens, underscores, and dots"
    )]
    InvalidCharacters,
}

fn validate(s: &str) -> Result<(), IdValidationError> {
    if s.is_empty() {
        return Err(IdValidationError::Empty);
    }
    if s.trim().is_empty() {
        return Err(IdValidationError::WhitespaceOnly);
    }
    if s != s.trim() {
        return Err(IdValidationError::LeadingTrailingWhitespace);
    }
    if s.len() > MAX_ID_LENGTH {
        return Err(IdValidationError::TooLong(s.len()));
    }
    if !s
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(IdValidationError::InvalidCharacters);
    }
    Ok(())
}

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Parse and validate an identifier from a string.
            ///
            /// Returns an error if the string violates the shared validation
            /// rules (empty, too long, invalid characters, edge whitespace).
            pub fn parse(id: impl AsRef<str>) -> Result<Self, IdValidationError> {
                let s = id.as_ref();
                validate(s)?;
                Ok(Self(s.to_string()))
            }

            /// Get the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Create an identifier without validation.
            ///
            /// Only for tests and inputs that are guaranteed valid; all user
            /// input goes through `parse()`.
            #[doc(hidden)]
            pub fn new_unchecked(id: impl Into<String>) -> Self {
                Self(id.into())
            }
        }

        impl FromStr for $name {
            type Err = IdValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdValidationError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::parse(&s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

identifier! {
    /// Unique identifier for one spawned agent run.
    ///
    /// A run id correlates the lifecycle event stream, the `agent.wait`
    /// polling call, and the completion hook for a single piece of delegated
    /// work.
    RunId
}

identifier! {
    /// Identifier for a declared execution graph.
    GraphId
}

identifier! {
    /// Identifier for a node within an execution graph.
    NodeId
}

identifier! {
    /// Key addressing an agent session (the child session a run executes in,
    /// or the requester session that spawned it).
    SessionKey
}
