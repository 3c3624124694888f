//! Validated storage and repository identifiers.
//!
//! Identifiers become directory names and lock keys, so they must be non-empty, trimmed, and
//! free of path separators.

use crate::{TypesError, TypesResult};
use std::fmt;
use std::str::FromStr;

fn validate(kind: &str, input: &str) -> TypesResult<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TypesError::InvalidIdentifier(format!("{kind} cannot be empty")));
    }
    if trimmed.contains('/') || trimmed.contains('\\') {
        return Err(TypesError::InvalidIdentifier(format!(
            "{kind} cannot contain path separators, got: '{trimmed}'"
        )));
    }
    if trimmed == "." || trimmed == ".." {
        return Err(TypesError::InvalidIdentifier(format!(
            "{kind} cannot be a relative path component, got: '{trimmed}'"
        )));
    }
    Ok(trimmed.to_owned())
}

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(String);

        impl $name {
            /// Validates and wraps an identifier.
            ///
            /// # Errors
            ///
            /// Returns [`TypesError::InvalidIdentifier`] if the trimmed input is empty, contains
            /// `/` or `\`, or is `.`/`..`.
            pub fn new(input: impl AsRef<str>) -> TypesResult<Self> {
                validate($kind, input.as_ref()).map(Self)
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

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = TypesError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Self::new(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

identifier!(
    /// Identifier of a [`Storage`](crate::Storage), unique within the process.
    StorageId,
    "storage id"
);

identifier!(
    /// Identifier of a [`Repository`](crate::Repository), unique within its storage.
    RepositoryId,
    "repository id"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_is_trimmed() {
        let id = RepositoryId::new("  releases ").unwrap();
        assert_eq!(id.as_str(), "releases");
        assert_eq!(id.to_string(), "releases");
    }

    #[test]
    fn test_identifier_rejects_empty_and_separators() {
        assert!(matches!(
            StorageId::new("   "),
            Err(TypesError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            StorageId::new("a/b"),
            Err(TypesError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            RepositoryId::new(".."),
            Err(TypesError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_identifier_serde_validates() {
        let id: StorageId = serde_json::from_str("\"storage0\"").unwrap();
        assert_eq!(id.as_str(), "storage0");

        let bad: Result<StorageId, _> = serde_json::from_str("\"a/b\"");
        assert!(bad.is_err());
    }
}
