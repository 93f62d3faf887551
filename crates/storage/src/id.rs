//! Opaque 128-bit identifiers.
//!
//! Artifacts (source files) and tree objects are both identified by UUIDs
//! upstream, but mixing them up is an easy mistake to make and a hard one to
//! spot, so they get separate types.

use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new random identifier.
            pub fn new_v4() -> Self {
                Self(Uuid::new_v4())
            }

            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub const fn from_u128(value: u128) -> Self {
                Self(Uuid::from_u128(value))
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }
        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.hyphenated().fmt(f)
            }
        }
        impl FromStr for $name {
            type Err = uuid::Error;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }
    };
}

identifier!(
    /// Identifier of a source file; the cache key for every derived artifact.
    ArtifactId
);
identifier!(
    /// Identifier of an object in the upstream object tree.
    ObjectId
);

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("5f0c3a52-8e4b-4d7c-9a0e-3c1f2b7d6e11")]
    #[case("5F0C3A52-8E4B-4D7C-9A0E-3C1F2B7D6E11")]
    #[case("  5f0c3a52-8e4b-4d7c-9a0e-3c1f2b7d6e11 ")]
    #[case("5f0c3a528e4b4d7c9a0e3c1f2b7d6e11")]
    fn test_parse_and_display(#[case] input: &str) {
        let id: ArtifactId = input.parse().unwrap();
        assert_eq!(id.to_string(), "5f0c3a52-8e4b-4d7c-9a0e-3c1f2b7d6e11");
    }

    #[rstest]
    #[case("")]
    #[case("not-a-uuid")]
    #[case("5f0c3a52-8e4b-4d7c-9a0e")]
    fn test_parse_invalid(#[case] input: &str) {
        assert!(input.parse::<ObjectId>().is_err());
    }

    #[test]
    fn test_random_ids_differ() {
        assert_ne!(ArtifactId::new_v4(), ArtifactId::new_v4());
    }
}
