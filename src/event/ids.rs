use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::shared::AppError;

/// Local part plus owning domain, shared by every identifier kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct Id {
    local: String,
    domain: String,
}

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident, $sigil:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Id);

        impl $name {
            pub const SIGIL: char = $sigil;

            pub fn new(local: impl Into<String>, domain: impl Into<String>) -> Self {
                Self(Id {
                    local: local.into(),
                    domain: domain.into(),
                })
            }

            pub fn local(&self) -> &str {
                &self.0.local
            }

            pub fn domain(&self) -> &str {
                &self.0.domain
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}:{}", Self::SIGIL, self.0.local, self.0.domain)
            }
        }

        impl FromStr for $name {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let rest = s.strip_prefix(Self::SIGIL).ok_or_else(|| {
                    AppError::BadRequest(format!(
                        "'{}' must start with '{}'",
                        s,
                        Self::SIGIL
                    ))
                })?;
                match rest.split_once(':') {
                    Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
                        Ok(Self::new(local, domain))
                    }
                    _ => Err(AppError::BadRequest(format!(
                        "'{}' is not of the form {}local:domain",
                        s,
                        Self::SIGIL
                    ))),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(de::Error::custom)
            }
        }
    };
}

identifier!(
    /// A user, e.g. `@alice:example.org`
    UserId,
    '@'
);

identifier!(
    /// A room, e.g. `!a8Fj2kQ0:example.org`
    RoomId,
    '!'
);

identifier!(
    /// The logical identity of an event, e.g. `$x1y2:example.org`.
    ///
    /// Not unique per push: the stream coalesces pushes sharing an id.
    EventId,
    '$'
);
