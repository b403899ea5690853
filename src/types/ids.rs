use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

// Every identifier is an opaque v4 UUID; the wrappers only keep them from being mixed up.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $id_type:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a fresh random identifier.
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(raw).map(Self).map_err(|err| {
                    Error::validation(
                        format!("invalid {}: {err}", $id_type),
                        Some($id_type.to_string()),
                    )
                })
            }
        }
    };
}

define_id!(
    /// Identifies a [`ChatSession`](crate::ChatSession).
    SessionId,
    "session-id"
);
define_id!(
    /// Identifies a [`ChatMessage`](crate::ChatMessage).
    MessageId,
    "message-id"
);
define_id!(
    /// Identifies a [`BotProfile`](crate::BotProfile).
    BotId,
    "bot-id"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_distinct() {
        assert_ne!(SessionId::generate(), SessionId::generate());
    }

    #[test]
    fn parse_round_trips_display() {
        let id = MessageId::generate();
        let parsed: MessageId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = "not-a-uuid".parse::<BotId>().unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("bot-id"));
    }
}
