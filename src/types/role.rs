use std::fmt;

use serde::{Deserialize, Serialize};

/// Author of a stored chat turn.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human at the keyboard.
    User,

    /// A bot answering through the model server.
    Assistant,
}

impl Role {
    /// Returns the lowercase name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(to_value(Role::User).unwrap(), json!("user"));
        assert_eq!(to_value(Role::Assistant).unwrap(), json!("assistant"));
    }
}
