use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of characters in a raw session key.
pub const SESSION_ID_LEN: usize = 12;

/// Characters per group in the display form (`0000-0000-0001`).
const DISPLAY_GROUP: usize = 4;
const DISPLAY_SEPARATOR: char = '-';

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionIdError {
    #[error("session id must have {SESSION_ID_LEN} characters, got {0}")]
    Length(usize),

    #[error("session id contains invalid character {0:?}")]
    InvalidChar(char),
}

/// Stable identifier of one logical pairing.
///
/// The raw form (`000000000001`) is the signaling store key; the display form
/// groups it for humans (`0000-0000-0001`). Parsing accepts both and strips
/// dashes and whitespace, so the two forms always map onto the same id.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct SessionId(String);

impl SessionId {
    pub fn parse(input: &str) -> Result<Self, SessionIdError> {
        let raw: String = input
            .chars()
            .filter(|c| *c != DISPLAY_SEPARATOR && !c.is_whitespace())
            .collect();

        if let Some(bad) = raw.chars().find(|c| !c.is_ascii_alphanumeric()) {
            return Err(SessionIdError::InvalidChar(bad));
        }
        if raw.len() != SESSION_ID_LEN {
            return Err(SessionIdError::Length(raw.chars().count()));
        }

        Ok(Self(raw.to_ascii_uppercase()))
    }

    /// Key used in the signaling store, without separators.
    pub fn as_key(&self) -> &str {
        &self.0
    }

    /// Grouped representation shown to users.
    pub fn display(&self) -> String {
        let mut out = String::with_capacity(SESSION_ID_LEN + SESSION_ID_LEN / DISPLAY_GROUP);
        for (i, c) in self.0.chars().enumerate() {
            if i > 0 && i % DISPLAY_GROUP == 0 {
                out.push(DISPLAY_SEPARATOR);
            }
            out.push(c);
        }
        out
    }
}

impl FromStr for SessionId {
    type Err = SessionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl Serialize for SessionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_key())
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Fixed role of an endpoint for the lifetime of a session.
///
/// Only the offerer creates offers. On the wire the offerer is the `CHILD`
/// (the device being controlled) and the answerer the `PARENT`.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Offerer,
    Answerer,
}

impl Role {
    pub fn wire_label(self) -> &'static str {
        match self {
            Role::Offerer => "CHILD",
            Role::Answerer => "PARENT",
        }
    }

    pub fn peer(self) -> Role {
        match self {
            Role::Offerer => Role::Answerer,
            Role::Answerer => Role::Offerer,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Offerer => f.write_str("offerer"),
            Role::Answerer => f.write_str("answerer"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "offerer" | "offer" | "child" => Ok(Role::Offerer),
            "answerer" | "answer" | "parent" => Ok(Role::Answerer),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}
