use crate::model::session::SessionId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }
}

/// Which half of the offer/answer exchange a description belongs to.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

impl SdpType {
    pub fn as_str(self) -> &'static str {
        match self {
            SdpType::Offer => "offer",
            SdpType::Answer => "answer",
        }
    }
}

impl fmt::Display for SdpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SdpType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "offer" => Ok(SdpType::Offer),
            "answer" => Ok(SdpType::Answer),
            other => Err(format!("unknown sdp type '{other}'")),
        }
    }
}

/// A complete session description as it is stored in the signaling relay.
///
/// Serialized as `{"type": "offer", "sdp": "v=0..."}`. The `type` field is
/// what validates a value read back from a last-write-wins key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalingMessage {
    #[serde(rename = "type")]
    pub kind: SdpType,
    pub sdp: String,
}

impl SignalingMessage {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Answer,
            sdp: sdp.into(),
        }
    }

    pub fn is(&self, kind: SdpType) -> bool {
        self.kind == kind && !self.sdp.trim().is_empty()
    }
}

/// Address of one leaf key in the signaling store: `sessions/<key>/<type>`.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct SignalPath {
    pub session: SessionId,
    pub kind: SdpType,
}

impl SignalPath {
    pub fn new(session: SessionId, kind: SdpType) -> Self {
        Self { session, kind }
    }

    pub fn offer(session: &SessionId) -> Self {
        Self::new(session.clone(), SdpType::Offer)
    }

    pub fn answer(session: &SessionId) -> Self {
        Self::new(session.clone(), SdpType::Answer)
    }
}

impl fmt::Display for SignalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sessions/{}/{}", self.session.as_key(), self.kind)
    }
}
