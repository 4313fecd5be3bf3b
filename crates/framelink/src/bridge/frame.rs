//! Wire frames exchanged by the two ends of a channel.
//!
//! Every request carries a [`CallId`]; the peer echoes it on the reply so the
//! sender can route the outcome back to the waiting call.

use serde::{Deserialize, Serialize};

/// Correlation identifier for one in-flight call.
///
/// UUID v4 so ids from the two ends of a channel never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(uuid::Uuid);

impl CallId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        let uuid = uuid::Uuid::parse_str(s)?;
        Ok(Self(uuid))
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single frame on the channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    Request {
        id: CallId,
        /// Channel namespace; frames for other channels are ignored.
        channel: String,
        message: serde_json::Value,
    },

    Reply {
        id: CallId,
        channel: String,
        outcome: ReplyOutcome,
    },
}

impl Frame {
    pub fn channel(&self) -> &str {
        match self {
            Self::Request { channel, .. } | Self::Reply { channel, .. } => channel,
        }
    }

    pub fn id(&self) -> CallId {
        match self {
            Self::Request { id, .. } | Self::Reply { id, .. } => *id,
        }
    }
}

/// How the peer answered a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReplyOutcome {
    Resolved { value: serde_json::Value },
    /// The receiver failed; `message` is the rendered error chain.
    Rejected { message: String },
}

impl ReplyOutcome {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }
}
