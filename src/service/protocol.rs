//! clipkeep - Wire protocol
//!
//! A connection carries one request and one response. The request is a
//! single JSON line; the response is a single JSON status line followed by
//! raw body bytes until EOF, so list output stays byte-exact.

use serde::{Deserialize, Serialize};

use crate::clipboard::source::ClipSelection;
use crate::history::store::Tier;

/// Protocol error type
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Client request, one per connection.
///
/// Lines and patterns are clipboard-derived bytes with no encoding
/// guarantee, so they travel base64-encoded inside the JSON envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    List,
    Copy {
        #[serde(with = "b64")]
        line: Vec<u8>,
        #[serde(default = "default_copy_selections")]
        selections: Vec<ClipSelection>,
    },
    Print {
        #[serde(with = "b64")]
        line: Vec<u8>,
        #[serde(default)]
        unindent: bool,
    },
    Clear {
        #[serde(with = "b64")]
        pattern: Vec<u8>,
        tier: Tier,
    },
    ClearAll {
        tier: Tier,
    },
}

fn default_copy_selections() -> Vec<ClipSelection> {
    vec![ClipSelection::Clipboard]
}

impl Request {
    pub fn to_line(&self) -> Result<String, ProtocolError> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    pub fn from_line(line: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(line.trim_end())?)
    }
}

/// Status line preceding the response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Lookup outcome for copy/print; a miss is not an error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub found: Option<bool>,
    /// Whether clear removed at least one entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleared: Option<bool>,
}

impl Status {
    pub fn ok() -> Self {
        Self {
            ok: true,
            error: None,
            found: None,
            cleared: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(message.into()),
            found: None,
            cleared: None,
        }
    }

    pub fn found(found: bool) -> Self {
        Self {
            found: Some(found),
            ..Self::ok()
        }
    }

    pub fn cleared(cleared: bool) -> Self {
        Self {
            cleared: Some(cleared),
            ..Self::ok()
        }
    }

    pub fn to_line(&self) -> Result<String, ProtocolError> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    pub fn from_line(line: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(line.trim_end())?)
    }
}

mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_survive_the_wire() {
        let requests = [
            Request::List,
            Request::Copy {
                line: b"some line \xff".to_vec(),
                selections: vec![ClipSelection::Primary, ClipSelection::Clipboard],
            },
            Request::Print {
                line: b"line".to_vec(),
                unindent: true,
            },
            Request::Clear {
                pattern: b"line\0".to_vec(),
                tier: Tier::Ephemeral,
            },
            Request::ClearAll { tier: Tier::All },
        ];
        for request in requests {
            let line = request.to_line().unwrap();
            assert!(line.ends_with('\n'));
            assert_eq!(Request::from_line(&line).unwrap(), request);
        }
    }

    #[test]
    fn copy_selections_default_to_clipboard() {
        let parsed =
            Request::from_line(r#"{"op":"copy","line":"bGluZQ=="}"#).unwrap();
        assert_eq!(
            parsed,
            Request::Copy {
                line: b"line".to_vec(),
                selections: vec![ClipSelection::Clipboard],
            }
        );
    }

    #[test]
    fn invalid_tier_is_rejected() {
        assert!(Request::from_line(r#"{"op":"clear_all","tier":"bogus"}"#).is_err());
    }

    #[test]
    fn status_round_trip() {
        let status = Status::found(false);
        let parsed = Status::from_line(&status.to_line().unwrap()).unwrap();
        assert_eq!(parsed, status);
        assert!(parsed.ok);
        assert_eq!(parsed.found, Some(false));
    }
}
