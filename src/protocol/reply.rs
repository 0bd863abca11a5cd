//! `phx_reply` payload parsing.

use serde::Deserialize;
use serde_json::Value;

use crate::error::MuxError;

/// Outcome reported by the server for a request.
///
/// Channels may reply with any status string; everything but `"ok"` is a
/// failure.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum ReplyStatus {
    /// Request succeeded.
    Ok,
    /// Request failed.
    Error,
    /// Application-defined status.
    Other(String),
}

impl ReplyStatus {
    /// Returns `true` for `"ok"`.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Returns the status as sent on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Other(status) => status,
        }
    }
}

impl From<String> for ReplyStatus {
    fn from(status: String) -> Self {
        match status.as_str() {
            "ok" => Self::Ok,
            "error" => Self::Error,
            _ => Self::Other(status),
        }
    }
}

/// Parsed `phx_reply` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Reply {
    /// Success or failure.
    pub status: ReplyStatus,
    /// Server-supplied body; `null` when absent.
    #[serde(default)]
    pub response: Value,
}

impl Reply {
    /// Parses a reply payload.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::MalformedFrame`] if `status` is missing or is not
    /// a string.
    pub fn from_payload(payload: Value) -> Result<Self, MuxError> {
        serde_json::from_value(payload).map_err(|e| MuxError::MalformedFrame(e.to_string()))
    }

    /// Returns the `events` list a join acknowledgement declared.
    ///
    /// Non-string entries are skipped; a missing list yields nothing.
    #[must_use]
    pub fn declared_events(&self) -> Vec<String> {
        self.response
            .get("events")
            .and_then(Value::as_array)
            .map(|events| {
                events
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_ok_reply_with_events() {
        let Ok(reply) = Reply::from_payload(json!({
            "status": "ok",
            "response": {"events": ["chat", 7, "game_event"]}
        })) else {
            panic!("valid reply");
        };
        assert_eq!(reply.status, ReplyStatus::Ok);
        assert_eq!(reply.declared_events(), vec!["chat", "game_event"]);
    }

    #[test]
    fn missing_response_is_null() {
        let Ok(reply) = Reply::from_payload(json!({"status": "error"})) else {
            panic!("valid reply");
        };
        assert_eq!(reply.status, ReplyStatus::Error);
        assert_eq!(reply.response, Value::Null);
        assert!(reply.declared_events().is_empty());
    }

    #[test]
    fn custom_status_is_kept() {
        let Ok(reply) = Reply::from_payload(json!({"status": "retry", "response": {}})) else {
            panic!("custom status is a valid reply");
        };
        assert_eq!(reply.status, ReplyStatus::Other("retry".to_string()));
        assert!(!reply.status.is_ok());
        assert_eq!(reply.status.as_str(), "retry");
    }

    #[test]
    fn missing_status_is_malformed() {
        assert!(Reply::from_payload(json!({"response": {}})).is_err());
        assert!(Reply::from_payload(json!({"status": 1})).is_err());
    }
}
