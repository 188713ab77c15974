// repositories/cursor.rs

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Continuation token handed out with a page of messages. Callers treat it as
/// an opaque string and pass it back unchanged to fetch the next page.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Cursor(String);

/// The last key a page ended on. Only stores look inside a cursor.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub(crate) struct CursorKey {
    #[serde(rename = "c")]
    pub conversation_id: String,
    #[serde(rename = "t")]
    pub created_at: String,
    #[serde(rename = "m")]
    pub message_id: String,
}

impl Cursor {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn encode(key: &CursorKey) -> Result<Self, StoreError> {
        let json = serde_json::to_vec(key).map_err(|_| StoreError::InvalidCursor)?;
        Ok(Cursor(URL_SAFE_NO_PAD.encode(json)))
    }

    /// Decodes the key, rejecting tokens that were not minted for `conversation_id`.
    pub(crate) fn decode_for(&self, conversation_id: &str) -> Result<CursorKey, StoreError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(self.0.trim())
            .map_err(|_| StoreError::InvalidCursor)?;
        let key: CursorKey =
            serde_json::from_slice(&bytes).map_err(|_| StoreError::InvalidCursor)?;

        if key.conversation_id != conversation_id {
            return Err(StoreError::InvalidCursor);
        }
        Ok(key)
    }
}

impl From<String> for Cursor {
    fn from(raw: String) -> Self {
        Cursor(raw)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> CursorKey {
        CursorKey {
            conversation_id: "room-1".to_string(),
            created_at: "2024-05-01T10:00:00.000Z".to_string(),
            message_id: "0b1c".to_string(),
        }
    }

    #[test]
    fn survives_a_trip_through_json() {
        let cursor = Cursor::encode(&key()).unwrap();
        let wire = serde_json::to_string(&cursor).unwrap();
        let back: Cursor = serde_json::from_str(&wire).unwrap();

        assert_eq!(back, cursor);
        assert_eq!(back.decode_for("room-1").unwrap(), key());
    }

    #[test]
    fn is_url_safe() {
        let cursor = Cursor::encode(&key()).unwrap();
        assert!(cursor
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn rejects_garbage() {
        let cursor = Cursor::from("not a cursor!".to_string());
        assert_eq!(cursor.decode_for("room-1"), Err(StoreError::InvalidCursor));

        let json_but_wrong = Cursor::from(URL_SAFE_NO_PAD.encode(b"{\"x\":1}"));
        assert_eq!(
            json_but_wrong.decode_for("room-1"),
            Err(StoreError::InvalidCursor)
        );
    }

    #[test]
    fn rejects_cursor_from_another_conversation() {
        let cursor = Cursor::encode(&key()).unwrap();
        assert_eq!(cursor.decode_for("room-2"), Err(StoreError::InvalidCursor));
    }
}
