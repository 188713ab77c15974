use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Datelike, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use validator::Validate;

use crate::error::ValidationError;
use crate::repositories::cursor::Cursor;
use crate::utils::field_validator::{first_failure, not_blank};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimestampError {
    #[error("Timestamp {0} ms is out of range")]
    OutOfRange(i64),
    #[error("Unrecognized timestamp: {0:?}")]
    Unparseable(String),
}

/// A message timestamp as callers supply it: epoch milliseconds or a string.
///
/// Only the canonical string form (RFC 3339, UTC, millisecond precision, `Z`
/// suffix) is ever written to a store.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Timestamp {
    Millis(i64),
    Text(String),
}

impl Timestamp {
    /// The current instant, already in canonical form.
    pub fn now() -> Self {
        Self::from_instant(Utc::now())
    }

    pub fn from_instant(instant: DateTime<Utc>) -> Self {
        Timestamp::Text(instant.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    /// Resolves the timestamp to an instant, whatever form it was stored in.
    ///
    /// Only years 0000 through 9999 are accepted: outside them the canonical
    /// string neither parses back nor sorts with the rest.
    pub fn instant(&self) -> Result<DateTime<Utc>, TimestampError> {
        let instant = match self {
            Timestamp::Millis(ms) => millis_to_instant(*ms)?,
            Timestamp::Text(raw) => parse_text(raw)?,
        };
        if !(0..=9999).contains(&instant.year()) {
            return Err(TimestampError::OutOfRange(instant.timestamp_millis()));
        }
        Ok(instant)
    }

    /// The canonical string this timestamp is persisted as.
    pub fn canonical(&self) -> Result<String, TimestampError> {
        self.instant()
            .map(|instant| instant.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn normalized(&self) -> Result<Timestamp, TimestampError> {
        self.canonical().map(Timestamp::Text)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timestamp::Millis(ms) => write!(f, "{}", ms),
            Timestamp::Text(raw) => f.write_str(raw),
        }
    }
}

fn millis_to_instant(ms: i64) -> Result<DateTime<Utc>, TimestampError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or(TimestampError::OutOfRange(ms))
}

fn parse_text(raw: &str) -> Result<DateTime<Utc>, TimestampError> {
    let trimmed = raw.trim();

    if let Ok(instant) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(instant.with_timezone(&Utc));
    }

    // Epoch millis that were stringified on the way in.
    if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(ms) = trimmed.parse::<i64>() {
            return millis_to_instant(ms);
        }
    }

    // No offset: treated as UTC.
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|_| TimestampError::Unparseable(raw.to_string()))
}

/// A chat message. `body` travels as `message` on the wire; `createdAt`
/// also accepts the legacy `timestamp` key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub message_id: String,
    pub conversation_id: String,
    pub sender: String,
    #[serde(rename = "message")]
    pub body: String,
    #[serde(alias = "timestamp")]
    pub created_at: Timestamp,
}

impl Message {
    /// Orders two messages by the instant of their `created_at`. Messages whose
    /// timestamp cannot be parsed sort after every parseable one.
    pub fn cmp_by_instant(&self, other: &Message) -> Ordering {
        match (self.created_at.instant().ok(), other.created_at.instant().ok()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

/// One page of a conversation, oldest first.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    pub items: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Cursor>,
}

#[derive(Deserialize, Validate, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesQuery {
    #[validate(required(message = "Invalid conversationId"), custom = "not_blank")]
    pub conversation_id: Option<String>,
    pub cursor: Option<String>,
    pub page_size: Option<usize>,
}

impl ListMessagesQuery {
    pub fn check(&self) -> Result<(), ValidationError> {
        self.validate().map_err(|errors| {
            first_failure(
                &errors,
                [("conversation_id", ValidationError::MissingConversationId)],
            )
        })
    }
}

/// Reads a field that should be a string. Any other JSON value is kept as
/// absent so that validation reports it against the field.
fn text_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(text)) => Some(text),
        _ => None,
    })
}

#[derive(Deserialize, Validate, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[serde(default, deserialize_with = "text_or_none")]
    #[validate(required(message = "Invalid conversationId"), custom = "not_blank")]
    pub conversation_id: Option<String>,
    #[serde(default, deserialize_with = "text_or_none")]
    #[validate(required(message = "Invalid sender"), custom = "not_blank")]
    pub sender: Option<String>,
    #[serde(default, deserialize_with = "text_or_none")]
    #[validate(required(message = "Message cannot be empty"), custom = "not_blank")]
    pub message: Option<String>,
}

impl SendMessageRequest {
    /// Runs the field checks and names the first field that failed.
    pub fn check(&self) -> Result<(), ValidationError> {
        self.validate().map_err(|errors| {
            first_failure(
                &errors,
                [
                    ("conversation_id", ValidationError::MissingConversationId),
                    ("sender", ValidationError::MissingSender),
                    ("message", ValidationError::EmptyMessage),
                ],
            )
        })
    }
}

#[derive(Deserialize, Validate, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct AiReplyRequest {
    #[serde(default, deserialize_with = "text_or_none")]
    #[validate(required(message = "Invalid conversationId"), custom = "not_blank")]
    pub conversation_id: Option<String>,
    #[serde(default, deserialize_with = "text_or_none")]
    #[validate(required(message = "User message is required"), custom = "not_blank")]
    pub user_message: Option<String>,
    #[serde(default)]
    pub previous_messages: Option<Vec<Message>>,
}

impl AiReplyRequest {
    pub fn check(&self) -> Result<(), ValidationError> {
        self.validate().map_err(|errors| {
            first_failure(
                &errors,
                [
                    ("conversation_id", ValidationError::MissingConversationId),
                    ("user_message", ValidationError::MissingUserMessage),
                ],
            )
        })
    }
}

#[derive(Serialize, Debug)]
pub struct MessageResponse {
    pub success: bool,
    pub message: Message,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn millis_normalize_to_canonical_string() {
        let ts = Timestamp::Millis(1_700_000_000_000);
        assert_eq!(ts.canonical().unwrap(), "2023-11-14T22:13:20.000Z");
        assert_eq!(
            ts.normalized().unwrap(),
            Timestamp::Text("2023-11-14T22:13:20.000Z".to_string())
        );
    }

    #[test]
    fn offset_strings_normalize_to_utc() {
        let ts = Timestamp::Text("2024-05-01T12:30:00.250+02:00".to_string());
        assert_eq!(ts.canonical().unwrap(), "2024-05-01T10:30:00.250Z");
    }

    #[test]
    fn stringified_millis_and_naive_strings_are_understood() {
        let digits = Timestamp::Text("1700000000000".to_string());
        assert_eq!(digits.canonical().unwrap(), "2023-11-14T22:13:20.000Z");

        let naive = Timestamp::Text("2024-01-02T03:04:05".to_string());
        assert_eq!(naive.canonical().unwrap(), "2024-01-02T03:04:05.000Z");
    }

    #[test]
    fn garbage_is_rejected() {
        let ts = Timestamp::Text("yesterday-ish".to_string());
        assert_eq!(
            ts.canonical(),
            Err(TimestampError::Unparseable("yesterday-ish".to_string()))
        );
        assert!(matches!(
            Timestamp::Millis(i64::MAX).instant(),
            Err(TimestampError::OutOfRange(_))
        ));
    }

    #[test]
    fn years_outside_four_digits_are_out_of_range() {
        let last = Timestamp::Millis(253_402_300_799_999);
        let canonical = last.canonical().unwrap();
        assert_eq!(canonical, "9999-12-31T23:59:59.999Z");
        assert_eq!(
            Timestamp::Text(canonical).instant().unwrap(),
            last.instant().unwrap()
        );

        assert_eq!(
            Timestamp::Millis(-62_167_219_200_000).canonical().unwrap(),
            "0000-01-01T00:00:00.000Z"
        );

        for ms in [253_402_300_800_000, -62_167_219_200_001, -62_198_755_200_000] {
            assert_eq!(
                Timestamp::Millis(ms).canonical(),
                Err(TimestampError::OutOfRange(ms))
            );
        }
    }

    #[test]
    fn send_request_reports_first_bad_field() {
        let request: SendMessageRequest = serde_json::from_value(json!({
            "conversationId": 5,
            "sender": "   ",
            "message": "hi",
        }))
        .unwrap();
        assert_eq!(request.conversation_id, None);
        assert_eq!(request.check(), Err(ValidationError::MissingConversationId));

        let request = SendMessageRequest {
            conversation_id: Some("c1".to_string()),
            sender: Some("alice".to_string()),
            message: Some(" \n".to_string()),
        };
        assert_eq!(request.check(), Err(ValidationError::EmptyMessage));

        let request = SendMessageRequest {
            message: Some("hi".to_string()),
            ..request
        };
        assert_eq!(request.check(), Ok(()));
    }

    #[test]
    fn ai_reply_request_needs_a_user_message() {
        let request: AiReplyRequest =
            serde_json::from_value(json!({ "conversationId": "c1" })).unwrap();
        assert_eq!(request.check(), Err(ValidationError::MissingUserMessage));
        assert!(request.previous_messages.is_none());
    }

    #[test]
    fn now_is_already_canonical() {
        let ts = Timestamp::now();
        assert_eq!(ts.normalized().unwrap(), ts);
    }

    #[test]
    fn message_uses_wire_names() {
        let msg = Message {
            message_id: "m1".to_string(),
            conversation_id: "c1".to_string(),
            sender: "alice".to_string(),
            body: "hi".to_string(),
            created_at: Timestamp::Text("2024-05-01T10:00:00.000Z".to_string()),
        };

        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "messageId": "m1",
                "conversationId": "c1",
                "sender": "alice",
                "message": "hi",
                "createdAt": "2024-05-01T10:00:00.000Z",
            })
        );
    }

    #[test]
    fn legacy_timestamp_key_and_numeric_form_deserialize() {
        let msg: Message = serde_json::from_value(json!({
            "messageId": "m1",
            "conversationId": "c1",
            "sender": "bob",
            "message": "yo",
            "timestamp": 1_700_000_000_000_i64,
        }))
        .unwrap();

        assert_eq!(msg.created_at, Timestamp::Millis(1_700_000_000_000));
    }

    #[test]
    fn unparseable_timestamps_sort_last() {
        let make = |id: &str, ts: Timestamp| Message {
            message_id: id.to_string(),
            conversation_id: "c".to_string(),
            sender: "s".to_string(),
            body: "b".to_string(),
            created_at: ts,
        };
        let bad = make("bad", Timestamp::Text("???".to_string()));
        let good = make("good", Timestamp::Millis(0));

        assert_eq!(good.cmp_by_instant(&bad), Ordering::Less);
        assert_eq!(bad.cmp_by_instant(&good), Ordering::Greater);
    }
}
