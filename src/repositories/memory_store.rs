// repositories/memory_store.rs

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{StoreCause, StoreError};
use crate::models::message::{Message, MessagePage, Timestamp};
use crate::repositories::cursor::{Cursor, CursorKey};
use crate::repositories::message_store::{canonical_created_at, sort_by_instant, MessageStore};

/// Sort key inside a conversation: canonical `created_at`, then `message_id`.
type RecordKey = (String, String);

/// Process-local store with the same key layout and paging behavior as the
/// Postgres store. Used for local runs and tests.
#[derive(Default)]
pub struct MemoryMessageStore {
    conversations: RwLock<HashMap<String, BTreeMap<RecordKey, Message>>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_error(write: bool) -> StoreError {
        let cause = StoreCause::other("Message store lock poisoned");
        if write {
            StoreError::Write(cause)
        } else {
            StoreError::Read(cause)
        }
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn put_message(&self, message: &Message) -> Result<(), StoreError> {
        let created_at = canonical_created_at(message)?;
        let record = Message {
            created_at: Timestamp::Text(created_at.clone()),
            ..message.clone()
        };

        let mut conversations = self
            .conversations
            .write()
            .map_err(|_| Self::lock_error(true))?;
        conversations
            .entry(message.conversation_id.clone())
            .or_default()
            .insert((created_at, message.message_id.clone()), record);
        Ok(())
    }

    async fn query_messages(
        &self,
        conversation_id: &str,
        cursor: Option<&Cursor>,
        page_size: usize,
    ) -> Result<MessagePage, StoreError> {
        let start = match cursor {
            Some(cursor) => {
                let key = cursor.decode_for(conversation_id)?;
                Bound::Excluded((key.created_at, key.message_id))
            }
            None => Bound::Unbounded,
        };

        let conversations = self
            .conversations
            .read()
            .map_err(|_| Self::lock_error(false))?;
        let Some(records) = conversations.get(conversation_id) else {
            return Ok(MessagePage {
                items: Vec::new(),
                next_cursor: None,
            });
        };

        let page_size = page_size.max(1);
        let mut window: Vec<(&RecordKey, &Message)> = records
            .range((start, Bound::Unbounded))
            .take(page_size + 1)
            .collect();

        let has_more = window.len() > page_size;
        window.truncate(page_size);

        let next_cursor = match (has_more, window.last()) {
            (true, Some(((created_at, message_id), _))) => Some(Cursor::encode(&CursorKey {
                conversation_id: conversation_id.to_string(),
                created_at: created_at.clone(),
                message_id: message_id.clone(),
            })?),
            _ => None,
        };

        let mut items: Vec<Message> = window.into_iter().map(|(_, m)| m.clone()).collect();
        sort_by_instant(&mut items);

        Ok(MessagePage { items, next_cursor })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: &str, conversation: &str, created_at: Timestamp) -> Message {
        Message {
            message_id: id.to_string(),
            conversation_id: conversation.to_string(),
            sender: "alice".to_string(),
            body: format!("body of {}", id),
            created_at,
        }
    }

    #[tokio::test]
    async fn numeric_timestamp_reads_back_canonical() {
        let store = MemoryMessageStore::new();
        store
            .put_message(&msg("m1", "c1", Timestamp::Millis(1_700_000_000_000)))
            .await
            .unwrap();

        let page = store.query_messages("c1", None, 50).await.unwrap();

        assert_eq!(page.items.len(), 1);
        let stored = &page.items[0].created_at;
        assert_eq!(
            *stored,
            Timestamp::Text("2023-11-14T22:13:20.000Z".to_string())
        );
        assert_eq!(
            stored.instant().unwrap(),
            Timestamp::Millis(1_700_000_000_000).instant().unwrap()
        );
    }

    #[tokio::test]
    async fn returns_ascending_regardless_of_insert_order() {
        let store = MemoryMessageStore::new();
        for (id, ms) in [("c", 3_000), ("a", 1_000), ("d", 4_000), ("b", 2_000)] {
            store
                .put_message(&msg(id, "c1", Timestamp::Millis(ms)))
                .await
                .unwrap();
        }
        // Same instant written as an offset string.
        store
            .put_message(&msg(
                "e",
                "c1",
                Timestamp::Text("1970-01-01T01:00:05+01:00".to_string()),
            ))
            .await
            .unwrap();

        let page = store.query_messages("c1", None, 50).await.unwrap();
        let ids: Vec<_> = page.items.iter().map(|m| m.message_id.as_str()).collect();

        assert_eq!(ids, vec!["a", "b", "c", "d", "e"]);
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn paging_by_one_matches_a_single_read() {
        let store = MemoryMessageStore::new();
        for i in 0..7 {
            // Two messages share each instant to exercise the tie-breaker.
            store
                .put_message(&msg(&format!("m{}", i), "c1", Timestamp::Millis(i / 2)))
                .await
                .unwrap();
        }

        let full = store.query_messages("c1", None, 100).await.unwrap();
        assert!(full.next_cursor.is_none());

        let mut paged = Vec::new();
        let mut cursor: Option<Cursor> = None;
        loop {
            let page = store
                .query_messages("c1", cursor.as_ref(), 1)
                .await
                .unwrap();
            assert!(page.items.len() <= 1);
            paged.extend(page.items);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        assert_eq!(paged, full.items);
    }

    #[tokio::test]
    async fn exact_multiple_of_page_size_ends_without_cursor() {
        let store = MemoryMessageStore::new();
        for i in 0..4 {
            store
                .put_message(&msg(&format!("m{}", i), "c1", Timestamp::Millis(i)))
                .await
                .unwrap();
        }

        let first = store.query_messages("c1", None, 2).await.unwrap();
        assert_eq!(first.items.len(), 2);
        let second = store
            .query_messages("c1", first.next_cursor.as_ref(), 2)
            .await
            .unwrap();
        assert_eq!(second.items.len(), 2);
        assert!(second.next_cursor.is_none());
    }

    #[tokio::test]
    async fn conversations_are_isolated() {
        let store = MemoryMessageStore::new();
        store
            .put_message(&msg("x", "room-a", Timestamp::Millis(1)))
            .await
            .unwrap();

        let other = store.query_messages("room-b", None, 10).await.unwrap();
        assert!(other.items.is_empty());
        assert!(other.next_cursor.is_none());
    }

    #[tokio::test]
    async fn cursor_from_other_conversation_is_rejected() {
        let store = MemoryMessageStore::new();
        for i in 0..2 {
            store
                .put_message(&msg(&format!("m{}", i), "room-a", Timestamp::Millis(i)))
                .await
                .unwrap();
        }
        let page = store.query_messages("room-a", None, 1).await.unwrap();
        let cursor = page.next_cursor.expect("more messages follow");

        let err = store
            .query_messages("room-b", Some(&cursor), 1)
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::InvalidCursor);
    }

    #[tokio::test]
    async fn unparseable_timestamp_is_not_written() {
        let store = MemoryMessageStore::new();
        let err = store
            .put_message(&msg("m1", "c1", Timestamp::Text("later".to_string())))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Write(_)));
        assert!(store
            .query_messages("c1", None, 10)
            .await
            .unwrap()
            .items
            .is_empty());
    }

    #[tokio::test]
    async fn far_range_timestamps_are_not_written() {
        let store = MemoryMessageStore::new();
        store
            .put_message(&msg("y2023", "c1", Timestamp::Millis(1_700_000_000_000)))
            .await
            .unwrap();
        store
            .put_message(&msg("y9999", "c1", Timestamp::Millis(253_402_300_799_999)))
            .await
            .unwrap();

        for (id, ms) in [("y10000", 253_402_300_800_000), ("before0", -62_198_755_200_000)] {
            let err = store
                .put_message(&msg(id, "c1", Timestamp::Millis(ms)))
                .await
                .unwrap_err();
            assert!(matches!(err, StoreError::Write(_)));
        }

        let full = store.query_messages("c1", None, 50).await.unwrap().items;
        let ids: Vec<_> = full.iter().map(|m| m.message_id.as_str()).collect();
        assert_eq!(ids, vec!["y2023", "y9999"]);

        let mut paged = Vec::new();
        let mut cursor = None;
        loop {
            let page = store.query_messages("c1", cursor.as_ref(), 1).await.unwrap();
            paged.extend(page.items);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        assert_eq!(paged, full);
    }
}
