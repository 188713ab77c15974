// repositories/message_store.rs

use async_trait::async_trait;

use crate::error::{StoreCause, StoreError};
use crate::models::message::{Message, MessagePage};
use crate::repositories::cursor::Cursor;

/// Persistence for chat messages, keyed by conversation and creation time.
///
/// Implementations are shared across requests, so they must be safe for
/// concurrent use through `&self`.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Writes one message. `created_at` is normalized to its canonical string
    /// form before it reaches storage.
    async fn put_message(&self, message: &Message) -> Result<(), StoreError>;

    /// Reads up to `page_size` messages of a conversation, oldest first,
    /// resuming after `cursor` when one is given. The returned page carries a
    /// cursor only if more messages follow.
    async fn query_messages(
        &self,
        conversation_id: &str,
        cursor: Option<&Cursor>,
        page_size: usize,
    ) -> Result<MessagePage, StoreError>;

    /// Releases the backing connections. Called once at shutdown.
    async fn close(&self) {}
}

/// Re-sorts a page by the parsed instant of each message. Stores already
/// return key order, but rows written before timestamps were normalized may
/// not compare correctly as strings.
pub fn sort_by_instant(messages: &mut [Message]) {
    messages.sort_by(|a, b| a.cmp_by_instant(b));
}

/// Normalizes a message's timestamp for writing.
pub(crate) fn canonical_created_at(message: &Message) -> Result<String, StoreError> {
    message
        .created_at
        .canonical()
        .map_err(|e| StoreError::Write(StoreCause::other(e.to_string())))
}
