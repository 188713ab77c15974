use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::MAX_PAGE_SIZE,
    error::ChatError,
    models::message::{
        AiReplyRequest, ListMessagesQuery, Message, MessagePage, SendMessageRequest, Timestamp,
    },
    repositories::{cursor::Cursor, message_store::MessageStore},
    services::completion_service::ChatCompleter,
};

/// Entry point for every chat operation. Holds no per-request state; one
/// instance is shared by all handlers.
pub struct MessageService {
    store: Arc<dyn MessageStore>,
    completer: Arc<dyn ChatCompleter>,
    bot_sender: String,
    page_size: usize,
    max_history: usize,
}

impl MessageService {
    pub fn new(
        store: Arc<dyn MessageStore>,
        completer: Arc<dyn ChatCompleter>,
        bot_sender: impl Into<String>,
        page_size: usize,
        max_history: usize,
    ) -> Self {
        Self {
            store,
            completer,
            bot_sender: bot_sender.into(),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
            max_history,
        }
    }

    /// Stores a message typed by a person and returns it as persisted.
    pub async fn send_human_message(
        &self,
        request: SendMessageRequest,
    ) -> Result<Message, ChatError> {
        request.check()?;

        let message = Message {
            message_id: Uuid::new_v4().to_string(),
            conversation_id: request.conversation_id.unwrap_or_default(),
            sender: request.sender.unwrap_or_default(),
            body: request.message.unwrap_or_default(),
            created_at: Timestamp::now(),
        };

        self.store.put_message(&message).await?;

        info!(
            "Message {} sent by {} in conversation {}",
            message.message_id, message.sender, message.conversation_id
        );
        Ok(message)
    }

    /// Asks the completion API for a reply to the user message, stores the
    /// reply under the bot's name and returns it. Nothing is stored if the
    /// upstream call fails.
    pub async fn request_ai_reply(&self, request: AiReplyRequest) -> Result<Message, ChatError> {
        request.check()?;

        let conversation_id = request.conversation_id.unwrap_or_default();
        let user_message = request.user_message.unwrap_or_default();
        let history = request.previous_messages.unwrap_or_default();

        let reply = self
            .completer
            .generate_reply(&user_message, &history, self.max_history)
            .await
            .map_err(|e| {
                warn!("AI reply for conversation {} failed: {}", conversation_id, e);
                ChatError::from(e)
            })?;

        let message = Message {
            message_id: Uuid::new_v4().to_string(),
            conversation_id,
            sender: self.bot_sender.clone(),
            body: reply,
            created_at: Timestamp::now(),
        };

        self.store
            .put_message(&message)
            .await
            .map_err(ChatError::ReplyStore)?;

        info!(
            "AI reply {} stored in conversation {}",
            message.message_id, message.conversation_id
        );
        Ok(message)
    }

    /// Reads one page of a conversation, oldest first. A blank cursor reads
    /// from the start.
    pub async fn list_messages(&self, query: ListMessagesQuery) -> Result<MessagePage, ChatError> {
        query.check()?;

        let conversation_id = query.conversation_id.unwrap_or_default();
        let cursor = query
            .cursor
            .filter(|c| !c.trim().is_empty())
            .map(Cursor::from);
        let page_size = query
            .page_size
            .map(|n| n.clamp(1, MAX_PAGE_SIZE))
            .unwrap_or(self.page_size);

        let page = self
            .store
            .query_messages(&conversation_id, cursor.as_ref(), page_size)
            .await?;
        Ok(page)
    }
}
