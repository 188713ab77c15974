// app_state.rs

use std::sync::Arc;

use crate::services::message_service::MessageService;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    /// Message service shared by every handler
    pub messages: Arc<MessageService>,
}

impl AppState {
    /// Creates a new instance of AppState
    ///
    /// # Arguments
    /// * `messages` - The message service, already wired to its store and completer
    pub fn new(messages: MessageService) -> Self {
        Self {
            messages: Arc::new(messages),
        }
    }
}
