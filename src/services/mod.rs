pub mod completion_service;
pub mod message_service;
