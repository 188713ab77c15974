pub mod cursor;
pub mod memory_store;
pub mod message_store;
pub mod pg_message_store;
