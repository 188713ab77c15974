// repositories/pg_message_store.rs

use std::error::Error as _;

use async_trait::async_trait;
use deadpool_postgres::{Pool, PoolError};
use tokio_postgres::error::SqlState;
use tokio_postgres::Row;
use tracing::{debug, error};

use crate::error::{StoreCause, StoreError, StoreFailureKind};
use crate::models::message::{Message, MessagePage, Timestamp};
use crate::repositories::cursor::{Cursor, CursorKey};
use crate::repositories::message_store::{canonical_created_at, sort_by_instant, MessageStore};

/// Message store backed by one Postgres table laid out like a document
/// store item: partition key `conversation_id`, sort key `created_at`.
pub struct PgMessageStore {
    pool: Pool,
    table: String,
    endpoint: Option<String>,
}

impl PgMessageStore {
    /// `table` must already be a validated identifier; it is interpolated
    /// into SQL.
    pub fn new(pool: Pool, table: impl Into<String>, endpoint: Option<String>) -> Self {
        Self {
            pool,
            table: table.into(),
            endpoint,
        }
    }

    fn insert_sql(&self) -> String {
        format!(
            "INSERT INTO {} (conversation_id, created_at, message_id, sender, body) \
             VALUES ($1, $2, $3, $4, $5)",
            self.table
        )
    }

    fn page_sql(&self, after_cursor: bool) -> String {
        let resume = if after_cursor {
            "AND (created_at, message_id) > ($2, $3) "
        } else {
            ""
        };
        let limit = if after_cursor { "$4" } else { "$2" };
        format!(
            "SELECT conversation_id, created_at, message_id, sender, body \
             FROM {} \
             WHERE conversation_id = $1 {}\
             ORDER BY created_at ASC, message_id ASC \
             LIMIT {}",
            self.table, resume, limit
        )
    }

    fn classify_pool(&self, err: &PoolError) -> StoreCause {
        match err {
            PoolError::Backend(pg) => self.classify(pg),
            PoolError::Timeout(_) => StoreCause::new(
                StoreFailureKind::Unreachable {
                    endpoint: self.endpoint.clone(),
                },
                err.to_string(),
            ),
            _ => StoreCause::other(err.to_string()),
        }
    }

    fn classify(&self, err: &tokio_postgres::Error) -> StoreCause {
        let kind = failure_kind(err, self.endpoint.as_deref());
        StoreCause::new(kind, err.to_string())
    }
}

/// Maps a driver error onto the failure kinds callers can act on.
fn failure_kind(err: &tokio_postgres::Error, endpoint: Option<&str>) -> StoreFailureKind {
    if let Some(code) = err.code() {
        return kind_for_sqlstate(code);
    }

    let io_failure = err
        .source()
        .map(|source| source.is::<std::io::Error>())
        .unwrap_or(false);
    if io_failure || err.is_closed() {
        return StoreFailureKind::Unreachable {
            endpoint: endpoint.map(ToString::to_string),
        };
    }

    StoreFailureKind::Other
}

fn kind_for_sqlstate(code: &SqlState) -> StoreFailureKind {
    if *code == SqlState::INVALID_PASSWORD
        || *code == SqlState::INVALID_AUTHORIZATION_SPECIFICATION
    {
        StoreFailureKind::Credentials
    } else if *code == SqlState::UNDEFINED_TABLE || *code == SqlState::INVALID_CATALOG_NAME {
        StoreFailureKind::ResourceNotFound
    } else {
        StoreFailureKind::Other
    }
}

fn row_to_message(row: &Row) -> Message {
    Message {
        conversation_id: row.get(0),
        created_at: Timestamp::Text(row.get(1)),
        message_id: row.get(2),
        sender: row.get(3),
        body: row.get(4),
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn put_message(&self, message: &Message) -> Result<(), StoreError> {
        let created_at = canonical_created_at(message)?;

        let client = self.pool.get().await.map_err(|e| {
            error!("Failed to get client from pool: {}", e);
            StoreError::Write(self.classify_pool(&e))
        })?;

        client
            .execute(
                self.insert_sql().as_str(),
                &[
                    &message.conversation_id,
                    &created_at,
                    &message.message_id,
                    &message.sender,
                    &message.body,
                ],
            )
            .await
            .map_err(|e| {
                error!("Error adding message: {}", e);
                StoreError::Write(self.classify(&e))
            })?;

        debug!(
            "Stored message {} in conversation {}",
            message.message_id, message.conversation_id
        );
        Ok(())
    }

    async fn query_messages(
        &self,
        conversation_id: &str,
        cursor: Option<&Cursor>,
        page_size: usize,
    ) -> Result<MessagePage, StoreError> {
        let resume = cursor
            .map(|c| c.decode_for(conversation_id))
            .transpose()?;

        let page_size = page_size.max(1);
        // One extra row tells us whether another page follows.
        let fetch = (page_size + 1) as i64;

        let client = self.pool.get().await.map_err(|e| {
            error!("Failed to get client from pool: {}", e);
            StoreError::Read(self.classify_pool(&e))
        })?;

        let rows = match &resume {
            Some(key) => {
                client
                    .query(
                        self.page_sql(true).as_str(),
                        &[&conversation_id, &key.created_at, &key.message_id, &fetch],
                    )
                    .await
            }
            None => {
                client
                    .query(self.page_sql(false).as_str(), &[&conversation_id, &fetch])
                    .await
            }
        }
        .map_err(|e| {
            error!("Error retrieving messages: {}", e);
            StoreError::Read(self.classify(&e))
        })?;

        let has_more = rows.len() > page_size;
        let rows = &rows[..rows.len().min(page_size)];

        let next_cursor = match (has_more, rows.last()) {
            (true, Some(last)) => Some(Cursor::encode(&CursorKey {
                conversation_id: conversation_id.to_string(),
                created_at: last.get(1),
                message_id: last.get(2),
            })?),
            _ => None,
        };

        let mut items: Vec<Message> = rows.iter().map(row_to_message).collect();
        sort_by_instant(&mut items);

        Ok(MessagePage { items, next_cursor })
    }

    async fn close(&self) {
        self.pool.close();
    }
}
