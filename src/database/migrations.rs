use tokio_postgres::Client;

/// Creates the messages table and its lookup index if they do not exist.
///
/// The layout mirrors a document store item: `conversation_id` is the
/// partition key and `created_at` (canonical ISO-8601 text) the sort key.
/// `message_id` completes the primary key so two messages written in the
/// same millisecond do not collide.
pub async fn apply_migrations(client: &Client, table: &str) -> Result<(), String> {
    let create_table_query = format!(
        "
        CREATE TABLE IF NOT EXISTS {table} (
            conversation_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            message_id TEXT NOT NULL,
            sender TEXT NOT NULL,
            body TEXT NOT NULL,
            PRIMARY KEY (conversation_id, created_at, message_id)
        )
    "
    );
    client
        .execute(create_table_query.as_str(), &[])
        .await
        .map_err(|e| format!("Error creating {} table: {}", table, e))?;

    let create_index_query = format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {table}_message_id_idx ON {table} (message_id)"
    );
    client
        .execute(create_index_query.as_str(), &[])
        .await
        .map_err(|e| format!("Error creating {} message_id index: {}", table, e))?;

    Ok(())
}
