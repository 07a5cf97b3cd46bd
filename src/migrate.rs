use sqlx::SqlitePool;

/// Create the index schema. Idempotent.
///
/// Entries are returned in `rowid` order, which is insertion order, so
/// similarity ties resolve to the earlier entry.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entries (
            id TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            source TEXT NOT NULL,
            embedding BLOB NOT NULL,
            dims INTEGER NOT NULL,
            model TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_entries_source ON entries(source)")
        .execute(pool)
        .await?;

    Ok(())
}
