use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

pub type DbConn = SqlitePool;

pub async fn establish_db() -> Result<DbConn, sqlx::Error> {
    let db_url = std::env::var("DATABASE_URL").unwrap_or("sqlite://shareroom.db".to_string());
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await
}

/// In-memory database for tests. A single connection keeps every query on
/// the same sqlite instance.
pub async fn memory_db() -> Result<DbConn, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
}

/// Creates the tables if they do not exist. The partial unique index on
/// room_participants is what makes concurrent joins for one fingerprint
/// collapse to a single live row; the engine never locks around it.
pub async fn init_schema(pool: &DbConn) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS rooms (
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            host_fingerprint TEXT NOT NULL,
            is_locked INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            last_activity_at INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS room_participants (
            id TEXT PRIMARY KEY,
            room_id TEXT NOT NULL,
            username TEXT NOT NULL,
            fingerprint TEXT NOT NULL,
            is_muted INTEGER NOT NULL DEFAULT 0,
            is_banned INTEGER NOT NULL DEFAULT 0,
            joined_at INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_live_participant
         ON room_participants (room_id, fingerprint) WHERE is_banned = 0",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS banned_fingerprints (
            room_id TEXT NOT NULL,
            fingerprint TEXT NOT NULL,
            PRIMARY KEY (room_id, fingerprint)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            room_id TEXT NOT NULL,
            participant_id TEXT,
            username TEXT NOT NULL,
            content TEXT,
            message_type TEXT NOT NULL,
            reply_to_id TEXT,
            file_url TEXT,
            file_name TEXT,
            file_type TEXT,
            created_at INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    Ok(())
}
