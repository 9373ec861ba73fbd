//! Database opening and versioned schema migrations.
//!
//! The schema version lives in `PRAGMA user_version`. Each migration is an
//! additive step tagged with the version it produces; opening a database runs
//! every step above the stored version inside one `BEGIN IMMEDIATE`
//! transaction, so concurrent openers serialize on SQLite's write lock and
//! only the first one performs the upgrade.

use crate::error::StoreError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use tracing::{info, warn};

/// Schema version this build reads and writes.
pub const SCHEMA_VERSION: u32 = 2;

enum Step {
    Sql(&'static str),
    /// `ALTER TABLE .. ADD COLUMN` guarded by a `pragma_table_info` lookup,
    /// since SQLite has no `ADD COLUMN IF NOT EXISTS`.
    AddColumn {
        table: &'static str,
        column: &'static str,
        definition: &'static str,
    },
}

struct Migration {
    version: u32,
    description: &'static str,
    steps: &'static [Step],
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create clipped_pages with url and timestamp indexes",
        steps: &[
            Step::Sql(
                r#"
                CREATE TABLE IF NOT EXISTS clipped_pages (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL DEFAULT '',
                    url TEXT NOT NULL,
                    timestamp TEXT NOT NULL,
                    content TEXT NOT NULL DEFAULT '',
                    favicon TEXT
                )
                "#,
            ),
            Step::Sql("CREATE INDEX IF NOT EXISTS idx_clipped_pages_url ON clipped_pages(url)"),
            Step::Sql(
                "CREATE INDEX IF NOT EXISTS idx_clipped_pages_timestamp ON clipped_pages(timestamp)",
            ),
        ],
    },
    Migration {
        version: 2,
        description: "add optional word_count and reading_time",
        steps: &[
            Step::AddColumn {
                table: "clipped_pages",
                column: "word_count",
                definition: "INTEGER",
            },
            Step::AddColumn {
                table: "clipped_pages",
                column: "reading_time",
                definition: "INTEGER",
            },
        ],
    },
];

/// Result of a migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationOutcome {
    pub from_version: u32,
    pub to_version: u32,
}

impl MigrationOutcome {
    pub fn upgraded(&self) -> bool {
        self.from_version != self.to_version
    }
}

/// Open the database at `db_path` and bring it to [`SCHEMA_VERSION`].
pub async fn init_db(db_path: &str, max_connections: u32) -> Result<SqlitePool, StoreError> {
    let pool = open_pool(db_path, max_connections).await?;

    if let Err(err) = migrate_to(&pool, SCHEMA_VERSION).await {
        pool.close().await;
        return Err(err);
    }

    info!("Database initialized successfully at {}", db_path);
    Ok(pool)
}

/// Open a pool without touching the schema.
pub async fn open_pool(db_path: &str, max_connections: u32) -> Result<SqlitePool, StoreError> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(StoreError::unavailable)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true);

    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .after_connect(|conn, _meta| Box::pin(async move { configure_pragmas_conn(conn).await }))
        .connect_with(options)
        .await
        .map_err(StoreError::unavailable)
}

/// Run every migration step above the stored version, up to `target`.
///
/// Re-running against a database already at `target` is a no-op. A database
/// whose stored version is newer than `target` is refused.
pub async fn migrate_to(pool: &SqlitePool, target: u32) -> Result<MigrationOutcome, StoreError> {
    let mut conn = pool.acquire().await.map_err(StoreError::unavailable)?;

    sqlx::query("BEGIN IMMEDIATE")
        .execute(&mut *conn)
        .await
        .map_err(StoreError::unavailable)?;

    match apply_pending(&mut conn, target).await {
        Ok(outcome) => {
            sqlx::query("COMMIT")
                .execute(&mut *conn)
                .await
                .map_err(StoreError::unavailable)?;
            if outcome.upgraded() {
                info!(
                    from = outcome.from_version,
                    to = outcome.to_version,
                    "Schema upgraded"
                );
            }
            Ok(outcome)
        }
        Err(err) => {
            if let Err(rollback_err) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                warn!(error = %rollback_err, "Rollback after failed migration also failed");
            }
            Err(err)
        }
    }
}

async fn apply_pending(
    conn: &mut SqliteConnection,
    target: u32,
) -> Result<MigrationOutcome, StoreError> {
    let current = read_user_version(conn)
        .await
        .map_err(StoreError::unavailable)?;

    if current > target {
        return Err(StoreError::StoreUnavailable(format!(
            "database schema version {} is newer than supported {}",
            current, target
        )));
    }

    for migration in MIGRATIONS
        .iter()
        .filter(|m| m.version > current && m.version <= target)
    {
        info!(
            version = migration.version,
            "Applying migration: {}", migration.description
        );
        for step in migration.steps {
            apply_step(conn, step).await.map_err(StoreError::unavailable)?;
        }
    }

    if current < target {
        // PRAGMA arguments cannot be bound.
        sqlx::query(&format!("PRAGMA user_version = {}", target))
            .execute(&mut *conn)
            .await
            .map_err(StoreError::unavailable)?;
    }

    Ok(MigrationOutcome {
        from_version: current,
        to_version: current.max(target),
    })
}

async fn apply_step(conn: &mut SqliteConnection, step: &Step) -> Result<(), sqlx::Error> {
    match step {
        Step::Sql(sql) => {
            sqlx::query(sql).execute(&mut *conn).await?;
        }
        Step::AddColumn {
            table,
            column,
            definition,
        } => {
            let exists: i64 = sqlx::query(
                "SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?",
            )
            .bind(*table)
            .bind(*column)
            .fetch_one(&mut *conn)
            .await?
            .get(0);

            if exists == 0 {
                sqlx::query(&format!(
                    "ALTER TABLE {} ADD COLUMN {} {}",
                    table, column, definition
                ))
                .execute(&mut *conn)
                .await?;
            }
        }
    }
    Ok(())
}

async fn read_user_version(conn: &mut SqliteConnection) -> Result<u32, sqlx::Error> {
    let row = sqlx::query("PRAGMA user_version")
        .fetch_one(&mut *conn)
        .await?;
    let version: i64 = row.get(0);
    // Negative values only come from files this crate never wrote.
    u32::try_from(version)
        .map_err(|_| sqlx::Error::Decode(format!("invalid schema version {}", version).into()))
}

/// Read the stored schema version through the pool.
pub async fn schema_version(pool: &SqlitePool) -> Result<u32, sqlx::Error> {
    let mut conn = pool.acquire().await?;
    read_user_version(&mut conn).await
}

/// Configure SQLite pragmas for durability and concurrent access.
async fn configure_pragmas_conn(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    // Set first so the journal_mode switch below waits out concurrent openers.
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&mut *conn)
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&mut *conn)
        .await?;

    // journal_mode returns the actual mode set; must use fetch to get result
    let row = sqlx::query("PRAGMA journal_mode = WAL")
        .fetch_one(&mut *conn)
        .await?;
    let journal_mode: String = row.get(0);
    tracing::debug!("SQLite journal_mode set to: {}", journal_mode);

    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&mut *conn)
        .await?;

    Ok(())
}
