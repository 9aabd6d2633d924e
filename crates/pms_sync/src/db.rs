//! Database connection utilities for the local mirror store.

use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};

/// Pragmas applied to every SQLite connection.
///
/// - `journal_mode=WAL` lets the trigger server read run history while a sync writes
/// - `busy_timeout=5000` waits for locks instead of failing a batch immediately
/// - `synchronous=NORMAL` is safe with WAL and keeps batch upserts cheap
const SQLITE_PRAGMAS: [&str; 3] = [
    "PRAGMA journal_mode=WAL",
    "PRAGMA busy_timeout=5000",
    "PRAGMA synchronous=NORMAL",
];

async fn configure_sqlite(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    for pragma in SQLITE_PRAGMAS {
        db.execute(Statement::from_string(backend, pragma.to_string()))
            .await?;
    }
    Ok(())
}

fn is_sqlite_url(database_url: &str) -> bool {
    database_url.starts_with("sqlite:")
}

/// Establish a connection to the mirror database.
///
/// # Arguments
/// * `database_url` - Connection string, e.g. `sqlite:///var/lib/pms-sync/mirror.db?mode=rwc`
///   or `postgres:///pms_mirror`.
///
/// # Errors
/// Returns `DbErr` if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(database_url).await?;

    if is_sqlite_url(database_url) {
        configure_sqlite(&db).await?;
    }

    Ok(db)
}

/// Connect and apply every pending migration.
///
/// This is what the CLI and the integration tests use, so the target tables,
/// the credential singleton and the run log always exist before a sync starts.
///
/// ```ignore
/// let db = pms_sync::connect_and_migrate("sqlite::memory:").await?;
/// ```
#[cfg(feature = "migrate")]
pub async fn connect_and_migrate(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    use sea_orm_migration::MigratorTrait;

    let db = connect(database_url).await?;
    crate::migration::Migrator::up(&db, None).await?;
    Ok(db)
}
