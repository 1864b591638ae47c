//! Schema versioning for the collection store.
//!
//! The applied version lives in `PRAGMA user_version`. Each step runs inside
//! its own transaction together with the version bump.

use rusqlite::Connection;
use tracing::debug;

use crate::error::{Error, Result};

use super::schema::{CREATE_CREATED_INDEX, CREATE_ENTRIES_TABLE};

/// A single schema step.
struct Migration {
    version: i32,
    statements: &'static [&'static str],
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        statements: &[CREATE_ENTRIES_TABLE],
    },
    Migration {
        version: 2,
        statements: &[CREATE_CREATED_INDEX],
    },
];

/// The schema version this build expects.
pub const CURRENT_VERSION: i32 = 2;

/// Bring the schema up to [`CURRENT_VERSION`].
///
/// # Errors
///
/// Returns an error if the database is newer than this build or a step fails.
pub fn initialize_schema(conn: &mut Connection) -> Result<()> {
    let version = schema_version(conn)?;
    if version > CURRENT_VERSION {
        return Err(Error::DatabaseMigration {
            message: format!(
                "database schema version {version} is newer than supported version \
                 {CURRENT_VERSION}"
            ),
        });
    }

    for migration in MIGRATIONS.iter().filter(|m| m.version > version) {
        debug!(version = migration.version, "Applying schema migration");
        let tx = conn.transaction()?;
        for statement in migration.statements {
            tx.execute(statement, [])?;
        }
        tx.pragma_update(None, "user_version", migration.version)?;
        tx.commit()?;
    }

    Ok(())
}

/// Read the applied schema version (0 for a fresh database).
///
/// # Errors
///
/// Returns an error if the pragma cannot be read.
pub fn schema_version(conn: &Connection) -> Result<i32> {
    Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
}
