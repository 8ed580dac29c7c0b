use anyhow::{bail, Context, Result};
use rusqlite::Connection;

/// Warehouse schema scripts, applied in order. Entry `n` upgrades `user_version` n to n+1.
const SCHEMA_SCRIPTS: &[(&str, &str)] = &[("schema_v1.sql", include_str!("schemas/schema_v1.sql"))];

pub(crate) const CURRENT_SCHEMA_VERSION: i32 = SCHEMA_SCRIPTS.len() as i32;

fn user_version(conn: &Connection) -> Result<i32> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version pragma")
}

/// Bring the warehouse up to [`CURRENT_SCHEMA_VERSION`] in one transaction.
///
/// Returns the version the file was at before upgrading.
pub fn run_migrations(conn: &mut Connection) -> Result<i32> {
    let found = user_version(conn)?;
    if found > CURRENT_SCHEMA_VERSION {
        bail!("warehouse schema v{found} is newer than this build (v{CURRENT_SCHEMA_VERSION})");
    }

    let pending = &SCHEMA_SCRIPTS[found.max(0) as usize..];
    if pending.is_empty() {
        return Ok(found);
    }

    let tx = conn
        .transaction()
        .context("failed to open migration transaction")?;
    for (name, script) in pending {
        tx.execute_batch(script)
            .with_context(|| format!("failed to apply {name}"))?;
    }
    tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)
        .context("failed to update user_version pragma")?;
    tx.commit().context("failed to commit migrations")?;

    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(run_migrations(&mut conn).unwrap(), 0);
        assert_eq!(run_migrations(&mut conn).unwrap(), CURRENT_SCHEMA_VERSION);
        assert_eq!(user_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('watch_facts', 'user_dim', 'show_dim')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 3);
    }

    #[test]
    fn newer_database_is_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION + 1)
            .unwrap();
        assert!(run_migrations(&mut conn).is_err());
    }
}
