//! Applies schema migrations under a Postgres advisory lock so only one
//! server instance migrates at a time.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use quickdesk_core::error::{DeskError, Result};
use sqlx::PgPool;
use tracing::{debug, info, warn};

/// "QDESK" in ASCII.
const MIGRATION_LOCK_ID: i64 = 0x5144_4553_4B;

#[derive(Debug, Clone)]
pub struct Migration {
    /// Sort key and identity, e.g. `0001_quickdesk`.
    pub name: String,
    pub sql: String,
}

impl Migration {
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
        }
    }
}

/// Whether a known migration has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub name: String,
    pub applied_at: Option<DateTime<Utc>>,
}

pub struct MigrationRunner {
    pool: PgPool,
}

impl MigrationRunner {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply every pending migration, built-in ones first. Returns the names
    /// applied by this call.
    pub async fn run(&self, extra: Vec<Migration>) -> Result<Vec<String>> {
        self.acquire_lock().await?;
        let result = self.run_locked(extra).await;
        if let Err(e) = self.release_lock().await {
            warn!(error = %e, "Failed to release migration lock");
        }
        result
    }

    /// Built-in and extra migrations with their applied timestamps.
    pub async fn status(&self, extra: Vec<Migration>) -> Result<Vec<MigrationStatus>> {
        self.ensure_migrations_table().await?;
        let applied = self.applied().await?;
        Ok(super::builtin_migrations()
            .into_iter()
            .chain(extra)
            .map(|m| MigrationStatus {
                applied_at: applied.get(&m.name).copied(),
                name: m.name,
            })
            .collect())
    }

    async fn run_locked(&self, extra: Vec<Migration>) -> Result<Vec<String>> {
        self.ensure_migrations_table().await?;
        let applied = self.applied().await?;
        debug!(count = applied.len(), "Loaded applied migrations");

        let mut newly_applied = Vec::new();
        for migration in super::builtin_migrations().into_iter().chain(extra) {
            if applied.contains_key(&migration.name) {
                continue;
            }
            self.apply(&migration).await?;
            newly_applied.push(migration.name);
        }
        Ok(newly_applied)
    }

    async fn acquire_lock(&self) -> Result<()> {
        sqlx::query("SELECT pg_advisory_lock($1)")
            .bind(MIGRATION_LOCK_ID)
            .execute(&self.pool)
            .await
            .map_err(|e| DeskError::Database(format!("Failed to acquire migration lock: {}", e)))?;
        debug!("Migration lock acquired");
        Ok(())
    }

    async fn release_lock(&self) -> Result<()> {
        sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(MIGRATION_LOCK_ID)
            .execute(&self.pool)
            .await
            .map_err(|e| DeskError::Database(format!("Failed to release migration lock: {}", e)))?;
        Ok(())
    }

    async fn ensure_migrations_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS quickdesk_migrations (
                id SERIAL PRIMARY KEY,
                name VARCHAR(255) UNIQUE NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DeskError::Database(format!("Failed to create migrations table: {}", e)))?;
        Ok(())
    }

    async fn applied(&self) -> Result<HashMap<String, DateTime<Utc>>> {
        let rows: Vec<(String, DateTime<Utc>)> =
            sqlx::query_as("SELECT name, applied_at FROM quickdesk_migrations")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| DeskError::Database(format!("Failed to read migrations: {}", e)))?;
        Ok(rows.into_iter().collect())
    }

    async fn apply(&self, migration: &Migration) -> Result<()> {
        info!(migration = %migration.name, "Applying migration");

        for statement in split_sql_statements(&migration.sql) {
            if is_comment_only(&statement) {
                continue;
            }
            sqlx::query(&statement)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    DeskError::Database(format!(
                        "Migration '{}' failed: {}",
                        migration.name, e
                    ))
                })?;
        }

        sqlx::query("INSERT INTO quickdesk_migrations (name) VALUES ($1)")
            .bind(&migration.name)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DeskError::Database(format!(
                    "Failed to record migration '{}': {}",
                    migration.name, e
                ))
            })?;
        Ok(())
    }
}

fn is_comment_only(statement: &str) -> bool {
    statement.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with("--")
    })
}

/// Split a script on top-level semicolons. Semicolons inside dollar-quoted
/// bodies (`$$ ... $$`, `$tag$ ... $tag$`) do not split.
pub(crate) fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut open_tag: Option<String> = None;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);

        if c == '$' {
            let mut tag = String::from("$");
            while let Some(&next) = chars.peek() {
                if next == '$' {
                    tag.push(next);
                    current.push(next);
                    chars.next();
                    break;
                } else if next.is_alphanumeric() || next == '_' {
                    tag.push(next);
                    current.push(next);
                    chars.next();
                } else {
                    break;
                }
            }

            if tag.len() >= 2 && tag.ends_with('$') {
                match &open_tag {
                    Some(open) if *open == tag => open_tag = None,
                    Some(_) => {}
                    None => open_tag = Some(tag),
                }
            }
        }

        if c == ';' && open_tag.is_none() {
            let statement = current.trim().trim_end_matches(';').trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let statement = current.trim().trim_end_matches(';').trim();
    if !statement.is_empty() {
        statements.push(statement.to_string());
    }
    statements
}

/// Read `*.sql` files from `dir`, sorted by file name. A missing directory
/// yields no migrations.
pub fn load_migrations_from_dir(dir: &Path) -> Result<Vec<Migration>> {
    if !dir.exists() {
        debug!(dir = %dir.display(), "No migrations directory");
        return Ok(Vec::new());
    }

    let mut migrations = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().map(|e| e == "sql").unwrap_or(false) {
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| DeskError::Config(format!("Bad migration file name: {}", path.display())))?
                .to_string();
            let sql = std::fs::read_to_string(&path)?;
            migrations.push(Migration::new(name, sql));
        }
    }
    migrations.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(migrations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_sorted_sql_only() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("0003_views.sql"), "SELECT 3;").unwrap();
        fs::write(dir.path().join("0002_seed.sql"), "SELECT 2;").unwrap();
        fs::write(dir.path().join("notes.txt"), "not sql").unwrap();
        fs::write(dir.path().join("0004_old.sql.bak"), "SELECT 4;").unwrap();

        let migrations = load_migrations_from_dir(dir.path()).unwrap();
        let names: Vec<_> = migrations.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["0002_seed", "0003_views"]);
    }

    #[test]
    fn test_load_missing_dir() {
        let migrations = load_migrations_from_dir(Path::new("/nonexistent/quickdesk")).unwrap();
        assert!(migrations.is_empty());
    }

    #[test]
    fn test_split_plain_statements() {
        let statements = split_sql_statements("CREATE TABLE a (id INT); INSERT INTO a VALUES (1);\nSELECT 1");
        assert_eq!(
            statements,
            vec!["CREATE TABLE a (id INT)", "INSERT INTO a VALUES (1)", "SELECT 1"]
        );
    }

    #[test]
    fn test_split_keeps_do_blocks_whole() {
        let sql = r#"
DO $$ BEGIN
    CREATE TYPE mood AS ENUM ('ok');
EXCEPTION WHEN duplicate_object THEN NULL;
END $$;
SELECT 2;
"#;
        let statements = split_sql_statements(sql);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("DO $$"));
        assert!(statements[0].ends_with("END $$"));
        assert_eq!(statements[1], "SELECT 2");
    }

    #[test]
    fn test_split_named_dollar_tags() {
        let sql = "CREATE FUNCTION f() RETURNS int AS $body$ SELECT 1; $body$ LANGUAGE sql; SELECT 3;";
        let statements = split_sql_statements(sql);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].contains("SELECT 1;"));
    }

    #[test]
    fn test_comment_only() {
        assert!(is_comment_only("-- just a note\n\n"));
        assert!(!is_comment_only("-- note\nSELECT 1"));
    }
}
