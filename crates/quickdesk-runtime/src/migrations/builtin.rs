//! Schema migrations shipped with the binary.

use super::runner::Migration;

const QUICKDESK_SQL: &str = include_str!("../../migrations/0001_quickdesk.sql");

/// Applied in order before any migrations loaded from disk.
pub fn builtin_migrations() -> Vec<Migration> {
    vec![Migration::new("0001_quickdesk", QUICKDESK_SQL)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_schema_tables() {
        let migrations = builtin_migrations();
        assert_eq!(migrations[0].name, "0001_quickdesk");

        let sql = &migrations[0].sql;
        for table in [
            "profiles",
            "categories",
            "tickets",
            "ticket_comments",
            "ticket_attachments",
            "ticket_votes",
            "notifications",
            "app_settings",
        ] {
            assert!(
                sql.contains(&format!("CREATE TABLE IF NOT EXISTS {} (", table)),
                "missing table {}",
                table
            );
        }
        assert!(sql.contains("PRIMARY KEY (ticket_id, user_id)"));
        assert!(sql.contains("pg_notify"));
    }

    #[test]
    fn test_builtin_schema_splits_cleanly() {
        let statements = super::super::runner::split_sql_statements(&builtin_migrations()[0].sql);
        assert!(statements
            .iter()
            .any(|s| s.contains("CREATE OR REPLACE FUNCTION quickdesk_notify_change")
                && s.ends_with("LANGUAGE plpgsql")));
        assert!(statements
            .iter()
            .all(|s| !s.trim_start().starts_with("upserts")));
    }
}
