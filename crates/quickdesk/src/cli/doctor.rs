use anyhow::Result;
use clap::Parser;
use console::style;
use std::path::Path;

use quickdesk_runtime::Database;

/// Tables the built-in schema creates.
const DESK_TABLES: &[&str] = &[
    "app_settings",
    "categories",
    "notifications",
    "profiles",
    "ticket_attachments",
    "ticket_comments",
    "ticket_votes",
    "tickets",
];

/// Check database, schema and storage readiness.
#[derive(Parser)]
pub struct DoctorCommand {
    /// Configuration file path.
    #[arg(short, long, default_value = "quickdesk.toml")]
    pub config: String,
}

impl DoctorCommand {
    pub async fn execute(self) -> Result<()> {
        let config = super::load_config(&self.config)?;
        let mut problems = 0;

        println!();
        println!("  {} Doctor", style("QuickDesk").bold().cyan());
        println!();

        match Database::from_config(&config.database).await {
            Ok(db) => {
                report(
                    db.health_check().await.map_err(Into::into),
                    "Database reachable",
                    &mut problems,
                );

                let found = db.existing_tables(DESK_TABLES).await?;
                let missing = missing_tables(&found);
                let tables = if missing.is_empty() {
                    Ok(())
                } else {
                    Err(anyhow::anyhow!(
                        "missing {}, run `quickdesk migrate up`",
                        missing.join(", ")
                    ))
                };
                report(tables, "Schema present", &mut problems);
                db.close().await;
            }
            Err(e) => report(Err(e.into()), "Database reachable", &mut problems),
        }

        let storage = Path::new(&config.storage.root).join(&config.storage.bucket);
        report(
            check_writable(&storage).await,
            &format!("Storage writable at {}", storage.display()),
            &mut problems,
        );

        if config.security.auth.skip_verification {
            println!(
                "  {} Token signatures are not verified",
                style("!").yellow().bold()
            );
        } else if config.security.auth.jwt_secret.is_none() {
            report(
                Err(anyhow::anyhow!("security.auth.jwt_secret is not set")),
                "Token verification configured",
                &mut problems,
            );
        }

        println!();
        if problems > 0 {
            anyhow::bail!("{} check(s) failed", problems);
        }
        println!("  {} All checks passed", style("✓").green());
        println!();
        Ok(())
    }
}

fn report(result: Result<()>, label: &str, problems: &mut usize) {
    match result {
        Ok(()) => println!("  {} {}", style("✓").green(), label),
        Err(e) => {
            *problems += 1;
            println!("  {} {}: {}", style("✗").red(), label, e);
        }
    }
}

fn missing_tables(found: &[String]) -> Vec<&'static str> {
    DESK_TABLES
        .iter()
        .copied()
        .filter(|t| !found.iter().any(|f| f == t))
        .collect()
}

/// Create the directory if needed and round-trip a probe file through it.
async fn check_writable(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let probe = dir.join(".quickdesk-doctor");
    tokio::fs::write(&probe, b"ok").await?;
    tokio::fs::remove_file(&probe).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tables() {
        let found = vec!["tickets".to_string(), "profiles".to_string()];
        let missing = missing_tables(&found);
        assert_eq!(missing.len(), DESK_TABLES.len() - 2);
        assert!(missing.contains(&"ticket_votes"));
        assert!(!missing.contains(&"tickets"));
    }

    #[tokio::test]
    async fn test_check_writable() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("storage/attachments");
        check_writable(&target).await.unwrap();
        assert!(target.is_dir());
        assert!(!target.join(".quickdesk-doctor").exists());
    }
}
