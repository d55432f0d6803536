use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use std::path::Path;

use quickdesk_runtime::migrations::{load_migrations_from_dir, MigrationRunner};
use quickdesk_runtime::Database;

/// Manage database migrations.
#[derive(Parser)]
pub struct MigrateCommand {
    #[command(subcommand)]
    pub action: MigrateAction,

    /// Configuration file path.
    #[arg(short, long, default_value = "quickdesk.toml", global = true)]
    pub config: String,

    /// Directory of site-specific SQL migrations.
    #[arg(short, long, default_value = "migrations", global = true)]
    pub migrations_dir: String,
}

#[derive(Subcommand)]
pub enum MigrateAction {
    /// Apply the built-in schema and any pending site migrations.
    Up,

    /// Show which migrations have been applied.
    Status,
}

impl MigrateCommand {
    pub async fn execute(self) -> Result<()> {
        let config = super::load_config(&self.config)?;

        let db = Database::from_config(&config.database).await?;
        let runner = MigrationRunner::new(db.pool().clone());
        let extra = load_migrations_from_dir(Path::new(&self.migrations_dir))?;

        println!();
        println!("  {} Migrations", style("QuickDesk").bold().cyan());
        println!();

        match self.action {
            MigrateAction::Up => {
                println!("  {} Running pending migrations...", style("→").dim());
                let applied = runner.run(extra).await?;
                if applied.is_empty() {
                    println!("  {} Schema is up to date", style("ℹ").blue());
                } else {
                    for name in &applied {
                        println!("  {} Applied {}", style("✓").green(), style(name).cyan());
                    }
                }
            }

            MigrateAction::Status => {
                let status = runner.status(extra).await?;
                let pending = status.iter().filter(|m| m.applied_at.is_none()).count();

                for m in &status {
                    match m.applied_at {
                        Some(at) => println!(
                            "  {} {} {} ({})",
                            style("✓").green(),
                            style(&m.name).cyan(),
                            style("at").dim(),
                            at.format("%Y-%m-%d %H:%M:%S")
                        ),
                        None => println!("  {} {}", style("○").yellow(), style(&m.name).yellow()),
                    }
                }

                println!();
                println!(
                    "  {} {} applied, {} pending",
                    style("ℹ").blue(),
                    status.len() - pending,
                    pending
                );
            }
        }
        println!();

        db.close().await;
        Ok(())
    }
}
