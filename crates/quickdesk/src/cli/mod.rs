mod doctor;
mod migrate;
mod run;

pub use doctor::DoctorCommand;
pub use migrate::MigrateCommand;
pub use run::RunCommand;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::Path;

use quickdesk_core::config::DeskConfig;

/// QuickDesk support desk server.
#[derive(Parser)]
#[command(name = "quickdesk")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the QuickDesk server.
    Run(RunCommand),

    /// Manage database migrations.
    Migrate(MigrateCommand),

    /// Check database, schema and storage readiness.
    Doctor(DoctorCommand),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run(cmd) => cmd.execute().await,
            Commands::Migrate(cmd) => cmd.execute().await,
            Commands::Doctor(cmd) => cmd.execute().await,
        }
    }
}

/// Read `.env`, then the config file, with `${VAR}` substitution.
pub(crate) fn load_config(path: &str) -> Result<DeskConfig> {
    dotenvy::dotenv().ok();

    if !Path::new(path).exists() {
        anyhow::bail!(
            "Configuration file not found: {}\nCopy quickdesk.toml from the repository root and edit it.",
            path
        );
    }
    Ok(DeskConfig::from_file(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_run() {
        let cli = Cli::try_parse_from(["quickdesk", "run", "-p", "3000", "--dev"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_parse_migrate() {
        assert!(Cli::try_parse_from(["quickdesk", "migrate", "status"]).is_ok());
        assert!(Cli::try_parse_from(["quickdesk", "migrate", "sideways"]).is_err());
    }

    #[test]
    fn test_missing_config_file() {
        let err = load_config("/nonexistent/quickdesk.toml").unwrap_err();
        assert!(err.to_string().contains("Configuration file not found"));
    }

    #[test]
    fn test_load_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quickdesk.toml");
        std::fs::write(
            &path,
            "[database]\nurl = \"postgres://localhost/quickdesk\"\n\n[gateway]\nport = 9000\n",
        )
        .unwrap();

        let config = load_config(path.to_str().unwrap()).unwrap();
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.database.url, "postgres://localhost/quickdesk");
    }
}
