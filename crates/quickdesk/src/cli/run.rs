use anyhow::Result;
use clap::Parser;
use console::style;
use tracing::info;

use crate::runtime::Desk;

/// Run the QuickDesk server.
#[derive(Parser)]
pub struct RunCommand {
    /// Configuration file path.
    #[arg(short, long, default_value = "quickdesk.toml")]
    pub config: String,

    /// Port to listen on (overrides config).
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory of site-specific SQL migrations.
    #[arg(long, default_value = "migrations")]
    pub migrations_dir: String,

    /// Debug logging and unverified tokens.
    #[arg(long)]
    pub dev: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub json_logs: bool,
}

impl RunCommand {
    pub async fn execute(self) -> Result<()> {
        init_tracing(self.dev, self.json_logs);

        println!();
        println!(
            "  {}  v{}",
            style("QuickDesk").bold().cyan(),
            env!("CARGO_PKG_VERSION")
        );
        println!();

        let mut config = super::load_config(&self.config)?;
        info!("Loaded configuration from {}", self.config);

        if let Some(port) = self.port {
            config.gateway.port = port;
        }
        if self.dev {
            config.security.auth.skip_verification = true;
        }

        println!(
            "  {} Listening on {}",
            style("→").dim(),
            style(format!("http://0.0.0.0:{}", config.gateway.port)).cyan()
        );
        println!(
            "  {} Attachments under {}",
            style("→").dim(),
            style(&config.storage.root).cyan()
        );
        if self.dev {
            println!(
                "  {} Development mode: token signatures are not verified",
                style("!").yellow().bold()
            );
        }
        println!();

        let desk = Desk::builder()
            .config(config)
            .migrations_dir(&self.migrations_dir)
            .build()?;

        desk.run().await?;

        println!("\n  {} Stopped", style("✓").green());
        Ok(())
    }
}

fn init_tracing(dev: bool, json: bool) {
    let level = if dev { "debug" } else { "info" };
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| level.to_string());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
