//! Server runtime: one process serving the RPC gateway, attachment files and
//! the realtime change feed.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::broadcast;

use quickdesk_core::config::{DeskConfig, NotificationsConfig};
use quickdesk_core::error::{DeskError, Result};
use quickdesk_core::notify::LogMailer;
use quickdesk_core::{DeskServices, Mailer, Notifier};
use quickdesk_runtime::migrations::{load_migrations_from_dir, Migration, MigrationRunner};
use quickdesk_runtime::{
    ChangeListener, Database, FunctionRegistry, GatewayConfig, GatewayServer, LocalObjectStore,
    PgStore, WebhookMailer,
};

/// Mail backend for the `[notifications]` section. A webhook URL selects the
/// HTTP relay, otherwise e-mails go to the log.
pub fn mailer_for(config: &NotificationsConfig) -> Result<Arc<dyn Mailer>> {
    match config.webhook_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => {
            Ok(Arc::new(WebhookMailer::new(url, config.from_address.clone())?))
        }
        _ => Ok(Arc::new(LogMailer)),
    }
}

/// Store, object storage and notifier over an open pool.
pub fn build_services(pool: sqlx::PgPool, config: &DeskConfig) -> Result<DeskServices> {
    let store = Arc::new(PgStore::new(pool));
    let objects = Arc::new(LocalObjectStore::from_config(&config.storage));
    let mailer = mailer_for(&config.notifications)?;
    let notifier = Notifier::new(store.clone(), mailer, &config.notifications);

    Ok(DeskServices {
        store,
        objects,
        notifier,
    })
}

/// The QuickDesk server.
pub struct Desk {
    config: DeskConfig,
    registry: FunctionRegistry,
    shutdown_tx: broadcast::Sender<()>,
    migrations_dir: PathBuf,
    extra_migrations: Vec<Migration>,
}

impl Desk {
    pub fn builder() -> DeskBuilder {
        DeskBuilder::new()
    }

    pub fn config(&self) -> &DeskConfig {
        &self.config
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Run until ctrl-c or [`Desk::shutdown`].
    pub async fn run(self) -> Result<()> {
        tracing::info!(project = %self.config.project.name, "QuickDesk starting");

        let db = Database::from_config(&self.config.database).await?;
        let pool = db.pool().clone();
        tracing::info!("Connected to database");

        if self.config.database.auto_migrate {
            let mut extra = load_migrations_from_dir(&self.migrations_dir)?;
            extra.extend(self.extra_migrations.iter().cloned());
            let applied = MigrationRunner::new(pool.clone()).run(extra).await?;
            tracing::info!(count = applied.len(), "Migrations completed");
        }

        tokio::fs::create_dir_all(&self.config.storage.root)
            .await
            .map_err(|e| {
                DeskError::Storage(format!(
                    "Cannot create storage root {}: {}",
                    self.config.storage.root, e
                ))
            })?;

        let services = Arc::new(build_services(pool.clone(), &self.config)?);

        let listener = Arc::new(ChangeListener::new(pool, &self.config.realtime));
        let listener_task = {
            let listener = listener.clone();
            tokio::spawn(async move {
                if let Err(e) = listener.run().await {
                    tracing::error!(error = %e, "Change listener stopped");
                }
            })
        };

        let gateway = GatewayServer::new(
            GatewayConfig::from_desk_config(&self.config),
            self.registry,
            services,
            listener.sender(),
        );

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let shutdown = async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received shutdown signal");
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Received shutdown notification");
                }
            }
        };

        let served = gateway.run(shutdown).await;

        listener.stop();
        if let Err(e) = listener_task.await {
            tracing::warn!(error = %e, "Change listener task failed");
        }
        db.close().await;

        served.map_err(DeskError::from)?;
        tracing::info!("QuickDesk stopped");
        Ok(())
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

pub struct DeskBuilder {
    config: Option<DeskConfig>,
    registry: FunctionRegistry,
    migrations_dir: PathBuf,
    extra_migrations: Vec<Migration>,
}

impl DeskBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            registry: FunctionRegistry::with_desk_functions(),
            migrations_dir: PathBuf::from("migrations"),
            extra_migrations: Vec::new(),
        }
    }

    /// Directory of site-specific migrations applied after the built-in
    /// schema. Defaults to `./migrations`.
    pub fn migrations_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.migrations_dir = path.into();
        self
    }

    pub fn migration(mut self, name: impl Into<String>, sql: impl Into<String>) -> Self {
        self.extra_migrations.push(Migration::new(name, sql));
        self
    }

    pub fn config(mut self, config: DeskConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<Desk> {
        let config = self
            .config
            .ok_or_else(|| DeskError::Config("Configuration is required".to_string()))?;

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Desk {
            config,
            registry: self.registry,
            shutdown_tx,
            migrations_dir: self.migrations_dir,
            extra_migrations: self.extra_migrations,
        })
    }
}

impl Default for DeskBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_config() {
        assert!(DeskBuilder::new().build().is_err());
    }

    #[test]
    fn test_builder_registers_desk_functions() {
        let desk = Desk::builder()
            .config(DeskConfig::default_with_database_url("postgres://localhost/test"))
            .migration("0100_site_tweaks", "SELECT 1")
            .build()
            .unwrap();
        assert!(desk.registry().get("create_ticket").is_some());
        assert!(desk.registry().get("list_tickets").is_some());
        assert_eq!(desk.config().gateway.port, 8080);
    }

    #[test]
    fn test_mailer_defaults_to_log() {
        let config = NotificationsConfig::default();
        assert!(mailer_for(&config).is_ok());

        let config = NotificationsConfig {
            webhook_url: Some("   ".into()),
            ..Default::default()
        };
        assert!(mailer_for(&config).is_ok());
    }

    #[test]
    fn test_mailer_uses_webhook() {
        let config = NotificationsConfig {
            webhook_url: Some("http://127.0.0.1:9/mail".into()),
            ..Default::default()
        };
        assert!(mailer_for(&config).is_ok());
    }

    #[tokio::test]
    async fn test_services_over_lazy_pool() {
        let config = DeskConfig::default_with_database_url("postgres://localhost/test");
        let pool = sqlx::PgPool::connect_lazy(&config.database.url).unwrap();
        let services = build_services(pool, &config).unwrap();
        assert!(services
            .objects
            .public_url("tickets/a/1-b.png")
            .ends_with("/storage/tickets/a/1-b.png"));
    }
}
