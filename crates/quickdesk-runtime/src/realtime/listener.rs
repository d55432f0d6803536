use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use quickdesk_core::config::RealtimeConfig;
use quickdesk_core::realtime::Change;
use quickdesk_core::{DeskError, Result};
use tokio::sync::{broadcast, watch};

/// Turns Postgres NOTIFY payloads on the change channel into [`Change`]s
/// and broadcasts them to websocket sessions.
pub struct ChangeListener {
    pool: sqlx::PgPool,
    channel: String,
    running: Arc<AtomicBool>,
    change_tx: broadcast::Sender<Change>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ChangeListener {
    pub fn new(pool: sqlx::PgPool, config: &RealtimeConfig) -> Self {
        let (change_tx, _) = broadcast::channel(config.buffer_size.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            pool,
            channel: config.channel.clone(),
            running: Arc::new(AtomicBool::new(false)),
            change_tx,
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.change_tx.subscribe()
    }

    /// Sender side of the feed, handed to the websocket hub.
    pub fn sender(&self) -> broadcast::Sender<Change> {
        self.change_tx.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        self.running.store(false, Ordering::SeqCst);
    }

    pub async fn run(&self) -> Result<()> {
        self.running.store(true, Ordering::SeqCst);

        let mut listener = sqlx::postgres::PgListener::connect_with(&self.pool)
            .await
            .map_err(|e| DeskError::Database(e.to_string()))?;
        listener
            .listen(&self.channel)
            .await
            .map_err(|e| DeskError::Database(e.to_string()))?;

        tracing::info!(channel = %self.channel, "Listening for changes");

        let mut shutdown_rx = self.shutdown_rx.clone();
        loop {
            tokio::select! {
                notification = listener.recv() => {
                    match notification {
                        Ok(notification) => self.publish(notification.payload()),
                        Err(e) => {
                            // PgListener reconnects on the next recv.
                            tracing::warn!(error = %e, "Error receiving change notification");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Change listener shutting down");
                        break;
                    }
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn publish(&self, payload: &str) {
        match Change::parse(payload) {
            Some(change) => {
                tracing::trace!(table = %change.table, operation = ?change.operation, "Change");
                // No receivers simply means nobody is connected.
                let _ = self.change_tx.send(change);
            }
            None => tracing::warn!(payload, "Ignoring malformed change notification"),
        }
    }

    /// Publish a change without going through Postgres.
    pub fn emit_change(&self, change: Change) {
        let _ = self.change_tx.send(change);
    }
}
