//! clipkeep - Service daemon
//!
//! Wires the history store, the clipboard monitors, persistence and the
//! socket listener together

pub mod client;
mod handlers;
pub mod protocol;
mod server;

use std::sync::Arc;

use anyhow::Context;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::clipboard::models::Selection;
use crate::clipboard::monitor::ClipboardMonitor;
use crate::clipboard::source::{ClipSelection, ClipboardSource};
use crate::config::settings::{Settings, CAPTURE_TARGETS, MONITOR_TARGETS};
use crate::history::store::{SelectionStore, StoreOptions};
use crate::storage::database::HistoryDb;

use server::SocketServer;

/// The daemon: one shared store fed by the monitors, served over the socket
pub struct Service {
    settings: Settings,
    store: Mutex<SelectionStore>,
    db: HistoryDb,
    source: Arc<dyn ClipboardSource>,
}

impl Service {
    /// Open the database, load persisted history and assemble the daemon.
    /// A database that cannot be loaded is fatal; there is no history to
    /// serve safely.
    pub fn new(settings: Settings, source: Arc<dyn ClipboardSource>) -> anyhow::Result<Self> {
        let db = HistoryDb::open(&settings.history_path).with_context(|| {
            format!(
                "failed to open history database at {}",
                settings.history_path.display()
            )
        })?;
        let snapshot = db.load().context("failed to load history")?;
        log::info!(
            "loaded {} ephemeral and {} important selections",
            snapshot.ephemeral.len(),
            snapshot.important.len()
        );

        let options = StoreOptions {
            max_ephemeral: settings.max_ephemeral,
            max_important: settings.max_important,
        };
        Ok(Self {
            store: Mutex::new(SelectionStore::restore(snapshot, options)),
            db,
            source,
            settings,
        })
    }

    /// Run monitors, ingestion and the socket listener until `cancel` fires
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) -> anyhow::Result<()> {
        let server = SocketServer::bind(&self.settings.socket_path)?;

        let mut tasks: Vec<JoinHandle<()>> = Vec::new();
        tasks.push(tokio::spawn(
            server.serve(Arc::clone(&self), cancel.child_token()),
        ));

        let (events, mut observed) = mpsc::channel(1);
        for selection in [ClipSelection::Clipboard, ClipSelection::Primary] {
            let monitor = ClipboardMonitor::new(
                Arc::clone(&self.source),
                selection,
                MONITOR_TARGETS.clone(),
                CAPTURE_TARGETS.clone(),
                self.settings.poll_interval(),
            );
            tasks.push(monitor.spawn(events.clone(), cancel.child_token()));
        }
        drop(events);

        log::info!("watching clipboard for changes");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = observed.recv() => match event {
                    Some(selection) => self.ingest(selection),
                    None => break,
                },
            }
        }

        for task in tasks {
            let _ = task.await;
        }
        Ok(())
    }

    /// Apply one observed selection and persist the result. A failed save
    /// is logged and swallowed: the in-memory state stays authoritative and
    /// the next successful save includes this update.
    fn ingest(&self, selection: Selection) {
        let snapshot = {
            let mut store = self.store.lock();
            store.add(selection);
            store.snapshot()
        };
        if let Err(err) = self.db.save(&snapshot) {
            log::error!("failed to save history: {}", err);
        }
    }

    pub(crate) fn store(&self) -> &Mutex<SelectionStore> {
        &self.store
    }

    pub(crate) fn source(&self) -> &Arc<dyn ClipboardSource> {
        &self.source
    }
}
