//! Hot reload of the gate configuration file.
//!
//! The parent directory is watched rather than the file, so editors that
//! save by writing a temporary file and renaming it over the original keep
//! triggering reloads. Bursts of events are coalesced into one reload.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::config::loader::load_config;
use crate::config::schema::GateConfig;

/// Quiet period before a burst of file events is acted on.
const DEBOUNCE: Duration = Duration::from_millis(100);

/// Reloads the configuration file when it changes on disk.
pub struct ConfigWatcher {
    path: PathBuf,
    updates: mpsc::UnboundedSender<GateConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiver that valid reloaded configs are
    /// sent to.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<GateConfig>) {
        let (updates, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                updates,
            },
            update_rx,
        )
    }

    /// Start watching. The task ends when `shutdown` fires or the update
    /// receiver is dropped.
    pub fn spawn(self, mut shutdown: broadcast::Receiver<()>) -> Result<JoinHandle<()>, notify::Error> {
        let file_name = self
            .path
            .file_name()
            .map(OsString::from)
            .ok_or_else(|| notify::Error::generic("config path has no file name"))?;
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (event_tx, mut events) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let _ = event_tx.send(res);
            },
            notify::Config::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::info!(path = %self.path.display(), "Config watcher started");

        Ok(tokio::spawn(async move {
            // Dropping the watcher ends the event stream.
            let _watcher = watcher;
            loop {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    event = events.recv() => match event {
                        Some(Ok(event)) if touches(&event, &file_name) => {
                            tokio::time::sleep(DEBOUNCE).await;
                            while events.try_recv().is_ok() {}
                            if !self.reload() {
                                break;
                            }
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => tracing::error!(error = %e, "Config watch error"),
                        None => break,
                    },
                }
            }
            tracing::info!("Config watcher stopped");
        }))
    }

    /// Load and publish the file. Returns false once nobody listens.
    fn reload(&self) -> bool {
        match load_config(&self.path) {
            Ok(config) => {
                tracing::info!(path = %self.path.display(), "Config file changed, reloading");
                self.updates.send(config).is_ok()
            }
            Err(e) => {
                tracing::error!(error = %e, "Config reload failed, keeping current configuration");
                !self.updates.is_closed()
            }
        }
    }
}

/// The event creates, modifies or renames onto the watched file.
fn touches(event: &Event, file_name: &OsString) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name.as_os_str()))
}
