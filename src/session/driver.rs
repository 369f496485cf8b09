//! Background thread that drives a session's save timers.

use crossbeam_channel::{bounded, select, tick, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info};

use super::editor::EditorSession;

/// Default polling period.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Calls `EditorSession::tick` on a fixed period until dropped.
///
/// Hosts with their own event loop can call `tick` directly and skip this.
pub struct AutosaveDriver {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl AutosaveDriver {
    pub fn spawn(session: Arc<Mutex<EditorSession>>) -> std::io::Result<Self> {
        Self::spawn_with_interval(session, DEFAULT_TICK_INTERVAL)
    }

    pub fn spawn_with_interval(
        session: Arc<Mutex<EditorSession>>,
        interval: Duration,
    ) -> std::io::Result<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let interval_ms = interval.as_millis() as u64;

        let handle = thread::Builder::new()
            .name("autosave".into())
            .spawn(move || {
                let ticker = tick(interval);
                loop {
                    select! {
                        recv(stop_rx) -> _ => break,
                        recv(ticker) -> _ => {
                            if let Some(outcome) = session.lock().tick() {
                                debug!(?outcome, "autosave tick");
                            }
                        }
                    }
                }
            })?;
        info!(interval_ms, "autosave driver started");

        Ok(Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Stop the thread and wait for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Dropping the sender also wakes the select.
        if let Some(stop) = self.stop.take() {
            let _ = stop.try_send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            debug!("autosave driver stopped");
        }
    }
}

impl Drop for AutosaveDriver {
    fn drop(&mut self) {
        self.shutdown();
    }
}
