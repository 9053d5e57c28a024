//! # Debounced Autosave
//!
//! Coalesces rapid successive edits of the same entity into a single local
//! snapshot write. Each `schedule` call restarts the entity's quiet period;
//! when the period elapses without another edit, the most recent state is
//! written. Writes run on a background task so editing never waits on disk.

use crate::local_db::{LocalDatabase, StorageError};
use crate::shared::types::{EntitySnapshot, InspectionState};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

enum Command {
    Schedule {
        entity_id: String,
        state: InspectionState,
    },
    Flush(oneshot::Sender<Result<usize, StorageError>>),
    Shutdown(oneshot::Sender<()>),
}

struct PendingWrite {
    state: InspectionState,
    due: Instant,
}

/// Handle to the autosave worker
#[derive(Debug, Clone)]
pub struct Autosaver {
    commands: mpsc::UnboundedSender<Command>,
    last_error: watch::Receiver<Option<String>>,
}

impl Autosaver {
    /// Spawn the autosave worker
    pub fn spawn(db: LocalDatabase, quiet_period: Duration) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let (error_tx, last_error) = watch::channel(None);

        tokio::spawn(run_worker(db, quiet_period, rx, error_tx));

        Self {
            commands,
            last_error,
        }
    }

    /// Schedule a snapshot write; the last state scheduled within the quiet period wins
    pub fn schedule(&self, entity_id: impl Into<String>, state: InspectionState) {
        let command = Command::Schedule {
            entity_id: entity_id.into(),
            state,
        };
        if self.commands.send(command).is_err() {
            tracing::warn!("autosave worker stopped, edit not scheduled");
        }
    }

    /// Write every pending snapshot now and return how many were written
    pub async fn flush(&self) -> Result<usize, StorageError> {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Flush(tx)).is_err() {
            return Ok(0);
        }
        rx.await.unwrap_or(Ok(0))
    }

    /// Flush pending writes and stop the worker
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Shutdown(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    /// Message of the most recent failed debounced write, if any
    pub fn last_error(&self) -> Option<String> {
        self.last_error.borrow().clone()
    }
}

async fn run_worker(
    db: LocalDatabase,
    quiet_period: Duration,
    mut commands: mpsc::UnboundedReceiver<Command>,
    last_error: watch::Sender<Option<String>>,
) {
    let mut pending: HashMap<String, PendingWrite> = HashMap::new();

    loop {
        let next_due = pending.values().map(|write| write.due).min();

        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Schedule { entity_id, state }) => {
                    let due = Instant::now() + quiet_period;
                    pending.insert(entity_id, PendingWrite { state, due });
                }
                Some(Command::Flush(reply)) => {
                    let due: Vec<String> = pending.keys().cloned().collect();
                    let _ = reply.send(write_due(&db, &mut pending, due, &last_error).await);
                }
                Some(Command::Shutdown(reply)) => {
                    let due: Vec<String> = pending.keys().cloned().collect();
                    let _ = write_due(&db, &mut pending, due, &last_error).await;
                    let _ = reply.send(());
                    break;
                }
                None => {
                    let due: Vec<String> = pending.keys().cloned().collect();
                    let _ = write_due(&db, &mut pending, due, &last_error).await;
                    break;
                }
            },
            _ = sleep_until(next_due), if next_due.is_some() => {
                let now = Instant::now();
                let due: Vec<String> = pending
                    .iter()
                    .filter(|(_, write)| write.due <= now)
                    .map(|(entity_id, _)| entity_id.clone())
                    .collect();
                let _ = write_due(&db, &mut pending, due, &last_error).await;
            }
        }
    }

    tracing::debug!("autosave worker stopped");
}

async fn sleep_until(deadline: Option<Instant>) {
    if let Some(deadline) = deadline {
        tokio::time::sleep_until(deadline).await;
    }
}

/// Write the given entities; returns the first storage error after trying all
async fn write_due(
    db: &LocalDatabase,
    pending: &mut HashMap<String, PendingWrite>,
    entity_ids: Vec<String>,
    last_error: &watch::Sender<Option<String>>,
) -> Result<usize, StorageError> {
    let mut written = 0;
    let mut first_error = None;

    for entity_id in entity_ids {
        let Some(write) = pending.remove(&entity_id) else {
            continue;
        };
        let snapshot = EntitySnapshot::new(entity_id, write.state);
        match db.save_snapshot(&snapshot).await {
            Ok(()) => written += 1,
            Err(e) => {
                tracing::error!(entity_id = %snapshot.entity_id, error = %e, "autosave failed");
                last_error.send_replace(Some(e.to_string()));
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(written),
    }
}
