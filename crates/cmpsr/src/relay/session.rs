//! Per-connection session controller.
//!
//! One [`Session`] per WebSocket connection. It owns a periodic status
//! broadcast task and at most one in-flight command cycle; both are
//! released exactly once at teardown. A command cycle walks
//! activate -> deliver -> await-completion, emitting interim output lines
//! and exactly one terminal outcome for every accepted command.

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval, sleep, sleep_until};
use uuid::Uuid;

use cmpsr_protocol::ServerEvent;

use super::RelayState;
use crate::error::RelayError;

pub struct Session {
    id: Uuid,
    shared: Arc<RelayState>,
    events: mpsc::Sender<ServerEvent>,
    status_task: Option<JoinHandle<()>>,
    cycle_task: Option<JoinHandle<()>>,
}

impl Session {
    /// Create the session and start its status broadcast. The first
    /// snapshot is pushed immediately, then on every poll tick.
    pub fn new(id: Uuid, shared: Arc<RelayState>, events: mpsc::Sender<ServerEvent>) -> Self {
        let status_task = tokio::spawn(broadcast_status(shared.clone(), events.clone()));
        Self {
            id,
            shared,
            events,
            status_task: Some(status_task),
            cycle_task: None,
        }
    }

    /// Command intake. Rejected with `Busy` while a cycle is in flight;
    /// otherwise one cycle is spawned for the command.
    pub fn submit(&mut self, command: String) {
        if self
            .cycle_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
        {
            warn!("session {}: command rejected, cycle in flight", self.id);
            emit_detached(self.events.clone(), ServerEvent::error(RelayError::Busy.to_string()));
            return;
        }

        info!("session {}: command accepted", self.id);
        let task = tokio::spawn(run_cycle(self.shared.clone(), self.events.clone(), command, self.id));
        self.cycle_task = Some(task);
    }

    /// Release every timer and watch handle the session owns. Idempotent;
    /// invoked on connection close and again from Drop as a backstop.
    pub fn teardown(&mut self) {
        if let Some(task) = self.status_task.take() {
            task.abort();
        }
        if let Some(task) = self.cycle_task.take() {
            task.abort();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Send one event without blocking the caller.
fn emit_detached(events: mpsc::Sender<ServerEvent>, event: ServerEvent) {
    tokio::spawn(async move {
        let _ = events.send(event).await;
    });
}

async fn broadcast_status(shared: Arc<RelayState>, events: mpsc::Sender<ServerEvent>) {
    let mut ticker = interval(shared.timing.status_interval());
    loop {
        ticker.tick().await;
        let status = shared.probe.probe().await;
        if events.send(ServerEvent::status(status)).await.is_err() {
            break;
        }
    }
}

/// One full command cycle: gate, liveness check, activate, deliver, await
/// completion. Every early return has already emitted its error event.
async fn run_cycle(
    shared: Arc<RelayState>,
    events: mpsc::Sender<ServerEvent>,
    command: String,
    id: Uuid,
) {
    // Single-slot gate: only one session may drive the external target.
    let Ok(_permit) = shared.gate.clone().try_acquire_owned() else {
        warn!("session {id}: target busy with another session's delivery");
        let _ = events
            .send(ServerEvent::error(RelayError::Busy.to_string()))
            .await;
        return;
    };

    let status = shared.probe.probe().await;
    if !status.cursor {
        fail(&events, RelayError::ProcessNotRunning).await;
        return;
    }

    debug!("session {id}: activating");
    if let Err(err) = shared.runner.activate().await {
        fail(&events, err).await;
        return;
    }

    debug!("session {id}: delivering");
    if let Err(err) = shared.runner.deliver(&command).await {
        fail(&events, err).await;
        return;
    }
    let _ = events
        .send(ServerEvent::output("command delivered to the composer"))
        .await;

    debug!("session {id}: awaiting completion");
    await_completion(&shared, &events).await;

    let _ = events.send(ServerEvent::complete(true)).await;
    info!("session {id}: cycle complete");
}

async fn fail(events: &mpsc::Sender<ServerEvent>, err: RelayError) {
    warn!("command cycle failed: {err}");
    let _ = events.send(ServerEvent::error(err.to_string())).await;
    let _ = events.send(ServerEvent::complete(false)).await;
}

/// Wait for the target's response stream to finish. Log tailing is
/// authoritative when a watch is available; the fixed timeout is both the
/// fallback and the hard upper bound. Whichever finishes first wins.
async fn await_completion(shared: &RelayState, events: &mpsc::Sender<ServerEvent>) {
    let deadline = Instant::now() + shared.timing.completion_timeout();

    let tail = match &shared.log_dir {
        Some(dir) => match shared.watcher.watch(dir) {
            Ok(tail) => Some(tail),
            Err(err) => {
                let err = RelayError::WatchUnavailable(err.to_string());
                warn!("{err}; falling back to fixed timeout");
                let _ = events.send(ServerEvent::error(err.to_string())).await;
                None
            }
        },
        None => None,
    };

    let Some(mut tail) = tail else {
        sleep_until(deadline).await;
        return;
    };

    let mut saw_output = false;
    loop {
        let quiet = sleep(shared.quiet_period);
        tokio::pin!(quiet);
        tokio::select! {
            _ = sleep_until(deadline) => break,
            // The stream is idle once no line has arrived for a quiet
            // period after at least one line was seen.
            _ = &mut quiet, if saw_output => break,
            line = tail.recv() => match line {
                Some(line) => {
                    saw_output = true;
                    if events.send(ServerEvent::output(line)).await.is_err() {
                        break;
                    }
                }
                None => {
                    sleep_until(deadline).await;
                    break;
                }
            },
        }
    }
    tail.close();
}
