//! Session orchestration.
//!
//! Owns the engine on a dedicated thread: commands arrive over a channel
//! and are executed between ticks, ticks run on a fixed cadence, and the
//! disable latch is shared out so a disable takes effect against an
//! in-flight tick. The thread is joined on drop, so a `Session` can never
//! leak its loop.

use crate::commands::{Command, CommandReply};
use crate::controller::FlowController;
use crate::error::{FlowError, Result};
use crate::tap::CommandTap;
use crate::wait::TempWait;
use adaflow_traits::{Actuator, Telemetry};
use crossbeam_channel as xch;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

type CommandEnvelope = (Command, xch::Sender<Result<CommandReply>>);

pub struct Session {
    commands: xch::Sender<CommandEnvelope>,
    shutdown: Arc<AtomicBool>,
    disable: Arc<AtomicBool>,
    tap: Arc<CommandTap>,
    temp_wait: Arc<TempWait>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl Session {
    /// Move the engine onto its tick thread and return the handle the host
    /// talks to.
    pub fn spawn<T, A>(mut engine: FlowController<T, A>) -> Self
    where
        T: Telemetry + Send + 'static,
        A: Actuator + Send + 'static,
    {
        let (tx, rx) = xch::bounded::<CommandEnvelope>(16);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let disable = engine.disable_flag();
        let tap = engine.command_tap();
        let temp_wait = engine.temp_wait();
        let period = Duration::from_millis(engine.tick_period_ms());

        let join_handle = std::thread::spawn(move || {
            let mut next_tick = Instant::now() + period;
            loop {
                if shutdown_thread.load(Ordering::Relaxed) {
                    break;
                }
                let now = Instant::now();
                if now >= next_tick {
                    if let Err(e) = engine.tick() {
                        tracing::warn!(error = %e, "control tick failed");
                    }
                    // Re-anchor instead of accumulating a backlog after a
                    // stall.
                    next_tick = (next_tick + period).max(Instant::now());
                }
                let wait = next_tick.saturating_duration_since(Instant::now());
                match rx.recv_timeout(wait) {
                    Ok((cmd, reply_tx)) => {
                        let _ = reply_tx.send(engine.execute(&cmd));
                    }
                    Err(xch::RecvTimeoutError::Timeout) => {}
                    Err(xch::RecvTimeoutError::Disconnected) => break,
                }
            }
            engine.stop();
            tracing::debug!("session thread exiting cleanly");
        });

        Self {
            commands: tx,
            shutdown,
            disable,
            tap,
            temp_wait,
            join_handle: Some(join_handle),
        }
    }

    /// Execute a command on the session thread and wait for its reply.
    pub fn execute(&self, cmd: Command) -> Result<CommandReply> {
        let (reply_tx, reply_rx) = xch::bounded(1);
        self.commands
            .send((cmd, reply_tx))
            .map_err(|_| eyre::Report::new(FlowError::State("session thread gone".into())))?;
        reply_rx
            .recv()
            .map_err(|_| eyre::Report::new(FlowError::State("session thread gone".into())))?
    }

    /// Suppress adaptive outputs immediately. Takes effect atomically with
    /// respect to the next tick: a tick already computing discards its
    /// outputs once it observes the latch.
    pub fn disable_now(&self) {
        self.disable.store(true, Ordering::Release);
    }

    /// The command tap the host feeds with outgoing motion commands.
    pub fn tap(&self) -> Arc<CommandTap> {
        self.tap.clone()
    }

    /// The temperature wait used for multi-object switches.
    pub fn temp_wait(&self) -> Arc<TempWait> {
        self.temp_wait.clone()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("session thread joined"),
                Err(e) => tracing::warn!(?e, "session thread panicked during shutdown"),
            }
        }
    }
}
