//! Wall-clock driver: a dedicated thread that hosts the sequence controller.
//!
//! The thread sleeps on its command channel until the controller's next
//! deadline or the next frame tick, whichever comes first, so it wakes only
//! when something has to happen. Commands (`Start`, `Cancel`, `Shutdown`)
//! arrive over a bounded crossbeam channel and are applied between steps,
//! which keeps every controller call on one thread.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use serde::Serialize;

use crate::animation::controller::{ControllerStats, SequenceController};
use crate::animation::effect::EffectTrigger;
use crate::core::config::Config;
use crate::core::errors::{PdsError, Result};
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::runtime::clock::{Clock, MonotonicClock};
use crate::view::handles::ViewHandles;

/// Commands rarely queue; a small buffer is plenty.
const COMMAND_CHANNEL_CAP: usize = 16;
/// How long an idle (cancelled) driver waits for a command before re-checking.
const IDLE_WAIT: Duration = Duration::from_millis(250);

/// Control messages for the driver thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverCommand {
    Start,
    Cancel,
    Shutdown,
}

/// Driver behaviour knobs that are not part of [`Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverOptions {
    /// Start the sequence as soon as the thread is up.
    pub autostart: bool,
    /// Stop after this many completed cycles.
    pub max_cycles: Option<u64>,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            autostart: true,
            max_cycles: None,
        }
    }
}

/// Summary returned when the driver thread exits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriverReport {
    pub reason: String,
    pub cycles_completed: u64,
    pub uptime_ms: u64,
    pub stats: ControllerStats,
}

// ──────────────────── handle ────────────────────

/// Owner-side handle for a running driver thread.
pub struct DriverHandle {
    tx: Sender<DriverCommand>,
    cycles: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    join: Option<thread::JoinHandle<DriverReport>>,
}

impl DriverHandle {
    pub fn start(&self) {
        self.send(DriverCommand::Start);
    }

    pub fn cancel(&self) {
        self.send(DriverCommand::Cancel);
    }

    pub fn shutdown(&self) {
        self.send(DriverCommand::Shutdown);
    }

    /// Cycles completed so far, as last published by the driver thread.
    #[must_use]
    pub fn cycles_completed(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Whether the sequence is currently running (not cancelled).
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Whether the driver thread has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(thread::JoinHandle::is_finished)
    }

    /// Wait for the driver thread and collect its report.
    pub fn join(mut self) -> Result<DriverReport> {
        let Some(join) = self.join.take() else {
            return Err(PdsError::Runtime {
                details: "driver already joined".to_string(),
            });
        };
        join.join().map_err(|_| PdsError::Runtime {
            details: "driver thread panicked".to_string(),
        })
    }

    fn send(&self, command: DriverCommand) {
        if self.tx.send(command).is_err() {
            eprintln!("[PDS-DRIVER] driver thread gone, dropped {command:?}");
        }
    }
}

impl std::fmt::Debug for DriverHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverHandle")
            .field("cycles_completed", &self.cycles_completed())
            .field("running", &self.is_running())
            .field("finished", &self.is_finished())
            .finish()
    }
}

// ──────────────────── spawn ────────────────────

/// Build a controller on the monotonic clock and run it on its own thread.
pub fn spawn_driver(
    config: &Config,
    views: ViewHandles,
    effect: EffectTrigger,
    logger: Option<ActivityLoggerHandle>,
    options: DriverOptions,
) -> Result<DriverHandle> {
    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
    let mut controller = SequenceController::new(config, views, effect, Arc::clone(&clock));
    if let Some(logger) = &logger {
        controller = controller.with_logger(logger.clone());
    }

    let (tx, rx) = bounded(COMMAND_CHANNEL_CAP);
    let cycles = Arc::new(AtomicU64::new(0));
    let running = Arc::new(AtomicBool::new(false));
    let config_hash = config.stable_hash().unwrap_or_default();
    let frame_interval = config.timing.frame_interval().max(Duration::from_millis(1));

    let driver = Driver {
        controller,
        clock,
        rx,
        logger,
        options,
        frame_interval,
        next_frame: None,
        cycles: Arc::clone(&cycles),
        running: Arc::clone(&running),
    };

    let join = thread::Builder::new()
        .name("pds-driver".to_string())
        .spawn(move || driver.run(config_hash))
        .map_err(|e| PdsError::Runtime {
            details: format!("failed to spawn driver thread: {e}"),
        })?;

    Ok(DriverHandle {
        tx,
        cycles,
        running,
        join: Some(join),
    })
}

// ──────────────────── driver thread ────────────────────

struct Driver {
    controller: SequenceController,
    clock: Arc<dyn Clock>,
    rx: Receiver<DriverCommand>,
    logger: Option<ActivityLoggerHandle>,
    options: DriverOptions,
    frame_interval: Duration,
    next_frame: Option<Duration>,
    cycles: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
}

impl Driver {
    fn run(mut self, config_hash: String) -> DriverReport {
        let started_at = Instant::now();
        self.log(ActivityEvent::DriverStarted {
            version: env!("CARGO_PKG_VERSION").to_string(),
            config_hash,
        });
        if self.options.autostart {
            self.controller.start();
            self.schedule_frame();
        }

        let reason = loop {
            self.publish();
            if let Some(limit) = self.options.max_cycles
                && self.controller.cycles_completed() >= limit
            {
                break format!("completed {limit} cycles");
            }

            match self.rx.recv_timeout(self.wait_time()) {
                Ok(DriverCommand::Start) => {
                    self.controller.start();
                    self.schedule_frame();
                }
                Ok(DriverCommand::Cancel) => {
                    self.controller.cancel();
                    self.next_frame = None;
                }
                Ok(DriverCommand::Shutdown) => break "shutdown requested".to_string(),
                Err(RecvTimeoutError::Disconnected) => break "handle dropped".to_string(),
                Err(RecvTimeoutError::Timeout) => {}
            }

            self.tick();
        };

        self.controller.cancel();
        self.publish();

        let uptime = started_at.elapsed();
        self.log(ActivityEvent::DriverStopped {
            reason: reason.clone(),
            uptime_secs: uptime.as_secs(),
        });

        DriverReport {
            reason,
            cycles_completed: self.controller.cycles_completed(),
            uptime_ms: u64::try_from(uptime.as_millis()).unwrap_or(u64::MAX),
            stats: self.controller.stats(),
        }
    }

    /// Time until the next step or frame, or [`IDLE_WAIT`] with nothing scheduled.
    fn wait_time(&self) -> Duration {
        let wake = match (self.controller.next_deadline(), self.next_frame) {
            (Some(step), Some(frame)) => Some(step.min(frame)),
            (step, frame) => step.or(frame),
        };
        wake.map_or(IDLE_WAIT, |at| at.saturating_sub(self.clock.now()))
    }

    fn tick(&mut self) {
        let now = self.clock.now();
        if self.next_frame.is_some_and(|frame| frame <= now) {
            self.next_frame = None;
            self.controller.frame();
        }
        if self.controller.next_deadline().is_some_and(|due| due <= now) {
            self.controller.poll();
        }
        self.schedule_frame();
    }

    fn schedule_frame(&mut self) {
        if self.controller.is_animating() {
            if self.next_frame.is_none() {
                self.next_frame = Some(self.clock.now() + self.frame_interval);
            }
        } else {
            self.next_frame = None;
        }
    }

    fn publish(&self) {
        self.cycles
            .store(self.controller.cycles_completed(), Ordering::Relaxed);
        self.running
            .store(self.controller.is_running(), Ordering::Relaxed);
    }

    fn log(&self, event: ActivityEvent) {
        if let Some(logger) = &self.logger {
            logger.send(event);
        }
    }
}
