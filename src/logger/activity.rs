//! Activity logger: a dedicated thread owns the [`JsonlWriter`]; producers hold a
//! cheap cloneable handle and never block on logging.
//!
//! Events travel over a bounded crossbeam channel. `try_send` keeps the sequencer
//! loop free of back-pressure; overflow is counted and reported as a warning line.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::core::config::Config;
use crate::core::errors::{PdsError, Result};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};

/// Default bounded channel capacity for log events.
const CHANNEL_CAPACITY: usize = 1024;

// ──────────────────── public event type ────────────────────

/// Events emitted by the sequencer and its drivers.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityEvent {
    SequenceStarted {
        cycle: u64,
    },
    SequenceCancelled {
        cycle: u64,
        pending_step: Option<usize>,
    },
    ScreenChanged {
        cycle: u64,
        step: usize,
        screen: String,
    },
    EffectFired {
        cycle: u64,
        origin: [f64; 2],
        particles: u32,
    },
    CycleCompleted {
        cycle: u64,
        duration_ms: u64,
    },
    StepFailed {
        cycle: u64,
        step: Option<usize>,
        action: String,
        code: String,
        message: String,
        cosmetic: bool,
    },
    DriverStarted {
        version: String,
        config_hash: String,
    },
    DriverStopped {
        reason: String,
        uptime_secs: u64,
    },
    Error {
        code: String,
        message: String,
    },
    /// Sentinel that stops the logger thread.
    Shutdown,
}

// ──────────────────── public handle ────────────────────

/// Thread-safe, cheaply-cloneable handle for sending log events.
#[derive(Clone)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl ActivityLoggerHandle {
    /// Send an event to the logger thread. Non-blocking; drops on a full channel.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Events dropped due to back-pressure and not yet reported.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Ask the logger thread to flush and exit.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }

    /// Handle backed by a caller-owned receiver, for in-process consumers.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, Receiver<ActivityEvent>) {
        let (tx, rx) = bounded(capacity);
        (
            Self {
                tx,
                dropped_events: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }
}

impl std::fmt::Debug for ActivityLoggerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityLoggerHandle")
            .field("dropped_events", &self.dropped_events())
            .finish_non_exhaustive()
    }
}

// ──────────────────── configuration ────────────────────

/// Options for the logger thread.
#[derive(Debug, Clone)]
pub struct ActivityLoggerConfig {
    pub jsonl_config: JsonlConfig,
    pub channel_capacity: usize,
}

impl ActivityLoggerConfig {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            jsonl_config: JsonlConfig {
                path: config.paths.jsonl_log.clone(),
                fallback_path: Some(std::env::temp_dir().join("pds-activity.jsonl")),
                max_size_bytes: config.logging.max_size_bytes,
                max_rotated_files: config.logging.max_rotated_files,
            },
            channel_capacity: CHANNEL_CAPACITY,
        }
    }
}

// ──────────────────── spawn ────────────────────

/// Spawn the logger thread and return a handle.
///
/// The thread runs until `handle.shutdown()` is called or every sender is dropped.
pub fn spawn_logger(
    config: ActivityLoggerConfig,
) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    let (handle, rx) = ActivityLoggerHandle::channel(config.channel_capacity.max(1));
    let dropped = Arc::clone(&handle.dropped_events);

    let join = thread::Builder::new()
        .name("pds-logger".to_string())
        .spawn(move || logger_thread_main(&rx, config.jsonl_config, &dropped))
        .map_err(|e| PdsError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok((handle, join))
}

// ──────────────────── logger thread ────────────────────

fn logger_thread_main(
    rx: &Receiver<ActivityEvent>,
    jsonl_config: JsonlConfig,
    dropped: &AtomicU64,
) {
    let mut jsonl = JsonlWriter::open(jsonl_config);

    while let Ok(event) = rx.recv() {
        let d = dropped.swap(0, Ordering::Relaxed);
        if d > 0 {
            let mut warn = LogEntry::new(EventType::Error, Severity::Warning);
            warn.details = Some(format!("{d} log events dropped due to back-pressure"));
            jsonl.write_entry(&warn);
        }

        if matches!(event, ActivityEvent::Shutdown) {
            break;
        }
        jsonl.write_entry(&event_to_log_entry(&event));
    }

    jsonl.flush();
}

// ──────────────────── event conversion ────────────────────

pub(crate) fn event_to_log_entry(event: &ActivityEvent) -> LogEntry {
    match event {
        ActivityEvent::SequenceStarted { cycle } => {
            let mut e = LogEntry::new(EventType::SequenceStart, Severity::Info);
            e.cycle = Some(*cycle);
            e.ok = Some(true);
            e
        }
        ActivityEvent::SequenceCancelled {
            cycle,
            pending_step,
        } => {
            let mut e = LogEntry::new(EventType::SequenceCancel, Severity::Info);
            e.cycle = Some(*cycle);
            e.step = *pending_step;
            e
        }
        ActivityEvent::ScreenChanged {
            cycle,
            step,
            screen,
        } => {
            let mut e = LogEntry::new(EventType::ScreenChange, Severity::Info);
            e.cycle = Some(*cycle);
            e.step = Some(*step);
            e.screen = Some(screen.clone());
            e
        }
        ActivityEvent::EffectFired {
            cycle,
            origin,
            particles,
        } => {
            let mut e = LogEntry::new(EventType::EffectFired, Severity::Info);
            e.cycle = Some(*cycle);
            e.origin = Some(*origin);
            e.details = Some(format!("particles={particles}"));
            e.ok = Some(true);
            e
        }
        ActivityEvent::CycleCompleted { cycle, duration_ms } => {
            let mut e = LogEntry::new(EventType::CycleComplete, Severity::Info);
            e.cycle = Some(*cycle);
            e.duration_ms = Some(*duration_ms);
            e.ok = Some(true);
            e
        }
        ActivityEvent::StepFailed {
            cycle,
            step,
            action,
            code,
            message,
            cosmetic,
        } => {
            let severity = if *cosmetic {
                Severity::Warning
            } else {
                Severity::Critical
            };
            let mut e = LogEntry::new(EventType::StepFailed, severity);
            e.cycle = Some(*cycle);
            e.step = *step;
            e.action = Some(action.clone());
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e.ok = Some(false);
            e
        }
        ActivityEvent::DriverStarted {
            version,
            config_hash,
        } => {
            let mut e = LogEntry::new(EventType::DriverStart, Severity::Info);
            e.details = Some(format!("version={version} config_hash={config_hash}"));
            e.ok = Some(true);
            e
        }
        ActivityEvent::DriverStopped {
            reason,
            uptime_secs,
        } => {
            let mut e = LogEntry::new(EventType::DriverStop, Severity::Info);
            e.details = Some(format!("reason={reason} uptime={uptime_secs}s"));
            e.ok = Some(true);
            e
        }
        ActivityEvent::Error { code, message } => {
            let mut e = LogEntry::new(EventType::Error, Severity::Critical);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e.ok = Some(false);
            e
        }
        ActivityEvent::Shutdown => LogEntry::new(EventType::DriverStop, Severity::Info),
    }
}
