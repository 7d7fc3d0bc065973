//! Signal handling: SIGTERM/SIGINT graceful shutdown, SIGUSR1 cancels the
//! sequence, SIGUSR2 starts it again.
//!
//! Uses `signal-hook` to flip atomic flags; the host loop polls
//! [`SignalHandler::next_action`] between waits instead of blocking on signals.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::consts::{SIGINT, SIGTERM};

/// What a received signal asks the host to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    Shutdown,
    Cancel,
    Start,
}

/// Signal state shared between the OS handlers and the host loop.
#[derive(Clone)]
pub struct SignalHandler {
    shutdown_flag: Arc<AtomicBool>,
    cancel_flag: Arc<AtomicBool>,
    start_flag: Arc<AtomicBool>,
}

impl SignalHandler {
    /// Create a handler and register OS signal hooks.
    ///
    /// Registration is best-effort; failures go to stderr but are not fatal.
    pub fn new() -> Self {
        let handler = Self::unregistered();
        handler.register_signals();
        handler
    }

    /// Handler with no OS hooks; only the `request_*` methods set its flags.
    #[must_use]
    pub fn unregistered() -> Self {
        Self {
            shutdown_flag: Arc::new(AtomicBool::new(false)),
            cancel_flag: Arc::new(AtomicBool::new(false)),
            start_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shutdown is sticky; cancel and start are consumed when returned.
    pub fn next_action(&self) -> Option<SignalAction> {
        if self.shutdown_flag.load(Ordering::Relaxed) {
            Some(SignalAction::Shutdown)
        } else if self.cancel_flag.swap(false, Ordering::Relaxed) {
            Some(SignalAction::Cancel)
        } else if self.start_flag.swap(false, Ordering::Relaxed) {
            Some(SignalAction::Start)
        } else {
            None
        }
    }

    pub fn should_shutdown(&self) -> bool {
        self.shutdown_flag.load(Ordering::Relaxed)
    }

    pub fn request_shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::Relaxed);
    }

    pub fn request_cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    pub fn request_start(&self) {
        self.start_flag.store(true, Ordering::Relaxed);
    }

    fn register_signals(&self) {
        if let Err(e) = signal_hook::flag::register(SIGTERM, Arc::clone(&self.shutdown_flag)) {
            eprintln!("[PDS-SIGNAL] failed to register SIGTERM: {e}");
        }
        if let Err(e) = signal_hook::flag::register(SIGINT, Arc::clone(&self.shutdown_flag)) {
            eprintln!("[PDS-SIGNAL] failed to register SIGINT: {e}");
        }

        #[cfg(unix)]
        {
            use signal_hook::consts::{SIGUSR1, SIGUSR2};
            if let Err(e) = signal_hook::flag::register(SIGUSR1, Arc::clone(&self.cancel_flag)) {
                eprintln!("[PDS-SIGNAL] failed to register SIGUSR1: {e}");
            }
            if let Err(e) = signal_hook::flag::register(SIGUSR2, Arc::clone(&self.start_flag)) {
                eprintln!("[PDS-SIGNAL] failed to register SIGUSR2: {e}");
            }
        }
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SignalHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalHandler")
            .field("shutdown", &self.should_shutdown())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_action_by_default() {
        let handler = SignalHandler::unregistered();
        assert_eq!(handler.next_action(), None);
        assert!(!handler.should_shutdown());
    }

    #[test]
    fn cancel_and_start_are_consumed_once() {
        let handler = SignalHandler::unregistered();
        handler.request_cancel();
        handler.request_start();
        assert_eq!(handler.next_action(), Some(SignalAction::Cancel));
        assert_eq!(handler.next_action(), Some(SignalAction::Start));
        assert_eq!(handler.next_action(), None);
    }

    #[test]
    fn shutdown_is_sticky_and_wins() {
        let handler = SignalHandler::unregistered();
        handler.request_cancel();
        handler.request_shutdown();
        assert_eq!(handler.next_action(), Some(SignalAction::Shutdown));
        assert_eq!(handler.next_action(), Some(SignalAction::Shutdown));
    }

    #[test]
    fn clones_share_flags() {
        let handler = SignalHandler::unregistered();
        let clone = handler.clone();
        clone.request_start();
        assert_eq!(handler.next_action(), Some(SignalAction::Start));
    }
}
