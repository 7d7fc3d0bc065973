//! Sequence controller: runs the demo script forever, one timed step at a time.
//!
//! The controller is a cooperative state machine. It never sleeps; instead it
//! owns exactly one pending deadline and the host resumes it:
//!
//! - [`SequenceController::next_deadline`] tells the host when to come back,
//! - [`SequenceController::poll`] runs every step whose deadline has passed,
//! - [`SequenceController::frame`] advances running count-up animations by one tick.
//!
//! Running a step first clears the pending timer, then applies the step's side
//! effects synchronously, then arms the timer for the following step. The
//! restart at the end of a cycle is just another step, so there is never more
//! than one outstanding timer and no chain of timers can outlive `cancel()`.
//!
//! Side-effect failures (missing or broken view handles, effect provider
//! errors, even panics inside a handle) are caught at the step boundary,
//! reported to the activity log, and never stop the loop.

#![allow(missing_docs)]

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::animation::balance::{BalanceAnimation, BalanceAnimator, format_grouped};
use crate::animation::effect::EffectTrigger;
use crate::animation::script::{SequenceScript, StepAction};
use crate::core::config::Config;
use crate::core::errors::{PdsError, Result, panic_message};
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::runtime::clock::Clock;
use crate::view::handles::{AnchorHandle, Emphasis, EmphasisHandle, TextHandle, ViewHandles};
use crate::view::screen::{Screen, ScreenRenderer};

/// Identity of one armed timer. A fresh handle is minted every time the
/// controller arms its timer, so stale handles never compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TimerHandle(u64);

impl TimerHandle {
    #[must_use]
    pub fn id(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingTimer {
    handle: TimerHandle,
    due: Duration,
    step: usize,
}

/// Observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnimationState {
    pub current_screen_index: usize,
    pub is_running: bool,
    pub pending_timer: Option<TimerHandle>,
}

/// Running totals since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ControllerStats {
    pub steps_executed: u64,
    pub step_failures: u64,
    pub effects_fired: u64,
    pub frames_rendered: u64,
    pub cycles_completed: u64,
}

/// Which display a count-up writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CounterSlot {
    Balance,
    NewBalance,
}

impl CounterSlot {
    const fn label(self) -> &'static str {
        match self {
            Self::Balance => "balance",
            Self::NewBalance => "new_balance",
        }
    }
}

struct Counter {
    slot: CounterSlot,
    animation: BalanceAnimation,
}

/// Orchestrates screens, emphasis, the celebration effect and the counters.
pub struct SequenceController {
    clock: Arc<dyn Clock>,
    script: SequenceScript,
    screens: ScreenRenderer,
    balance: Option<Box<dyn TextHandle>>,
    new_balance: Option<Box<dyn TextHandle>>,
    menu_list: Option<Box<dyn EmphasisHandle>>,
    buy_option: Option<Box<dyn EmphasisHandle>>,
    anchor: Option<Box<dyn AnchorHandle>>,
    effect: EffectTrigger,
    animator: BalanceAnimator,
    balance_base: u64,
    balance_bonus: u64,
    running: bool,
    pending: Option<PendingTimer>,
    timers_armed: u64,
    counters: Vec<Counter>,
    menu_nudged: bool,
    buy_highlighted: bool,
    cycle: u64,
    cycle_started_at: Duration,
    stats: ControllerStats,
    logger: Option<ActivityLoggerHandle>,
}

impl SequenceController {
    /// Build an idle controller. Nothing happens until [`Self::start`].
    pub fn new(
        config: &Config,
        views: ViewHandles,
        effect: EffectTrigger,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let ViewHandles {
            screens,
            balance,
            new_balance,
            menu_list,
            buy_option,
            anchor,
        } = views;
        Self {
            clock,
            script: SequenceScript::buy_flow(&config.timing),
            screens: ScreenRenderer::new(screens),
            balance,
            new_balance,
            menu_list,
            buy_option,
            anchor,
            effect,
            animator: BalanceAnimator::new(config.balance.steps),
            balance_base: config.balance.base,
            balance_bonus: config.balance.bonus,
            running: false,
            pending: None,
            timers_armed: 0,
            counters: Vec::new(),
            menu_nudged: false,
            buy_highlighted: false,
            cycle: 0,
            cycle_started_at: Duration::ZERO,
            stats: ControllerStats::default(),
            logger: None,
        }
    }

    /// Report activity and step failures to `logger`.
    #[must_use]
    pub fn with_logger(mut self, logger: ActivityLoggerHandle) -> Self {
        self.logger = Some(logger);
        self
    }

    // ──────────────────── lifecycle ────────────────────

    /// Begin the cycle from its first step.
    ///
    /// Idempotent: while already running this does nothing and returns `false`.
    /// Otherwise the phone is reset to the main screen, the main balance counts
    /// up to its base value, and the first step's timer is armed.
    pub fn start(&mut self) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        self.cycle_started_at = self.clock.now();

        if let Some(e) = self.contain(None, "reset", Self::reset_view) {
            self.report(None, "reset", &e);
        }
        self.start_counter(CounterSlot::Balance, self.balance_base);

        self.log(ActivityEvent::SequenceStarted { cycle: self.cycle });
        self.arm(0);
        true
    }

    /// Stop the loop. Clears the pending timer and any running count-up.
    ///
    /// After this returns no step runs, no restart is scheduled and no view
    /// handle is touched until the next [`Self::start`]. Returns whether the
    /// controller was running.
    pub fn cancel(&mut self) -> bool {
        let was_running = self.running;
        self.running = false;
        let pending = self.pending.take();
        self.counters.clear();
        if was_running {
            self.log(ActivityEvent::SequenceCancelled {
                cycle: self.cycle,
                pending_step: pending.map(|p| p.step),
            });
        }
        was_running
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    // ──────────────────── resumption ────────────────────

    /// When the host should call [`Self::poll`] next, on the controller's clock.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.pending.map(|p| p.due)
    }

    /// Handle of the single outstanding timer, if any.
    #[must_use]
    pub fn pending_timer(&self) -> Option<TimerHandle> {
        self.pending.map(|p| p.handle)
    }

    /// Run every step whose deadline has passed. Returns how many ran.
    ///
    /// At most one full cycle of steps runs per call, so a host that resumes
    /// very late cannot spin here.
    pub fn poll(&mut self) -> usize {
        let mut executed = 0;
        while executed < self.script.len() {
            let Some(pending) = self.pending else {
                break;
            };
            if !self.running {
                self.pending = None;
                break;
            }
            if pending.due > self.clock.now() {
                break;
            }

            self.pending = None;
            self.run_step(pending.step);
            executed += 1;

            if self.running {
                self.arm(pending.step + 1);
            }
        }
        executed
    }

    /// Whether a count-up is in progress and wants [`Self::frame`] calls.
    #[must_use]
    pub fn is_animating(&self) -> bool {
        !self.counters.is_empty()
    }

    /// Advance every running count-up by one tick. Returns [`Self::is_animating`].
    pub fn frame(&mut self) -> bool {
        if !self.running {
            self.counters.clear();
            return false;
        }
        let mut counters = std::mem::take(&mut self.counters);
        for counter in &mut counters {
            if let Some(value) = counter.animation.next() {
                let slot = counter.slot;
                if let Some(e) =
                    self.contain(None, slot.label(), |this| this.render_counter(slot, value))
                {
                    self.report(None, slot.label(), &e);
                }
            }
        }
        counters.retain(|c| !c.animation.is_finished());
        self.counters = counters;
        self.stats.frames_rendered += 1;
        self.is_animating()
    }

    // ──────────────────── introspection ────────────────────

    #[must_use]
    pub fn current_screen(&self) -> Screen {
        self.screens.active()
    }

    #[must_use]
    pub fn state(&self) -> AnimationState {
        AnimationState {
            current_screen_index: self.screens.active().index(),
            is_running: self.running,
            pending_timer: self.pending_timer(),
        }
    }

    #[must_use]
    pub fn stats(&self) -> ControllerStats {
        self.stats
    }

    #[must_use]
    pub fn cycles_completed(&self) -> u64 {
        self.stats.cycles_completed
    }

    #[must_use]
    pub fn script(&self) -> &SequenceScript {
        &self.script
    }

    // ──────────────────── step execution ────────────────────

    fn arm(&mut self, step: usize) {
        debug_assert!(self.pending.is_none(), "timer armed twice");
        let step = step % self.script.len();
        self.timers_armed += 1;
        self.pending = Some(PendingTimer {
            handle: TimerHandle(self.timers_armed),
            due: self.clock.now() + self.script.step(step).delay,
            step,
        });
    }

    fn run_step(&mut self, index: usize) {
        let actions = self.script.step(index).actions.clone();
        for action in actions {
            if let Some(e) = self.contain(Some(index), "step", |this| this.apply(index, action)) {
                self.report(Some(index), &action.to_string(), &e);
            }
        }
        self.stats.steps_executed += 1;
    }

    /// Run `f` against the view, turning a returned error or a panic into a
    /// failure the caller reports. Panics inside a step become
    /// [`PdsError::StepPanicked`]; elsewhere they count against `handle`.
    fn contain(
        &mut self,
        step: Option<usize>,
        handle: &'static str,
        f: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Option<PdsError> {
        match panic::catch_unwind(AssertUnwindSafe(|| f(self))) {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(payload) => {
                let details = panic_message(payload.as_ref());
                Some(match step {
                    Some(step) => PdsError::StepPanicked { step, details },
                    None => PdsError::view(handle, format!("panicked: {details}")),
                })
            }
        }
    }

    fn apply(&mut self, step: usize, action: StepAction) -> Result<()> {
        match action {
            StepAction::NudgeMenu => {
                if let Some(menu) = self.menu_list.as_mut() {
                    menu.apply(Emphasis::MenuNudge)?;
                    self.menu_nudged = true;
                }
            }
            StepAction::RestoreMenu => {
                if let Some(menu) = self.menu_list.as_mut() {
                    menu.clear(Emphasis::MenuNudge)?;
                    self.menu_nudged = false;
                }
            }
            StepAction::HighlightBuy => {
                if let Some(option) = self.buy_option.as_mut() {
                    option.apply(Emphasis::Highlight)?;
                    self.buy_highlighted = true;
                }
            }
            StepAction::ClearHighlight => {
                if let Some(option) = self.buy_option.as_mut() {
                    option.clear(Emphasis::Highlight)?;
                    self.buy_highlighted = false;
                }
            }
            StepAction::ShowScreen(screen) => {
                let result = self.screens.set_active(screen);
                self.log(ActivityEvent::ScreenChanged {
                    cycle: self.cycle,
                    step,
                    screen: screen.label().to_string(),
                });
                result?;
            }
            StepAction::Celebrate => {
                let fired = self.fire_effect();
                self.start_counter(
                    CounterSlot::NewBalance,
                    self.balance_base.saturating_add(self.balance_bonus),
                );
                fired?;
            }
            StepAction::Restart => {
                let now = self.clock.now();
                let duration = now.saturating_sub(self.cycle_started_at);
                self.log(ActivityEvent::CycleCompleted {
                    cycle: self.cycle,
                    duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
                });
                self.stats.cycles_completed += 1;
                self.cycle += 1;
                self.cycle_started_at = now;
            }
        }
        Ok(())
    }

    fn fire_effect(&mut self) -> Result<()> {
        let Some(anchor) = self.anchor.as_ref() else {
            return Ok(());
        };
        if !self.effect.has_provider() {
            return Ok(());
        }
        let rect = anchor.bounding_rect()?;
        let viewport = anchor.viewport()?;
        if let Some(fired) = self.effect.fire(rect, viewport)? {
            self.stats.effects_fired += 1;
            self.log(ActivityEvent::EffectFired {
                cycle: self.cycle,
                origin: [fired.origin.x, fired.origin.y],
                particles: fired.count,
            });
        }
        Ok(())
    }

    /// Put the phone back on the main screen with no emphasis applied.
    fn reset_view(&mut self) -> Result<()> {
        let mut first_error = self.screens.set_active(Screen::Main).err();
        if self.menu_nudged
            && let Some(menu) = self.menu_list.as_mut()
        {
            match menu.clear(Emphasis::MenuNudge) {
                Ok(()) => self.menu_nudged = false,
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        if self.buy_highlighted
            && let Some(option) = self.buy_option.as_mut()
        {
            match option.clear(Emphasis::Highlight) {
                Ok(()) => self.buy_highlighted = false,
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Replace any count-up on `slot` and render its first frame right away.
    fn start_counter(&mut self, slot: CounterSlot, target: u64) {
        self.counters.retain(|c| c.slot != slot);
        let mut animation = self.animator.animate(target);
        if let Some(first) = animation.next()
            && let Some(e) =
                self.contain(None, slot.label(), |this| this.render_counter(slot, first))
        {
            self.report(None, slot.label(), &e);
        }
        if !animation.is_finished() {
            self.counters.push(Counter { slot, animation });
        }
    }

    fn render_counter(&mut self, slot: CounterSlot, value: u64) -> Result<()> {
        let handle = match slot {
            CounterSlot::Balance => self.balance.as_mut(),
            CounterSlot::NewBalance => self.new_balance.as_mut(),
        };
        match handle {
            Some(handle) => handle.set_text(&format_grouped(value)),
            None => Ok(()),
        }
    }

    fn report(&mut self, step: Option<usize>, action: &str, error: &PdsError) {
        self.stats.step_failures += 1;
        self.log(ActivityEvent::StepFailed {
            cycle: self.cycle,
            step,
            action: action.to_string(),
            code: error.code().to_string(),
            message: error.to_string(),
            cosmetic: error.is_cosmetic(),
        });
    }

    fn log(&self, event: ActivityEvent) {
        if let Some(logger) = &self.logger {
            logger.send(event);
        }
    }
}

impl fmt::Debug for SequenceController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceController")
            .field("running", &self.running)
            .field("screen", &self.screens.active())
            .field("pending", &self.pending)
            .field("cycle", &self.cycle)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
