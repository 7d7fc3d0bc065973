//! Virtual-time host for the sequence controller.
//!
//! Jumps the clock straight to the next interesting instant (a step deadline
//! or, while a counter is running, the next frame tick), so whole demo cycles
//! run instantly and deterministically.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use crate::animation::controller::SequenceController;
use crate::animation::effect::EffectTrigger;
use crate::core::config::Config;
use crate::runtime::clock::{Clock, SimulatedClock};
use crate::view::handles::ViewHandles;

/// A controller paired with the simulated clock that drives it.
#[derive(Debug)]
pub struct SimulatedRuntime {
    clock: SimulatedClock,
    controller: SequenceController,
    frame_interval: Duration,
    next_frame: Option<Duration>,
}

impl SimulatedRuntime {
    pub fn new(config: &Config, views: ViewHandles, effect: EffectTrigger) -> Self {
        let clock = SimulatedClock::new();
        Self::with_clock(config, views, effect, clock)
    }

    /// Share `clock` with other observers, e.g. a [`crate::view::recording::Recorder`].
    pub fn with_clock(
        config: &Config,
        views: ViewHandles,
        effect: EffectTrigger,
        clock: SimulatedClock,
    ) -> Self {
        let controller =
            SequenceController::new(config, views, effect, Arc::new(clock.clone()));
        Self::from_controller(controller, clock, config.timing.frame_interval())
    }

    /// Wrap a controller that was built on `clock`.
    pub fn from_controller(
        controller: SequenceController,
        clock: SimulatedClock,
        frame_interval: Duration,
    ) -> Self {
        Self {
            clock,
            controller,
            frame_interval: frame_interval.max(Duration::from_millis(1)),
            next_frame: None,
        }
    }

    pub fn start(&mut self) -> bool {
        let started = self.controller.start();
        self.schedule_frame();
        started
    }

    pub fn cancel(&mut self) -> bool {
        self.next_frame = None;
        self.controller.cancel()
    }

    /// Move virtual time forward by `span`, running every step and frame due
    /// within it in order.
    pub fn advance(&mut self, span: Duration) {
        let end = self.clock.now() + span;
        while let Some(at) = self.next_event().filter(|at| *at <= end) {
            self.clock.set(at);
            self.dispatch(at);
        }
        self.clock.set(end);
    }

    /// Run until `n` more cycles have completed. Returns the virtual time spent.
    ///
    /// Stops early if the controller is not running.
    pub fn run_cycles(&mut self, n: u64) -> Duration {
        let began = self.clock.now();
        let target = self.controller.cycles_completed() + n;
        while self.controller.cycles_completed() < target {
            let Some(at) = self.next_event() else {
                break;
            };
            self.clock.set(at);
            self.dispatch(at);
        }
        self.clock.now().saturating_sub(began)
    }

    #[must_use]
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    #[must_use]
    pub fn clock(&self) -> &SimulatedClock {
        &self.clock
    }

    #[must_use]
    pub fn controller(&self) -> &SequenceController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut SequenceController {
        &mut self.controller
    }

    /// Earliest pending step or frame. Frames are rescheduled here too, so a
    /// count-up started through [`Self::controller_mut`] still advances.
    fn next_event(&mut self) -> Option<Duration> {
        self.schedule_frame();
        match (self.controller.next_deadline(), self.next_frame) {
            (Some(step), Some(frame)) => Some(step.min(frame)),
            (step, frame) => step.or(frame),
        }
    }

    fn dispatch(&mut self, at: Duration) {
        if self.next_frame.is_some_and(|frame| frame <= at) {
            self.next_frame = None;
            self.controller.frame();
        }
        if self.controller.next_deadline().is_some_and(|due| due <= at) {
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::recording::{Recorder, ViewChange};
    use crate::view::screen::Screen;

    fn recorded() -> (SimulatedRuntime, Recorder) {
        let clock = SimulatedClock::new();
        let recorder = Recorder::new(Arc::new(clock.clone()));
        let runtime = SimulatedRuntime::with_clock(
            &Config::default(),
            recorder.handles(),
            EffectTrigger::disabled(),
            clock,
        );
        (runtime, recorder)
    }

    fn main_activations(recorder: &Recorder) -> Vec<u64> {
        recorder
            .events()
            .into_iter()
            .filter_map(|e| match e.change {
                ViewChange::ScreenActivated {
                    screen: Screen::Main,
                } => Some(e.at_ms),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn one_cycle_takes_twenty_seconds() {
        let (mut runtime, _) = recorded();
        runtime.start();
        assert_eq!(runtime.run_cycles(1), Duration::from_secs(20));
        assert_eq!(runtime.controller().cycles_completed(), 1);
    }

    #[test]
    fn main_screen_returns_every_cycle() {
        let (mut runtime, recorder) = recorded();
        runtime.start();
        runtime.run_cycles(3);
        // Initial reset, then the Success -> Main switch of each cycle.
        assert_eq!(main_activations(&recorder), vec![0, 15_000, 35_000, 55_000]);
    }

    #[test]
    fn double_start_keeps_a_single_timeline() {
        let (mut runtime, recorder) = recorded();
        runtime.start();
        runtime.advance(Duration::from_millis(1_000));
        assert!(!runtime.start());
        runtime.advance(Duration::from_millis(40_000));
        assert_eq!(main_activations(&recorder), vec![0, 15_000, 35_000]);
    }

    #[test]
    fn frames_tick_at_configured_interval() {
        let (mut runtime, recorder) = recorded();
        runtime.start();
        runtime.advance(Duration::from_secs(1));
        let stamps: Vec<u64> = recorder
            .events()
            .into_iter()
            .filter(|e| matches!(e.change, ViewChange::Text { target: "balance", .. }))
            .map(|e| e.at_ms)
            .collect();
        assert_eq!(stamps.len(), 50);
        assert_eq!(stamps[0], 0);
        assert_eq!(stamps[1], 16);
        assert_eq!(stamps[49], 49 * 16);
    }

    #[test]
    fn controller_started_directly_still_gets_frames() {
        let (mut runtime, recorder) = recorded();
        assert!(runtime.controller_mut().start());
        runtime.advance(Duration::from_secs(1));
        let stamps: Vec<u64> = recorder
            .events()
            .into_iter()
            .filter(|e| matches!(e.change, ViewChange::Text { target: "balance", .. }))
            .map(|e| e.at_ms)
            .collect();
        assert_eq!(stamps.len(), 50);
        assert_eq!(stamps[1], 16);
        assert!(!runtime.controller().is_animating());
    }

    #[test]
    fn cancel_stops_everything() {
        let (mut runtime, recorder) = recorded();
        runtime.start();
        runtime.advance(Duration::from_millis(9_000));
        assert!(runtime.cancel());
        let seen = recorder.events().len();
        runtime.advance(Duration::from_secs(120));
        assert_eq!(recorder.events().len(), seen);
        assert_eq!(runtime.controller().current_screen(), Screen::Processing);
        assert_eq!(runtime.run_cycles(1), Duration::ZERO);
    }

    #[test]
    fn headless_runtime_transitions_on_schedule() {
        let mut runtime = SimulatedRuntime::new(
            &Config::default(),
            ViewHandles::headless(),
            EffectTrigger::disabled(),
        );
        runtime.start();
        runtime.advance(Duration::from_millis(5_000));
        assert_eq!(runtime.controller().current_screen(), Screen::Buy);
        runtime.advance(Duration::from_millis(6_000));
        assert_eq!(runtime.controller().current_screen(), Screen::Success);
        assert_eq!(runtime.controller().stats().step_failures, 0);
    }
}
