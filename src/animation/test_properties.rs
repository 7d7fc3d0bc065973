//! Property-based tests for sequencer invariants.
//!
//! Arbitrary interleavings of start/cancel/clock advances/frames must keep
//! exactly one screen active, at most one timer pending, counters monotonic,
//! and a cancelled controller silent.

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;

use super::balance::animate;
use super::controller::SequenceController;
use super::effect::EffectTrigger;
use crate::core::config::Config;
use crate::runtime::clock::SimulatedClock;
use crate::view::recording::{Recorder, ViewChange};
use crate::view::screen::{SCREEN_COUNT, Screen, ScreenRenderer};

// ──────────────────── strategies ────────────────────

#[derive(Debug, Clone, Copy)]
enum Op {
    Start,
    Cancel,
    Advance(u64),
    Frame,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        1 => Just(Op::Start),
        1 => Just(Op::Cancel),
        4 => (0u64..6_000).prop_map(Op::Advance),
        2 => Just(Op::Frame),
    ]
}

fn recorded_controller() -> (SequenceController, SimulatedClock, Recorder) {
    let clock = SimulatedClock::new();
    let recorder = Recorder::new(Arc::new(clock.clone()));
    let controller = SequenceController::new(
        &Config::default(),
        recorder.handles(),
        EffectTrigger::disabled(),
        Arc::new(clock.clone()),
    );
    (controller, clock, recorder)
}

fn apply(controller: &mut SequenceController, clock: &SimulatedClock, op: Op) {
    match op {
        Op::Start => {
            controller.start();
        }
        Op::Cancel => {
            controller.cancel();
        }
        Op::Advance(ms) => {
            clock.advance(Duration::from_millis(ms));
            controller.poll();
        }
        Op::Frame => {
            controller.frame();
        }
    }
}

fn parse_grouped(text: &str) -> u64 {
    text.replace(',', "").parse().unwrap()
}

// ──────────────────── property tests ────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Any index sequence leaves exactly the last requested screen active.
    #[test]
    fn renderer_keeps_exactly_one_active(indices in prop::collection::vec(0usize..SCREEN_COUNT, 1..40)) {
        let clock = SimulatedClock::new();
        let recorder = Recorder::new(Arc::new(clock));
        let mut renderer = ScreenRenderer::new(recorder.handles().screens);
        for &index in &indices {
            renderer.set_active_index(index).unwrap();
            let flags = recorder.screen_flags();
            prop_assert_eq!(flags.iter().filter(|f| **f).count(), 1);
            prop_assert!(flags[index]);
            prop_assert_eq!(renderer.active(), Screen::from_index(index).unwrap());
        }
    }

    /// Count-ups rise monotonically, never overshoot, and end on the target.
    #[test]
    fn counter_is_monotonic_and_terminates(target in 0u64..10_000_000, steps in 1u32..200) {
        let frames: Vec<u64> = animate(target, steps).collect();
        prop_assert!(!frames.is_empty());
        prop_assert!(frames.len() <= steps as usize);
        prop_assert!(frames.windows(2).all(|w| w[0] <= w[1]));
        prop_assert!(frames.iter().all(|v| *v <= target));
        prop_assert_eq!(frames.last().copied(), Some(target));
    }

    /// The controller never holds a timer unless running, and the view always
    /// shows exactly one screen once started.
    #[test]
    fn controller_invariants_hold(ops in prop::collection::vec(arb_op(), 1..60)) {
        let (mut controller, clock, recorder) = recorded_controller();
        let mut started = false;
        let mut last_cycles = 0;
        for op in ops {
            apply(&mut controller, &clock, op);
            started |= matches!(op, Op::Start);

            let state = controller.state();
            prop_assert_eq!(state.pending_timer.is_some(), state.is_running);
            if let Some(deadline) = controller.next_deadline() {
                prop_assert!(deadline > clock_now(&clock));
            }
            if started {
                let flags = recorder.screen_flags();
                prop_assert_eq!(flags.iter().filter(|f| **f).count(), 1);
                prop_assert!(flags[state.current_screen_index]);
            }
            prop_assert!(controller.cycles_completed() >= last_cycles);
            last_cycles = controller.cycles_completed();
        }
    }

    /// After cancel, no amount of elapsed time or frames touches the view.
    #[test]
    fn cancel_silences_the_view(
        before in prop::collection::vec(arb_op(), 0..30),
        after in prop::collection::vec(prop_oneof![
            (0u64..30_000).prop_map(Op::Advance),
            Just(Op::Frame),
        ], 1..30),
    ) {
        let (mut controller, clock, recorder) = recorded_controller();
        for op in before {
            apply(&mut controller, &clock, op);
        }
        controller.cancel();
        let seen = recorder.events().len();
        for op in after {
            apply(&mut controller, &clock, op);
        }
        prop_assert_eq!(recorder.events().len(), seen);
        prop_assert!(!controller.is_running());
        prop_assert_eq!(controller.pending_timer(), None);
    }

    /// Balance text written during the intro count-up never decreases.
    #[test]
    fn intro_balance_text_is_monotonic(frames in 0usize..80) {
        let (mut controller, _clock, recorder) = recorded_controller();
        controller.start();
        for _ in 0..frames {
            controller.frame();
        }
        let values: Vec<u64> = recorder
            .events()
            .into_iter()
            .filter_map(|e| match e.change {
                ViewChange::Text { target: "balance", text } => Some(parse_grouped(&text)),
                _ => None,
            })
            .collect();
        prop_assert!(values.windows(2).all(|w| w[0] <= w[1]));
        prop_assert!(values.iter().all(|v| *v <= 1_337));
    }
}

fn clock_now(clock: &SimulatedClock) -> Duration {
    Duration::from_millis(clock.now_ms())
}
