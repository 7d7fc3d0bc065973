//! The fixed demo script: an ordered list of timed steps.

#![allow(missing_docs)]

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::core::config::TimingConfig;
use crate::view::screen::Screen;

/// Side effect performed when a step's delay has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "screen", rename_all = "snake_case")]
pub enum StepAction {
    /// Offset the menu list as if it were being scrolled.
    NudgeMenu,
    /// Put the menu list back.
    RestoreMenu,
    /// Emphasise the "buy" option.
    HighlightBuy,
    /// Switch the phone to a screen.
    ShowScreen(Screen),
    /// Fire the particle burst and count the new balance up.
    Celebrate,
    /// Drop the "buy" emphasis.
    ClearHighlight,
    /// Close the cycle; the next step is the first step again.
    Restart,
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NudgeMenu => f.write_str("nudge_menu"),
            Self::RestoreMenu => f.write_str("restore_menu"),
            Self::HighlightBuy => f.write_str("highlight_buy"),
            Self::ShowScreen(screen) => write!(f, "show_screen({screen})"),
            Self::Celebrate => f.write_str("celebrate"),
            Self::ClearHighlight => f.write_str("clear_highlight"),
            Self::Restart => f.write_str("restart"),
        }
    }
}

/// Wait `delay`, then run `actions` in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SequenceStep {
    pub delay: Duration,
    pub actions: Vec<StepAction>,
}

impl SequenceStep {
    fn new(delay_ms: u64, actions: &[StepAction]) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            actions: actions.to_vec(),
        }
    }

    /// Screen this step switches to, if any.
    #[must_use]
    pub fn target_screen(&self) -> Option<Screen> {
        self.actions.iter().find_map(|action| match action {
            StepAction::ShowScreen(screen) => Some(*screen),
            _ => None,
        })
    }
}

/// One full cycle of the demo. Never empty; the last step is always `Restart`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SequenceScript {
    steps: Vec<SequenceStep>,
}

impl SequenceScript {
    /// Build the buy-flow cycle from configured delays.
    #[must_use]
    pub fn buy_flow(timing: &TimingConfig) -> Self {
        use StepAction::{
            Celebrate, ClearHighlight, HighlightBuy, NudgeMenu, Restart, RestoreMenu, ShowScreen,
        };
        Self {
            steps: vec![
                SequenceStep::new(timing.initial_delay_ms, &[NudgeMenu]),
                SequenceStep::new(timing.nudge_ms, &[RestoreMenu, HighlightBuy]),
                SequenceStep::new(timing.highlight_ms, &[ShowScreen(Screen::Buy)]),
                SequenceStep::new(timing.buy_screen_ms, &[ShowScreen(Screen::Processing)]),
                SequenceStep::new(
                    timing.processing_ms,
                    &[ShowScreen(Screen::Success), Celebrate],
                ),
                SequenceStep::new(timing.success_ms, &[ShowScreen(Screen::Main), ClearHighlight]),
                SequenceStep::new(timing.restart_delay_ms, &[Restart]),
            ],
        }
    }

    #[must_use]
    pub fn steps(&self) -> &[SequenceStep] {
        &self.steps
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step at `index`, wrapping past the end of the cycle.
    #[must_use]
    pub fn step(&self, index: usize) -> &SequenceStep {
        &self.steps[index % self.steps.len()]
    }

    /// Total delay of one cycle.
    #[must_use]
    pub fn cycle_length(&self) -> Duration {
        self.steps.iter().map(|step| step.delay).sum()
    }
}

impl Default for SequenceScript {
    fn default() -> Self {
        Self::buy_flow(&TimingConfig::default())
    }
}
