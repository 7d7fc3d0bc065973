//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use phone_demo_sequencer::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{PdsError, Result};

// View
pub use crate::view::handles::{
    AnchorHandle, Emphasis, EmphasisHandle, Rect, ScreenHandle, TextHandle, ViewHandles, Viewport,
};
pub use crate::view::recording::{Recorder, ViewChange, ViewEvent};
pub use crate::view::screen::{Screen, ScreenRenderer};

// Animation
pub use crate::animation::balance::{BalanceAnimator, animate, format_grouped};
pub use crate::animation::controller::{AnimationState, SequenceController, TimerHandle};
pub use crate::animation::effect::{EffectConfig, EffectProvider, EffectTrigger, compute_origin};
pub use crate::animation::script::{SequenceScript, StepAction};

// Runtime
pub use crate::runtime::clock::{Clock, MonotonicClock, SimulatedClock};
pub use crate::runtime::simulated::SimulatedRuntime;

// Driver
pub use crate::daemon::driver::{DriverHandle, DriverOptions, spawn_driver};

// Logger
pub use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle, spawn_logger};
