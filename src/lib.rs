#![forbid(unsafe_code)]

//! Phone demo sequencer (pds): a timed, cancellable animation sequencer that
//! walks a mocked phone through a looping buy-crypto flow.
//!
//! The pieces:
//! 1. **Screens and handles**: abstract view slots the sequencer mutates
//! 2. **Sequence controller**: a single-timer state machine running the demo script
//! 3. **Drivers**: a virtual-time runtime for tests and a wall-clock driver thread
//!
//! # Library usage
//!
//! ```rust,no_run
//! use phone_demo_sequencer::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use phone_demo_sequencer::core::config::Config;
//! use phone_demo_sequencer::runtime::simulated::SimulatedRuntime;
//! ```

pub mod prelude;

pub mod animation;
#[cfg(feature = "cli")]
pub mod cli;
pub mod core;
pub mod daemon;
pub mod logger;
pub mod runtime;
pub mod view;
