//! Screen set of the mocked phone and the renderer that keeps exactly one active.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};

use crate::core::errors::{PdsError, Result, panic_message};
use crate::view::handles::ScreenHandle;

/// The ordered screens of the buy flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    /// Wallet overview with the balance and the action menu.
    #[default]
    Main,
    /// Purchase form.
    Buy,
    /// Spinner while the purchase "settles".
    Processing,
    /// Confirmation with the new balance.
    Success,
}

/// Number of screens in the flow.
pub const SCREEN_COUNT: usize = 4;

impl Screen {
    /// All screens in flow order.
    pub const ALL: [Self; SCREEN_COUNT] = [Self::Main, Self::Buy, Self::Processing, Self::Success];

    /// Zero-based position in the flow.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Main => 0,
            Self::Buy => 1,
            Self::Processing => 2,
            Self::Success => 3,
        }
    }

    /// Resolve a zero-based position. Returns `None` for out-of-range.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Main),
            1 => Some(Self::Buy),
            2 => Some(Self::Processing),
            3 => Some(Self::Success),
            _ => None,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Buy => "buy",
            Self::Processing => "processing",
            Self::Success => "success",
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Tracks the single active screen and mirrors it onto the screen handles.
///
/// The active flag is committed before any handle is touched, so callers only
/// ever observe one active screen. A failing handle does not stop the others
/// from being updated, even when it panics; the first failure is returned after
/// all were visited.
pub struct ScreenRenderer {
    handles: Vec<Box<dyn ScreenHandle>>,
    active: Screen,
}

impl ScreenRenderer {
    /// Build a renderer over `handles` (ordered by [`Screen::index`]).
    ///
    /// Nothing is drawn until the first [`Self::set_active`].
    #[must_use]
    pub fn new(handles: Vec<Box<dyn ScreenHandle>>) -> Self {
        Self {
            handles,
            active: Screen::Main,
        }
    }

    #[must_use]
    pub fn active(&self) -> Screen {
        self.active
    }

    /// Flags of every screen, in flow order. Exactly one is `true`.
    #[must_use]
    pub fn flags(&self) -> [bool; SCREEN_COUNT] {
        let mut flags = [false; SCREEN_COUNT];
        flags[self.active.index()] = true;
        flags
    }

    /// Number of attached screen handles.
    #[must_use]
    pub fn attached(&self) -> usize {
        self.handles.len()
    }

    /// Make `screen` the only active one.
    pub fn set_active(&mut self, screen: Screen) -> Result<()> {
        self.active = screen;
        let mut first_error = None;
        for (i, handle) in self.handles.iter_mut().enumerate() {
            let active = i == screen.index();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handle.set_active(active)))
                .unwrap_or_else(|payload| {
                    Err(PdsError::view(
                        "screen",
                        format!("panicked: {}", panic_message(payload.as_ref())),
                    ))
                });
            if let Err(e) = outcome {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Index-based variant for callers that hold a raw position.
    ///
    /// An out-of-range index is a programming error: it panics in debug builds
    /// and is rejected without touching any state otherwise.
    pub fn set_active_index(&mut self, index: usize) -> Result<()> {
        debug_assert!(
            index < SCREEN_COUNT,
            "screen index {index} out of range (screen count {SCREEN_COUNT})"
        );
        let screen = Screen::from_index(index).ok_or(PdsError::InvalidScreen {
            index,
            count: SCREEN_COUNT,
        })?;
        self.set_active(screen)
    }
}

impl fmt::Debug for ScreenRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScreenRenderer")
            .field("active", &self.active)
            .field("attached", &self.handles.len())
            .finish()
    }
}
