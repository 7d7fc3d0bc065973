//! View handle capabilities consumed by the sequencer.
//!
//! The sequencer never looks elements up by identifier. Everything it touches
//! is injected once through [`ViewHandles`]; a `None` slot means the element is
//! absent and the steps that use it degrade to a no-op.

#![allow(missing_docs)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::errors::Result;

/// Named visual emphasis that a handle can apply or clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emphasis {
    /// Small upward offset of the menu list, imitating a scroll.
    MenuNudge,
    /// Scale-up plus glow on the "buy" option.
    Highlight,
}

impl fmt::Display for Emphasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MenuNudge => write!(f, "menu_nudge"),
            Self::Highlight => write!(f, "highlight"),
        }
    }
}

/// On-screen bounding rectangle of an element, in viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Visible area the rectangle is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

/// One of the demo screens.
pub trait ScreenHandle: Send {
    fn set_active(&mut self, active: bool) -> Result<()>;
}

/// A display that shows a formatted value.
pub trait TextHandle: Send {
    fn set_text(&mut self, text: &str) -> Result<()>;
}

/// An element that can carry a named emphasis.
pub trait EmphasisHandle: Send {
    fn apply(&mut self, emphasis: Emphasis) -> Result<()>;
    fn clear(&mut self, emphasis: Emphasis) -> Result<()>;
}

/// The element the celebration effect originates from.
pub trait AnchorHandle: Send {
    fn bounding_rect(&self) -> Result<Rect>;
    fn viewport(&self) -> Result<Viewport>;
}

/// Every element the sequencer drives, injected at construction.
///
/// `screens` is ordered by [`crate::view::screen::Screen`] index. Fewer handles
/// than screens is tolerated; the missing screens are tracked but not drawn.
#[derive(Default)]
pub struct ViewHandles {
    pub screens: Vec<Box<dyn ScreenHandle>>,
    pub balance: Option<Box<dyn TextHandle>>,
    pub new_balance: Option<Box<dyn TextHandle>>,
    pub menu_list: Option<Box<dyn EmphasisHandle>>,
    pub buy_option: Option<Box<dyn EmphasisHandle>>,
    pub anchor: Option<Box<dyn AnchorHandle>>,
}

impl ViewHandles {
    /// Handles with nothing attached; every cosmetic step becomes a no-op.
    #[must_use]
    pub fn headless() -> Self {
        Self::default()
    }
}

impl fmt::Debug for ViewHandles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewHandles")
            .field("screens", &self.screens.len())
            .field("balance", &self.balance.is_some())
            .field("new_balance", &self.new_balance.is_some())
            .field("menu_list", &self.menu_list.is_some())
            .field("buy_option", &self.buy_option.is_some())
            .field("anchor", &self.anchor.is_some())
            .finish()
    }
}
