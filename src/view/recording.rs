//! Headless view handles that record every mutation with a timestamp.
//!
//! Used by the `simulate` command and by tests that assert on the exact
//! timeline the sequencer produces.

#![allow(missing_docs)]

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::core::errors::Result;
use crate::runtime::clock::Clock;
use crate::view::handles::{
    AnchorHandle, Emphasis, EmphasisHandle, Rect, ScreenHandle, TextHandle, ViewHandles, Viewport,
};
use crate::view::screen::{SCREEN_COUNT, Screen};

/// A single observed view mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViewChange {
    ScreenActivated { screen: Screen },
    Text { target: &'static str, text: String },
    EmphasisApplied { target: &'static str, emphasis: Emphasis },
    EmphasisCleared { target: &'static str, emphasis: Emphasis },
}

/// A view mutation stamped with the clock reading at which it happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewEvent {
    pub at_ms: u64,
    #[serde(flatten)]
    pub change: ViewChange,
}

#[derive(Debug, Default)]
struct Tape {
    events: Vec<ViewEvent>,
    screen_flags: [bool; SCREEN_COUNT],
}

/// Shared recording surface. Cloning yields another view of the same tape.
#[derive(Clone)]
pub struct Recorder {
    clock: Arc<dyn Clock>,
    tape: Arc<Mutex<Tape>>,
}

impl Recorder {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            tape: Arc::new(Mutex::new(Tape::default())),
        }
    }

    /// A full set of handles with the anchor centred in a 1280x800 viewport.
    #[must_use]
    pub fn handles(&self) -> ViewHandles {
        self.handles_with_anchor(
            Rect {
                left: 490.0,
                top: 100.0,
                width: 300.0,
                height: 600.0,
            },
            Viewport {
                width: 1_280.0,
                height: 800.0,
            },
        )
    }

    #[must_use]
    pub fn handles_with_anchor(&self, rect: Rect, viewport: Viewport) -> ViewHandles {
        ViewHandles {
            screens: Screen::ALL
                .into_iter()
                .map(|screen| {
                    Box::new(RecordingScreen {
                        screen,
                        recorder: self.clone(),
                    }) as Box<dyn ScreenHandle>
                })
                .collect(),
            balance: Some(Box::new(RecordingText {
                target: "balance",
                recorder: self.clone(),
            })),
            new_balance: Some(Box::new(RecordingText {
                target: "new_balance",
                recorder: self.clone(),
            })),
            menu_list: Some(Box::new(RecordingEmphasis {
                target: "menu_list",
                recorder: self.clone(),
            })),
            buy_option: Some(Box::new(RecordingEmphasis {
                target: "buy_option",
                recorder: self.clone(),
            })),
            anchor: Some(Box::new(FixedAnchor { rect, viewport })),
        }
    }

    /// Snapshot of every recorded event so far.
    #[must_use]
    pub fn events(&self) -> Vec<ViewEvent> {
        self.tape.lock().events.clone()
    }

    /// Take the recorded events, leaving the tape empty.
    pub fn drain(&self) -> Vec<ViewEvent> {
        std::mem::take(&mut self.tape.lock().events)
    }

    /// Current active flag of every screen handle.
    #[must_use]
    pub fn screen_flags(&self) -> [bool; SCREEN_COUNT] {
        self.tape.lock().screen_flags
    }

    fn record(&self, change: ViewChange) {
        let at_ms = u64::try_from(self.clock.now().as_millis()).unwrap_or(u64::MAX);
        self.tape.lock().events.push(ViewEvent { at_ms, change });
    }
}

struct RecordingScreen {
    screen: Screen,
    recorder: Recorder,
}

impl ScreenHandle for RecordingScreen {
    fn set_active(&mut self, active: bool) -> Result<()> {
        let was_active = {
            let mut tape = self.recorder.tape.lock();
            let slot = &mut tape.screen_flags[self.screen.index()];
            std::mem::replace(slot, active)
        };
        if active && !was_active {
            self.recorder.record(ViewChange::ScreenActivated {
                screen: self.screen,
            });
        }
        Ok(())
    }
}

struct RecordingText {
    target: &'static str,
    recorder: Recorder,
}

impl TextHandle for RecordingText {
    fn set_text(&mut self, text: &str) -> Result<()> {
        self.recorder.record(ViewChange::Text {
            target: self.target,
            text: text.to_string(),
        });
        Ok(())
    }
}

struct RecordingEmphasis {
    target: &'static str,
    recorder: Recorder,
}

impl EmphasisHandle for RecordingEmphasis {
    fn apply(&mut self, emphasis: Emphasis) -> Result<()> {
        self.recorder.record(ViewChange::EmphasisApplied {
            target: self.target,
            emphasis,
        });
        Ok(())
    }

    fn clear(&mut self, emphasis: Emphasis) -> Result<()> {
        self.recorder.record(ViewChange::EmphasisCleared {
            target: self.target,
            emphasis,
        });
        Ok(())
    }
}

/// Anchor with a fixed geometry.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnchor {
    pub rect: Rect,
    pub viewport: Viewport,
}

impl AnchorHandle for FixedAnchor {
    fn bounding_rect(&self) -> Result<Rect> {
        Ok(self.rect)
    }

    fn viewport(&self) -> Result<Viewport> {
        Ok(self.viewport)
    }
}
