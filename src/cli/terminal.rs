//! Terminal view: renders the phone demo as a stream of lines.
//!
//! Human mode prints colored, timestamped lines and rewrites counter values in
//! place; JSON mode prints one [`ViewEvent`] object per line.

#![allow(missing_docs)]

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use parking_lot::Mutex;
use serde_json::json;

use crate::animation::effect::{EffectConfig, EffectProvider};
use crate::core::errors::{PdsError, Result};
use crate::runtime::clock::Clock;
use crate::view::handles::{
    Emphasis, EmphasisHandle, Rect, ScreenHandle, TextHandle, ViewHandles, Viewport,
};
use crate::view::recording::{FixedAnchor, ViewChange, ViewEvent};
use crate::view::screen::Screen;

/// Line format for terminal output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Human,
    Json,
}

struct Sink {
    out: Box<dyn Write + Send>,
    /// A counter line is on screen without its newline yet.
    inline: bool,
}

/// Shared terminal surface; every handle it creates writes through it.
#[derive(Clone)]
pub struct TerminalView {
    clock: Arc<dyn Clock>,
    style: LineStyle,
    sink: Arc<Mutex<Sink>>,
}

impl TerminalView {
    pub fn stdout(clock: Arc<dyn Clock>, style: LineStyle) -> Self {
        Self::with_writer(clock, style, Box::new(io::stdout()))
    }

    pub fn with_writer(clock: Arc<dyn Clock>, style: LineStyle, out: Box<dyn Write + Send>) -> Self {
        Self {
            clock,
            style,
            sink: Arc::new(Mutex::new(Sink { out, inline: false })),
        }
    }

    /// Handles for every slot, with the anchor centred in a 1280x800 viewport.
    #[must_use]
    pub fn handles(&self) -> ViewHandles {
        ViewHandles {
            screens: Screen::ALL
                .into_iter()
                .map(|screen| {
                    Box::new(TerminalScreen {
                        screen,
                        active: false,
                        view: self.clone(),
                    }) as Box<dyn ScreenHandle>
                })
                .collect(),
            balance: Some(Box::new(TerminalText {
                target: "balance",
                view: self.clone(),
            })),
            new_balance: Some(Box::new(TerminalText {
                target: "new_balance",
                view: self.clone(),
            })),
            menu_list: Some(Box::new(TerminalEmphasis {
                target: "menu_list",
                view: self.clone(),
            })),
            buy_option: Some(Box::new(TerminalEmphasis {
                target: "buy_option",
                view: self.clone(),
            })),
            anchor: Some(Box::new(FixedAnchor {
                rect: Rect {
                    left: 490.0,
                    top: 100.0,
                    width: 300.0,
                    height: 600.0,
                },
                viewport: Viewport {
                    width: 1_280.0,
                    height: 800.0,
                },
            })),
        }
    }

    /// Particle provider that prints each burst on this view.
    #[must_use]
    pub fn confetti(&self) -> TerminalConfetti {
        TerminalConfetti { view: self.clone() }
    }

    /// Terminate a pending in-place counter line.
    pub fn finish(&self) -> Result<()> {
        let mut sink = self.sink.lock();
        if sink.inline {
            sink.inline = false;
            writeln!(sink.out).map_err(|e| PdsError::view("terminal", e.to_string()))?;
        }
        sink.out
            .flush()
            .map_err(|e| PdsError::view("terminal", e.to_string()))
    }

    fn now(&self) -> Duration {
        self.clock.now()
    }

    fn emit(&self, handle: &'static str, change: ViewChange) -> Result<()> {
        let at = self.now();
        let mut sink = self.sink.lock();
        let written = match self.style {
            LineStyle::Json => {
                let event = ViewEvent {
                    at_ms: duration_ms(at),
                    change,
                };
                serde_json::to_string(&event)
                    .map_err(|e| io::Error::other(e.to_string()))
                    .and_then(|line| writeln!(sink.out, "{line}"))
            }
            LineStyle::Human => {
                let is_text = matches!(change, ViewChange::Text { .. });
                let line = format_change_human(at, &change);
                let lead = if sink.inline && !is_text { "\n" } else { "" };
                let result = if is_text {
                    write!(sink.out, "\r{line}")
                } else {
                    writeln!(sink.out, "{lead}{line}")
                };
                sink.inline = is_text;
                result.and_then(|()| sink.out.flush())
            }
        };
        written.map_err(|e| PdsError::view(handle, e.to_string()))
    }

    fn emit_effect(&self, config: &EffectConfig) -> Result<()> {
        let at = self.now();
        let mut sink = self.sink.lock();
        let written = match self.style {
            LineStyle::Json => {
                let line = json!({
                    "at_ms": duration_ms(at),
                    "kind": "effect",
                    "count": config.count,
                    "spread": config.spread,
                    "origin": [config.origin.x, config.origin.y],
                    "colors": config.colors,
                });
                writeln!(sink.out, "{line}")
            }
            LineStyle::Human => {
                let lead = if sink.inline { "\n" } else { "" };
                sink.inline = false;
                writeln!(sink.out, "{lead}{}", format_effect_human(at, config))
            }
        };
        written.map_err(|e| PdsError::Effect {
            details: e.to_string(),
        })
    }
}

impl std::fmt::Debug for TerminalView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalView")
            .field("style", &self.style)
            .finish_non_exhaustive()
    }
}

// ──────────────────── formatting ────────────────────

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn timestamp(at: Duration) -> String {
    format!("[{:>4}.{:03}s]", at.as_secs(), at.subsec_millis())
}

/// One human-readable line for a view change, without a trailing newline.
#[must_use]
pub fn format_change_human(at: Duration, change: &ViewChange) -> String {
    let stamp = timestamp(at).dimmed();
    match change {
        ViewChange::ScreenActivated { screen } => {
            let name = match screen {
                Screen::Main => screen.label().cyan(),
                Screen::Buy => screen.label().blue(),
                Screen::Processing => screen.label().yellow(),
                Screen::Success => screen.label().green(),
            };
            format!("{stamp} {:<12} {}", "screen".bold(), name.bold())
        }
        ViewChange::Text { target, text } => {
            format!("{stamp} {:<12} {}", target.bold(), text.green())
        }
        ViewChange::EmphasisApplied { target, emphasis } => {
            format!("{stamp} {:<12} + {}", target.bold(), emphasis.to_string().magenta())
        }
        ViewChange::EmphasisCleared { target, emphasis } => {
            format!("{stamp} {:<12} - {}", target.bold(), emphasis.to_string().dimmed())
        }
    }
}

#[must_use]
pub fn format_effect_human(at: Duration, config: &EffectConfig) -> String {
    format!(
        "{} {:<12} {} particles, {}° spread, origin ({:.3}, {:.3})",
        timestamp(at).dimmed(),
        "confetti".bold(),
        config.count.to_string().magenta(),
        config.spread,
        config.origin.x,
        config.origin.y,
    )
}

// ──────────────────── handles ────────────────────

struct TerminalScreen {
    screen: Screen,
    active: bool,
    view: TerminalView,
}

impl ScreenHandle for TerminalScreen {
    fn set_active(&mut self, active: bool) -> Result<()> {
        let was_active = std::mem::replace(&mut self.active, active);
        if active && !was_active {
            self.view.emit(
                "screen",
                ViewChange::ScreenActivated {
                    screen: self.screen,
                },
            )?;
        }
        Ok(())
    }
}

struct TerminalText {
    target: &'static str,
    view: TerminalView,
}

impl TextHandle for TerminalText {
    fn set_text(&mut self, text: &str) -> Result<()> {
        self.view.emit(
            self.target,
            ViewChange::Text {
                target: self.target,
                text: text.to_string(),
            },
        )
    }
}

struct TerminalEmphasis {
    target: &'static str,
    view: TerminalView,
}

impl EmphasisHandle for TerminalEmphasis {
    fn apply(&mut self, emphasis: Emphasis) -> Result<()> {
        self.view.emit(
            self.target,
            ViewChange::EmphasisApplied {
                target: self.target,
                emphasis,
            },
        )
    }

    fn clear(&mut self, emphasis: Emphasis) -> Result<()> {
        self.view.emit(
            self.target,
            ViewChange::EmphasisCleared {
                target: self.target,
                emphasis,
            },
        )
    }
}

/// Prints a summary line for every particle burst.
pub struct TerminalConfetti {
    view: TerminalView,
}

impl EffectProvider for TerminalConfetti {
    fn emit(&mut self, config: &EffectConfig) -> Result<()> {
        self.view.emit_effect(config)
    }
}
