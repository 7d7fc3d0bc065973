//! Presentation seam: screen tracking, injected view handles, headless recording.

pub mod handles;
pub mod recording;
pub mod screen;
