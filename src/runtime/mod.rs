//! Time sources and the deterministic driver.

pub mod clock;
pub mod simulated;
