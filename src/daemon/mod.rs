//! Hosting: the wall-clock driver thread and OS signal handling.

pub mod driver;
#[cfg(feature = "daemon")]
pub mod signals;
