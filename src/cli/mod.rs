//! Terminal front end used by the `pds` binary.

pub mod terminal;
