//! The phone-demo animation sequencer and its leaf components.

pub mod balance;
pub mod controller;
pub mod effect;
pub mod script;

#[cfg(test)]
mod test_properties;
