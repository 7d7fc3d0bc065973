//! Structured activity logging: JSONL writer plus a dedicated logger thread.

pub mod activity;
pub mod jsonl;
