//! Gateway-backed operations: document reads/writes and JSON transfer streamers.

pub mod documents;
pub mod export;
pub mod import;
