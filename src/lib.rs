//! Paged, filterable browsing of MongoDB collections with streaming JSON
//! export and import.

pub mod bson;
pub mod connection;
pub mod error;
pub mod state;
pub mod views;

pub use error::{Error, Result};
