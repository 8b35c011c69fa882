//! BSON utilities for parsing query text, rendering documents, and addressing fields.

mod formatter;
mod key;
mod parser;
mod path;

pub use formatter::*;
pub use key::*;
pub use parser::*;
pub use path::*;
