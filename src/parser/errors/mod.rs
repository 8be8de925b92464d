//! Parser diagnostics support. The error types themselves live in
//! [`crate::error`] (shared with the rest of the crate); this module holds
//! only the parser-specific recovery machinery.

mod context;

pub use context::ParseContext;
