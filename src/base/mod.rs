//! Foundation types for the ATL transformation core.
//!
//! This module provides fundamental types used throughout the interpreter:
//! - [`FileId`] - Interned file identifiers
//! - [`TextRange`], [`TextSize`] - Source positions (byte offsets)
//! - [`LineCol`], [`LineIndex`] - Line/column conversion
//! - [`Position`], [`Span`] - Line/column positions for AST nodes
//! - [`Name`], [`Interner`] - String interning
//!
//! This module has NO dependencies on other crate modules.

mod file_id;
mod intern;
mod position;
mod span;

pub use file_id::FileId;
pub use intern::{Interner, Name};
pub use position::{Position, Span};
pub use span::{LineCol, LineIndex, TextRange, TextSize};
