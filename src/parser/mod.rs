//! Lexer and recursive-descent parser for the transformation language (§4).
//!
//! ```text
//! Source Text
//!     ↓
//! Lexer (logos) → Tokens with SyntaxKind
//!     ↓
//! Parser (hand-written recursive descent) → typed AST (ast::Module)
//! ```
//!
//! There is no green tree stage here: the grammar in §4.2 is simple enough
//! that the parser builds the typed tree directly, the way a one-pass
//! interpreter front end usually does.

pub mod ast;
mod errors;
mod lexer;
mod parser;
mod syntax_kind;

pub use ast::*;
pub use errors::ParseContext;
pub use lexer::{Lexer, Token, extract_path_directives, tokenize, tokenize_with_keywords};
pub use parser::{Parse, parse_module, parse_module_with_config};
pub use syntax_kind::SyntaxKind;

pub use rowan::{TextRange, TextSize};
