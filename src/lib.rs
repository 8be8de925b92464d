//! # atl
//!
//! An interpreter core for an ATL-style model-to-model transformation
//! language: lexer/parser, an OCL-subset expression evaluator, a scoped
//! execution context, and a declarative/imperative rule engine.
//!
//! ## Module structure (dependency order)
//!
//! ```text
//! engine    → rule engine: matched/called rules, lazy-binding drain
//!   ↓
//! eval      → tree-walking expression evaluator, collection algebra
//!   ↓
//! context   → scoped execution context: variables, helpers, traces
//!   ↓
//! loader    → `@path` directive resolution
//!   ↓
//! config    → VmConfig
//!   ↓
//! parser    → Logos lexer, recursive-descent parser, typed AST
//!   ↓
//! metamodel → the collaborator contract into an external object store
//!   ↓
//! value     → the runtime Value union
//!   ↓
//! error     → the crate-wide error taxonomy
//!   ↓
//! base      → primitives (FileId, Name interning, TextRange)
//! ```

/// Foundation types: FileId, Name interning, TextRange.
pub mod base;

/// The crate-wide error taxonomy.
pub mod error;

/// The runtime value union and collection kinds.
pub mod value;

/// The metamodel interface: the seam into an external object store.
pub mod metamodel;

/// Lexer and recursive-descent parser producing a typed AST.
pub mod parser;

/// Runtime configuration for a `VirtualMachine` run.
pub mod config;

/// `@path` directive resolution.
pub mod loader;

/// The scoped execution context: variables, helpers, traces, lazy bindings.
pub mod context;

/// The tree-walking expression evaluator.
pub mod eval;

/// The rule engine: matched/called rules, the lazy-binding drain.
pub mod engine;

pub use base::{FileId, Interner, LineCol, LineIndex, Name, Position, Span, TextRange, TextSize};
pub use config::VmConfig;
pub use context::{ExecutionContext, LazyBinding, TraceLink};
pub use engine::{Statistics, VirtualMachine};
pub use error::{CoreError, CoreResult, MetamodelError};
pub use eval::Evaluator;
pub use metamodel::{ClassId, FeatureInfo, Metamodel, ObjectRef};
pub use parser::{Module, parse_module, parse_module_with_config};
pub use value::{CollectionKind, Value};
