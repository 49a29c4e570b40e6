//! Expression-to-query translation.
//!
//! Predicates are plain data: a small AST ([`Expr`]) built through the fluent
//! [`field`] / [`Filter`] API. [`QueryCompiler`] walks the tree and renders the
//! store's query text, binding every literal as a named parameter.

mod builder;
mod compiler;
mod expr;

pub use builder::{DocumentQuery, OrderBy, SortDirection};
pub use compiler::{to_camel_case, QueryCompiler, QUERY_ALIAS};
pub use expr::{field, BinaryOp, Expr, FieldRef, Filter, LogicalOp};
