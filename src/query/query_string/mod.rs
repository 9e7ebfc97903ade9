//! Query expression syntax
//!
//! Supports syntax like:
//! - `cat dog` (both terms)
//! - `cat or dog`, `cat | dog`
//! - `cat not dog`
//! - `"black cat"` (adjacent positions)
//! - `cat*` (any term with the prefix)
//! - `title:[en,fr]rust` (attribute values for the resolver)
//!
//! # Grammar
//!
//! ```text
//! query   := run
//! run     := or_run
//! or_run  := not_run (OR not_run)*
//! not_run := item* (NOT item item*)*
//! item    := '(' run ')' | '"' word* '"' | word '*'? | attr | punct
//! attr    := name ':' ('[' value (',' value)* ']')? value?
//! ```
//!
//! # Example
//!
//! ```rust
//! use quarry::query::query_string::QueryStringParser;
//!
//! let query = QueryStringParser::new().parse("cat or dog");
//! assert!(!query.is_empty());
//! ```

pub mod dictionary;
mod lexer;
pub mod parser;
mod rewrite;
pub mod token;

pub use dictionary::{NoResolver, Resolution, TokenDictionary, TokenResolver};
pub use parser::{ParsedQuery, QueryStringParser};
pub use token::{NodeId, Token, TokenAction, TokenKind, TokenTree};
