//! Query parsing and compilation
//!
//! A query string is parsed into a token tree by [`QueryStringParser`], then
//! compiled into a cursor tree against any [`CursorSource`]: the live
//! [`PostingStore`](crate::store::PostingStore) or a loaded
//! [`Image`](crate::image::Image).
//!
//! # Example
//!
//! ```rust
//! use quarry::cursor::collect_ids;
//! use quarry::query::{QueryCompiler, QueryStringParser};
//! use quarry::store::PostingStore;
//!
//! let mut store = PostingStore::new();
//! store.insert("cat", 5, b"meow").unwrap();
//! store.insert("dog", 5, b"woof").unwrap();
//!
//! let query = QueryStringParser::new().parse("cat dog");
//! let ids = collect_ids(QueryCompiler::new(&store).compile(&query));
//! assert_eq!(ids, vec![5]);
//! ```

pub mod compiler;
pub mod query_string;

pub use compiler::{LeafHook, QueryCompiler};
pub use query_string::{ParsedQuery, QueryStringParser, TokenDictionary, TokenResolver};

use crate::cursor::BoxCursor;

/// Anything cursors can be opened over
pub trait CursorSource {
    /// Cursor over one term, empty when the term is unknown
    fn term_cursor(&self, term: &str) -> BoxCursor<'_>;

    /// Union over every term starting with `prefix`
    fn prefix_cursor(&self, prefix: &str) -> BoxCursor<'_>;
}

/// Parse `input` and compile it against `source` in one step
pub fn search<'s, S: CursorSource + ?Sized>(source: &'s S, input: &str) -> BoxCursor<'s> {
    let query = QueryStringParser::new().parse(input);
    QueryCompiler::new(source).compile(&query)
}
