//! Quarry: an embeddable inverted index.
//!
//! - [`store`]: a mutable in-memory posting store
//! - [`cursor`]: lazy set algebra over sorted id streams
//! - [`query`]: a query-string parser and a compiler to cursor trees
//! - [`image`]: an external-sort builder and loader for immutable index files

pub mod config;
pub mod cursor;
pub mod error;
pub mod image;
pub mod query;
pub mod store;
pub mod types;

pub use config::{BuilderConfig, ImageConfig, ParserConfig};
pub use cursor::{BoxCursor, Cursor, CursorKind};
pub use error::{QuarryError, Result};
pub use image::{BuildStats, Image, IndexBuilder};
pub use query::{search, CursorSource, QueryCompiler, QueryStringParser};
pub use store::{PostingStore, SharedPostingStore};
pub use types::{DocId, MAX_ID, MAX_POSITION};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
