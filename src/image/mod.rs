//! Immutable on-disk index images.
//!
//! [`IndexBuilder`] sorts postings and per-id blobs externally and writes four
//! files next to a base path:
//!
//! - `<base>_gbl_idx`: one u64 offset per id into `<base>_gbl`, 0 when absent
//! - `<base>_gbl`: length-prefixed blobs
//! - `<base>_term_idx`: sorted `term\0`, u64 data offset, u32 max list size
//! - `<base>_term_data`: length-prefixed grouped postings per term
//!
//! [`Image`] loads them back, mapped or read into memory, and serves the
//! same cursor contract as the live store.

mod builder;
mod cursor;
pub(crate) mod format;
mod reader;
mod sort;

pub use builder::{BuildStats, IndexBuilder};
pub use cursor::ImageTermCursor;
pub use format::MAX_GROUP_BYTES;
pub use reader::Image;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub const GLOBAL_INDEX_SUFFIX: &str = "_gbl_idx";
pub const GLOBAL_DATA_SUFFIX: &str = "_gbl";
pub const TERM_INDEX_SUFFIX: &str = "_term_idx";
pub const TERM_DATA_SUFFIX: &str = "_term_data";

/// `<base><suffix>`
pub(crate) fn image_path(base: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_path_appends_suffix() {
        let path = image_path(Path::new("/data/main"), TERM_DATA_SUFFIX);
        assert_eq!(path, PathBuf::from("/data/main_term_data"));
    }
}
