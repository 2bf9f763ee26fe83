pub mod fs;
pub mod memory;

use crate::error::{Error, Result};
use crate::media::{MediaId, MediaItem, SlotIds};

pub use fs::FsCatalog;
pub use memory::MemoryCatalog;

/// Sortable columns a catalog exposes. `sort-cols` strings are parsed
/// against this set before a query runs.
pub const COLUMN_NAMES: &[&str] = &["fname", "taken-at", "modified", "folder", "location"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub column: String,
    pub dir: SortDir,
}

/// Parse a `sort-cols` string like "taken-at desc, fname" into typed
/// keys, rejecting unknown columns.
pub fn parse_sort_cols(raw: &str) -> Result<Vec<SortKey>> {
    let mut keys = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let mut words = part.split_whitespace();
        let column = words.next().unwrap_or_default().to_ascii_lowercase();
        if !COLUMN_NAMES.contains(&column.as_str()) {
            return Err(Error::Catalog(format!("unknown sort column '{column}'")));
        }
        let dir = match words.next().map(str::to_ascii_lowercase).as_deref() {
            None | Some("asc") => SortDir::Asc,
            Some("desc") => SortDir::Desc,
            Some(other) => {
                return Err(Error::Catalog(format!("bad sort direction '{other}'")));
            }
        };
        if let Some(junk) = words.next() {
            return Err(Error::Catalog(format!("trailing sort token '{junk}'")));
        }
        keys.push(SortKey { column, dir });
    }
    Ok(keys)
}

/// Selection criteria for one playlist build.
#[derive(Debug, Clone, Default)]
pub struct CatalogQuery {
    /// Restrict results to paths under this prefix, relative to the
    /// library root. Used for album rotation.
    pub scope: Option<std::path::PathBuf>,
    /// Case-insensitive substring match on the location field.
    pub location_filter: Option<String>,
    /// Case-insensitive substring match on the tags field.
    pub tags_filter: Option<String>,
    /// Applied when `shuffle` is false.
    pub sort: Vec<SortKey>,
    pub shuffle: bool,
    /// Items modified within this many days sort before everything else.
    pub recent_days: u32,
}

/// Media index backing the playlist. The filesystem implementation scans
/// and parses EXIF; the in-memory one backs tests.
pub trait Catalog: Send {
    /// Paths (and portrait pairs) matching the query, in playback order
    /// minus shuffling, which the playlist applies itself.
    fn query(&mut self, query: &CatalogQuery) -> Result<Vec<SlotIds>>;

    /// Full record for one id. `None` when the id is no longer indexed.
    fn record(&self, id: MediaId) -> Option<MediaItem>;

    /// Remove an entry from the index and from disk where applicable.
    fn delete(&mut self, id: MediaId) -> Result<()>;

    /// Album directories (depth-2 under the root) currently holding media.
    fn albums(&self) -> Vec<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multi_key_sort_cols() {
        let keys = parse_sort_cols("taken-at desc, fname").unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].column, "taken-at");
        assert_eq!(keys[0].dir, SortDir::Desc);
        assert_eq!(keys[1].column, "fname");
        assert_eq!(keys[1].dir, SortDir::Asc);
    }

    #[test]
    fn rejects_unknown_sort_column() {
        assert!(parse_sort_cols("rating desc").is_err());
        assert!(parse_sort_cols("fname sideways").is_err());
    }

    #[test]
    fn empty_sort_cols_is_fine() {
        assert!(parse_sort_cols("  ").unwrap().is_empty());
    }
}
