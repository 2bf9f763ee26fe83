use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::NaiveDateTime;

/// Stable identity of a catalog entry, derived from its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MediaId(pub u64);

impl MediaId {
    pub fn from_path(path: &Path) -> Self {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        path.hash(&mut hasher);
        Self(hasher.finish())
    }
}

/// One or two ids displayed together (portrait pairing).
pub type SlotIds = (MediaId, Option<MediaId>);

/// Immutable snapshot of one catalog entry, fetched per display cycle.
#[derive(Debug, Clone)]
pub struct MediaItem {
    pub path: PathBuf,
    pub id: MediaId,
    pub last_modified: SystemTime,
    /// EXIF orientation code, 1..=8. 1 means no transform.
    pub orientation: u16,
    pub taken_at: Option<NaiveDateTime>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location: Option<String>,
    pub width: u32,
    pub height: u32,
    pub is_portrait: bool,
    pub title: Option<String>,
    pub caption: Option<String>,
    pub tags: Option<String>,
}

impl MediaItem {
    /// Minimal record for paths that never went through the catalog,
    /// such as the no-media placeholder image.
    pub fn bare(path: PathBuf) -> Self {
        Self {
            id: MediaId::from_path(&path),
            path,
            last_modified: SystemTime::UNIX_EPOCH,
            orientation: 1,
            taken_at: None,
            latitude: None,
            longitude: None,
            location: None,
            width: 0,
            height: 0,
            is_portrait: false,
            title: None,
            caption: None,
            tags: None,
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn folder_name(&self) -> String {
        self.path
            .parent()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// What is shown during one display cycle. The primary item is always
/// present; a secondary item appears only when two portraits are paired.
#[derive(Debug, Clone)]
pub struct Slot {
    pub primary: MediaItem,
    pub secondary: Option<MediaItem>,
    /// True for the no-media placeholder slot.
    pub placeholder: bool,
}

impl Slot {
    pub fn single(item: MediaItem) -> Self {
        Self {
            primary: item,
            secondary: None,
            placeholder: false,
        }
    }

    pub fn pair(primary: MediaItem, secondary: MediaItem) -> Self {
        Self {
            primary,
            secondary: Some(secondary),
            placeholder: false,
        }
    }

    pub fn no_media(placeholder_image: PathBuf) -> Self {
        Self {
            primary: MediaItem::bare(placeholder_image),
            secondary: None,
            placeholder: true,
        }
    }

    pub fn is_video(&self) -> bool {
        self.secondary.is_none() && is_video_path(&self.primary.path)
    }
}

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "mov", "avi", "webm", "m4v", "mpg", "mpeg"];

fn ext_matches(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| exts.contains(&e.as_str()))
}

pub fn is_image_path(path: &Path) -> bool {
    ext_matches(path, IMAGE_EXTENSIONS)
}

pub fn is_video_path(path: &Path) -> bool {
    ext_matches(path, VIDEO_EXTENSIONS)
}

pub fn is_media_path(path: &Path) -> bool {
    is_image_path(path) || is_video_path(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_extensions_case_insensitively() {
        assert!(is_image_path(Path::new("/a/b/photo.JPG")));
        assert!(is_video_path(Path::new("/a/b/clip.Mp4")));
        assert!(!is_media_path(Path::new("/a/b/readme.txt")));
        assert!(!is_media_path(Path::new("/a/b/noext")));
    }

    #[test]
    fn media_id_is_stable_per_path() {
        let a = MediaId::from_path(Path::new("/x/y.jpg"));
        let b = MediaId::from_path(Path::new("/x/y.jpg"));
        let c = MediaId::from_path(Path::new("/x/z.jpg"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn video_slot_requires_single_item() {
        let clip = MediaItem::bare(PathBuf::from("/v/clip.mp4"));
        assert!(Slot::single(clip.clone()).is_video());
        let pic = MediaItem::bare(PathBuf::from("/v/pic.jpg"));
        assert!(!Slot::pair(clip, pic).is_video());
    }
}
