use std::collections::HashMap;
use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::NaiveDateTime;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::catalog::{Catalog, CatalogQuery, SortDir, SortKey};
use crate::error::{Error, Result};
use crate::media::{self, MediaId, MediaItem, SlotIds};

/// Catalog backed by a directory tree. Each query rescans the tree;
/// EXIF parsing is cached per path and skipped while the modification
/// time is unchanged.
pub struct FsCatalog {
    root: PathBuf,
    entries: HashMap<MediaId, MediaItem>,
    portrait_pairs: bool,
}

impl FsCatalog {
    pub fn new(root: impl Into<PathBuf>, portrait_pairs: bool) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::BadLibrary(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        Ok(Self {
            root,
            entries: HashMap::new(),
            portrait_pairs,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn scan(&mut self) {
        let started = std::time::Instant::now();
        let mut fresh = HashMap::new();
        let mut reused = 0usize;
        for entry in WalkDir::new(&self.root)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !entry.file_type().is_file() || !media::is_media_path(path) {
                continue;
            }
            let modified = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            let id = MediaId::from_path(path);
            if let Some(prev) = self.entries.get(&id) {
                if prev.last_modified == modified {
                    fresh.insert(id, prev.clone());
                    reused += 1;
                    continue;
                }
            }
            match index_file(path, id, modified) {
                Ok(item) => {
                    fresh.insert(id, item);
                }
                Err(err) => warn!(path = %path.display(), %err, "skipping unreadable file"),
            }
        }
        debug!(
            total = fresh.len(),
            reused,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "library scan complete"
        );
        self.entries = fresh;
    }

    fn matches(&self, item: &MediaItem, query: &CatalogQuery) -> bool {
        if let Some(scope) = &query.scope {
            if !item.path.starts_with(self.root.join(scope)) {
                return false;
            }
        }
        if let Some(filter) = &query.location_filter {
            let loc = item.location.as_deref().unwrap_or("").to_ascii_lowercase();
            if !loc.contains(&filter.to_ascii_lowercase()) {
                return false;
            }
        }
        if let Some(filter) = &query.tags_filter {
            let tags = item.tags.as_deref().unwrap_or("").to_ascii_lowercase();
            if !tags.contains(&filter.to_ascii_lowercase()) {
                return false;
            }
        }
        true
    }
}

impl Catalog for FsCatalog {
    fn query(&mut self, query: &CatalogQuery) -> Result<Vec<SlotIds>> {
        self.scan();
        let mut items: Vec<&MediaItem> = self
            .entries
            .values()
            .filter(|i| self.matches(i, query))
            .collect();
        if !query.shuffle {
            sort_items(&mut items, &query.sort);
            if query.recent_days > 0 {
                float_recent(&mut items, query.recent_days);
            }
        } else {
            // Stable base order so seeded shuffles are reproducible.
            items.sort_by(|a, b| a.path.cmp(&b.path));
        }
        Ok(build_slots(&items, self.portrait_pairs))
    }

    fn record(&self, id: MediaId) -> Option<MediaItem> {
        // Re-check existence at fetch time; the index may be minutes old.
        self.entries.get(&id).filter(|i| i.path.exists()).cloned()
    }

    fn delete(&mut self, id: MediaId) -> Result<()> {
        let Some(item) = self.entries.remove(&id) else {
            return Ok(());
        };
        fs::remove_file(&item.path)?;
        debug!(path = %item.path.display(), "deleted after show");
        Ok(())
    }

    fn albums(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .values()
            .filter_map(|i| {
                let rel = i.path.strip_prefix(&self.root).ok()?;
                // Files directly under the root belong to no album.
                let first = rel.components().next()?;
                if rel.components().count() < 2 {
                    return None;
                }
                Some(first.as_os_str().to_string_lossy().into_owned())
            })
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

/// Group an ordered item list into display slots, pairing consecutive
/// portrait images when enabled. Videos never pair.
fn build_slots(items: &[&MediaItem], portrait_pairs: bool) -> Vec<SlotIds> {
    let mut slots = Vec::with_capacity(items.len());
    let mut held_portrait: Option<MediaId> = None;
    for item in items {
        let pairable =
            portrait_pairs && item.is_portrait && media::is_image_path(&item.path);
        if !pairable {
            slots.push((item.id, None));
            continue;
        }
        match held_portrait.take() {
            Some(first) => slots.push((first, Some(item.id))),
            None => held_portrait = Some(item.id),
        }
    }
    if let Some(odd) = held_portrait {
        slots.push((odd, None));
    }
    slots
}

fn sort_items(items: &mut [&MediaItem], keys: &[SortKey]) {
    use std::cmp::Ordering;
    items.sort_by(|a, b| {
        for key in keys {
            let ord = match key.column.as_str() {
                "fname" => a.file_name().cmp(&b.file_name()),
                "taken-at" => cmp_optional(&a.taken_at, &b.taken_at),
                "modified" => a.last_modified.cmp(&b.last_modified),
                "folder" => a.folder_name().cmp(&b.folder_name()),
                "location" => cmp_optional(&a.location, &b.location),
                _ => Ordering::Equal,
            };
            let ord = match key.dir {
                SortDir::Asc => ord,
                SortDir::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.path.cmp(&b.path)
    });
}

/// None sorts after Some in either direction so unset metadata stays at
/// the tail.
fn cmp_optional<T: Ord>(a: &Option<T>, b: &Option<T>) -> std::cmp::Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
}

/// Stable partition that moves recently modified items to the front.
fn float_recent(items: &mut Vec<&MediaItem>, recent_days: u32) {
    let cutoff = SystemTime::now() - Duration::from_secs(u64::from(recent_days) * 86_400);
    let (recent, older): (Vec<_>, Vec<_>) =
        items.drain(..).partition(|i| i.last_modified >= cutoff);
    items.extend(recent);
    items.extend(older);
}

fn index_file(path: &Path, id: MediaId, modified: SystemTime) -> Result<MediaItem> {
    let mut item = MediaItem::bare(path.to_path_buf());
    item.id = id;
    item.last_modified = modified;
    item.tags = relative_tags(path);
    if media::is_image_path(path) {
        let (raw_w, raw_h) = image::image_dimensions(path).map_err(|e| Error::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        read_exif_into(path, &mut item);
        let swap = matches!(item.orientation, 5 | 6 | 7 | 8);
        (item.width, item.height) = if swap { (raw_h, raw_w) } else { (raw_w, raw_h) };
        item.is_portrait = item.height > item.width;
    }
    Ok(item)
}

/// Directory components below the library root, usable as coarse tags
/// when files carry no embedded keywords.
fn relative_tags(path: &Path) -> Option<String> {
    let parent = path.parent()?;
    let name = parent.file_name()?.to_string_lossy();
    if name.is_empty() { None } else { Some(name.into_owned()) }
}

fn read_exif_into(path: &Path, item: &mut MediaItem) {
    let Ok(f) = fs::File::open(path) else { return };
    let mut buf = BufReader::new(f);
    let Ok(reader) = exif::Reader::new().read_from_container(&mut buf) else {
        return;
    };
    use exif::{In, Tag, Value};

    if let Some(field) = reader.get_field(Tag::Orientation, In::PRIMARY) {
        item.orientation = match &field.value {
            Value::Short(arr) if !arr.is_empty() => arr[0],
            Value::Long(arr) if !arr.is_empty() => arr[0] as u16,
            _ => 1,
        };
    }
    if let Some(field) = reader.get_field(Tag::DateTimeOriginal, In::PRIMARY) {
        let raw = field.display_value().to_string();
        item.taken_at = NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(&raw, "%Y:%m:%d %H:%M:%S"))
            .ok();
    }
    if let Some(field) = reader.get_field(Tag::ImageDescription, In::PRIMARY) {
        let text = field.display_value().to_string();
        let text = text.trim_matches('"').trim().to_string();
        if !text.is_empty() {
            item.caption = Some(text);
        }
    }
    item.latitude = gps_coordinate(&reader, Tag::GPSLatitude, Tag::GPSLatitudeRef, "S");
    item.longitude = gps_coordinate(&reader, Tag::GPSLongitude, Tag::GPSLongitudeRef, "W");
    if let (Some(lat), Some(lon)) = (item.latitude, item.longitude) {
        item.location = Some(format!("{lat:.4}, {lon:.4}"));
    }
}

fn gps_coordinate(
    reader: &exif::Exif,
    tag: exif::Tag,
    ref_tag: exif::Tag,
    negative_ref: &str,
) -> Option<f64> {
    use exif::{In, Value};
    let field = reader.get_field(tag, In::PRIMARY)?;
    let Value::Rational(parts) = &field.value else {
        return None;
    };
    if parts.len() < 3 {
        return None;
    }
    let degrees =
        parts[0].to_f64() + parts[1].to_f64() / 60.0 + parts[2].to_f64() / 3600.0;
    let sign = reader
        .get_field(ref_tag, In::PRIMARY)
        .map(|f| f.display_value().to_string())
        .is_some_and(|r| r.contains(negative_ref));
    Some(if sign { -degrees } else { degrees })
}
