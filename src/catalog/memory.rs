use std::collections::HashMap;

use crate::catalog::{Catalog, CatalogQuery};
use crate::error::Result;
use crate::media::{MediaId, MediaItem, SlotIds};

/// In-memory catalog with a fixed playback order, used by the playlist
/// and controller tests.
#[derive(Default)]
pub struct MemoryCatalog {
    order: Vec<SlotIds>,
    records: HashMap<MediaId, MediaItem>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: MediaItem) -> MediaId {
        let id = item.id;
        self.order.push((id, None));
        self.records.insert(id, item);
        id
    }

    pub fn push_pair(&mut self, primary: MediaItem, secondary: MediaItem) {
        let ids = (primary.id, Some(secondary.id));
        self.records.insert(primary.id, primary);
        self.records.insert(secondary.id, secondary);
        self.order.push(ids);
    }

    /// Drop the record while keeping the id in playback order, so the
    /// next fetch sees a stale entry.
    pub fn orphan(&mut self, id: MediaId) {
        self.records.remove(&id);
    }
}

impl Catalog for MemoryCatalog {
    fn query(&mut self, _query: &CatalogQuery) -> Result<Vec<SlotIds>> {
        Ok(self.order.clone())
    }

    fn record(&self, id: MediaId) -> Option<MediaItem> {
        self.records.get(&id).cloned()
    }

    fn delete(&mut self, id: MediaId) -> Result<()> {
        self.records.remove(&id);
        self.order.retain(|(a, b)| *a != id && *b != Some(id));
        Ok(())
    }

    fn albums(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .records
            .values()
            .map(MediaItem::folder_name)
            .filter(|n| !n.is_empty())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}
