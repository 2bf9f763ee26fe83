use std::path::PathBuf;
use std::time::{Duration, Instant};

use rand::prelude::*;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use crate::albums::AlbumRotation;
use crate::catalog::{Catalog, CatalogQuery, parse_sort_cols};
use crate::config::PlaylistOptions;
use crate::error::Result;
use crate::media::{Slot, SlotIds};

/// Ordered list of display slots with a cursor, rebuilt from the catalog
/// whenever a reload is pending. `next` always produces a displayable
/// slot, falling back to the no-media placeholder when the catalog has
/// nothing to offer.
pub struct Playlist {
    catalog: Box<dyn Catalog>,
    entries: Vec<SlotIds>,
    cursor: usize,
    /// Completed passes through the list since the last shuffle.
    run_through: u32,
    reload_pending: bool,
    shuffle: bool,
    reshuffle_runs: u32,
    reload_retry: Duration,
    base_query: CatalogQuery,
    albums: Option<AlbumRotation>,
    rng: StdRng,
    placeholder_image: PathBuf,
}

impl Playlist {
    pub fn new(
        catalog: Box<dyn Catalog>,
        options: &PlaylistOptions,
        library_path: &std::path::Path,
        no_media_image: Option<PathBuf>,
    ) -> Result<Self> {
        let base_query = CatalogQuery {
            scope: None,
            location_filter: non_empty(&options.location_filter),
            tags_filter: non_empty(&options.tags_filter),
            sort: parse_sort_cols(&options.sort_cols)?,
            shuffle: options.shuffle,
            recent_days: options.recent_days,
        };
        let albums = options
            .group_by_album
            .then(|| AlbumRotation::load(options.shown_albums_log_for(library_path)));
        let rng = match options.startup_shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self {
            catalog,
            entries: Vec::new(),
            cursor: 0,
            run_through: 0,
            reload_pending: true,
            shuffle: options.shuffle,
            reshuffle_runs: options.reshuffle_runs.max(1),
            reload_retry: options.reload_retry,
            base_query,
            albums,
            rng,
            placeholder_image: no_media_image.unwrap_or_default(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Request a rebuild before the next fetch. Called when the watcher
    /// reports library churn or options changed at runtime.
    pub fn mark_reload(&mut self) {
        self.reload_pending = true;
    }

    /// Produce the next display slot. Stale entries are skipped; once
    /// every entry in the list has missed, a reload is scheduled and the
    /// placeholder is shown instead of spinning forever.
    pub fn next(&mut self) -> Slot {
        if self.reload_pending {
            self.reload();
        }
        let mut misses = 0usize;
        loop {
            if self.entries.is_empty() {
                self.reload_pending = true;
                return self.placeholder();
            }
            if self.cursor >= self.entries.len() {
                self.cursor = 0;
                self.run_through += 1;
                if self.albums.is_some() {
                    // One full pass finishes the album; move on.
                    self.advance_album();
                    self.load_entries();
                    continue;
                }
                if self.shuffle && self.run_through >= self.reshuffle_runs {
                    self.run_through = 0;
                    self.entries.shuffle(&mut self.rng);
                    debug!(entries = self.entries.len(), "playlist reshuffled");
                }
                continue;
            }
            let ids = self.entries[self.cursor];
            self.cursor += 1;
            match self.resolve(ids) {
                Some(slot) => return slot,
                None => {
                    misses += 1;
                    if misses >= self.entries.len() {
                        warn!("every playlist entry is stale, scheduling reload");
                        self.reload_pending = true;
                        return self.placeholder();
                    }
                }
            }
        }
    }

    /// Step the cursor back so the next fetch returns the previous slot.
    /// The cursor already points one past the slot on screen, hence two.
    pub fn back(&mut self) {
        let len = self.entries.len();
        if len == 0 {
            return;
        }
        self.cursor = (self.cursor + 2 * len - 2) % len;
    }

    /// Remove a shown slot from catalog, disk and playback order.
    pub fn delete(&mut self, ids: SlotIds) {
        for id in std::iter::once(ids.0).chain(ids.1) {
            if let Err(err) = self.catalog.delete(id) {
                warn!(%err, "delete after show failed");
            }
        }
        if let Some(pos) = self.entries.iter().position(|e| *e == ids) {
            self.entries.remove(pos);
            if pos < self.cursor {
                self.cursor -= 1;
            }
        }
    }

    fn placeholder(&self) -> Slot {
        Slot::no_media(self.placeholder_image.clone())
    }

    /// Rebuild the entry list, polling an empty catalog once a second
    /// until `reload-retry` elapses. A library that stays empty leaves an
    /// empty list and the placeholder shows.
    fn reload(&mut self) {
        self.reload_pending = false;
        self.run_through = 0;
        let deadline = Instant::now() + self.reload_retry;
        loop {
            // A reload keeps the album in progress. Only a rotation that
            // has not started yet, or an album with nothing left in it,
            // picks a new one.
            if self.albums.as_ref().is_some_and(|r| r.current().is_none()) {
                self.advance_album();
            }
            self.load_entries();
            if self.entries.is_empty() && self.albums.is_some() {
                self.advance_album();
                self.load_entries();
            }
            if !self.entries.is_empty() || Instant::now() >= deadline {
                break;
            }
            std::thread::sleep(Duration::from_secs(1).min(self.reload_retry));
        }
        info!(entries = self.entries.len(), "playlist reloaded");
    }

    fn load_entries(&mut self) {
        let mut query = self.base_query.clone();
        if let Some(rotation) = &self.albums {
            query.scope = rotation.current().map(PathBuf::from);
        }
        self.entries = match self.catalog.query(&query) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(%err, "catalog query failed");
                Vec::new()
            }
        };
        if self.shuffle {
            self.entries.shuffle(&mut self.rng);
        }
        self.cursor = 0;
    }

    fn advance_album(&mut self) {
        // The album list reflects the last scan; an unscoped query first
        // keeps it current after library churn.
        if self
            .catalog
            .query(&CatalogQuery {
                scope: None,
                ..self.base_query.clone()
            })
            .is_err()
        {
            return;
        }
        let available = self.catalog.albums();
        if let Some(rotation) = &mut self.albums {
            rotation.advance(&available, &mut self.rng);
        }
    }

    /// Resolve ids into items, dropping any the catalog no longer knows.
    /// A pair whose primary vanished collapses to the surviving portrait.
    fn resolve(&self, ids: SlotIds) -> Option<Slot> {
        let primary = self.catalog.record(ids.0);
        let secondary = ids.1.and_then(|id| self.catalog.record(id));
        match (primary, secondary) {
            (Some(a), Some(b)) => Some(Slot::pair(a, b)),
            (Some(a), None) => Some(Slot::single(a)),
            (None, Some(b)) => Some(Slot::single(b)),
            (None, None) => {
                debug!("playlist entry is stale, skipping");
                None
            }
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() { None } else { Some(t.to_string()) }
}
