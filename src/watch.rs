use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Recursive watcher over the library root. Events only raise a dirty
/// flag; the controller folds it into its next reload decision so a
/// burst of filesystem churn costs one rescan.
pub struct LibraryWatcher {
    // Held for its Drop; dropping stops the backend threads.
    _watcher: RecommendedWatcher,
    dirty: Arc<AtomicBool>,
}

impl LibraryWatcher {
    pub fn new(root: &Path) -> Result<Self> {
        let dirty = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&dirty);
        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                    ) {
                        flag.store(true, Ordering::Release);
                    }
                }
                Err(err) => warn!(%err, "library watch error"),
            },
        )
        .map_err(|e| Error::Catalog(format!("watcher init: {e}")))?;
        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| Error::Catalog(format!("watching {}: {e}", root.display())))?;
        debug!(root = %root.display(), "library watcher started");
        Ok(Self {
            _watcher: watcher,
            dirty,
        })
    }

    /// Read and clear the dirty flag.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }
}
