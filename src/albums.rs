use std::fs;
use std::path::PathBuf;

use rand::prelude::*;
use tracing::{debug, warn};

/// Rotates playback through one album (top-level library directory) at a
/// time. Albums already shown are persisted to a newline-delimited log so
/// a restart resumes the rotation instead of starting over.
pub struct AlbumRotation {
    log_path: PathBuf,
    shown: Vec<String>,
    current: Option<String>,
}

impl AlbumRotation {
    pub fn load(log_path: PathBuf) -> Self {
        let shown = match fs::read_to_string(&log_path) {
            Ok(text) => text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect(),
            Err(_) => Vec::new(),
        };
        Self {
            log_path,
            shown,
            current: None,
        }
    }

    /// Album currently being played through, if any.
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Pick the next album at random from those not yet shown. When every
    /// available album has been shown, the rotation resets and starts a
    /// fresh round. Returns `None` only when `available` is empty.
    pub fn advance<R: Rng + ?Sized>(
        &mut self,
        available: &[String],
        rng: &mut R,
    ) -> Option<String> {
        if available.is_empty() {
            self.current = None;
            return None;
        }
        // Albums deleted from disk fall out of the rotation here.
        self.shown.retain(|a| available.contains(a));
        let unshown: Vec<&String> = available
            .iter()
            .filter(|a| !self.shown.contains(a))
            .collect();
        let choice = match unshown.choose(rng) {
            Some(album) => (*album).clone(),
            None => {
                debug!("all albums shown, resetting rotation");
                self.shown.clear();
                available.choose(rng)?.clone()
            }
        };
        self.shown.push(choice.clone());
        self.persist();
        debug!(album = %choice, shown = self.shown.len(), "album rotation advanced");
        self.current = Some(choice.clone());
        Some(choice)
    }

    fn persist(&self) {
        let mut body = self.shown.join("\n");
        if !body.is_empty() {
            body.push('\n');
        }
        // Write-then-rename so a crash never truncates the log.
        let tmp = self.log_path.with_extension("tmp");
        let result = fs::write(&tmp, body).and_then(|()| fs::rename(&tmp, &self.log_path));
        if let Err(err) = result {
            warn!(path = %self.log_path.display(), %err, "could not persist shown albums");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn visits_every_album_before_repeating() {
        let dir = tempfile::tempdir().unwrap();
        let mut rotation = AlbumRotation::load(dir.path().join("shown.log"));
        let albums = names(&["alps", "beach", "city"]);
        let mut rng = StdRng::seed_from_u64(7);
        let mut round: Vec<String> = (0..3)
            .map(|_| rotation.advance(&albums, &mut rng).unwrap())
            .collect();
        round.sort();
        assert_eq!(round, albums);
        // Fourth pick starts a new round from the full set.
        assert!(albums.contains(&rotation.advance(&albums, &mut rng).unwrap()));
    }

    #[test]
    fn rotation_survives_restart_via_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("shown.log");
        let albums = names(&["alps", "beach"]);
        let mut rng = StdRng::seed_from_u64(1);
        let first = {
            let mut rotation = AlbumRotation::load(log.clone());
            rotation.advance(&albums, &mut rng).unwrap()
        };
        let mut rotation = AlbumRotation::load(log);
        let second = rotation.advance(&albums, &mut rng).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn removed_albums_drop_out_of_the_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("shown.log");
        fs::write(&log, "gone\nbeach\n").unwrap();
        let mut rotation = AlbumRotation::load(log);
        let mut rng = StdRng::seed_from_u64(2);
        let albums = names(&["beach", "city"]);
        assert_eq!(rotation.advance(&albums, &mut rng).unwrap(), "city");
    }

    #[test]
    fn empty_library_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let mut rotation = AlbumRotation::load(dir.path().join("shown.log"));
        let mut rng = StdRng::seed_from_u64(3);
        assert!(rotation.advance(&[], &mut rng).is_none());
        assert!(rotation.current().is_none());
    }
}
