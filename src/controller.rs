use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::PlaylistOptions;
use crate::input::PlayerCommand;
use crate::media::Slot;
use crate::playlist::Playlist;
use crate::viewer::FrameStatus;

/// Decides when the show advances. Owns the playlist and the display
/// timer; the viewer reports what is on screen and this folds commands,
/// video completion and the clock into "fetch the next slot now" or
/// "not yet".
pub struct Controller {
    playlist: Playlist,
    time_delay: Duration,
    delete_after_show: bool,
    /// When the current slide's time is up. `None` means due now.
    next_due: Option<Instant>,
    paused: bool,
    /// A navigation command forces the next fetch through pause and
    /// video playback.
    force: bool,
}

impl Controller {
    pub fn new(playlist: Playlist, options: &PlaylistOptions) -> Self {
        Self {
            playlist,
            time_delay: options.time_delay,
            delete_after_show: options.delete_after_show,
            next_due: None,
            paused: false,
            force: false,
        }
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    /// Fold a navigation command in. Returns true when the command was
    /// one this controller handles.
    pub fn apply(&mut self, command: PlayerCommand) -> bool {
        match command {
            PlayerCommand::Next => {
                self.force = true;
            }
            PlayerCommand::Back => {
                self.playlist.back();
                self.force = true;
            }
            PlayerCommand::TogglePause => {
                self.paused = !self.paused;
                info!(paused = self.paused, "playback toggled");
            }
            PlayerCommand::Pause => self.paused = true,
            PlayerCommand::Resume => self.paused = false,
            PlayerCommand::Reload => self.playlist.mark_reload(),
            _ => return false,
        }
        true
    }

    /// The library watcher noticed churn; rebuild on the next fetch.
    pub fn mark_reload(&mut self) {
        self.playlist.mark_reload();
    }

    /// Produce the next slot when one is due. A playing video holds the
    /// slide regardless of the timer unless navigation forced through.
    pub fn next_request(&mut self, now: Instant, video_active: bool) -> Option<Slot> {
        if self.force {
            self.force = false;
        } else {
            if self.paused || video_active {
                return None;
            }
            if let Some(due) = self.next_due {
                if now < due {
                    return None;
                }
            }
        }
        let slot = self.playlist.next();
        self.next_due = Some(now + self.time_delay);
        debug!(path = %slot.primary.path.display(), "advancing");
        Some(slot)
    }

    /// The last fetched slide could not be shown; advance again right
    /// away instead of sitting on it for the full delay.
    pub fn skip(&mut self, now: Instant) {
        self.next_due = Some(now);
    }

    /// Fold what the last frame observed into scheduling.
    pub fn absorb(&mut self, status: FrameStatus, now: Instant) {
        if status.video_just_ended {
            // The clip ran its course; move on right away.
            self.next_due = Some(now);
        }
    }

    /// A slide left the screen for good.
    pub fn retire(&mut self, slot: Slot) {
        if !self.delete_after_show || slot.placeholder {
            return;
        }
        let ids = (slot.primary.id, slot.secondary.as_ref().map(|s| s.id));
        self.playlist.delete(ids);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::media::MediaItem;
    use std::path::{Path, PathBuf};

    fn options() -> PlaylistOptions {
        PlaylistOptions {
            time_delay: Duration::from_secs(10),
            fade_time: Duration::from_secs(1),
            shuffle: false,
            reload_retry: Duration::ZERO,
            ..PlaylistOptions::default()
        }
    }

    fn controller(paths: &[&str]) -> Controller {
        let mut catalog = MemoryCatalog::new();
        for p in paths {
            catalog.push(MediaItem::bare(PathBuf::from(p)));
        }
        let playlist = Playlist::new(
            Box::new(catalog),
            &options(),
            Path::new("/lib"),
            None,
        )
        .unwrap();
        Controller::new(playlist, &options())
    }

    #[test]
    fn first_fetch_is_due_immediately_then_waits() {
        let mut c = controller(&["/lib/a.jpg", "/lib/b.jpg"]);
        let t0 = Instant::now();
        let slot = c.next_request(t0, false).unwrap();
        assert_eq!(slot.primary.path, PathBuf::from("/lib/a.jpg"));
        assert!(c.next_request(t0 + Duration::from_secs(5), false).is_none());
        let slot = c.next_request(t0 + Duration::from_secs(10), false).unwrap();
        assert_eq!(slot.primary.path, PathBuf::from("/lib/b.jpg"));
    }

    #[test]
    fn pause_holds_the_timer_but_not_navigation() {
        let mut c = controller(&["/lib/a.jpg", "/lib/b.jpg"]);
        let t0 = Instant::now();
        c.next_request(t0, false).unwrap();
        c.apply(PlayerCommand::Pause);
        assert!(c.next_request(t0 + Duration::from_secs(60), false).is_none());
        c.apply(PlayerCommand::Next);
        assert!(c.next_request(t0 + Duration::from_secs(60), false).is_some());
    }

    #[test]
    fn back_revisits_the_previous_slot() {
        let mut c = controller(&["/lib/a.jpg", "/lib/b.jpg", "/lib/c.jpg"]);
        let t0 = Instant::now();
        c.next_request(t0, false).unwrap();
        c.next_request(t0 + Duration::from_secs(10), false).unwrap();
        c.apply(PlayerCommand::Back);
        let slot = c.next_request(t0 + Duration::from_secs(11), false).unwrap();
        assert_eq!(slot.primary.path, PathBuf::from("/lib/a.jpg"));
    }

    #[test]
    fn video_holds_until_it_ends() {
        let mut c = controller(&["/lib/clip.mp4", "/lib/b.jpg"]);
        let t0 = Instant::now();
        c.next_request(t0, false).unwrap();
        // Timer expired but the clip is still going.
        let late = t0 + Duration::from_secs(30);
        assert!(c.next_request(late, true).is_none());
        c.absorb(
            FrameStatus {
                video_active: false,
                video_just_ended: true,
            },
            late,
        );
        assert!(c.next_request(late, false).is_some());
    }

    #[test]
    fn skipped_slide_advances_without_waiting() {
        let mut c = controller(&["/lib/a.jpg", "/lib/b.jpg"]);
        let t0 = Instant::now();
        c.next_request(t0, false).unwrap();
        let soon = t0 + Duration::from_secs(1);
        assert!(c.next_request(soon, false).is_none());
        c.skip(soon);
        let slot = c.next_request(soon, false).unwrap();
        assert_eq!(slot.primary.path, PathBuf::from("/lib/b.jpg"));
    }

    #[test]
    fn empty_library_yields_placeholder() {
        let mut c = controller(&[]);
        let slot = c.next_request(Instant::now(), false).unwrap();
        assert!(slot.placeholder);
    }
}
