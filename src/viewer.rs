use std::path::PathBuf;
use std::time::{Duration, Instant};

use image::RgbaImage;
use tracing::{debug, warn};

use crate::config::Configuration;
use crate::media::Slot;
use crate::overlay;
use crate::render::surface::{DrawSurface, Plane, PlaneTransform, TextureHandle};
use crate::render::text::TextRasterizer;
use crate::transition::{FadeState, KenburnsPath};
use crate::video::{PlaybackState, VideoBridge};

/// One slide currently occupying a plane.
struct ShownSlide {
    slot: Slot,
    texture: TextureHandle,
    motion: KenburnsPath,
    shown_at: Instant,
}

/// What the last tick observed, for the controller's advance decision.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameStatus {
    /// A video slot is on screen and its helper has not finished.
    pub video_active: bool,
    /// The helper finished this tick.
    pub video_just_ended: bool,
}

/// Owns what is on screen: the two fading planes, Ken Burns motion, the
/// caption strip and the video bridge. Pure presentation; deciding when
/// to advance lives in the controller.
pub struct Viewer {
    config: Configuration,
    fade: FadeState,
    front: Option<ShownSlide>,
    back: Option<ShownSlide>,
    overlay_window: Option<(Instant, Duration)>,
    /// Caption of the slide on the front plane, before any pause suffix.
    caption: String,
    overlay_dirty: bool,
    overlay_present: bool,
    paused: bool,
    rasterizer: Option<TextRasterizer>,
    bridge: VideoBridge,
    /// Video waiting for the cross-fade onto its poster to finish.
    pending_video: Option<PathBuf>,
    video_was_active: bool,
    brightness: f32,
}

impl Viewer {
    pub fn new(config: &Configuration) -> Self {
        let rasterizer = if config.overlay.duration.is_zero() || config.overlay.show.is_empty() {
            None
        } else {
            match TextRasterizer::load(config.overlay.font_file.as_deref()) {
                Ok(r) => Some(r),
                Err(err) => {
                    warn!(%err, "no usable font, caption overlay disabled");
                    None
                }
            }
        };
        let bridge = VideoBridge::new(&config.video);
        Self {
            fade: FadeState::new(config.viewer.fps, config.playlist.fade_time.as_secs_f32()),
            front: None,
            back: None,
            overlay_window: None,
            caption: String::new(),
            overlay_dirty: false,
            overlay_present: false,
            paused: false,
            rasterizer,
            bridge,
            pending_video: None,
            video_was_active: false,
            brightness: config.viewer.brightness,
            config: config.clone(),
        }
    }

    /// Put a freshly prepared slide on the front plane and start the
    /// cross-fade. Returns the slot that fully left the screen, which
    /// the controller may delete.
    pub fn show(
        &mut self,
        slot: Slot,
        image: RgbaImage,
        surface: &mut dyn DrawSurface,
        now: Instant,
    ) -> Option<Slot> {
        // The outgoing video stops as soon as its slide starts leaving.
        if self.front.as_ref().is_some_and(|s| s.slot.is_video()) || self.pending_video.is_some()
        {
            self.bridge.stop();
            self.pending_video = None;
        }

        let texture = surface.create_texture(&image);
        let (dw, dh) = surface.dimensions();
        let image_aspect = image.width() as f32 / image.height().max(1) as f32;
        let display_aspect = dw as f32 / dh.max(1) as f32;
        let motion = if slot.is_video() {
            KenburnsPath::STILL
        } else {
            KenburnsPath::plan(
                &self.config.viewer.kenburns,
                image_aspect,
                display_aspect,
                &mut rand::rng(),
            )
        };

        let departed = self.back.take();
        if let Some(old) = &departed {
            surface.drop_texture(old.texture);
        }
        self.back = self.front.take();
        if slot.is_video() {
            self.pending_video = Some(slot.primary.path.clone());
        }
        self.front = Some(ShownSlide {
            slot,
            texture,
            motion,
            shown_at: now,
        });
        surface.set_planes(
            self.back.as_ref().map(|s| s.texture),
            self.front.as_ref().map(|s| s.texture),
        );
        self.fade.restart();
        if let Some(front) = &self.front {
            self.caption = overlay::caption_for(&front.slot, &self.config.overlay);
        }
        self.overlay_dirty = true;
        self.overlay_window = Some((
            now + self.config.playlist.fade_time,
            self.config.overlay.duration,
        ));
        departed.map(|s| s.slot)
    }

    /// Advance per-frame state: fade, motion, caption ramp, video
    /// handoff. Runs every frame, paused or not; a pause freezes the
    /// advance decision upstream, not the pixels.
    pub fn tick(&mut self, surface: &mut dyn DrawSurface, now: Instant) -> FrameStatus {
        if !self.fade.done() {
            self.fade.tick();
        }
        surface.set_blend(self.fade.blend());
        surface.set_brightness(self.brightness);

        let window = self.config.playlist.time_delay;
        if let Some(front) = &self.front {
            surface.set_plane_transform(Plane::Front, plane_at(front, now, window));
        }
        if let Some(back) = &self.back {
            surface.set_plane_transform(Plane::Back, plane_at(back, now, window));
        }

        if self.overlay_dirty {
            self.rebuild_overlay(surface);
            self.overlay_dirty = false;
        }
        let overlay_alpha = if !self.overlay_present {
            0.0
        } else if self.paused {
            // Pause pins the caption (with its PAUSED marker) on screen.
            self.config.overlay.opacity
        } else {
            match self.overlay_window {
                Some((start, total)) if now >= start => {
                    overlay::ramp_alpha(now - start, total) * self.config.overlay.opacity
                }
                _ => 0.0,
            }
        };
        surface.set_overlay_alpha(overlay_alpha);

        let mut status = FrameStatus::default();
        if self.video_due(now) {
            if let Some(path) = self.pending_video.take() {
                self.bridge.load(&path);
            }
        }
        let playback = self.bridge.poll(now);
        let showing_video = self.front.as_ref().is_some_and(|s| s.slot.is_video());
        status.video_active = showing_video
            && (self.pending_video.is_some()
                || matches!(
                    playback,
                    PlaybackState::Loading | PlaybackState::Playing | PlaybackState::Paused
                ));
        status.video_just_ended = self.video_was_active && !status.video_active;
        self.video_was_active = status.video_active;
        surface.set_video_active(status.video_active);
        status
    }

    /// A pending video may start only once the fade onto its poster has
    /// landed and the caption window has run out, so both get their time
    /// on screen first.
    fn video_due(&self, now: Instant) -> bool {
        if !self.fade.done() {
            return false;
        }
        match self.overlay_window {
            Some((start, total)) => now >= start + total,
            None => true,
        }
    }

    pub fn set_paused(&mut self, paused: bool, now: Instant) {
        if paused == self.paused {
            return;
        }
        self.paused = paused;
        self.overlay_dirty = true;
        // An expired caption window comes back so the pause state is
        // readable, and stays readable for a moment after resume.
        if let Some((start, total)) = self.overlay_window {
            if now >= start + total {
                self.overlay_window = Some((now, total));
            }
        }
        if paused {
            self.bridge.pause();
        } else {
            self.bridge.resume();
        }
    }

    pub fn set_brightness(&mut self, value: f32) {
        self.brightness = value.clamp(0.0, 1.0);
    }

    pub fn brightness(&self) -> f32 {
        self.brightness
    }

    pub fn shutdown(&mut self) {
        self.bridge.shutdown();
    }

    fn rebuild_overlay(&mut self, surface: &mut dyn DrawSurface) {
        self.overlay_present = false;
        let Some(rasterizer) = &self.rasterizer else {
            surface.set_overlay(None);
            return;
        };
        let mut caption = self.caption.clone();
        if self.paused {
            if !caption.is_empty() {
                caption.push('\n');
            }
            caption.push_str("PAUSED");
        }
        match rasterizer.render_strip(&caption, surface.dimensions(), &self.config.overlay) {
            Some(strip) => {
                surface.set_overlay(Some(&strip));
                self.overlay_present = true;
            }
            None => {
                debug!("empty caption, overlay skipped");
                surface.set_overlay(None);
            }
        }
    }
}

/// Sample a slide's Ken Burns path at this instant. Outgoing slides keep
/// following their own path so the fade never snaps their motion.
fn plane_at(slide: &ShownSlide, now: Instant, window: Duration) -> PlaneTransform {
    let progress = if window.is_zero() {
        1.0
    } else {
        (now.saturating_duration_since(slide.shown_at).as_secs_f32() / window.as_secs_f32())
            .clamp(0.0, 1.0)
    };
    let frame = slide.motion.at(progress);
    PlaneTransform {
        scale: [1.0 / frame.zoom, 1.0 / frame.zoom],
        offset: frame.offset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaItem;
    use crate::render::surface::testing::RecordingSurface;
    use std::path::PathBuf;

    fn test_config() -> Configuration {
        let mut config = Configuration::default();
        config.playlist.fade_time = Duration::from_secs(1);
        config.playlist.time_delay = Duration::from_secs(10);
        config.viewer.fps = 10.0;
        // Keep tests free of fonts and helper processes.
        config.overlay.duration = Duration::ZERO;
        config.video.player_command = "/nonexistent/video-helper".into();
        config
    }

    fn slot(path: &str) -> Slot {
        Slot::single(MediaItem::bare(PathBuf::from(path)))
    }

    #[test]
    fn fade_completes_over_fps_ticks() {
        let mut viewer = Viewer::new(&test_config());
        let mut surface = RecordingSurface::new(160, 90);
        let now = Instant::now();
        viewer.show(slot("/lib/a.jpg"), RgbaImage::new(8, 4), &mut surface, now);
        viewer.tick(&mut surface, now);
        assert!(surface.blend < 1.0);
        for _ in 0..9 {
            viewer.tick(&mut surface, now);
        }
        assert_eq!(surface.blend, 1.0);
    }

    #[test]
    fn pause_mid_fade_leaves_the_blend_on_schedule() {
        let mut viewer = Viewer::new(&test_config());
        let mut surface = RecordingSurface::new(160, 90);
        let now = Instant::now();
        viewer.show(slot("/lib/a.jpg"), RgbaImage::new(8, 4), &mut surface, now);
        for _ in 0..3 {
            viewer.tick(&mut surface, now);
        }
        let mid = surface.blend;
        viewer.set_paused(true, now);
        viewer.tick(&mut surface, now);
        assert!(surface.blend > mid);
        for _ in 0..6 {
            viewer.tick(&mut surface, now);
        }
        // Ten ticks at 10 fps finish a one-second fade, paused or not.
        assert_eq!(surface.blend, 1.0);
    }

    #[test]
    fn third_slide_evicts_the_first_texture() {
        let mut viewer = Viewer::new(&test_config());
        let mut surface = RecordingSurface::new(160, 90);
        let now = Instant::now();
        assert!(
            viewer
                .show(slot("/lib/a.jpg"), RgbaImage::new(8, 4), &mut surface, now)
                .is_none()
        );
        assert!(
            viewer
                .show(slot("/lib/b.jpg"), RgbaImage::new(8, 4), &mut surface, now)
                .is_none()
        );
        let departed = viewer.show(slot("/lib/c.jpg"), RgbaImage::new(8, 4), &mut surface, now);
        assert_eq!(
            departed.unwrap().primary.path,
            PathBuf::from("/lib/a.jpg")
        );
        // Only the two live planes keep textures.
        assert_eq!(surface.live_textures.len(), 2);
    }

    #[test]
    fn video_without_helper_ends_immediately() {
        let mut viewer = Viewer::new(&test_config());
        let mut surface = RecordingSurface::new(160, 90);
        let now = Instant::now();
        viewer.show(
            slot("/lib/clip.mp4"),
            RgbaImage::new(8, 4),
            &mut surface,
            now,
        );
        // Mid-fade the video has not started.
        let status = viewer.tick(&mut surface, now);
        assert!(status.video_active);
        for _ in 0..10 {
            viewer.tick(&mut surface, now);
        }
        // The caption window ends with the fade here; past it the
        // degraded bridge reports Ended right away.
        let status = viewer.tick(&mut surface, now + Duration::from_secs(2));
        assert!(!status.video_active);
    }

    #[test]
    fn video_waits_out_the_caption_window() {
        let mut config = test_config();
        config.overlay.duration = Duration::from_secs(5);
        let mut viewer = Viewer::new(&config);
        let mut surface = RecordingSurface::new(160, 90);
        let now = Instant::now();
        viewer.show(
            slot("/lib/clip.mp4"),
            RgbaImage::new(8, 4),
            &mut surface,
            now,
        );
        for _ in 0..10 {
            viewer.tick(&mut surface, now);
        }
        // Fade done, but the caption window runs until fade end + 5s.
        let status = viewer.tick(&mut surface, now + Duration::from_secs(3));
        assert!(status.video_active);
        let status = viewer.tick(&mut surface, now + Duration::from_secs(7));
        assert!(!status.video_active);
    }

    #[test]
    fn pause_toggle_rearms_an_expired_caption_window() {
        let mut config = test_config();
        config.overlay.duration = Duration::from_secs(5);
        let mut viewer = Viewer::new(&config);
        let mut surface = RecordingSurface::new(160, 90);
        let now = Instant::now();
        viewer.show(slot("/lib/a.jpg"), RgbaImage::new(8, 4), &mut surface, now);
        // Well past the window, pausing brings the caption back.
        let late = now + Duration::from_secs(20);
        viewer.set_paused(true, late);
        assert_eq!(viewer.overlay_window, Some((late, Duration::from_secs(5))));
        // A toggle inside a live window leaves it alone.
        viewer.set_paused(false, late + Duration::from_secs(1));
        assert_eq!(viewer.overlay_window, Some((late, Duration::from_secs(5))));
    }

    #[test]
    fn brightness_clamps_and_reaches_surface() {
        let mut viewer = Viewer::new(&test_config());
        let mut surface = RecordingSurface::new(160, 90);
        viewer.set_brightness(3.0);
        viewer.tick(&mut surface, Instant::now());
        assert_eq!(surface.brightness, 1.0);
    }
}
