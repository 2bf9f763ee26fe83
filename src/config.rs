use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::overlay::OverlayField;

/// Top-level configuration, loaded from a kebab-case YAML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// Root directory holding the media library.
    pub library_path: PathBuf,
    /// Image shown when the catalog yields nothing displayable.
    pub no_media_image: Option<PathBuf>,
    pub playlist: PlaylistOptions,
    pub viewer: ViewerOptions,
    pub overlay: OverlayOptions,
    pub video: VideoOptions,
    pub display_power: DisplayPowerOptions,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            library_path: PathBuf::new(),
            no_media_image: None,
            playlist: PlaylistOptions::default(),
            viewer: ViewerOptions::default(),
            overlay: OverlayOptions::default(),
            video: VideoOptions::default(),
            display_power: DisplayPowerOptions::default(),
        }
    }
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.as_ref().display()))?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde
    /// defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            !self.library_path.as_os_str().is_empty(),
            "library-path must be set"
        );
        self.playlist.validate()?;
        self.viewer.validate()?;
        self.overlay.validate()?;
        self.video.validate()?;
        Ok(self)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PlaylistOptions {
    /// Time an item stays on screen before the next advance.
    #[serde(with = "humantime_serde")]
    pub time_delay: Duration,
    /// Cross-fade duration between slides.
    #[serde(with = "humantime_serde")]
    pub fade_time: Duration,
    pub shuffle: bool,
    /// Full passes through the list before a reshuffle is forced.
    pub reshuffle_runs: u32,
    /// Sort columns when shuffle is off, e.g. "taken-at desc, fname".
    pub sort_cols: String,
    /// Pair consecutive portrait images side by side.
    pub portrait_pairs: bool,
    /// Delete items from disk and catalog after they were shown.
    pub delete_after_show: bool,
    /// Rotate through one album (depth-2 directory) at a time.
    pub group_by_album: bool,
    /// Persisted list of albums already shown in the current rotation.
    /// Defaults to `.shown-albums.log` under the library root.
    pub shown_albums_log: Option<PathBuf>,
    /// Substring filter on the resolved location field.
    pub location_filter: String,
    /// Substring filter on the tags field.
    pub tags_filter: String,
    /// Float items modified within this window to the front of sorted
    /// playlists. Zero disables the behavior.
    pub recent_days: u32,
    /// How long a reload keeps polling an empty catalog before giving up.
    #[serde(with = "humantime_serde")]
    pub reload_retry: Duration,
    /// Optional deterministic seed for shuffling and album choice.
    pub startup_shuffle_seed: Option<u64>,
}

impl Default for PlaylistOptions {
    fn default() -> Self {
        Self {
            time_delay: Duration::from_secs(200),
            fade_time: Duration::from_secs(10),
            shuffle: true,
            reshuffle_runs: 1,
            sort_cols: "fname asc".to_string(),
            portrait_pairs: false,
            delete_after_show: false,
            group_by_album: false,
            shown_albums_log: None,
            location_filter: String::new(),
            tags_filter: String::new(),
            recent_days: 0,
            reload_retry: Duration::from_secs(10),
            startup_shuffle_seed: None,
        }
    }
}

impl PlaylistOptions {
    fn validate(&self) -> Result<()> {
        ensure!(
            self.time_delay > Duration::ZERO,
            "playlist.time-delay must be positive"
        );
        ensure!(
            self.reshuffle_runs >= 1,
            "playlist.reshuffle-runs must be >= 1"
        );
        ensure!(
            self.fade_time < self.time_delay,
            "playlist.fade-time must be shorter than playlist.time-delay"
        );
        Ok(())
    }

    pub fn shown_albums_log_for(&self, library_path: &Path) -> PathBuf {
        self.shown_albums_log
            .clone()
            .unwrap_or_else(|| library_path.join(".shown-albums.log"))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ViewerOptions {
    /// Target render frame rate; also sizes the fade step.
    pub fps: f32,
    /// Centre-crop to this aspect ratio, e.g. "16:9", before fitting.
    pub crop_aspect_ratio: Option<String>,
    /// Letterbox slides onto a display-aspect mat when the aspect
    /// difference exceeds `mat-tolerance`.
    pub mat_images: bool,
    pub mat_tolerance: f32,
    pub mat_color: [u8; 3],
    /// Fill the letterbox with a blurred copy of the slide instead of the
    /// mat color.
    pub blur_edges: bool,
    pub blur_amount: f32,
    pub edge_alpha: f32,
    pub kenburns: KenburnsOptions,
    /// Initial brightness, scaling slide and overlay alpha uniformly.
    pub brightness: f32,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            fps: 20.0,
            crop_aspect_ratio: None,
            mat_images: true,
            mat_tolerance: 0.01,
            mat_color: [0, 0, 0],
            blur_edges: false,
            blur_amount: 12.0,
            edge_alpha: 0.5,
            kenburns: KenburnsOptions::default(),
            brightness: 1.0,
        }
    }
}

impl ViewerOptions {
    fn validate(&self) -> Result<()> {
        ensure!(self.fps > 0.0, "viewer.fps must be positive");
        ensure!(
            (0.0..=1.0).contains(&self.brightness),
            "viewer.brightness must be in 0..=1"
        );
        ensure!(
            (0.0..=1.0).contains(&self.edge_alpha),
            "viewer.edge-alpha must be in 0..=1"
        );
        ensure!(self.mat_tolerance >= 0.0, "viewer.mat-tolerance must be >= 0");
        if self.crop_aspect_ratio.is_some() {
            self.crop_ratio().context("invalid viewer.crop-aspect-ratio")?;
        }
        self.kenburns.validate()?;
        Ok(())
    }

    /// Parsed `crop-aspect-ratio` as width/height, if configured.
    pub fn crop_ratio(&self) -> Result<Option<f32>> {
        let Some(raw) = self.crop_aspect_ratio.as_deref() else {
            return Ok(None);
        };
        let (w, h) = raw
            .split_once(':')
            .with_context(|| format!("expected W:H, got '{raw}'"))?;
        let w: f32 = w.trim().parse().context("aspect width")?;
        let h: f32 = h.trim().parse().context("aspect height")?;
        ensure!(w > 0.0 && h > 0.0, "aspect terms must be positive");
        Ok(Some(w / h))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ZoomDirection {
    In,
    Out,
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScrollDirection {
    Up,
    Down,
    Random,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct KenburnsOptions {
    pub enabled: bool,
    pub zoom_direction: ZoomDirection,
    pub scroll_direction: ScrollDirection,
    /// Maximum zoom applied to landscape images, percent.
    pub zoom_pct: f32,
    /// Pan wobble for landscape images, percent of the display size.
    pub landscape_wobble_pct: f32,
    /// Horizontal wobble for portrait scrolls, percent of display width.
    pub portrait_wobble_pct: f32,
    /// Random clearance kept at either end of a portrait scroll, percent
    /// of the maximum pan.
    pub portrait_border_pct: f32,
    pub random_pan: bool,
}

impl Default for KenburnsOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            zoom_direction: ZoomDirection::Random,
            scroll_direction: ScrollDirection::Random,
            zoom_pct: 10.0,
            landscape_wobble_pct: 5.0,
            portrait_wobble_pct: 5.0,
            portrait_border_pct: 20.0,
            random_pan: true,
        }
    }
}

impl KenburnsOptions {
    fn validate(&self) -> Result<()> {
        for (label, v) in [
            ("zoom-pct", self.zoom_pct),
            ("landscape-wobble-pct", self.landscape_wobble_pct),
            ("portrait-wobble-pct", self.portrait_wobble_pct),
            ("portrait-border-pct", self.portrait_border_pct),
        ] {
            ensure!(v >= 0.0, "viewer.kenburns.{label} must be >= 0");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextJustify {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OverlayOptions {
    /// Ordered set of fields composing the overlay caption.
    pub show: Vec<OverlayField>,
    /// How long the overlay stays visible after the fade completes.
    /// Zero disables the overlay entirely.
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    /// strftime-style format for the Date field.
    pub date_format: String,
    pub text_size: f32,
    pub opacity: f32,
    pub justify: TextJustify,
    /// Gradient backdrop height as a fraction of the display height.
    pub backdrop_height: f32,
    /// Explicit font file; a system sans-serif face is located when unset.
    pub font_file: Option<PathBuf>,
    /// Substrings stripped from resolved locations before display.
    pub geo_suppress: Vec<String>,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            show: vec![OverlayField::FileName, OverlayField::Location],
            duration: Duration::from_secs(20),
            date_format: "%b %d, %Y".to_string(),
            text_size: 40.0,
            opacity: 1.0,
            justify: TextJustify::Left,
            backdrop_height: 0.25,
            font_file: None,
            geo_suppress: Vec::new(),
        }
    }
}

impl OverlayOptions {
    fn validate(&self) -> Result<()> {
        ensure!(
            (0.0..=1.0).contains(&self.opacity),
            "overlay.opacity must be in 0..=1"
        );
        ensure!(
            (0.0..=1.0).contains(&self.backdrop_height),
            "overlay.backdrop-height must be in 0..=1"
        );
        ensure!(self.text_size > 0.0, "overlay.text-size must be positive");
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct VideoOptions {
    /// Helper binary speaking the line protocol (`load`, `pause`,
    /// `resume`, `stop` in; `STATE:...` out).
    pub player_command: String,
    /// Extra arguments passed to the helper at spawn.
    pub player_args: Vec<String>,
    /// Promote Loading to Playing after this long without a state line.
    #[serde(with = "humantime_serde")]
    pub startup_grace: Duration,
    /// Bound on first-frame poster extraction.
    #[serde(with = "humantime_serde")]
    pub poster_timeout: Duration,
    /// ffmpeg binary used for poster extraction.
    pub ffmpeg_path: String,
}

impl Default for VideoOptions {
    fn default() -> Self {
        Self {
            player_command: "frameshow-video-player".to_string(),
            player_args: Vec::new(),
            startup_grace: Duration::from_secs(1),
            poster_timeout: Duration::from_secs(5),
            ffmpeg_path: "ffmpeg".to_string(),
        }
    }
}

impl VideoOptions {
    fn validate(&self) -> Result<()> {
        ensure!(
            !self.player_command.trim().is_empty(),
            "video.player-command must not be blank"
        );
        ensure!(
            self.poster_timeout > Duration::ZERO,
            "video.poster-timeout must be positive"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayPowerBackend {
    /// `vcgencmd display_power` (Raspberry Pi).
    Pi,
    /// `xset dpms force on/off` on X.
    XDpms,
    /// `wlr-randr --output <name> --on/--off` on wayland.
    WlrRandr,
    /// Power control disabled; queries report the display as on.
    #[default]
    None,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DisplayPowerOptions {
    pub backend: DisplayPowerBackend,
    /// Output name for the wlr-randr backend.
    pub output: String,
}

impl Default for DisplayPowerOptions {
    fn default() -> Self {
        Self {
            backend: DisplayPowerBackend::None,
            output: "HDMI-A-1".to_string(),
        }
    }
}
