use rand::Rng;

use crate::config::{KenburnsOptions, ScrollDirection, ZoomDirection};

/// Hermite ease used for both the cross-fade blend and Ken Burns motion.
pub fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Per-tick cross-fade progress. Counting whole ticks instead of
/// accumulating a float step guarantees the fade lands on exactly 1.0
/// after `ceil(fps * fade_time)` ticks.
#[derive(Debug, Clone, Copy)]
pub struct FadeState {
    ticks: u32,
    total: u32,
}

impl FadeState {
    /// Fades at or below half a second snap in a single tick.
    pub fn new(fps: f32, fade_time_s: f32) -> Self {
        let total = if fade_time_s <= 0.5 {
            1
        } else {
            (fps * fade_time_s).ceil().max(1.0) as u32
        };
        Self { ticks: total, total }
    }

    pub fn restart(&mut self) {
        self.ticks = 0;
    }

    pub fn tick(&mut self) {
        self.ticks = (self.ticks + 1).min(self.total);
    }

    pub fn done(&self) -> bool {
        self.ticks >= self.total
    }

    /// Eased weight of the incoming slide.
    pub fn blend(&self) -> f32 {
        smoothstep(self.ticks as f32 / self.total as f32)
    }
}

/// Where a slide sits at one instant of its Ken Burns motion: a zoom
/// factor on top of the cover-fit scale, and a pan offset in texture
/// units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KenburnsFrame {
    pub zoom: f32,
    pub offset: [f32; 2],
}

impl KenburnsFrame {
    pub const STILL: Self = Self {
        zoom: 1.0,
        offset: [0.0, 0.0],
    };
}

/// A planned motion from one frame to another over the display window.
/// Planned once per slide; the outgoing slide keeps sampling its own
/// path during the cross-fade so motion never jumps.
#[derive(Debug, Clone, Copy)]
pub struct KenburnsPath {
    start: KenburnsFrame,
    end: KenburnsFrame,
}

impl KenburnsPath {
    pub const STILL: Self = Self {
        start: KenburnsFrame::STILL,
        end: KenburnsFrame::STILL,
    };

    /// Lay out the motion for one slide. Landscape images zoom with a
    /// small pan wobble; portrait images on a wider display scroll
    /// vertically through their cropped-off region.
    pub fn plan<R: Rng + ?Sized>(
        options: &KenburnsOptions,
        image_aspect: f32,
        display_aspect: f32,
        rng: &mut R,
    ) -> Self {
        if !options.enabled {
            return Self::STILL;
        }
        if image_aspect < display_aspect {
            Self::plan_portrait(options, image_aspect, display_aspect, rng)
        } else {
            Self::plan_landscape(options, rng)
        }
    }

    fn plan_landscape<R: Rng + ?Sized>(options: &KenburnsOptions, rng: &mut R) -> Self {
        let peak = 1.0 + options.zoom_pct / 100.0;
        let (zoom_from, zoom_to) = match options.zoom_direction {
            ZoomDirection::In => (1.0, peak),
            ZoomDirection::Out => (peak, 1.0),
            ZoomDirection::Random => {
                if rng.random_bool(0.5) {
                    (1.0, peak)
                } else {
                    (peak, 1.0)
                }
            }
        };
        let wobble = options.landscape_wobble_pct / 100.0;
        let start = KenburnsFrame {
            zoom: zoom_from,
            offset: clamp_to_cover(random_offset(rng, wobble, options.random_pan), zoom_from),
        };
        let end = KenburnsFrame {
            zoom: zoom_to,
            offset: clamp_to_cover(random_offset(rng, wobble, options.random_pan), zoom_to),
        };
        Self { start, end }
    }

    fn plan_portrait<R: Rng + ?Sized>(
        options: &KenburnsOptions,
        image_aspect: f32,
        display_aspect: f32,
        rng: &mut R,
    ) -> Self {
        // Cover-fit crops the image vertically to this visible fraction;
        // the rest is the scroll range.
        let visible = (image_aspect / display_aspect).clamp(0.0, 1.0);
        let max_pan = (1.0 - visible) / 2.0;
        let border = if options.random_pan {
            rng.random_range(0.0..=options.portrait_border_pct) / 100.0
        } else {
            options.portrait_border_pct / 100.0
        };
        let reach = max_pan * (1.0 - border);
        let downward = match options.scroll_direction {
            ScrollDirection::Down => true,
            ScrollDirection::Up => false,
            ScrollDirection::Random => rng.random_bool(0.5),
        };
        // Texture v grows downward, so a downward scroll moves from the
        // top edge (negative offset) toward the bottom.
        let (y_from, y_to) = if downward {
            (-reach, reach)
        } else {
            (reach, -reach)
        };
        let wobble = options.portrait_wobble_pct / 100.0;
        let x_from = random_axis(rng, wobble, options.random_pan);
        let x_to = random_axis(rng, wobble, options.random_pan);
        Self {
            start: KenburnsFrame {
                zoom: 1.0,
                offset: [x_from, y_from],
            },
            end: KenburnsFrame {
                zoom: 1.0,
                offset: [x_to, y_to],
            },
        }
    }

    /// Sample the path at eased progress `t` in 0..=1.
    pub fn at(&self, t: f32) -> KenburnsFrame {
        let e = smoothstep(t);
        KenburnsFrame {
            zoom: lerp(self.start.zoom, self.end.zoom, e),
            offset: [
                lerp(self.start.offset[0], self.end.offset[0], e),
                lerp(self.start.offset[1], self.end.offset[1], e),
            ],
        }
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn random_axis<R: Rng + ?Sized>(rng: &mut R, extent: f32, random: bool) -> f32 {
    if !random || extent <= 0.0 {
        0.0
    } else {
        rng.random_range(-extent..=extent)
    }
}

fn random_offset<R: Rng + ?Sized>(rng: &mut R, extent: f32, random: bool) -> [f32; 2] {
    [
        random_axis(rng, extent, random),
        random_axis(rng, extent, random),
    ]
}

/// Keep a zoomed slide covering the display: at zoom z the sampled
/// window shrinks to 1/z, leaving (z-1)/(2z) of slack on each side.
fn clamp_to_cover(offset: [f32; 2], zoom: f32) -> [f32; 2] {
    let bound = ((zoom - 1.0) / (2.0 * zoom)).max(0.0);
    [
        offset[0].clamp(-bound, bound),
        offset[1].clamp(-bound, bound),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn opts() -> KenburnsOptions {
        KenburnsOptions {
            enabled: true,
            ..KenburnsOptions::default()
        }
    }

    #[test]
    fn smoothstep_is_monotone_with_fixed_ends() {
        assert_eq!(smoothstep(0.0), 0.0);
        assert_eq!(smoothstep(1.0), 1.0);
        assert!((smoothstep(0.5) - 0.5).abs() < 1e-6);
        let mut prev = 0.0;
        for i in 1..=100 {
            let v = smoothstep(i as f32 / 100.0);
            assert!(v >= prev);
            prev = v;
        }
    }

    #[test]
    fn fade_reaches_one_in_fps_times_seconds_ticks() {
        let mut fade = FadeState::new(20.0, 2.0);
        fade.restart();
        for _ in 0..39 {
            fade.tick();
            assert!(!fade.done());
        }
        fade.tick();
        assert!(fade.done());
        assert_eq!(fade.blend(), 1.0);
    }

    #[test]
    fn instant_fade_snaps_in_one_tick() {
        let mut fade = FadeState::new(20.0, 0.0);
        fade.restart();
        assert!(!fade.done());
        fade.tick();
        assert!(fade.done());
    }

    #[test]
    fn disabled_kenburns_is_still() {
        let mut rng = StdRng::seed_from_u64(1);
        let path = KenburnsPath::plan(&KenburnsOptions::default(), 1.5, 1.78, &mut rng);
        assert_eq!(path.at(0.0), KenburnsFrame::STILL);
        assert_eq!(path.at(0.7), KenburnsFrame::STILL);
    }

    #[test]
    fn landscape_zoom_in_runs_one_to_peak() {
        let mut rng = StdRng::seed_from_u64(2);
        let options = KenburnsOptions {
            zoom_direction: ZoomDirection::In,
            random_pan: false,
            ..opts()
        };
        let path = KenburnsPath::plan(&options, 1.78, 1.78, &mut rng);
        assert_eq!(path.at(0.0).zoom, 1.0);
        assert!((path.at(1.0).zoom - 1.1).abs() < 1e-6);
        assert_eq!(path.at(0.0).offset, [0.0, 0.0]);
    }

    #[test]
    fn landscape_pan_never_exposes_the_edge() {
        let mut rng = StdRng::seed_from_u64(3);
        let options = KenburnsOptions {
            zoom_pct: 10.0,
            landscape_wobble_pct: 50.0,
            ..opts()
        };
        for _ in 0..50 {
            let path = KenburnsPath::plan(&options, 1.78, 1.78, &mut rng);
            for step in 0..=10 {
                let frame = path.at(step as f32 / 10.0);
                let bound = (frame.zoom - 1.0) / (2.0 * frame.zoom) + 1e-4;
                assert!(frame.offset[0].abs() <= bound);
                assert!(frame.offset[1].abs() <= bound);
            }
        }
    }

    #[test]
    fn portrait_scrolls_vertically_within_the_crop() {
        let mut rng = StdRng::seed_from_u64(4);
        let options = KenburnsOptions {
            scroll_direction: ScrollDirection::Down,
            random_pan: false,
            portrait_border_pct: 0.0,
            portrait_wobble_pct: 0.0,
            ..opts()
        };
        // 3:4 portrait on a 16:9 display.
        let path = KenburnsPath::plan(&options, 0.75, 16.0 / 9.0, &mut rng);
        let max_pan = (1.0 - 0.75 / (16.0 / 9.0)) / 2.0;
        let start = path.at(0.0);
        let end = path.at(1.0);
        assert!((start.offset[1] + max_pan).abs() < 1e-5);
        assert!((end.offset[1] - max_pan).abs() < 1e-5);
        assert_eq!(start.zoom, 1.0);
        assert_eq!(start.offset[0], 0.0);
    }

    #[test]
    fn portrait_border_shortens_the_scroll() {
        let mut rng = StdRng::seed_from_u64(5);
        let options = KenburnsOptions {
            scroll_direction: ScrollDirection::Down,
            random_pan: false,
            portrait_border_pct: 50.0,
            portrait_wobble_pct: 0.0,
            ..opts()
        };
        let full = (1.0 - 0.75 / (16.0 / 9.0)) / 2.0;
        let path = KenburnsPath::plan(&options, 0.75, 16.0 / 9.0, &mut rng);
        assert!((path.at(1.0).offset[1] - full * 0.5).abs() < 1e-5);
    }
}
