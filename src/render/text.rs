use std::path::Path;

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use anyhow::{Context, Result, anyhow};
use image::{Rgba, RgbaImage};

use crate::config::{OverlayOptions, TextJustify};

/// CPU glyph rasterizer for the caption strip. The strip is drawn once
/// per slide and uploaded as a texture; per-frame visibility is just an
/// alpha uniform.
pub struct TextRasterizer {
    font: FontArc,
}

impl TextRasterizer {
    /// Load the configured font file, or fall back to a system
    /// sans-serif face located through fontdb.
    pub fn load(font_file: Option<&Path>) -> Result<Self> {
        let font = match font_file {
            Some(path) => {
                let bytes = std::fs::read(path)
                    .with_context(|| format!("reading font {}", path.display()))?;
                FontArc::try_from_vec(bytes).context("parsing font file")?
            }
            None => system_sans_serif()?,
        };
        Ok(Self { font })
    }

    /// Render the caption onto a gradient-backed strip spanning the full
    /// display width. Returns `None` for an empty caption.
    pub fn render_strip(
        &self,
        text: &str,
        display: (u32, u32),
        options: &OverlayOptions,
    ) -> Option<RgbaImage> {
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        if lines.is_empty() || display.0 == 0 || display.1 == 0 {
            return None;
        }
        let scale = PxScale::from(options.text_size.max(1.0));
        let scaled = self.font.as_scaled(scale);
        let line_height = (scaled.ascent() - scaled.descent() + scaled.line_gap()).ceil();
        let margin = options.text_size * 0.5;

        let text_height = line_height * lines.len() as f32 + margin * 2.0;
        let min_height = (options.backdrop_height * display.1 as f32).ceil();
        let height = (text_height.max(min_height) as u32).min(display.1);
        let width = display.0;

        let mut strip = gradient_backdrop(width, height);
        let text_top = height as f32 - margin - line_height * lines.len() as f32;
        for (i, line) in lines.iter().enumerate() {
            let line_width = self.measure(line, scale);
            let x = match options.justify {
                TextJustify::Left => margin,
                TextJustify::Center => (width as f32 - line_width) / 2.0,
                TextJustify::Right => width as f32 - line_width - margin,
            }
            .max(0.0);
            let baseline = text_top + line_height * i as f32 + scaled.ascent();
            self.draw_line(&mut strip, line, scale, x, baseline);
        }
        Some(strip)
    }

    fn measure(&self, line: &str, scale: PxScale) -> f32 {
        let scaled = self.font.as_scaled(scale);
        let mut width = 0.0;
        let mut prev = None;
        for ch in line.chars() {
            let glyph = scaled.scaled_glyph(ch);
            if let Some(prev) = prev {
                width += scaled.kern(prev, glyph.id);
            }
            width += scaled.h_advance(glyph.id);
            prev = Some(glyph.id);
        }
        width
    }

    fn draw_line(&self, img: &mut RgbaImage, line: &str, scale: PxScale, x: f32, baseline: f32) {
        let scaled = self.font.as_scaled(scale);
        let mut pen_x = x;
        let mut prev = None;
        for ch in line.chars() {
            let mut glyph = scaled.scaled_glyph(ch);
            if let Some(prev) = prev {
                pen_x += scaled.kern(prev, glyph.id);
            }
            prev = Some(glyph.id);
            glyph.position = ab_glyph::point(pen_x, baseline);
            pen_x += scaled.h_advance(glyph.id);
            let Some(outlined) = self.font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let px = bounds.min.x as i64 + i64::from(gx);
                let py = bounds.min.y as i64 + i64::from(gy);
                if px < 0 || py < 0 || px >= i64::from(img.width()) || py >= i64::from(img.height())
                {
                    return;
                }
                let pixel = img.get_pixel_mut(px as u32, py as u32);
                let a = (coverage * 255.0) as u16;
                // White text over whatever the backdrop holds.
                for c in 0..3 {
                    let base = u16::from(pixel.0[c]);
                    pixel.0[c] = ((base * (255 - a) + 255 * a) / 255) as u8;
                }
                pixel.0[3] = pixel.0[3].max((coverage * 255.0) as u8);
            });
        }
    }
}

/// Transparent-to-dark vertical gradient so captions stay readable over
/// bright slides without boxing them in.
fn gradient_backdrop(width: u32, height: u32) -> RgbaImage {
    let mut img = RgbaImage::new(width, height);
    for y in 0..height {
        let t = y as f32 / height.max(1) as f32;
        let alpha = (t * 180.0) as u8;
        for x in 0..width {
            img.put_pixel(x, y, Rgba([0, 0, 0, alpha]));
        }
    }
    img
}

fn system_sans_serif() -> Result<FontArc> {
    use fontdb::{Database, Family, Query, Source};
    let mut db = Database::new();
    db.load_system_fonts();
    let id = db
        .query(&Query {
            families: &[Family::SansSerif],
            ..Query::default()
        })
        .ok_or_else(|| anyhow!("no sans-serif font installed"))?;
    let (source, index) = db
        .face_source(id)
        .ok_or_else(|| anyhow!("font source vanished"))?;
    let bytes = match source {
        Source::Binary(data) => data.as_ref().as_ref().to_vec(),
        Source::File(path) => std::fs::read(&path)
            .with_context(|| format!("reading font {}", path.display()))?,
        Source::SharedFile(path, _) => std::fs::read(&path)
            .with_context(|| format!("reading font {}", path.display()))?,
    };
    let font = ab_glyph::FontVec::try_from_vec_and_index(bytes, index)
        .context("parsing system font")?;
    Ok(FontArc::from(font))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backdrop_gradient_runs_transparent_to_dark() {
        let img = gradient_backdrop(4, 100);
        assert!(img.get_pixel(0, 0).0[3] < img.get_pixel(0, 99).0[3]);
        assert_eq!(img.get_pixel(0, 0).0[..3], [0, 0, 0]);
    }

    #[test]
    fn empty_caption_renders_nothing() {
        // Skip when the host has no fonts at all.
        let Ok(rasterizer) = TextRasterizer::load(None) else {
            return;
        };
        let opts = OverlayOptions::default();
        assert!(rasterizer.render_strip("", (640, 480), &opts).is_none());
        assert!(rasterizer.render_strip("  \n ", (640, 480), &opts).is_none());
    }

    #[test]
    fn strip_spans_display_width() {
        let Ok(rasterizer) = TextRasterizer::load(None) else {
            return;
        };
        let opts = OverlayOptions::default();
        let strip = rasterizer
            .render_strip("ridge.jpg\nhike", (640, 480), &opts)
            .unwrap();
        assert_eq!(strip.width(), 640);
        assert!(strip.height() > 0 && strip.height() <= 480);
        // Some glyph coverage landed.
        assert!(strip.pixels().any(|p| p.0[0] > 0));
    }
}
