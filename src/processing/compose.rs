use std::path::Path;

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use tracing::debug;

use crate::config::ViewerOptions;
use crate::error::{Error, Result};
use crate::media::Slot;

/// CPU-side slide preparation: decode, EXIF orientation, optional centre
/// crop, portrait pairing and letterbox matting. The output texture is
/// cover-fitted by the renderer, so anything that must not be cropped
/// (mats, pairs) is composed here at display aspect.
///
/// An unreadable primary is an error so the caller can skip the slide
/// rather than park on a blank frame. A failed pair partner only
/// degrades the slide to its primary alone, and the no-media
/// placeholder always produces a canvas.
pub fn prepare_slide(
    slot: &Slot,
    display: (u32, u32),
    viewer: &ViewerOptions,
) -> Result<RgbaImage> {
    let (dw, dh) = display;
    if slot.placeholder {
        return Ok(match try_decode(&slot.primary.path, 1) {
            Ok(img) => img,
            Err(_) => placeholder_canvas(dw, dh),
        });
    }
    let primary = apply_crop(
        try_decode(&slot.primary.path, slot.primary.orientation)?,
        viewer,
    );
    if let Some(second) = &slot.secondary {
        let secondary = match try_decode(&second.path, second.orientation) {
            Ok(img) => apply_crop(img, viewer),
            Err(err) => {
                debug!(%err, "pair partner decode failed");
                return Ok(mat_canvas(&primary, dw, dh, viewer));
            }
        };
        return Ok(compose_pair(&primary, &secondary, dw, dh, viewer));
    }
    // Ken Burns needs the cropped-off overflow to pan through, so the
    // image passes through unmatted when motion is on.
    if viewer.kenburns.enabled {
        return Ok(primary);
    }
    if needs_mat(&primary, dw, dh, viewer) {
        return Ok(mat_canvas(&primary, dw, dh, viewer));
    }
    Ok(primary)
}

/// Decode to RGBA8 and bake in the EXIF orientation the catalog read.
pub fn try_decode(path: &Path, orientation: u16) -> Result<RgbaImage> {
    let img = image::ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| decode_err(path, e.to_string()))?
        .decode()
        .map_err(|e| decode_err(path, e.to_string()))?;
    Ok(orient(img.to_rgba8(), orientation))
}

fn decode_err(path: &Path, reason: String) -> Error {
    Error::Decode {
        path: path.to_path_buf(),
        reason,
    }
}

pub fn orient(img: RgbaImage, orientation: u16) -> RgbaImage {
    match orientation {
        2 => imageops::flip_horizontal(&img),
        3 => imageops::rotate180(&img),
        4 => imageops::flip_vertical(&img),
        5 => imageops::flip_horizontal(&imageops::rotate90(&img)),
        6 => imageops::rotate90(&img),
        7 => imageops::flip_horizontal(&imageops::rotate270(&img)),
        8 => imageops::rotate270(&img),
        _ => img,
    }
}

/// Centre-crop to the configured aspect ratio, when one is set and the
/// image exceeds it in either direction.
fn apply_crop(img: RgbaImage, viewer: &ViewerOptions) -> RgbaImage {
    let Ok(Some(ratio)) = viewer.crop_ratio() else {
        return img;
    };
    crop_to_ratio(img, ratio)
}

pub fn crop_to_ratio(img: RgbaImage, ratio: f32) -> RgbaImage {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return img;
    }
    let current = w as f32 / h as f32;
    if (current - ratio).abs() < 1e-3 {
        return img;
    }
    let (cw, ch) = if current > ratio {
        (((h as f32) * ratio).round() as u32, h)
    } else {
        (w, ((w as f32) / ratio).round() as u32)
    };
    let cw = cw.clamp(1, w);
    let ch = ch.clamp(1, h);
    imageops::crop_imm(&img, (w - cw) / 2, (h - ch) / 2, cw, ch).to_image()
}

fn needs_mat(img: &RgbaImage, dw: u32, dh: u32, viewer: &ViewerOptions) -> bool {
    if !viewer.mat_images && !viewer.blur_edges {
        return false;
    }
    let img_ar = img.width() as f32 / img.height().max(1) as f32;
    let disp_ar = dw as f32 / dh.max(1) as f32;
    (img_ar - disp_ar).abs() > viewer.mat_tolerance
}

/// Letterbox the image onto a display-aspect canvas. The surround is the
/// mat color, or a blurred cover-fit copy of the slide when blur-edges
/// is on.
fn mat_canvas(img: &RgbaImage, dw: u32, dh: u32, viewer: &ViewerOptions) -> RgbaImage {
    let mut canvas = if viewer.blur_edges {
        blurred_backdrop(img, dw, dh, viewer)
    } else {
        solid_canvas(dw, dh, viewer.mat_color)
    };
    let (fw, fh) = contain_size(img.dimensions(), dw, dh);
    let fitted = imageops::resize(img, fw, fh, FilterType::Triangle);
    let x = i64::from((dw - fw) / 2);
    let y = i64::from((dh - fh) / 2);
    imageops::overlay(&mut canvas, &fitted, x, y);
    canvas
}

/// Two portraits side by side, each contain-fitted to half the display.
fn compose_pair(
    left: &RgbaImage,
    right: &RgbaImage,
    dw: u32,
    dh: u32,
    viewer: &ViewerOptions,
) -> RgbaImage {
    let mut canvas = solid_canvas(dw, dh, viewer.mat_color);
    let half = (dw / 2).max(1);
    for (img, slot_x) in [(left, 0u32), (right, half)] {
        let (fw, fh) = contain_size(img.dimensions(), half, dh);
        let fitted = imageops::resize(img, fw, fh, FilterType::Triangle);
        let x = i64::from(slot_x + (half - fw) / 2);
        let y = i64::from((dh - fh) / 2);
        imageops::overlay(&mut canvas, &fitted, x, y);
    }
    canvas
}

fn blurred_backdrop(img: &RgbaImage, dw: u32, dh: u32, viewer: &ViewerOptions) -> RgbaImage {
    // Cover-fit then crop so the blur fills the frame without bars.
    let (w, h) = img.dimensions();
    let scale = f32::max(dw as f32 / w.max(1) as f32, dh as f32 / h.max(1) as f32);
    let (cw, ch) = (
        ((w as f32 * scale).ceil() as u32).max(dw),
        ((h as f32 * scale).ceil() as u32).max(dh),
    );
    let covered = imageops::resize(img, cw, ch, FilterType::Triangle);
    let cropped = imageops::crop_imm(&covered, (cw - dw) / 2, (ch - dh) / 2, dw, dh).to_image();
    let mut blurred = imageops::fast_blur(&cropped, viewer.blur_amount.max(0.0));
    dim_toward(&mut blurred, viewer.mat_color, viewer.edge_alpha);
    blurred
}

/// Blend every pixel toward `color`; `keep` is how much of the blur
/// survives.
fn dim_toward(img: &mut RgbaImage, color: [u8; 3], keep: f32) {
    let keep = keep.clamp(0.0, 1.0);
    if (keep - 1.0).abs() < f32::EPSILON {
        return;
    }
    for px in img.pixels_mut() {
        for c in 0..3 {
            let blended = f32::from(px.0[c]) * keep + f32::from(color[c]) * (1.0 - keep);
            px.0[c] = blended.round() as u8;
        }
    }
}

fn contain_size((w, h): (u32, u32), dw: u32, dh: u32) -> (u32, u32) {
    if w == 0 || h == 0 {
        return (dw, dh);
    }
    let scale = f32::min(dw as f32 / w as f32, dh as f32 / h as f32);
    (
        ((w as f32 * scale).floor() as u32).clamp(1, dw),
        ((h as f32 * scale).floor() as u32).clamp(1, dh),
    )
}

fn solid_canvas(w: u32, h: u32, color: [u8; 3]) -> RgbaImage {
    RgbaImage::from_pixel(w, h, Rgba([color[0], color[1], color[2], 255]))
}

/// Shown when nothing decodes, including a missing no-media image.
fn placeholder_canvas(w: u32, h: u32) -> RgbaImage {
    solid_canvas(w.max(1), h.max(1), [24, 24, 24])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaItem;
    use base64::Engine;
    use std::path::PathBuf;

    // JPEG 2x1 with EXIF orientation 6 (rotate 90 CW), base64 encoded
    const ORIENT6_JPEG: &str = concat!(
        "/9j/4AAQSkZJRgABAQAAAQABAAD/4QAiRXhpZgAATU0AKgAAAAgAAQESAAMAAAABAAYAAAAAAAD/2wBDAAgGBgcGBQgHBwcJCQgKDBQNDAsLDBkSEw8UHRofHh0aHBwgJC4nICIsIxwcKDcpLDAxNDQ0Hyc5PTgyPC4zNDL/",
        "2wBDAQkJCQwLDBgNDRgyIRwhMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjL/wAARCAABAAIDASIAAhEBAxEB/8QAHwAAAQUBAQEBAQEAAAAAAAAAAAECAwQFBgcICQoL/8QAtRAAAgEDAwIEAwUFBAQAAAF9AQIDAAQRBRIhMUEGE1FhByJxFDKBkaEII0KxwRVS0fAkM2JyggkKFhcYGRolJicoKSo0NTY3ODk6Q0RFRkdISUpTVFVWV1hZWmNkZWZnaGlqc3R1dnd4eXqDhIWGh4iJipKTlJWWl5iZmqKjpKWmp6ipqrKztLW2t7i5usLDxMXGx8jJytLT1NXW19jZ2uHi4+Tl5ufo6erx8vP09fb3+Pn6/8QAHwEAAwEBAQEBAQEBAQAAAAAAAAECAwQFBgcICQoL/8QAtREAAgECBAQDBAcFBAQAAQJ3AAECAxEEBSExBhJBUQdhcRMiMoEIFEKRobHBCSMzUvAVYnLRChYkNOEl8RcYGRomJygpKjU2Nzg5OkNERUZHSElKU1RVVldYWVpjZGVmZ2hpanN0dXZ3eHl6goOEhYaHiImKkpOUlZaXmJmaoqOkpaanqKmqsrO0tba3uLm6wsPExcbHyMnK0tPU1dbX2Nna4uPk5ebn6Onq8vP09fb3+Pn6/9oADAMBAAIRAxEAPwDi6KKK+ZP3E//Z"
    );

    fn write_fixture(dir: &tempfile::TempDir) -> PathBuf {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(ORIENT6_JPEG)
            .unwrap();
        let path = dir.path().join("orient6.jpg");
        std::fs::write(&path, &bytes).unwrap();
        path
    }

    #[test]
    fn bakes_in_orientation_six() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(&dir);
        let img = try_decode(&path, 6).unwrap();
        assert_eq!(img.dimensions(), (1, 2));
    }

    #[test]
    fn crop_to_ratio_trims_the_wider_axis() {
        let img = RgbaImage::new(200, 100);
        let cropped = crop_to_ratio(img, 1.0);
        assert_eq!(cropped.dimensions(), (100, 100));
        let img = RgbaImage::new(100, 200);
        let cropped = crop_to_ratio(img, 1.0);
        assert_eq!(cropped.dimensions(), (100, 100));
    }

    #[test]
    fn mat_canvas_letterboxes_onto_display_aspect() {
        let viewer = ViewerOptions {
            mat_color: [10, 20, 30],
            ..ViewerOptions::default()
        };
        let img = RgbaImage::from_pixel(100, 100, Rgba([255, 255, 255, 255]));
        let canvas = mat_canvas(&img, 400, 200, &viewer);
        assert_eq!(canvas.dimensions(), (400, 200));
        // Corners are mat; the centre is image.
        assert_eq!(canvas.get_pixel(0, 0).0, [10, 20, 30, 255]);
        assert_eq!(canvas.get_pixel(200, 100).0, [255, 255, 255, 255]);
    }

    #[test]
    fn pair_fills_both_halves() {
        let viewer = ViewerOptions::default();
        let left = RgbaImage::from_pixel(50, 100, Rgba([255, 0, 0, 255]));
        let right = RgbaImage::from_pixel(50, 100, Rgba([0, 255, 0, 255]));
        let canvas = compose_pair(&left, &right, 400, 200, &viewer);
        assert_eq!(canvas.dimensions(), (400, 200));
        assert_eq!(canvas.get_pixel(100, 100).0, [255, 0, 0, 255]);
        assert_eq!(canvas.get_pixel(300, 100).0, [0, 255, 0, 255]);
    }

    #[test]
    fn placeholder_slot_with_missing_image_synthesizes_a_canvas() {
        let slot = Slot::no_media(PathBuf::from("/definitely/not/there.jpg"));
        let img = prepare_slide(&slot, (64, 32), &ViewerOptions::default()).unwrap();
        assert_eq!(img.dimensions(), (64, 32));
    }

    #[test]
    fn unreadable_slide_is_an_error_not_a_canvas() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not an image").unwrap();
        let slot = Slot::single(MediaItem::bare(path));
        assert!(prepare_slide(&slot, (64, 32), &ViewerOptions::default()).is_err());
    }

    #[test]
    fn prepare_respects_mat_tolerance() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(&dir);
        let mut item = MediaItem::bare(path);
        item.orientation = 1;
        let slot = Slot::single(item);
        // Huge tolerance means no matting; output keeps source dims.
        let viewer = ViewerOptions {
            mat_tolerance: 100.0,
            ..ViewerOptions::default()
        };
        let img = prepare_slide(&slot, (640, 480), &viewer).unwrap();
        assert_eq!(img.dimensions(), (2, 1));
    }
}
