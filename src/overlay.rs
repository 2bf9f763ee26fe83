use std::time::Duration;

use serde::Deserialize;

use crate::config::OverlayOptions;
use crate::media::Slot;

/// Metadata fields that can appear in the on-screen caption, in the
/// order listed in `overlay.show`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverlayField {
    Title,
    Caption,
    FileName,
    Date,
    Location,
    Folder,
}

/// Assemble the caption lines for a slot. Fields that resolve to nothing
/// are dropped rather than rendered blank; a placeholder slot gets a
/// fixed notice instead of metadata.
pub fn caption_for(slot: &Slot, options: &OverlayOptions) -> String {
    if slot.placeholder {
        return "no media found".to_string();
    }
    let item = &slot.primary;
    let mut lines = Vec::new();
    for field in &options.show {
        let text = match field {
            OverlayField::Title => item.title.clone(),
            OverlayField::Caption => item.caption.clone(),
            OverlayField::FileName => Some(item.file_name()),
            OverlayField::Date => item
                .taken_at
                .map(|dt| dt.format(&options.date_format).to_string()),
            OverlayField::Location => item
                .location
                .as_deref()
                .map(|loc| suppress(loc, &options.geo_suppress)),
            OverlayField::Folder => Some(item.folder_name()),
        };
        if let Some(text) = text {
            let text = text.trim();
            if !text.is_empty() {
                lines.push(text.to_string());
            }
        }
    }
    if let Some(second) = &slot.secondary {
        // Paired portraits share one strip; name both files.
        if options.show.contains(&OverlayField::FileName) {
            lines.push(second.file_name());
        }
    }
    lines.join("\n")
}

fn suppress(location: &str, patterns: &[String]) -> String {
    let mut out = location.to_string();
    for pattern in patterns {
        if !pattern.is_empty() {
            out = out.replace(pattern.as_str(), "");
        }
    }
    out.trim().trim_matches(',').trim().to_string()
}

/// Triangular visibility ramp over the overlay's display window: fade in
/// over the ramp, hold, fade back out. The ramp is a quarter of the
/// window but never shorter than four seconds (or half the window when
/// the window itself is short).
pub fn ramp_alpha(elapsed: Duration, total: Duration) -> f32 {
    let total_s = total.as_secs_f32();
    if total_s <= 0.0 {
        return 0.0;
    }
    let t = elapsed.as_secs_f32();
    if t < 0.0 || t > total_s {
        return 0.0;
    }
    let ramp = (total_s / 4.0).max(4.0).min(total_s / 2.0);
    (t.min(total_s - t) / ramp).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaItem;
    use std::path::PathBuf;

    fn options(fields: &[OverlayField]) -> OverlayOptions {
        OverlayOptions {
            show: fields.to_vec(),
            ..OverlayOptions::default()
        }
    }

    #[test]
    fn caption_keeps_field_order_and_drops_blanks() {
        let mut item = MediaItem::bare(PathBuf::from("/lib/hike/ridge.jpg"));
        item.title = Some("Ridge Walk".into());
        item.caption = Some("above the clouds".into());
        let slot = Slot::single(item);
        let text = caption_for(
            &slot,
            &options(&[
                OverlayField::Title,
                OverlayField::Caption,
                OverlayField::FileName,
                OverlayField::Folder,
            ]),
        );
        assert_eq!(text, "Ridge Walk\nabove the clouds\nridge.jpg\nhike");
    }

    #[test]
    fn location_suppression_strips_noise() {
        let mut item = MediaItem::bare(PathBuf::from("/lib/p.jpg"));
        item.location = Some("Alprechtweg, Innsbruck, Austria".into());
        let slot = Slot::single(item);
        let mut opts = options(&[OverlayField::Location]);
        opts.geo_suppress = vec![", Austria".into()];
        assert_eq!(caption_for(&slot, &opts), "Alprechtweg, Innsbruck");
    }

    #[test]
    fn placeholder_slot_announces_no_media() {
        let slot = Slot::no_media(PathBuf::new());
        assert_eq!(
            caption_for(&slot, &options(&[OverlayField::FileName])),
            "no media found"
        );
    }

    #[test]
    fn ramp_rises_holds_and_falls() {
        let total = Duration::from_secs(20);
        assert_eq!(ramp_alpha(Duration::ZERO, total), 0.0);
        let mid = ramp_alpha(Duration::from_secs(10), total);
        assert!((mid - 1.0).abs() < 1e-6);
        let rising = ramp_alpha(Duration::from_secs(2), total);
        let falling = ramp_alpha(Duration::from_secs(18), total);
        assert!((rising - falling).abs() < 1e-6);
        assert!(rising > 0.0 && rising < 1.0);
        assert_eq!(ramp_alpha(Duration::from_secs(25), total), 0.0);
    }

    #[test]
    fn short_window_still_peaks() {
        let total = Duration::from_secs(4);
        let mid = ramp_alpha(Duration::from_secs(2), total);
        assert!((mid - 1.0).abs() < 1e-6);
    }
}
