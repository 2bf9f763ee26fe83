//! Request-driven background slide loader. Receives prepare jobs,
//! decodes and composes off-thread, and returns RGBA8 frames without
//! blocking the render loop.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, unbounded};
use image::RgbaImage;
use tracing::{debug, warn};

use crate::config::{VideoOptions, ViewerOptions};
use crate::media::Slot;
use crate::processing::compose;
use crate::video;

enum LoaderMsg {
    Prepare(Slot),
    Quit,
}

/// A slide composed on CPU and ready for GPU upload, paired with the
/// slot it came from so the viewer knows what it is presenting. `image`
/// is `None` when the media could not be decoded; the player skips
/// ahead instead of showing it.
pub struct PreparedSlide {
    pub slot: Slot,
    pub image: Option<RgbaImage>,
}

/// Owns the loader thread plus both channel ends.
pub struct SlideLoader {
    tx: Sender<LoaderMsg>,
    rx: Receiver<PreparedSlide>,
    worker: Option<JoinHandle<()>>,
}

impl SlideLoader {
    pub fn spawn(
        display: (u32, u32),
        viewer: ViewerOptions,
        video_options: VideoOptions,
    ) -> std::io::Result<Self> {
        let (tx, job_rx) = unbounded::<LoaderMsg>();
        let (done_tx, rx) = unbounded::<PreparedSlide>();
        let worker = thread::Builder::new()
            .name("slide-loader".into())
            .spawn(move || {
                while let Ok(msg) = job_rx.recv() {
                    let slot = match msg {
                        LoaderMsg::Quit => break,
                        LoaderMsg::Prepare(slot) => slot,
                    };
                    let image = prepare(&slot, display, &viewer, &video_options);
                    if done_tx.send(PreparedSlide { slot, image }).is_err() {
                        break;
                    }
                }
            })?;
        Ok(Self {
            tx,
            rx,
            worker: Some(worker),
        })
    }

    pub fn request(&self, slot: Slot) {
        let _ = self.tx.send(LoaderMsg::Prepare(slot));
    }

    pub fn try_recv(&self) -> Option<PreparedSlide> {
        self.rx.try_recv().ok()
    }
}

impl Drop for SlideLoader {
    fn drop(&mut self) {
        let _ = self.tx.send(LoaderMsg::Quit);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Videos land as their first frame, the poster the cross-fade settles
/// on before the helper takes playback over.
fn prepare(
    slot: &Slot,
    display: (u32, u32),
    viewer: &ViewerOptions,
    video_options: &VideoOptions,
) -> Option<RgbaImage> {
    if slot.is_video() {
        if let Some(frame) = video::first_frame(
            &slot.primary.path,
            &video_options.ffmpeg_path,
            video_options.poster_timeout,
        ) {
            return Some(frame);
        }
        // Videos still play through the helper without a poster.
        debug!(path = %slot.primary.path.display(), "no poster frame, using blank");
        return Some(RgbaImage::from_pixel(
            display.0.max(1),
            display.1.max(1),
            image::Rgba([0, 0, 0, 255]),
        ));
    }
    match compose::prepare_slide(slot, display, viewer) {
        Ok(image) => Some(image),
        Err(err) => {
            warn!(path = %slot.primary.path.display(), %err, "slide failed to prepare");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaItem;
    use std::time::{Duration, Instant};

    fn recv_blocking(loader: &SlideLoader) -> PreparedSlide {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(prepared) = loader.try_recv() {
                return prepared;
            }
            assert!(Instant::now() < deadline, "loader never answered");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn good_slide_comes_back_composed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.png");
        RgbaImage::new(4, 2).save(&path).unwrap();
        let loader =
            SlideLoader::spawn((64, 32), ViewerOptions::default(), VideoOptions::default())
                .unwrap();
        loader.request(Slot::single(MediaItem::bare(path)));
        assert!(recv_blocking(&loader).image.is_some());
    }

    #[test]
    fn failed_decode_comes_back_without_an_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jpg");
        std::fs::write(&path, b"not an image").unwrap();
        let loader =
            SlideLoader::spawn((64, 32), ViewerOptions::default(), VideoOptions::default())
                .unwrap();
        loader.request(Slot::single(MediaItem::bare(path)));
        assert!(recv_blocking(&loader).image.is_none());
    }
}
