use image::RgbaImage;

/// The two slide planes blended during a cross-fade. `Back` is the
/// outgoing slide, `Front` the incoming one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plane {
    Front,
    Back,
}

/// Per-plane texture placement: a scale and pan applied around the
/// texture centre, on top of cover-fitting. Identity shows the
/// cover-fitted slide unmoved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneTransform {
    pub scale: [f32; 2],
    pub offset: [f32; 2],
}

impl Default for PlaneTransform {
    fn default() -> Self {
        Self {
            scale: [1.0, 1.0],
            offset: [0.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureHandle(pub u64);

/// Everything the viewer needs from a display backend. The wgpu window
/// implements this; tests drive the viewer against a recording fake.
pub trait DrawSurface {
    fn dimensions(&self) -> (u32, u32);

    fn create_texture(&mut self, image: &RgbaImage) -> TextureHandle;
    fn drop_texture(&mut self, texture: TextureHandle);

    /// Assign which textures the two planes sample.
    fn set_planes(&mut self, back: Option<TextureHandle>, front: Option<TextureHandle>);
    /// Cross-fade weight of the front plane, 0..=1.
    fn set_blend(&mut self, weight: f32);
    fn set_plane_transform(&mut self, plane: Plane, transform: PlaneTransform);
    fn set_brightness(&mut self, value: f32);

    fn set_overlay(&mut self, image: Option<&RgbaImage>);
    fn set_overlay_alpha(&mut self, alpha: f32);

    /// True while a video helper owns the screen region; the backend may
    /// keep presenting the poster beneath it.
    fn set_video_active(&mut self, active: bool);
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::HashMap;

    /// Headless surface that records what the viewer asked for.
    pub struct RecordingSurface {
        pub size: (u32, u32),
        next_id: u64,
        pub live_textures: HashMap<u64, (u32, u32)>,
        pub planes: (Option<TextureHandle>, Option<TextureHandle>),
        pub blend: f32,
        pub transforms: [PlaneTransform; 2],
        pub brightness: f32,
        pub overlay_set: bool,
        pub overlay_alpha: f32,
        pub video_active: bool,
    }

    impl RecordingSurface {
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                size: (width, height),
                next_id: 1,
                live_textures: HashMap::new(),
                planes: (None, None),
                blend: 1.0,
                transforms: [PlaneTransform::default(); 2],
                brightness: 1.0,
                overlay_set: false,
                overlay_alpha: 0.0,
                video_active: false,
            }
        }
    }

    impl DrawSurface for RecordingSurface {
        fn dimensions(&self) -> (u32, u32) {
            self.size
        }

        fn create_texture(&mut self, image: &RgbaImage) -> TextureHandle {
            let id = self.next_id;
            self.next_id += 1;
            self.live_textures.insert(id, image.dimensions());
            TextureHandle(id)
        }

        fn drop_texture(&mut self, texture: TextureHandle) {
            self.live_textures.remove(&texture.0);
        }

        fn set_planes(&mut self, back: Option<TextureHandle>, front: Option<TextureHandle>) {
            self.planes = (back, front);
        }

        fn set_blend(&mut self, weight: f32) {
            self.blend = weight;
        }

        fn set_plane_transform(&mut self, plane: Plane, transform: PlaneTransform) {
            let idx = match plane {
                Plane::Back => 0,
                Plane::Front => 1,
            };
            self.transforms[idx] = transform;
        }

        fn set_brightness(&mut self, value: f32) {
            self.brightness = value;
        }

        fn set_overlay(&mut self, image: Option<&RgbaImage>) {
            self.overlay_set = image.is_some();
        }

        fn set_overlay_alpha(&mut self, alpha: f32) {
            self.overlay_alpha = alpha;
        }

        fn set_video_active(&mut self, active: bool) {
            self.video_active = active;
        }
    }
}
