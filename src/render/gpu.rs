use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbaImage;
use tracing::{error, info, warn};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Fullscreen, Window, WindowId};

use crate::catalog::FsCatalog;
use crate::config::Configuration;
use crate::controller::Controller;
use crate::error::{Error, Result};
use crate::input::{InputListener, PlayerCommand};
use crate::platform::display_power::DisplayPower;
use crate::playlist::Playlist;
use crate::render::loader::SlideLoader;
use crate::render::surface::{DrawSurface, Plane, PlaneTransform, TextureHandle};
use crate::viewer::Viewer;
use crate::watch::LibraryWatcher;

/// Uniform block shared with slide.wgsl; layout must match.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Uniforms {
    back_scale: [f32; 2],
    back_offset: [f32; 2],
    front_scale: [f32; 2],
    front_offset: [f32; 2],
    /// blend, brightness, overlay alpha, back-plane presence.
    params: [f32; 4],
    overlay_rect: [f32; 4],
}

struct LoadedTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: (u32, u32),
}

/// The wgpu window backend. Everything the viewer does to the screen
/// goes through the `DrawSurface` impl; `render` turns the accumulated
/// state into one frame.
pub struct Gpu {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_config: wgpu::SurfaceConfiguration,
    pipeline: wgpu::RenderPipeline,
    bind_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    uniform_buf: wgpu::Buffer,
    bind_group: Option<wgpu::BindGroup>,
    /// 1x1 black stand-in bound wherever no real texture is assigned.
    blank: LoadedTexture,
    textures: HashMap<u64, LoadedTexture>,
    next_texture_id: u64,
    planes: (Option<TextureHandle>, Option<TextureHandle>),
    transforms: [PlaneTransform; 2],
    blend: f32,
    brightness: f32,
    overlay: Option<LoadedTexture>,
    overlay_alpha: f32,
    video_active: bool,
}

impl Gpu {
    fn new(window: Arc<Window>) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| Error::DisplayInit(format!("surface: {e}")))?;
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .map_err(|e| Error::DisplayInit(format!("no adapter: {e}")))?;
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("frameshow-device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| Error::DisplayInit(format!("no device: {e}")))?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(wgpu::TextureFormat::is_srgb)
            .unwrap_or(caps.formats[0]);
        let size = window.inner_size();
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("slide-shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/slide.wgsl").into()),
        });

        let bind_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("slide-bindings"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                texture_layout_entry(2),
                texture_layout_entry(3),
                texture_layout_entry(4),
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("slide-pipeline-layout"),
            bind_group_layouts: &[&bind_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("slide-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("slide-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let uniform_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("slide-uniforms"),
            size: std::mem::size_of::<Uniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let blank = upload_texture(&device, &queue, &RgbaImage::new(1, 1));
        info!(width = surface_config.width, height = surface_config.height, "display up");
        Ok(Self {
            window,
            surface,
            device,
            queue,
            surface_config,
            pipeline,
            bind_layout,
            sampler,
            uniform_buf,
            bind_group: None,
            blank,
            textures: HashMap::new(),
            next_texture_id: 1,
            planes: (None, None),
            transforms: [PlaneTransform::default(); 2],
            blend: 0.0,
            brightness: 1.0,
            overlay: None,
            overlay_alpha: 0.0,
            video_active: false,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.device, &self.surface_config);
    }

    fn plane_view(&self, handle: Option<TextureHandle>) -> &LoadedTexture {
        handle
            .and_then(|h| self.textures.get(&h.0))
            .unwrap_or(&self.blank)
    }

    /// Cover-fit scale for a texture on the current display, folded with
    /// the viewer's motion transform.
    fn plane_uniform(&self, handle: Option<TextureHandle>, idx: usize) -> ([f32; 2], [f32; 2]) {
        let tex = self.plane_view(handle);
        let (tw, th) = tex.size;
        let tex_aspect = tw.max(1) as f32 / th.max(1) as f32;
        let disp_aspect =
            self.surface_config.width.max(1) as f32 / self.surface_config.height.max(1) as f32;
        let cover = if tex_aspect > disp_aspect {
            [disp_aspect / tex_aspect, 1.0]
        } else {
            [1.0, tex_aspect / disp_aspect]
        };
        let t = self.transforms[idx];
        (
            [cover[0] * t.scale[0], cover[1] * t.scale[1]],
            t.offset,
        )
    }

    fn rebuild_bind_group(&mut self) {
        let back = self.plane_view(self.planes.0);
        let front = self.plane_view(self.planes.1);
        let overlay = self.overlay.as_ref().unwrap_or(&self.blank);
        self.bind_group = Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("slide-bind-group"),
            layout: &self.bind_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&back.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&front.view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(&overlay.view),
                },
            ],
        }));
    }

    fn overlay_rect(&self) -> [f32; 4] {
        match &self.overlay {
            Some(strip) => {
                let h = strip.size.1 as f32 / self.surface_config.height.max(1) as f32;
                [0.0, 1.0 - h.min(1.0), 1.0, 1.0]
            }
            None => [0.0; 4],
        }
    }

    fn render(&mut self) -> std::result::Result<(), wgpu::SurfaceError> {
        // Once the fade onto a video poster lands, the helper process
        // owns the screen; keep the last frame instead of racing it.
        if self.video_active && self.blend >= 1.0 {
            return Ok(());
        }
        let (back_scale, back_offset) = self.plane_uniform(self.planes.0, 0);
        let (front_scale, front_offset) = self.plane_uniform(self.planes.1, 1);
        let uniforms = Uniforms {
            back_scale,
            back_offset,
            front_scale,
            front_offset,
            params: [
                self.blend,
                self.brightness,
                self.overlay_alpha,
                if self.planes.0.is_some() { 1.0 } else { 0.0 },
            ],
            overlay_rect: self.overlay_rect(),
        };
        self.queue
            .write_buffer(&self.uniform_buf, 0, bytemuck::bytes_of(&uniforms));
        if self.bind_group.is_none() {
            self.rebuild_bind_group();
        }
        let Some(bind_group) = self.bind_group.as_ref() else {
            return Ok(());
        };

        let frame = self.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("slide-encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("slide-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}

fn texture_layout_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn upload_texture(device: &wgpu::Device, queue: &wgpu::Queue, image: &RgbaImage) -> LoadedTexture {
    let (width, height) = image.dimensions();
    let size = wgpu::Extent3d {
        width: width.max(1),
        height: height.max(1),
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("slide-texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    if width > 0 && height > 0 {
        queue.write_texture(
            texture.as_image_copy(),
            image.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );
    }
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    LoadedTexture {
        _texture: texture,
        view,
        size: (size.width, size.height),
    }
}

impl DrawSurface for Gpu {
    fn dimensions(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    fn create_texture(&mut self, image: &RgbaImage) -> TextureHandle {
        let id = self.next_texture_id;
        self.next_texture_id += 1;
        let loaded = upload_texture(&self.device, &self.queue, image);
        self.textures.insert(id, loaded);
        TextureHandle(id)
    }

    fn drop_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture.0);
        self.bind_group = None;
    }

    fn set_planes(&mut self, back: Option<TextureHandle>, front: Option<TextureHandle>) {
        self.planes = (back, front);
        self.bind_group = None;
    }

    fn set_blend(&mut self, weight: f32) {
        self.blend = weight.clamp(0.0, 1.0);
    }

    fn set_plane_transform(&mut self, plane: Plane, transform: PlaneTransform) {
        let idx = match plane {
            Plane::Back => 0,
            Plane::Front => 1,
        };
        self.transforms[idx] = transform;
    }

    fn set_brightness(&mut self, value: f32) {
        self.brightness = value.clamp(0.0, 1.0);
    }

    fn set_overlay(&mut self, image: Option<&RgbaImage>) {
        self.overlay = image.map(|img| upload_texture(&self.device, &self.queue, img));
        self.bind_group = None;
    }

    fn set_overlay_alpha(&mut self, alpha: f32) {
        self.overlay_alpha = alpha.clamp(0.0, 1.0);
    }

    fn set_video_active(&mut self, active: bool) {
        self.video_active = active;
    }
}

/// The winit application: owns the whole pipeline and drives it at the
/// configured frame rate.
pub struct App {
    config: Configuration,
    controller: Controller,
    viewer: Viewer,
    input: Option<InputListener>,
    watcher: Option<LibraryWatcher>,
    display_power: DisplayPower,
    gpu: Option<Gpu>,
    loader: Option<SlideLoader>,
    frame_interval: Duration,
    video_active: bool,
    exit_error: Option<Error>,
}

impl App {
    pub fn new(config: Configuration) -> Result<Self> {
        let catalog = FsCatalog::new(&config.library_path, config.playlist.portrait_pairs)?;
        let playlist = Playlist::new(
            Box::new(catalog),
            &config.playlist,
            &config.library_path,
            config.no_media_image.clone(),
        )?;
        let controller = Controller::new(playlist, &config.playlist);
        let viewer = Viewer::new(&config);
        let watcher = match LibraryWatcher::new(&config.library_path) {
            Ok(w) => Some(w),
            Err(err) => {
                warn!(%err, "library watching unavailable");
                None
            }
        };
        let input = match InputListener::spawn_stdin() {
            Ok(l) => Some(l),
            Err(err) => {
                warn!(%err, "stdin control unavailable");
                None
            }
        };
        let display_power = DisplayPower::new(&config.display_power);
        let frame_interval = Duration::from_secs_f32(1.0 / config.viewer.fps);
        Ok(Self {
            config,
            controller,
            viewer,
            input,
            watcher,
            display_power,
            gpu: None,
            loader: None,
            frame_interval,
            video_active: false,
            exit_error: None,
        })
    }

    /// Run the event loop to completion.
    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()
            .map_err(|e| Error::DisplayInit(format!("event loop: {e}")))?;
        event_loop
            .run_app(&mut self)
            .map_err(|e| Error::DisplayInit(format!("event loop: {e}")))?;
        self.viewer.shutdown();
        match self.exit_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn handle_command(&mut self, command: PlayerCommand, event_loop: &ActiveEventLoop) {
        match command {
            PlayerCommand::Quit => {
                info!("quit requested");
                event_loop.exit();
            }
            PlayerCommand::Brightness(v) => self.viewer.set_brightness(v),
            PlayerCommand::DisplayOn | PlayerCommand::DisplayOff => {
                let on = command == PlayerCommand::DisplayOn;
                if let Err(err) = self.display_power.set_on(on) {
                    warn!(%err, "display power change failed");
                }
            }
            other => {
                let was_paused = self.controller.paused();
                self.controller.apply(other);
                if self.controller.paused() != was_paused {
                    self.viewer
                        .set_paused(self.controller.paused(), Instant::now());
                }
            }
        }
    }

    fn key_command(&self, event: &KeyEvent) -> Option<PlayerCommand> {
        if event.state != ElementState::Pressed {
            return None;
        }
        match &event.logical_key {
            Key::Named(NamedKey::ArrowRight) => Some(PlayerCommand::Next),
            Key::Named(NamedKey::ArrowLeft) => Some(PlayerCommand::Back),
            Key::Named(NamedKey::Space) => Some(PlayerCommand::TogglePause),
            Key::Named(NamedKey::Escape) => Some(PlayerCommand::Quit),
            Key::Named(NamedKey::ArrowUp) => {
                Some(PlayerCommand::Brightness(self.viewer.brightness() + 0.1))
            }
            Key::Named(NamedKey::ArrowDown) => {
                Some(PlayerCommand::Brightness(self.viewer.brightness() - 0.1))
            }
            Key::Character(c) if c == "q" => Some(PlayerCommand::Quit),
            _ => None,
        }
    }

    fn advance(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        while let Some(command) = self.input.as_ref().and_then(InputListener::try_recv) {
            self.handle_command(command, event_loop);
        }
        if self.watcher.as_ref().is_some_and(LibraryWatcher::take_dirty) {
            info!("library changed, reload scheduled");
            self.controller.mark_reload();
        }
        let (Some(gpu), Some(loader)) = (self.gpu.as_mut(), self.loader.as_ref()) else {
            return;
        };
        if let Some(slot) = self.controller.next_request(now, self.video_active) {
            loader.request(slot);
        }
        while let Some(prepared) = loader.try_recv() {
            let Some(image) = prepared.image else {
                // Unreadable media; move on instead of parking on it.
                self.controller.skip(now);
                continue;
            };
            if let Some(departed) = self.viewer.show(prepared.slot, image, gpu, now) {
                self.controller.retire(departed);
            }
        }
        let status = self.viewer.tick(gpu, now);
        self.controller.absorb(status, now);
        self.video_active = status.video_active;
        gpu.window.request_redraw();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gpu.is_some() {
            return;
        }
        let attrs = Window::default_attributes()
            .with_title("frameshow")
            .with_fullscreen(Some(Fullscreen::Borderless(None)));
        let window = match event_loop.create_window(attrs) {
            Ok(w) => Arc::new(w),
            Err(err) => {
                self.exit_error = Some(Error::DisplayInit(format!("window: {err}")));
                event_loop.exit();
                return;
            }
        };
        window.set_cursor_visible(false);
        match Gpu::new(window) {
            Ok(gpu) => {
                let dims = gpu.dimensions();
                match SlideLoader::spawn(
                    dims,
                    self.config.viewer.clone(),
                    self.config.video.clone(),
                ) {
                    Ok(loader) => self.loader = Some(loader),
                    Err(err) => {
                        self.exit_error = Some(Error::Io(err));
                        event_loop.exit();
                        return;
                    }
                }
                self.gpu = Some(gpu);
            }
            Err(err) => {
                self.exit_error = Some(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(gpu) = self.gpu.as_mut() {
                    gpu.resize(size.width, size.height);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let Some(command) = self.key_command(&event) {
                    self.handle_command(command, event_loop);
                }
            }
            WindowEvent::RedrawRequested => {
                let Some(gpu) = self.gpu.as_mut() else { return };
                match gpu.render() {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let (w, h) = gpu.dimensions();
                        gpu.resize(w, h);
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        error!("surface out of memory");
                        self.exit_error =
                            Some(Error::DisplayInit("surface out of memory".into()));
                        event_loop.exit();
                    }
                    Err(err) => warn!(%err, "frame skipped"),
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        self.advance(event_loop);
        event_loop.set_control_flow(ControlFlow::WaitUntil(Instant::now() + self.frame_interval));
    }
}
