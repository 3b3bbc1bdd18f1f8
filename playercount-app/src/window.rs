//! Globe window: winit event loop driving the wgpu visualizer.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use playercount_globe::{GlobeStyle, GlobeTextures, PositionVisualizer};
use playercount_sdk::AngularPosition;
use tokio::sync::mpsc;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::window::{Window, WindowId};

const INITIAL_SIZE: u32 = 480;

struct Gpu {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    visualizer: PositionVisualizer,
}

pub struct GlobeWindow {
    window: Option<Arc<Window>>,
    gpu: Option<Gpu>,
    positions: mpsc::UnboundedReceiver<Vec<AngularPosition>>,
    textures: GlobeTextures,
    style: GlobeStyle,
    started: Instant,
    error: Option<anyhow::Error>,
}

/// Open the globe window and block until it is closed.
///
/// Must run on the main thread. Position sets sent on `positions` are
/// applied once per frame; only the newest set since the last frame is used.
pub fn run(
    positions: mpsc::UnboundedReceiver<Vec<AngularPosition>>,
    textures: GlobeTextures,
    style: GlobeStyle,
) -> Result<()> {
    let event_loop = EventLoop::new().context("creating event loop")?;
    let mut app = GlobeWindow {
        window: None,
        gpu: None,
        positions,
        textures,
        style,
        started: Instant::now(),
        error: None,
    };
    event_loop.run_app(&mut app).context("running event loop")?;
    match app.error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

impl ApplicationHandler for GlobeWindow {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let attributes = Window::default_attributes()
            .with_title("playercount")
            .with_inner_size(PhysicalSize::new(INITIAL_SIZE, INITIAL_SIZE));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => return self.fail(event_loop, anyhow!(e).context("creating window")),
        };
        match pollster::block_on(Gpu::new(window.clone(), &self.textures, self.style)) {
            Ok(gpu) => {
                tracing::info!(format = ?gpu.config.format, "globe window ready");
                self.gpu = Some(gpu);
                self.window = Some(window);
            }
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(window) = &self.window else {
            return;
        };
        if window.id() != window_id {
            return;
        }
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(gpu) = &mut self.gpu {
                    gpu.resize(size);
                }
                // Re-fit is immediately visible, not deferred to the next tick.
                self.redraw(event_loop);
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

impl GlobeWindow {
    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        tracing::error!(error = %error, "globe window failed");
        self.error = Some(error);
        event_loop.exit();
    }

    fn latest_positions(&mut self) -> Option<Vec<AngularPosition>> {
        let mut latest = None;
        while let Ok(positions) = self.positions.try_recv() {
            latest = Some(positions);
        }
        latest
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let latest = self.latest_positions();
        let Some(gpu) = &mut self.gpu else {
            return;
        };
        if let Some(positions) = latest {
            gpu.visualizer.update_positions(&positions);
        }

        let frame = match gpu.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu.surface.configure(gpu.visualizer.device(), &gpu.config);
                return;
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return self.fail(event_loop, anyhow!("surface out of memory"));
            }
            Err(e) => {
                tracing::warn!(error = %e, "skipping frame");
                return;
            }
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        gpu.visualizer.render(&view, self.started.elapsed());
        frame.present();
    }
}

impl Gpu {
    async fn new(window: Arc<Window>, textures: &GlobeTextures, style: GlobeStyle) -> Result<Self> {
        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window.clone())
            .context("creating surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no compatible graphics adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("playercount_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: Default::default(),
                trace: Default::default(),
            })
            .await
            .context("requesting device")?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| anyhow!("surface reports no formats"))?;
        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: Vec::new(),
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let mut visualizer = PositionVisualizer::new(device, queue, format, textures, style)?;
        visualizer.resize(config.width, config.height);

        Ok(Self {
            surface,
            config,
            visualizer,
        })
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        self.config.width = size.width;
        self.config.height = size.height;
        self.surface.configure(self.visualizer.device(), &self.config);
        let resolution = self.visualizer.resize(size.width, size.height);
        tracing::debug!(width = size.width, height = size.height, resolution, "globe resized");
    }
}
