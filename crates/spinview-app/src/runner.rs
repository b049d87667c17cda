//! Application runner and event loop.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use spinview_core::{Extent, Mesh};
use spinview_render::{FrameScheduler, FrameStats, RenderError, RendererConfig, TriangleRenderer};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

/// What to do when a frame iteration fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log the error and abort the process.
    #[default]
    Abort,
    /// Release GPU resources, leave the event loop and return the error from [`run`].
    Exit,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Window title.
    pub title: String,
    /// Initial window width.
    pub width: u32,
    /// Initial window height.
    pub height: u32,
    /// Allow the user to resize the window.
    pub resizable: bool,
    /// Enable vsync.
    pub vsync: bool,
    /// Enable Vulkan validation layers (default: debug builds only).
    pub validation: bool,
    /// Compiled vertex shader.
    pub vertex_shader: PathBuf,
    /// Compiled fragment shader.
    pub fragment_shader: PathBuf,
    pub failure_policy: FailurePolicy,
    /// Close after this many presented frames (None runs until the window closes).
    pub max_frames: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let renderer = RendererConfig::default();
        Self {
            title: "Spinview".to_string(),
            width: 800,
            height: 600,
            resizable: true,
            vsync: renderer.vsync,
            validation: renderer.validation,
            vertex_shader: renderer.vertex_shader,
            fragment_shader: renderer.fragment_shader,
            failure_policy: FailurePolicy::default(),
            max_frames: None,
        }
    }
}

impl AppConfig {
    /// Create a new config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the window dimensions.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_resizable(mut self, resizable: bool) -> Self {
        self.resizable = resizable;
        self
    }

    /// Enable or disable vsync.
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    /// Enable or disable validation layers.
    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    /// Set the compiled SPIR-V files for both stages.
    pub fn with_shaders(mut self, vertex: impl Into<PathBuf>, fragment: impl Into<PathBuf>) -> Self {
        self.vertex_shader = vertex.into();
        self.fragment_shader = fragment.into();
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Stop after `frames` presented frames.
    pub fn with_max_frames(mut self, frames: u64) -> Self {
        self.max_frames = Some(frames);
        self
    }

    /// Renderer settings derived from this config.
    pub fn renderer_config(&self) -> RendererConfig {
        RendererConfig {
            app_name: self.title.clone(),
            validation: self.validation,
            vsync: self.vsync,
            vertex_shader: self.vertex_shader.clone(),
            fragment_shader: self.fragment_shader.clone(),
            ..Default::default()
        }
    }
}

/// Open a window and spin `mesh` until the window closes.
///
/// Setup failures (window, device, swapchain, shaders, uploads) are returned.
/// Failures during a frame follow [`AppConfig::failure_policy`].
pub fn run(config: AppConfig, mesh: Mesh) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("{} starting...", config.title);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut runner = AppRunner {
        config,
        mesh,
        state: None,
        failure: None,
    };

    event_loop.run_app(&mut runner)?;

    match runner.failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Internal runner that implements winit's ApplicationHandler.
struct AppRunner {
    config: AppConfig,
    mesh: Mesh,
    state: Option<AppState>,
    failure: Option<anyhow::Error>,
}

/// Everything that lives while the window is open.
struct AppState {
    // Dropped before the window it presents to
    scheduler: FrameScheduler<TriangleRenderer>,
    window: Arc<Window>,
    minimized: bool,
    started: Instant,
}

impl ApplicationHandler for AppRunner {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        info!("Creating application state...");

        match self.create_state(event_loop) {
            Ok(state) => {
                self.state = Some(state);
                info!("Application ready!");
            }
            Err(e) => {
                error!("Failed to initialize application: {e:#}");
                self.failure = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                self.shutdown(event_loop);
            }
            WindowEvent::Resized(size) => {
                if let Some(state) = &mut self.state {
                    state.handle_resize(event_loop, size);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            if !state.minimized {
                state.window.request_redraw();
            }
        }
    }
}

impl AppRunner {
    fn create_state(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<AppState> {
        let window_attrs = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height))
            .with_resizable(self.config.resizable);

        let window = Arc::new(event_loop.create_window(window_attrs)?);
        let size = window.inner_size();

        // SAFETY: the renderer is owned by `AppState`, which also holds the
        // window and drops the scheduler first.
        let renderer = unsafe {
            TriangleRenderer::new(
                window.as_ref(),
                Extent::new(size.width, size.height),
                &self.mesh,
                &self.config.renderer_config(),
            )?
        };

        Ok(AppState {
            scheduler: FrameScheduler::new(renderer),
            window,
            minimized: size.width == 0 || size.height == 0,
            started: Instant::now(),
        })
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(state) = &mut self.state else {
            return;
        };
        if state.minimized {
            return;
        }

        if let Err(e) = state.scheduler.run_frame() {
            self.fail(event_loop, e);
            return;
        }

        let presented = state.scheduler.stats().presentations;
        if self.config.max_frames.is_some_and(|max| presented >= max) {
            info!("Reached {presented} frames");
            self.shutdown(event_loop);
            return;
        }

        state.window.request_redraw();
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, e: RenderError) {
        match self.config.failure_policy {
            FailurePolicy::Abort => {
                error!("Fatal frame error: {e}");
                std::process::abort();
            }
            FailurePolicy::Exit => {
                error!("Frame error, shutting down: {e}");
                self.failure = Some(e.into());
                self.shutdown(event_loop);
            }
        }
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(state) = self.state.take() {
            state.finish();
        }
        event_loop.exit();
    }
}

impl AppState {
    fn handle_resize(&mut self, event_loop: &ActiveEventLoop, size: PhysicalSize<u32>) {
        let extent = Extent::new(size.width, size.height);
        self.scheduler.backend_mut().set_window_extent(extent);

        if extent.is_empty() {
            if !self.minimized {
                info!("Window minimized, pausing");
            }
            self.minimized = true;
            event_loop.set_control_flow(ControlFlow::Wait);
            return;
        }

        if self.minimized {
            info!("Window restored");
        }
        self.minimized = false;
        event_loop.set_control_flow(ControlFlow::Poll);
        self.scheduler.request_rebuild();
        self.window.request_redraw();

        debug!("Resized to {}x{}", size.width, size.height);
    }

    fn finish(self) {
        let elapsed = self.started.elapsed().as_secs_f64();
        log_stats(self.scheduler.stats(), elapsed);

        info!("Starting cleanup...");
        drop(self.scheduler);
        drop(self.window);
        info!("Cleanup complete");
    }
}

fn log_stats(stats: FrameStats, elapsed_secs: f64) {
    info!("Frame Statistics:");
    info!("  Presented: {}", stats.presentations);
    info!("  Submitted: {}", stats.submissions);
    info!("  Skipped: {}", stats.skipped);
    info!("  Rebuilds: {}", stats.rebuilds);
    if let Some(fps) = average_fps(stats.presentations, elapsed_secs) {
        info!("  Avg FPS: {fps:.1}");
    }
}

fn average_fps(frames: u64, elapsed_secs: f64) -> Option<f64> {
    (frames > 0 && elapsed_secs > 0.0).then(|| frames as f64 / elapsed_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_the_demo_window() {
        let config = AppConfig::default();
        assert_eq!(config.title, "Spinview");
        assert_eq!((config.width, config.height), (800, 600));
        assert!(config.resizable);
        assert!(!config.vsync);
        assert_eq!(config.validation, cfg!(debug_assertions));
        assert_eq!(config.vertex_shader, PathBuf::from("shaders/shader.vert.spv"));
        assert_eq!(config.fragment_shader, PathBuf::from("shaders/shader.frag.spv"));
        assert_eq!(config.failure_policy, FailurePolicy::Abort);
        assert_eq!(config.max_frames, None);
    }

    #[test]
    fn builder_sets_fields() {
        let config = AppConfig::new("Test")
            .with_size(1024, 768)
            .with_resizable(false)
            .with_vsync(true)
            .with_validation(false)
            .with_shaders("a.spv", "b.spv")
            .with_failure_policy(FailurePolicy::Exit)
            .with_max_frames(10);

        assert_eq!(config.title, "Test");
        assert_eq!((config.width, config.height), (1024, 768));
        assert!(!config.resizable);
        assert!(config.vsync);
        assert!(!config.validation);
        assert_eq!(config.vertex_shader, PathBuf::from("a.spv"));
        assert_eq!(config.fragment_shader, PathBuf::from("b.spv"));
        assert_eq!(config.failure_policy, FailurePolicy::Exit);
        assert_eq!(config.max_frames, Some(10));
    }

    #[test]
    fn renderer_config_carries_presentation_settings() {
        let renderer = AppConfig::new("Spin")
            .with_vsync(true)
            .with_validation(true)
            .with_shaders("v.spv", "f.spv")
            .renderer_config();

        assert_eq!(renderer.app_name, "Spin");
        assert!(renderer.vsync);
        assert!(renderer.validation);
        assert_eq!(renderer.vertex_shader, PathBuf::from("v.spv"));
        assert_eq!(renderer.fragment_shader, PathBuf::from("f.spv"));
        assert_eq!(renderer.clear_color, [0.2, 0.2, 0.2, 1.0]);
    }

    #[test]
    fn average_fps_needs_frames_and_time() {
        assert_eq!(average_fps(0, 1.0), None);
        assert_eq!(average_fps(10, 0.0), None);
        assert_eq!(average_fps(120, 2.0), Some(60.0));
    }
}
