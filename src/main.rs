use std::any::Any;
use std::env;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use glam::Vec2;
use log::{info, warn};
use pollster::block_on;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, Event, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::Window;

use crowned_letter::{
    print_summary, AppContext, InputState, MouseButton, Renderer, SceneConfig, StaticViewport,
    WindowViewport,
};

const USAGE: &str = "Usage: crowned-letter [--scene FILE] [--font FILE] [--text TEXT] \
                     [--crown WIDTH DEPTH] [--summary-only]";

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse(env::args().skip(1))?;
    let mut config = match &options.scene {
        Some(path) => SceneConfig::load(path)
            .with_context(|| format!("failed to load scene {}", path.display()))?,
        None => SceneConfig::default(),
    };
    if let Some(font) = options.font {
        config.letter.font = Some(font);
    }
    if let Some(text) = options.text {
        config.letter.text = text;
    }

    if options.summary_only {
        run_headless(config, options.crown)
    } else {
        let headless_config = config.clone();
        match run_interactive(config, options.crown) {
            Ok(()) => Ok(()),
            Err(err) => {
                if err.downcast_ref::<WindowInitError>().is_some() {
                    eprintln!(
                        "{err}. Falling back to --summary-only mode (set DISPLAY or install X11 libs to enable rendering)."
                    );
                    run_headless(headless_config, options.crown)
                } else {
                    Err(err)
                }
            }
        }
    }
}

fn build_app(
    config: SceneConfig,
    viewport: Arc<dyn crowned_letter::ViewportProvider>,
    crown: Option<(f32, f32)>,
) -> Result<AppContext> {
    match crown {
        Some((width, depth)) => AppContext::crown_only(config, viewport, width, depth),
        None => Ok(AppContext::init(config, viewport)),
    }
}

fn run_headless(config: SceneConfig, crown: Option<(f32, f32)>) -> Result<()> {
    let viewport = Arc::new(StaticViewport::new(1280, 720));
    let mut app = build_app(config, viewport, crown)?;
    app.wait_for_font();
    print_summary(&app).context("failed to write summary")?;
    Ok(())
}

fn run_interactive(config: SceneConfig, crown: Option<(f32, f32)>) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;

    #[allow(deprecated)]
    let window = Arc::new(
        event_loop
            .create_window(
                Window::default_attributes()
                    .with_title("Crowned Letter")
                    .with_inner_size(LogicalSize::new(1280.0, 720.0)),
            )
            .map_err(|err| WindowInitError::from_error("window", err))?,
    );

    let renderer = block_on(Renderer::new(Arc::clone(&window)))?;
    let size = window.inner_size();
    let viewport = Arc::new(WindowViewport::new(size.width, size.height));
    let app = build_app(config, viewport.clone(), crown)?;

    let mut state = WindowState {
        renderer,
        app,
        input: InputState::new(),
        viewport,
        last_error: None,
    };

    #[allow(deprecated)]
    let outcome = event_loop.run(|event, elwt| {
        elwt.set_control_flow(ControlFlow::Poll);
        if let Err(err) = state.process_event(&event, elwt) {
            state.last_error = Some(err);
            elwt.exit();
        }
    });
    outcome.context("event loop terminated abnormally")?;

    match state.last_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct WindowState {
    renderer: Renderer,
    app: AppContext,
    input: InputState,
    viewport: Arc<WindowViewport>,
    last_error: Option<anyhow::Error>,
}

impl WindowState {
    fn process_event(&mut self, event: &Event<()>, elwt: &ActiveEventLoop) -> Result<()> {
        match event {
            Event::WindowEvent { event, window_id } if *window_id == self.renderer.window_id() => {
                match event {
                    WindowEvent::CloseRequested => elwt.exit(),
                    WindowEvent::Resized(size) => {
                        self.renderer.resize(*size);
                        self.viewport.update(size.width, size.height);
                    }
                    WindowEvent::ScaleFactorChanged { .. } => {
                        let size = self.renderer.window().inner_size();
                        self.renderer.resize(size);
                        self.viewport.update(size.width, size.height);
                    }
                    WindowEvent::MouseInput { state, button, .. } => {
                        self.handle_mouse_button(*state, *button)
                    }
                    WindowEvent::CursorMoved { position, .. } => {
                        let pos = Vec2::new(position.x as f32, position.y as f32);
                        self.input.set_mouse_position(pos);
                    }
                    WindowEvent::CursorLeft { .. } => self.input.clear_mouse_position(),
                    WindowEvent::MouseWheel { delta, .. } => {
                        let steps = match delta {
                            MouseScrollDelta::LineDelta(_, y) => *y,
                            MouseScrollDelta::PixelDelta(position) if position.y != 0.0 => {
                                position.y.signum() as f32
                            }
                            MouseScrollDelta::PixelDelta(_) => 0.0,
                        };
                        self.input.add_wheel(steps);
                    }
                    WindowEvent::RedrawRequested => self.redraw()?,
                    _ => {}
                }
            }
            Event::AboutToWait => {
                self.renderer.window().request_redraw();
            }
            Event::LoopExiting => {
                info!("Exiting after {} frames", self.app.frame());
            }
            _ => {}
        }
        Ok(())
    }

    fn redraw(&mut self) -> Result<()> {
        self.app.update(&self.input);
        self.renderer
            .update_globals(&self.app.camera_params(), &self.app.light_params());
        let scene = self.app.scene();
        match self.renderer.render(&scene.draw_list(), scene.background) {
            Ok(()) => Ok(()),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.renderer.reconfigure();
                Ok(())
            }
            Err(wgpu::SurfaceError::OutOfMemory) => Err(anyhow!("GPU is out of memory")),
            Err(wgpu::SurfaceError::Timeout) => {
                warn!("Surface timeout; retrying next frame");
                Ok(())
            }
            Err(wgpu::SurfaceError::Other) => {
                warn!("Surface reported an unknown error; retrying next frame");
                Ok(())
            }
        }
    }

    fn handle_mouse_button(&self, state: ElementState, button: winit::event::MouseButton) {
        let button = match button {
            winit::event::MouseButton::Left => MouseButton::LEFT,
            winit::event::MouseButton::Right => MouseButton::RIGHT,
            winit::event::MouseButton::Middle => MouseButton::MIDDLE,
            _ => return,
        };
        match state {
            ElementState::Pressed => self.input.set_mouse_button_down(button),
            ElementState::Released => self.input.set_mouse_button_up(button),
        }
    }
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

#[derive(Debug, Default, PartialEq)]
struct CliOptions {
    scene: Option<PathBuf>,
    font: Option<PathBuf>,
    text: Option<String>,
    crown: Option<(f32, f32)>,
    summary_only: bool,
}

impl CliOptions {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut options = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--scene" => options.scene = Some(PathBuf::from(value(&mut args, "--scene")?)),
                "--font" => options.font = Some(PathBuf::from(value(&mut args, "--font")?)),
                "--text" => options.text = Some(value(&mut args, "--text")?),
                "--crown" => {
                    let width = number(&mut args, "--crown")?;
                    let depth = number(&mut args, "--crown")?;
                    options.crown = Some((width, depth));
                }
                "--summary-only" => options.summary_only = true,
                other => return Err(anyhow!("Unknown argument: {other}\n{USAGE}")),
            }
        }
        Ok(options)
    }
}

fn value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    args.next()
        .ok_or_else(|| anyhow!("{flag} expects a value\n{USAGE}"))
}

fn number(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<f32> {
    let raw = value(args, flag)?;
    raw.parse::<f32>()
        .with_context(|| format!("{flag} expects numbers, got {raw:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliOptions> {
        CliOptions::parse(args.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn parses_all_flags() {
        let options = parse(&[
            "--scene",
            "scene.xml",
            "--font",
            "bold.ttf",
            "--text",
            "Q",
            "--crown",
            "4",
            "1.5",
            "--summary-only",
        ])
        .unwrap();
        assert_eq!(options.scene, Some(PathBuf::from("scene.xml")));
        assert_eq!(options.font, Some(PathBuf::from("bold.ttf")));
        assert_eq!(options.text.as_deref(), Some("Q"));
        assert_eq!(options.crown, Some((4.0, 1.5)));
        assert!(options.summary_only);
    }

    #[test]
    fn no_arguments_means_defaults() {
        assert_eq!(parse(&[]).unwrap(), CliOptions::default());
    }

    #[test]
    fn rejects_unknown_and_incomplete_flags() {
        assert!(parse(&["--fast"]).is_err());
        assert!(parse(&["--crown", "4"]).is_err());
        assert!(parse(&["--crown", "wide", "1"]).is_err());
        assert!(parse(&["--font"]).is_err());
    }
}
