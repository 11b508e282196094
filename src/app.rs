use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use glam::Vec3;
use log::{info, warn};

use crate::config::SceneConfig;
use crate::controls::{OrbitControls, PerspectiveCamera};
use crate::crown::{build_crown_checked, Crown};
use crate::font::{FontLoadError, FontTask, LoadedFont};
use crate::input::InputState;
use crate::mesh::{Aabb, Mesh};
use crate::render::{CameraParams, LightParams};
use crate::scene::{AmbientLight, DirectionalLight, Scene, SceneNode};
use crate::text::build_text_mesh;
use crate::viewport::ViewportProvider;

/// Where the letter geometry stands.
#[derive(Debug, Clone, PartialEq)]
pub enum LetterState {
    /// Waiting for the font task.
    Pending,
    /// Letter attached; `bounds` is its box after centering.
    Ready { bounds: Aabb },
    /// The font could not be loaded.
    FontFailed(String),
    /// The font loaded but the text produced no usable geometry.
    BuildFailed(String),
    /// Crown-only inspection mode; no letter is ever built.
    Skipped,
}

pub struct AppContext {
    config: SceneConfig,
    viewport: Arc<dyn ViewportProvider>,
    scene: Scene,
    camera: PerspectiveCamera,
    controls: OrbitControls,
    font_task: Option<FontTask>,
    letter: LetterState,
    crown: Option<Crown>,
    frame: u64,
}

impl AppContext {
    /// Builds the empty scene without starting any font load.
    pub fn new(config: SceneConfig, viewport: Arc<dyn ViewportProvider>) -> Self {
        let scene = Scene {
            background: config.background,
            ambient: AmbientLight {
                color: config.ambient.color,
                intensity: config.ambient.intensity,
            },
            directional: DirectionalLight {
                color: config.directional.color,
                intensity: config.directional.intensity,
                position: config.directional.position,
                target: Vec3::ZERO,
            },
            root: SceneNode::group("group"),
        };
        let camera = PerspectiveCamera {
            fov_y: config.camera.fov,
            aspect: viewport.aspect(),
            near: config.camera.near,
            far: config.camera.far,
            position: config.camera.position,
            target: Vec3::ZERO,
            up: Vec3::Y,
        };
        let controls = OrbitControls::new(Vec3::ZERO, config.damping);
        Self {
            config,
            viewport,
            scene,
            camera,
            controls,
            font_task: None,
            letter: LetterState::Pending,
            crown: None,
            frame: 0,
        }
    }

    /// Builds the scene and starts loading the configured font.
    pub fn init(config: SceneConfig, viewport: Arc<dyn ViewportProvider>) -> Self {
        let source = config.font_source();
        let mut app = Self::new(config, viewport);
        app.font_task = Some(FontTask::spawn(source));
        app
    }

    /// Builds only a crown with the given footprint, centered at the origin.
    pub fn crown_only(
        config: SceneConfig,
        viewport: Arc<dyn ViewportProvider>,
        width: f32,
        depth: f32,
    ) -> Result<Self> {
        let mut app = Self::new(config, viewport);
        let crown = build_crown_checked(width, depth, app.config.crown.dimensions)
            .context("failed to build crown")?;
        app.scene.root.add(crown.to_node("crown"));
        app.crown = Some(crown);
        app.letter = LetterState::Skipped;
        Ok(app)
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    pub fn letter_state(&self) -> &LetterState {
        &self.letter
    }

    pub fn crown(&self) -> Option<&Crown> {
        self.crown.as_ref()
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Advances one frame: picks up the font, spins the group, moves the camera.
    pub fn update(&mut self, input: &InputState) {
        self.poll_font();

        self.camera.set_aspect(self.viewport.aspect());
        let (_, height) = self.viewport.viewport_size();
        let gestures = input.take_gestures();
        self.controls.apply_gestures(&gestures, &self.camera, height);
        self.controls.update(&mut self.camera);

        self.scene.root.transform.rotation.y += self.config.rotation_speed;
        self.frame += 1;
    }

    /// Checks the font task without blocking. Returns `true` when it finished
    /// during this call.
    pub fn poll_font(&mut self) -> bool {
        let Some(outcome) = self.font_task.as_mut().and_then(FontTask::poll) else {
            return false;
        };
        self.font_task = None;
        self.handle_font(outcome);
        true
    }

    /// Blocks until the font task finishes. Used by the headless front end.
    pub fn wait_for_font(&mut self) {
        if let Some(task) = self.font_task.take() {
            let outcome = task.wait();
            self.handle_font(outcome);
        }
    }

    fn handle_font(&mut self, outcome: Result<LoadedFont, FontLoadError>) {
        let font = match outcome {
            Ok(font) => font,
            Err(err) => {
                let err = anyhow::Error::from(err);
                warn!("Font load failed: {err:#}");
                self.letter = LetterState::FontFailed(format!("{err:#}"));
                return;
            }
        };
        info!("Loaded font {}", font.name());
        if let Err(err) = self.attach_letter(&font) {
            warn!("Letter build failed: {err:#}");
            self.letter = LetterState::BuildFailed(format!("{err:#}"));
        }
    }

    /// Builds the configured text with `font` and crowns it.
    pub fn attach_letter(&mut self, font: &LoadedFont) -> Result<()> {
        let letter = &self.config.letter;
        let mesh = build_text_mesh(font, &letter.text, &letter.options)
            .with_context(|| format!("failed to build geometry for {:?}", letter.text))?;
        self.attach_letter_mesh(mesh)
    }

    /// Adds an already centered letter mesh and sizes a crown from its box.
    ///
    /// A crown whose dimensions the policy rejects is skipped with a warning;
    /// the letter stays.
    pub fn attach_letter_mesh(&mut self, mesh: Mesh) -> Result<()> {
        let bounds = mesh
            .bounds()
            .ok_or_else(|| anyhow!("letter geometry is empty"))?;
        let size = bounds.size();
        self.scene.root.add(SceneNode::mesh(
            "letter",
            mesh,
            self.config.letter.material,
        ));
        info!(
            "Letter attached ({:.2} x {:.2} x {:.2})",
            size.x, size.y, size.z
        );

        match build_crown_checked(size.x, size.z, self.config.crown.dimensions) {
            Ok(crown) => {
                let y = size.y / 2.0 + self.config.crown.offset;
                self.scene
                    .root
                    .add(crown.to_node("crown").with_translation(Vec3::new(0.0, y, 0.0)));
                self.crown = Some(crown);
            }
            Err(err) => warn!("Skipping crown: {err}"),
        }
        self.letter = LetterState::Ready { bounds };
        Ok(())
    }

    pub fn camera_params(&self) -> CameraParams {
        CameraParams {
            view_proj: self.camera.view_proj(),
            position: self.camera.position,
        }
    }

    pub fn light_params(&self) -> LightParams {
        let ambient = &self.scene.ambient;
        let directional = &self.scene.directional;
        LightParams {
            ambient: ambient.color.to_vec3() * ambient.intensity,
            direction: directional.direction(),
            directional: directional.color.to_vec3() * directional.intensity,
        }
    }
}

/// Writes the crown layout and every mesh node of the scene.
pub fn write_summary(app: &AppContext, out: &mut impl Write) -> io::Result<()> {
    match app.letter_state() {
        LetterState::FontFailed(reason) => writeln!(out, "Font load failed: {reason}")?,
        LetterState::BuildFailed(reason) => writeln!(out, "Letter build failed: {reason}")?,
        _ => {}
    }
    if let Some(crown) = app.crown() {
        let base = crown.base.bounds().map(|b| b.size()).unwrap_or(Vec3::ZERO);
        writeln!(
            out,
            "Crown {:.2} x {:.2} x {:.2} with {} spikes",
            base.x,
            base.y,
            base.z,
            crown.spikes.len()
        )?;
        for (index, spike) in crown.spikes.iter().enumerate() {
            writeln!(
                out,
                " - spike {index} x={:.2} y={:.2} height={:.2} depth={:.2}",
                spike.offset.x, spike.offset.y, spike.height, spike.depth
            )?;
        }
    }

    let draws = app.scene().draw_list();
    writeln!(out, "Scene contains {} mesh node(s)", draws.len())?;
    for draw in &draws {
        let position = draw.world.transform_point3(Vec3::ZERO);
        writeln!(
            out,
            " - {} pos=({:.2}, {:.2}, {:.2}) vertices={} triangles={}",
            draw.key,
            position.x,
            position.y,
            position.z,
            draw.mesh.vertex_count(),
            draw.mesh.triangle_count()
        )?;
    }
    Ok(())
}

pub fn print_summary(app: &AppContext) -> io::Result<()> {
    let stdout = io::stdout();
    let mut lock = stdout.lock();
    write_summary(app, &mut lock)
}
