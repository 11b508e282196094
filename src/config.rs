use std::path::{Path, PathBuf};

use glam::Vec3;
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::crown::DimensionPolicy;
use crate::font::FontSource;
use crate::material::{Color, StandardMaterial};
use crate::text::{Bevel, TextOptions};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid scene XML")]
    Xml(#[from] roxmltree::Error),

    #[error("<{0}> element is missing")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {field}")]
    Invalid { field: String, value: String },

    #[error("failed to read scene file {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov: 75.0,
            near: 0.1,
            far: 1000.0,
            position: Vec3::new(0.0, 0.0, 15.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightConfig {
    pub color: Color,
    pub intensity: f32,
    /// Ignored for the ambient light.
    pub position: Vec3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LetterConfig {
    pub text: String,
    pub options: TextOptions,
    pub material: StandardMaterial,
    /// Explicit font file; `None` asks the system font database.
    pub font: Option<PathBuf>,
}

impl Default for LetterConfig {
    fn default() -> Self {
        Self {
            text: "S".to_string(),
            options: TextOptions::default(),
            material: StandardMaterial::gold(),
            font: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrownConfig {
    /// Gap between the top of the letter's box and the crown origin.
    pub offset: f32,
    pub dimensions: DimensionPolicy,
}

impl Default for CrownConfig {
    fn default() -> Self {
        Self {
            offset: 0.3,
            dimensions: DimensionPolicy::Reject,
        }
    }
}

/// Everything that can be tuned about the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    pub background: Color,
    pub camera: CameraConfig,
    /// Orbit damping factor; zero disables damping.
    pub damping: f32,
    pub ambient: LightConfig,
    pub directional: LightConfig,
    pub letter: LetterConfig,
    pub crown: CrownConfig,
    /// Radians added to the group's Y rotation every frame.
    pub rotation_speed: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            background: Color::from_hex(0x222222),
            camera: CameraConfig::default(),
            damping: 0.05,
            ambient: LightConfig {
                color: Color::WHITE,
                intensity: 0.5,
                position: Vec3::ZERO,
            },
            directional: LightConfig {
                color: Color::WHITE,
                intensity: 1.0,
                position: Vec3::splat(5.0),
            },
            letter: LetterConfig::default(),
            crown: CrownConfig::default(),
            rotation_speed: 0.01,
        }
    }
}

impl SceneConfig {
    /// Reads a scene file. Relative font paths resolve against its directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let xml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_xml(&xml)?;
        if let (Some(font), Some(dir)) = (config.letter.font.as_mut(), path.parent()) {
            if font.is_relative() {
                *font = dir.join(&*font);
            }
        }
        Ok(config)
    }

    /// Parses a `<scene>` document on top of the defaults.
    pub fn from_xml(xml: &str) -> Result<Self, ConfigError> {
        let document = Document::parse(xml)?;
        let root = document.root_element();
        if !root.has_tag_name("scene") {
            return Err(ConfigError::Missing("scene"));
        }

        let mut config = Self::default();
        config.background = parse_color(&root, "background", config.background)?;
        config.rotation_speed = parse_f32(&root, "rotation-speed", config.rotation_speed)?;

        if let Some(camera) = element(&root, "camera") {
            let defaults = &config.camera;
            config.camera = CameraConfig {
                fov: parse_f32(&camera, "fov", defaults.fov)?,
                near: parse_f32(&camera, "near", defaults.near)?,
                far: parse_f32(&camera, "far", defaults.far)?,
                position: parse_vec3(&camera, "position", defaults.position)?,
            };
        }
        if let Some(controls) = element(&root, "controls") {
            config.damping = parse_f32(&controls, "damping", config.damping)?;
        }
        if let Some(ambient) = element(&root, "ambient") {
            config.ambient = parse_light(&ambient, config.ambient)?;
        }
        if let Some(directional) = element(&root, "directional") {
            config.directional = parse_light(&directional, config.directional)?;
        }
        if let Some(letter) = element(&root, "letter") {
            if let Some(text) = optional_text(&letter, "text") {
                config.letter.text = text;
            }
            let options = &mut config.letter.options;
            options.size = parse_f32(&letter, "size", options.size)?;
            options.depth = parse_f32(&letter, "depth", options.depth)?;
            options.curve_segments = parse_u32(&letter, "curve-segments", options.curve_segments)?;
            if let Some(bevel) = element(&letter, "bevel") {
                options.bevel = parse_bevel(&bevel, options.bevel)?;
            }
            config.letter.font = optional_text(&letter, "font").map(PathBuf::from);
        }
        if let Some(crown) = element(&root, "crown") {
            config.crown.offset = parse_f32(&crown, "offset", config.crown.offset)?;
            if let Some(name) = optional_text(&crown, "dimensions") {
                config.crown.dimensions =
                    DimensionPolicy::from_name(&name).ok_or_else(|| ConfigError::Invalid {
                        field: "crown/dimensions".to_string(),
                        value: name,
                    })?;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejects values the renderer or the mesh builders cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("camera/fov", self.camera.fov, self.camera.fov > 0.0 && self.camera.fov < 180.0),
            ("camera/near", self.camera.near, self.camera.near > 0.0),
            ("camera/far", self.camera.far, self.camera.far > self.camera.near),
            ("controls/damping", self.damping, (0.0..=1.0).contains(&self.damping)),
            ("letter/size", self.letter.options.size, self.letter.options.size > 0.0),
            ("letter/depth", self.letter.options.depth, self.letter.options.depth >= 0.0),
            ("rotation-speed", self.rotation_speed, self.rotation_speed.is_finite()),
        ];
        if let Some((field, value, _)) = checks.iter().find(|(_, _, ok)| !ok) {
            return Err(ConfigError::Invalid {
                field: field.to_string(),
                value: value.to_string(),
            });
        }
        if let Some(bevel) = &self.letter.options.bevel {
            let bevel_checks = [
                ("letter/bevel/thickness", bevel.thickness),
                ("letter/bevel/size", bevel.size),
            ];
            if let Some((field, value)) = bevel_checks.iter().find(|(_, value)| *value < 0.0) {
                return Err(ConfigError::Invalid {
                    field: field.to_string(),
                    value: value.to_string(),
                });
            }
        }
        if self.letter.options.curve_segments == 0 {
            return Err(ConfigError::Invalid {
                field: "letter/curve-segments".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    pub fn font_source(&self) -> FontSource {
        match &self.letter.font {
            Some(path) => FontSource::File(path.clone()),
            None => FontSource::default(),
        }
    }
}

fn element<'a, 'input>(node: &Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|child| child.has_tag_name(tag))
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    element(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn invalid(tag: &str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        field: tag.to_string(),
        value: value.to_string(),
    }
}

fn parse_light(node: &Node<'_, '_>, default: LightConfig) -> Result<LightConfig, ConfigError> {
    Ok(LightConfig {
        color: parse_color(node, "color", default.color)?,
        intensity: parse_f32(node, "intensity", default.intensity)?,
        position: parse_vec3(node, "position", default.position)?,
    })
}

/// `<bevel>none</bevel>` turns the bevel off; otherwise the child elements
/// override the current bevel.
fn parse_bevel(
    node: &Node<'_, '_>,
    current: Option<Bevel>,
) -> Result<Option<Bevel>, ConfigError> {
    if node.text().map(str::trim) == Some("none") {
        return Ok(None);
    }
    let default = current.unwrap_or_default();
    Ok(Some(Bevel {
        thickness: parse_f32(node, "thickness", default.thickness)?,
        size: parse_f32(node, "size", default.size)?,
        segments: parse_u32(node, "segments", default.segments)?,
    }))
}

fn parse_f32(node: &Node<'_, '_>, tag: &str, default: f32) -> Result<f32, ConfigError> {
    match optional_text(node, tag) {
        Some(value) => value
            .parse::<f32>()
            .ok()
            .filter(|number| number.is_finite())
            .ok_or_else(|| invalid(tag, &value)),
        None => Ok(default),
    }
}

fn parse_u32(node: &Node<'_, '_>, tag: &str, default: u32) -> Result<u32, ConfigError> {
    match optional_text(node, tag) {
        Some(value) => value.parse::<u32>().map_err(|_| invalid(tag, &value)),
        None => Ok(default),
    }
}

fn parse_vec3(node: &Node<'_, '_>, tag: &str, default: Vec3) -> Result<Vec3, ConfigError> {
    let Some(value) = optional_text(node, tag) else {
        return Ok(default);
    };
    let numbers = value
        .split_whitespace()
        .map(|component| component.parse::<f32>().ok().filter(|n| n.is_finite()))
        .collect::<Option<Vec<f32>>>();
    match numbers.as_deref() {
        Some(&[x, y, z]) => Ok(Vec3::new(x, y, z)),
        _ => Err(invalid(tag, &value)),
    }
}

fn parse_color(node: &Node<'_, '_>, tag: &str, default: Color) -> Result<Color, ConfigError> {
    let Some(value) = optional_text(node, tag) else {
        return Ok(default);
    };
    let channels = value
        .split_whitespace()
        .map(|component| component.parse::<u8>().ok())
        .collect::<Option<Vec<u8>>>();
    match channels.as_deref() {
        Some(&[r, g, b]) => Ok(Color::from_srgb8(r, g, b)),
        _ => Err(invalid(tag, &value)),
    }
}
