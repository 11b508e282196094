//! Building blocks for the crowned letter scene.
//!
//! The crate turns a font glyph into an extruded gold letter, sizes a
//! three-spike crown from the letter's bounding box and keeps the whole
//! group spinning under orbit controls. Geometry, configuration and the
//! per-frame application state are plain data and can be driven headless;
//! only [`Renderer`] needs a window and a GPU.

pub mod app;
pub mod config;
pub mod controls;
pub mod crown;
pub mod font;
pub mod input;
pub mod material;
pub mod mesh;
pub mod render;
pub mod scene;
pub mod text;
pub mod viewport;

pub use app::{print_summary, write_summary, AppContext, LetterState};
pub use config::{ConfigError, SceneConfig};
pub use controls::{OrbitControls, PerspectiveCamera};
pub use crown::{build_crown, build_crown_checked, Crown, DimensionPolicy, GeometryError, Spike};
pub use font::{FontLoadError, FontSource, FontTask, LoadedFont};
pub use input::{Gestures, InputState, MouseButton};
pub use material::{Color, StandardMaterial};
pub use mesh::{cuboid, Aabb, Mesh};
pub use render::{CameraParams, LightParams, Renderer};
pub use scene::{DrawItem, Scene, SceneNode, Transform};
pub use text::{build_text_mesh, Bevel, TextError, TextOptions};
pub use viewport::{StaticViewport, ViewportProvider, WindowViewport};
