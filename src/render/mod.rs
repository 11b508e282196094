mod common;
mod native;
mod shader;

pub use common::{CameraParams, LightParams};
pub use native::{to_wgpu_color, Renderer};
