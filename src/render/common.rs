use glam::{Mat4, Vec3};

/// Camera parameters consumed by the renderer's uniform buffer.
#[derive(Clone, Copy, Debug)]
pub struct CameraParams {
    pub view_proj: Mat4,
    pub position: Vec3,
}

/// Lighting state consumed by the renderer's uniform buffer.
///
/// Colors are linear and already multiplied by their intensity.
#[derive(Clone, Copy, Debug)]
pub struct LightParams {
    pub ambient: Vec3,
    /// Unit vector from the surface towards the directional light.
    pub direction: Vec3,
    pub directional: Vec3,
}
