use std::f32::consts::{PI, TAU};

use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::input::Gestures;

/// Keeps the polar angle off the poles, where `look_at` degenerates.
const POLE_EPSILON: f32 = 1e-6;
/// Smallest orbit radius; the camera never lands on its target.
const MIN_RADIUS: f32 = 1e-4;
/// Distance multiplier applied per wheel step towards the target.
pub const DOLLY_STEP: f32 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerspectiveCamera {
    /// Vertical field of view in degrees.
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self {
            fov_y: 75.0,
            aspect: 1.0,
            near: 0.1,
            far: 1000.0,
            position: Vec3::new(0.0, 0.0, 15.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
        }
    }
}

impl PerspectiveCamera {
    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Projection with wgpu's 0..1 depth range.
    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y.to_radians(),
            self.aspect.max(0.01),
            self.near,
            self.far,
        )
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection() * self.view()
    }

    /// Camera-space right and up axes expressed in world space.
    fn screen_axes(&self) -> (Vec3, Vec3) {
        let forward = (self.target - self.position).normalize_or(Vec3::NEG_Z);
        let right = forward.cross(self.up).normalize_or(Vec3::X);
        (right, right.cross(forward))
    }
}

/// Orbit parameters in spherical form: `theta` around +Y measured from +Z,
/// `phi` down from +Y.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Spherical {
    radius: f32,
    theta: f32,
    phi: f32,
}

impl Spherical {
    fn from_offset(offset: Vec3) -> Self {
        let radius = offset.length();
        if radius <= f32::EPSILON {
            return Self {
                radius: 0.0,
                theta: 0.0,
                phi: 0.0,
            };
        }
        Self {
            radius,
            theta: offset.x.atan2(offset.z),
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
        }
    }

    fn to_offset(self) -> Vec3 {
        let sin_phi = self.phi.sin();
        Vec3::new(
            self.radius * sin_phi * self.theta.sin(),
            self.radius * self.phi.cos(),
            self.radius * sin_phi * self.theta.cos(),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrbitControls {
    pub target: Vec3,
    /// Fraction of pending motion applied per update; zero applies it all at once.
    pub damping: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub rotate_speed: f32,
    pub pan_speed: f32,
    #[serde(skip)]
    pending_rotation: Vec2,
    #[serde(skip)]
    pending_pan: Vec3,
    #[serde(skip, default = "unit_scale")]
    pending_scale: f32,
}

fn unit_scale() -> f32 {
    1.0
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self::new(Vec3::ZERO, 0.05)
    }
}

impl OrbitControls {
    pub fn new(target: Vec3, damping: f32) -> Self {
        Self {
            target,
            damping: damping.clamp(0.0, 1.0),
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            rotate_speed: 1.0,
            pan_speed: 1.0,
            pending_rotation: Vec2::ZERO,
            pending_pan: Vec3::ZERO,
            pending_scale: 1.0,
        }
    }

    pub fn rotate_left(&mut self, angle: f32) {
        self.pending_rotation.x -= angle;
    }

    pub fn rotate_up(&mut self, angle: f32) {
        self.pending_rotation.y -= angle;
    }

    /// Moves towards the target by `steps` wheel notches; negative moves away.
    pub fn dolly(&mut self, steps: f32) {
        self.pending_scale *= DOLLY_STEP.powf(steps);
    }

    /// Pans by a screen-space drag so the point under the cursor follows it.
    pub fn pan(&mut self, pixels: Vec2, camera: &PerspectiveCamera, viewport_height: u32) {
        let height = viewport_height.max(1) as f32;
        let distance =
            (camera.position - self.target).length() * (camera.fov_y.to_radians() / 2.0).tan();
        let (right, up) = camera.screen_axes();
        let left = 2.0 * pixels.x * distance / height;
        let upward = 2.0 * pixels.y * distance / height;
        self.pending_pan += (-right * left + up * upward) * self.pan_speed;
    }

    /// Turns accumulated pointer motion into pending camera motion.
    pub fn apply_gestures(
        &mut self,
        gestures: &Gestures,
        camera: &PerspectiveCamera,
        viewport_height: u32,
    ) {
        let height = viewport_height.max(1) as f32;
        if gestures.rotate != Vec2::ZERO {
            self.rotate_left(TAU * gestures.rotate.x / height * self.rotate_speed);
            self.rotate_up(TAU * gestures.rotate.y / height * self.rotate_speed);
        }
        if gestures.pan != Vec2::ZERO {
            self.pan(gestures.pan, camera, viewport_height);
        }
        if gestures.wheel != 0.0 {
            self.dolly(gestures.wheel);
        }
    }

    /// `true` once no pending motion is left to apply.
    pub fn is_settled(&self) -> bool {
        self.pending_rotation.length_squared() < 1e-12
            && self.pending_pan.length_squared() < 1e-12
            && self.pending_scale == 1.0
    }

    /// Moves `camera` by the pending motion. Returns whether it moved.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        let offset = camera.position - self.target;
        let mut spherical = Spherical::from_offset(offset);

        let step = if self.damping > 0.0 { self.damping } else { 1.0 };
        spherical.theta += self.pending_rotation.x * step;
        spherical.phi = (spherical.phi + self.pending_rotation.y * step)
            .clamp(POLE_EPSILON, PI - POLE_EPSILON);
        spherical.radius = (spherical.radius * self.pending_scale)
            .clamp(self.min_distance, self.max_distance)
            .max(MIN_RADIUS);
        self.target += self.pending_pan * step;

        let previous = camera.position;
        camera.target = self.target;
        camera.position = self.target + spherical.to_offset();

        if self.damping > 0.0 {
            self.pending_rotation *= 1.0 - self.damping;
            self.pending_pan *= 1.0 - self.damping;
        } else {
            self.pending_rotation = Vec2::ZERO;
            self.pending_pan = Vec3::ZERO;
        }
        self.pending_scale = 1.0;

        previous.distance_squared(camera.position) > 1e-12
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> PerspectiveCamera {
        PerspectiveCamera::default()
    }

    #[test]
    fn undamped_rotation_is_applied_at_once() {
        let mut camera = camera();
        let mut controls = OrbitControls::new(Vec3::ZERO, 0.0);
        controls.rotate_left(std::f32::consts::FRAC_PI_2);
        assert!(controls.update(&mut camera));
        assert!((camera.position - Vec3::new(-15.0, 0.0, 0.0)).length() < 1e-4);
        assert!(controls.is_settled());
    }

    #[test]
    fn damping_eases_towards_the_full_rotation() {
        let mut camera = camera();
        let mut controls = OrbitControls::new(Vec3::ZERO, 0.05);
        controls.rotate_left(1.0);
        controls.update(&mut camera);
        let first = Spherical::from_offset(camera.position).theta;
        assert!((first + 0.05).abs() < 1e-5);

        for _ in 0..400 {
            controls.update(&mut camera);
        }
        let settled = Spherical::from_offset(camera.position).theta;
        assert!((settled + 1.0).abs() < 1e-3);
        assert!((camera.position.length() - 15.0).abs() < 1e-3);
    }

    #[test]
    fn polar_angle_stays_off_the_poles() {
        let mut camera = camera();
        let mut controls = OrbitControls::new(Vec3::ZERO, 0.0);
        controls.rotate_up(-10.0);
        controls.update(&mut camera);
        assert!(camera.position.is_finite());
        assert!(camera.position.y < -14.99);
        assert!(camera.view_proj().is_finite());
    }

    #[test]
    fn wheel_dollies_towards_target() {
        let mut camera = camera();
        let mut controls = OrbitControls::new(Vec3::ZERO, 0.05);
        controls.apply_gestures(
            &Gestures {
                wheel: 1.0,
                ..Gestures::default()
            },
            &camera,
            600,
        );
        controls.update(&mut camera);
        assert!((camera.position.length() - 15.0 * DOLLY_STEP).abs() < 1e-4);
    }

    #[test]
    fn distance_limits_are_respected() {
        let mut camera = camera();
        let mut controls = OrbitControls::new(Vec3::ZERO, 0.0);
        controls.min_distance = 10.0;
        controls.dolly(100.0);
        controls.update(&mut camera);
        assert!((camera.position.length() - 10.0).abs() < 1e-4);
    }

    #[test]
    fn dollying_in_all_the_way_can_be_undone() {
        let mut camera = camera();
        let mut controls = OrbitControls::new(Vec3::ZERO, 0.0);
        for _ in 0..400 {
            controls.dolly(1.0);
            controls.update(&mut camera);
        }
        assert!(camera.position.length() >= MIN_RADIUS * 0.99);
        assert!(camera.view_proj().is_finite());

        for _ in 0..400 {
            controls.dolly(-1.0);
            controls.update(&mut camera);
        }
        assert!(camera.position.is_finite());
        assert!(camera.position.length() > 1.0);
        assert!(camera.view_proj().is_finite());
    }

    #[test]
    fn dragging_right_pans_target_left() {
        let mut camera = camera();
        let mut controls = OrbitControls::new(Vec3::ZERO, 0.0);
        controls.pan(Vec2::new(100.0, 0.0), &camera, 600);
        controls.update(&mut camera);
        assert!(controls.target.x < 0.0);
        assert!(controls.target.y.abs() < 1e-5);
        assert!((camera.position - controls.target - Vec3::new(0.0, 0.0, 15.0)).length() < 1e-3);
        assert_eq!(camera.target, controls.target);
    }

    #[test]
    fn left_drag_over_full_height_turns_a_full_circle() {
        let mut camera = camera();
        let mut controls = OrbitControls::new(Vec3::ZERO, 0.0);
        controls.apply_gestures(
            &Gestures {
                rotate: Vec2::new(600.0, 0.0),
                ..Gestures::default()
            },
            &camera,
            600,
        );
        controls.update(&mut camera);
        assert!((camera.position - Vec3::new(0.0, 0.0, 15.0)).length() < 1e-3);
    }

    #[test]
    fn aspect_ignores_degenerate_sizes() {
        let mut camera = camera();
        camera.set_aspect(0.0);
        assert_eq!(camera.aspect, 1.0);
        camera.set_aspect(2.0);
        assert_eq!(camera.aspect, 2.0);
    }
}
