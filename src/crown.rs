use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::material::StandardMaterial;
use crate::mesh::{cuboid, Mesh};
use crate::scene::SceneNode;

pub const BASE_HEIGHT: f32 = 0.3;
pub const SPIKE_COUNT: usize = 3;
pub const SPIKE_BASE_WIDTH: f32 = 1.2;
/// Spike depth relative to the crown depth.
pub const SPIKE_DEPTH_RATIO: f32 = 0.8;
pub const CENTER_SPIKE_HEIGHT: f32 = 2.0;
pub const SIDE_SPIKE_HEIGHT: f32 = 1.5;
/// Smallest footprint produced by [`DimensionPolicy::Clamp`].
pub const MIN_DIMENSION: f32 = 1e-3;

/// Errors raised while validating crown dimensions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("crown {name} must be finite and positive, got {value}")]
    InvalidDimension { name: &'static str, value: f32 },
}

/// How [`build_crown_checked`] treats non-positive or non-finite dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionPolicy {
    /// Build whatever the numbers describe, degenerate or not.
    Allow,
    /// Raise bad values to [`MIN_DIMENSION`].
    Clamp,
    /// Refuse bad values.
    #[default]
    Reject,
}

impl DimensionPolicy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "allow" => Some(Self::Allow),
            "clamp" => Some(Self::Clamp),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }

    fn apply(self, name: &'static str, value: f32) -> Result<f32, GeometryError> {
        let valid = value.is_finite() && value > 0.0;
        match self {
            Self::Allow => Ok(value),
            Self::Clamp if valid => Ok(value.max(MIN_DIMENSION)),
            Self::Clamp => Ok(MIN_DIMENSION),
            Self::Reject if valid => Ok(value),
            Self::Reject => Err(GeometryError::InvalidDimension { name, value }),
        }
    }
}

/// One pointed solid standing on the crown base.
#[derive(Debug, Clone, PartialEq)]
pub struct Spike {
    pub height: f32,
    pub base_width: f32,
    pub depth: f32,
    /// Placement relative to the crown origin.
    pub offset: Vec3,
    pub mesh: Mesh,
}

/// Base plus spikes, in crown-local coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Crown {
    pub width: f32,
    pub depth: f32,
    pub base: Mesh,
    pub spikes: [Spike; SPIKE_COUNT],
}

impl Crown {
    /// Number of solids making up the crown.
    pub fn solid_count(&self) -> usize {
        1 + self.spikes.len()
    }

    /// Builds the composite scene node: `base` and `spike-{i}` children.
    pub fn to_node(&self, name: impl Into<String>) -> SceneNode {
        let mut group = SceneNode::group(name);
        group.add(SceneNode::mesh(
            "base",
            self.base.clone(),
            StandardMaterial::gold(),
        ));
        for (index, spike) in self.spikes.iter().enumerate() {
            group.add(
                SceneNode::mesh(
                    format!("spike-{index}"),
                    spike.mesh.clone(),
                    StandardMaterial::polished_gold(),
                )
                .with_translation(spike.offset),
            );
        }
        group
    }
}

/// Builds a crown spanning `width` along X and `depth` along Z.
///
/// No validation happens here: zero or negative values produce degenerate
/// geometry. Use [`build_crown_checked`] to apply a [`DimensionPolicy`].
pub fn build_crown(width: f32, depth: f32) -> Crown {
    let base = cuboid(Vec3::new(width, BASE_HEIGHT, depth));
    let spike_depth = depth * SPIKE_DEPTH_RATIO;
    let positions = [-width / 3.0, 0.0, width / 3.0];

    let spikes = std::array::from_fn(|index| {
        let height = if index == 1 {
            CENTER_SPIKE_HEIGHT
        } else {
            SIDE_SPIKE_HEIGHT
        };
        Spike {
            height,
            base_width: SPIKE_BASE_WIDTH,
            depth: spike_depth,
            offset: Vec3::new(positions[index], BASE_HEIGHT / 2.0, 0.0),
            mesh: spike_mesh(height, SPIKE_BASE_WIDTH, spike_depth),
        }
    });

    Crown {
        width,
        depth,
        base,
        spikes,
    }
}

/// Validates the footprint with `policy` before building the crown.
pub fn build_crown_checked(
    width: f32,
    depth: f32,
    policy: DimensionPolicy,
) -> Result<Crown, GeometryError> {
    let width = policy.apply("width", width)?;
    let depth = policy.apply("depth", depth)?;
    Ok(build_crown(width, depth))
}

/// Pointed solid with a rectangular footprint on `y = 0` and its apex at
/// `(0, height, 0)`.
///
/// Five faces: front and back triangles, left and right triangles, and the
/// bottom rectangle split in two. Each face owns its vertices so normals
/// stay flat.
pub fn spike_mesh(height: f32, base_width: f32, depth: f32) -> Mesh {
    let hw = base_width / 2.0;
    let hd = depth / 2.0;
    let apex = Vec3::new(0.0, height, 0.0);
    let front_left = Vec3::new(-hw, 0.0, hd);
    let front_right = Vec3::new(hw, 0.0, hd);
    let back_left = Vec3::new(-hw, 0.0, -hd);
    let back_right = Vec3::new(hw, 0.0, -hd);

    let mut mesh = Mesh::new();
    // front
    mesh.push_flat_triangle(front_left, front_right, apex);
    // back
    mesh.push_flat_triangle(back_right, back_left, apex);
    // bottom
    mesh.push_flat_triangle(back_left, back_right, front_right);
    mesh.push_flat_triangle(front_right, front_left, back_left);
    // left
    mesh.push_flat_triangle(back_left, front_left, apex);
    // right
    mesh.push_flat_triangle(front_right, back_right, apex);
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < EPS,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn crown_has_one_base_and_three_spikes() {
        for (width, depth) in [(4.0, 1.0), (0.5, 3.0), (12.0, 0.2)] {
            let crown = build_crown(width, depth);
            assert_eq!(crown.solid_count(), 4);
            assert_eq!(crown.to_node("crown").mesh_count(), 4);
        }
    }

    #[test]
    fn reference_crown_matches_expected_layout() {
        let crown = build_crown(4.0, 1.0);

        let base = crown.base.bounds().unwrap();
        assert_close(base.size().x, 4.0);
        assert_close(base.size().y, 0.3);
        assert_close(base.size().z, 1.0);
        assert!(base.center().length() < EPS);

        let xs: Vec<f32> = crown.spikes.iter().map(|spike| spike.offset.x).collect();
        assert_close(xs[0], -4.0 / 3.0);
        assert_close(xs[1], 0.0);
        assert_close(xs[2], 4.0 / 3.0);

        let heights: Vec<f32> = crown.spikes.iter().map(|spike| spike.height).collect();
        assert_eq!(heights, vec![1.5, 2.0, 1.5]);

        for spike in &crown.spikes {
            assert_close(spike.offset.y, 0.15);
            assert_close(spike.offset.z, 0.0);
            assert_close(spike.depth, 0.8);
            let bounds = spike.mesh.bounds().unwrap();
            assert_close(bounds.size().z, 0.8);
            assert_close(bounds.size().x, SPIKE_BASE_WIDTH);
            assert_close(bounds.min.y, 0.0);
            assert_close(bounds.max.y, spike.height);
        }
    }

    #[test]
    fn spikes_rest_on_top_of_base() {
        let crown = build_crown(4.0, 1.0);
        let base_top = crown.base.bounds().unwrap().max.y;
        for spike in &crown.spikes {
            let bottom = spike.mesh.bounds().unwrap().min.y + spike.offset.y;
            assert_close(bottom, base_top);
        }
    }

    #[test]
    fn center_spike_is_tallest() {
        let crown = build_crown(3.0, 2.0);
        let apex = |spike: &Spike| spike.mesh.bounds().unwrap().max.y;
        assert!(apex(&crown.spikes[1]) > apex(&crown.spikes[0]));
        assert!(apex(&crown.spikes[1]) > apex(&crown.spikes[2]));
    }

    #[test]
    fn spikes_are_ordered_left_to_right() {
        let crown = build_crown(2.5, 1.0);
        assert!(crown.spikes[0].offset.x < crown.spikes[1].offset.x);
        assert!(crown.spikes[1].offset.x < crown.spikes[2].offset.x);
    }

    #[test]
    fn spike_is_closed_manifold() {
        let mesh = spike_mesh(2.0, 1.2, 0.8);
        assert_eq!(mesh.triangle_count(), 6);
        let topology = mesh.topology();
        assert_eq!(topology.edges, 9);
        assert!(topology.is_closed_manifold(), "{topology:?}");
    }

    #[test]
    fn spike_faces_point_away_from_centroid() {
        let mesh = spike_mesh(1.5, 1.2, 0.8);
        let vertex_count = mesh.vertex_count() as f32;
        let centroid = (0..mesh.vertex_count())
            .map(|i| mesh.position(i))
            .sum::<Vec3>()
            / vertex_count;
        for [a, b, c] in mesh.triangles() {
            let normal = (b - a).cross(c - a);
            let face_center = (a + b + c) / 3.0;
            assert!(normal.dot(face_center - centroid) > 0.0);
        }
        // Volume of the pyramid: base area * height / 3.
        assert!((mesh.signed_volume() - 1.2 * 0.8 * 1.5 / 3.0).abs() < 1e-4);
    }

    #[test]
    fn stored_normals_match_winding() {
        let mesh = spike_mesh(2.0, 1.2, 0.8);
        for triangle in mesh.indices.chunks_exact(3) {
            let [a, b, c] = [0, 1, 2].map(|k| mesh.position(triangle[k] as usize));
            let face = (b - a).cross(c - a).normalize();
            for &index in triangle {
                assert!((mesh.normal(index as usize) - face).length() < EPS);
            }
        }
    }

    #[test]
    fn building_twice_is_identical() {
        assert_eq!(build_crown(4.0, 1.0), build_crown(4.0, 1.0));
    }

    #[test]
    fn zero_width_stacks_spikes() {
        let crown = build_crown(0.0, 1.0);
        for spike in &crown.spikes {
            assert_eq!(spike.offset.x, 0.0);
        }
    }

    #[test]
    fn reject_policy_refuses_degenerate_width() {
        let err = build_crown_checked(0.0, 1.0, DimensionPolicy::Reject).unwrap_err();
        assert_eq!(
            err,
            GeometryError::InvalidDimension {
                name: "width",
                value: 0.0
            }
        );
        assert!(build_crown_checked(2.0, f32::NAN, DimensionPolicy::Reject).is_err());
    }

    #[test]
    fn clamp_policy_raises_to_minimum() {
        let crown = build_crown_checked(-1.0, 1.0, DimensionPolicy::Clamp).unwrap();
        assert_eq!(crown.width, MIN_DIMENSION);
        assert_eq!(crown.depth, 1.0);
    }

    #[test]
    fn allow_policy_keeps_reference_behavior() {
        let crown = build_crown_checked(0.0, 1.0, DimensionPolicy::Allow).unwrap();
        assert_eq!(crown, build_crown(0.0, 1.0));
    }

    #[test]
    fn policy_names_parse() {
        assert_eq!(DimensionPolicy::from_name("Clamp"), Some(DimensionPolicy::Clamp));
        assert_eq!(DimensionPolicy::from_name("nope"), None);
    }
}
