use std::sync::Arc;

use glam::{EulerRot, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::material::{Color, StandardMaterial};
use crate::mesh::Mesh;

/// Local transform of a scene node.
///
/// Rotation is stored as XYZ Euler angles in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Vec3::ZERO,
        scale: Vec3::ONE,
    };

    pub fn matrix(&self) -> Mat4 {
        let rotation = Quat::from_euler(
            EulerRot::XYZ,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        );
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.translation)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// What a node draws, if anything.
#[derive(Debug, Clone)]
pub enum NodeContent {
    Group,
    Mesh {
        mesh: Arc<Mesh>,
        material: StandardMaterial,
    },
}

/// Node of the scene graph. Children inherit the node's transform.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub transform: Transform,
    pub content: NodeContent,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::IDENTITY,
            content: NodeContent::Group,
            children: Vec::new(),
        }
    }

    pub fn mesh(name: impl Into<String>, mesh: Mesh, material: StandardMaterial) -> Self {
        Self {
            name: name.into(),
            transform: Transform::IDENTITY,
            content: NodeContent::Mesh {
                mesh: Arc::new(mesh),
                material,
            },
            children: Vec::new(),
        }
    }

    pub fn with_translation(mut self, translation: Vec3) -> Self {
        self.transform.translation = translation;
        self
    }

    pub fn add(&mut self, child: SceneNode) {
        self.children.push(child);
    }

    pub fn child(&self, name: &str) -> Option<&SceneNode> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Looks up a descendant by a `/` separated path of child names.
    pub fn find(&self, path: &str) -> Option<&SceneNode> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |node, segment| node.child(segment))
    }

    pub fn mesh_data(&self) -> Option<&Mesh> {
        match &self.content {
            NodeContent::Mesh { mesh, .. } => Some(mesh),
            NodeContent::Group => None,
        }
    }

    /// Number of mesh nodes in this subtree, including the node itself.
    pub fn mesh_count(&self) -> usize {
        let own = usize::from(self.mesh_data().is_some());
        own + self
            .children
            .iter()
            .map(SceneNode::mesh_count)
            .sum::<usize>()
    }

    /// Flattens the subtree into world-space draw calls.
    pub fn collect_draws(&self, parent: Mat4, prefix: &str, out: &mut Vec<DrawItem>) {
        let world = parent * self.transform.matrix();
        let key = if prefix.is_empty() {
            self.name.clone()
        } else {
            format!("{prefix}/{}", self.name)
        };
        if let NodeContent::Mesh { mesh, material } = &self.content {
            out.push(DrawItem {
                key: key.clone(),
                world,
                mesh: Arc::clone(mesh),
                material: *material,
            });
        }
        for child in &self.children {
            child.collect_draws(world, &key, out);
        }
    }
}

/// A mesh instance resolved to world space.
#[derive(Debug, Clone)]
pub struct DrawItem {
    /// Path of the node in the graph; stable for the node's lifetime.
    pub key: String,
    pub world: Mat4,
    pub mesh: Arc<Mesh>,
    pub material: StandardMaterial,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmbientLight {
    pub color: Color,
    pub intensity: f32,
}

/// Light shining from `position` towards `target`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectionalLight {
    pub color: Color,
    pub intensity: f32,
    pub position: Vec3,
    pub target: Vec3,
}

impl DirectionalLight {
    /// Unit vector pointing from the lit surface towards the light.
    pub fn direction(&self) -> Vec3 {
        (self.position - self.target).normalize_or(Vec3::Y)
    }
}

/// Everything needed to draw one frame.
#[derive(Debug, Clone)]
pub struct Scene {
    pub background: Color,
    pub ambient: AmbientLight,
    pub directional: DirectionalLight,
    pub root: SceneNode,
}

impl Scene {
    /// World-space draw calls keyed by their path below the root group.
    pub fn draw_list(&self) -> Vec<DrawItem> {
        let mut draws = Vec::new();
        let root = self.root.transform.matrix();
        for child in &self.root.children {
            child.collect_draws(root, "", &mut draws);
        }
        draws
    }
}
