use std::collections::{HashMap, HashSet};

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Number of `f32` values stored per vertex: `position.xyz` then `normal.xyz`.
pub const FLOATS_PER_VERTEX: usize = 6;

/// GPU ready triangle mesh with interleaved vertex data.
///
/// Vertices are laid out as `position.xyz` followed by `normal.xyz`, indices
/// form a triangle list wound counter-clockwise when seen from the outside.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / FLOATS_PER_VERTEX
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn position(&self, index: usize) -> Vec3 {
        let start = index * FLOATS_PER_VERTEX;
        Vec3::from_slice(&self.vertices[start..start + 3])
    }

    pub fn normal(&self, index: usize) -> Vec3 {
        let start = index * FLOATS_PER_VERTEX + 3;
        Vec3::from_slice(&self.vertices[start..start + 3])
    }

    /// Appends a vertex and returns its index.
    pub fn push_vertex(&mut self, position: Vec3, normal: Vec3) -> u32 {
        let index = self.vertex_count() as u32;
        self.vertices
            .extend_from_slice(&[position.x, position.y, position.z]);
        self.vertices.extend_from_slice(&[normal.x, normal.y, normal.z]);
        index
    }

    /// Appends a triangle with its own three vertices carrying the face normal.
    pub fn push_flat_triangle(&mut self, a: Vec3, b: Vec3, c: Vec3) {
        let normal = (b - a).cross(c - a).normalize_or_zero();
        let i0 = self.push_vertex(a, normal);
        let i1 = self.push_vertex(b, normal);
        let i2 = self.push_vertex(c, normal);
        self.indices.extend_from_slice(&[i0, i1, i2]);
    }

    /// Iterates over the corner positions of every triangle.
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).map(move |triangle| {
            [
                self.position(triangle[0] as usize),
                self.position(triangle[1] as usize),
                self.position(triangle[2] as usize),
            ]
        })
    }

    /// Axis-aligned bounds of every vertex, `None` for an empty mesh.
    pub fn bounds(&self) -> Option<Aabb> {
        (0..self.vertex_count())
            .map(|i| self.position(i))
            .fold(None, |bounds: Option<Aabb>, point| match bounds {
                Some(bounds) => Some(bounds.including(point)),
                None => Some(Aabb::new(point, point)),
            })
    }

    pub fn translate(&mut self, offset: Vec3) {
        for vertex in self.vertices.chunks_exact_mut(FLOATS_PER_VERTEX) {
            vertex[0] += offset.x;
            vertex[1] += offset.y;
            vertex[2] += offset.z;
        }
    }

    /// Moves the mesh so that its bounding box is centered on the origin.
    ///
    /// Returns the translation that was applied.
    pub fn center(&mut self) -> Vec3 {
        let Some(bounds) = self.bounds() else {
            return Vec3::ZERO;
        };
        let offset = -bounds.center();
        self.translate(offset);
        offset
    }

    /// Volume enclosed by the mesh, positive when triangles face outward.
    pub fn signed_volume(&self) -> f32 {
        self.triangles()
            .map(|[a, b, c]| a.dot(b.cross(c)) / 6.0)
            .sum()
    }

    /// Analyses edge sharing after welding vertices that share a position.
    pub fn topology(&self) -> Topology {
        let mut welded: HashMap<[u32; 3], usize> = HashMap::new();
        let mut ids = Vec::with_capacity(self.vertex_count());
        for i in 0..self.vertex_count() {
            let next = welded.len();
            let id = *welded.entry(position_key(self.position(i))).or_insert(next);
            ids.push(id);
        }

        let mut directed: HashMap<(usize, usize), usize> = HashMap::new();
        for triangle in self.indices.chunks_exact(3) {
            let corners = [
                ids[triangle[0] as usize],
                ids[triangle[1] as usize],
                ids[triangle[2] as usize],
            ];
            for k in 0..3 {
                let edge = (corners[k], corners[(k + 1) % 3]);
                *directed.entry(edge).or_insert(0) += 1;
            }
        }

        let mut topology = Topology::default();
        let mut seen = HashSet::new();
        for &(a, b) in directed.keys() {
            let key = (a.min(b), a.max(b));
            if !seen.insert(key) {
                continue;
            }
            topology.edges += 1;
            let forward = directed.get(&(key.0, key.1)).copied().unwrap_or(0);
            let backward = directed.get(&(key.1, key.0)).copied().unwrap_or(0);
            match forward + backward {
                1 => topology.boundary_edges += 1,
                2 if forward == 1 => {}
                2 => topology.misoriented_edges += 1,
                _ => topology.non_manifold_edges += 1,
            }
        }
        topology
    }
}

fn position_key(position: Vec3) -> [u32; 3] {
    // -0.0 and 0.0 must weld together.
    [
        (position.x + 0.0).to_bits(),
        (position.y + 0.0).to_bits(),
        (position.z + 0.0).to_bits(),
    ]
}

/// Edge statistics of a triangle mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Topology {
    pub edges: usize,
    /// Edges bordering a single triangle.
    pub boundary_edges: usize,
    /// Edges bordering more than two triangles.
    pub non_manifold_edges: usize,
    /// Edges shared by two triangles traversing them in the same direction.
    pub misoriented_edges: usize,
}

impl Topology {
    /// Every edge borders exactly two consistently wound triangles.
    pub fn is_closed_manifold(&self) -> bool {
        self.edges > 0
            && self.boundary_edges == 0
            && self.non_manifold_edges == 0
            && self.misoriented_edges == 0
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn including(self, point: Vec3) -> Self {
        Self {
            min: self.min.min(point),
            max: self.max.max(point),
        }
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

/// Box centered on the origin with the given full extents.
///
/// Every face owns its four vertices so the box shades flat.
pub fn cuboid(extents: Vec3) -> Mesh {
    const FACES: [(Vec3, Vec3); 6] = [
        (Vec3::Z, Vec3::X),
        (Vec3::NEG_Z, Vec3::NEG_X),
        (Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_X, Vec3::Z),
        (Vec3::Y, Vec3::X),
        (Vec3::NEG_Y, Vec3::X),
    ];

    let mut mesh = Mesh::new();
    for (normal, u) in FACES {
        let v = normal.cross(u);
        let corners = [
            normal - u - v,
            normal + u - v,
            normal + u + v,
            normal - u + v,
        ];
        let base = mesh.vertex_count() as u32;
        for corner in corners {
            mesh.push_vertex(corner * 0.5 * extents, normal);
        }
        mesh.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    mesh
}
