use std::f32::consts::{FRAC_PI_2, SQRT_2};

use glam::{Vec2, Vec3};
use lyon::math::point;
use lyon::path::Path;
use lyon::tessellation::{
    BuffersBuilder, FillOptions, FillRule, FillTessellator, FillVertex, FillVertexConstructor,
    VertexBuffers,
};
use serde::{Deserialize, Serialize};

use crate::font::{FontLoadError, LoadedFont};
use crate::mesh::Mesh;

/// Closed polygon; the closing edge from the last point to the first is implicit.
pub type Contour = Vec<Vec2>;

/// Errors produced while turning text into geometry.
#[derive(Debug, thiserror::Error)]
pub enum TextError {
    #[error(transparent)]
    Font(#[from] FontLoadError),

    #[error("text contains no drawable glyphs")]
    EmptyText,

    #[error("failed to tessellate glyph outline: {0}")]
    Tessellation(String),
}

/// Shape parameters of extruded text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextOptions {
    /// Height of one em in world units.
    pub size: f32,
    /// Extrusion along +Z before centering.
    pub depth: f32,
    /// Straight segments used for every quadratic or cubic curve.
    pub curve_segments: u32,
    pub bevel: Option<Bevel>,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            size: 5.0,
            depth: 1.0,
            curve_segments: 12,
            bevel: Some(Bevel::default()),
        }
    }
}

/// Rounded edge between each cap and the side walls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bevel {
    /// How far the bevel reaches past each cap along Z.
    pub thickness: f32,
    /// How far the side walls sit outside the glyph outline.
    pub size: f32,
    /// Rings on each quarter-circle bevel profile.
    pub segments: u32,
}

impl Default for Bevel {
    fn default() -> Self {
        Self {
            thickness: 0.05,
            size: 0.05,
            segments: 5,
        }
    }
}

/// Builds the extruded, bounding-box centered mesh of `text`.
pub fn build_text_mesh(
    font: &LoadedFont,
    text: &str,
    options: &TextOptions,
) -> Result<Mesh, TextError> {
    let contours = text_contours(font, text, options)?;
    let mut mesh = extrude_contours(&contours, options.depth, options.bevel)?;
    mesh.center();
    Ok(mesh)
}

/// Lays `text` out on a single baseline and returns every glyph polygon in
/// world units.
pub fn text_contours(
    font: &LoadedFont,
    text: &str,
    options: &TextOptions,
) -> Result<Vec<Contour>, TextError> {
    let face = font.face()?;
    let scale = options.size / font.units_per_em();
    let mut pen_x = 0.0;
    let mut contours = Vec::new();

    for ch in text.chars().filter(|ch| !ch.is_control()) {
        let glyph = face
            .glyph_index(ch)
            .ok_or(FontLoadError::MissingGlyph(ch))?;
        let mut builder =
            ContourBuilder::new(scale, Vec2::new(pen_x, 0.0), options.curve_segments);
        // Whitespace has no outline, only an advance.
        if face.outline_glyph(glyph, &mut builder).is_some() {
            contours.extend(builder.finish());
        }
        pen_x += face.glyph_hor_advance(glyph).unwrap_or(0) as f32 * scale;
    }

    if contours.is_empty() {
        return Err(TextError::EmptyText);
    }
    Ok(contours)
}

/// Collects outline callbacks into polygons, flattening curves.
struct ContourBuilder {
    scale: f32,
    offset: Vec2,
    segments: u32,
    current: Contour,
    contours: Vec<Contour>,
}

impl ContourBuilder {
    fn new(scale: f32, offset: Vec2, segments: u32) -> Self {
        Self {
            scale,
            offset,
            segments: segments.max(1),
            current: Vec::new(),
            contours: Vec::new(),
        }
    }

    fn map(&self, x: f32, y: f32) -> Vec2 {
        Vec2::new(x, y) * self.scale + self.offset
    }

    fn last(&self) -> Vec2 {
        self.current.last().copied().unwrap_or(self.offset)
    }

    fn push(&mut self, point: Vec2) {
        if self.current.last() != Some(&point) {
            self.current.push(point);
        }
    }

    fn flush(&mut self) {
        let mut contour = std::mem::take(&mut self.current);
        if contour.len() > 1 && contour.first() == contour.last() {
            contour.pop();
        }
        if contour.len() >= 3 {
            self.contours.push(contour);
        }
    }

    fn finish(mut self) -> Vec<Contour> {
        self.flush();
        self.contours
    }
}

impl ttf_parser::OutlineBuilder for ContourBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        self.flush();
        let point = self.map(x, y);
        self.push(point);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let point = self.map(x, y);
        self.push(point);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let p0 = self.last();
        let p1 = self.map(x1, y1);
        let p2 = self.map(x, y);
        for step in 1..=self.segments {
            let t = step as f32 / self.segments as f32;
            let u = 1.0 - t;
            self.push(p0 * (u * u) + p1 * (2.0 * u * t) + p2 * (t * t));
        }
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let p0 = self.last();
        let p1 = self.map(x1, y1);
        let p2 = self.map(x2, y2);
        let p3 = self.map(x, y);
        for step in 1..=self.segments {
            let t = step as f32 / self.segments as f32;
            let u = 1.0 - t;
            self.push(
                p0 * (u * u * u)
                    + p1 * (3.0 * u * u * t)
                    + p2 * (3.0 * u * t * t)
                    + p3 * (t * t * t),
            );
        }
    }

    fn close(&mut self) {
        self.flush();
    }
}

/// Twice the signed area; positive for counter-clockwise polygons.
fn signed_area(contour: &[Vec2]) -> f32 {
    contour
        .iter()
        .zip(contour.iter().cycle().skip(1))
        .map(|(a, b)| a.perp_dot(*b))
        .sum()
}

fn contains(contour: &[Vec2], p: Vec2) -> bool {
    let mut inside = false;
    for (a, b) in contour.iter().zip(contour.iter().cycle().skip(1)) {
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if p.x < x {
                inside = !inside;
            }
        }
    }
    inside
}

/// Rewinds contours so outlines run counter-clockwise and holes clockwise.
///
/// A contour nested inside an odd number of other contours is a hole.
/// Font formats disagree on outline direction, so it is derived here.
pub fn orient_contours(contours: &[Contour]) -> Vec<Contour> {
    contours
        .iter()
        .enumerate()
        .map(|(i, contour)| {
            let nesting = contours
                .iter()
                .enumerate()
                .filter(|&(j, other)| j != i && contains(other, contour[0]))
                .count();
            let hole = nesting % 2 == 1;
            let ccw = signed_area(contour) > 0.0;
            let mut oriented = contour.clone();
            if ccw == hole {
                oriented.reverse();
            }
            oriented
        })
        .collect()
}

struct CapVertex;

impl FillVertexConstructor<[f32; 2]> for CapVertex {
    fn new_vertex(&mut self, vertex: FillVertex) -> [f32; 2] {
        vertex.position().to_array()
    }
}

fn tessellate_caps(contours: &[Contour]) -> Result<VertexBuffers<[f32; 2], u32>, TextError> {
    let mut builder = Path::builder();
    for contour in contours {
        builder.begin(point(contour[0].x, contour[0].y));
        for p in &contour[1..] {
            builder.line_to(point(p.x, p.y));
        }
        builder.close();
    }
    let path = builder.build();

    let mut buffers: VertexBuffers<[f32; 2], u32> = VertexBuffers::new();
    let options = FillOptions::tolerance(0.01).with_fill_rule(FillRule::NonZero);
    FillTessellator::new()
        .tessellate_path(
            &path,
            &options,
            &mut BuffersBuilder::new(&mut buffers, CapVertex),
        )
        .map_err(|err| TextError::Tessellation(format!("{err:?}")))?;
    Ok(buffers)
}

/// Drops repeated points, including a closing point equal to the first.
fn dedup_contour(contour: &[Vec2]) -> Contour {
    let min_edge = f32::EPSILON * f32::EPSILON;
    let mut out: Contour = Vec::with_capacity(contour.len());
    for &p in contour {
        if out.last().map_or(true, |q| q.distance_squared(p) > min_edge) {
            out.push(p);
        }
    }
    while out.len() > 1 && out[0].distance_squared(out[out.len() - 1]) <= min_edge {
        out.pop();
    }
    out
}

/// One ring of the side wall: the outline pushed outward by `offset` at height `z`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Layer {
    z: f32,
    offset: f32,
}

fn wall_layers(depth: f32, bevel: Option<Bevel>) -> Vec<Layer> {
    let Some(bevel) = bevel.filter(|bevel| bevel.segments > 0) else {
        return vec![
            Layer { z: 0.0, offset: 0.0 },
            Layer { z: depth, offset: 0.0 },
        ];
    };
    let angle = |step: u32| step as f32 / bevel.segments as f32 * FRAC_PI_2;
    let front = (0..bevel.segments).map(|step| Layer {
        z: -bevel.thickness * angle(step).cos(),
        offset: bevel.size * angle(step).sin(),
    });
    let body = [
        Layer { z: 0.0, offset: bevel.size },
        Layer { z: depth, offset: bevel.size },
    ];
    let back = (0..bevel.segments).rev().map(|step| Layer {
        z: depth + bevel.thickness * angle(step).cos(),
        offset: bevel.size * angle(step).sin(),
    });
    front.chain(body).chain(back).collect()
}

/// Per-vertex vectors that push both adjacent edges outward by one unit.
///
/// Expects the filled area on the left of each edge. Sharp corners are
/// limited to a miter of `sqrt(2)`.
fn outward_directions(contour: &[Vec2]) -> Vec<Vec2> {
    let outward = |edge: Vec2| Vec2::new(edge.y, -edge.x).normalize_or_zero();
    let n = contour.len();
    (0..n)
        .map(|i| {
            let prev = contour[(i + n - 1) % n];
            let here = contour[i];
            let next = contour[(i + 1) % n];
            let (n0, n1) = (outward(here - prev), outward(next - here));
            let cos = n0.dot(n1);
            let miter = if 1.0 + cos > 1e-6 {
                (n0 + n1) / (1.0 + cos)
            } else {
                n0
            };
            if miter.length_squared() > 2.0 {
                miter.normalize() * SQRT_2
            } else {
                miter
            }
        })
        .collect()
}

/// Extrudes filled polygons from `z = 0` to `z = depth`.
///
/// Produces a front cap facing +Z, a back cap facing -Z and flat-shaded
/// side walls facing away from the filled area. With a bevel the caps move
/// out to `-thickness` and `depth + thickness` and the walls grow by `size`.
pub fn extrude_contours(
    contours: &[Contour],
    depth: f32,
    bevel: Option<Bevel>,
) -> Result<Mesh, TextError> {
    let contours: Vec<Contour> = contours
        .iter()
        .map(|contour| dedup_contour(contour))
        .filter(|contour| contour.len() >= 3)
        .collect();
    if contours.is_empty() {
        return Err(TextError::EmptyText);
    }
    let contours = orient_contours(&contours);
    let caps = tessellate_caps(&contours)?;
    let layers = wall_layers(depth, bevel);
    let (back_z, front_z) = match (layers.first(), layers.last()) {
        (Some(first), Some(last)) => (first.z, last.z),
        _ => (0.0, depth),
    };

    let mut mesh = Mesh::new();
    for (z, normal) in [(front_z, Vec3::Z), (back_z, Vec3::NEG_Z)] {
        let base = mesh.vertex_count() as u32;
        for v in &caps.vertices {
            mesh.push_vertex(Vec3::new(v[0], v[1], z), normal);
        }
        for triangle in caps.indices.chunks_exact(3) {
            let [a, b, c] = [triangle[0], triangle[1], triangle[2]];
            let [pa, pb, pc] = [a, b, c].map(|i| Vec2::from(caps.vertices[i as usize]));
            let ccw = (pb - pa).perp_dot(pc - pa) > 0.0;
            // Front cap wants counter-clockwise triangles, the back cap the reverse.
            if ccw == (normal.z > 0.0) {
                mesh.indices.extend_from_slice(&[base + a, base + b, base + c]);
            } else {
                mesh.indices.extend_from_slice(&[base + a, base + c, base + b]);
            }
        }
    }

    for contour in &contours {
        let directions = outward_directions(contour);
        let rings: Vec<Vec<Vec3>> = layers
            .iter()
            .map(|layer| {
                contour
                    .iter()
                    .zip(&directions)
                    .map(|(p, dir)| (*p + *dir * layer.offset).extend(layer.z))
                    .collect()
            })
            .collect();
        for pair in rings.windows(2) {
            let (lower, upper) = (&pair[0], &pair[1]);
            for i in 0..contour.len() {
                let j = (i + 1) % contour.len();
                let quad = [lower[i], lower[j], upper[j], upper[i]];
                let normal = (quad[2] - quad[0])
                    .cross(quad[3] - quad[1])
                    .normalize_or_zero();
                let base = mesh.vertex_count() as u32;
                for p in quad {
                    mesh.push_vertex(p, normal);
                }
                mesh.indices
                    .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
            }
        }
    }

    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ttf_parser::OutlineBuilder;

    fn square(min: f32, max: f32) -> Contour {
        vec![
            Vec2::new(min, min),
            Vec2::new(max, min),
            Vec2::new(max, max),
            Vec2::new(min, max),
        ]
    }

    #[test]
    fn extruded_square_is_closed_box() {
        let mesh = extrude_contours(&[square(0.0, 2.0)], 1.0, None).unwrap();
        assert!(mesh.topology().is_closed_manifold());
        assert!((mesh.signed_volume() - 4.0).abs() < 1e-4);
        let bounds = mesh.bounds().unwrap();
        assert_eq!(bounds.min, Vec3::ZERO);
        assert_eq!(bounds.max, Vec3::new(2.0, 2.0, 1.0));
    }

    #[test]
    fn clockwise_outline_is_rewound() {
        let mut outline = square(0.0, 2.0);
        outline.reverse();
        let mesh = extrude_contours(&[outline], 0.5, None).unwrap();
        assert!(mesh.topology().is_closed_manifold());
        assert!(mesh.signed_volume() > 0.0);
    }

    #[test]
    fn hole_is_subtracted() {
        // Both contours wound the same way on purpose.
        let contours = vec![square(0.0, 3.0), square(1.0, 2.0)];
        let oriented = orient_contours(&contours);
        assert!(signed_area(&oriented[0]) > 0.0);
        assert!(signed_area(&oriented[1]) < 0.0);

        let mesh = extrude_contours(&contours, 1.0, None).unwrap();
        assert!(mesh.topology().is_closed_manifold());
        assert!((mesh.signed_volume() - 8.0).abs() < 1e-4);
    }

    #[test]
    fn wall_normals_face_outward() {
        let mesh = extrude_contours(&[square(-1.0, 1.0)], 1.0, None).unwrap();
        for i in 0..mesh.vertex_count() {
            let position = mesh.position(i);
            let normal = mesh.normal(i);
            if normal.z == 0.0 {
                let planar = Vec3::new(position.x, position.y, 0.0);
                assert!(normal.dot(planar) > 0.0);
            }
        }
    }

    #[test]
    fn bevel_grows_the_box_on_every_side() {
        let bevel = Bevel {
            thickness: 0.1,
            size: 0.2,
            segments: 3,
        };
        let mesh = extrude_contours(&[square(0.0, 2.0)], 1.0, Some(bevel)).unwrap();
        assert!(mesh.topology().is_closed_manifold());

        let bounds = mesh.bounds().unwrap();
        assert!((bounds.min - Vec3::new(-0.2, -0.2, -0.1)).length() < 1e-5);
        assert!((bounds.max - Vec3::new(2.2, 2.2, 1.1)).length() < 1e-5);

        let volume = mesh.signed_volume();
        assert!(volume > 4.0 && volume < 2.4 * 2.4 * 1.2);

        let center = Vec3::new(1.0, 1.0, 0.5);
        for [a, b, c] in mesh.triangles() {
            let face = (b - a).cross(c - a);
            let centroid = (a + b + c) / 3.0;
            assert!(face.dot(centroid - center) > 0.0);
        }
    }

    #[test]
    fn bevel_without_segments_is_plain_extrusion() {
        let bevel = Bevel {
            segments: 0,
            ..Bevel::default()
        };
        let plain = extrude_contours(&[square(0.0, 1.0)], 1.0, None).unwrap();
        let flat = extrude_contours(&[square(0.0, 1.0)], 1.0, Some(bevel)).unwrap();
        assert_eq!(plain.bounds(), flat.bounds());
        assert_eq!(plain.triangle_count(), flat.triangle_count());
    }

    #[test]
    fn repeated_points_are_dropped() {
        let mut outline = square(0.0, 1.0);
        outline.insert(1, Vec2::ZERO);
        outline.push(Vec2::ZERO);
        let mesh = extrude_contours(&[outline], 1.0, None).unwrap();
        assert!(mesh.topology().is_closed_manifold());
        assert!((mesh.signed_volume() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn curves_use_requested_segment_count() {
        let mut builder = ContourBuilder::new(1.0, Vec2::ZERO, 4);
        builder.move_to(0.0, 0.0);
        builder.quad_to(1.0, 2.0, 2.0, 0.0);
        builder.close();
        let contours = builder.finish();
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].len(), 5);
        assert_eq!(contours[0][2], Vec2::new(1.0, 1.0));
    }

    #[test]
    fn builder_scales_and_offsets() {
        let mut builder = ContourBuilder::new(0.5, Vec2::new(10.0, 0.0), 12);
        builder.move_to(0.0, 0.0);
        builder.line_to(4.0, 0.0);
        builder.line_to(4.0, 4.0);
        builder.line_to(0.0, 0.0);
        builder.close();
        let contours = builder.finish();
        assert_eq!(
            contours[0],
            vec![Vec2::new(10.0, 0.0), Vec2::new(12.0, 0.0), Vec2::new(12.0, 2.0)]
        );
    }

    #[test]
    fn degenerate_input_is_empty_text() {
        let sliver = vec![Vec2::ZERO, Vec2::X];
        assert!(matches!(
            extrude_contours(&[sliver], 1.0, None),
            Err(TextError::EmptyText)
        ));
    }

    fn fixture_font() -> LoadedFont {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/Tuffy.ttf");
        let bytes = std::fs::read(path).expect("fixture font");
        LoadedFont::from_bytes("Tuffy", bytes, 0).expect("fixture parses")
    }

    fn flat_options() -> TextOptions {
        TextOptions {
            bevel: None,
            ..TextOptions::default()
        }
    }

    fn width(contours: &[Contour]) -> f32 {
        let xs = contours.iter().flatten().map(|p| p.x);
        let (min, max) = xs.fold((f32::MAX, f32::MIN), |(lo, hi), x| (lo.min(x), hi.max(x)));
        max - min
    }

    fn min_x(contours: &[Contour]) -> f32 {
        contours.iter().flatten().map(|p| p.x).fold(f32::MAX, f32::min)
    }

    #[test]
    fn letter_s_is_a_closed_solid() {
        let font = fixture_font();
        let options = TextOptions::default();
        let mesh = build_text_mesh(&font, "S", &options).unwrap();
        assert!(mesh.topology().is_closed_manifold());
        assert!(mesh.signed_volume() > 0.0);

        let bounds = mesh.bounds().unwrap();
        assert!(bounds.center().length() < 1e-4);
        let size = bounds.size();
        assert!(size.y > 0.5 * options.size && size.y < 1.1 * options.size);
        assert!(size.x > 0.2 * options.size && size.x < options.size);
        assert!((size.z - 1.1).abs() < 1e-4);
    }

    #[test]
    fn glyphs_advance_along_the_baseline() {
        let font = fixture_font();
        let options = flat_options();
        let one = width(&text_contours(&font, "S", &options).unwrap());
        let two = width(&text_contours(&font, "SS", &options).unwrap());
        let ratio = two / one;
        assert!(ratio > 1.8 && ratio < 2.6, "ratio {ratio}");
    }

    #[test]
    fn whitespace_only_advances() {
        let font = fixture_font();
        let options = flat_options();
        let face = font.face().unwrap();
        let space = face.glyph_index(' ').unwrap();
        let advance =
            face.glyph_hor_advance(space).unwrap() as f32 * options.size / font.units_per_em();

        let plain = text_contours(&font, "S", &options).unwrap();
        let shifted = text_contours(&font, " S", &options).unwrap();
        assert_eq!(plain.len(), shifted.len());
        assert!((min_x(&shifted) - min_x(&plain) - advance).abs() < 1e-4);
        assert!(matches!(
            text_contours(&font, " ", &options),
            Err(TextError::EmptyText)
        ));
    }

    #[test]
    fn unmapped_character_is_a_missing_glyph() {
        let font = fixture_font();
        assert!(matches!(
            text_contours(&font, "S\u{4e2d}", &flat_options()),
            Err(TextError::Font(FontLoadError::MissingGlyph('\u{4e2d}')))
        ));
    }
}
