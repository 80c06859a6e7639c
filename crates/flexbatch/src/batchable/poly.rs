//! Variable-size polygon kind.
//!
//! A [`Polygon`] is an immutable, pre-triangulated 2D shape shared between
//! items through an `Arc`. [`Poly2`] batches one polygon per item with the
//! same transform controls as a quad; texture coordinates are derived by
//! mapping the polygon's bounding box onto the UV window.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use crate::attributes::{self, AttributeOffsets, VertexAttribute};
use crate::batchable::Batchable;
use crate::color::{Color, WHITE_PACKED};
use crate::context::RenderContextAccumulator;
use crate::gpu::GpuTexture;
use crate::region::TextureRegion;

/// Rejected polygon data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolygonError {
    /// The point list holds an odd number of floats.
    OddCoordinateCount { count: usize },
    /// Fewer than three points.
    TooFewPoints { count: usize },
    /// The triangle list is empty or not a multiple of three.
    BadTriangleCount { count: usize },
    /// A triangle references a point that does not exist.
    IndexOutOfRange { index: u16, points: usize },
}

impl fmt::Display for PolygonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OddCoordinateCount { count } => {
                write!(f, "point coordinates come in pairs, got {count} floats")
            }
            Self::TooFewPoints { count } => {
                write!(f, "a polygon needs at least 3 points, got {count}")
            }
            Self::BadTriangleCount { count } => {
                write!(f, "triangle indices come in groups of 3, got {count}")
            }
            Self::IndexOutOfRange { index, points } => {
                write!(f, "triangle index {index} out of range for {points} points")
            }
        }
    }
}

impl Error for PolygonError {}

/// A triangulated 2D shape: packed x,y point pairs plus triangle indices
/// into them.
///
/// Construction validates the data once; afterwards the polygon is
/// immutable and can be shared across many [`Poly2`] items via `Arc`.
#[derive(Debug, Clone)]
pub struct Polygon {
    points: Vec<f32>,
    triangles: Vec<u16>,
    min_x: f32,
    min_y: f32,
    width: f32,
    height: f32,
}

impl Polygon {
    pub fn new(points: Vec<f32>, triangles: Vec<u16>) -> Result<Self, PolygonError> {
        if points.len() % 2 != 0 {
            return Err(PolygonError::OddCoordinateCount { count: points.len() });
        }
        let point_count = points.len() / 2;
        if point_count < 3 {
            return Err(PolygonError::TooFewPoints { count: point_count });
        }
        if triangles.is_empty() || triangles.len() % 3 != 0 {
            return Err(PolygonError::BadTriangleCount { count: triangles.len() });
        }
        for &index in &triangles {
            if index as usize >= point_count {
                return Err(PolygonError::IndexOutOfRange { index, points: point_count });
            }
        }

        let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
        let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
        for pair in points.chunks_exact(2) {
            min_x = min_x.min(pair[0]);
            max_x = max_x.max(pair[0]);
            min_y = min_y.min(pair[1]);
            max_y = max_y.max(pair[1]);
        }

        Ok(Self {
            points,
            triangles,
            min_x,
            min_y,
            width: max_x - min_x,
            height: max_y - min_y,
        })
    }

    pub fn vertex_count(&self) -> usize {
        self.points.len() / 2
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len() / 3
    }

    pub fn points(&self) -> &[f32] {
        &self.points
    }

    pub fn triangles(&self) -> &[u16] {
        &self.triangles
    }

    /// Bounding box as (min x, min y, width, height).
    pub fn bounds(&self) -> (f32, f32, f32, f32) {
        (self.min_x, self.min_y, self.width, self.height)
    }
}

/// A 2D polygon item. Item sizes vary with the assigned [`Polygon`], so a
/// batch of these uses the variable-size engine configuration.
pub struct Poly2 {
    polygon: Option<Arc<Polygon>>,
    texture: Option<Arc<dyn GpuTexture>>,
    x: f32,
    y: f32,
    origin_x: f32,
    origin_y: f32,
    scale_x: f32,
    scale_y: f32,
    rotation: f32,
    color: f32,
    u: f32,
    v: f32,
    u2: f32,
    v2: f32,
}

impl Default for Poly2 {
    fn default() -> Self {
        Self {
            polygon: None,
            texture: None,
            x: 0.0,
            y: 0.0,
            origin_x: 0.0,
            origin_y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
            color: WHITE_PACKED,
            u: 0.0,
            v: 0.0,
            u2: 1.0,
            v2: 1.0,
        }
    }
}

impl Poly2 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn polygon(&mut self, polygon: Arc<Polygon>) -> &mut Self {
        self.polygon = Some(polygon);
        self
    }

    pub fn texture(&mut self, texture: Arc<dyn GpuTexture>) -> &mut Self {
        self.texture = Some(texture);
        self
    }

    pub fn region(&mut self, region: &TextureRegion) -> &mut Self {
        self.texture = Some(Arc::clone(region.texture()));
        let (u, v, u2, v2) = region.uv();
        self.uv(u, v, u2, v2)
    }

    /// UV window the polygon's bounding box is mapped onto.
    pub fn uv(&mut self, u: f32, v: f32, u2: f32, v2: f32) -> &mut Self {
        self.u = u;
        self.v = v;
        self.u2 = u2;
        self.v2 = v2;
        self
    }

    /// Position of the polygon's local origin.
    pub fn position(&mut self, x: f32, y: f32) -> &mut Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Origin for rotation and scaling, in polygon-local units.
    pub fn origin(&mut self, x: f32, y: f32) -> &mut Self {
        self.origin_x = x;
        self.origin_y = y;
        self
    }

    pub fn scale(&mut self, x: f32, y: f32) -> &mut Self {
        self.scale_x = x;
        self.scale_y = y;
        self
    }

    /// Rotation in degrees, counter-clockwise about the origin.
    pub fn rotation(&mut self, degrees: f32) -> &mut Self {
        self.rotation = degrees;
        self
    }

    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color.packed();
        self
    }

    pub fn packed_color(&mut self, packed: f32) -> &mut Self {
        self.color = packed;
        self
    }

    fn counts(&self) -> (usize, usize) {
        match &self.polygon {
            Some(polygon) => (polygon.vertex_count(), polygon.triangle_count()),
            None => (0, 0),
        }
    }
}

impl Batchable for Poly2 {
    fn attributes(&self) -> Vec<VertexAttribute> {
        attributes::standard_attributes(2, 1)
    }

    fn texture_count(&self) -> usize {
        1
    }

    fn prepare_shared_context(&self, context: &mut RenderContextAccumulator) {
        context.request_depth_mask(false);
    }

    fn prepare_context(
        &self,
        context: &mut RenderContextAccumulator,
        remaining_vertices: usize,
        remaining_triangles: usize,
    ) -> bool {
        let mut changed = false;
        if let Some(texture) = &self.texture {
            changed |= context.request_texture_unit(texture, 0);
        }
        // Room is measured against this polygon's own counts, which differ
        // item to item.
        let (vertices, triangles) = self.counts();
        changed || remaining_vertices < vertices || remaining_triangles < triangles
    }

    fn apply_vertices(&self, out: &mut [f32], offsets: &AttributeOffsets, stride: usize) -> usize {
        let Some(polygon) = &self.polygon else {
            return 0;
        };

        let position = offsets.offset_of_index(0);
        let color = offsets.offset_of_index(1);
        let tex_coord = offsets.offset_of_index(2);

        let (min_x, min_y, width, height) = polygon.bounds();
        let inv_w = if width > 0.0 { 1.0 / width } else { 0.0 };
        let inv_h = if height > 0.0 { 1.0 / height } else { 0.0 };
        let world_x = self.x + self.origin_x;
        let world_y = self.y + self.origin_y;
        let cos_sin = if self.rotation != 0.0 {
            let radians = self.rotation.to_radians();
            Some((radians.cos(), radians.sin()))
        } else {
            None
        };

        for (index, pair) in polygon.points().chunks_exact(2).enumerate() {
            let lx = (pair[0] - self.origin_x) * self.scale_x;
            let ly = (pair[1] - self.origin_y) * self.scale_y;
            let (px, py) = match cos_sin {
                Some((cos, sin)) => (cos * lx - sin * ly, sin * lx + cos * ly),
                None => (lx, ly),
            };
            // Normalized bounding-box position, with v growing downward.
            let nx = (pair[0] - min_x) * inv_w;
            let ny = (pair[1] - min_y) * inv_h;

            let base = index * stride;
            out[base + position] = world_x + px;
            out[base + position + 1] = world_y + py;
            out[base + color] = self.color;
            out[base + tex_coord] = self.u + nx * (self.u2 - self.u);
            out[base + tex_coord + 1] = self.v2 - ny * (self.v2 - self.v);
        }
        polygon.vertex_count()
    }

    fn apply_indices(&self, out: &mut [u16], first_vertex: u16) -> usize {
        let Some(polygon) = &self.polygon else {
            return 0;
        };
        for (slot, &index) in out.iter_mut().zip(polygon.triangles()) {
            *slot = index + first_vertex;
        }
        polygon.triangle_count()
    }

    fn refresh(&mut self) {
        self.x = 0.0;
        self.y = 0.0;
        self.origin_x = 0.0;
        self.origin_y = 0.0;
        self.scale_x = 1.0;
        self.scale_y = 1.0;
        self.rotation = 0.0;
        self.color = WHITE_PACKED;
        self.u = 0.0;
        self.v = 0.0;
        self.u2 = 1.0;
        self.v2 = 1.0;
    }

    fn reset(&mut self) {
        self.refresh();
        self.polygon = None;
        self.texture = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{standard_attributes, VertexLayout};

    fn triangle() -> Arc<Polygon> {
        Arc::new(Polygon::new(vec![0.0, 0.0, 4.0, 0.0, 4.0, 2.0], vec![0, 1, 2]).unwrap())
    }

    fn layout() -> (usize, AttributeOffsets) {
        let layout = VertexLayout::new(standard_attributes(2, 1)).unwrap();
        (layout.stride(), AttributeOffsets::new(&layout))
    }

    #[test]
    fn rejects_bad_data() {
        assert_eq!(
            Polygon::new(vec![0.0; 5], vec![0, 1, 2]).unwrap_err(),
            PolygonError::OddCoordinateCount { count: 5 }
        );
        assert_eq!(
            Polygon::new(vec![0.0; 4], vec![0, 1, 2]).unwrap_err(),
            PolygonError::TooFewPoints { count: 2 }
        );
        assert_eq!(
            Polygon::new(vec![0.0; 6], vec![0, 1]).unwrap_err(),
            PolygonError::BadTriangleCount { count: 2 }
        );
        assert_eq!(
            Polygon::new(vec![0.0; 6], vec![]).unwrap_err(),
            PolygonError::BadTriangleCount { count: 0 }
        );
        assert_eq!(
            Polygon::new(vec![0.0; 6], vec![0, 1, 3]).unwrap_err(),
            PolygonError::IndexOutOfRange { index: 3, points: 3 }
        );
    }

    #[test]
    fn computes_bounds() {
        let polygon = Polygon::new(vec![-1.0, 2.0, 3.0, 2.0, 3.0, 8.0], vec![0, 1, 2]).unwrap();
        assert_eq!(polygon.bounds(), (-1.0, 2.0, 4.0, 6.0));
        assert_eq!(polygon.vertex_count(), 3);
        assert_eq!(polygon.triangle_count(), 1);
    }

    #[test]
    fn maps_bounds_onto_uv_window() {
        let (stride, offsets) = layout();
        let mut poly = Poly2::new();
        poly.polygon(triangle());
        let mut out = vec![0.0; 3 * stride];
        assert_eq!(poly.apply_vertices(&mut out, &offsets, stride), 3);
        let tc = offsets.offset_of_index(2);
        // Bottom-left of the bounds samples (0, 1), top-right samples (1, 0).
        assert_eq!(&out[tc..tc + 2], &[0.0, 1.0]);
        assert_eq!(&out[2 * stride + tc..2 * stride + tc + 2], &[1.0, 0.0]);
    }

    #[test]
    fn transform_matches_quads() {
        let (stride, offsets) = layout();
        let mut poly = Poly2::new();
        poly.polygon(triangle()).position(10.0, 20.0).scale(2.0, 2.0);
        let mut out = vec![0.0; 3 * stride];
        poly.apply_vertices(&mut out, &offsets, stride);
        // Point (4, 2) scales about the origin then translates.
        assert_eq!(&out[2 * stride..2 * stride + 2], &[18.0, 24.0]);
    }

    #[test]
    fn indices_are_rebased() {
        let poly = {
            let mut poly = Poly2::new();
            poly.polygon(triangle());
            poly
        };
        let mut out = [0u16; 3];
        assert_eq!(poly.apply_indices(&mut out, 10), 1);
        assert_eq!(out, [10, 11, 12]);
    }

    #[test]
    fn without_a_polygon_nothing_is_written() {
        let (stride, offsets) = layout();
        let poly = Poly2::new();
        let mut vertices = vec![7.0; stride];
        assert_eq!(poly.apply_vertices(&mut vertices, &offsets, stride), 0);
        assert_eq!(vertices, vec![7.0; stride]);
        let mut indices = [9u16; 3];
        assert_eq!(poly.apply_indices(&mut indices, 0), 0);
        assert_eq!(indices, [9, 9, 9]);
    }

    #[test]
    fn room_is_checked_against_this_polygons_counts() {
        let mut accumulator = RenderContextAccumulator::new();
        let mut poly = Poly2::new();
        poly.polygon(triangle());
        assert!(!poly.prepare_context(&mut accumulator, 3, 1));
        assert!(poly.prepare_context(&mut accumulator, 2, 1));
        assert!(poly.prepare_context(&mut accumulator, 3, 0));
    }

    #[test]
    fn refresh_keeps_the_shape_reset_drops_it() {
        let shape = triangle();
        let mut poly = Poly2::new();
        poly.polygon(Arc::clone(&shape)).rotation(45.0);
        poly.refresh();
        assert_eq!(Arc::strong_count(&shape), 2);
        poly.reset();
        assert_eq!(Arc::strong_count(&shape), 1);
    }
}
