//! Fixed-size quad kinds.
//!
//! [`Quad2`] is the workhorse 2D sprite quad: position/size, origin-relative
//! scale and rotation, packed color, a UV window with flip and 90° texture
//! rotation, and `TEXTURES` texture slots that all share the window.
//! [`SolidQuad2`] is the untextured alias. [`Quad3`] places a quad in 3D
//! along caller-supplied right/up axes (pass camera axes to billboard) and
//! carries per-item opaque/blended state, so mixing the two forces a flush
//! at each transition.

use std::array;
use std::mem;
use std::sync::Arc;

use glam::Vec3;

use crate::attributes::{self, AttributeOffsets, VertexAttribute};
use crate::batchable::{Batchable, FixedSizeBatchable};
use crate::color::{Color, WHITE_PACKED};
use crate::context::RenderContextAccumulator;
use crate::gpu::GpuTexture;
use crate::region::TextureRegion;

/// Corner order within a quad: bottom-left, top-left, top-right,
/// bottom-right, as two triangles (0,1,2) and (2,3,0).
fn quad_index_template(template: &mut [u16]) {
    let mut vertex = 0u16;
    for quad in template.chunks_exact_mut(6) {
        quad[0] = vertex;
        quad[1] = vertex + 1;
        quad[2] = vertex + 2;
        quad[3] = vertex + 2;
        quad[4] = vertex + 3;
        quad[5] = vertex;
        vertex += 4;
    }
}

/// A 2D textured quad with `TEXTURES` texture slots.
///
/// An untextured quad (`TEXTURES = 0`) skips the texture attributes
/// entirely; see [`SolidQuad2`]. With multiple slots every slot samples
/// through the same UV window. Texture setters on a zero-slot quad panic.
pub struct Quad2<const TEXTURES: usize = 1> {
    textures: [Option<Arc<dyn GpuTexture>>; TEXTURES],
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    size_set: bool,
    origin_x: f32,
    origin_y: f32,
    scale_x: f32,
    scale_y: f32,
    /// Degrees, counter-clockwise, about the origin.
    rotation: f32,
    color: f32,
    u: f32,
    v: f32,
    u2: f32,
    v2: f32,
    flip_x: bool,
    flip_y: bool,
    /// Quarter turns of the texture appearance, 0..=3.
    coord_rotation: u8,
}

/// An untextured 2D quad: position and packed color only.
pub type SolidQuad2 = Quad2<0>;

impl<const TEXTURES: usize> Default for Quad2<TEXTURES> {
    fn default() -> Self {
        Self {
            textures: array::from_fn(|_| None),
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            size_set: false,
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
            flip_x: false,
            flip_y: false,
            coord_rotation: 0,
        }
    }
}

impl<const TEXTURES: usize> Quad2<TEXTURES> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the texture for slot 0.
    pub fn texture(&mut self, texture: Arc<dyn GpuTexture>) -> &mut Self {
        self.texture_at(0, texture)
    }

    /// Set the texture for a specific slot.
    pub fn texture_at(&mut self, slot: usize, texture: Arc<dyn GpuTexture>) -> &mut Self {
        self.textures[slot] = Some(texture);
        self
    }

    /// Set slot 0's texture and the shared UV window from a region.
    pub fn region(&mut self, region: &TextureRegion) -> &mut Self {
        self.region_at(0, region)
    }

    /// Set a slot's texture and the shared UV window from a region.
    pub fn region_at(&mut self, slot: usize, region: &TextureRegion) -> &mut Self {
        self.textures[slot] = Some(Arc::clone(region.texture()));
        let (u, v, u2, v2) = region.uv();
        self.uv(u, v, u2, v2)
    }

    /// Set the shared UV window directly.
    pub fn uv(&mut self, u: f32, v: f32, u2: f32, v2: f32) -> &mut Self {
        self.u = u;
        self.v = v;
        self.u2 = u2;
        self.v2 = v2;
        self
    }

    /// Bottom-left corner position (before rotation and scaling).
    pub fn position(&mut self, x: f32, y: f32) -> &mut Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Quad size in world units. Unset, the size defaults to the region's
    /// pixel size.
    pub fn size(&mut self, width: f32, height: f32) -> &mut Self {
        self.width = width;
        self.height = height;
        self.size_set = true;
        self
    }

    /// Origin for rotation and scaling, relative to the bottom-left corner.
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

    /// Set the vertex color from an already packed float.
    pub fn packed_color(&mut self, packed: f32) -> &mut Self {
        self.color = packed;
        self
    }

    /// Set whether the UV window is mirrored on each axis.
    pub fn flip(&mut self, x: bool, y: bool) -> &mut Self {
        self.flip_x = x;
        self.flip_y = y;
        self
    }

    /// Rotate the texture appearance a quarter turn. Stacks; four turns
    /// return to the start.
    pub fn rotate_coordinates_90(&mut self, clockwise: bool) -> &mut Self {
        self.coord_rotation = if clockwise {
            (self.coord_rotation + 3) & 3
        } else {
            (self.coord_rotation + 1) & 3
        };
        self
    }

    fn effective_size(&self) -> (f32, f32) {
        if self.size_set {
            return (self.width, self.height);
        }
        if let Some(texture) = self.textures.iter().flatten().next() {
            (
                (self.u2 - self.u).abs() * texture.width() as f32,
                (self.v2 - self.v).abs() * texture.height() as f32,
            )
        } else {
            (self.width, self.height)
        }
    }
}

impl<const TEXTURES: usize> Batchable for Quad2<TEXTURES> {
    fn attributes(&self) -> Vec<VertexAttribute> {
        attributes::standard_attributes(2, TEXTURES)
    }

    fn texture_count(&self) -> usize {
        TEXTURES
    }

    fn prepare_shared_context(&self, context: &mut RenderContextAccumulator) {
        // 2D quads blend over whatever is behind them; they never write depth.
        context.request_depth_mask(false);
    }

    fn prepare_context(
        &self,
        context: &mut RenderContextAccumulator,
        remaining_vertices: usize,
        _remaining_triangles: usize,
    ) -> bool {
        let mut changed = false;
        for (slot, texture) in self.textures.iter().enumerate() {
            if let Some(texture) = texture {
                changed |= context.request_texture_unit(texture, slot);
            }
        }
        changed || remaining_vertices < Self::VERTICES_PER_ITEM
    }

    fn apply_vertices(&self, out: &mut [f32], offsets: &AttributeOffsets, stride: usize) -> usize {
        // Layout order is fixed by attributes(): position, color, texCoords.
        let position = offsets.offset_of_index(0);
        let color = offsets.offset_of_index(1);

        let (width, height) = self.effective_size();
        let world_x = self.x + self.origin_x;
        let world_y = self.y + self.origin_y;
        let cos_sin = if self.rotation != 0.0 {
            let radians = self.rotation.to_radians();
            Some((radians.cos(), radians.sin()))
        } else {
            None
        };

        let (mut u, mut v, mut u2, mut v2) = (self.u, self.v, self.u2, self.v2);
        if self.flip_x {
            mem::swap(&mut u, &mut u2);
        }
        if self.flip_y {
            mem::swap(&mut v, &mut v2);
        }
        let uv4 = [(u, v2), (u, v), (u2, v), (u2, v2)];

        let corners = [(0.0, 0.0), (0.0, height), (width, height), (width, 0.0)];
        for (corner, &(cx, cy)) in corners.iter().enumerate() {
            let lx = (cx - self.origin_x) * self.scale_x;
            let ly = (cy - self.origin_y) * self.scale_y;
            let (px, py) = match cos_sin {
                Some((cos, sin)) => (cos * lx - sin * ly, sin * lx + cos * ly),
                None => (lx, ly),
            };
            let base = corner * stride;
            out[base + position] = world_x + px;
            out[base + position + 1] = world_y + py;
            out[base + color] = self.color;
            let (cu, cv) = uv4[(corner + self.coord_rotation as usize) & 3];
            for slot in 0..TEXTURES {
                let tc = offsets.offset_of_index(2 + slot);
                out[base + tc] = cu;
                out[base + tc + 1] = cv;
            }
        }
        Self::VERTICES_PER_ITEM
    }

    fn refresh(&mut self) {
        self.x = 0.0;
        self.y = 0.0;
        self.width = 0.0;
        self.height = 0.0;
        self.size_set = false;
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
        self.flip_x = false;
        self.flip_y = false;
        self.coord_rotation = 0;
    }

    fn reset(&mut self) {
        self.refresh();
        for slot in &mut self.textures {
            *slot = None;
        }
    }
}

impl<const TEXTURES: usize> FixedSizeBatchable for Quad2<TEXTURES> {
    const VERTICES_PER_ITEM: usize = 4;
    const TRIANGLES_PER_ITEM: usize = 2;

    fn populate_index_template(template: &mut [u16]) {
        quad_index_template(template);
    }
}

/// A quad positioned in 3D, centered on `position` and spanned by the
/// `right`/`up` axes.
///
/// Passing a camera's right and up axes to [`Quad3::orient`] billboards
/// the quad. Each item is either opaque (blending off, depth writes on) or
/// blended (blending on, depth writes off); the state is requested through
/// the accumulator per item, so runs of the same mode batch together and a
/// mode change flushes.
pub struct Quad3 {
    texture: Option<Arc<dyn GpuTexture>>,
    position: Vec3,
    right: Vec3,
    up: Vec3,
    width: f32,
    height: f32,
    size_set: bool,
    color: f32,
    u: f32,
    v: f32,
    u2: f32,
    v2: f32,
    opaque: bool,
}

impl Default for Quad3 {
    fn default() -> Self {
        Self {
            texture: None,
            position: Vec3::ZERO,
            right: Vec3::X,
            up: Vec3::Y,
            width: 0.0,
            height: 0.0,
            size_set: false,
            color: WHITE_PACKED,
            u: 0.0,
            v: 0.0,
            u2: 1.0,
            v2: 1.0,
            opaque: false,
        }
    }
}

impl Quad3 {
    pub fn new() -> Self {
        Self::default()
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

    pub fn uv(&mut self, u: f32, v: f32, u2: f32, v2: f32) -> &mut Self {
        self.u = u;
        self.v = v;
        self.u2 = u2;
        self.v2 = v2;
        self
    }

    /// Center position.
    pub fn position(&mut self, position: impl Into<Vec3>) -> &mut Self {
        self.position = position.into();
        self
    }

    /// Span axes; expected to be unit length and orthogonal. Pass a
    /// camera's right and up vectors to billboard.
    pub fn orient(&mut self, right: Vec3, up: Vec3) -> &mut Self {
        self.right = right;
        self.up = up;
        self
    }

    pub fn size(&mut self, width: f32, height: f32) -> &mut Self {
        self.width = width;
        self.height = height;
        self.size_set = true;
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

    /// Draw without blending and write depth.
    pub fn opaque(&mut self) -> &mut Self {
        self.opaque = true;
        self
    }

    /// Draw blended and leave depth untouched (the default).
    pub fn blended(&mut self) -> &mut Self {
        self.opaque = false;
        self
    }

    fn effective_size(&self) -> (f32, f32) {
        if self.size_set {
            return (self.width, self.height);
        }
        if let Some(texture) = &self.texture {
            (
                (self.u2 - self.u).abs() * texture.width() as f32,
                (self.v2 - self.v).abs() * texture.height() as f32,
            )
        } else {
            (self.width, self.height)
        }
    }
}

impl Batchable for Quad3 {
    fn attributes(&self) -> Vec<VertexAttribute> {
        attributes::standard_attributes(3, 1)
    }

    fn texture_count(&self) -> usize {
        1
    }

    fn prepare_context(
        &self,
        context: &mut RenderContextAccumulator,
        remaining_vertices: usize,
        _remaining_triangles: usize,
    ) -> bool {
        let mut changed = false;
        if let Some(texture) = &self.texture {
            changed |= context.request_texture_unit(texture, 0);
        }
        changed |= context.request_blending(!self.opaque);
        changed |= context.request_depth_mask(self.opaque);
        changed || remaining_vertices < Self::VERTICES_PER_ITEM
    }

    fn apply_vertices(&self, out: &mut [f32], offsets: &AttributeOffsets, stride: usize) -> usize {
        let position = offsets.offset_of_index(0);
        let color = offsets.offset_of_index(1);
        let tex_coord = offsets.offset_of_index(2);

        let (width, height) = self.effective_size();
        let half_right = self.right * (width * 0.5);
        let half_up = self.up * (height * 0.5);
        let corners = [
            self.position - half_right - half_up,
            self.position - half_right + half_up,
            self.position + half_right + half_up,
            self.position + half_right - half_up,
        ];
        let uv4 = [
            (self.u, self.v2),
            (self.u, self.v),
            (self.u2, self.v),
            (self.u2, self.v2),
        ];

        for (corner, point) in corners.iter().enumerate() {
            let base = corner * stride;
            out[base + position] = point.x;
            out[base + position + 1] = point.y;
            out[base + position + 2] = point.z;
            out[base + color] = self.color;
            let (cu, cv) = uv4[corner];
            out[base + tex_coord] = cu;
            out[base + tex_coord + 1] = cv;
        }
        Self::VERTICES_PER_ITEM
    }

    fn refresh(&mut self) {
        self.position = Vec3::ZERO;
        self.right = Vec3::X;
        self.up = Vec3::Y;
        self.width = 0.0;
        self.height = 0.0;
        self.size_set = false;
        self.color = WHITE_PACKED;
        self.u = 0.0;
        self.v = 0.0;
        self.u2 = 1.0;
        self.v2 = 1.0;
        self.opaque = false;
    }

    fn reset(&mut self) {
        self.refresh();
        self.texture = None;
    }
}

impl FixedSizeBatchable for Quad3 {
    const VERTICES_PER_ITEM: usize = 4;
    const TRIANGLES_PER_ITEM: usize = 2;

    fn populate_index_template(template: &mut [u16]) {
        quad_index_template(template);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::standard_attributes;
    use crate::attributes::VertexLayout;

    struct Stub {
        width: u32,
        height: u32,
    }

    impl GpuTexture for Stub {
        fn bind(&self, _unit: usize) {}

        fn width(&self) -> u32 {
            self.width
        }

        fn height(&self) -> u32 {
            self.height
        }
    }

    fn stub(width: u32, height: u32) -> Arc<dyn GpuTexture> {
        Arc::new(Stub { width, height })
    }

    fn layout_for<const N: usize>() -> (VertexLayout, AttributeOffsets) {
        let layout = VertexLayout::new(standard_attributes(2, N)).unwrap();
        let offsets = AttributeOffsets::new(&layout);
        (layout, offsets)
    }

    fn corner_positions(out: &[f32], stride: usize) -> Vec<(f32, f32)> {
        (0..4).map(|c| (out[c * stride], out[c * stride + 1])).collect()
    }

    #[test]
    fn unrotated_corners() {
        let (layout, offsets) = layout_for::<0>();
        let stride = layout.stride();
        let mut quad = SolidQuad2::new();
        quad.position(10.0, 20.0).size(4.0, 2.0);
        let mut out = vec![0.0; 4 * stride];
        assert_eq!(quad.apply_vertices(&mut out, &offsets, stride), 4);
        assert_eq!(
            corner_positions(&out, stride),
            vec![(10.0, 20.0), (10.0, 22.0), (14.0, 22.0), (14.0, 20.0)]
        );
    }

    #[test]
    fn rotation_is_counter_clockwise_about_origin() {
        let (layout, offsets) = layout_for::<0>();
        let stride = layout.stride();
        let mut quad = SolidQuad2::new();
        quad.position(0.0, 0.0).size(2.0, 1.0).rotation(90.0);
        let mut out = vec![0.0; 4 * stride];
        quad.apply_vertices(&mut out, &offsets, stride);
        let corners = corner_positions(&out, stride);
        // Bottom-right corner (2, 0) rotates to (0, 2).
        assert!((corners[3].0 - 0.0).abs() < 1e-4);
        assert!((corners[3].1 - 2.0).abs() < 1e-4);
    }

    #[test]
    fn scaling_happens_about_the_origin() {
        let (layout, offsets) = layout_for::<0>();
        let stride = layout.stride();
        let mut quad = SolidQuad2::new();
        quad.position(0.0, 0.0).size(2.0, 2.0).origin(1.0, 1.0).scale(2.0, 2.0);
        let mut out = vec![0.0; 4 * stride];
        quad.apply_vertices(&mut out, &offsets, stride);
        // The center stays put; the bottom-left corner moves out to (-1, -1).
        assert_eq!(corner_positions(&out, stride)[0], (-1.0, -1.0));
    }

    #[test]
    fn flip_mirrors_the_uv_window() {
        let (layout, offsets) = layout_for::<1>();
        let stride = layout.stride();
        let mut quad = Quad2::<1>::new();
        quad.texture(stub(8, 8)).size(1.0, 1.0).flip(true, false);
        let mut out = vec![0.0; 4 * stride];
        quad.apply_vertices(&mut out, &offsets, stride);
        let tc = offsets.offset_of_index(2);
        // Bottom-left corner now samples from u2 (= 1.0).
        assert_eq!(out[tc], 1.0);
        assert_eq!(out[tc + 1], 1.0);
    }

    #[test]
    fn clockwise_coordinate_rotation_moves_the_image_origin() {
        let (layout, offsets) = layout_for::<1>();
        let stride = layout.stride();
        let mut quad = Quad2::<1>::new();
        quad.texture(stub(8, 8)).size(1.0, 1.0).rotate_coordinates_90(true);
        let mut out = vec![0.0; 4 * stride];
        quad.apply_vertices(&mut out, &offsets, stride);
        let tc = offsets.offset_of_index(2);
        // After one clockwise turn the top-right corner shows the image's
        // top-left texel.
        let top_right = 2 * stride + tc;
        assert_eq!(out[top_right], 0.0);
        assert_eq!(out[top_right + 1], 0.0);
        // Four turns cancel out.
        quad.rotate_coordinates_90(true)
            .rotate_coordinates_90(true)
            .rotate_coordinates_90(true);
        quad.apply_vertices(&mut out, &offsets, stride);
        assert_eq!(out[tc], 0.0);
        assert_eq!(out[tc + 1], 1.0);
    }

    #[test]
    fn size_defaults_to_region_pixels() {
        let (layout, offsets) = layout_for::<1>();
        let stride = layout.stride();
        let mut quad = Quad2::<1>::new();
        let texture = stub(64, 32);
        quad.region(&TextureRegion::from_pixels(texture, 0, 0, 16, 8));
        let mut out = vec![0.0; 4 * stride];
        quad.apply_vertices(&mut out, &offsets, stride);
        // Top-right corner lands at the region's pixel size.
        assert_eq!(corner_positions(&out, stride)[2], (16.0, 8.0));
    }

    #[test]
    fn refresh_keeps_textures_reset_drops_them() {
        let texture = stub(8, 8);
        let mut quad = Quad2::<1>::new();
        quad.texture(Arc::clone(&texture)).position(5.0, 5.0);
        quad.refresh();
        assert_eq!(Arc::strong_count(&texture), 2);
        quad.reset();
        assert_eq!(Arc::strong_count(&texture), 1);
    }

    #[test]
    fn index_template_tiles_quads() {
        let mut template = [0u16; 12];
        Quad2::<1>::populate_index_template(&mut template);
        assert_eq!(template, [0, 1, 2, 2, 3, 0, 4, 5, 6, 6, 7, 4]);
    }

    #[test]
    fn quad3_spans_its_axes() {
        let layout = VertexLayout::new(standard_attributes(3, 1)).unwrap();
        let offsets = AttributeOffsets::new(&layout);
        let stride = layout.stride();
        let mut quad = Quad3::new();
        quad.position(Vec3::new(0.0, 0.0, 5.0)).size(2.0, 4.0);
        let mut out = vec![0.0; 4 * stride];
        assert_eq!(quad.apply_vertices(&mut out, &offsets, stride), 4);
        // Bottom-left corner: center - right - 2*up.
        assert_eq!(&out[0..3], &[-1.0, -2.0, 5.0]);
        // Top-right corner.
        assert_eq!(&out[2 * stride..2 * stride + 3], &[1.0, 2.0, 5.0]);
    }

    #[test]
    fn quad3_requests_its_blend_mode() {
        let mut accumulator = RenderContextAccumulator::new();
        let mut quad = Quad3::new();
        quad.opaque();
        // Fresh accumulator starts blending-off/depth-on, so an opaque item
        // changes nothing and a blended one changes both.
        assert!(!quad.prepare_context(&mut accumulator, 100, 100));
        assert!(!accumulator.blending_enabled());
        assert!(accumulator.depth_mask());

        quad.blended();
        assert!(quad.prepare_context(&mut accumulator, 100, 100));
        assert!(accumulator.blending_enabled());
        assert!(!accumulator.depth_mask());
    }
}
