//! The item contract: what a drawable kind must provide to be batched.
//!
//! A batch engine is generic over one concrete item kind. The kind declares
//! its vertex layout, requests the GPU state it needs through the
//! accumulator, and writes its own vertices (and, for variable-size kinds,
//! its own rebased indices) into the shared buffers. Fixed-size kinds
//! additionally expose constant per-item counts and an index template,
//! which lets the engine upload indices once and skip per-item index
//! generation entirely.
//!
//! Kinds are plain mutable structs. The engine keeps one internal instance
//! as a reusable flyweight (handed out by `draw()`); any other instance can
//! be queued through `draw_item`.

mod poly;
mod quad;

pub use poly::{Poly2, Polygon, PolygonError};
pub use quad::{Quad2, Quad3, SolidQuad2};

use crate::attributes::{AttributeOffsets, VertexAttribute};
use crate::context::RenderContextAccumulator;

/// A drawable item kind.
pub trait Batchable {
    /// The ordered vertex layout of this kind. Must be deterministic: every
    /// instance of the same concrete kind declares the same attributes.
    fn attributes(&self) -> Vec<VertexAttribute>;

    /// Number of texture units this kind draws with; the engine uploads one
    /// sampler uniform per unit.
    fn texture_count(&self) -> usize;

    /// Session-wide state requests shared by every item of this kind.
    /// Called once per session, at `begin()`. The default requests nothing.
    fn prepare_shared_context(&self, context: &mut RenderContextAccumulator) {
        let _ = context;
    }

    /// Per-item state requests plus the flush decision.
    ///
    /// `remaining_vertices` and `remaining_triangles` are whole free slots
    /// in the engine's buffers. Returns true if the engine must flush
    /// before this item is written, either because a state request changed
    /// the pending context or because the item does not fit in what
    /// remains.
    fn prepare_context(
        &self,
        context: &mut RenderContextAccumulator,
        remaining_vertices: usize,
        remaining_triangles: usize,
    ) -> bool;

    /// Write vertex data into `out`, which starts at this item's first
    /// vertex and is `stride` floats per vertex. Attribute positions come
    /// from `offsets`. Returns the number of vertices written.
    fn apply_vertices(&self, out: &mut [f32], offsets: &AttributeOffsets, stride: usize) -> usize;

    /// Write triangle indices into `out`, rebased by `first_vertex` (the
    /// number of vertices already in the buffer before this item). Returns
    /// the number of triangles written.
    ///
    /// Only variable-size kinds implement this; fixed-size kinds use the
    /// engine's index template and keep the default.
    fn apply_indices(&self, out: &mut [u16], first_vertex: u16) -> usize {
        let _ = (out, first_vertex);
        0
    }

    /// Reset per-draw state while keeping expensive references (textures,
    /// polygon data). Called on the flyweight before every `draw()`.
    fn refresh(&mut self);

    /// Full reset, dropping held references. Called at session end.
    fn reset(&mut self);
}

/// A kind whose every instance occupies the same number of vertices and
/// triangles, enabling a one-time index template.
pub trait FixedSizeBatchable: Batchable {
    /// Vertices each item occupies.
    const VERTICES_PER_ITEM: usize;
    /// Triangles each item occupies.
    const TRIANGLES_PER_ITEM: usize;

    /// Fill `template` with the index pattern for consecutively stored
    /// items: item `i`'s indices start at `i * TRIANGLES_PER_ITEM * 3` and
    /// reference vertices starting at `i * VERTICES_PER_ITEM`. The slice
    /// covers the whole buffer and its length is a multiple of
    /// `TRIANGLES_PER_ITEM * 3`.
    fn populate_index_template(template: &mut [u16]);
}
