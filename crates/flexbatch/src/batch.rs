//! The batching engine.
//!
//! A [`FlexBatch`] accumulates items into a shared vertex/index buffer pair
//! and turns them into as few indexed-triangle draw calls as possible. State
//! changes (textures, blending, depth mask) are requested per item through a
//! [`RenderContextAccumulator`]; a request that changes pending state forces
//! the buffered content out first, so every draw call renders under the
//! state that was current when its content was queued.
//!
//! The engine is generic over one [`Batchable`] item kind, fixed at
//! construction together with the indexing mode: [`FlexBatch::fixed`] for
//! kinds with a constant shape (quads), where the index pattern is uploaded
//! once, and [`FlexBatch::variable`] for kinds that bring their own indices
//! (polygons), re-uploaded each flush.

use std::error::Error;
use std::fmt;
use std::mem;

use glam::Mat4;

use crate::attributes::{AttributeOffsets, LayoutError, VertexLayout};
use crate::batchable::{Batchable, FixedSizeBatchable};
use crate::context::{BlendFunction, RenderContextAccumulator};
use crate::gpu::{
    self, GpuMesh, GpuShader, MeshDescriptor, RenderStates, PROJ_TRANS_UNIFORM,
};

/// Largest vertex capacity a batch can be built with. Indices are 16-bit
/// and the limit keeps them valid for signed-index pipelines too.
pub const MAX_VERTICES: usize = 32767;

/// Rejected batch configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The item kind declares an unusable vertex layout.
    Layout(LayoutError),
    /// Vertex capacity above [`MAX_VERTICES`].
    TooManyVertices { requested: usize },
    /// A zero vertex or triangle capacity.
    ZeroCapacity,
    /// Fixed-size capacity rounds down below a single item.
    CapacityTooSmall { item_vertices: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Layout(error) => write!(f, "invalid vertex layout: {error}"),
            Self::TooManyVertices { requested } => {
                write!(f, "a batch is limited to {MAX_VERTICES} vertices, requested {requested}")
            }
            Self::ZeroCapacity => write!(f, "batch capacity must be nonzero"),
            Self::CapacityTooSmall { item_vertices } => {
                write!(f, "capacity rounds below a single {item_vertices}-vertex item")
            }
        }
    }
}

impl Error for ConfigError {}

impl From<LayoutError> for ConfigError {
    fn from(error: LayoutError) -> Self {
        Self::Layout(error)
    }
}

fn check_vertex_capacity(max_vertices: usize) -> Result<(), ConfigError> {
    if max_vertices == 0 {
        return Err(ConfigError::ZeroCapacity);
    }
    if max_vertices > MAX_VERTICES {
        return Err(ConfigError::TooManyVertices { requested: max_vertices });
    }
    Ok(())
}

/// How indices for queued items are produced.
enum IndexStore {
    /// A pattern for a constant item shape, uploaded once at construction.
    /// Only the draw range changes per flush.
    Template {
        vertices_per_item: usize,
        triangles_per_item: usize,
    },
    /// Item-supplied indices, rebased as items are queued and re-uploaded
    /// each flush.
    Dynamic { indices: Vec<u16> },
}

/// A draw-call batcher for one item kind.
///
/// Typical frame:
///
/// ```ignore
/// batch.begin();
/// batch.draw().region(&sprite).position(40.0, 8.0);
/// batch.draw().region(&sprite).position(90.0, 8.0).rotation(45.0);
/// batch.end();
/// ```
///
/// [`FlexBatch::draw`] hands out the batch's internal item for in-place
/// configuration; it is queued automatically on the next engine call. The
/// returned borrow cannot outlive that call, so a stale handle is a compile
/// error rather than corrupted output.
pub struct FlexBatch<T: Batchable> {
    item: T,
    item_pending: bool,
    inner: Inner,
}

struct Inner {
    layout: VertexLayout,
    offsets: AttributeOffsets,
    stride: usize,
    /// Whole vertex slots.
    max_vertices: usize,
    max_triangles: usize,
    vertices: Vec<f32>,
    /// Floats written so far this batch.
    vertex_cursor: usize,
    /// Indices queued so far this batch.
    index_cursor: usize,
    index_store: IndexStore,
    context: RenderContextAccumulator,
    mesh: Box<dyn GpuMesh>,
    shader: Box<dyn GpuShader>,
    states: Box<dyn RenderStates>,
    projection: Mat4,
    transform: Mat4,
    texture_uniforms: Vec<String>,
    active: bool,
    render_calls: usize,
    total_render_calls: usize,
}

impl<T: FixedSizeBatchable> FlexBatch<T> {
    /// Build a batch for a fixed-size item kind.
    ///
    /// `max_vertices` is rounded down to a whole number of items; the
    /// triangle capacity follows from it. The index pattern is generated
    /// and uploaded once here. `template` becomes the internal item served
    /// by [`FlexBatch::draw`], and its attributes define the vertex layout.
    pub fn fixed<F>(
        template: T,
        max_vertices: usize,
        shader: Box<dyn GpuShader>,
        states: Box<dyn RenderStates>,
        mesh_factory: F,
    ) -> Result<Self, ConfigError>
    where
        F: FnOnce(&MeshDescriptor<'_>) -> Box<dyn GpuMesh>,
    {
        check_vertex_capacity(max_vertices)?;
        let max_vertices = max_vertices - max_vertices % T::VERTICES_PER_ITEM;
        if max_vertices == 0 {
            return Err(ConfigError::CapacityTooSmall { item_vertices: T::VERTICES_PER_ITEM });
        }
        let layout = VertexLayout::new(template.attributes())?;
        let max_triangles = max_vertices / T::VERTICES_PER_ITEM * T::TRIANGLES_PER_ITEM;

        let mut template_indices = vec![0u16; max_triangles * 3];
        T::populate_index_template(&mut template_indices);

        let mut inner = Inner::new(
            layout,
            max_vertices,
            max_triangles,
            IndexStore::Template {
                vertices_per_item: T::VERTICES_PER_ITEM,
                triangles_per_item: T::TRIANGLES_PER_ITEM,
            },
            template.texture_count(),
            shader,
            states,
            mesh_factory,
        );
        inner.mesh.set_indices(&template_indices);
        tracing::debug!(
            "Fixed-size batch created: {} vertices, {} triangles, stride {}",
            max_vertices,
            max_triangles,
            inner.stride
        );
        Ok(Self { item: template, item_pending: false, inner })
    }
}

impl<T: Batchable> FlexBatch<T> {
    /// Build a batch for a variable-size item kind.
    ///
    /// The caller supplies both capacities; items report their own vertex
    /// and triangle counts and the index buffer is re-uploaded each flush.
    pub fn variable<F>(
        template: T,
        max_vertices: usize,
        max_triangles: usize,
        shader: Box<dyn GpuShader>,
        states: Box<dyn RenderStates>,
        mesh_factory: F,
    ) -> Result<Self, ConfigError>
    where
        F: FnOnce(&MeshDescriptor<'_>) -> Box<dyn GpuMesh>,
    {
        check_vertex_capacity(max_vertices)?;
        if max_triangles == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        let layout = VertexLayout::new(template.attributes())?;
        let inner = Inner::new(
            layout,
            max_vertices,
            max_triangles,
            IndexStore::Dynamic { indices: vec![0; max_triangles * 3] },
            template.texture_count(),
            shader,
            states,
            mesh_factory,
        );
        tracing::debug!(
            "Variable-size batch created: {} vertices, {} triangles, stride {}",
            max_vertices,
            max_triangles,
            inner.stride
        );
        Ok(Self { item: template, item_pending: false, inner })
    }

    /// Start a drawing session.
    ///
    /// Binds the shader, applies the combined matrix and texture-unit
    /// uniforms, and lets the item kind request its session-wide state.
    pub fn begin(&mut self) {
        assert!(!self.inner.active, "end() must be called before begin()");
        self.inner.render_calls = 0;
        self.inner.context.begin_session();
        self.item.prepare_shared_context(&mut self.inner.context);
        self.inner.shader.bind();
        self.inner.apply_matrices();
        self.inner.apply_texture_uniforms();
        self.inner.active = true;
    }

    /// End the session: flush remaining content, release texture handles,
    /// reset the internal item, unbind the shader.
    pub fn end(&mut self) {
        assert!(self.inner.active, "begin() must be called before end()");
        self.commit_pending();
        self.inner.flush();
        self.inner.active = false;
        self.inner.context.end_session();
        self.item.reset();
        self.inner.shader.unbind();
    }

    /// Hand out the internal item for configuration.
    ///
    /// The item is refreshed first and queued automatically on the next
    /// call into the engine (another draw, [`flush`](Self::flush) or
    /// [`end`](Self::end)).
    pub fn draw(&mut self) -> &mut T {
        assert!(self.inner.active, "begin() must be called before drawing");
        self.commit_pending();
        self.item.refresh();
        self.item_pending = true;
        &mut self.item
    }

    /// Queue a caller-owned item.
    pub fn draw_item(&mut self, item: &T) {
        assert!(self.inner.active, "begin() must be called before drawing");
        self.commit_pending();
        self.inner.enqueue(item);
    }

    /// Queue pre-built vertex data for a fixed-size batch, using `item`
    /// only for its textures and state requests.
    ///
    /// `source_stride` is the float count per vertex in `vertices`; it may
    /// be smaller than the batch stride, in which case each vertex fills
    /// the front of its slot and the trailing floats keep whatever data
    /// was last in the buffer (acceptable when the shader ignores them).
    /// Data larger than remaining capacity is split across flushes at item
    /// boundaries.
    pub fn draw_raw(&mut self, item: &T, vertices: &[f32], source_stride: usize) {
        assert!(self.inner.active, "begin() must be called before drawing");
        self.commit_pending();
        self.inner.enqueue_raw(item, vertices, source_stride);
    }

    /// Queue pre-built vertex and index data for a variable-size batch.
    ///
    /// `triangles` indexes the supplied vertices from zero and is rebased
    /// on copy. The submission is not split: it flushes first when it does
    /// not fit the remaining room and panics when it cannot fit the batch
    /// at all.
    pub fn draw_raw_indexed(
        &mut self,
        item: &T,
        vertices: &[f32],
        source_stride: usize,
        triangles: &[u16],
    ) {
        assert!(self.inner.active, "begin() must be called before drawing");
        self.commit_pending();
        self.inner.enqueue_raw_indexed(item, vertices, source_stride, triangles);
    }

    /// Draw all queued content now.
    ///
    /// With nothing queued this only executes pending state changes, so the
    /// next content still renders under the requested state; it does not
    /// count as a render call.
    pub fn flush(&mut self) {
        assert!(self.inner.active, "begin() must be called before flush()");
        self.commit_pending();
        self.inner.flush();
    }

    /// Swap the shader and return the previous one. While drawing, queued
    /// content flushes under the old shader first and the uniforms are
    /// reapplied to the new one.
    pub fn set_shader(&mut self, shader: Box<dyn GpuShader>) -> Box<dyn GpuShader> {
        if self.inner.active {
            self.commit_pending();
            self.inner.flush();
            self.inner.shader.unbind();
        }
        let previous = mem::replace(&mut self.inner.shader, shader);
        if self.inner.active {
            self.inner.shader.bind();
            self.inner.apply_matrices();
            self.inner.apply_texture_uniforms();
        }
        previous
    }

    pub fn enable_blending(&mut self) {
        self.set_blending(true);
    }

    pub fn disable_blending(&mut self) {
        self.set_blending(false);
    }

    fn set_blending(&mut self, enabled: bool) {
        if self.inner.context.blending_enabled() == enabled {
            return;
        }
        if self.inner.active {
            self.commit_pending();
            self.inner.context.request_blending(enabled);
            // Queued content draws under the old state; the same flush then
            // executes the new request so later content is covered by it.
            self.inner.flush();
        } else {
            self.inner.context.request_blending(enabled);
        }
    }

    /// Request a blend function for subsequent content. No-op when it
    /// matches the pending function; otherwise queued content flushes under
    /// the old function first. Outside a session the request is only
    /// recorded.
    pub fn set_blend_function(&mut self, function: BlendFunction) {
        if self.inner.context.blend_function() == function {
            return;
        }
        if self.inner.active {
            self.commit_pending();
            self.inner.context.request_blend_function(function);
            self.inner.flush();
        } else {
            self.inner.context.request_blend_function(function);
        }
    }

    pub fn blending_enabled(&self) -> bool {
        self.inner.context.blending_enabled()
    }

    pub fn blend_function(&self) -> BlendFunction {
        self.inner.context.blend_function()
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.inner.projection
    }

    pub fn transform_matrix(&self) -> Mat4 {
        self.inner.transform
    }

    /// Set the projection matrix. While drawing, queued content flushes
    /// under the old matrices first.
    pub fn set_projection_matrix(&mut self, projection: Mat4) {
        if self.inner.active {
            self.commit_pending();
            self.inner.flush();
        }
        self.inner.projection = projection;
        if self.inner.active {
            self.inner.apply_matrices();
        }
    }

    /// Set the model/world transform combined with the projection.
    pub fn set_transform_matrix(&mut self, transform: Mat4) {
        if self.inner.active {
            self.commit_pending();
            self.inner.flush();
        }
        self.inner.transform = transform;
        if self.inner.active {
            self.inner.apply_matrices();
        }
    }

    pub fn shader(&self) -> &dyn GpuShader {
        self.inner.shader.as_ref()
    }

    pub fn layout(&self) -> &VertexLayout {
        &self.inner.layout
    }

    pub fn offsets(&self) -> &AttributeOffsets {
        &self.inner.offsets
    }

    /// Floats per vertex.
    pub fn stride(&self) -> usize {
        self.inner.stride
    }

    /// Vertex capacity after any fixed-size rounding.
    pub fn max_vertices(&self) -> usize {
        self.inner.max_vertices
    }

    pub fn max_triangles(&self) -> usize {
        self.inner.max_triangles
    }

    /// Whether the batch is between `begin()` and `end()`.
    pub fn is_active(&self) -> bool {
        self.inner.active
    }

    /// Draw calls issued since the last `begin()`.
    pub fn render_calls(&self) -> usize {
        self.inner.render_calls
    }

    /// Draw calls issued over the batch's lifetime.
    pub fn total_render_calls(&self) -> usize {
        self.inner.total_render_calls
    }

    fn commit_pending(&mut self) {
        if self.item_pending {
            self.item_pending = false;
            self.inner.enqueue(&self.item);
        }
    }
}

impl Inner {
    #[allow(clippy::too_many_arguments)]
    fn new<F>(
        layout: VertexLayout,
        max_vertices: usize,
        max_triangles: usize,
        index_store: IndexStore,
        texture_count: usize,
        shader: Box<dyn GpuShader>,
        states: Box<dyn RenderStates>,
        mesh_factory: F,
    ) -> Self
    where
        F: FnOnce(&MeshDescriptor<'_>) -> Box<dyn GpuMesh>,
    {
        let offsets = AttributeOffsets::new(&layout);
        let stride = layout.stride();
        let mesh = mesh_factory(&MeshDescriptor {
            layout: &layout,
            max_vertices,
            max_indices: max_triangles * 3,
        });

        let mut context = RenderContextAccumulator::new();
        context.request_blending(true);

        Self {
            vertices: vec![0.0; max_vertices * stride],
            vertex_cursor: 0,
            index_cursor: 0,
            layout,
            offsets,
            stride,
            max_vertices,
            max_triangles,
            index_store,
            context,
            mesh,
            shader,
            states,
            projection: Mat4::IDENTITY,
            transform: Mat4::IDENTITY,
            texture_uniforms: (0..texture_count).map(gpu::texture_uniform_name).collect(),
            active: false,
            render_calls: 0,
            total_render_calls: 0,
        }
    }

    fn remaining_vertices(&self) -> usize {
        self.max_vertices - self.vertex_cursor / self.stride
    }

    fn remaining_triangles(&self) -> usize {
        self.max_triangles - self.index_cursor / 3
    }

    fn enqueue<T: Batchable>(&mut self, item: &T) {
        let remaining_vertices = self.remaining_vertices();
        let remaining_triangles = self.remaining_triangles();
        if item.prepare_context(&mut self.context, remaining_vertices, remaining_triangles) {
            // The item's state requests are already pending; the flush
            // draws old content under the old state, then executes them.
            self.flush();
            // The flush emptied the buffers and left the state requests
            // pending, so a second flush demand can only mean the item is
            // larger than the batch.
            let remaining_vertices = self.remaining_vertices();
            let remaining_triangles = self.remaining_triangles();
            assert!(
                !item.prepare_context(&mut self.context, remaining_vertices, remaining_triangles),
                "item exceeds the batch capacity of {} vertices and {} triangles",
                self.max_vertices,
                self.max_triangles
            );
        }

        let first_vertex = (self.vertex_cursor / self.stride) as u16;
        let written =
            item.apply_vertices(&mut self.vertices[self.vertex_cursor..], &self.offsets, self.stride);
        self.vertex_cursor += written * self.stride;

        match &mut self.index_store {
            IndexStore::Template { triangles_per_item, .. } => {
                let step = *triangles_per_item * 3;
                self.index_cursor += step;
            }
            IndexStore::Dynamic { indices } => {
                let triangles = item.apply_indices(&mut indices[self.index_cursor..], first_vertex);
                self.index_cursor += triangles * 3;
            }
        }
    }

    fn enqueue_raw<T: Batchable>(&mut self, item: &T, data: &[f32], source_stride: usize) {
        let (vertices_per_item, triangles_per_item) = match &self.index_store {
            IndexStore::Template { vertices_per_item, triangles_per_item } => {
                (*vertices_per_item, *triangles_per_item)
            }
            IndexStore::Dynamic { .. } => {
                panic!("raw vertex submission requires a fixed-size batch")
            }
        };
        assert!(
            source_stride <= self.stride,
            "source vertex size {} exceeds the batch stride {}",
            source_stride,
            self.stride
        );
        debug_assert_eq!(
            data.len() % (vertices_per_item * source_stride),
            0,
            "vertex data must cover whole items"
        );

        let remaining_vertices = self.remaining_vertices();
        let remaining_triangles = self.remaining_triangles();
        if item.prepare_context(&mut self.context, remaining_vertices, remaining_triangles) {
            self.flush();
        }

        let mut remaining = data.len() / source_stride;
        let mut offset = 0;
        while remaining > 0 {
            if self.vertex_cursor == self.vertices.len() {
                self.flush();
            }
            let room = (self.vertices.len() - self.vertex_cursor) / self.stride;
            let chunk = room.min(remaining);
            if source_stride == self.stride {
                let floats = chunk * self.stride;
                self.vertices[self.vertex_cursor..self.vertex_cursor + floats]
                    .copy_from_slice(&data[offset..offset + floats]);
                self.vertex_cursor += floats;
                offset += floats;
            } else {
                // Narrow vertices land at stride-aligned slots; the slot
                // tails keep stale buffer data.
                for _ in 0..chunk {
                    self.vertices[self.vertex_cursor..self.vertex_cursor + source_stride]
                        .copy_from_slice(&data[offset..offset + source_stride]);
                    self.vertex_cursor += self.stride;
                    offset += source_stride;
                }
            }
            self.index_cursor += chunk / vertices_per_item * triangles_per_item * 3;
            remaining -= chunk;
        }
    }

    fn enqueue_raw_indexed<T: Batchable>(
        &mut self,
        item: &T,
        data: &[f32],
        source_stride: usize,
        triangles: &[u16],
    ) {
        assert!(
            matches!(self.index_store, IndexStore::Dynamic { .. }),
            "indexed raw submission requires a variable-size batch"
        );
        assert!(
            source_stride <= self.stride,
            "source vertex size {} exceeds the batch stride {}",
            source_stride,
            self.stride
        );
        debug_assert_eq!(data.len() % source_stride, 0, "vertex data must cover whole vertices");
        debug_assert_eq!(triangles.len() % 3, 0, "indices must cover whole triangles");

        let remaining_vertices = self.remaining_vertices();
        let remaining_triangles = self.remaining_triangles();
        if item.prepare_context(&mut self.context, remaining_vertices, remaining_triangles) {
            self.flush();
        }

        let vertex_count = data.len() / source_stride;
        if self.remaining_vertices() < vertex_count || self.remaining_triangles() * 3 < triangles.len()
        {
            self.flush();
        }
        assert!(
            vertex_count <= self.max_vertices && triangles.len() <= self.max_triangles * 3,
            "submission of {} vertices and {} indices exceeds batch capacity",
            vertex_count,
            triangles.len()
        );

        let first_vertex = (self.vertex_cursor / self.stride) as u16;
        match &mut self.index_store {
            IndexStore::Dynamic { indices } => {
                for (slot, &index) in indices[self.index_cursor..self.index_cursor + triangles.len()]
                    .iter_mut()
                    .zip(triangles)
                {
                    *slot = index + first_vertex;
                }
            }
            IndexStore::Template { .. } => unreachable!(),
        }
        self.index_cursor += triangles.len();

        if source_stride == self.stride {
            self.vertices[self.vertex_cursor..self.vertex_cursor + data.len()].copy_from_slice(data);
            self.vertex_cursor += data.len();
        } else {
            let mut offset = 0;
            for _ in 0..vertex_count {
                self.vertices[self.vertex_cursor..self.vertex_cursor + source_stride]
                    .copy_from_slice(&data[offset..offset + source_stride]);
                self.vertex_cursor += self.stride;
                offset += source_stride;
            }
        }
    }

    fn flush(&mut self) {
        if self.vertex_cursor == 0 {
            // State-only flush: content queued next still needs the
            // requested state in place before it draws.
            self.context.execute_changes(self.states.as_mut());
            return;
        }

        tracing::trace!(
            "Flushing {} vertices, {} indices",
            self.vertex_cursor / self.stride,
            self.index_cursor
        );
        self.mesh.set_vertices(&self.vertices[..self.vertex_cursor]);
        if let IndexStore::Dynamic { indices } = &self.index_store {
            self.mesh.set_indices(&indices[..self.index_cursor]);
        }
        self.mesh.render_triangles(self.shader.as_mut(), 0, self.index_cursor);

        // Content renders under the state current when it was queued, so
        // requests accumulated since then execute only after the draw.
        self.context.execute_changes(self.states.as_mut());

        self.vertex_cursor = 0;
        self.index_cursor = 0;
        self.render_calls += 1;
        self.total_render_calls += 1;
    }

    fn apply_matrices(&mut self) {
        let combined = self.projection * self.transform;
        self.shader.set_uniform_mat4(PROJ_TRANS_UNIFORM, &combined);
    }

    fn apply_texture_uniforms(&mut self) {
        for (unit, name) in self.texture_uniforms.iter().enumerate() {
            self.shader.set_uniform_i32(name, unit as i32);
        }
    }
}
