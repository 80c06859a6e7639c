//! GPU collaborator interfaces.
//!
//! The engine owns CPU-side buffers and flush policy; everything that
//! actually touches the GPU goes through these traits, supplied by the
//! caller at construction. This keeps the engine backend-agnostic and lets
//! tests drive it with recording doubles instead of a device.
//!
//! None of the traits require `Send`/`Sync`: the engine is single-threaded
//! and GPU handles are assumed bound to the caller's rendering thread.

use glam::Mat4;

use crate::attributes::VertexLayout;
use crate::context::BlendFunction;

/// Uniform name for the combined projection × transform matrix.
pub const PROJ_TRANS_UNIFORM: &str = "u_projTrans";
/// Prefix for per-unit sampler uniforms (`u_texture0`, ...); each is set to
/// its own unit number.
pub const TEXTURE_UNIFORM_PREFIX: &str = "u_texture";

/// Uniform name for a texture unit: `u_texture0`, `u_texture1`, ...
pub fn texture_uniform_name(unit: usize) -> String {
    format!("{TEXTURE_UNIFORM_PREFIX}{unit}")
}

/// A bound shader program.
///
/// The engine binds the shader for the whole of a drawing session and sets
/// uniforms by name; resolving names to locations (and caching them) is the
/// implementation's concern.
pub trait GpuShader {
    fn bind(&mut self);
    fn unbind(&mut self);
    fn set_uniform_mat4(&mut self, name: &str, value: &Mat4);
    fn set_uniform_i32(&mut self, name: &str, value: i32);
}

/// Vertex/index storage plus the indexed-triangle draw call.
///
/// Created through the mesh factory passed to the engine constructor, which
/// receives a [`MeshDescriptor`] with the derived layout and capacities.
/// Fixed-size engines upload their index template once and afterwards only
/// vary the draw count; variable-size engines re-upload indices each flush.
pub trait GpuMesh {
    /// Replace the mesh's vertex data with the given floats.
    fn set_vertices(&mut self, vertices: &[f32]);

    /// Replace the mesh's index data.
    fn set_indices(&mut self, indices: &[u16]);

    /// Draw `index_count` indices starting at `first_index` as triangles.
    fn render_triangles(&mut self, shader: &mut dyn GpuShader, first_index: usize, index_count: usize);
}

/// A texture that can bind itself to a texture unit.
///
/// Textures are shared handles (`Arc<dyn GpuTexture>`); the engine compares
/// them by handle identity (`Arc::ptr_eq`), never by content, so callers
/// must clone the same `Arc` rather than re-wrap the resource.
pub trait GpuTexture {
    fn bind(&self, unit: usize);
    /// Texture width in pixels; used for region-relative sizing.
    fn width(&self) -> u32;
    /// Texture height in pixels.
    fn height(&self) -> u32;
}

/// The mutable render-state surface the accumulator applies diffs to.
///
/// Blend functions always arrive in separate-capable form; backends without
/// separate alpha blending can ignore the alpha pair when it equals the
/// color pair.
pub trait RenderStates {
    fn set_blending(&mut self, enabled: bool);
    fn set_blend_function(&mut self, function: BlendFunction);
    fn set_depth_mask(&mut self, enabled: bool);
}

/// What the engine asks a mesh factory to build.
pub struct MeshDescriptor<'a> {
    /// The vertex layout derived from the item kind.
    pub layout: &'a VertexLayout,
    /// Vertex capacity the mesh must hold.
    pub max_vertices: usize,
    /// Index capacity the mesh must hold.
    pub max_indices: usize,
}
