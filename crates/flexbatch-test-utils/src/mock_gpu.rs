//! Recording GPU doubles.
//!
//! Every double writes into one shared [`GpuLog`], so a test can assert
//! ordering across collaborators, for example that a draw call lands
//! before the texture bind that the next batch requested. Uploads are
//! captured whole; content assertions read them back from the log.
//!
//! Methods on the production traits take `&mut self` or `&self`; the log
//! still uses a `Mutex` so textures (shared through `Arc`, bound via
//! `&self`) can record alongside the rest.

use std::sync::Arc;

use flexbatch::context::BlendFunction;
use flexbatch::gpu::{GpuMesh, GpuShader, GpuTexture, RenderStates};
use glam::Mat4;
use parking_lot::Mutex;

/// One recorded GPU operation.
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCall {
    SetVertices { vertices: Vec<f32> },
    SetIndices { indices: Vec<u16> },
    DrawTriangles { first_index: usize, index_count: usize },
    BindShader { shader: usize },
    UnbindShader { shader: usize },
    SetMat4 { shader: usize, name: String, value: Mat4 },
    SetI32 { shader: usize, name: String, value: i32 },
    BindTexture { texture: usize, unit: usize },
    SetBlending { enabled: bool },
    SetBlendFunction { function: BlendFunction },
    SetDepthMask { enabled: bool },
}

/// Shared, ordered log of recorded calls. Clones refer to the same log.
#[derive(Clone, Default)]
pub struct GpuLog {
    calls: Arc<Mutex<Vec<GpuCall>>>,
}

impl GpuLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: GpuCall) {
        self.calls.lock().push(call);
    }

    /// Copy of all recorded calls, in order.
    pub fn calls(&self) -> Vec<GpuCall> {
        self.calls.lock().clone()
    }

    /// Clear recorded calls (useful between test steps).
    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn count_draws(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, GpuCall::DrawTriangles { .. }))
            .count()
    }

    pub fn count_vertex_uploads(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, GpuCall::SetVertices { .. }))
            .count()
    }

    pub fn count_texture_binds(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, GpuCall::BindTexture { .. }))
            .count()
    }

    /// The (first index, index count) of every draw call, in order.
    pub fn draws(&self) -> Vec<(usize, usize)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                GpuCall::DrawTriangles { first_index, index_count } => {
                    Some((*first_index, *index_count))
                }
                _ => None,
            })
            .collect()
    }

    /// The most recent vertex upload.
    pub fn last_vertices(&self) -> Option<Vec<f32>> {
        self.calls
            .lock()
            .iter()
            .rev()
            .find_map(|call| match call {
                GpuCall::SetVertices { vertices } => Some(vertices.clone()),
                _ => None,
            })
    }

    /// The most recent index upload.
    pub fn last_indices(&self) -> Option<Vec<u16>> {
        self.calls
            .lock()
            .iter()
            .rev()
            .find_map(|call| match call {
                GpuCall::SetIndices { indices } => Some(indices.clone()),
                _ => None,
            })
    }
}

/// Mesh double; captures uploads whole and records draw ranges.
pub struct RecordingMesh {
    log: GpuLog,
}

impl RecordingMesh {
    pub fn new(log: GpuLog) -> Self {
        Self { log }
    }
}

impl GpuMesh for RecordingMesh {
    fn set_vertices(&mut self, vertices: &[f32]) {
        self.log.record(GpuCall::SetVertices { vertices: vertices.to_vec() });
    }

    fn set_indices(&mut self, indices: &[u16]) {
        self.log.record(GpuCall::SetIndices { indices: indices.to_vec() });
    }

    fn render_triangles(
        &mut self,
        _shader: &mut dyn GpuShader,
        first_index: usize,
        index_count: usize,
    ) {
        self.log.record(GpuCall::DrawTriangles { first_index, index_count });
    }
}

/// Shader double; the id distinguishes shaders in swap tests.
pub struct RecordingShader {
    log: GpuLog,
    id: usize,
}

impl RecordingShader {
    pub fn new(log: GpuLog) -> Self {
        Self::with_id(log, 0)
    }

    pub fn with_id(log: GpuLog, id: usize) -> Self {
        Self { log, id }
    }
}

impl GpuShader for RecordingShader {
    fn bind(&mut self) {
        self.log.record(GpuCall::BindShader { shader: self.id });
    }

    fn unbind(&mut self) {
        self.log.record(GpuCall::UnbindShader { shader: self.id });
    }

    fn set_uniform_mat4(&mut self, name: &str, value: &Mat4) {
        self.log.record(GpuCall::SetMat4 {
            shader: self.id,
            name: name.to_string(),
            value: *value,
        });
    }

    fn set_uniform_i32(&mut self, name: &str, value: i32) {
        self.log.record(GpuCall::SetI32 { shader: self.id, name: name.to_string(), value });
    }
}

/// Texture double with fixed dimensions.
pub struct StubTexture {
    log: GpuLog,
    id: usize,
    width: u32,
    height: u32,
}

impl StubTexture {
    pub fn new(log: GpuLog, id: usize, width: u32, height: u32) -> Self {
        Self { log, id, width, height }
    }
}

impl GpuTexture for StubTexture {
    fn bind(&self, unit: usize) {
        self.log.record(GpuCall::BindTexture { texture: self.id, unit });
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

/// Shorthand for an `Arc`'d [`StubTexture`].
pub fn texture(log: &GpuLog, id: usize, width: u32, height: u32) -> Arc<dyn GpuTexture> {
    Arc::new(StubTexture::new(log.clone(), id, width, height))
}

/// Render-states double.
pub struct RecordingStates {
    log: GpuLog,
}

impl RecordingStates {
    pub fn new(log: GpuLog) -> Self {
        Self { log }
    }
}

impl RenderStates for RecordingStates {
    fn set_blending(&mut self, enabled: bool) {
        self.log.record(GpuCall::SetBlending { enabled });
    }

    fn set_blend_function(&mut self, function: BlendFunction) {
        self.log.record(GpuCall::SetBlendFunction { function });
    }

    fn set_depth_mask(&mut self, enabled: bool) {
        self.log.record(GpuCall::SetDepthMask { enabled });
    }
}

/// No-op mesh for benchmarks.
pub struct NullMesh;

impl GpuMesh for NullMesh {
    fn set_vertices(&mut self, _vertices: &[f32]) {}

    fn set_indices(&mut self, _indices: &[u16]) {}

    fn render_triangles(
        &mut self,
        _shader: &mut dyn GpuShader,
        _first_index: usize,
        _index_count: usize,
    ) {
    }
}

/// No-op shader for benchmarks.
pub struct NullShader;

impl GpuShader for NullShader {
    fn bind(&mut self) {}

    fn unbind(&mut self) {}

    fn set_uniform_mat4(&mut self, _name: &str, _value: &Mat4) {}

    fn set_uniform_i32(&mut self, _name: &str, _value: i32) {}
}

/// No-op render states for benchmarks.
pub struct NullStates;

impl RenderStates for NullStates {
    fn set_blending(&mut self, _enabled: bool) {}

    fn set_blend_function(&mut self, _function: BlendFunction) {}

    fn set_depth_mask(&mut self, _enabled: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_share_one_ordered_log() {
        let log = GpuLog::new();
        let mut mesh = RecordingMesh::new(log.clone());
        let mut shader = RecordingShader::with_id(log.clone(), 3);
        let texture = texture(&log, 9, 16, 16);

        shader.bind();
        mesh.set_vertices(&[1.0, 2.0]);
        texture.bind(0);
        mesh.render_triangles(&mut shader, 0, 6);

        assert_eq!(
            log.calls(),
            vec![
                GpuCall::BindShader { shader: 3 },
                GpuCall::SetVertices { vertices: vec![1.0, 2.0] },
                GpuCall::BindTexture { texture: 9, unit: 0 },
                GpuCall::DrawTriangles { first_index: 0, index_count: 6 },
            ]
        );
        assert_eq!(log.count_draws(), 1);
        assert_eq!(log.last_vertices(), Some(vec![1.0, 2.0]));
    }

    #[test]
    fn clear_resets_the_log() {
        let log = GpuLog::new();
        RecordingMesh::new(log.clone()).set_indices(&[0, 1, 2]);
        assert_eq!(log.call_count(), 1);
        log.clear();
        assert_eq!(log.call_count(), 0);
    }

    #[test]
    fn stub_texture_reports_its_size() {
        let log = GpuLog::new();
        let texture = StubTexture::new(log, 0, 64, 32);
        assert_eq!(texture.width(), 64);
        assert_eq!(texture.height(), 32);
    }
}
