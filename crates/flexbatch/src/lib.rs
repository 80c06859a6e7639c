//! flexbatch
//!
//! Generic draw-call batching over caller-supplied GPU resources. Items
//! implementing [`Batchable`] accumulate into shared vertex/index buffers
//! and flush as single indexed-triangle draw calls; render state changes
//! are diffed per item so state flips cost a flush instead of a call per
//! item. The GPU itself stays behind the traits in [`gpu`], which makes
//! the engine backend-neutral and testable off-device.

pub mod attributes;
pub mod batch;
pub mod batchable;
pub mod color;
pub mod context;
pub mod gpu;
pub mod region;

pub use attributes::{AttributeOffsets, LayoutError, VertexAttribute, VertexLayout};
pub use batch::{ConfigError, FlexBatch, MAX_VERTICES};
pub use batchable::{
    Batchable, FixedSizeBatchable, Poly2, Polygon, PolygonError, Quad2, Quad3, SolidQuad2,
};
pub use color::{Color, WHITE_PACKED};
pub use context::{BlendFactor, BlendFunction, RenderContextAccumulator};
pub use gpu::{GpuMesh, GpuShader, GpuTexture, MeshDescriptor, RenderStates};
pub use region::TextureRegion;
