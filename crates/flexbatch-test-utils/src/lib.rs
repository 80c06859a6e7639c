//! Test utilities for flexbatch.
//!
//! Recording doubles for the GPU traits a batch draws through. All doubles
//! write into one shared [`GpuLog`], so tests can assert both counts and
//! cross-collaborator ordering (for example, that buffered content draws
//! before the next item's texture is bound).
//!
//! # Example
//!
//! ```rust
//! use flexbatch::{FlexBatch, SolidQuad2};
//! use flexbatch_test_utils::{GpuLog, RecordingMesh, RecordingShader, RecordingStates};
//!
//! let log = GpuLog::new();
//! let mesh_log = log.clone();
//! let mut batch = FlexBatch::fixed(
//!     SolidQuad2::new(),
//!     1024,
//!     Box::new(RecordingShader::new(log.clone())),
//!     Box::new(RecordingStates::new(log.clone())),
//!     |_| Box::new(RecordingMesh::new(mesh_log)),
//! )
//! .unwrap();
//!
//! batch.begin();
//! batch.draw().position(8.0, 8.0).size(16.0, 16.0);
//! batch.end();
//!
//! assert_eq!(log.count_draws(), 1);
//! ```

pub mod logging;
pub mod mock_gpu;

pub use mock_gpu::*;
