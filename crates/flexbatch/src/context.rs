//! Deferred GPU render-state accumulation.
//!
//! Items and engine-level setters *request* state; nothing reaches the GPU
//! until [`RenderContextAccumulator::execute_changes`] diffs the requested
//! snapshot against the last-applied one and applies only what differs.
//! The request methods report whether the request changed the pending
//! snapshot, which is how items signal "flush before me".
//!
//! State covered: one texture per unit, blending enable, the blend function
//! (separate alpha capable), and the depth write mask.

use std::sync::Arc;

use crate::gpu::{GpuTexture, RenderStates};

/// A source or destination blend factor.
///
/// Factor naming follows the modern graphics APIs so a backend can map the
/// vocabulary one to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    Src,
    OneMinusSrc,
    SrcAlpha,
    OneMinusSrcAlpha,
    Dst,
    OneMinusDst,
    DstAlpha,
    OneMinusDstAlpha,
    SrcAlphaSaturated,
    Constant,
    OneMinusConstant,
}

/// A complete blend function: color factors plus (possibly identical)
/// alpha factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendFunction {
    pub src_color: BlendFactor,
    pub dst_color: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
}

impl BlendFunction {
    /// Standard alpha blending.
    pub const ALPHA: Self = Self::new(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha);
    /// Alpha blending for premultiplied sources.
    pub const PREMULTIPLIED_ALPHA: Self = Self::new(BlendFactor::One, BlendFactor::OneMinusSrcAlpha);
    /// Additive (glow/fire style) blending.
    pub const ADDITIVE: Self = Self::new(BlendFactor::SrcAlpha, BlendFactor::One);
    /// Multiplicative (darkening) blending.
    pub const MULTIPLY: Self = Self::new(BlendFactor::Dst, BlendFactor::Zero);

    /// A blend function using the same factors for color and alpha.
    pub const fn new(src: BlendFactor, dst: BlendFactor) -> Self {
        Self {
            src_color: src,
            dst_color: dst,
            src_alpha: src,
            dst_alpha: dst,
        }
    }

    /// A blend function with distinct alpha factors.
    pub const fn separate(
        src_color: BlendFactor,
        dst_color: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) -> Self {
        Self {
            src_color,
            dst_color,
            src_alpha,
            dst_alpha,
        }
    }

    /// Whether the alpha factors differ from the color factors.
    pub fn is_separate(&self) -> bool {
        self.src_alpha != self.src_color || self.dst_alpha != self.dst_color
    }
}

/// The non-texture portion of the tracked state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Snapshot {
    blending: bool,
    blend_function: BlendFunction,
    depth_mask: bool,
}

impl Snapshot {
    /// GL-style defaults: blending off, alpha function, depth writes on.
    const fn initial() -> Self {
        Self {
            blending: false,
            blend_function: BlendFunction::ALPHA,
            depth_mask: true,
        }
    }
}

/// Two-phase render-state tracker: request now, execute at flush.
///
/// Getters report the *pending* (most recently requested) values; that is
/// the state the next queued content will draw under, which is what both
/// item-level and engine-level change detection must compare against.
pub struct RenderContextAccumulator {
    pending: Snapshot,
    applied: Snapshot,
    /// False between sessions: forces the first execute of a session to
    /// apply everything, since GPU state cannot be trusted across sessions.
    applied_valid: bool,
    pending_textures: Vec<Option<Arc<dyn GpuTexture>>>,
    applied_textures: Vec<Option<Arc<dyn GpuTexture>>>,
}

impl RenderContextAccumulator {
    pub fn new() -> Self {
        Self {
            pending: Snapshot::initial(),
            applied: Snapshot::initial(),
            applied_valid: false,
            pending_textures: Vec::new(),
            applied_textures: Vec::new(),
        }
    }

    /// Request `texture` on `unit`; returns whether this differs from the
    /// last request for that unit.
    pub fn request_texture_unit(&mut self, texture: &Arc<dyn GpuTexture>, unit: usize) -> bool {
        if self.pending_textures.len() <= unit {
            self.pending_textures.resize_with(unit + 1, || None);
        }
        let same = matches!(&self.pending_textures[unit], Some(t) if Arc::ptr_eq(t, texture));
        if !same {
            self.pending_textures[unit] = Some(Arc::clone(texture));
        }
        !same
    }

    /// Request the blending enable flag; returns whether it changed.
    pub fn request_blending(&mut self, enabled: bool) -> bool {
        let changed = self.pending.blending != enabled;
        self.pending.blending = enabled;
        changed
    }

    /// Request a blend function; returns whether it changed.
    pub fn request_blend_function(&mut self, function: BlendFunction) -> bool {
        let changed = self.pending.blend_function != function;
        self.pending.blend_function = function;
        changed
    }

    /// Request the depth write mask; returns whether it changed.
    pub fn request_depth_mask(&mut self, enabled: bool) -> bool {
        let changed = self.pending.depth_mask != enabled;
        self.pending.depth_mask = enabled;
        changed
    }

    pub fn blending_enabled(&self) -> bool {
        self.pending.blending
    }

    pub fn blend_function(&self) -> BlendFunction {
        self.pending.blend_function
    }

    pub fn depth_mask(&self) -> bool {
        self.pending.depth_mask
    }

    /// Apply every pending value that differs from the last-applied one.
    ///
    /// Texture binds go through the textures themselves; blend and depth
    /// state through `states`. Called exactly once per flush, after the
    /// buffered content's draw call (a state change requested by the item
    /// that forced the flush must not affect content queued before it).
    pub fn execute_changes(&mut self, states: &mut dyn RenderStates) {
        let force = !self.applied_valid;
        if force || self.pending.blending != self.applied.blending {
            states.set_blending(self.pending.blending);
        }
        if force || self.pending.blend_function != self.applied.blend_function {
            states.set_blend_function(self.pending.blend_function);
        }
        if force || self.pending.depth_mask != self.applied.depth_mask {
            states.set_depth_mask(self.pending.depth_mask);
        }
        self.applied = self.pending;

        if self.applied_textures.len() < self.pending_textures.len() {
            self.applied_textures
                .resize_with(self.pending_textures.len(), || None);
        }
        for unit in 0..self.pending_textures.len() {
            let Some(texture) = &self.pending_textures[unit] else {
                continue;
            };
            let same = matches!(&self.applied_textures[unit], Some(t) if Arc::ptr_eq(t, texture));
            if force || !same {
                texture.bind(unit);
                self.applied_textures[unit] = Some(Arc::clone(texture));
            }
        }
        self.applied_valid = true;
    }

    /// Start-of-session bookkeeping: distrust whatever was applied before.
    pub fn begin_session(&mut self) {
        self.applied_valid = false;
        for slot in &mut self.applied_textures {
            *slot = None;
        }
    }

    /// End-of-session bookkeeping: drop every texture reference so the
    /// accumulator does not keep resources alive between sessions.
    pub fn end_session(&mut self) {
        for slot in &mut self.pending_textures {
            *slot = None;
        }
        for slot in &mut self.applied_textures {
            *slot = None;
        }
    }
}

impl Default for RenderContextAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
