//! Texture regions: a texture handle plus a UV window.

use std::fmt;
use std::sync::Arc;

use crate::gpu::GpuTexture;

/// A rectangular window into a texture, in normalized UV coordinates.
///
/// `v` grows downward in texture space, so `(u, v)` is the top-left corner
/// of the window and `(u2, v2)` the bottom-right. Regions are cheap to
/// clone; identity follows the texture handle.
#[derive(Clone)]
pub struct TextureRegion {
    texture: Arc<dyn GpuTexture>,
    u: f32,
    v: f32,
    u2: f32,
    v2: f32,
}

impl TextureRegion {
    /// The full texture as one region.
    pub fn new(texture: Arc<dyn GpuTexture>) -> Self {
        Self {
            texture,
            u: 0.0,
            v: 0.0,
            u2: 1.0,
            v2: 1.0,
        }
    }

    /// A region from explicit UV coordinates.
    pub fn with_uv(texture: Arc<dyn GpuTexture>, u: f32, v: f32, u2: f32, v2: f32) -> Self {
        Self { texture, u, v, u2, v2 }
    }

    /// A region from a pixel rectangle within the texture.
    pub fn from_pixels(texture: Arc<dyn GpuTexture>, x: u32, y: u32, width: u32, height: u32) -> Self {
        let inv_w = 1.0 / texture.width() as f32;
        let inv_h = 1.0 / texture.height() as f32;
        Self {
            u: x as f32 * inv_w,
            v: y as f32 * inv_h,
            u2: (x + width) as f32 * inv_w,
            v2: (y + height) as f32 * inv_h,
            texture,
        }
    }

    pub fn texture(&self) -> &Arc<dyn GpuTexture> {
        &self.texture
    }

    /// The UV window as `(u, v, u2, v2)`.
    pub fn uv(&self) -> (f32, f32, f32, f32) {
        (self.u, self.v, self.u2, self.v2)
    }

    /// Mirror the window horizontally and/or vertically in place.
    pub fn flip(&mut self, x: bool, y: bool) {
        if x {
            std::mem::swap(&mut self.u, &mut self.u2);
        }
        if y {
            std::mem::swap(&mut self.v, &mut self.v2);
        }
    }

    /// Region width in pixels.
    pub fn width(&self) -> u32 {
        ((self.u2 - self.u).abs() * self.texture.width() as f32).round() as u32
    }

    /// Region height in pixels.
    pub fn height(&self) -> u32 {
        ((self.v2 - self.v).abs() * self.texture.height() as f32).round() as u32
    }
}

impl fmt::Debug for TextureRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureRegion")
            .field("u", &self.u)
            .field("v", &self.v)
            .field("u2", &self.u2)
            .field("v2", &self.v2)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn pixel_rect_maps_to_uv() {
        let texture: Arc<dyn GpuTexture> = Arc::new(Stub {
            width: 256,
            height: 128,
        });
        let region = TextureRegion::from_pixels(texture, 64, 32, 128, 64);
        assert_eq!(region.uv(), (0.25, 0.25, 0.75, 0.75));
        assert_eq!(region.width(), 128);
        assert_eq!(region.height(), 64);
    }

    #[test]
    fn flip_swaps_edges() {
        let texture: Arc<dyn GpuTexture> = Arc::new(Stub {
            width: 64,
            height: 64,
        });
        let mut region = TextureRegion::new(texture);
        region.flip(true, false);
        assert_eq!(region.uv(), (1.0, 0.0, 0.0, 1.0));
        // Pixel size is unaffected by flipping.
        assert_eq!(region.width(), 64);
    }
}
