/// An RGBA color with `f32` components in the `0.0..=1.0` range.
///
/// Vertex data stores colors in packed form: four 8-bit channels in the bit
/// pattern of a single `f32` (see [`Color::packed`]), so a color attribute
/// contributes exactly one float to the vertex stride.
///
/// ```
/// use flexbatch::Color;
///
/// let red = Color::rgb(1.0, 0.0, 0.0);
/// let semi_transparent = Color::rgba(1.0, 1.0, 1.0, 0.5);
/// let from_bytes = Color::from_rgba_u8(128, 64, 32, 255);
/// ```
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

/// The packed form of [`Color::WHITE`], the default vertex color.
pub const WHITE_PACKED: f32 = f32::from_bits(0xfeff_ffff);

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const RED: Color = Color::rgb(1.0, 0.0, 0.0);
    pub const GREEN: Color = Color::rgb(0.0, 1.0, 0.0);
    pub const BLUE: Color = Color::rgb(0.0, 0.0, 1.0);
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);

    /// Create a color from RGB components with full opacity (alpha = 1.0).
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Create a color from RGBA components.
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Create a color from 8-bit RGBA values (0–255 mapped to 0.0–1.0).
    pub fn from_rgba_u8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a: a as f32 / 255.0,
        }
    }

    /// Pack into a single float: ABGR byte order, one byte per channel.
    ///
    /// The high bit of the alpha channel is cleared so the bit pattern can
    /// never form a NaN (GPUs and drivers are free to canonicalize NaNs,
    /// which would corrupt the channel bytes in transit). Alpha therefore
    /// loses its lowest-significance step: a packed opaque color comes back
    /// with alpha 254/255.
    pub fn packed(self) -> f32 {
        let r = (self.r.clamp(0.0, 1.0) * 255.0) as u32;
        let g = (self.g.clamp(0.0, 1.0) * 255.0) as u32;
        let b = (self.b.clamp(0.0, 1.0) * 255.0) as u32;
        let a = (self.a.clamp(0.0, 1.0) * 255.0) as u32;
        let bits = (a << 24) | (b << 16) | (g << 8) | r;
        bytemuck::cast::<u32, f32>(bits & 0xfeff_ffff)
    }

    /// Recover the four channels from a packed float.
    pub fn from_packed(packed: f32) -> Self {
        let bits = bytemuck::cast::<f32, u32>(packed);
        Self::from_rgba_u8(
            (bits & 0xff) as u8,
            ((bits >> 8) & 0xff) as u8,
            ((bits >> 16) & 0xff) as u8,
            ((bits >> 24) & 0xff) as u8,
        )
    }

    /// Convert to an `[r, g, b, a]` array.
    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl From<[f32; 4]> for Color {
    fn from(arr: [f32; 4]) -> Self {
        Self {
            r: arr[0],
            g: arr[1],
            b: arr[2],
            a: arr[3],
        }
    }
}

impl From<Color> for [f32; 4] {
    fn from(color: Color) -> Self {
        color.to_array()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packing_preserves_channels() {
        let color = Color::from_rgba_u8(10, 20, 30, 40);
        let unpacked = Color::from_packed(color.packed());
        assert_eq!(unpacked, color);
    }

    #[test]
    fn packed_bits_are_never_nan() {
        let opaque = Color::WHITE.packed();
        assert!(!opaque.is_nan());
        // Alpha gives up its top bit: opaque comes back as 254/255.
        let round_tripped = Color::from_packed(opaque);
        assert!((round_tripped.a - 254.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn white_constant_matches_packed_white() {
        assert_eq!(WHITE_PACKED.to_bits(), Color::WHITE.packed().to_bits());
    }

    #[test]
    fn channels_clamp() {
        let loud = Color::rgba(2.0, -1.0, 0.5, 1.5);
        let unpacked = Color::from_packed(loud.packed());
        assert_eq!(unpacked.r, 1.0);
        assert_eq!(unpacked.g, 0.0);
    }
}
