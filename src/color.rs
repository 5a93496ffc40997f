//! 16-level grayscale as used by the IT8951E image load protocol

/// One of the 16 gray levels the controller can drive.
///
/// `0` is black, `15` is white. Two of these are packed per framebuffer
/// byte (4 bits per pixel).
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Gray16(u8);

impl Gray16 {
    /// Black (lowest luminance)
    pub const BLACK: Gray16 = Gray16(0x00);

    /// White (highest luminance)
    pub const WHITE: Gray16 = Gray16(0x0F);

    /// Creates a gray level from a 4-bit luminance value.
    ///
    /// Values above 15 are masked to their low nibble.
    pub const fn new(luma: u8) -> Self {
        Gray16(luma & 0x0F)
    }

    /// Converts an 8-bit RGB sample to its gray level.
    ///
    /// Fixed-point approximation of the standard luma weights:
    /// `(r*77 + g*151 + b*28) >> 12` yields 0..=15.
    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Gray16(((r as u32 * 77 + g as u32 * 151 + b as u32 * 28) >> 12) as u8)
    }

    /// Get the 4-bit luminance value of the gray level
    pub const fn luma(self) -> u8 {
        self.0
    }

    /// The one's complement gray level, for panels mounted with reversed optics
    pub const fn inverse(self) -> Self {
        Gray16(!self.0 & 0x0F)
    }

    /// Gets a full byte of this gray level (both pixels of the pair)
    pub const fn get_byte_value(self) -> u8 {
        self.0 << 4 | self.0
    }
}

#[cfg(feature = "graphics")]
mod graphics {
    use super::Gray16;
    use embedded_graphics_core::pixelcolor::raw::RawU4;
    use embedded_graphics_core::pixelcolor::{Gray4, GrayColor, PixelColor, Rgb888, RgbColor};

    impl PixelColor for Gray16 {
        type Raw = RawU4;
    }

    impl From<RawU4> for Gray16 {
        fn from(raw: RawU4) -> Self {
            use embedded_graphics_core::pixelcolor::raw::RawData;
            Gray16::new(raw.into_inner())
        }
    }

    impl From<Gray16> for RawU4 {
        fn from(color: Gray16) -> Self {
            RawU4::new(color.luma())
        }
    }

    impl From<Rgb888> for Gray16 {
        fn from(rgb: Rgb888) -> Self {
            Gray16::from_rgb(rgb.r(), rgb.g(), rgb.b())
        }
    }

    impl From<Gray4> for Gray16 {
        fn from(gray: Gray4) -> Self {
            Gray16::new(gray.luma())
        }
    }
}
