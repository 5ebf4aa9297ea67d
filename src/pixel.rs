//! Color type and alpha type enumerations.
//!
//! These are the raster library's closed pixel-format enumerations. Each
//! [`ColorType`] maps to a fixed [`ChannelType`] and element count, which
//! together give bytes per pixel and the array-interface type string.

/// Storage type of one array element of a pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
#[repr(u8)]
pub enum ChannelType {
    /// 8-bit unsigned integer.
    U8 = 1,
    /// 16-bit unsigned integer, or a 16-bit packed pixel.
    U16 = 2,
    /// 32-bit unsigned integer, or a 32-bit packed pixel.
    U32 = 3,
    /// IEEE 754 half-precision float.
    F16 = 4,
    /// IEEE 754 single-precision float.
    F32 = 5,
}

impl ChannelType {
    /// Byte size of a single element.
    #[inline]
    pub const fn byte_size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 | Self::F16 => 2,
            Self::U32 | Self::F32 => 4,
        }
    }

    /// Array-interface type string (`|u1`, `<u2`, `<f4`, ...).
    ///
    /// Multi-byte types carry the byte-order marker of the target.
    pub const fn typestr(self) -> &'static str {
        let little = cfg!(target_endian = "little");
        match self {
            Self::U8 => "|u1",
            Self::U16 if little => "<u2",
            Self::U16 => ">u2",
            Self::U32 if little => "<u4",
            Self::U32 => ">u4",
            Self::F16 if little => "<f2",
            Self::F16 => ">f2",
            Self::F32 if little => "<f4",
            Self::F32 => ">f4",
        }
    }
}

/// How pixel values relate to the alpha channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AlphaType {
    /// Uninitialized.
    #[default]
    Unknown = 0,
    /// Pixels are opaque; any alpha channel is ignored.
    Opaque = 1,
    /// Color components are premultiplied by alpha.
    Premul = 2,
    /// Color components are independent of alpha.
    Unpremul = 3,
}

impl AlphaType {
    /// Decode a serialized discriminant.
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Unknown),
            1 => Some(Self::Opaque),
            2 => Some(Self::Premul),
            3 => Some(Self::Unpremul),
            _ => None,
        }
    }

    /// Whether pixels are treated as fully opaque.
    #[inline]
    pub const fn is_opaque(self) -> bool {
        matches!(self, Self::Opaque)
    }
}

/// Pixel memory layout.
///
/// Names follow channel order in memory for byte-addressed formats, and
/// bit order from most to least significant for packed formats.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ColorType {
    /// Uninitialized; has no layout.
    #[default]
    Unknown = 0,
    /// 8-bit alpha only.
    Alpha8 = 1,
    /// 16-bit packed 5-6-5 RGB.
    Rgb565 = 2,
    /// 16-bit packed 4-4-4-4 ARGB.
    Argb4444 = 3,
    /// 8-bit RGBA.
    Rgba8888 = 4,
    /// 8-bit RGB with an ignored fourth byte.
    Rgb888x = 5,
    /// 8-bit BGRA.
    Bgra8888 = 6,
    /// 32-bit packed 10-10-10-2 RGBA.
    Rgba1010102 = 7,
    /// 32-bit packed 10-10-10-2 BGRA.
    Bgra1010102 = 8,
    /// 32-bit packed 10-10-10 RGB with 2 ignored bits.
    Rgb101010x = 9,
    /// 32-bit packed 10-10-10 BGR with 2 ignored bits.
    Bgr101010x = 10,
    /// 8-bit grayscale.
    Gray8 = 11,
    /// Half-float RGBA clamped to `[0, 1]`.
    RgbaF16Norm = 12,
    /// Half-float RGBA.
    RgbaF16 = 13,
    /// Single-float RGBA.
    RgbaF32 = 14,
    /// 8-bit two-channel red/green.
    R8g8Unorm = 15,
    /// Half-float alpha only.
    A16Float = 16,
    /// Half-float two-channel red/green.
    R16g16Float = 17,
    /// 16-bit alpha only.
    A16Unorm = 18,
    /// 16-bit two-channel red/green.
    R16g16Unorm = 19,
    /// 16-bit RGBA.
    R16g16b16a16Unorm = 20,
    /// 8-bit RGBA with sRGB encoding.
    Srgba8888 = 21,
    /// 8-bit single red channel.
    R8Unorm = 22,
}

impl ColorType {
    /// Every color type, in discriminant order.
    pub const ALL: [Self; 23] = [
        Self::Unknown,
        Self::Alpha8,
        Self::Rgb565,
        Self::Argb4444,
        Self::Rgba8888,
        Self::Rgb888x,
        Self::Bgra8888,
        Self::Rgba1010102,
        Self::Bgra1010102,
        Self::Rgb101010x,
        Self::Bgr101010x,
        Self::Gray8,
        Self::RgbaF16Norm,
        Self::RgbaF16,
        Self::RgbaF32,
        Self::R8g8Unorm,
        Self::A16Float,
        Self::R16g16Float,
        Self::A16Unorm,
        Self::R16g16Unorm,
        Self::R16g16b16a16Unorm,
        Self::Srgba8888,
        Self::R8Unorm,
    ];

    /// Decode a serialized discriminant.
    pub fn from_u8(v: u8) -> Option<Self> {
        Self::ALL.get(v as usize).copied()
    }

    /// Element type and element count per pixel, or `None` for
    /// [`Unknown`](Self::Unknown).
    ///
    /// Packed formats are a single element of their word size.
    pub const fn layout(self) -> Option<(ChannelType, usize)> {
        use ChannelType::*;
        Some(match self {
            Self::Unknown => return None,
            Self::Alpha8 | Self::Gray8 | Self::R8Unorm => (U8, 1),
            Self::Rgb565 | Self::Argb4444 | Self::A16Unorm => (U16, 1),
            Self::Rgba8888 | Self::Rgb888x | Self::Bgra8888 | Self::Srgba8888 => (U8, 4),
            Self::Rgba1010102 | Self::Bgra1010102 | Self::Rgb101010x | Self::Bgr101010x => {
                (U32, 1)
            }
            Self::RgbaF16Norm | Self::RgbaF16 => (F16, 4),
            Self::RgbaF32 => (F32, 4),
            Self::R8g8Unorm => (U8, 2),
            Self::A16Float => (F16, 1),
            Self::R16g16Float => (F16, 2),
            Self::R16g16Unorm => (U16, 2),
            Self::R16g16b16a16Unorm => (U16, 4),
        })
    }

    /// Element type of one pixel component.
    #[inline]
    pub const fn channel_type(self) -> Option<ChannelType> {
        match self.layout() {
            Some((ct, _)) => Some(ct),
            None => None,
        }
    }

    /// Array elements per pixel; 0 for [`Unknown`](Self::Unknown).
    #[inline]
    pub const fn channels(self) -> usize {
        match self.layout() {
            Some((_, n)) => n,
            None => 0,
        }
    }

    /// Bytes per pixel; 0 for [`Unknown`](Self::Unknown).
    #[inline]
    pub const fn bytes_per_pixel(self) -> usize {
        match self.layout() {
            Some((ct, n)) => ct.byte_size() * n,
            None => 0,
        }
    }

    /// Whether pixels of this type are always opaque.
    pub const fn is_always_opaque(self) -> bool {
        matches!(
            self,
            Self::Rgb565
                | Self::Rgb888x
                | Self::Rgb101010x
                | Self::Bgr101010x
                | Self::Gray8
                | Self::R8g8Unorm
                | Self::R16g16Float
                | Self::R16g16Unorm
                | Self::R8Unorm
        )
    }

    /// Whether this type stores alpha and nothing else.
    pub const fn is_alpha_only(self) -> bool {
        matches!(self, Self::Alpha8 | Self::A16Float | Self::A16Unorm)
    }

    /// Canonical alpha type for this color type, or `None` if the pair is
    /// invalid.
    ///
    /// Always-opaque types canonicalize to [`AlphaType::Opaque`];
    /// alpha-only types treat [`AlphaType::Unpremul`] as premultiplied.
    /// [`AlphaType::Unknown`] is only valid with [`ColorType::Unknown`].
    pub const fn validate_alpha_type(self, alpha: AlphaType) -> Option<AlphaType> {
        if matches!(self, Self::Unknown) {
            return Some(AlphaType::Unknown);
        }
        if matches!(alpha, AlphaType::Unknown) {
            return None;
        }
        if self.is_always_opaque() {
            return Some(AlphaType::Opaque);
        }
        if self.is_alpha_only() && matches!(alpha, AlphaType::Unpremul) {
            return Some(AlphaType::Premul);
        }
        Some(alpha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_type_byte_size() {
        assert_eq!(ChannelType::U8.byte_size(), 1);
        assert_eq!(ChannelType::U16.byte_size(), 2);
        assert_eq!(ChannelType::F16.byte_size(), 2);
        assert_eq!(ChannelType::U32.byte_size(), 4);
        assert_eq!(ChannelType::F32.byte_size(), 4);
    }

    #[test]
    fn bytes_per_pixel() {
        assert_eq!(ColorType::Unknown.bytes_per_pixel(), 0);
        assert_eq!(ColorType::Alpha8.bytes_per_pixel(), 1);
        assert_eq!(ColorType::Rgb565.bytes_per_pixel(), 2);
        assert_eq!(ColorType::Rgba8888.bytes_per_pixel(), 4);
        assert_eq!(ColorType::Bgra1010102.bytes_per_pixel(), 4);
        assert_eq!(ColorType::R8g8Unorm.bytes_per_pixel(), 2);
        assert_eq!(ColorType::RgbaF16.bytes_per_pixel(), 8);
        assert_eq!(ColorType::R16g16b16a16Unorm.bytes_per_pixel(), 8);
        assert_eq!(ColorType::RgbaF32.bytes_per_pixel(), 16);
    }

    #[test]
    fn discriminants_roundtrip() {
        for ct in ColorType::ALL {
            assert_eq!(ColorType::from_u8(ct as u8), Some(ct));
        }
        assert_eq!(ColorType::from_u8(23), None);
        assert_eq!(AlphaType::from_u8(3), Some(AlphaType::Unpremul));
        assert_eq!(AlphaType::from_u8(4), None);
    }

    #[test]
    fn every_known_type_has_a_layout() {
        for ct in ColorType::ALL.into_iter().skip(1) {
            let (channel, n) = ct.layout().unwrap();
            assert_eq!(channel.byte_size() * n, ct.bytes_per_pixel(), "{ct:?}");
        }
        assert!(ColorType::Unknown.layout().is_none());
    }

    #[test]
    fn alpha_validation() {
        use AlphaType::*;
        assert_eq!(ColorType::Unknown.validate_alpha_type(Premul), Some(Unknown));
        assert_eq!(ColorType::Rgba8888.validate_alpha_type(Unknown), None);
        assert_eq!(ColorType::Rgba8888.validate_alpha_type(Unpremul), Some(Unpremul));
        assert_eq!(ColorType::Gray8.validate_alpha_type(Premul), Some(Opaque));
        assert_eq!(ColorType::Rgb565.validate_alpha_type(Unpremul), Some(Opaque));
        assert_eq!(ColorType::Alpha8.validate_alpha_type(Unpremul), Some(Premul));
        assert_eq!(ColorType::Alpha8.validate_alpha_type(Unknown), None);
    }

    #[test]
    #[cfg(target_endian = "little")]
    fn typestr_little_endian() {
        assert_eq!(ChannelType::U8.typestr(), "|u1");
        assert_eq!(ChannelType::U16.typestr(), "<u2");
        assert_eq!(ChannelType::F16.typestr(), "<f2");
        assert_eq!(ChannelType::F32.typestr(), "<f4");
    }
}
