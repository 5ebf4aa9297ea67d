//! Pixel format descriptor.

use std::sync::Arc;

use crate::color::ColorSpace;
use crate::error::{CloneError, FormatError};
use crate::flatten::{FlatReader, FlatWriter, Flattenable};
use crate::pixel::{AlphaType, ColorType};

/// Describes a rectangular pixel buffer: dimensions, color type, alpha
/// type, and color space.
///
/// The color space is shared by reference. It is never mutated through an
/// `ImageInfo`; use [`clone_color_space`](crate::clone_color_space) when an
/// independent copy is required.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct ImageInfo {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel memory layout.
    pub color_type: ColorType,
    /// Alpha interpretation.
    pub alpha_type: AlphaType,
    /// Color space of the pixel values, if tagged.
    pub color_space: Option<Arc<ColorSpace>>,
}

impl ImageInfo {
    /// Create a descriptor.
    pub fn new(
        width: u32,
        height: u32,
        color_type: ColorType,
        alpha_type: AlphaType,
        color_space: Option<Arc<ColorSpace>>,
    ) -> Self {
        Self {
            width,
            height,
            color_type,
            alpha_type,
            color_space,
        }
    }

    /// 8-bit RGBA, premultiplied, untagged.
    pub fn rgba8888_premul(width: u32, height: u32) -> Self {
        Self::new(width, height, ColorType::Rgba8888, AlphaType::Premul, None)
    }

    /// Set the dimensions.
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the color type.
    pub fn with_color_type(mut self, color_type: ColorType) -> Self {
        self.color_type = color_type;
        self
    }

    /// Set the alpha type.
    pub fn with_alpha_type(mut self, alpha_type: AlphaType) -> Self {
        self.alpha_type = alpha_type;
        self
    }

    /// Set (or clear) the color space.
    pub fn with_color_space(mut self, color_space: Option<Arc<ColorSpace>>) -> Self {
        self.color_space = color_space;
        self
    }

    /// Whether width or height is zero.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether pixels are treated as fully opaque.
    #[inline]
    pub fn is_opaque(&self) -> bool {
        self.alpha_type.is_opaque() || self.color_type.is_always_opaque()
    }

    /// Bytes per pixel of the color type.
    #[inline]
    pub fn bytes_per_pixel(&self) -> usize {
        self.color_type.bytes_per_pixel()
    }

    /// `width * bytes_per_pixel`, or `None` on overflow.
    pub fn min_row_bytes(&self) -> Option<usize> {
        (self.width as usize).checked_mul(self.bytes_per_pixel())
    }

    /// Bytes spanned by `height` rows at `row_bytes`:
    /// `(height - 1) * row_bytes + min_row_bytes`.
    ///
    /// Zero for an empty descriptor; `None` on overflow.
    pub fn compute_byte_size(&self, row_bytes: usize) -> Option<usize> {
        if self.is_empty() {
            return Some(0);
        }
        (self.height as usize - 1)
            .checked_mul(row_bytes)?
            .checked_add(self.min_row_bytes()?)
    }

    /// Whether `row_bytes` can hold one row of this descriptor.
    pub fn valid_row_bytes(&self, row_bytes: usize) -> bool {
        self.min_row_bytes().is_some_and(|min| row_bytes >= min)
    }

    /// Check the color/alpha pairing and canonicalize the alpha type.
    ///
    /// # Errors
    ///
    /// [`FormatError::InvalidAlphaType`] if the alpha type is not valid for
    /// the color type.
    pub fn validated(mut self) -> Result<Self, FormatError> {
        self.alpha_type = self
            .color_type
            .validate_alpha_type(self.alpha_type)
            .ok_or(FormatError::InvalidAlphaType {
                color_type: self.color_type,
                alpha_type: self.alpha_type,
            })?;
        Ok(self)
    }
}

impl Flattenable for ImageInfo {
    const FACTORY_NAME: &'static str = "ImageInfo";

    fn flatten(&self, buffer: &mut FlatWriter) {
        buffer.write_u32(self.width);
        buffer.write_u32(self.height);
        buffer.write_u8(self.color_type as u8);
        buffer.write_u8(self.alpha_type as u8);
        buffer.write_optional(self.color_space.as_deref());
    }

    fn unflatten(buffer: &mut FlatReader<'_>) -> Result<Self, CloneError> {
        let width = buffer.read_u32()?;
        let height = buffer.read_u32()?;
        let ct = buffer.read_u8()?;
        let color_type = ColorType::from_u8(ct).ok_or(CloneError::InvalidValue {
            field: "color type",
            value: ct.into(),
        })?;
        let at = buffer.read_u8()?;
        let alpha_type = AlphaType::from_u8(at).ok_or(CloneError::InvalidValue {
            field: "alpha type",
            value: at.into(),
        })?;
        let color_space = buffer
            .read_optional::<ColorSpace>()?
            .map(ColorSpace::into_shared);
        buffer.limits().check_dimensions(width, height)?;
        Ok(Self::new(width, height, color_type, alpha_type, color_space))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_row_bytes_and_byte_size() {
        let info = ImageInfo::rgba8888_premul(100, 50);
        assert_eq!(info.min_row_bytes(), Some(400));
        assert_eq!(info.compute_byte_size(400), Some(20_000));
        // 49 * 512 + 400
        assert_eq!(info.compute_byte_size(512), Some(25_488));
        assert!(info.valid_row_bytes(400));
        assert!(!info.valid_row_bytes(396));
    }

    #[test]
    fn empty_info_needs_no_bytes() {
        let info = ImageInfo::rgba8888_premul(0, 10);
        assert!(info.is_empty());
        assert_eq!(info.compute_byte_size(0), Some(0));
        let info = ImageInfo::rgba8888_premul(10, 0);
        assert_eq!(info.compute_byte_size(40), Some(0));
    }

    #[test]
    fn byte_size_overflow_is_none() {
        let info = ImageInfo::rgba8888_premul(1, u32::MAX);
        assert_eq!(info.compute_byte_size(usize::MAX), None);
    }

    #[test]
    fn validated_canonicalizes_alpha() {
        let info = ImageInfo::new(4, 4, ColorType::Gray8, AlphaType::Premul, None)
            .validated()
            .unwrap();
        assert_eq!(info.alpha_type, AlphaType::Opaque);
        assert!(info.is_opaque());

        let err = ImageInfo::new(4, 4, ColorType::Rgba8888, AlphaType::Unknown, None)
            .validated()
            .unwrap_err();
        assert!(matches!(err, FormatError::InvalidAlphaType { .. }));
    }

    #[test]
    fn builders() {
        let info = ImageInfo::default()
            .with_dimensions(3, 2)
            .with_color_type(ColorType::RgbaF32)
            .with_alpha_type(AlphaType::Unpremul)
            .with_color_space(Some(ColorSpace::srgb()));
        assert_eq!(info.width, 3);
        assert_eq!(info.height, 2);
        assert_eq!(info.bytes_per_pixel(), 16);
        assert!(info.color_space.as_deref().is_some_and(ColorSpace::is_srgb));
    }

    #[test]
    fn flatten_preserves_fields() {
        let info = ImageInfo::new(
            7,
            3,
            ColorType::Bgra8888,
            AlphaType::Unpremul,
            Some(ColorSpace::srgb_linear()),
        );
        let copy = ImageInfo::deserialize(&info.serialize()).unwrap();
        assert_eq!(copy, info);
    }

    #[test]
    fn unflatten_rejects_bad_color_type() {
        let mut writer = FlatWriter::new();
        writer.write_str(ImageInfo::FACTORY_NAME);
        writer.write_u32(1);
        writer.write_u32(1);
        writer.write_u8(200);
        writer.write_u8(2);
        writer.write_bool(false);
        let err = ImageInfo::deserialize(&writer.finish()).unwrap_err();
        assert_eq!(
            err,
            CloneError::InvalidValue {
                field: "color type",
                value: 200
            }
        );
    }
}
