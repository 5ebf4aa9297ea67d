//! Raster collaborators: immutable [`Image`] and mutable [`Bitmap`].
//!
//! Both copy pixels out through [`ReadPixels`] and serialize through
//! [`Flattenable`]. Neither converts between pixel formats.

use std::fmt;
use std::sync::Arc;

use half::f16;

use crate::bridge::buffer_layout;
use crate::buffer::{BufferData, BufferInfo};
use crate::error::{BufferError, CloneError, FormatError};
use crate::flatten::{FlatReader, FlatWriter, Flattenable};
use crate::info::ImageInfo;
use crate::limits::ResourceLimits;
use crate::pixel::ColorType;
use crate::shader::Color4f;
use crate::traits::{BufferProtocol, ReadPixels};

// ---------------------------------------------------------------------------
// Image
// ---------------------------------------------------------------------------

/// Immutable raster with shared pixel storage.
#[derive(Clone)]
pub struct Image {
    info: ImageInfo,
    row_bytes: usize,
    pixels: Arc<[u8]>,
}

impl Image {
    /// Wrap `pixels` laid out as `info` with `row_bytes` between rows.
    ///
    /// `row_bytes` of 0 selects the minimum. The alpha type is checked and
    /// canonicalized for the color type.
    ///
    /// # Errors
    ///
    /// Returns a [`FormatError`] for an unknown color type, an invalid
    /// alpha type, a short stride, or too few bytes.
    pub fn from_pixels(
        info: ImageInfo,
        pixels: impl Into<Arc<[u8]>>,
        row_bytes: usize,
    ) -> Result<Self, FormatError> {
        let pixels = pixels.into();
        let (info, row_bytes) = check_storage(info, row_bytes, pixels.len())?;
        Ok(Self {
            info,
            row_bytes,
            pixels,
        })
    }

    /// Pixel format descriptor.
    pub fn info(&self) -> &ImageInfo {
        &self.info
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.info.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.info.height
    }

    /// Bytes between the starts of consecutive rows.
    pub fn row_bytes(&self) -> usize {
        self.row_bytes
    }

    /// Pixel bytes covered by the image (the last row is not padded).
    pub fn pixels(&self) -> &[u8] {
        span(&self.info, self.row_bytes, &self.pixels)
    }

    /// Whether two images share pixel storage.
    pub fn shares_pixels(&self, other: &Image) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }

    /// Bytes of the pixel at `(x, y)`.
    pub fn pixel_bytes(&self, x: u32, y: u32) -> Option<&[u8]> {
        pixel_at(&self.info, self.row_bytes, &self.pixels, x, y)
    }

    /// Stored components of the pixel at `(x, y)` as floats.
    ///
    /// Values are returned as stored: premultiplied pixels stay
    /// premultiplied and no color space conversion is applied.
    pub fn color_at(&self, x: u32, y: u32) -> Option<Color4f> {
        unpack(self.info.color_type, self.pixel_bytes(x, y)?)
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("info", &self.info)
            .field("row_bytes", &self.row_bytes)
            .field("len", &self.pixels.len())
            .finish()
    }
}

impl PartialEq for Image {
    fn eq(&self, other: &Self) -> bool {
        self.info == other.info && self.row_bytes == other.row_bytes && self.pixels() == other.pixels()
    }
}

impl ReadPixels for Image {
    fn read_pixels(
        &self,
        dst_info: &ImageInfo,
        dst: &mut [u8],
        dst_row_bytes: usize,
        src_x: i32,
        src_y: i32,
    ) -> bool {
        copy_rect(
            &self.info,
            &self.pixels,
            self.row_bytes,
            dst_info,
            dst,
            dst_row_bytes,
            src_x,
            src_y,
        )
    }
}

impl BufferProtocol for Image {
    fn request(&mut self, writable: bool) -> Result<BufferInfo<'_>, BufferError> {
        if writable {
            return Err(BufferError::ReadOnly);
        }
        let (item_size, shape, strides) =
            buffer_layout(&self.info, self.row_bytes).ok_or(BufferError::ZeroItemSize)?;
        Ok(BufferInfo::from_parts(
            BufferData::ReadOnly(&self.pixels),
            item_size,
            shape,
            strides,
        ))
    }
}

impl Flattenable for Image {
    const FACTORY_NAME: &'static str = "Image";

    fn flatten(&self, buffer: &mut FlatWriter) {
        flatten_raster(buffer, &self.info, self.row_bytes, self.pixels());
    }

    fn unflatten(buffer: &mut FlatReader<'_>) -> Result<Self, CloneError> {
        let (info, row_bytes, pixels) = unflatten_raster(buffer)?;
        Ok(Self::from_pixels(info, pixels, row_bytes)?)
    }

    /// Round trip, then require that dimensions, format, row bytes, and
    /// pixel data all came back unchanged.
    fn clone_flattenable(&self) -> Result<Arc<Self>, CloneError> {
        let copy =
            Self::deserialize_with_limits(&self.serialize(), ResourceLimits::unbounded_depth())?;
        if copy.info != self.info {
            return Err(CloneError::Mismatch("image info"));
        }
        if copy.row_bytes != self.row_bytes {
            return Err(CloneError::Mismatch("row bytes"));
        }
        if copy.pixels() != self.pixels() {
            return Err(CloneError::Mismatch("pixels"));
        }
        Ok(Arc::new(copy))
    }
}

// ---------------------------------------------------------------------------
// Bitmap
// ---------------------------------------------------------------------------

/// Mutable raster that owns its pixels.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    info: ImageInfo,
    row_bytes: usize,
    pixels: Vec<u8>,
}

impl Bitmap {
    /// Zero-filled bitmap with minimum row bytes.
    ///
    /// # Errors
    ///
    /// See [`Image::from_pixels`].
    pub fn new(info: ImageInfo) -> Result<Self, FormatError> {
        Self::with_row_bytes(info, 0)
    }

    /// Zero-filled bitmap with `row_bytes` between rows (0 = minimum).
    ///
    /// # Errors
    ///
    /// See [`Image::from_pixels`].
    pub fn with_row_bytes(info: ImageInfo, row_bytes: usize) -> Result<Self, FormatError> {
        let info = info.validated()?;
        let row_bytes = effective_row_bytes(&info, row_bytes)?;
        let len = info
            .compute_byte_size(row_bytes)
            .ok_or(FormatError::Overflow)?;
        Self::from_vec(info, vec![0; len], row_bytes)
    }

    /// Take ownership of `pixels` laid out as `info`.
    ///
    /// # Errors
    ///
    /// See [`Image::from_pixels`].
    pub fn from_vec(info: ImageInfo, pixels: Vec<u8>, row_bytes: usize) -> Result<Self, FormatError> {
        let (info, row_bytes) = check_storage(info, row_bytes, pixels.len())?;
        Ok(Self {
            info,
            row_bytes,
            pixels,
        })
    }

    /// Pixel format descriptor.
    pub fn info(&self) -> &ImageInfo {
        &self.info
    }

    /// Bytes between the starts of consecutive rows.
    pub fn row_bytes(&self) -> usize {
        self.row_bytes
    }

    /// Pixel bytes covered by the bitmap.
    pub fn pixels(&self) -> &[u8] {
        span(&self.info, self.row_bytes, &self.pixels)
    }

    /// Backing storage, writable.
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Bytes of the pixel at `(x, y)`, or `None` outside the bitmap.
    pub fn pixel_bytes(&self, x: u32, y: u32) -> Option<&[u8]> {
        pixel_at(&self.info, self.row_bytes, &self.pixels, x, y)
    }

    /// Overwrite the pixel at `(x, y)`. Returns `false` if the position is
    /// outside the bitmap or `pixel` is not one pixel long.
    pub fn write_pixel(&mut self, x: u32, y: u32, pixel: &[u8]) -> bool {
        let bpp = self.info.bytes_per_pixel();
        if pixel.len() != bpp || x >= self.info.width || y >= self.info.height {
            return false;
        }
        let offset = y as usize * self.row_bytes + x as usize * bpp;
        match self.pixels.get_mut(offset..offset + bpp) {
            Some(dst) => {
                dst.copy_from_slice(pixel);
                true
            }
            None => false,
        }
    }

    /// Set every pixel to `pixel`. Returns `false` if `pixel` is not one
    /// pixel long.
    pub fn erase(&mut self, pixel: &[u8]) -> bool {
        let bpp = self.info.bytes_per_pixel();
        if pixel.len() != bpp {
            return false;
        }
        let row_len = self.info.width as usize * bpp;
        for row in self.pixels.chunks_mut(self.row_bytes.max(1)) {
            let end = row_len.min(row.len());
            for dst in row[..end].chunks_exact_mut(bpp) {
                dst.copy_from_slice(pixel);
            }
        }
        true
    }

    /// Snapshot as an immutable [`Image`] with its own copy of the pixels.
    pub fn to_image(&self) -> Image {
        Image {
            info: self.info.clone(),
            row_bytes: self.row_bytes,
            pixels: Arc::from(self.pixels.as_slice()),
        }
    }

    /// Convert into an [`Image`] without copying.
    pub fn into_image(self) -> Image {
        Image {
            info: self.info,
            row_bytes: self.row_bytes,
            pixels: self.pixels.into(),
        }
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("info", &self.info)
            .field("row_bytes", &self.row_bytes)
            .field("len", &self.pixels.len())
            .finish()
    }
}

impl ReadPixels for Bitmap {
    fn read_pixels(
        &self,
        dst_info: &ImageInfo,
        dst: &mut [u8],
        dst_row_bytes: usize,
        src_x: i32,
        src_y: i32,
    ) -> bool {
        copy_rect(
            &self.info,
            &self.pixels,
            self.row_bytes,
            dst_info,
            dst,
            dst_row_bytes,
            src_x,
            src_y,
        )
    }
}

impl BufferProtocol for Bitmap {
    fn request(&mut self, writable: bool) -> Result<BufferInfo<'_>, BufferError> {
        let (item_size, shape, strides) =
            buffer_layout(&self.info, self.row_bytes).ok_or(BufferError::ZeroItemSize)?;
        let data = if writable {
            BufferData::Writable(&mut self.pixels)
        } else {
            BufferData::ReadOnly(&self.pixels)
        };
        Ok(BufferInfo::from_parts(data, item_size, shape, strides))
    }
}

impl Flattenable for Bitmap {
    const FACTORY_NAME: &'static str = "Bitmap";

    fn flatten(&self, buffer: &mut FlatWriter) {
        flatten_raster(buffer, &self.info, self.row_bytes, self.pixels());
    }

    fn unflatten(buffer: &mut FlatReader<'_>) -> Result<Self, CloneError> {
        let (info, row_bytes, pixels) = unflatten_raster(buffer)?;
        Ok(Self::from_vec(info, pixels.to_vec(), row_bytes)?)
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn effective_row_bytes(info: &ImageInfo, row_bytes: usize) -> Result<usize, FormatError> {
    if info.color_type == ColorType::Unknown {
        return Err(FormatError::UnknownColorType(info.color_type));
    }
    let min = info.min_row_bytes().ok_or(FormatError::Overflow)?;
    match row_bytes {
        0 => Ok(min),
        rb if rb < min => Err(FormatError::RowBytesTooSmall { row_bytes: rb, min }),
        rb => Ok(rb),
    }
}

fn check_storage(
    info: ImageInfo,
    row_bytes: usize,
    len: usize,
) -> Result<(ImageInfo, usize), FormatError> {
    let info = info.validated()?;
    let row_bytes = effective_row_bytes(&info, row_bytes)?;
    let required = info
        .compute_byte_size(row_bytes)
        .ok_or(FormatError::Overflow)?;
    if required > len {
        return Err(FormatError::BufferTooSmall {
            required,
            actual: len,
        });
    }
    Ok((info, row_bytes))
}

/// The part of `pixels` covered by `info` at `row_bytes`. Storage was
/// checked at construction, so the span is always in bounds.
fn span<'a>(info: &ImageInfo, row_bytes: usize, pixels: &'a [u8]) -> &'a [u8] {
    let len = info.compute_byte_size(row_bytes).unwrap_or(0);
    pixels.get(..len).unwrap_or_default()
}

fn pixel_at<'a>(
    info: &ImageInfo,
    row_bytes: usize,
    pixels: &'a [u8],
    x: u32,
    y: u32,
) -> Option<&'a [u8]> {
    if x >= info.width || y >= info.height {
        return None;
    }
    let bpp = info.bytes_per_pixel();
    let offset = (y as usize)
        .checked_mul(row_bytes)?
        .checked_add(x as usize * bpp)?;
    pixels.get(offset..offset.checked_add(bpp)?)
}

/// Copy the part of the source that the destination rectangle, placed at
/// `(src_x, src_y)`, overlaps. Destination pixel `(dx, dy)` receives source
/// pixel `(src_x + dx, src_y + dy)`.
#[allow(clippy::too_many_arguments)]
fn copy_rect(
    src_info: &ImageInfo,
    src: &[u8],
    src_row_bytes: usize,
    dst_info: &ImageInfo,
    dst: &mut [u8],
    dst_row_bytes: usize,
    src_x: i32,
    src_y: i32,
) -> bool {
    if dst_info.color_type != src_info.color_type
        || dst_info.color_type == ColorType::Unknown
        || dst_info.alpha_type != src_info.alpha_type
    {
        return false;
    }
    if let (Some(a), Some(b)) = (&dst_info.color_space, &src_info.color_space)
        && a != b
    {
        return false;
    }
    if !dst_info.valid_row_bytes(dst_row_bytes) {
        return false;
    }
    match dst_info.compute_byte_size(dst_row_bytes) {
        Some(needed) if needed <= dst.len() => {}
        _ => return false,
    }

    let (sx, sy) = (i64::from(src_x), i64::from(src_y));
    let left = sx.max(0);
    let top = sy.max(0);
    let right = (sx + i64::from(dst_info.width)).min(i64::from(src_info.width));
    let bottom = (sy + i64::from(dst_info.height)).min(i64::from(src_info.height));
    if left >= right || top >= bottom {
        return false;
    }

    let bpp = src_info.bytes_per_pixel();
    let run = (right - left) as usize * bpp;
    let dst_left = (left - sx) as usize * bpp;
    for row in top..bottom {
        let src_off = row as usize * src_row_bytes + left as usize * bpp;
        let dst_off = (row - sy) as usize * dst_row_bytes + dst_left;
        let (Some(from), Some(to)) = (
            src.get(src_off..src_off + run),
            dst.get_mut(dst_off..dst_off + run),
        ) else {
            return false;
        };
        to.copy_from_slice(from);
    }
    true
}

fn flatten_raster(buffer: &mut FlatWriter, info: &ImageInfo, row_bytes: usize, pixels: &[u8]) {
    buffer.write_flattenable(info);
    buffer.write_u64(row_bytes as u64);
    buffer.write_bytes(pixels);
}

fn unflatten_raster<'a>(
    buffer: &mut FlatReader<'a>,
) -> Result<(ImageInfo, usize, &'a [u8]), CloneError> {
    let info = buffer.read_flattenable::<ImageInfo>()?;
    let rb = buffer.read_u64()?;
    let row_bytes = usize::try_from(rb).map_err(|_| CloneError::InvalidValue {
        field: "row bytes",
        value: rb,
    })?;
    let pixels = buffer.read_bytes()?;
    buffer.limits().check_bytes(pixels.len() as u64)?;
    Ok((info, row_bytes, pixels))
}

// ---------------------------------------------------------------------------
// Pixel unpacking
// ---------------------------------------------------------------------------

fn unorm8(v: u8) -> f32 {
    f32::from(v) / 255.0
}

fn unorm16(v: u16) -> f32 {
    f32::from(v) / 65535.0
}

fn unorm_bits(word: u32, shift: u32, bits: u32) -> f32 {
    let max = (1u32 << bits) - 1;
    ((word >> shift) & max) as f32 / max as f32
}

fn color(r: f32, g: f32, b: f32, a: f32) -> Color4f {
    Color4f { r, g, b, a }
}

/// Decode one pixel's stored components. Missing color channels read as 0,
/// a missing alpha channel as 1.
fn unpack(color_type: ColorType, px: &[u8]) -> Option<Color4f> {
    let u16_at = |i: usize| -> Option<u16> { Some(u16::from_ne_bytes([*px.get(i)?, *px.get(i + 1)?])) };
    let f16_at = |i: usize| -> Option<f32> {
        Some(f16::from_ne_bytes([*px.get(i)?, *px.get(i + 1)?]).to_f32())
    };
    let u32_at = || -> Option<u32> { Some(u32::from_ne_bytes(px.get(..4)?.try_into().ok()?)) };
    let f32_at = |i: usize| -> Option<f32> {
        Some(f32::from_ne_bytes(px.get(i..i + 4)?.try_into().ok()?))
    };
    Some(match color_type {
        ColorType::Unknown => return None,
        ColorType::Alpha8 => color(0.0, 0.0, 0.0, unorm8(*px.first()?)),
        ColorType::Gray8 => {
            let v = unorm8(*px.first()?);
            color(v, v, v, 1.0)
        }
        ColorType::R8Unorm => color(unorm8(*px.first()?), 0.0, 0.0, 1.0),
        ColorType::R8g8Unorm => color(unorm8(*px.first()?), unorm8(*px.get(1)?), 0.0, 1.0),
        ColorType::Rgba8888 | ColorType::Srgba8888 => match px {
            [r, g, b, a, ..] => color(unorm8(*r), unorm8(*g), unorm8(*b), unorm8(*a)),
            _ => return None,
        },
        ColorType::Rgb888x => match px {
            [r, g, b, _, ..] => color(unorm8(*r), unorm8(*g), unorm8(*b), 1.0),
            _ => return None,
        },
        ColorType::Bgra8888 => match px {
            [b, g, r, a, ..] => color(unorm8(*r), unorm8(*g), unorm8(*b), unorm8(*a)),
            _ => return None,
        },
        ColorType::Rgb565 => {
            let w = u32::from(u16_at(0)?);
            color(
                unorm_bits(w, 11, 5),
                unorm_bits(w, 5, 6),
                unorm_bits(w, 0, 5),
                1.0,
            )
        }
        ColorType::Argb4444 => {
            let w = u32::from(u16_at(0)?);
            color(
                unorm_bits(w, 8, 4),
                unorm_bits(w, 4, 4),
                unorm_bits(w, 0, 4),
                unorm_bits(w, 12, 4),
            )
        }
        ColorType::Rgba1010102 => {
            let w = u32_at()?;
            color(
                unorm_bits(w, 0, 10),
                unorm_bits(w, 10, 10),
                unorm_bits(w, 20, 10),
                unorm_bits(w, 30, 2),
            )
        }
        ColorType::Bgra1010102 => {
            let w = u32_at()?;
            color(
                unorm_bits(w, 20, 10),
                unorm_bits(w, 10, 10),
                unorm_bits(w, 0, 10),
                unorm_bits(w, 30, 2),
            )
        }
        ColorType::Rgb101010x => {
            let w = u32_at()?;
            color(
                unorm_bits(w, 0, 10),
                unorm_bits(w, 10, 10),
                unorm_bits(w, 20, 10),
                1.0,
            )
        }
        ColorType::Bgr101010x => {
            let w = u32_at()?;
            color(
                unorm_bits(w, 20, 10),
                unorm_bits(w, 10, 10),
                unorm_bits(w, 0, 10),
                1.0,
            )
        }
        ColorType::RgbaF16Norm | ColorType::RgbaF16 => color(
            f16_at(0)?,
            f16_at(2)?,
            f16_at(4)?,
            f16_at(6)?,
        ),
        ColorType::RgbaF32 => color(f32_at(0)?, f32_at(4)?, f32_at(8)?, f32_at(12)?),
        ColorType::A16Float => color(0.0, 0.0, 0.0, f16_at(0)?),
        ColorType::A16Unorm => color(0.0, 0.0, 0.0, unorm16(u16_at(0)?)),
        ColorType::R16g16Float => color(f16_at(0)?, f16_at(2)?, 0.0, 1.0),
        ColorType::R16g16Unorm => color(unorm16(u16_at(0)?), unorm16(u16_at(2)?), 0.0, 1.0),
        ColorType::R16g16b16a16Unorm => color(
            unorm16(u16_at(0)?),
            unorm16(u16_at(2)?),
            unorm16(u16_at(4)?),
            unorm16(u16_at(6)?),
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ColorSpace;
    use crate::limits::{LimitExceeded, ResourceLimits};
    use crate::pixel::AlphaType;
    use crate::traits::ArrayShape;

    fn gradient_image(width: u32, height: u32) -> Image {
        let mut bitmap = Bitmap::new(ImageInfo::rgba8888_premul(width, height)).unwrap();
        for y in 0..height {
            for x in 0..width {
                assert!(bitmap.write_pixel(x, y, &[x as u8, y as u8, 7, 255]));
            }
        }
        bitmap.into_image()
    }

    // --- Construction ---

    #[test]
    fn from_pixels_checks_storage() {
        let info = ImageInfo::rgba8888_premul(4, 2);
        assert!(Image::from_pixels(info.clone(), vec![0u8; 32], 0).is_ok());
        assert_eq!(
            Image::from_pixels(info.clone(), vec![0u8; 31], 0).unwrap_err(),
            FormatError::BufferTooSmall {
                required: 32,
                actual: 31
            }
        );
        assert_eq!(
            Image::from_pixels(info.clone(), vec![0u8; 64], 12).unwrap_err(),
            FormatError::RowBytesTooSmall {
                row_bytes: 12,
                min: 16
            }
        );
        // Last row need not be padded: 20 + 16.
        let padded = Image::from_pixels(info, vec![0u8; 36], 20).unwrap();
        assert_eq!(padded.row_bytes(), 20);
        assert_eq!(padded.pixels().len(), 36);
    }

    #[test]
    fn from_pixels_rejects_unknown() {
        let info = ImageInfo::new(2, 2, ColorType::Unknown, AlphaType::Unknown, None);
        assert_eq!(
            Image::from_pixels(info, vec![0u8; 16], 0).unwrap_err(),
            FormatError::UnknownColorType(ColorType::Unknown)
        );
    }

    #[test]
    fn bitmap_erase_skips_padding() {
        let info = ImageInfo::new(2, 2, ColorType::Gray8, AlphaType::Opaque, None);
        let mut bitmap = Bitmap::with_row_bytes(info, 4).unwrap();
        assert!(bitmap.erase(&[9]));
        assert!(!bitmap.erase(&[9, 9]));
        assert_eq!(bitmap.pixels(), &[9, 9, 0, 0, 9, 9]);
    }

    // --- ReadPixels ---

    #[test]
    fn read_full_image() {
        let image = gradient_image(3, 2);
        let mut dst = vec![0u8; 24];
        assert!(image.read_pixels(image.info(), &mut dst, 12, 0, 0));
        assert_eq!(&dst[..], image.pixels());
    }

    #[test]
    fn read_offset_clips_to_source() {
        let image = gradient_image(4, 4);
        let dst_info = ImageInfo::rgba8888_premul(2, 2);
        let mut dst = vec![0u8; 16];
        // Only source pixel (3, 3) overlaps; it lands at destination (0, 0).
        assert!(image.read_pixels(&dst_info, &mut dst, 8, 3, 3));
        assert_eq!(&dst[..4], &[3, 3, 7, 255]);
        assert_eq!(&dst[4..], &[0u8; 12]);

        // Negative origin shifts the copy right and down.
        let mut dst = vec![0u8; 16];
        assert!(image.read_pixels(&dst_info, &mut dst, 8, -1, -1));
        assert_eq!(&dst[12..], &[0, 0, 7, 255]);
        assert_eq!(&dst[..4], &[0u8; 4]);
    }

    #[test]
    fn read_misses_return_false() {
        let image = gradient_image(4, 4);
        let dst_info = ImageInfo::rgba8888_premul(2, 2);
        let mut dst = vec![0u8; 16];
        assert!(!image.read_pixels(&dst_info, &mut dst, 8, 4, 0));
        assert!(!image.read_pixels(&dst_info, &mut dst, 8, -2, 0));
        assert!(!image.read_pixels(&dst_info, &mut dst, 8, i32::MAX, i32::MIN));
    }

    #[test]
    fn read_never_converts_formats() {
        let image = gradient_image(2, 2);
        let mut dst = vec![0u8; 64];
        let bgra = ImageInfo::new(2, 2, ColorType::Bgra8888, AlphaType::Premul, None);
        assert!(!image.read_pixels(&bgra, &mut dst, 8, 0, 0));
        let unpremul = ImageInfo::rgba8888_premul(2, 2).with_alpha_type(AlphaType::Unpremul);
        assert!(!image.read_pixels(&unpremul, &mut dst, 8, 0, 0));
        let tagged = ImageInfo::rgba8888_premul(2, 2).with_color_space(Some(ColorSpace::srgb()));
        assert!(image.read_pixels(&tagged, &mut dst, 8, 0, 0));
    }

    #[test]
    fn read_rejects_short_destination() {
        let image = gradient_image(2, 2);
        let mut dst = vec![0u8; 15];
        assert!(!image.read_pixels(image.info(), &mut dst, 8, 0, 0));
        let mut dst = vec![0u8; 16];
        assert!(!image.read_pixels(image.info(), &mut dst, 4, 0, 0));
    }

    // --- Buffer protocol ---

    #[test]
    fn image_buffer_is_read_only() {
        let mut image = gradient_image(3, 2);
        assert_eq!(image.request(true).unwrap_err(), BufferError::ReadOnly);
        let view = image.request(false).unwrap();
        assert_eq!(view.shape(), &[2, 3, 4]);
        assert_eq!(view.total_bytes(), 24);
    }

    #[test]
    fn bitmap_buffer_is_writable() {
        let mut bitmap = Bitmap::new(ImageInfo::rgba8888_premul(2, 1)).unwrap();
        {
            let mut view = bitmap.request(true).unwrap();
            view.data_mut().unwrap()[4] = 200;
        }
        assert_eq!(bitmap.pixel_bytes(1, 0), Some(&[200, 0, 0, 0][..]));
    }

    // --- Flattenable ---

    #[test]
    fn image_clone_copies_pixels() {
        let image = gradient_image(5, 3);
        let copy = image.clone_flattenable().unwrap();
        assert_eq!(*copy, image);
        assert!(!copy.shares_pixels(&image));
    }

    #[test]
    fn bitmap_clone_is_independent() {
        let mut bitmap = Bitmap::new(ImageInfo::rgba8888_premul(2, 2)).unwrap();
        assert!(bitmap.erase(&[1, 2, 3, 4]));
        let copy = bitmap.clone_flattenable().unwrap();
        bitmap.pixels_mut()[0] = 99;
        assert_eq!(copy.pixel_bytes(0, 0), Some(&[1, 2, 3, 4][..]));
    }

    #[test]
    fn pixel_payload_limit() {
        let image = gradient_image(8, 8);
        let limits = ResourceLimits::none().with_max_bytes(100);
        let err = Image::deserialize_with_limits(&image.serialize(), limits).unwrap_err();
        assert_eq!(
            err,
            CloneError::Limit(LimitExceeded::Bytes {
                actual: 256,
                max: 100
            })
        );
    }

    #[test]
    fn short_payload_is_format_error() {
        let mut writer = FlatWriter::new();
        writer.write_str(Image::FACTORY_NAME);
        writer.write_flattenable(&ImageInfo::rgba8888_premul(2, 2));
        writer.write_u64(8);
        writer.write_bytes(&[0u8; 8]);
        let err = Image::deserialize(&writer.finish()).unwrap_err();
        assert!(matches!(
            err,
            CloneError::Format(FormatError::BufferTooSmall { required: 16, .. })
        ));
    }

    // --- Unpacking ---

    #[test]
    fn unpack_formats() {
        assert_eq!(
            unpack(ColorType::Bgra8888, &[0, 0, 255, 255]),
            Some(color(1.0, 0.0, 0.0, 1.0))
        );
        assert_eq!(
            unpack(ColorType::Gray8, &[255]),
            Some(color(1.0, 1.0, 1.0, 1.0))
        );
        let red565 = 0xf800u16.to_ne_bytes();
        assert_eq!(
            unpack(ColorType::Rgb565, &red565),
            Some(color(1.0, 0.0, 0.0, 1.0))
        );
        // 1.0 and -2.0 in half precision.
        let mut halves = Vec::new();
        for bits in [0x3c00u16, 0xc000, 0, 0x3c00] {
            halves.extend_from_slice(&bits.to_ne_bytes());
        }
        assert_eq!(
            unpack(ColorType::RgbaF16, &halves),
            Some(color(1.0, -2.0, 0.0, 1.0))
        );
        let alpha = f16::from_f32(0.5).to_ne_bytes();
        assert_eq!(
            unpack(ColorType::A16Float, &alpha),
            Some(color(0.0, 0.0, 0.0, 0.5))
        );
        let mut rg = f16::from_f32(0.25).to_ne_bytes().to_vec();
        rg.extend_from_slice(&f16::from_f32(-1.5).to_ne_bytes());
        assert_eq!(
            unpack(ColorType::R16g16Float, &rg),
            Some(color(0.25, -1.5, 0.0, 1.0))
        );
        assert_eq!(unpack(ColorType::A16Float, &[0]), None);
        assert_eq!(unpack(ColorType::Rgba8888, &[1, 2]), None);
        assert_eq!(unpack(ColorType::Unknown, &[]), None);
    }
}
