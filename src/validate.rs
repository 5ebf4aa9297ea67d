//! Buffer-to-format validation.
//!
//! Reconciles an [`ImageInfo`] with a [`BufferInfo`] before any pixel is
//! read or written, and yields the effective row stride.

use tracing::{debug, trace};

use crate::buffer::BufferInfo;
use crate::error::FormatError;
use crate::info::ImageInfo;
use crate::limits::ResourceLimits;
use crate::traits::ArrayShape;

/// Validate `buffer` against `info` with no resource limits.
///
/// `row_bytes` of 0 selects the minimum stride (`width * bytes_per_pixel`).
/// Returns the effective row stride.
///
/// # Errors
///
/// See [`BufferValidator::validate`].
pub fn validate_buffer_to_image_info(
    info: &ImageInfo,
    buffer: &BufferInfo<'_>,
    row_bytes: usize,
) -> Result<usize, FormatError> {
    BufferValidator::default().validate(info, buffer, row_bytes)
}

/// Buffer validator carrying resource limits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferValidator {
    limits: ResourceLimits,
}

impl BufferValidator {
    /// Validator enforcing `limits`.
    pub fn new(limits: ResourceLimits) -> Self {
        Self { limits }
    }

    /// Limits in force.
    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Check that `buffer` can hold `info` and return the effective row
    /// stride.
    ///
    /// The buffer must have 2 axes, or 3 with the trailing axis equal to the
    /// color type's channel count, and its per-pixel byte size must equal
    /// the color type's. A nonzero `row_bytes` must be at least the minimum
    /// stride, and `(height - 1) * stride + min_stride` must fit in the
    /// buffer.
    ///
    /// # Errors
    ///
    /// Returns a [`FormatError`] naming the first check that failed.
    pub fn validate(
        &self,
        info: &ImageInfo,
        buffer: &BufferInfo<'_>,
        row_bytes: usize,
    ) -> Result<usize, FormatError> {
        let result = self.check(info, buffer, row_bytes);
        match &result {
            Ok(stride) => trace!(
                width = info.width,
                height = info.height,
                color_type = ?info.color_type,
                stride,
                "buffer validated"
            ),
            Err(err) => debug!(
                width = info.width,
                height = info.height,
                color_type = ?info.color_type,
                shape = ?buffer.shape(),
                item_size = buffer.item_size(),
                total_bytes = buffer.total_bytes(),
                row_bytes,
                %err,
                "buffer rejected"
            ),
        }
        result
    }

    fn check(
        &self,
        info: &ImageInfo,
        buffer: &BufferInfo<'_>,
        row_bytes: usize,
    ) -> Result<usize, FormatError> {
        let color_type = info.color_type;
        let bpp = color_type.bytes_per_pixel();
        if bpp == 0 {
            return Err(FormatError::UnknownColorType(color_type));
        }

        let pixel_items = match buffer.shape() {
            &[_, _] => 1,
            &[_, _, channels] if channels == color_type.channels() => channels,
            &[_, _, channels] => {
                return Err(FormatError::ChannelMismatch {
                    expected: color_type.channels(),
                    actual: channels,
                });
            }
            shape => return Err(FormatError::Dimensions(shape.len())),
        };
        let pixel_bytes = buffer.item_size().saturating_mul(pixel_items);
        if pixel_bytes != bpp {
            return Err(FormatError::ItemSizeMismatch {
                expected: bpp,
                actual: pixel_bytes,
            });
        }

        self.limits.check_image_info(info)?;

        let min = info.min_row_bytes().ok_or(FormatError::Overflow)?;
        let stride = match row_bytes {
            0 => min,
            rb if rb < min => {
                return Err(FormatError::RowBytesTooSmall { row_bytes: rb, min });
            }
            rb => rb,
        };

        let required = info
            .compute_byte_size(stride)
            .ok_or(FormatError::Overflow)?;
        self.limits.check_bytes(required as u64)?;
        if required > buffer.total_bytes() {
            return Err(FormatError::BufferTooSmall {
                required,
                actual: buffer.total_bytes(),
            });
        }
        Ok(stride)
    }
}
