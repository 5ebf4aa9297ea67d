//! Conversions between [`ImageInfo`] and array-shaped buffer metadata.
//!
//! A pixel buffer is described as a 2-D `(height, width)` array when a
//! pixel is a single element (one channel, or a packed word), otherwise as
//! a 3-D `(height, width, channels)` array of channel elements.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::buffer::{BufferData, BufferInfo};
use crate::color::ColorSpace;
use crate::error::FormatError;
use crate::info::ImageInfo;
use crate::pixel::{AlphaType, ColorType};
use crate::traits::ArrayShape;

/// Item size, shape, and strides describing `info` at `row_bytes`
/// (0 = minimum). `None` for an unknown color type.
pub(crate) fn buffer_layout(
    info: &ImageInfo,
    row_bytes: usize,
) -> Option<(usize, Vec<usize>, Vec<usize>)> {
    let (channel, channels) = info.color_type.layout()?;
    let bpp = info.bytes_per_pixel();
    let row_bytes = match row_bytes {
        0 => info.min_row_bytes()?,
        rb => rb,
    };
    let (h, w) = (info.height as usize, info.width as usize);
    Some(if channels == 1 {
        (bpp, vec![h, w], vec![row_bytes, bpp])
    } else {
        let item = channel.byte_size();
        (item, vec![h, w, channels], vec![row_bytes, bpp, item])
    })
}

/// Build an [`ImageInfo`] from an array's shape.
///
/// Height is axis 0 and width axis 1. A third axis must match the color
/// type's channel count. Pixels within a row must be packed; rows may be
/// padded. The data itself is not touched.
///
/// `color_space` is shared, not copied; it is immutable behind its `Arc`.
///
/// # Errors
///
/// Returns a [`FormatError`] for an unknown color type, the wrong number of
/// axes, a channel or item size mismatch, unpacked pixels, overlapping
/// rows, or an alpha type invalid for the color type.
pub fn image_info_from_array<A: ArrayShape + ?Sized>(
    array: &A,
    color_type: ColorType,
    alpha_type: AlphaType,
    color_space: Option<Arc<ColorSpace>>,
) -> Result<ImageInfo, FormatError> {
    let bpp = color_type.bytes_per_pixel();
    if bpp == 0 {
        return Err(FormatError::UnknownColorType(color_type));
    }
    let (height, width, items) = match array.shape() {
        &[h, w] => (h, w, 1),
        &[h, w, c] if c == color_type.channels() => (h, w, c),
        &[_, _, c] => {
            return Err(FormatError::ChannelMismatch {
                expected: color_type.channels(),
                actual: c,
            });
        }
        shape => return Err(FormatError::Dimensions(shape.len())),
    };
    let item_size = array.item_size();
    let pixel_bytes = item_size.saturating_mul(items);
    if pixel_bytes != bpp {
        return Err(FormatError::ItemSizeMismatch {
            expected: bpp,
            actual: pixel_bytes,
        });
    }

    let strides = array.strides();
    let packed = |axis: usize, extent: usize, step: usize| extent <= 1 || strides.get(axis) == Some(&step);
    if !packed(1, width, bpp) || (items > 1 && !packed(2, items, item_size)) {
        return Err(FormatError::NotContiguous);
    }
    let row_stride = strides.first().copied().unwrap_or_default();
    let min = width.checked_mul(bpp).ok_or(FormatError::Overflow)?;
    if height > 1 && row_stride < min {
        return Err(FormatError::RowBytesTooSmall {
            row_bytes: row_stride,
            min,
        });
    }

    let width = u32::try_from(width).map_err(|_| FormatError::Overflow)?;
    let height = u32::try_from(height).map_err(|_| FormatError::Overflow)?;
    ImageInfo::new(width, height, color_type, alpha_type, color_space).validated()
}

/// Describe memory laid out as `info` as a buffer-protocol view.
///
/// `row_bytes` of 0 selects the minimum. With `read_only` set a writable
/// slice is downgraded; a read-only slice stays read-only either way.
///
/// # Errors
///
/// [`FormatError::UnknownColorType`] if the color type has no layout. Every
/// other descriptor succeeds.
pub fn image_info_to_buffer_info<'a>(
    info: &ImageInfo,
    data: impl Into<BufferData<'a>>,
    row_bytes: usize,
    read_only: bool,
) -> Result<BufferInfo<'a>, FormatError> {
    let (item_size, shape, strides) = buffer_layout(info, row_bytes)
        .ok_or(FormatError::UnknownColorType(info.color_type))?;
    let view = BufferInfo::from_parts(data.into(), item_size, shape, strides);
    Ok(if read_only { view.into_read_only() } else { view })
}

/// Array-interchange description of a pixel buffer (version 3 of the
/// array interface protocol).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct ArrayInterface {
    /// Extent of each axis.
    pub shape: Vec<usize>,
    /// Element type code, e.g. `|u1` or `<f4`.
    pub typestr: &'static str,
    /// Byte step of each axis.
    pub strides: Vec<usize>,
    /// Data address and read-only flag, when attached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<(usize, bool)>,
    /// Protocol version.
    pub version: u32,
}

impl ArrayInterface {
    /// Protocol version emitted.
    pub const VERSION: u32 = 3;

    /// Attach a data address and read-only flag.
    pub fn with_data(mut self, address: usize, read_only: bool) -> Self {
        self.data = Some((address, read_only));
        self
    }

    /// Key/value form.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("shape".into(), Value::from(self.shape.clone()));
        map.insert("typestr".into(), Value::from(self.typestr));
        map.insert("strides".into(), Value::from(self.strides.clone()));
        if let Some((address, read_only)) = self.data {
            map.insert(
                "data".into(),
                Value::Array(vec![Value::from(address), Value::from(read_only)]),
            );
        }
        map.insert("version".into(), Value::from(self.version));
        map
    }
}

/// Describe `info` at `row_bytes` (0 = minimum) for array-interchange
/// consumers.
///
/// # Errors
///
/// [`FormatError::UnknownColorType`] for an unknown color type,
/// [`FormatError::InvalidAlphaType`] for an alpha type invalid with the
/// color type, and [`FormatError::RowBytesTooSmall`] for a nonzero stride
/// below the minimum.
pub fn image_info_to_array_interface(
    info: &ImageInfo,
    row_bytes: usize,
) -> Result<ArrayInterface, FormatError> {
    let channel = info
        .color_type
        .channel_type()
        .ok_or(FormatError::UnknownColorType(info.color_type))?;
    if info.color_type.validate_alpha_type(info.alpha_type).is_none() {
        return Err(FormatError::InvalidAlphaType {
            color_type: info.color_type,
            alpha_type: info.alpha_type,
        });
    }
    let min = info.min_row_bytes().ok_or(FormatError::Overflow)?;
    if row_bytes != 0 && row_bytes < min {
        return Err(FormatError::RowBytesTooSmall { row_bytes, min });
    }
    let (_, shape, strides) =
        buffer_layout(info, row_bytes).ok_or(FormatError::UnknownColorType(info.color_type))?;
    Ok(ArrayInterface {
        shape,
        typestr: channel.typestr(),
        strides,
        data: None,
        version: ArrayInterface::VERSION,
    })
}
