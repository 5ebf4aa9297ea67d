//! Error types.
//!
//! Three kinds, matching where a failure is detected:
//!
//! - [`FormatError`]: shape, stride, or color/alpha/channel mismatch.
//!   Always caller-fixable and always raised before memory is touched.
//! - [`BufferError`]: access-mode violation on a buffer.
//! - [`CloneError`]: a serialize/deserialize round trip failed.
//!
//! [`Error`] wraps all three for operations that can raise more than one.

use thiserror::Error;

use crate::limits::LimitExceeded;
use crate::pixel::{AlphaType, ColorType};

/// Incompatible shape, stride, or pixel-format combination.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum FormatError {
    /// The color type has no pixel layout.
    #[error("color type {0:?} has no pixel layout")]
    UnknownColorType(ColorType),
    /// The alpha type is not valid for the color type.
    #[error("alpha type {alpha_type:?} is not valid for color type {color_type:?}")]
    InvalidAlphaType {
        /// Requested color type.
        color_type: ColorType,
        /// Rejected alpha type.
        alpha_type: AlphaType,
    },
    /// The buffer or array has an unsupported number of axes.
    #[error("expected 2 or 3 axes, got {0}")]
    Dimensions(usize),
    /// The trailing axis of a 3-D buffer does not match the channel count.
    #[error("trailing axis has {actual} entries, color type has {expected} channels")]
    ChannelMismatch {
        /// Channel count implied by the color type.
        expected: usize,
        /// Trailing axis extent.
        actual: usize,
    },
    /// Per-pixel byte size of the buffer disagrees with the color type.
    #[error("buffer pixels are {actual} bytes, color type needs {expected}")]
    ItemSizeMismatch {
        /// Bytes per pixel of the color type.
        expected: usize,
        /// Bytes per pixel described by the buffer.
        actual: usize,
    },
    /// Caller-supplied row bytes are below `width * bytes_per_pixel`.
    #[error("row bytes {row_bytes} smaller than minimum {min}")]
    RowBytesTooSmall {
        /// Requested row bytes.
        row_bytes: usize,
        /// Minimum row bytes.
        min: usize,
    },
    /// The buffer cannot hold `height` rows at the effective stride.
    #[error("buffer too small: {required} bytes required, {actual} available")]
    BufferTooSmall {
        /// Bytes needed.
        required: usize,
        /// Bytes available.
        actual: usize,
    },
    /// The array is not laid out in row-major order.
    #[error("array must be C-contiguous")]
    NotContiguous,
    /// Size arithmetic overflowed `usize`.
    #[error("size computation overflowed")]
    Overflow,
    /// A configured resource limit was exceeded.
    #[error(transparent)]
    Limit(#[from] LimitExceeded),
}

/// Buffer access-mode violation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum BufferError {
    /// Mutable access was requested on read-only memory.
    #[error("buffer is read-only")]
    ReadOnly,
    /// Shape and strides have different lengths.
    #[error("shape has {shape} axes but strides has {strides}")]
    StrideLength {
        /// Number of shape entries.
        shape: usize,
        /// Number of stride entries.
        strides: usize,
    },
    /// Item size of zero.
    #[error("item size must be nonzero")]
    ZeroItemSize,
    /// The described extent runs past the end of the data.
    #[error("buffer extent {extent} exceeds data length {len}")]
    OutOfBounds {
        /// Last byte offset touched by the shape and strides, plus one.
        extent: usize,
        /// Data length.
        len: usize,
    },
}

/// A serialize/deserialize round trip failed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum CloneError {
    /// Input ended before the value was complete.
    #[error("serialized data truncated: needed {needed} more bytes")]
    Truncated {
        /// Bytes still required.
        needed: usize,
    },
    /// Bytes remained after the value was read.
    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),
    /// The factory tag names a different type.
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        /// Factory the caller asked for.
        expected: &'static str,
        /// Factory found in the data.
        found: String,
    },
    /// No shader factory is registered under this name.
    #[error("no factory registered for {0}")]
    UnknownFactory(String),
    /// A field held a value outside its domain.
    #[error("invalid {field}: {value}")]
    InvalidValue {
        /// Field name.
        field: &'static str,
        /// Raw value read.
        value: u64,
    },
    /// A factory name was not valid UTF-8.
    #[error("factory name is not UTF-8")]
    InvalidName,
    /// The rebuilt object differs from the source.
    #[error("clone does not match source: {0}")]
    Mismatch(&'static str),
    /// A pixel payload did not fit its declared format.
    #[error(transparent)]
    Format(#[from] FormatError),
    /// A configured resource limit was exceeded.
    #[error(transparent)]
    Limit(#[from] LimitExceeded),
}

/// Any error raised by this crate.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum Error {
    /// See [`FormatError`].
    #[error(transparent)]
    Format(#[from] FormatError),
    /// See [`BufferError`].
    #[error(transparent)]
    Buffer(#[from] BufferError),
    /// See [`CloneError`].
    #[error(transparent)]
    Clone(#[from] CloneError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_error_display() {
        let err = FormatError::RowBytesTooSmall {
            row_bytes: 396,
            min: 400,
        };
        assert_eq!(err.to_string(), "row bytes 396 smaller than minimum 400");

        let err = FormatError::BufferTooSmall {
            required: 20_000,
            actual: 100,
        };
        assert_eq!(
            err.to_string(),
            "buffer too small: 20000 bytes required, 100 available"
        );
    }

    #[test]
    fn limit_is_transparent() {
        let err = FormatError::from(LimitExceeded::Width {
            actual: 5000,
            max: 4096,
        });
        assert_eq!(err.to_string(), "width 5000 exceeds limit 4096");
    }

    #[test]
    fn umbrella_from_conversions() {
        let err: Error = BufferError::ReadOnly.into();
        assert!(matches!(err, Error::Buffer(BufferError::ReadOnly)));

        let err: Error = FormatError::Overflow.into();
        assert!(matches!(err, Error::Format(FormatError::Overflow)));

        let err: Error = CloneError::TrailingBytes(3).into();
        assert_eq!(err.to_string(), "3 trailing bytes after value");
    }

    #[test]
    fn errors_are_std_errors() {
        fn assert_error<E: std::error::Error + Send + Sync + 'static>(_: &E) {}
        assert_error(&FormatError::NotContiguous);
        assert_error(&BufferError::ReadOnly);
        assert_error(&CloneError::InvalidName);
        assert_error(&Error::from(BufferError::ZeroItemSize));
    }
}
