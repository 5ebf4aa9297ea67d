//! Capability traits.
//!
//! The layer never reaches into the objects it works with. It reads pixels
//! through [`ReadPixels`], acquires foreign memory through
//! [`BufferProtocol`], and reads array metadata through [`ArrayShape`].

use crate::buffer::BufferInfo;
use crate::error::BufferError;
use crate::info::ImageInfo;

/// Something pixels can be copied out of: an image, bitmap, or surface.
pub trait ReadPixels {
    /// Copy pixels into `dst`, laid out as `dst_info` with `dst_row_bytes`
    /// between rows, taking the source rectangle whose top-left corner is
    /// `(src_x, src_y)`.
    ///
    /// Returns `false` if nothing was copied: the rectangle misses the
    /// source, the formats differ, or `dst` is too small. That is a
    /// result, not an error.
    fn read_pixels(
        &self,
        dst_info: &ImageInfo,
        dst: &mut [u8],
        dst_row_bytes: usize,
        src_x: i32,
        src_y: i32,
    ) -> bool;
}

/// Exporter side of a strided buffer protocol.
pub trait BufferProtocol {
    /// Describe this object's memory for the duration of the borrow.
    ///
    /// # Errors
    ///
    /// [`BufferError::ReadOnly`] if `writable` is requested on memory that
    /// cannot be written.
    fn request(&mut self, writable: bool) -> Result<BufferInfo<'_>, BufferError>;
}

/// Shape metadata of an N-dimensional array.
pub trait ArrayShape {
    /// Extent of each axis, outermost first.
    fn shape(&self) -> &[usize];

    /// Byte step of each axis.
    fn strides(&self) -> &[usize];

    /// Bytes per array element.
    fn item_size(&self) -> usize;

    /// Number of axes.
    fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Whether elements are packed in row-major order.
    ///
    /// Axes of extent 1 may carry any stride.
    fn is_c_contiguous(&self) -> bool {
        let mut expected = self.item_size();
        for (&extent, &stride) in self.shape().iter().zip(self.strides()).rev() {
            if extent > 1 && stride != expected {
                return false;
            }
            expected = expected.saturating_mul(extent);
        }
        true
    }
}
