//! Reading pixels into caller-supplied buffers.

use tracing::trace;

use crate::error::Error;
use crate::info::ImageInfo;
use crate::traits::{BufferProtocol, ReadPixels};
use crate::validate::BufferValidator;

/// Copy pixels from `readable` into `dst`, laid out as `info`.
///
/// The destination is acquired writable first, so a read-only buffer is
/// rejected before its shape is looked at. The buffer is then validated
/// against `info` (`dst_row_bytes` of 0 selects the minimum stride) and
/// the readable copies straight into it.
///
/// Returns the readable's own result: `false` means no pixels were copied
/// (the source rectangle missed, or the formats differ) and is not an
/// error.
///
/// # Errors
///
/// [`Error::Buffer`] if `dst` cannot be written, [`Error::Format`] if it
/// does not fit `info`.
pub fn read_pixels<R, B>(
    readable: &R,
    info: &ImageInfo,
    dst: &mut B,
    dst_row_bytes: usize,
    src_x: i32,
    src_y: i32,
) -> Result<bool, Error>
where
    R: ReadPixels + ?Sized,
    B: BufferProtocol + ?Sized,
{
    BufferValidator::default().read_pixels(readable, info, dst, dst_row_bytes, src_x, src_y)
}

impl BufferValidator {
    /// [`read_pixels`] under this validator's limits.
    ///
    /// # Errors
    ///
    /// See [`read_pixels`].
    pub fn read_pixels<R, B>(
        &self,
        readable: &R,
        info: &ImageInfo,
        dst: &mut B,
        dst_row_bytes: usize,
        src_x: i32,
        src_y: i32,
    ) -> Result<bool, Error>
    where
        R: ReadPixels + ?Sized,
        B: BufferProtocol + ?Sized,
    {
        let mut view = dst.request(true)?;
        let row_bytes = self.validate(info, &view, dst_row_bytes)?;
        let copied = readable.read_pixels(info, view.data_mut()?, row_bytes, src_x, src_y);
        trace!(copied, src_x, src_y, row_bytes, "read pixels");
        Ok(copied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{BufferInfo, HostArray};
    use crate::error::{BufferError, FormatError};
    use crate::image::{Bitmap, Image};
    use crate::limits::{LimitExceeded, ResourceLimits};
    use crate::pixel::{AlphaType, ColorType};
    use crate::validate::validate_buffer_to_image_info;
    use rayon::prelude::*;

    fn source(width: u32, height: u32) -> Image {
        let mut bitmap = Bitmap::new(ImageInfo::rgba8888_premul(width, height)).unwrap();
        for y in 0..height {
            for x in 0..width {
                assert!(bitmap.write_pixel(x, y, &[x as u8, y as u8, 0, 255]));
            }
        }
        bitmap.into_image()
    }

    #[test]
    fn reads_into_host_array() {
        let image = source(100, 50);
        let mut array = HostArray::zeros(1, vec![50, 100, 4]).unwrap();
        let copied = read_pixels(&image, image.info(), &mut array, 0, 0, 0).unwrap();
        assert!(copied);
        assert_eq!(array.as_bytes(), image.pixels());
    }

    #[test]
    fn reads_with_padded_stride() {
        let image = source(100, 50);
        let mut array = HostArray::zeros(1, vec![50, 128, 4]).unwrap();
        assert!(read_pixels(&image, image.info(), &mut array, 512, 0, 0).unwrap());
        // Row 1 starts at byte 512, not 400.
        assert_eq!(&array.as_bytes()[512..516], &[0, 1, 0, 255]);
        assert_eq!(&array.as_bytes()[400..404], &[0, 0, 0, 0]);
    }

    #[test]
    fn read_only_destination_fails_first() {
        let image = source(4, 4);
        let mut array = HostArray::zeros(1, vec![4, 4, 4]).unwrap().into_read_only();
        // The format is also wrong; the access mode is reported.
        let bad = ImageInfo::new(4, 4, ColorType::Unknown, AlphaType::Unknown, None);
        assert_eq!(
            read_pixels(&image, &bad, &mut array, 0, 0, 0),
            Err(Error::Buffer(BufferError::ReadOnly))
        );
        assert_eq!(
            read_pixels(&image, image.info(), &mut array, 0, 0, 0),
            Err(Error::Buffer(BufferError::ReadOnly))
        );
    }

    #[test]
    fn read_only_image_as_destination() {
        let image = source(2, 2);
        let mut target = source(2, 2);
        assert_eq!(
            read_pixels(&image, image.info(), &mut target, 0, 0, 0),
            Err(Error::Buffer(BufferError::ReadOnly))
        );
    }

    #[test]
    fn format_errors_surface() {
        let image = source(100, 50);
        let mut array = HostArray::zeros(1, vec![50, 100, 4]).unwrap();
        assert_eq!(
            read_pixels(&image, image.info(), &mut array, 396, 0, 0),
            Err(Error::Format(FormatError::RowBytesTooSmall {
                row_bytes: 396,
                min: 400
            }))
        );
        assert!(array.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn false_is_not_an_error() {
        let image = source(4, 4);
        let mut array = HostArray::zeros(1, vec![4, 4, 4]).unwrap();
        let info = ImageInfo::rgba8888_premul(4, 4);
        assert_eq!(read_pixels(&image, &info, &mut array, 0, 10, 10), Ok(false));

        let bgra = ImageInfo::new(4, 4, ColorType::Bgra8888, AlphaType::Premul, None);
        assert_eq!(read_pixels(&image, &bgra, &mut array, 0, 0, 0), Ok(false));
    }

    #[test]
    fn subrect_into_borrowed_slice() {
        let image = source(8, 8);
        let mut data = vec![0u8; 2 * 2 * 4];
        let mut view = BufferInfo::contiguous(&mut data, 1, vec![2, 2, 4]).unwrap();
        let info = ImageInfo::rgba8888_premul(2, 2);
        assert!(read_pixels(&image, &info, &mut view, 0, 5, 6).unwrap());
        assert_eq!(&data[..4], &[5, 6, 0, 255]);
        assert_eq!(&data[12..], &[6, 7, 0, 255]);
    }

    #[test]
    fn bitmap_to_bitmap() {
        let mut src = Bitmap::new(ImageInfo::rgba8888_premul(3, 3)).unwrap();
        assert!(src.erase(&[10, 20, 30, 255]));
        let mut dst = Bitmap::new(ImageInfo::rgba8888_premul(3, 3)).unwrap();
        let info = dst.info().clone();
        assert!(read_pixels(&src, &info, &mut dst, 0, 0, 0).unwrap());
        assert_eq!(dst.pixels(), src.pixels());
    }

    #[test]
    fn validator_limits_apply() {
        let image = source(100, 50);
        let mut array = HostArray::zeros(1, vec![50, 100, 4]).unwrap();
        let validator = BufferValidator::new(ResourceLimits::none().with_max_pixels(1000));
        assert_eq!(
            validator.read_pixels(&image, image.info(), &mut array, 0, 0, 0),
            Err(Error::Format(FormatError::Limit(LimitExceeded::Pixels {
                actual: 5000,
                max: 1000
            })))
        );
    }

    #[test]
    fn dyn_readable() {
        let image = source(2, 2);
        let readable: &dyn ReadPixels = &image;
        let mut array = HostArray::zeros(1, vec![2, 2, 4]).unwrap();
        assert!(read_pixels(readable, image.info(), &mut array, 0, 0, 0).unwrap());
    }

    #[test]
    fn concurrent_reads_match_serial() {
        let image = source(40, 30);
        let read = |i: u32| {
            let (x, y) = ((i % 8) as i32 * 4, (i / 8) as i32 * 3);
            let info = ImageInfo::rgba8888_premul(16, 12);
            let mut array = HostArray::zeros(1, vec![12, 32, 4]).unwrap();
            let row_bytes =
                validate_buffer_to_image_info(&info, &array.request(false).unwrap(), 128);
            let copied = read_pixels(&image, &info, &mut array, 128, x, y);
            (row_bytes, copied, array.into_vec())
        };
        let serial: Vec<_> = (0..64).map(read).collect();
        let parallel: Vec<_> = (0..64).into_par_iter().map(read).collect();
        assert_eq!(serial, parallel);
        assert!(serial.iter().all(|(rb, copied, _)| *rb == Ok(128) && *copied == Ok(true)));
    }
}
