//! Strided buffer descriptors.
//!
//! [`BufferInfo`] is the borrowed view a buffer exporter hands out: the
//! memory plus its item size, shape, and strides. The borrow ties the view
//! to the exporter, so nothing can keep it past the call that requested it.
//!
//! [`HostArray`] is an owned N-dimensional array that exports such views.

use std::fmt;

use crate::error::BufferError;
use crate::traits::{ArrayShape, BufferProtocol};

// ---------------------------------------------------------------------------
// BufferData
// ---------------------------------------------------------------------------

/// Borrowed buffer memory, tagged with its access mode.
pub enum BufferData<'a> {
    /// Memory that must not be written.
    ReadOnly(&'a [u8]),
    /// Memory the holder may write.
    Writable(&'a mut [u8]),
}

impl BufferData<'_> {
    /// Length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Whether the memory is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read access.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Self::ReadOnly(data) => *data,
            Self::Writable(data) => &**data,
        }
    }
}

impl<'a> From<&'a [u8]> for BufferData<'a> {
    fn from(data: &'a [u8]) -> Self {
        Self::ReadOnly(data)
    }
}

impl<'a> From<&'a mut [u8]> for BufferData<'a> {
    fn from(data: &'a mut [u8]) -> Self {
        Self::Writable(data)
    }
}

impl<'a> From<&'a Vec<u8>> for BufferData<'a> {
    fn from(data: &'a Vec<u8>) -> Self {
        Self::ReadOnly(data)
    }
}

impl<'a> From<&'a mut Vec<u8>> for BufferData<'a> {
    fn from(data: &'a mut Vec<u8>) -> Self {
        Self::Writable(data)
    }
}

// ---------------------------------------------------------------------------
// BufferInfo
// ---------------------------------------------------------------------------

/// Borrowed view of a foreign buffer: memory, item size, shape, strides.
#[non_exhaustive]
pub struct BufferInfo<'a> {
    data: BufferData<'a>,
    item_size: usize,
    shape: Vec<usize>,
    strides: Vec<usize>,
}

impl<'a> BufferInfo<'a> {
    /// Describe `data` with explicit shape and strides.
    ///
    /// # Errors
    ///
    /// Returns an error if the item size is zero or `shape` and `strides`
    /// differ in length. Extents are not checked against the data length;
    /// validation against a pixel format does that.
    pub fn new(
        data: impl Into<BufferData<'a>>,
        item_size: usize,
        shape: Vec<usize>,
        strides: Vec<usize>,
    ) -> Result<Self, BufferError> {
        if item_size == 0 {
            return Err(BufferError::ZeroItemSize);
        }
        if shape.len() != strides.len() {
            return Err(BufferError::StrideLength {
                shape: shape.len(),
                strides: strides.len(),
            });
        }
        Ok(Self {
            data: data.into(),
            item_size,
            shape,
            strides,
        })
    }

    /// Describe `data` as a row-major array of `shape`.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::ZeroItemSize`] for a zero item size.
    pub fn contiguous(
        data: impl Into<BufferData<'a>>,
        item_size: usize,
        shape: Vec<usize>,
    ) -> Result<Self, BufferError> {
        let strides = c_strides(item_size, &shape);
        Self::new(data, item_size, shape, strides)
    }

    /// Construct without checks; callers uphold the length invariant.
    pub(crate) fn from_parts(
        data: BufferData<'a>,
        item_size: usize,
        shape: Vec<usize>,
        strides: Vec<usize>,
    ) -> Self {
        debug_assert_eq!(shape.len(), strides.len());
        Self {
            data,
            item_size,
            shape,
            strides,
        }
    }

    /// Total bytes of memory behind the view.
    #[inline]
    pub fn total_bytes(&self) -> usize {
        self.data.len()
    }

    /// Whether the memory is read-only.
    #[inline]
    pub fn is_read_only(&self) -> bool {
        matches!(self.data, BufferData::ReadOnly(_))
    }

    /// The memory, read-only.
    #[inline]
    pub fn data(&self) -> &[u8] {
        self.data.as_slice()
    }

    /// The memory, writable.
    ///
    /// # Errors
    ///
    /// [`BufferError::ReadOnly`] if the view is read-only.
    pub fn data_mut(&mut self) -> Result<&mut [u8], BufferError> {
        match &mut self.data {
            BufferData::Writable(data) => Ok(&mut **data),
            BufferData::ReadOnly(_) => Err(BufferError::ReadOnly),
        }
    }

    /// Drop write access.
    pub fn into_read_only(self) -> Self {
        let data = match self.data {
            BufferData::Writable(data) => BufferData::ReadOnly(data),
            ro => ro,
        };
        Self { data, ..self }
    }

    /// Bytes from the first element to one past the last, per shape and
    /// strides. `None` on overflow.
    pub fn extent(&self) -> Option<usize> {
        extent(self.item_size, &self.shape, &self.strides)
    }

    /// A shorter-lived view of the same memory.
    ///
    /// # Errors
    ///
    /// [`BufferError::ReadOnly`] if `writable` is requested on a read-only
    /// view.
    pub fn reborrow(&mut self, writable: bool) -> Result<BufferInfo<'_>, BufferError> {
        let data = match &mut self.data {
            BufferData::Writable(data) => {
                if writable {
                    BufferData::Writable(&mut **data)
                } else {
                    BufferData::ReadOnly(&**data)
                }
            }
            BufferData::ReadOnly(_) if writable => return Err(BufferError::ReadOnly),
            BufferData::ReadOnly(data) => BufferData::ReadOnly(*data),
        };
        Ok(BufferInfo {
            data,
            item_size: self.item_size,
            shape: self.shape.clone(),
            strides: self.strides.clone(),
        })
    }
}

impl ArrayShape for BufferInfo<'_> {
    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn strides(&self) -> &[usize] {
        &self.strides
    }

    fn item_size(&self) -> usize {
        self.item_size
    }
}

impl BufferProtocol for BufferInfo<'_> {
    fn request(&mut self, writable: bool) -> Result<BufferInfo<'_>, BufferError> {
        self.reborrow(writable)
    }
}

impl fmt::Debug for BufferInfo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferInfo")
            .field("len", &self.total_bytes())
            .field("item_size", &self.item_size)
            .field("shape", &self.shape)
            .field("strides", &self.strides)
            .field("read_only", &self.is_read_only())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// HostArray (owned)
// ---------------------------------------------------------------------------

/// Owned N-dimensional byte array with strided layout.
///
/// Plays the host-array role: it carries shape, strides, item size, and a
/// read-only flag, and exports [`BufferInfo`] views on request.
#[derive(Clone, PartialEq, Eq)]
pub struct HostArray {
    data: Vec<u8>,
    item_size: usize,
    shape: Vec<usize>,
    strides: Vec<usize>,
    read_only: bool,
}

impl HostArray {
    /// Zero-filled row-major array.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero item size or a size that overflows.
    pub fn zeros(item_size: usize, shape: Vec<usize>) -> Result<Self, BufferError> {
        let len = shape
            .iter()
            .try_fold(item_size, |acc, &n| acc.checked_mul(n))
            .ok_or(BufferError::OutOfBounds {
                extent: usize::MAX,
                len: 0,
            })?;
        Self::from_vec(vec![0; len], item_size, shape)
    }

    /// Wrap `data` as a row-major array of `shape`.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero item size or if `data` is shorter than
    /// the shape requires.
    pub fn from_vec(data: Vec<u8>, item_size: usize, shape: Vec<usize>) -> Result<Self, BufferError> {
        let strides = c_strides(item_size, &shape);
        Self::with_strides(data, item_size, shape, strides)
    }

    /// Wrap `data` with explicit strides.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero item size, mismatched shape/stride
    /// lengths, or if the strided extent runs past `data`.
    pub fn with_strides(
        data: Vec<u8>,
        item_size: usize,
        shape: Vec<usize>,
        strides: Vec<usize>,
    ) -> Result<Self, BufferError> {
        if item_size == 0 {
            return Err(BufferError::ZeroItemSize);
        }
        if shape.len() != strides.len() {
            return Err(BufferError::StrideLength {
                shape: shape.len(),
                strides: strides.len(),
            });
        }
        let needed = extent(item_size, &shape, &strides).unwrap_or(usize::MAX);
        if needed > data.len() {
            return Err(BufferError::OutOfBounds {
                extent: needed,
                len: data.len(),
            });
        }
        Ok(Self {
            data,
            item_size,
            shape,
            strides,
            read_only: false,
        })
    }

    /// Mark the array read-only; later writable requests fail.
    pub fn into_read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Whether the array rejects writable requests.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Backing bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Backing bytes, writable by the owner regardless of the flag.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consume the array and return the backing `Vec<u8>`.
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl ArrayShape for HostArray {
    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn strides(&self) -> &[usize] {
        &self.strides
    }

    fn item_size(&self) -> usize {
        self.item_size
    }
}

impl BufferProtocol for HostArray {
    fn request(&mut self, writable: bool) -> Result<BufferInfo<'_>, BufferError> {
        let data = match (writable, self.read_only) {
            (true, true) => return Err(BufferError::ReadOnly),
            (true, false) => BufferData::Writable(&mut self.data),
            (false, _) => BufferData::ReadOnly(&self.data),
        };
        Ok(BufferInfo::from_parts(
            data,
            self.item_size,
            self.shape.clone(),
            self.strides.clone(),
        ))
    }
}

impl fmt::Debug for HostArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HostArray({:?}, item_size={}, read_only={})",
            self.shape, self.item_size, self.read_only
        )
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Row-major strides for `shape`.
pub(crate) fn c_strides(item_size: usize, shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![0; shape.len()];
    let mut step = item_size;
    for (stride, &extent) in strides.iter_mut().zip(shape).rev() {
        *stride = step;
        step = step.saturating_mul(extent);
    }
    strides
}

/// `item_size + Σ (shape[i] - 1) * strides[i]`, or 0 if any axis is empty.
fn extent(item_size: usize, shape: &[usize], strides: &[usize]) -> Option<usize> {
    if shape.contains(&0) {
        return Some(0);
    }
    shape
        .iter()
        .zip(strides)
        .try_fold(item_size, |acc, (&n, &stride)| {
            (n - 1).checked_mul(stride)?.checked_add(acc)
        })
}
