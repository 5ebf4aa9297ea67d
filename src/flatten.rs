//! Flattenable serialization.
//!
//! A flattenable is written as a length-prefixed factory name followed by
//! its payload. Nested flattenables (children, images, color spaces) are
//! written inline with their own factory name. All integers are
//! little-endian.
//!
//! The serialized form is the only cloning path for the shared graphics
//! objects in this crate: [`Flattenable::clone_flattenable`] round-trips
//! through it unless a type overrides it.

use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::CloneError;
use crate::limits::ResourceLimits;

/// A value with a serialized form and a matching deserializer.
pub trait Flattenable: Sized {
    /// Name written ahead of the payload and checked on read.
    const FACTORY_NAME: &'static str;

    /// Write the payload (without the factory name).
    fn flatten(&self, buffer: &mut FlatWriter);

    /// Read a payload written by [`flatten`](Self::flatten).
    fn unflatten(buffer: &mut FlatReader<'_>) -> Result<Self, CloneError>;

    /// Serialize with the factory name.
    fn serialize(&self) -> Bytes {
        let mut writer = FlatWriter::new();
        writer.write_flattenable(self);
        writer.finish()
    }

    /// Deserialize data produced by [`serialize`](Self::serialize).
    ///
    /// # Errors
    ///
    /// Fails on a foreign factory name, truncated input, trailing bytes,
    /// or any payload error.
    fn deserialize(data: &[u8]) -> Result<Self, CloneError> {
        Self::deserialize_with_limits(data, ResourceLimits::none())
    }

    /// Like [`deserialize`](Self::deserialize), with resource limits applied
    /// to dimensions, pixel payloads, and nesting depth.
    fn deserialize_with_limits(data: &[u8], limits: ResourceLimits) -> Result<Self, CloneError> {
        let mut reader = FlatReader::with_limits(data, limits);
        let value = reader.read_flattenable()?;
        reader.finish()?;
        Ok(value)
    }

    /// Produce an independently owned copy.
    ///
    /// The default serializes and deserializes. The result shares no
    /// storage with `self` and is semantically equal, but its internal
    /// representation is not guaranteed to be bit-identical. The nesting
    /// cap does not apply, since `self` already exists at its depth.
    fn clone_flattenable(&self) -> Result<Arc<Self>, CloneError> {
        Self::deserialize_with_limits(&self.serialize(), ResourceLimits::unbounded_depth())
            .map(Arc::new)
    }
}

/// Serialization sink.
#[derive(Debug, Default)]
pub struct FlatWriter {
    buf: BytesMut,
}

impl FlatWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    // Fixed-width little-endian primitives.

    pub fn write_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.buf.put_u8(v as u8);
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.put_u32_le(v);
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.put_i32_le(v);
    }

    pub fn write_u64(&mut self, v: u64) {
        self.buf.put_u64_le(v);
    }

    pub fn write_f32(&mut self, v: f32) {
        self.buf.put_f32_le(v);
    }

    /// Write a `u64` length followed by the bytes.
    pub fn write_bytes(&mut self, v: &[u8]) {
        self.write_u64(v.len() as u64);
        self.buf.put_slice(v);
    }

    /// Write a length-prefixed UTF-8 string.
    pub fn write_str(&mut self, v: &str) {
        self.write_bytes(v.as_bytes());
    }

    /// Write a nested flattenable with its factory name.
    pub fn write_flattenable<T: Flattenable>(&mut self, value: &T) {
        self.write_str(T::FACTORY_NAME);
        value.flatten(self);
    }

    /// Write a presence flag, then the flattenable if present.
    pub fn write_optional<T: Flattenable>(&mut self, value: Option<&T>) {
        self.write_bool(value.is_some());
        if let Some(value) = value {
            self.write_flattenable(value);
        }
    }

    /// Finish and return the serialized bytes.
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Deserialization source.
///
/// Every read checks the remaining length first; malformed input yields
/// [`CloneError`], never a panic.
#[derive(Debug)]
pub struct FlatReader<'a> {
    data: &'a [u8],
    limits: ResourceLimits,
    depth: u32,
}

impl<'a> FlatReader<'a> {
    /// Read `data` with no resource limits (the default depth cap applies).
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_limits(data, ResourceLimits::none())
    }

    /// Read `data` under `limits`.
    pub fn with_limits(data: &'a [u8], limits: ResourceLimits) -> Self {
        Self {
            data,
            limits,
            depth: 0,
        }
    }

    /// Limits in force.
    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Current nesting level; 0 outside any nested value.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Bytes not yet read.
    pub fn remaining(&self) -> usize {
        self.data.len()
    }

    fn need(&self, n: usize) -> Result<(), CloneError> {
        if self.data.len() < n {
            return Err(CloneError::Truncated {
                needed: n - self.data.len(),
            });
        }
        Ok(())
    }

    // Fixed-width primitives; each fails with `CloneError::Truncated` at end of input.

    pub fn read_u8(&mut self) -> Result<u8, CloneError> {
        self.need(1)?;
        Ok(self.data.get_u8())
    }

    pub fn read_bool(&mut self) -> Result<bool, CloneError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            v => Err(CloneError::InvalidValue {
                field: "bool",
                value: v.into(),
            }),
        }
    }

    pub fn read_u32(&mut self) -> Result<u32, CloneError> {
        self.need(4)?;
        Ok(self.data.get_u32_le())
    }

    pub fn read_i32(&mut self) -> Result<i32, CloneError> {
        self.need(4)?;
        Ok(self.data.get_i32_le())
    }

    pub fn read_u64(&mut self) -> Result<u64, CloneError> {
        self.need(8)?;
        Ok(self.data.get_u64_le())
    }

    pub fn read_f32(&mut self) -> Result<f32, CloneError> {
        self.need(4)?;
        Ok(self.data.get_f32_le())
    }

    /// Read a length-prefixed byte run, borrowing from the input.
    pub fn read_bytes(&mut self) -> Result<&'a [u8], CloneError> {
        let len = self.read_u64()?;
        let len = usize::try_from(len).map_err(|_| CloneError::InvalidValue {
            field: "length",
            value: len,
        })?;
        self.need(len)?;
        let (head, tail) = self.data.split_at(len);
        self.data = tail;
        Ok(head)
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn read_str(&mut self) -> Result<&'a str, CloneError> {
        std::str::from_utf8(self.read_bytes()?).map_err(|_| CloneError::InvalidName)
    }

    /// Read a factory name and check it is `expected`.
    pub fn expect_factory(&mut self, expected: &'static str) -> Result<(), CloneError> {
        let found = self.read_str()?;
        if found != expected {
            return Err(CloneError::TypeMismatch {
                expected,
                found: found.to_owned(),
            });
        }
        Ok(())
    }

    /// Run `f` one nesting level deeper, enforcing the depth cap.
    pub fn nested<R>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<R, CloneError>,
    ) -> Result<R, CloneError> {
        let depth = self.depth.saturating_add(1);
        self.limits.check_depth(depth)?;
        self.depth = depth;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Read a nested flattenable written by [`FlatWriter::write_flattenable`].
    pub fn read_flattenable<T: Flattenable>(&mut self) -> Result<T, CloneError> {
        self.expect_factory(T::FACTORY_NAME)?;
        self.nested(T::unflatten)
    }

    /// Read a value written by [`FlatWriter::write_optional`].
    pub fn read_optional<T: Flattenable>(&mut self) -> Result<Option<T>, CloneError> {
        if self.read_bool()? {
            self.read_flattenable().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Require that all input was consumed.
    pub fn finish(self) -> Result<(), CloneError> {
        match self.data.len() {
            0 => Ok(()),
            n => Err(CloneError::TrailingBytes(n)),
        }
    }
}
