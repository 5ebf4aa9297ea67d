//! Resource limits for validation and deserialization.
//!
//! Shape, stride, and serialized metadata are caller- or attacker-controlled.
//! [`ResourceLimits`] caps what the validator accepts and what a
//! deserializer may allocate. [`LimitExceeded`] is returned when a check
//! fails.

use thiserror::Error;

use crate::ImageInfo;

/// Nesting depth applied by deserializers when no depth limit is set.
pub const DEFAULT_MAX_DEPTH: u32 = 64;

/// Resource limits for buffer validation and flattenable deserialization.
///
/// All fields are optional; `None` means no limit for that resource.
///
/// # Example
///
/// ```
/// use rasterbridge::ResourceLimits;
///
/// let limits = ResourceLimits::none()
///     .with_max_pixels(100_000_000)
///     .with_max_bytes(512 * 1024 * 1024);
/// assert!(limits.has_any());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct ResourceLimits {
    /// Maximum total pixels (width × height).
    pub max_pixels: Option<u64>,
    /// Maximum image width in pixels.
    pub max_width: Option<u32>,
    /// Maximum image height in pixels.
    pub max_height: Option<u32>,
    /// Maximum pixel memory in bytes, for a validated span or a
    /// deserialized pixel payload.
    pub max_bytes: Option<u64>,
    /// Maximum nesting depth of a serialized object tree.
    pub max_depth: Option<u32>,
}

impl ResourceLimits {
    /// No limits (all fields `None`).
    pub fn none() -> Self {
        Self::default()
    }

    /// Set maximum total pixels.
    pub fn with_max_pixels(mut self, max: u64) -> Self {
        self.max_pixels = Some(max);
        self
    }

    /// Set maximum image width in pixels.
    pub fn with_max_width(mut self, width: u32) -> Self {
        self.max_width = Some(width);
        self
    }

    /// Set maximum image height in pixels.
    pub fn with_max_height(mut self, height: u32) -> Self {
        self.max_height = Some(height);
        self
    }

    /// Set maximum pixel memory in bytes.
    pub fn with_max_bytes(mut self, bytes: u64) -> Self {
        self.max_bytes = Some(bytes);
        self
    }

    /// Set maximum nesting depth for deserialized trees.
    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// No limits and no nesting cap, for re-reading bytes just serialized
    /// from a value already in memory.
    pub(crate) fn unbounded_depth() -> Self {
        Self::none().with_max_depth(u32::MAX)
    }

    /// Whether any limits are set.
    pub fn has_any(&self) -> bool {
        self.max_pixels.is_some()
            || self.max_width.is_some()
            || self.max_height.is_some()
            || self.max_bytes.is_some()
            || self.max_depth.is_some()
    }

    /// Effective nesting cap: `max_depth`, or [`DEFAULT_MAX_DEPTH`].
    pub fn depth_cap(&self) -> u32 {
        self.max_depth.unwrap_or(DEFAULT_MAX_DEPTH)
    }

    // --- Validation methods ---

    /// Check image dimensions against `max_width`, `max_height`, and `max_pixels`.
    pub fn check_dimensions(&self, width: u32, height: u32) -> Result<(), LimitExceeded> {
        if let Some(max) = self.max_width
            && width > max
        {
            return Err(LimitExceeded::Width { actual: width, max });
        }
        if let Some(max) = self.max_height
            && height > max
        {
            return Err(LimitExceeded::Height {
                actual: height,
                max,
            });
        }
        if let Some(max) = self.max_pixels {
            let pixels = width as u64 * height as u64;
            if pixels > max {
                return Err(LimitExceeded::Pixels {
                    actual: pixels,
                    max,
                });
            }
        }
        Ok(())
    }

    /// Check a byte count against `max_bytes`.
    pub fn check_bytes(&self, bytes: u64) -> Result<(), LimitExceeded> {
        if let Some(max) = self.max_bytes
            && bytes > max
        {
            return Err(LimitExceeded::Bytes { actual: bytes, max });
        }
        Ok(())
    }

    /// Check a nesting depth against [`depth_cap`](Self::depth_cap).
    pub fn check_depth(&self, depth: u32) -> Result<(), LimitExceeded> {
        let max = self.depth_cap();
        if depth > max {
            return Err(LimitExceeded::Depth { actual: depth, max });
        }
        Ok(())
    }

    /// Check an [`ImageInfo`] against the dimension limits.
    pub fn check_image_info(&self, info: &ImageInfo) -> Result<(), LimitExceeded> {
        self.check_dimensions(info.width, info.height)
    }
}

/// A resource limit was exceeded.
///
/// Each variant carries the actual value and the limit that was exceeded.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum LimitExceeded {
    /// Image width exceeded `max_width`.
    #[error("width {actual} exceeds limit {max}")]
    Width {
        /// Actual width.
        actual: u32,
        /// Maximum allowed.
        max: u32,
    },
    /// Image height exceeded `max_height`.
    #[error("height {actual} exceeds limit {max}")]
    Height {
        /// Actual height.
        actual: u32,
        /// Maximum allowed.
        max: u32,
    },
    /// Pixel count exceeded `max_pixels`.
    #[error("pixel count {actual} exceeds limit {max}")]
    Pixels {
        /// Actual pixel count.
        actual: u64,
        /// Maximum allowed.
        max: u64,
    },
    /// Byte count exceeded `max_bytes`.
    #[error("{actual} bytes exceeds limit {max}")]
    Bytes {
        /// Actual byte count.
        actual: u64,
        /// Maximum allowed.
        max: u64,
    },
    /// Nesting depth exceeded the depth cap.
    #[error("nesting depth {actual} exceeds limit {max}")]
    Depth {
        /// Depth reached.
        actual: u32,
        /// Maximum allowed.
        max: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AlphaType, ColorType};

    #[test]
    fn default_has_no_limits() {
        let limits = ResourceLimits::none();
        assert!(!limits.has_any());
        assert_eq!(limits.depth_cap(), DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn builder_sets_limits() {
        let limits = ResourceLimits::none()
            .with_max_pixels(1_000_000)
            .with_max_bytes(512 * 1024 * 1024);
        assert!(limits.has_any());
        assert_eq!(limits.max_pixels, Some(1_000_000));
        assert_eq!(limits.max_bytes, Some(512 * 1024 * 1024));
        assert!(limits.max_width.is_none());
    }

    #[test]
    fn depth_limit_overrides_default() {
        let limits = ResourceLimits::none().with_max_depth(4);
        assert!(limits.has_any());
        assert_eq!(limits.depth_cap(), 4);
        assert!(limits.check_depth(4).is_ok());
        assert_eq!(
            limits.check_depth(5).unwrap_err(),
            LimitExceeded::Depth { actual: 5, max: 4 }
        );
    }

    // --- Validation tests ---

    #[test]
    fn check_dimensions_pass() {
        let limits = ResourceLimits::none()
            .with_max_width(1920)
            .with_max_height(1080)
            .with_max_pixels(2_073_600);
        assert!(limits.check_dimensions(1920, 1080).is_ok());
        assert!(limits.check_dimensions(100, 100).is_ok());
    }

    #[test]
    fn check_dimensions_width_exceeded() {
        let limits = ResourceLimits::none().with_max_width(1920);
        let err = limits.check_dimensions(1921, 1080).unwrap_err();
        assert_eq!(
            err,
            LimitExceeded::Width {
                actual: 1921,
                max: 1920
            }
        );
    }

    #[test]
    fn check_dimensions_height_exceeded() {
        let limits = ResourceLimits::none().with_max_height(1080);
        let err = limits.check_dimensions(1920, 1081).unwrap_err();
        assert_eq!(
            err,
            LimitExceeded::Height {
                actual: 1081,
                max: 1080
            }
        );
    }

    #[test]
    fn check_dimensions_pixels_exceeded() {
        let limits = ResourceLimits::none().with_max_pixels(1_000_000);
        // 1001×1000 = 1,001,000 > 1,000,000
        let err = limits.check_dimensions(1001, 1000).unwrap_err();
        assert_eq!(
            err,
            LimitExceeded::Pixels {
                actual: 1_001_000,
                max: 1_000_000
            }
        );
    }

    #[test]
    fn check_bytes_pass_and_fail() {
        let limits = ResourceLimits::none().with_max_bytes(1024);
        assert!(limits.check_bytes(1024).is_ok());
        let err = limits.check_bytes(2048).unwrap_err();
        assert!(matches!(err, LimitExceeded::Bytes { actual: 2048, .. }));
    }

    #[test]
    fn check_image_info_uses_dimensions() {
        let limits = ResourceLimits::none().with_max_width(64);
        let small = ImageInfo::new(64, 64, ColorType::Rgba8888, AlphaType::Premul, None);
        assert!(limits.check_image_info(&small).is_ok());
        let wide = ImageInfo::new(65, 1, ColorType::Rgba8888, AlphaType::Premul, None);
        assert!(matches!(
            limits.check_image_info(&wide),
            Err(LimitExceeded::Width { .. })
        ));
    }

    #[test]
    fn limit_exceeded_display() {
        let err = LimitExceeded::Pixels {
            actual: 20_000_000,
            max: 16_000_000,
        };
        assert_eq!(err.to_string(), "pixel count 20000000 exceeds limit 16000000");

        let err = LimitExceeded::Depth { actual: 65, max: 64 };
        assert_eq!(err.to_string(), "nesting depth 65 exceeds limit 64");
    }
}
