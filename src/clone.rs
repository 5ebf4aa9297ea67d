//! Deep copies of shared graphics objects.
//!
//! Every copy goes through the serialized form, so the result never
//! aliases the source's storage. Color spaces short-circuit to their
//! canonical shared instance where one exists, and shader trees are rebuilt
//! through the shader factory registry because `dyn Shader` has no static
//! deserializer.

use std::sync::Arc;

use tracing::{trace, warn};

use crate::color::ColorSpace;
use crate::error::CloneError;
use crate::flatten::Flattenable;
use crate::image::Image;
use crate::limits::ResourceLimits;
use crate::shader::{Shader, deserialize_shader_with_limits, serialize_shader};

fn logged<T: ?Sized>(
    factory: &str,
    result: Result<Arc<T>, CloneError>,
) -> Result<Arc<T>, CloneError> {
    match &result {
        Ok(_) => trace!(factory, "cloned"),
        Err(err) => warn!(factory, %err, "clone round trip failed"),
    }
    result
}

/// Independently owned copy of `value`, via its
/// [`clone_flattenable`](Flattenable::clone_flattenable).
///
/// # Errors
///
/// [`CloneError`] if the round trip fails.
pub fn clone_flattenable<T: Flattenable>(value: &T) -> Result<Arc<T>, CloneError> {
    logged(T::FACTORY_NAME, value.clone_flattenable())
}

/// Independently owned copy of a shader tree.
///
/// Structure, tile modes, sampling, blend modes, and local matrices are
/// preserved, and embedded images are copied into fresh storage. Trees of
/// any depth clone; the nesting cap only guards
/// [`deserialize_shader`](crate::shader::deserialize_shader).
///
/// # Errors
///
/// [`CloneError`] if the tree does not deserialize, e.g. a node type
/// missing from the registry.
pub fn clone_shader(shader: &dyn Shader) -> Result<Arc<dyn Shader>, CloneError> {
    logged(
        shader.factory_name(),
        deserialize_shader_with_limits(
            &serialize_shader(shader),
            ResourceLimits::unbounded_depth(),
        ),
    )
}

/// Copy an optional color space.
///
/// `None` stays `None`. sRGB and linear sRGB return their canonical shared
/// instance; other spaces are deep-copied.
///
/// # Errors
///
/// [`CloneError`] if the round trip fails.
pub fn clone_color_space(
    color_space: Option<&ColorSpace>,
) -> Result<Option<Arc<ColorSpace>>, CloneError> {
    color_space.map(clone_flattenable).transpose()
}

/// Copy an image, verifying that dimensions, format, row bytes, and pixels
/// survive exactly.
///
/// # Errors
///
/// [`CloneError`] if deserialization fails or anything differs.
pub fn clone_image(image: &Image) -> Result<Arc<Image>, CloneError> {
    clone_flattenable(image)
}
