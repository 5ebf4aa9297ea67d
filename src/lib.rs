//! Buffer interchange and flattenable cloning for raster pixel data.
//!
//! This crate sits between a raster library's pixel descriptors and a
//! generic strided buffer protocol:
//!
//! - [`validate_buffer_to_image_info`] / [`BufferValidator`]: check that a
//!   borrowed buffer can hold an [`ImageInfo`] and compute its row stride
//! - [`read_pixels`]: copy pixels from any [`ReadPixels`] source straight
//!   into a [`BufferProtocol`] destination
//! - [`image_info_from_array`], [`image_info_to_buffer_info`],
//!   [`image_info_to_array_interface`]: convert between descriptors and
//!   array metadata
//! - [`clone_flattenable`], [`clone_shader`], [`clone_color_space`],
//!   [`clone_image`]: deep copies through the serialized form
//!
//! The collaborator types the layer works on ([`Image`], [`Bitmap`],
//! [`ColorSpace`], the [`Shader`] tree, [`HostArray`]) are provided here in
//! minimal form, each exposing only the capabilities the layer consumes.
//!
//! Borrowed buffer memory is a lifetime-bound slice inside [`BufferInfo`],
//! so nothing in the crate can hold on to it past the call.

#![forbid(unsafe_code)]

mod bridge;
mod buffer;
mod clone;
mod color;
mod error;
mod flatten;
mod image;
mod info;
mod limits;
mod pixel;
mod read;
pub mod shader;
mod traits;
mod validate;

pub use bridge::{
    ArrayInterface, image_info_from_array, image_info_to_array_interface,
    image_info_to_buffer_info,
};
pub use buffer::{BufferData, BufferInfo, HostArray};
pub use clone::{clone_color_space, clone_flattenable, clone_image, clone_shader};
pub use color::{ColorSpace, Gamut, NamedProfile, TransferFunction};
pub use error::{BufferError, CloneError, Error, FormatError};
pub use flatten::{FlatReader, FlatWriter, Flattenable};
pub use image::{Bitmap, Image};
pub use info::ImageInfo;
pub use limits::{DEFAULT_MAX_DEPTH, LimitExceeded, ResourceLimits};
pub use pixel::{AlphaType, ChannelType, ColorType};
pub use read::read_pixels;
pub use shader::{Color4f, Shader};
pub use traits::{ArrayShape, BufferProtocol, ReadPixels};
pub use validate::{BufferValidator, validate_buffer_to_image_info};

// Re-exported for `Color4f` construction.
pub use rgb;
