//! Polymorphic shader trees.
//!
//! A shader maps a device coordinate to a color. Shaders nest (blend,
//! local matrix) and hold images, so a tree is only known through
//! `dyn Shader`. Serialization writes each node's factory name ahead of its
//! payload, and [`read_shader`] rebuilds nodes through a fixed factory
//! registry keyed by that name.

use std::fmt::Debug;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::CloneError;
use crate::flatten::{FlatReader, FlatWriter, Flattenable};
use crate::image::Image;
use crate::limits::ResourceLimits;

/// Unpremultiplied or premultiplied RGBA in floating point.
pub type Color4f = rgb::Rgba<f32>;

const TRANSPARENT: Color4f = Color4f {
    r: 0.0,
    g: 0.0,
    b: 0.0,
    a: 0.0,
};

// ---------------------------------------------------------------------------
// Matrix
// ---------------------------------------------------------------------------

/// 2-D affine transform.
///
/// Maps `(x, y)` to `(sx*x + kx*y + tx, ky*x + sy*y + ty)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Matrix {
    pub sx: f32,
    pub kx: f32,
    pub tx: f32,
    pub ky: f32,
    pub sy: f32,
    pub ty: f32,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    pub const IDENTITY: Self = Self {
        sx: 1.0,
        kx: 0.0,
        tx: 0.0,
        ky: 0.0,
        sy: 1.0,
        ty: 0.0,
    };

    pub const fn translate(dx: f32, dy: f32) -> Self {
        Self {
            tx: dx,
            ty: dy,
            ..Self::IDENTITY
        }
    }

    pub const fn scale(sx: f32, sy: f32) -> Self {
        Self {
            sx,
            sy,
            ..Self::IDENTITY
        }
    }

    /// Apply the matrix to a point.
    pub fn map_point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.sx * x + self.kx * y + self.tx,
            self.ky * x + self.sy * y + self.ty,
        )
    }

    /// Inverse transform, or `None` if the matrix is singular or not finite.
    pub fn invert(&self) -> Option<Self> {
        let det = self.sx * self.sy - self.kx * self.ky;
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let inv = Self {
            sx: self.sy / det,
            kx: -self.kx / det,
            tx: (self.kx * self.ty - self.sy * self.tx) / det,
            ky: -self.ky / det,
            sy: self.sx / det,
            ty: (self.ky * self.tx - self.sx * self.ty) / det,
        };
        inv.is_finite().then_some(inv)
    }

    fn is_finite(&self) -> bool {
        [self.sx, self.kx, self.tx, self.ky, self.sy, self.ty]
            .iter()
            .all(|v| v.is_finite())
    }

    fn flatten(&self, buffer: &mut FlatWriter) {
        for v in [self.sx, self.kx, self.tx, self.ky, self.sy, self.ty] {
            buffer.write_f32(v);
        }
    }

    fn unflatten(buffer: &mut FlatReader<'_>) -> Result<Self, CloneError> {
        Ok(Self {
            sx: buffer.read_f32()?,
            kx: buffer.read_f32()?,
            tx: buffer.read_f32()?,
            ky: buffer.read_f32()?,
            sy: buffer.read_f32()?,
            ty: buffer.read_f32()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Tiling, sampling, blending
// ---------------------------------------------------------------------------

/// How coordinates outside a shader's natural domain are resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TileMode {
    /// Extend the edge values.
    #[default]
    Clamp = 0,
    /// Repeat the domain.
    Repeat = 1,
    /// Repeat, flipping every other copy.
    Mirror = 2,
    /// Transparent outside the domain.
    Decal = 3,
}

impl TileMode {
    fn from_u8(v: u8) -> Result<Self, CloneError> {
        Ok(match v {
            0 => Self::Clamp,
            1 => Self::Repeat,
            2 => Self::Mirror,
            3 => Self::Decal,
            _ => {
                return Err(CloneError::InvalidValue {
                    field: "tile mode",
                    value: v.into(),
                });
            }
        })
    }

    /// Resolve a parameter against the unit interval.
    fn unit(self, t: f32) -> Option<f32> {
        match self {
            Self::Clamp => Some(t.clamp(0.0, 1.0)),
            Self::Repeat => Some(t - t.floor()),
            Self::Mirror => {
                let m = t.rem_euclid(2.0);
                Some(if m > 1.0 { 2.0 - m } else { m })
            }
            Self::Decal => (0.0..=1.0).contains(&t).then_some(t),
        }
    }

    /// Resolve a pixel index against `0..n`.
    fn index(self, i: i64, n: i64) -> Option<i64> {
        if n <= 0 {
            return None;
        }
        match self {
            Self::Clamp => Some(i.clamp(0, n - 1)),
            Self::Repeat => Some(i.rem_euclid(n)),
            Self::Mirror => {
                let m = i.rem_euclid(2 * n);
                Some(if m >= n { 2 * n - 1 - m } else { m })
            }
            Self::Decal => (0..n).contains(&i).then_some(i),
        }
    }
}

/// Image sampling filter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Sampling {
    /// Nearest pixel.
    #[default]
    Nearest = 0,
    /// Bilinear between the four nearest pixel centers.
    Linear = 1,
}

impl Sampling {
    fn from_u8(v: u8) -> Result<Self, CloneError> {
        match v {
            0 => Ok(Self::Nearest),
            1 => Ok(Self::Linear),
            _ => Err(CloneError::InvalidValue {
                field: "sampling",
                value: v.into(),
            }),
        }
    }
}

/// Porter-Duff and arithmetic blend modes over premultiplied colors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BlendMode {
    Clear = 0,
    Src = 1,
    Dst = 2,
    #[default]
    SrcOver = 3,
    DstOver = 4,
    SrcIn = 5,
    DstIn = 6,
    Modulate = 7,
    Plus = 8,
}

impl BlendMode {
    fn from_u8(v: u8) -> Result<Self, CloneError> {
        Ok(match v {
            0 => Self::Clear,
            1 => Self::Src,
            2 => Self::Dst,
            3 => Self::SrcOver,
            4 => Self::DstOver,
            5 => Self::SrcIn,
            6 => Self::DstIn,
            7 => Self::Modulate,
            8 => Self::Plus,
            _ => {
                return Err(CloneError::InvalidValue {
                    field: "blend mode",
                    value: v.into(),
                });
            }
        })
    }

    /// Combine `src` over `dst`.
    pub fn apply(self, src: Color4f, dst: Color4f) -> Color4f {
        match self {
            Self::Clear => TRANSPARENT,
            Self::Src => src,
            Self::Dst => dst,
            Self::SrcOver => add(src, scale(dst, 1.0 - src.a)),
            Self::DstOver => add(dst, scale(src, 1.0 - dst.a)),
            Self::SrcIn => scale(src, dst.a),
            Self::DstIn => scale(dst, src.a),
            Self::Modulate => Color4f::new(src.r * dst.r, src.g * dst.g, src.b * dst.b, src.a * dst.a),
            Self::Plus => {
                let sum = add(src, dst);
                Color4f::new(sum.r.min(1.0), sum.g.min(1.0), sum.b.min(1.0), sum.a.min(1.0))
            }
        }
    }
}

fn add(a: Color4f, b: Color4f) -> Color4f {
    Color4f::new(a.r + b.r, a.g + b.g, a.b + b.b, a.a + b.a)
}

fn scale(c: Color4f, k: f32) -> Color4f {
    Color4f::new(c.r * k, c.g * k, c.b * k, c.a * k)
}

fn lerp(a: Color4f, b: Color4f, t: f32) -> Color4f {
    add(scale(a, 1.0 - t), scale(b, t))
}

// ---------------------------------------------------------------------------
// Shader trait and registry
// ---------------------------------------------------------------------------

/// A node in a shader tree.
pub trait Shader: Debug + Send + Sync {
    /// Registry name of the concrete type.
    fn factory_name(&self) -> &'static str;

    /// Write the payload (without the factory name).
    fn flatten_into(&self, buffer: &mut FlatWriter);

    /// Color at device coordinate `(x, y)`.
    fn color_at(&self, x: f32, y: f32) -> Color4f;
}

type ShaderFactory = fn(&mut FlatReader<'_>) -> Result<Arc<dyn Shader>, CloneError>;

fn unflatten_shader<S>(buffer: &mut FlatReader<'_>) -> Result<Arc<dyn Shader>, CloneError>
where
    S: Shader + Flattenable + 'static,
{
    Ok(Arc::new(S::unflatten(buffer)?))
}

static SHADER_FACTORIES: &[(&str, ShaderFactory)] = &[
    (ColorShader::FACTORY_NAME, unflatten_shader::<ColorShader> as ShaderFactory),
    (LinearGradient::FACTORY_NAME, unflatten_shader::<LinearGradient> as ShaderFactory),
    (ImageShader::FACTORY_NAME, unflatten_shader::<ImageShader> as ShaderFactory),
    (BlendShader::FACTORY_NAME, unflatten_shader::<BlendShader> as ShaderFactory),
    (LocalMatrixShader::FACTORY_NAME, unflatten_shader::<LocalMatrixShader> as ShaderFactory),
];

/// Names of the registered shader factories.
pub fn shader_factories() -> impl Iterator<Item = &'static str> {
    SHADER_FACTORIES.iter().map(|(name, _)| *name)
}

/// Write `shader` with its factory name.
pub fn write_shader(buffer: &mut FlatWriter, shader: &dyn Shader) {
    buffer.write_str(shader.factory_name());
    shader.flatten_into(buffer);
}

/// Read a shader written by [`write_shader`], dispatching on its factory
/// name.
///
/// # Errors
///
/// [`CloneError::UnknownFactory`] for an unregistered name, or any payload
/// error of the concrete type.
pub fn read_shader(buffer: &mut FlatReader<'_>) -> Result<Arc<dyn Shader>, CloneError> {
    let name = buffer.read_str()?;
    let factory = SHADER_FACTORIES
        .iter()
        .find(|(registered, _)| *registered == name)
        .map(|(_, factory)| *factory)
        .ok_or_else(|| CloneError::UnknownFactory(name.to_owned()))?;
    buffer.nested(factory)
}

/// Serialize a shader tree.
pub fn serialize_shader(shader: &dyn Shader) -> Bytes {
    let mut writer = FlatWriter::new();
    write_shader(&mut writer, shader);
    writer.finish()
}

/// Deserialize a shader tree produced by [`serialize_shader`].
///
/// # Errors
///
/// See [`read_shader`]; trailing bytes are also rejected.
pub fn deserialize_shader(data: &[u8]) -> Result<Arc<dyn Shader>, CloneError> {
    deserialize_shader_with_limits(data, ResourceLimits::none())
}

/// Like [`deserialize_shader`], with resource limits on nesting depth and
/// embedded pixel payloads.
pub fn deserialize_shader_with_limits(
    data: &[u8],
    limits: ResourceLimits,
) -> Result<Arc<dyn Shader>, CloneError> {
    let mut reader = FlatReader::with_limits(data, limits);
    let shader = read_shader(&mut reader)?;
    reader.finish()?;
    Ok(shader)
}

/// Evaluate `shader` at every pixel center of a `width` × `height` grid,
/// row-major.
pub fn render(shader: &dyn Shader, width: u32, height: u32) -> Vec<Color4f> {
    let mut out = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        for x in 0..width {
            out.push(shader.color_at(x as f32 + 0.5, y as f32 + 0.5));
        }
    }
    out
}

fn write_color(buffer: &mut FlatWriter, c: Color4f) {
    buffer.write_f32(c.r);
    buffer.write_f32(c.g);
    buffer.write_f32(c.b);
    buffer.write_f32(c.a);
}

fn read_color(buffer: &mut FlatReader<'_>) -> Result<Color4f, CloneError> {
    Ok(Color4f::new(
        buffer.read_f32()?,
        buffer.read_f32()?,
        buffer.read_f32()?,
        buffer.read_f32()?,
    ))
}

// ---------------------------------------------------------------------------
// Concrete shaders
// ---------------------------------------------------------------------------

/// Solid color.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorShader {
    color: Color4f,
}

impl ColorShader {
    pub fn new(color: Color4f) -> Self {
        Self { color }
    }

    /// Constant color.
    pub fn color(&self) -> Color4f {
        self.color
    }
}

impl Flattenable for ColorShader {
    const FACTORY_NAME: &'static str = "ColorShader";

    fn flatten(&self, buffer: &mut FlatWriter) {
        write_color(buffer, self.color);
    }

    fn unflatten(buffer: &mut FlatReader<'_>) -> Result<Self, CloneError> {
        read_color(buffer).map(Self::new)
    }
}

impl Shader for ColorShader {
    fn factory_name(&self) -> &'static str {
        Self::FACTORY_NAME
    }

    fn flatten_into(&self, buffer: &mut FlatWriter) {
        self.flatten(buffer);
    }

    fn color_at(&self, _x: f32, _y: f32) -> Color4f {
        self.color
    }
}

/// Linear gradient between two points.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearGradient {
    start: (f32, f32),
    end: (f32, f32),
    colors: Vec<Color4f>,
    positions: Vec<f32>,
    tile: TileMode,
}

impl LinearGradient {
    /// Gradient from `start` to `end` through `colors`.
    ///
    /// `positions` places each color in `[0, 1]`; `None` spaces them
    /// evenly. Returns `None` for fewer than two colors, a position count
    /// that differs from the color count, or positions that decrease or
    /// leave `[0, 1]`.
    pub fn new(
        start: (f32, f32),
        end: (f32, f32),
        colors: Vec<Color4f>,
        positions: Option<Vec<f32>>,
        tile: TileMode,
    ) -> Option<Self> {
        if colors.len() < 2 {
            return None;
        }
        let last = (colors.len() - 1) as f32;
        let positions =
            positions.unwrap_or_else(|| (0..colors.len()).map(|i| i as f32 / last).collect());
        let in_range = positions.iter().all(|p| (0.0..=1.0).contains(p));
        let sorted = positions.windows(2).all(|w| w[0] <= w[1]);
        if positions.len() != colors.len() || !in_range || !sorted {
            return None;
        }
        Some(Self {
            start,
            end,
            colors,
            positions,
            tile,
        })
    }

    /// Behavior outside the gradient span.
    pub fn tile_mode(&self) -> TileMode {
        self.tile
    }

    fn color_at_t(&self, t: f32) -> Color4f {
        let (first, last) = (self.positions[0], self.positions[self.positions.len() - 1]);
        if t <= first {
            return self.colors[0];
        }
        if t >= last {
            return self.colors[self.colors.len() - 1];
        }
        let i = self
            .positions
            .windows(2)
            .position(|w| t <= w[1])
            .unwrap_or(self.positions.len() - 2);
        let (p0, p1) = (self.positions[i], self.positions[i + 1]);
        let span = p1 - p0;
        let local = if span > 0.0 { (t - p0) / span } else { 0.0 };
        lerp(self.colors[i], self.colors[i + 1], local)
    }
}

impl Flattenable for LinearGradient {
    const FACTORY_NAME: &'static str = "LinearGradient";

    fn flatten(&self, buffer: &mut FlatWriter) {
        for v in [self.start.0, self.start.1, self.end.0, self.end.1] {
            buffer.write_f32(v);
        }
        buffer.write_u8(self.tile as u8);
        buffer.write_u32(self.colors.len() as u32);
        for (&color, &pos) in self.colors.iter().zip(&self.positions) {
            write_color(buffer, color);
            buffer.write_f32(pos);
        }
    }

    fn unflatten(buffer: &mut FlatReader<'_>) -> Result<Self, CloneError> {
        let start = (buffer.read_f32()?, buffer.read_f32()?);
        let end = (buffer.read_f32()?, buffer.read_f32()?);
        let tile = TileMode::from_u8(buffer.read_u8()?)?;
        let count = buffer.read_u32()?;
        // 20 bytes per stop; never reserve more than the input could hold.
        let cap = (count as usize).min(buffer.remaining() / 20);
        let mut colors = Vec::with_capacity(cap);
        let mut positions = Vec::with_capacity(cap);
        for _ in 0..count {
            colors.push(read_color(buffer)?);
            positions.push(buffer.read_f32()?);
        }
        Self::new(start, end, colors, Some(positions), tile).ok_or(CloneError::InvalidValue {
            field: "gradient stops",
            value: count.into(),
        })
    }
}

impl Shader for LinearGradient {
    fn factory_name(&self) -> &'static str {
        Self::FACTORY_NAME
    }

    fn flatten_into(&self, buffer: &mut FlatWriter) {
        self.flatten(buffer);
    }

    fn color_at(&self, x: f32, y: f32) -> Color4f {
        let (dx, dy) = (self.end.0 - self.start.0, self.end.1 - self.start.1);
        let len2 = dx * dx + dy * dy;
        let t = if len2 > 0.0 {
            ((x - self.start.0) * dx + (y - self.start.1) * dy) / len2
        } else {
            0.0
        };
        match self.tile.unit(t) {
            Some(t) => self.color_at_t(t),
            None => TRANSPARENT,
        }
    }
}

/// Samples an image, tiling it across the plane.
#[derive(Clone, Debug)]
pub struct ImageShader {
    image: Arc<Image>,
    tile_x: TileMode,
    tile_y: TileMode,
    sampling: Sampling,
}

impl ImageShader {
    pub fn new(image: Arc<Image>, tile_x: TileMode, tile_y: TileMode, sampling: Sampling) -> Self {
        Self {
            image,
            tile_x,
            tile_y,
            sampling,
        }
    }

    /// Sampled image.
    pub fn image(&self) -> &Arc<Image> {
        &self.image
    }

    /// Horizontal and vertical tile modes.
    pub fn tile_modes(&self) -> (TileMode, TileMode) {
        (self.tile_x, self.tile_y)
    }

    /// Texel filter.
    pub fn sampling(&self) -> Sampling {
        self.sampling
    }

    fn texel(&self, x: i64, y: i64) -> Color4f {
        let w = i64::from(self.image.width());
        let h = i64::from(self.image.height());
        let (Some(x), Some(y)) = (self.tile_x.index(x, w), self.tile_y.index(y, h)) else {
            return TRANSPARENT;
        };
        self.image
            .color_at(x as u32, y as u32)
            .unwrap_or(TRANSPARENT)
    }
}

impl Flattenable for ImageShader {
    const FACTORY_NAME: &'static str = "ImageShader";

    fn flatten(&self, buffer: &mut FlatWriter) {
        buffer.write_u8(self.tile_x as u8);
        buffer.write_u8(self.tile_y as u8);
        buffer.write_u8(self.sampling as u8);
        buffer.write_flattenable(self.image.as_ref());
    }

    fn unflatten(buffer: &mut FlatReader<'_>) -> Result<Self, CloneError> {
        let tile_x = TileMode::from_u8(buffer.read_u8()?)?;
        let tile_y = TileMode::from_u8(buffer.read_u8()?)?;
        let sampling = Sampling::from_u8(buffer.read_u8()?)?;
        let image = buffer.read_flattenable::<Image>()?;
        Ok(Self::new(Arc::new(image), tile_x, tile_y, sampling))
    }
}

impl Shader for ImageShader {
    fn factory_name(&self) -> &'static str {
        Self::FACTORY_NAME
    }

    fn flatten_into(&self, buffer: &mut FlatWriter) {
        self.flatten(buffer);
    }

    fn color_at(&self, x: f32, y: f32) -> Color4f {
        match self.sampling {
            Sampling::Nearest => self.texel(x.floor() as i64, y.floor() as i64),
            Sampling::Linear => {
                let (fx, fy) = (x - 0.5, y - 0.5);
                let (x0, y0) = (fx.floor(), fy.floor());
                let (wx, wy) = (fx - x0, fy - y0);
                let (x0, y0) = (x0 as i64, y0 as i64);
                let top = lerp(self.texel(x0, y0), self.texel(x0 + 1, y0), wx);
                let bottom = lerp(self.texel(x0, y0 + 1), self.texel(x0 + 1, y0 + 1), wx);
                lerp(top, bottom, wy)
            }
        }
    }
}

/// Blends two child shaders.
#[derive(Clone, Debug)]
pub struct BlendShader {
    mode: BlendMode,
    dst: Arc<dyn Shader>,
    src: Arc<dyn Shader>,
}

impl BlendShader {
    pub fn new(mode: BlendMode, dst: Arc<dyn Shader>, src: Arc<dyn Shader>) -> Self {
        Self { mode, dst, src }
    }

    /// How the two inputs combine.
    pub fn mode(&self) -> BlendMode {
        self.mode
    }
}

impl Flattenable for BlendShader {
    const FACTORY_NAME: &'static str = "BlendShader";

    fn flatten(&self, buffer: &mut FlatWriter) {
        buffer.write_u8(self.mode as u8);
        write_shader(buffer, self.dst.as_ref());
        write_shader(buffer, self.src.as_ref());
    }

    fn unflatten(buffer: &mut FlatReader<'_>) -> Result<Self, CloneError> {
        let mode = BlendMode::from_u8(buffer.read_u8()?)?;
        let dst = read_shader(buffer)?;
        let src = read_shader(buffer)?;
        Ok(Self::new(mode, dst, src))
    }
}

impl Shader for BlendShader {
    fn factory_name(&self) -> &'static str {
        Self::FACTORY_NAME
    }

    fn flatten_into(&self, buffer: &mut FlatWriter) {
        self.flatten(buffer);
    }

    fn color_at(&self, x: f32, y: f32) -> Color4f {
        self.mode
            .apply(self.src.color_at(x, y), self.dst.color_at(x, y))
    }
}

/// Applies a transform to a child shader's coordinate space.
#[derive(Clone, Debug)]
pub struct LocalMatrixShader {
    matrix: Matrix,
    inverse: Matrix,
    inner: Arc<dyn Shader>,
}

impl LocalMatrixShader {
    /// Returns `None` if `matrix` is not invertible.
    pub fn new(inner: Arc<dyn Shader>, matrix: Matrix) -> Option<Self> {
        let inverse = matrix.invert()?;
        Some(Self {
            matrix,
            inverse,
            inner,
        })
    }

    /// Local-to-device matrix.
    pub fn matrix(&self) -> &Matrix {
        &self.matrix
    }

    /// Shader evaluated in the transformed space.
    pub fn inner(&self) -> &Arc<dyn Shader> {
        &self.inner
    }
}

impl Flattenable for LocalMatrixShader {
    const FACTORY_NAME: &'static str = "LocalMatrixShader";

    fn flatten(&self, buffer: &mut FlatWriter) {
        self.matrix.flatten(buffer);
        write_shader(buffer, self.inner.as_ref());
    }

    fn unflatten(buffer: &mut FlatReader<'_>) -> Result<Self, CloneError> {
        let matrix = Matrix::unflatten(buffer)?;
        let inner = read_shader(buffer)?;
        Self::new(inner, matrix).ok_or(CloneError::InvalidValue {
            field: "local matrix determinant",
            value: 0,
        })
    }
}

impl Shader for LocalMatrixShader {
    fn factory_name(&self) -> &'static str {
        Self::FACTORY_NAME
    }

    fn flatten_into(&self, buffer: &mut FlatWriter) {
        self.flatten(buffer);
    }

    fn color_at(&self, x: f32, y: f32) -> Color4f {
        let (x, y) = self.inverse.map_point(x, y);
        self.inner.color_at(x, y)
    }
}
