//! Color spaces.
//!
//! A [`ColorSpace`] is an immutable value shared through `Arc`. Two
//! well-known spaces, sRGB and linear sRGB, have canonical shared instances
//! so that cloning them never allocates; see
//! [`clone_color_space`](crate::clone_color_space).

use std::sync::{Arc, LazyLock};

use crate::error::CloneError;
use crate::flatten::{FlatReader, FlatWriter, Flattenable};
use crate::limits::ResourceLimits;

static SRGB: LazyLock<Arc<ColorSpace>> =
    LazyLock::new(|| Arc::new(ColorSpace::new(TransferFunction::Srgb, Gamut::Srgb)));

static SRGB_LINEAR: LazyLock<Arc<ColorSpace>> =
    LazyLock::new(|| Arc::new(ColorSpace::new(TransferFunction::Linear, Gamut::Srgb)));

/// Electro-optical transfer function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
#[repr(u8)]
pub enum TransferFunction {
    /// Linear light (gamma 1.0).
    Linear = 0,
    /// sRGB transfer curve (IEC 61966-2-1).
    Srgb = 1,
    /// BT.709 transfer curve.
    Bt709 = 2,
    /// Perceptual Quantizer (SMPTE ST 2084, HDR10).
    Pq = 3,
    /// Hybrid Log-Gamma (ARIB STD-B67, HLG).
    Hlg = 4,
    /// Pure 2.2 gamma (Adobe RGB).
    Gamma22 = 5,
}

impl TransferFunction {
    const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Linear),
            1 => Some(Self::Srgb),
            2 => Some(Self::Bt709),
            3 => Some(Self::Pq),
            4 => Some(Self::Hlg),
            5 => Some(Self::Gamma22),
            _ => None,
        }
    }
}

/// Color primaries and white point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
#[repr(u8)]
pub enum Gamut {
    /// sRGB / BT.709 primaries, D65.
    Srgb = 0,
    /// Display P3 primaries, D65.
    DisplayP3 = 1,
    /// BT.2020 primaries, D65.
    Bt2020 = 2,
    /// Adobe RGB (1998) primaries, D65.
    AdobeRgb = 3,
}

impl Gamut {
    const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Srgb),
            1 => Some(Self::DisplayP3),
            2 => Some(Self::Bt2020),
            3 => Some(Self::AdobeRgb),
            _ => None,
        }
    }
}

/// Well-known color spaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum NamedProfile {
    /// sRGB (IEC 61966-2-1). The web and desktop default.
    #[default]
    Srgb,
    /// Linear sRGB (sRGB primaries, gamma 1.0).
    LinearSrgb,
    /// Display P3 with sRGB transfer curve.
    DisplayP3,
    /// BT.2020 with BT.709 transfer (SDR wide gamut).
    Bt2020,
    /// BT.2020 with PQ transfer (HDR10).
    Bt2020Pq,
    /// BT.2020 with HLG transfer.
    Bt2020Hlg,
    /// Adobe RGB (1998).
    AdobeRgb,
}

/// Transfer function, gamut, and optional source ICC profile.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ColorSpace {
    transfer: TransferFunction,
    gamut: Gamut,
    icc: Option<Arc<[u8]>>,
}

impl ColorSpace {
    /// Create a color space.
    pub const fn new(transfer: TransferFunction, gamut: Gamut) -> Self {
        Self {
            transfer,
            gamut,
            icc: None,
        }
    }

    /// Create a color space parsed from an ICC profile, keeping the profile
    /// bytes for re-embedding.
    pub fn with_icc(transfer: TransferFunction, gamut: Gamut, icc: impl Into<Arc<[u8]>>) -> Self {
        Self {
            transfer,
            gamut,
            icc: Some(icc.into()),
        }
    }

    /// Canonical shared sRGB instance.
    pub fn srgb() -> Arc<Self> {
        Arc::clone(&SRGB)
    }

    /// Canonical shared linear sRGB instance.
    pub fn srgb_linear() -> Arc<Self> {
        Arc::clone(&SRGB_LINEAR)
    }

    /// Shared instance for a named profile. sRGB and linear sRGB return
    /// their canonical instances; others allocate.
    pub fn named(profile: NamedProfile) -> Arc<Self> {
        let (transfer, gamut) = match profile {
            NamedProfile::Srgb => return Self::srgb(),
            NamedProfile::LinearSrgb => return Self::srgb_linear(),
            NamedProfile::DisplayP3 => (TransferFunction::Srgb, Gamut::DisplayP3),
            NamedProfile::Bt2020 => (TransferFunction::Bt709, Gamut::Bt2020),
            NamedProfile::Bt2020Pq => (TransferFunction::Pq, Gamut::Bt2020),
            NamedProfile::Bt2020Hlg => (TransferFunction::Hlg, Gamut::Bt2020),
            NamedProfile::AdobeRgb => (TransferFunction::Gamma22, Gamut::AdobeRgb),
        };
        Arc::new(Self::new(transfer, gamut))
    }

    /// Transfer function.
    pub fn transfer(&self) -> TransferFunction {
        self.transfer
    }

    /// Primaries.
    pub fn gamut(&self) -> Gamut {
        self.gamut
    }

    /// Source ICC profile, if the space was built from one.
    pub fn icc(&self) -> Option<&[u8]> {
        self.icc.as_deref()
    }

    /// True if this describes sRGB.
    pub fn is_srgb(&self) -> bool {
        *self == **SRGB
    }

    /// True if the transfer function is linear.
    pub fn gamma_is_linear(&self) -> bool {
        self.transfer == TransferFunction::Linear
    }

    /// The canonical shared instance equal to `self`, if there is one.
    pub fn canonical(&self) -> Option<Arc<Self>> {
        [&*SRGB, &*SRGB_LINEAR]
            .into_iter()
            .find(|shared| ***shared == *self)
            .cloned()
    }

    /// Wrap in an `Arc`, reusing the canonical instance when equal.
    pub fn into_shared(self) -> Arc<Self> {
        self.canonical().unwrap_or_else(|| Arc::new(self))
    }
}

impl Flattenable for ColorSpace {
    const FACTORY_NAME: &'static str = "ColorSpace";

    fn flatten(&self, buffer: &mut FlatWriter) {
        buffer.write_u8(self.transfer as u8);
        buffer.write_u8(self.gamut as u8);
        buffer.write_bool(self.icc.is_some());
        if let Some(icc) = &self.icc {
            buffer.write_bytes(icc);
        }
    }

    fn unflatten(buffer: &mut FlatReader<'_>) -> Result<Self, CloneError> {
        let tf = buffer.read_u8()?;
        let transfer = TransferFunction::from_u8(tf).ok_or(CloneError::InvalidValue {
            field: "transfer function",
            value: tf.into(),
        })?;
        let g = buffer.read_u8()?;
        let gamut = Gamut::from_u8(g).ok_or(CloneError::InvalidValue {
            field: "gamut",
            value: g.into(),
        })?;
        let icc = if buffer.read_bool()? {
            Some(Arc::from(buffer.read_bytes()?))
        } else {
            None
        };
        Ok(Self {
            transfer,
            gamut,
            icc,
        })
    }

    /// Canonical spaces return their shared instance; everything else
    /// round-trips into fresh storage.
    fn clone_flattenable(&self) -> Result<Arc<Self>, CloneError> {
        if let Some(shared) = self.canonical() {
            return Ok(shared);
        }
        Self::deserialize_with_limits(&self.serialize(), ResourceLimits::unbounded_depth())
            .map(Arc::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_instances_are_shared() {
        assert!(Arc::ptr_eq(&ColorSpace::srgb(), &ColorSpace::srgb()));
        assert!(Arc::ptr_eq(
            &ColorSpace::named(NamedProfile::LinearSrgb),
            &ColorSpace::srgb_linear()
        ));
        assert!(!Arc::ptr_eq(
            &ColorSpace::named(NamedProfile::DisplayP3),
            &ColorSpace::named(NamedProfile::DisplayP3)
        ));
    }

    #[test]
    fn is_srgb() {
        assert!(ColorSpace::srgb().is_srgb());
        assert!(ColorSpace::new(TransferFunction::Srgb, Gamut::Srgb).is_srgb());
        assert!(!ColorSpace::srgb_linear().is_srgb());
        assert!(ColorSpace::srgb_linear().gamma_is_linear());
        // An ICC-tagged space is not the canonical one.
        let tagged = ColorSpace::with_icc(TransferFunction::Srgb, Gamut::Srgb, vec![1, 2, 3]);
        assert!(!tagged.is_srgb());
        assert!(tagged.canonical().is_none());
    }

    #[test]
    fn into_shared_reuses_canonical() {
        let shared = ColorSpace::new(TransferFunction::Linear, Gamut::Srgb).into_shared();
        assert!(Arc::ptr_eq(&shared, &ColorSpace::srgb_linear()));
        let p3 = ColorSpace::new(TransferFunction::Srgb, Gamut::DisplayP3).into_shared();
        assert_eq!(p3.gamut(), Gamut::DisplayP3);
    }

    #[test]
    fn named_profiles() {
        let pq = ColorSpace::named(NamedProfile::Bt2020Pq);
        assert_eq!(pq.transfer(), TransferFunction::Pq);
        assert_eq!(pq.gamut(), Gamut::Bt2020);
        let adobe = ColorSpace::named(NamedProfile::AdobeRgb);
        assert_eq!(adobe.transfer(), TransferFunction::Gamma22);
        assert_eq!(NamedProfile::default(), NamedProfile::Srgb);
    }

    #[test]
    fn icc_survives_round_trip_in_new_storage() {
        let space = ColorSpace::with_icc(TransferFunction::Hlg, Gamut::Bt2020, vec![9u8; 32]);
        let copy = space.clone_flattenable().unwrap();
        assert_eq!(*copy, space);
        assert_ne!(copy.icc().unwrap().as_ptr(), space.icc().unwrap().as_ptr());
    }

    #[test]
    fn bad_gamut_rejected() {
        let mut writer = FlatWriter::new();
        writer.write_str(ColorSpace::FACTORY_NAME);
        writer.write_u8(TransferFunction::Srgb as u8);
        writer.write_u8(9);
        writer.write_bool(false);
        let err = ColorSpace::deserialize(&writer.finish()).unwrap_err();
        assert_eq!(
            err,
            CloneError::InvalidValue {
                field: "gamut",
                value: 9
            }
        );
    }
}
