//! Element types the kernels operate on

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::kernel::{self, SimdLevel};

/// Width of one array element in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ElementWidth {
    /// 32-bit `f32`
    Four,
    /// 64-bit `f64`
    Eight,
}

impl ElementWidth {
    #[inline]
    pub const fn bytes(self) -> usize {
        match self {
            ElementWidth::Four => 4,
            ElementWidth::Eight => 8,
        }
    }

    /// Elements per 512-bit vector.
    #[inline]
    pub const fn lanes_512(self) -> usize {
        64 / self.bytes()
    }

    pub const fn type_name(self) -> &'static str {
        match self {
            ElementWidth::Four => "f32",
            ElementWidth::Eight => "f64",
        }
    }
}

impl TryFrom<u8> for ElementWidth {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            4 => Ok(ElementWidth::Four),
            8 => Ok(ElementWidth::Eight),
            other => Err(format!("element width must be 4 or 8 bytes, got {other}")),
        }
    }
}

impl From<ElementWidth> for u8 {
    fn from(width: ElementWidth) -> Self {
        width.bytes() as u8
    }
}

impl fmt::Display for ElementWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.type_name(), self.bytes())
    }
}

/// A floating point element that has a streaming-store copy kernel.
pub trait StreamElement:
    Copy + PartialEq + Default + fmt::Debug + Send + Sync + 'static
{
    const WIDTH: ElementWidth;
    const NAME: &'static str;

    fn from_f64(value: f64) -> Self;
    fn to_f64(self) -> f64;

    /// Copies `src` into `dst` using the kernel for `level`.
    ///
    /// Callers must pass a level the running CPU supports; use
    /// [`kernel::stream_copy`] for the dispatched entry point.
    fn copy_at_level(level: SimdLevel, src: &[Self], dst: &mut [Self]);
}

impl StreamElement for f32 {
    const WIDTH: ElementWidth = ElementWidth::Four;
    const NAME: &'static str = "f32";

    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    fn copy_at_level(level: SimdLevel, src: &[Self], dst: &mut [Self]) {
        kernel::copy_f32(level, src, dst);
    }
}

impl StreamElement for f64 {
    const WIDTH: ElementWidth = ElementWidth::Eight;
    const NAME: &'static str = "f64";

    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    fn copy_at_level(level: SimdLevel, src: &[Self], dst: &mut [Self]) {
        kernel::copy_f64(level, src, dst);
    }
}
