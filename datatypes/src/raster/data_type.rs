use num_traits::{AsPrimitive, Bounded};
use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator};

/// A collection of required traits for a pixel type
pub trait Pixel:
    'static
    + Copy
    + std::fmt::Debug
    + Default
    + Sync
    + Send
    + Bounded
    + PartialOrd
    + AsPrimitive<f64>
    + StaticRasterDataType
    + DefaultNoDataValue
{
    /// Number of bytes a single pixel occupies in a cell buffer
    const BYTE_WIDTH: usize;

    /// Converts a `f64` into the pixel type. Integers saturate and `NaN` becomes zero.
    fn from_f64(value: f64) -> Self;

    /// Reads a little-endian pixel from a slice of exactly `BYTE_WIDTH` bytes.
    fn read_le(bytes: &[u8]) -> Self;

    /// Writes the pixel little-endian into a slice of exactly `BYTE_WIDTH` bytes.
    fn write_le(self, bytes: &mut [u8]);
}

macro_rules! impl_pixel {
    ($($pixel:ty),+) => {
        $(
            impl Pixel for $pixel {
                const BYTE_WIDTH: usize = std::mem::size_of::<$pixel>();

                #[inline]
                fn from_f64(value: f64) -> Self {
                    value as $pixel
                }

                #[inline]
                fn read_le(bytes: &[u8]) -> Self {
                    let mut buffer = [0; std::mem::size_of::<$pixel>()];
                    buffer.copy_from_slice(bytes);
                    <$pixel>::from_le_bytes(buffer)
                }

                #[inline]
                fn write_le(self, bytes: &mut [u8]) {
                    bytes.copy_from_slice(&self.to_le_bytes());
                }
            }
        )+
    };
}

impl_pixel!(u8, i8, u16, i16, u32, i32, f32, f64);

#[derive(
    Debug, Ord, PartialOrd, Eq, PartialEq, Hash, Deserialize, Serialize, Copy, Clone, EnumIter,
)]
#[serde(rename_all = "lowercase")]
pub enum RasterDataType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F32,
    F64,
}

impl RasterDataType {
    /// Returns true if the given `value` is valid for the `RasterDataType` variant,
    /// i.e. it can be represented by a variable of the corresponding primitive data type
    #[allow(clippy::float_cmp)]
    #[allow(clippy::cast_lossless)]
    pub fn is_valid(self, value: f64) -> bool {
        match self {
            RasterDataType::U8 => value as u8 as f64 == value,
            RasterDataType::I8 => value as i8 as f64 == value,
            RasterDataType::U16 => value as u16 as f64 == value,
            RasterDataType::I16 => value as i16 as f64 == value,
            RasterDataType::U32 => value as u32 as f64 == value,
            RasterDataType::I32 => value as i32 as f64 == value,
            RasterDataType::F32 => value.is_nan() || value as f32 as f64 == value,
            RasterDataType::F64 => true,
        }
    }

    /// Size of one cell in bytes
    pub fn byte_width(self) -> usize {
        crate::call_generic_pixel!(self, P => P::BYTE_WIDTH)
    }

    pub fn is_floating_point(self) -> bool {
        matches!(self, RasterDataType::F32 | RasterDataType::F64)
    }

    /// The name used in cell type tags, e.g. `uint8` or `float32`
    pub fn name(self) -> &'static str {
        match self {
            RasterDataType::U8 => "uint8",
            RasterDataType::I8 => "int8",
            RasterDataType::U16 => "uint16",
            RasterDataType::I16 => "int16",
            RasterDataType::U32 => "uint32",
            RasterDataType::I32 => "int32",
            RasterDataType::F32 => "float32",
            RasterDataType::F64 => "float64",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        RasterDataType::iter().find(|data_type| data_type.name() == name)
    }

    /// The default no-data value of this data type as `f64`
    pub fn default_no_data_value(self) -> f64 {
        crate::call_generic_pixel!(self, P => P::DEFAULT_NO_DATA_VALUE.as_())
    }

    /// Returns true if every value of `other` can be represented exactly by `self`.
    ///
    /// `F32` only covers itself, so that every pair of data types has a least upper bound.
    pub fn covers(self, other: RasterDataType) -> bool {
        use RasterDataType::*;

        if self == other {
            return true;
        }

        match self {
            U8 | I8 | F32 => false,
            U16 => matches!(other, U8),
            I16 => matches!(other, U8 | I8),
            U32 => matches!(other, U8 | U16),
            I32 => matches!(other, U8 | I8 | U16 | I16),
            F64 => true,
        }
    }

    /// The smallest data type that covers both `self` and `other`.
    pub fn union(self, other: RasterDataType) -> RasterDataType {
        // the variant order is a linear extension of `covers`, so the first match is the least upper bound
        RasterDataType::iter()
            .find(|candidate| candidate.covers(self) && candidate.covers(other))
            .unwrap_or(RasterDataType::F64)
    }
}

pub trait StaticRasterDataType: Copy + Default + 'static {
    const TYPE: RasterDataType;
}

impl StaticRasterDataType for u8 {
    const TYPE: RasterDataType = RasterDataType::U8;
}

impl StaticRasterDataType for i8 {
    const TYPE: RasterDataType = RasterDataType::I8;
}

impl StaticRasterDataType for u16 {
    const TYPE: RasterDataType = RasterDataType::U16;
}

impl StaticRasterDataType for i16 {
    const TYPE: RasterDataType = RasterDataType::I16;
}

impl StaticRasterDataType for u32 {
    const TYPE: RasterDataType = RasterDataType::U32;
}

impl StaticRasterDataType for i32 {
    const TYPE: RasterDataType = RasterDataType::I32;
}

impl StaticRasterDataType for f32 {
    const TYPE: RasterDataType = RasterDataType::F32;
}

impl StaticRasterDataType for f64 {
    const TYPE: RasterDataType = RasterDataType::F64;
}

pub trait DefaultNoDataValue {
    /// The value that is used as default to represent no data for a data type
    const DEFAULT_NO_DATA_VALUE: Self;
}

impl DefaultNoDataValue for u8 {
    const DEFAULT_NO_DATA_VALUE: Self = 0;
}

impl DefaultNoDataValue for i8 {
    const DEFAULT_NO_DATA_VALUE: Self = Self::MIN;
}

impl DefaultNoDataValue for u16 {
    const DEFAULT_NO_DATA_VALUE: Self = 0;
}

impl DefaultNoDataValue for i16 {
    const DEFAULT_NO_DATA_VALUE: Self = Self::MIN;
}

impl DefaultNoDataValue for u32 {
    const DEFAULT_NO_DATA_VALUE: Self = 0;
}

impl DefaultNoDataValue for i32 {
    const DEFAULT_NO_DATA_VALUE: Self = Self::MIN;
}

impl DefaultNoDataValue for f32 {
    const DEFAULT_NO_DATA_VALUE: Self = Self::NAN;
}

impl DefaultNoDataValue for f64 {
    const DEFAULT_NO_DATA_VALUE: Self = Self::NAN;
}

/// Calls an expression with the pixel type matching a `RasterDataType` bound to an identifier.
/// Call via `call_generic_pixel!(data_type, P => expression_using_P)`.
#[macro_export]
macro_rules! call_generic_pixel {
    ($data_type:expr, $pixel:ident => $function_call:expr) => {
        $crate::call_generic_pixel!(
            @variants $data_type, $pixel => $function_call,
            (U8, u8), (I8, i8), (U16, u16), (I16, i16), (U32, u32), (I32, i32), (F32, f32), (F64, f64)
        )
    };

    (@variants $data_type:expr, $pixel:ident => $function_call:expr, $(($variant:tt, $ty:ty)),+) => {
        match $data_type {
            $(
                $crate::raster::RasterDataType::$variant => {
                    type $pixel = $ty;
                    $function_call
                }
            )+
        }
    };
}
