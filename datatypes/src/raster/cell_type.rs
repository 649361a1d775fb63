use super::{Pixel, RasterDataType};
use crate::call_generic_pixel;
use crate::error::{self, Error};
use crate::util::Result;
use num_traits::AsPrimitive;
use serde::de::Visitor;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use snafu::ensure;
use std::fmt::Formatter;
use std::str::FromStr;
use strum::IntoEnumIterator;

const RAW_SUFFIX: &str = "raw";
const USER_DEFINED_INFIX: &str = "ud";

/// How absent cells are represented in a cell buffer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoData {
    /// There is no sentinel, every cell is present (except `NaN` for floating point types).
    Raw,
    /// The data type's default sentinel marks absent cells.
    Default,
    /// A user-defined sentinel marks absent cells.
    UserDefined(f64),
}

/// A cell type is a numeric storage kind together with its no-data convention.
///
/// Cell types are identified by tags like `uint8raw`, `int16` or `float32ud-999`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellType {
    data_type: RasterDataType,
    no_data: NoData,
}

impl CellType {
    /// Creates a new cell type
    ///
    /// # Errors
    ///
    /// This constructor fails if a user-defined no-data value is not representable by the data type.
    ///
    pub fn new(data_type: RasterDataType, no_data: NoData) -> Result<Self> {
        if let NoData::UserDefined(value) = no_data {
            ensure!(
                !value.is_nan() && data_type.is_valid(value),
                error::InvalidCellType {
                    cell_type: format!("{}{USER_DEFINED_INFIX}{value}", data_type.name())
                }
            );
        }

        Ok(Self { data_type, no_data })
    }

    /// A cell type without no-data sentinel
    pub fn raw(data_type: RasterDataType) -> Self {
        Self {
            data_type,
            no_data: NoData::Raw,
        }
    }

    /// A cell type using the data type's default sentinel
    pub fn with_default_no_data(data_type: RasterDataType) -> Self {
        Self {
            data_type,
            no_data: NoData::Default,
        }
    }

    /// All cell types that can be enumerated, i.e., the raw and default variants of every data type.
    pub fn all() -> Vec<CellType> {
        RasterDataType::iter()
            .flat_map(|data_type| {
                [
                    CellType::raw(data_type),
                    CellType::with_default_no_data(data_type),
                ]
            })
            .collect()
    }

    pub fn data_type(&self) -> RasterDataType {
        self.data_type
    }

    pub fn no_data(&self) -> NoData {
        self.no_data
    }

    pub fn byte_width(&self) -> usize {
        self.data_type.byte_width()
    }

    pub fn is_floating_point(&self) -> bool {
        self.data_type.is_floating_point()
    }

    /// Returns true if the cell type has a sentinel for absent cells.
    /// Floating point cell types can always represent absent cells as `NaN`.
    pub fn has_no_data(&self) -> bool {
        !matches!(self.no_data, NoData::Raw) || self.is_floating_point()
    }

    /// The sentinel value, if there is one
    pub fn no_data_value(&self) -> Option<f64> {
        match self.no_data {
            NoData::Raw => None,
            NoData::Default => Some(self.data_type.default_no_data_value()),
            NoData::UserDefined(value) => Some(value),
        }
    }

    /// Returns true if a decoded value marks an absent cell
    #[inline]
    #[allow(clippy::float_cmp)]
    pub fn is_no_data(&self, value: f64) -> bool {
        if value.is_nan() {
            return true;
        }

        match self.no_data {
            NoData::Raw => false,
            NoData::Default => {
                !self.is_floating_point() && value == self.data_type.default_no_data_value()
            }
            NoData::UserDefined(no_data_value) => value == no_data_value,
        }
    }

    /// The value that is written for absent cells
    fn absent_value(&self) -> f64 {
        match self.no_data {
            NoData::Raw if self.is_floating_point() => f64::NAN,
            NoData::Raw => 0.,
            NoData::Default => self.data_type.default_no_data_value(),
            NoData::UserDefined(value) => value,
        }
    }

    /// Reads the cell at `index` without interpreting sentinels.
    ///
    /// # Panics
    ///
    /// If `index` lies outside of `bytes`.
    pub fn decode_raw(&self, bytes: &[u8], index: usize) -> f64 {
        call_generic_pixel!(self.data_type, P => {
            let offset = index * P::BYTE_WIDTH;
            P::read_le(&bytes[offset..offset + P::BYTE_WIDTH]).as_()
        })
    }

    /// Reads the cell at `index`, returning `None` for absent cells.
    ///
    /// # Panics
    ///
    /// If `index` lies outside of `bytes`.
    pub fn decode(&self, bytes: &[u8], index: usize) -> Option<f64> {
        let value = self.decode_raw(bytes, index);
        (!self.is_no_data(value)).then_some(value)
    }

    /// Decodes all cells of a buffer, returning `None` for absent cells.
    pub fn decode_all(&self, bytes: &[u8]) -> Vec<Option<f64>> {
        call_generic_pixel!(self.data_type, P => {
            bytes
                .chunks_exact(P::BYTE_WIDTH)
                .map(|chunk| {
                    let value: f64 = P::read_le(chunk).as_();
                    (!self.is_no_data(value)).then_some(value)
                })
                .collect()
        })
    }

    /// Writes a cell at `index`. `None` is written as the sentinel.
    ///
    /// Values are cast to the data type, i.e., integers saturate.
    /// Raw integer types have no sentinel, so absent cells are written as zero.
    ///
    /// # Panics
    ///
    /// If `index` lies outside of `bytes`.
    pub fn encode(&self, value: Option<f64>, bytes: &mut [u8], index: usize) {
        let value = value.unwrap_or_else(|| self.absent_value());
        call_generic_pixel!(self.data_type, P => {
            let offset = index * P::BYTE_WIDTH;
            P::from_f64(value).write_le(&mut bytes[offset..offset + P::BYTE_WIDTH]);
        });
    }

    /// Encodes a sequence of cells into a new buffer.
    pub fn encode_all<I>(&self, values: I) -> Vec<u8>
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        let absent = self.absent_value();
        call_generic_pixel!(self.data_type, P => {
            let mut bytes = Vec::new();
            let mut buffer = [0; 8];
            for value in values {
                P::from_f64(value.unwrap_or(absent)).write_le(&mut buffer[..P::BYTE_WIDTH]);
                bytes.extend_from_slice(&buffer[..P::BYTE_WIDTH]);
            }
            bytes
        })
    }

    /// Returns true if `value` decodes to a present cell of this cell type
    fn holds_present(&self, value: f64) -> bool {
        self.data_type.is_valid(value) && !self.is_no_data(value)
    }

    /// The smallest data type that represents every present value of this cell type
    /// and whose default sentinel is none of them.
    fn sentinel_safe_data_type(&self) -> RasterDataType {
        // the variant order is a linear extension of `covers`, so the first match is the least one
        RasterDataType::iter()
            .find(|candidate| {
                candidate.covers(self.data_type)
                    && (candidate.is_floating_point()
                        || !self.holds_present(candidate.default_no_data_value()))
            })
            .unwrap_or(RasterDataType::F64)
    }

    /// The numerically wider of two cell types.
    ///
    /// Identical cell types stay as they are. Otherwise the result uses the default sentinel of
    /// the least data type that covers the sentinel-safe data types of both inputs, so no present
    /// value of either input collides with the sentinel, e.g. `uint8raw ∪ uint8 = int16`.
    /// The operation is associative and commutative.
    pub fn union(&self, other: &CellType) -> CellType {
        if self == other {
            return *self;
        }

        let data_type = self
            .sentinel_safe_data_type()
            .union(other.sentinel_safe_data_type());

        CellType::with_default_no_data(data_type)
    }
}

impl std::fmt::Display for CellType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = self.data_type.name();
        match self.no_data {
            NoData::Raw => write!(f, "{name}{RAW_SUFFIX}"),
            NoData::Default => write!(f, "{name}"),
            NoData::UserDefined(value) => write!(f, "{name}{USER_DEFINED_INFIX}{value}"),
        }
    }
}

impl FromStr for CellType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidCellType {
            cell_type: s.to_string(),
        };

        if let Some(name) = s.strip_suffix(RAW_SUFFIX) {
            let data_type = RasterDataType::from_name(name).ok_or_else(invalid)?;
            return Ok(CellType::raw(data_type));
        }

        if let Some(data_type) = RasterDataType::from_name(s) {
            return Ok(CellType::with_default_no_data(data_type));
        }

        let (name, value) = s.split_once(USER_DEFINED_INFIX).ok_or_else(invalid)?;
        let data_type = RasterDataType::from_name(name).ok_or_else(invalid)?;
        let value: f64 = value.parse().map_err(|_| invalid())?;

        CellType::new(data_type, NoData::UserDefined(value)).map_err(|_| invalid())
    }
}

impl Serialize for CellType {
    fn serialize<S>(&self, serializer: S) -> Result<<S as Serializer>::Ok, <S as Serializer>::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Helper struct for deserializing a `CellType`
struct CellTypeDeserializeVisitor;

impl Visitor<'_> for CellTypeDeserializeVisitor {
    type Value = CellType;

    fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
        formatter.write_str("a cell type tag like `uint8raw`, `int16` or `float32ud-999`")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        v.parse().map_err(serde::de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for CellType {
    fn deserialize<D>(deserializer: D) -> Result<Self, <D as Deserializer<'de>>::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(CellTypeDeserializeVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn tags_round_trip() {
        let cell_types = CellType::all();
        assert_eq!(cell_types.len(), 16);

        let tags: HashSet<String> = cell_types.iter().map(ToString::to_string).collect();
        assert_eq!(tags.len(), cell_types.len());

        for cell_type in cell_types {
            let parsed: CellType = cell_type.to_string().parse().unwrap();
            assert_eq!(parsed, cell_type);
        }
    }

    #[test]
    fn parse_tags() {
        assert_eq!(
            "int8raw".parse::<CellType>().unwrap(),
            CellType::raw(RasterDataType::I8)
        );
        assert_eq!(
            "float32".parse::<CellType>().unwrap(),
            CellType::with_default_no_data(RasterDataType::F32)
        );
        assert_eq!(
            "int16ud-999".parse::<CellType>().unwrap(),
            CellType::new(RasterDataType::I16, NoData::UserDefined(-999.)).unwrap()
        );
        assert_eq!(
            "int16ud-999".parse::<CellType>().unwrap().to_string(),
            "int16ud-999"
        );
    }

    #[test]
    fn reject_invalid_tags() {
        for tag in ["", "int64", "uint8ud-1", "float32udfoo", "int8rawraw", "bool"] {
            assert!(
                matches!(
                    tag.parse::<CellType>(),
                    Err(Error::InvalidCellType { .. })
                ),
                "{tag} should be rejected"
            );
        }
    }

    #[test]
    fn decode_encode() {
        let cell_type = CellType::with_default_no_data(RasterDataType::I16);
        let mut bytes = vec![0; 3 * cell_type.byte_width()];

        cell_type.encode(Some(-5.), &mut bytes, 0);
        cell_type.encode(None, &mut bytes, 1);
        cell_type.encode(Some(42.), &mut bytes, 2);

        assert_eq!(cell_type.decode(&bytes, 0), Some(-5.));
        assert_eq!(cell_type.decode(&bytes, 1), None);
        assert_eq!(cell_type.decode_raw(&bytes, 1), f64::from(i16::MIN));
        assert_eq!(cell_type.decode(&bytes, 2), Some(42.));

        assert_eq!(cell_type.decode_all(&bytes), vec![Some(-5.), None, Some(42.)]);
    }

    #[test]
    fn raw_types_have_no_sentinel() {
        let cell_type = CellType::raw(RasterDataType::U8);
        let bytes = cell_type.encode_all([Some(0.), None, Some(255.)]);

        assert_eq!(bytes, vec![0, 0, 255]);
        assert_eq!(cell_type.decode_all(&bytes), vec![Some(0.), Some(0.), Some(255.)]);
    }

    #[test]
    fn nan_is_always_absent() {
        let cell_type = CellType::raw(RasterDataType::F32);
        let bytes = cell_type.encode_all([Some(1.5), None]);

        assert_eq!(cell_type.decode_all(&bytes), vec![Some(1.5), None]);
    }

    #[test]
    fn user_defined_no_data() {
        let cell_type: CellType = "uint8ud7".parse().unwrap();
        let bytes = cell_type.encode_all([Some(7.), Some(8.), None]);

        assert_eq!(bytes, vec![7, 8, 7]);
        assert_eq!(cell_type.decode_all(&bytes), vec![None, Some(8.), None]);
    }

    #[test]
    fn union_of_cell_types() {
        let uint8raw: CellType = "uint8raw".parse().unwrap();
        let int8: CellType = "int8".parse().unwrap();
        let int16ud: CellType = "int16ud-999".parse().unwrap();

        assert_eq!(uint8raw.union(&uint8raw), uint8raw);
        assert_eq!(int16ud.union(&int16ud), int16ud);
        assert_eq!(uint8raw.union(&int8).to_string(), "int16");
        assert_eq!(
            uint8raw.union(&CellType::raw(RasterDataType::I8)).to_string(),
            "int16"
        );
        assert_eq!(int8.union(&"int16".parse().unwrap()).to_string(), "int16");
        assert_eq!(
            "uint16".parse::<CellType>().unwrap().union(&"uint8".parse().unwrap()).to_string(),
            "uint16"
        );
        assert_eq!(int16ud.union(&int8).to_string(), "int32");
        assert_eq!(
            "int32raw".parse::<CellType>().unwrap().union(&"int32".parse().unwrap()).to_string(),
            "float64"
        );
        assert_eq!(
            "float32raw".parse::<CellType>().unwrap().union(&"float32ud-1".parse().unwrap()).to_string(),
            "float32"
        );
    }

    #[test]
    fn union_keeps_present_values() {
        let mut cell_types = CellType::all();
        cell_types.push("int16ud-999".parse().unwrap());
        cell_types.push("uint8ud7".parse().unwrap());
        cell_types.push("uint8ud0".parse().unwrap());
        cell_types.push("int8ud-128".parse().unwrap());

        for a in &cell_types {
            for b in &cell_types {
                let union = a.union(b);

                for input in [a, b] {
                    let data_type = input.data_type();
                    let boundaries = [
                        0.,
                        1.,
                        -1.,
                        -999.,
                        7.,
                        f64::from(i8::MIN),
                        f64::from(i16::MIN),
                        f64::from(i32::MIN),
                        f64::from(u8::MAX),
                        f64::from(u16::MAX),
                        f64::from(u32::MAX),
                    ];

                    for value in boundaries {
                        if !data_type.is_valid(value) || input.is_no_data(value) {
                            continue;
                        }

                        let bytes = union.encode_all([Some(value)]);
                        assert_eq!(
                            union.decode_all(&bytes),
                            vec![Some(value)],
                            "{value} of {input} in {a} ∪ {b} = {union}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn union_is_associative_and_commutative() {
        let mut cell_types = CellType::all();
        cell_types.push("int16ud-999".parse().unwrap());
        cell_types.push("uint8ud0".parse().unwrap());
        cell_types.push("int8ud-128".parse().unwrap());
        cell_types.push("float32ud-1".parse().unwrap());

        for a in &cell_types {
            for b in &cell_types {
                assert_eq!(a.union(b), b.union(a));

                for c in &cell_types {
                    assert_eq!(a.union(b).union(c), a.union(&b.union(c)));
                }
            }
        }
    }

    #[test]
    fn serde() {
        let cell_type: CellType = "float64ud-1.5".parse().unwrap();
        let json = serde_json::to_string(&cell_type).unwrap();
        assert_eq!(json, "\"float64ud-1.5\"");
        assert_eq!(serde_json::from_str::<CellType>(&json).unwrap(), cell_type);
    }
}
