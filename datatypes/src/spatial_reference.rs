use crate::util::test::TestDefault;
use serde::de::Visitor;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::Formatter;
use std::str::FromStr;

/// A spatial reference authority that is part of an `authority:code` definition
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub enum SpatialReferenceAuthority {
    Epsg,
    SrOrg,
    Iau2000,
    Esri,
}

impl std::fmt::Display for SpatialReferenceAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                SpatialReferenceAuthority::Epsg => "EPSG",
                SpatialReferenceAuthority::SrOrg => "SR-ORG",
                SpatialReferenceAuthority::Iau2000 => "IAU2000",
                SpatialReferenceAuthority::Esri => "ESRI",
            }
        )
    }
}

impl FromStr for SpatialReferenceAuthority {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "EPSG" => SpatialReferenceAuthority::Epsg,
            "SR-ORG" => SpatialReferenceAuthority::SrOrg,
            "IAU2000" => SpatialReferenceAuthority::Iau2000,
            "ESRI" => SpatialReferenceAuthority::Esri,
            _ => return Err(()),
        })
    }
}

/// A coordinate reference system identifier.
///
/// The definition is opaque and not validated, it is usually of the form `authority:code`
/// but may also be a proj string or WKT.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SpatialReference {
    definition: String,
}

impl SpatialReference {
    pub fn new(definition: impl Into<String>) -> Self {
        Self {
            definition: definition.into(),
        }
    }

    pub fn from_authority(authority: SpatialReferenceAuthority, code: u32) -> Self {
        Self::new(format!("{authority}:{code}"))
    }

    pub fn epsg(code: u32) -> Self {
        Self::from_authority(SpatialReferenceAuthority::Epsg, code)
    }

    /// the WGS 84 spatial reference system
    pub fn epsg_4326() -> Self {
        Self::epsg(4326)
    }

    pub fn definition(&self) -> &str {
        &self.definition
    }

    /// The authority and code if the definition is of the form `authority:code`
    pub fn authority_and_code(&self) -> Option<(SpatialReferenceAuthority, u32)> {
        let (authority, code) = self.definition.split_once(':')?;
        Some((authority.trim().parse().ok()?, code.trim().parse().ok()?))
    }

    /// The EPSG code, if this is an EPSG definition
    pub fn epsg_code(&self) -> Option<u32> {
        match self.authority_and_code()? {
            (SpatialReferenceAuthority::Epsg, code) => Some(code),
            _ => None,
        }
    }
}

impl std::fmt::Display for SpatialReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.definition)
    }
}

impl From<&str> for SpatialReference {
    fn from(definition: &str) -> Self {
        Self::new(definition)
    }
}

impl TestDefault for SpatialReference {
    fn test_default() -> Self {
        Self::epsg_4326()
    }
}

impl Serialize for SpatialReference {
    fn serialize<S>(&self, serializer: S) -> Result<<S as Serializer>::Ok, <S as Serializer>::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.definition)
    }
}

/// Helper struct for deserializing a `SpatialReference`
struct SpatialReferenceDeserializeVisitor;

impl Visitor<'_> for SpatialReferenceDeserializeVisitor {
    type Value = SpatialReference;

    fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
        formatter.write_str("a spatial reference definition, e.g. in the form authority:code")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        Ok(SpatialReference::new(v))
    }
}

impl<'de> Deserialize<'de> for SpatialReference {
    fn deserialize<D>(deserializer: D) -> Result<Self, <D as Deserializer<'de>>::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(SpatialReferenceDeserializeVisitor)
    }
}
