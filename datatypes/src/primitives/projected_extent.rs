use super::{Extent, TimeInstance};
use crate::error;
use crate::raster::MetadataCodec;
use crate::spatial_reference::SpatialReference;
use crate::util::Result;
use crate::util::test::TestDefault;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

/// An extent together with the coordinate reference system it is expressed in
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectedExtent {
    pub extent: Extent,
    pub crs: SpatialReference,
}

impl ProjectedExtent {
    pub fn new(extent: Extent, crs: SpatialReference) -> Self {
        Self { extent, crs }
    }
}

impl TestDefault for ProjectedExtent {
    fn test_default() -> Self {
        Self::new(Extent::test_default(), SpatialReference::test_default())
    }
}

/// A projected extent at an instant in time
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemporalProjectedExtent {
    pub extent: Extent,
    pub crs: SpatialReference,
    pub time: TimeInstance,
}

impl TemporalProjectedExtent {
    pub fn new(extent: Extent, crs: SpatialReference, time: TimeInstance) -> Self {
        Self { extent, crs, time }
    }

    pub fn from_projected_extent(projected_extent: ProjectedExtent, time: TimeInstance) -> Self {
        Self::new(projected_extent.extent, projected_extent.crs, time)
    }

    pub fn projected_extent(&self) -> ProjectedExtent {
        ProjectedExtent::new(self.extent, self.crs.clone())
    }
}

impl TestDefault for TemporalProjectedExtent {
    fn test_default() -> Self {
        Self::from_projected_extent(ProjectedExtent::test_default(), TimeInstance::from_millis(0))
    }
}

// extents are a common kind of tile feature metadata, stored as json
impl MetadataCodec for ProjectedExtent {
    fn encode_metadata(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).context(error::MetadataSerialization)
    }

    fn decode_metadata(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).context(error::MetadataSerialization)
    }
}

impl MetadataCodec for TemporalProjectedExtent {
    fn encode_metadata(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).context(error::MetadataSerialization)
    }

    fn decode_metadata(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).context(error::MetadataSerialization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn metadata_codec() {
        let extent = TemporalProjectedExtent::new(
            Extent::new(0., 1., 2., 3.).unwrap(),
            SpatialReference::epsg(32632),
            TimeInstance::from_millis(1_000),
        );

        let bytes = extent.encode_metadata().unwrap();
        assert_eq!(
            serde_json::from_slice::<serde_json::Value>(&bytes).unwrap(),
            serde_json::json!({
                "extent": {"xmin": 0., "ymin": 1., "xmax": 2., "ymax": 3.},
                "crs": "EPSG:32632",
                "time": 1000
            })
        );
        assert_eq!(TemporalProjectedExtent::decode_metadata(&bytes).unwrap(), extent);

        assert!(matches!(
            ProjectedExtent::decode_metadata(b"not json"),
            Err(Error::MetadataSerialization { .. })
        ));
    }

    #[test]
    fn projected_extent_of_temporal() {
        let extent = TemporalProjectedExtent::test_default();

        assert_eq!(extent.projected_extent(), ProjectedExtent::test_default());
    }
}
