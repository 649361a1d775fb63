mod extent;
mod flatten;
mod histogram;
mod projected_extent;
mod statistics;
mod time_instance;

pub use extent::Extent;
pub use flatten::{FieldValue, FlatCodec, FlatFieldType, flatten_struct_array};
pub use histogram::CellHistogram;
pub use projected_extent::{ProjectedExtent, TemporalProjectedExtent};
pub use statistics::CellStatistics;
pub use time_instance::TimeInstance;
