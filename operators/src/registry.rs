use crate::engine::{
    AggregateFunction, FunctionDescriptor, FunctionImplementation, FunctionKind,
    GeneratorFunction, ScalarFunction, TypeDescriptor,
};
use crate::error;
use crate::processing::{
    AggHistogram, AggMean, AggStats, CellTypes, ConvertCellType, DataCells, ExplodeTiles,
    ExplodeTilesSample, Flatten, FocalReduce, GridCols, GridRows, LocalMax, LocalMin,
    MakeConstantTile, MakeTiles, NoDataCells, TileAggregate, TileAggregateFunction, TileCellType,
    TileHistogram, TileMean, TileStats,
};
use crate::util::Result;
use rasterql_datatypes::primitives::{Extent, FlatCodec, ProjectedExtent, TemporalProjectedExtent};
use rasterql_datatypes::raster::{
    MULTIBAND_TILE_EXTENSION_NAME, TILE_EXTENSION_NAME, TILE_FEATURE_EXTENSION_NAME,
    multiband_tile_data_type, tile_data_type, tile_feature_data_type,
};
use rasterql_datatypes::spatial_reference::SpatialReference;
use serde::Deserialize;
use snafu::ensure;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// The version of the SQL-visible function names and signatures
pub const SQL_CONTRACT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RegistryOptions {
    /// Prepended to every function name, e.g. `rf_`
    pub prefix: String,
    pub focal_max_radius: usize,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            prefix: "rf_".to_string(),
            focal_max_radius: 64,
        }
    }
}

/// The table of all raster functions, keyed by their prefixed name
#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, FunctionDescriptor>,
}

impl FunctionRegistry {
    /// Builds the table of all raster functions
    ///
    /// # Errors
    ///
    /// Fails with `DuplicateFunction` if two functions share a name.
    ///
    pub fn new(options: &RegistryOptions) -> Result<Self> {
        let mut registry = Self {
            functions: BTreeMap::new(),
        };
        let prefix = options.prefix.as_str();

        registry.register_scalar(
            prefix,
            MakeConstantTile,
            "Builds a tile of `cols` x `rows` cells, all holding `value`, of the given cell type.",
        )?;
        registry.register_scalar(prefix, GridRows, "The number of rows of a tile.")?;
        registry.register_scalar(prefix, GridCols, "The number of columns of a tile.")?;
        registry.register_scalar(prefix, TileCellType, "The cell type tag of a tile.")?;
        registry.register_scalar(
            prefix,
            ConvertCellType,
            "Re-encodes a tile with another cell type, keeping absent cells absent.",
        )?;
        registry.register_scalar(
            prefix,
            FocalReduce::new(options.focal_max_radius),
            "Reduces the square or circular neighborhood of every cell with sum, mean, min, max, median, mode or stddev.",
        )?;
        registry.register_scalar(
            prefix,
            CellTypes,
            "All cell type tags without a user-defined no-data value.",
        )?;
        registry.register_scalar(
            prefix,
            Flatten,
            "Flattens a nested extent, CRS or time struct into its flat representation.",
        )?;
        registry.register_scalar(
            prefix,
            TileStats,
            "Cell count, mean, variance, standard deviation, min and max of the present cells of a tile.",
        )?;
        registry.register_scalar(
            prefix,
            TileHistogram,
            "The histogram of the present cells of a tile, with an optional bucket width.",
        )?;
        registry.register_scalar(
            prefix,
            TileMean,
            "The mean of the present cells of a tile, null if there are none.",
        )?;
        registry.register_scalar(prefix, DataCells, "The number of present cells of a tile.")?;
        registry.register_scalar(prefix, NoDataCells, "The number of absent cells of a tile.")?;

        registry.register_generator(prefix, MakeTiles, "Generates `n` 4x4 sample tiles.")?;
        registry.register_generator(
            prefix,
            ExplodeTiles,
            "Generates one row per cell of co-located tiles, with the cell's column and row index.",
        )?;
        registry.register_generator(
            prefix,
            ExplodeTilesSample,
            "A seeded Bernoulli sample of the rows of `explode_tiles`.",
        )?;

        registry.register_aggregate(
            prefix,
            LocalMax::new(),
            "The cell-wise maximum of all tiles of a group.",
        )?;
        registry.register_aggregate(
            prefix,
            LocalMin::new(),
            "The cell-wise minimum of all tiles of a group.",
        )?;
        registry.register_aggregate(prefix, AggMean, "The mean of all present cells of a group.")?;
        registry.register_aggregate(prefix, AggStats, "The statistics of all cells of a group.")?;
        registry.register_aggregate(
            prefix,
            AggHistogram,
            "The histogram of all present cells of a group, with an optional bucket width.",
        )?;

        debug!(
            functions = registry.functions.len(),
            prefix, "built raster function registry"
        );

        Ok(registry)
    }

    fn register_scalar<F: ScalarFunction + 'static>(
        &mut self,
        prefix: &str,
        function: F,
        documentation: &'static str,
    ) -> Result<()> {
        let function: Arc<dyn ScalarFunction> = function.boxed();
        self.register(FunctionDescriptor::new(prefix, function, documentation))
    }

    fn register_generator<F: GeneratorFunction + 'static>(
        &mut self,
        prefix: &str,
        function: F,
        documentation: &'static str,
    ) -> Result<()> {
        let function: Arc<dyn GeneratorFunction> = function.boxed();
        self.register(FunctionDescriptor::new(prefix, function, documentation))
    }

    fn register_aggregate<A: TileAggregate>(
        &mut self,
        prefix: &str,
        aggregate: A,
        documentation: &'static str,
    ) -> Result<()> {
        let function: Arc<dyn AggregateFunction> = TileAggregateFunction::new(aggregate).boxed();
        self.register(FunctionDescriptor::new(prefix, function, documentation))
    }

    /// Adds a function to the table
    ///
    /// # Errors
    ///
    /// Fails with `DuplicateFunction` if the name is already taken.
    ///
    pub fn register(&mut self, descriptor: FunctionDescriptor) -> Result<()> {
        ensure!(
            !self.functions.contains_key(&descriptor.name),
            error::DuplicateFunction {
                name: descriptor.name.clone(),
            }
        );

        self.functions.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&FunctionDescriptor> {
        self.functions.get(name)
    }

    pub fn scalar(&self, name: &str) -> Option<Arc<dyn ScalarFunction>> {
        match &self.get(name)?.implementation {
            FunctionImplementation::Scalar(function) => Some(function.clone()),
            _ => None,
        }
    }

    pub fn generator(&self, name: &str) -> Option<Arc<dyn GeneratorFunction>> {
        match &self.get(name)?.implementation {
            FunctionImplementation::Generator(function) => Some(function.clone()),
            _ => None,
        }
    }

    pub fn aggregate(&self, name: &str) -> Option<Arc<dyn AggregateFunction>> {
        match &self.get(name)?.implementation {
            FunctionImplementation::Aggregate(function) => Some(function.clone()),
            _ => None,
        }
    }

    /// All functions in the order of their names
    pub fn functions(&self) -> impl Iterator<Item = &FunctionDescriptor> {
        self.functions.values()
    }

    pub fn functions_of_kind(
        &self,
        kind: FunctionKind,
    ) -> impl Iterator<Item = &FunctionDescriptor> {
        self.functions().filter(move |function| function.kind() == kind)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn into_descriptors(self) -> Vec<FunctionDescriptor> {
        self.functions.into_values().collect()
    }
}

/// The column types of raster values and their flat metadata structs
pub fn type_descriptors() -> Vec<TypeDescriptor> {
    vec![
        TypeDescriptor {
            name: "tile",
            data_type: tile_data_type(),
            extension_name: Some(TILE_EXTENSION_NAME),
        },
        TypeDescriptor {
            name: "multiband_tile",
            data_type: multiband_tile_data_type(),
            extension_name: Some(MULTIBAND_TILE_EXTENSION_NAME),
        },
        TypeDescriptor {
            name: "tile_feature",
            data_type: tile_feature_data_type(),
            extension_name: Some(TILE_FEATURE_EXTENSION_NAME),
        },
        flat_type::<Extent>(),
        flat_type::<SpatialReference>(),
        flat_type::<ProjectedExtent>(),
        flat_type::<TemporalProjectedExtent>(),
    ]
}

fn flat_type<T: FlatCodec>() -> TypeDescriptor {
    TypeDescriptor {
        name: T::NAME,
        data_type: T::arrow_data_type(),
        extension_name: None,
    }
}
