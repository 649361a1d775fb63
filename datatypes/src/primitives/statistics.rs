use crate::error;
use crate::raster::Tile;
use crate::util::Result;
use serde::{Deserialize, Serialize};
use snafu::ensure;

/// Running descriptive statistics over the present cells of one or more tiles.
///
/// Uses Welford's online algorithm and Chan et al.'s parallel combination, so partial
/// statistics of disjoint cell sets can be merged in any order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellStatistics {
    data_cells: u64,
    no_data_cells: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl Default for CellStatistics {
    fn default() -> Self {
        Self {
            data_cells: 0,
            no_data_cells: 0,
            mean: 0.,
            m2: 0.,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl CellStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores statistics from their raw parts, e.g. from a serialized partial aggregate
    pub fn from_parts(
        data_cells: u64,
        no_data_cells: u64,
        mean: f64,
        m2: f64,
        min: f64,
        max: f64,
    ) -> Self {
        if data_cells == 0 {
            return Self {
                no_data_cells,
                ..Self::default()
            };
        }

        Self {
            data_cells,
            no_data_cells,
            mean,
            m2,
            min,
            max,
        }
    }

    pub fn from_tile(tile: &Tile) -> Self {
        let mut statistics = Self::new();
        statistics.add_tile(tile);
        statistics
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn add(&mut self, value: Option<f64>) {
        let Some(value) = value else {
            self.no_data_cells += 1;
            return;
        };

        self.data_cells += 1;

        let delta = value - self.mean;
        self.mean += delta / self.data_cells as f64;
        self.m2 += delta * (value - self.mean);

        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn add_tile(&mut self, tile: &Tile) {
        for value in tile.values() {
            self.add(value);
        }
    }

    /// Combines the statistics of two disjoint cell sets
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn merge(&self, other: &CellStatistics) -> CellStatistics {
        let no_data_cells = self.no_data_cells + other.no_data_cells;

        if other.data_cells == 0 {
            return CellStatistics {
                no_data_cells,
                ..*self
            };
        }
        if self.data_cells == 0 {
            return CellStatistics {
                no_data_cells,
                ..*other
            };
        }

        let data_cells = self.data_cells + other.data_cells;
        let (n_a, n_b, n) = (
            self.data_cells as f64,
            other.data_cells as f64,
            data_cells as f64,
        );

        let delta = other.mean - self.mean;
        let mean = (self.mean * n_a + other.mean * n_b) / n;
        let m2 = self.m2 + other.m2 + delta * delta * n_a * n_b / n;

        CellStatistics {
            data_cells,
            no_data_cells,
            mean,
            m2,
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn data_cells(&self) -> u64 {
        self.data_cells
    }

    pub fn no_data_cells(&self) -> u64 {
        self.no_data_cells
    }

    pub fn is_empty(&self) -> bool {
        self.data_cells == 0
    }

    /// The sum of squared deviations from the mean
    pub fn m2(&self) -> f64 {
        self.m2
    }

    fn ensure_not_empty(&self, statistic: &'static str) -> Result<()> {
        ensure!(!self.is_empty(), error::EmptyAggregate { statistic });
        Ok(())
    }

    /// # Errors
    ///
    /// Fails with `EmptyAggregate` if no present cell was added.
    pub fn mean(&self) -> Result<f64> {
        self.ensure_not_empty("mean")?;
        Ok(self.mean)
    }

    /// The population variance
    ///
    /// # Errors
    ///
    /// Fails with `EmptyAggregate` if no present cell was added.
    #[allow(clippy::cast_precision_loss)]
    pub fn variance(&self) -> Result<f64> {
        self.ensure_not_empty("variance")?;
        Ok(self.m2 / self.data_cells as f64)
    }

    /// # Errors
    ///
    /// Fails with `EmptyAggregate` if no present cell was added.
    pub fn std_dev(&self) -> Result<f64> {
        Ok(self.variance()?.sqrt())
    }

    /// # Errors
    ///
    /// Fails with `EmptyAggregate` if no present cell was added.
    pub fn min(&self) -> Result<f64> {
        self.ensure_not_empty("min")?;
        Ok(self.min)
    }

    /// # Errors
    ///
    /// Fails with `EmptyAggregate` if no present cell was added.
    pub fn max(&self) -> Result<f64> {
        self.ensure_not_empty("max")?;
        Ok(self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::raster::{CellType, RasterDataType};
    use crate::util::test::tile_from_values;
    use float_cmp::approx_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn tile_statistics() {
        let tile = tile_from_values(
            CellType::with_default_no_data(RasterDataType::I16),
            3,
            2,
            &[Some(2.), Some(4.), None, Some(4.), Some(5.), Some(5.)],
        );

        let statistics = CellStatistics::from_tile(&tile);

        assert_eq!(statistics.data_cells(), 5);
        assert_eq!(statistics.no_data_cells(), 1);
        assert!(approx_eq!(f64, statistics.mean().unwrap(), 4.));
        assert!(approx_eq!(f64, statistics.variance().unwrap(), 1.2));
        assert!(approx_eq!(f64, statistics.std_dev().unwrap(), 1.2_f64.sqrt()));
        assert_eq!(statistics.min().unwrap(), 2.);
        assert_eq!(statistics.max().unwrap(), 5.);
    }

    #[test]
    fn empty_statistics() {
        let mut statistics = CellStatistics::new();
        statistics.add(None);

        assert!(statistics.is_empty());
        assert_eq!(statistics.no_data_cells(), 1);
        assert!(matches!(
            statistics.mean(),
            Err(Error::EmptyAggregate { statistic: "mean" })
        ));
        assert!(matches!(
            statistics.std_dev(),
            Err(Error::EmptyAggregate { .. })
        ));
        assert!(matches!(statistics.min(), Err(Error::EmptyAggregate { .. })));
    }

    #[test]
    fn merge_equals_union() {
        let mut rng = StdRng::seed_from_u64(42);
        let values: Vec<Option<f64>> = (0..1000)
            .map(|_| rng.random_bool(0.9).then(|| rng.random_range(-1000.0..1000.0)))
            .collect();

        let mut whole = CellStatistics::new();
        values.iter().for_each(|value| whole.add(*value));

        for _ in 0..10 {
            let mut parts = vec![CellStatistics::new(); 7];
            for value in &values {
                parts[rng.random_range(0..7)].add(*value);
            }

            // merge in a shuffled pairwise order
            while parts.len() > 1 {
                let a = parts.swap_remove(rng.random_range(0..parts.len()));
                let b = parts.swap_remove(rng.random_range(0..parts.len()));
                parts.push(if rng.random_bool(0.5) {
                    a.merge(&b)
                } else {
                    b.merge(&a)
                });
            }
            let merged = parts[0];

            assert_eq!(merged.data_cells(), whole.data_cells());
            assert_eq!(merged.no_data_cells(), whole.no_data_cells());
            assert_eq!(merged.min().unwrap(), whole.min().unwrap());
            assert_eq!(merged.max().unwrap(), whole.max().unwrap());
            assert!(approx_eq!(
                f64,
                merged.mean().unwrap(),
                whole.mean().unwrap(),
                epsilon = 1e-9
            ));
            assert!(approx_eq!(
                f64,
                merged.variance().unwrap(),
                whole.variance().unwrap(),
                epsilon = 1e-6
            ));
        }
    }

    #[test]
    fn merge_with_empty() {
        let mut a = CellStatistics::new();
        a.add(Some(3.));
        let mut empty = CellStatistics::new();
        empty.add(None);

        let merged = a.merge(&empty);
        assert_eq!(merged.data_cells(), 1);
        assert_eq!(merged.no_data_cells(), 1);
        assert_eq!(merged.mean().unwrap(), 3.);
        assert_eq!(empty.merge(&a), merged);
    }

    #[test]
    fn from_parts() {
        let mut statistics = CellStatistics::new();
        statistics.add(Some(1.));
        statistics.add(Some(3.));

        let restored = CellStatistics::from_parts(
            statistics.data_cells(),
            statistics.no_data_cells(),
            statistics.mean().unwrap(),
            statistics.m2(),
            statistics.min().unwrap(),
            statistics.max().unwrap(),
        );

        assert_eq!(restored, statistics);
        assert_eq!(CellStatistics::from_parts(0, 2, 0., 0., 0., 0.).no_data_cells(), 2);
    }
}
