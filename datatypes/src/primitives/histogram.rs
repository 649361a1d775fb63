use crate::error::{self, Error};
use crate::raster::Tile;
use crate::util::Result;
use ordered_float::OrderedFloat;
use snafu::ensure;
use std::collections::BTreeMap;

/// A histogram of cell values.
///
/// Without a bucket width, every distinct value is counted on its own, so the memory is bounded by
/// the number of distinct values. With a bucket width `w`, values are counted in the aligned buckets
/// `[k * w, (k + 1) * w)`, so the memory is bounded by `value range / w`. Statistics of bucketed
/// histograms use the bucket centres as representative values.
///
/// Merging sums the counts of equal keys, which makes it associative and commutative.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CellHistogram {
    bucket_width: Option<f64>,
    counts: BTreeMap<OrderedFloat<f64>, u64>,
}

impl CellHistogram {
    /// An empty histogram counting exact values
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty histogram counting values in buckets of `bucket_width`
    ///
    /// # Errors
    ///
    /// Fails with `InvalidCellValue` if the bucket width is not a positive finite number.
    ///
    pub fn with_bucket_width(bucket_width: f64) -> Result<Self> {
        ensure!(
            bucket_width.is_finite() && bucket_width > 0.,
            error::InvalidCellValue {
                details: format!("bucket width must be positive and finite, got {bucket_width}")
            }
        );

        Ok(Self {
            bucket_width: Some(bucket_width),
            counts: BTreeMap::new(),
        })
    }

    /// An empty histogram with an optional bucket width
    ///
    /// # Errors
    ///
    /// See [`CellHistogram::with_bucket_width`].
    ///
    pub fn with_optional_bucket_width(bucket_width: Option<f64>) -> Result<Self> {
        match bucket_width {
            Some(bucket_width) => Self::with_bucket_width(bucket_width),
            None => Ok(Self::new()),
        }
    }

    /// The histogram of the present cells of `tile`
    ///
    /// # Errors
    ///
    /// Fails if the bucket width is invalid.
    ///
    pub fn from_tile(tile: &Tile, bucket_width: Option<f64>) -> Result<Self> {
        let mut histogram = Self::with_optional_bucket_width(bucket_width)?;
        histogram.add_tile(tile);
        Ok(histogram)
    }

    /// Restores a histogram from its [`CellHistogram::bins`], e.g. from a serialized partial aggregate
    ///
    /// # Errors
    ///
    /// Fails if the bucket width is invalid.
    ///
    pub fn from_bins<I>(bucket_width: Option<f64>, bins: I) -> Result<Self>
    where
        I: IntoIterator<Item = (f64, u64)>,
    {
        let mut histogram = Self::with_optional_bucket_width(bucket_width)?;
        for (key, count) in bins {
            if key.is_nan() || count == 0 {
                continue;
            }
            *histogram.counts.entry(OrderedFloat(key)).or_insert(0) += count;
        }
        Ok(histogram)
    }

    pub fn bucket_width(&self) -> Option<f64> {
        self.bucket_width
    }

    fn key(&self, value: f64) -> OrderedFloat<f64> {
        match self.bucket_width {
            Some(width) => OrderedFloat((value / width).floor() * width),
            None => OrderedFloat(value),
        }
    }

    fn representative(&self, key: OrderedFloat<f64>) -> f64 {
        match self.bucket_width {
            Some(width) => key.0 + width / 2.,
            None => key.0,
        }
    }

    /// Counts a value, ignoring `NaN`
    pub fn add(&mut self, value: f64) {
        self.add_count(value, 1);
    }

    /// Counts a value `count` times, ignoring `NaN`
    pub fn add_count(&mut self, value: f64, count: u64) {
        if value.is_nan() || count == 0 {
            return;
        }
        *self.counts.entry(self.key(value)).or_insert(0) += count;
    }

    pub fn add_tile(&mut self, tile: &Tile) {
        for value in tile.values().into_iter().flatten() {
            self.add(value);
        }
    }

    /// Sums the counts of two histograms
    ///
    /// # Errors
    ///
    /// Fails with `IncompatibleHistograms` if the bucket widths differ.
    ///
    pub fn merge(&self, other: &CellHistogram) -> Result<CellHistogram> {
        ensure!(
            self.bucket_width.map(f64::to_bits) == other.bucket_width.map(f64::to_bits),
            error::IncompatibleHistograms {
                a: self.bucket_width,
                b: other.bucket_width,
            }
        );

        let mut merged = self.clone();
        for (key, count) in &other.counts {
            *merged.counts.entry(*key).or_insert(0) += count;
        }
        Ok(merged)
    }

    pub fn total_count(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// The bins as `(value, count)` in ascending order of value.
    /// For bucketed histograms, the value is the lower bound of the bucket.
    pub fn bins(&self) -> Vec<(f64, u64)> {
        self.counts
            .iter()
            .map(|(key, count)| (key.0, *count))
            .collect()
    }

    fn ensure_not_empty(&self, statistic: &'static str) -> Result<()> {
        ensure!(!self.is_empty(), error::EmptyAggregate { statistic });
        Ok(())
    }

    /// # Errors
    ///
    /// Fails with `EmptyAggregate` if the histogram is empty.
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> Result<f64> {
        self.ensure_not_empty("mean")?;

        let sum: f64 = self
            .counts
            .iter()
            .map(|(key, count)| self.representative(*key) * *count as f64)
            .sum();

        Ok(sum / self.total_count() as f64)
    }

    /// The value with the highest count, the smallest one on ties
    ///
    /// # Errors
    ///
    /// Fails with `EmptyAggregate` if the histogram is empty.
    pub fn mode(&self) -> Result<f64> {
        self.ensure_not_empty("mode")?;

        let mut mode = None;
        for (key, count) in &self.counts {
            match mode {
                Some((_, best)) if best >= *count => {}
                _ => mode = Some((*key, *count)),
            }
        }

        mode.map(|(key, _)| self.representative(key))
            .ok_or(Error::EmptyAggregate { statistic: "mode" })
    }

    /// The nearest-rank quantile, `q` in `[0, 1]`
    ///
    /// # Errors
    ///
    /// Fails with `EmptyAggregate` if the histogram is empty and with `InvalidCellValue` if `q` is out of range.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn quantile(&self, q: f64) -> Result<f64> {
        ensure!(
            (0.0..=1.0).contains(&q),
            error::InvalidCellValue {
                details: format!("quantile must be in [0, 1], got {q}")
            }
        );
        self.ensure_not_empty("quantile")?;

        let rank = ((q * self.total_count() as f64).ceil() as u64).max(1);

        let mut cumulative = 0;
        for (key, count) in &self.counts {
            cumulative += count;
            if cumulative >= rank {
                return Ok(self.representative(*key));
            }
        }

        self.max()
    }

    /// The lower median, i.e., the nearest-rank 0.5 quantile
    ///
    /// # Errors
    ///
    /// Fails with `EmptyAggregate` if the histogram is empty.
    pub fn median(&self) -> Result<f64> {
        self.ensure_not_empty("median")?;
        self.quantile(0.5)
    }

    /// # Errors
    ///
    /// Fails with `EmptyAggregate` if the histogram is empty.
    pub fn min(&self) -> Result<f64> {
        self.counts
            .keys()
            .next()
            .map(|key| self.representative(*key))
            .ok_or(Error::EmptyAggregate { statistic: "min" })
    }

    /// # Errors
    ///
    /// Fails with `EmptyAggregate` if the histogram is empty.
    pub fn max(&self) -> Result<f64> {
        self.counts
            .keys()
            .next_back()
            .map(|key| self.representative(*key))
            .ok_or(Error::EmptyAggregate { statistic: "max" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{CellType, RasterDataType};
    use crate::util::test::tile_from_values;
    use float_cmp::approx_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn histogram(values: &[f64]) -> CellHistogram {
        let mut histogram = CellHistogram::new();
        values.iter().for_each(|value| histogram.add(*value));
        histogram
    }

    #[test]
    fn exact_statistics() {
        let histogram = histogram(&[1., 2., 2., 3., 4., 4., 4., 10.]);

        assert_eq!(histogram.total_count(), 8);
        assert_eq!(histogram.bins(), vec![(1., 1), (2., 2), (3., 1), (4., 3), (10., 1)]);
        assert!(approx_eq!(f64, histogram.mean().unwrap(), 30. / 8.));
        assert_eq!(histogram.median().unwrap(), 3.);
        assert_eq!(histogram.mode().unwrap(), 4.);
        assert_eq!(histogram.quantile(0.).unwrap(), 1.);
        assert_eq!(histogram.quantile(0.25).unwrap(), 2.);
        assert_eq!(histogram.quantile(1.).unwrap(), 10.);
        assert_eq!(histogram.min().unwrap(), 1.);
        assert_eq!(histogram.max().unwrap(), 10.);
        assert!(histogram.quantile(1.5).is_err());
    }

    #[test]
    fn mode_prefers_smaller_values_on_ties() {
        assert_eq!(histogram(&[5., 3., 5., 3.]).mode().unwrap(), 3.);
    }

    #[test]
    fn buckets() {
        let mut histogram = CellHistogram::with_bucket_width(10.).unwrap();
        for value in [0., 5., 9.9, 10., 25., -1.] {
            histogram.add(value);
        }

        assert_eq!(histogram.bins(), vec![(-10., 1), (0., 3), (10., 1), (20., 1)]);
        assert_eq!(histogram.mode().unwrap(), 5.);
        assert_eq!(histogram.min().unwrap(), -5.);
        assert_eq!(histogram.max().unwrap(), 25.);

        assert!(CellHistogram::with_bucket_width(0.).is_err());
        assert!(CellHistogram::with_bucket_width(f64::INFINITY).is_err());
    }

    #[test]
    fn tile_histogram_skips_absent_cells() {
        let tile = tile_from_values(
            CellType::with_default_no_data(RasterDataType::U8),
            2,
            2,
            &[Some(1.), None, Some(1.), Some(7.)],
        );

        let histogram = CellHistogram::from_tile(&tile, None).unwrap();

        assert_eq!(histogram.bins(), vec![(1., 2), (7., 1)]);
    }

    #[test]
    fn empty_histogram() {
        let mut histogram = CellHistogram::new();
        histogram.add(f64::NAN);

        assert!(histogram.is_empty());
        assert_eq!(histogram.total_count(), 0);
        assert!(histogram.bins().is_empty());
        for result in [
            histogram.mean(),
            histogram.median(),
            histogram.mode(),
            histogram.quantile(0.5),
            histogram.min(),
            histogram.max(),
        ] {
            assert!(matches!(result, Err(Error::EmptyAggregate { .. })));
        }
    }

    #[test]
    fn merge_is_associative_and_commutative() {
        let mut rng = StdRng::seed_from_u64(7);
        let parts: Vec<CellHistogram> = (0..3)
            .map(|_| {
                let mut histogram = CellHistogram::with_bucket_width(0.5).unwrap();
                for _ in 0..100 {
                    histogram.add(f64::from(rng.random_range(-20..20_i32)) / 4.);
                }
                histogram
            })
            .collect();
        let (a, b, c) = (&parts[0], &parts[1], &parts[2]);

        assert_eq!(a.merge(b).unwrap(), b.merge(a).unwrap());
        assert_eq!(
            a.merge(b).unwrap().merge(c).unwrap(),
            a.merge(&b.merge(c).unwrap()).unwrap()
        );
        assert_eq!(a.merge(b).unwrap().total_count(), 200);
        assert_eq!(a.merge(&CellHistogram::with_bucket_width(0.5).unwrap()).unwrap(), *a);
    }

    #[test]
    fn restore_from_bins() {
        let mut histogram = CellHistogram::with_bucket_width(0.1).unwrap();
        for value in [0.05, 0.3, 0.31, 0.7, 12.34] {
            histogram.add(value);
        }

        let restored = CellHistogram::from_bins(histogram.bucket_width(), histogram.bins()).unwrap();

        assert_eq!(restored, histogram);
    }

    #[test]
    fn merge_rejects_different_bucket_widths() {
        let exact = histogram(&[1.]);
        let bucketed = CellHistogram::with_bucket_width(1.).unwrap();

        assert!(matches!(
            exact.merge(&bucketed),
            Err(Error::IncompatibleHistograms {
                a: None,
                b: Some(_)
            })
        ));
    }
}
