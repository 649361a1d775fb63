use crate::error;
use crate::util::Result;
use crate::util::test::TestDefault;
use serde::{Deserialize, Serialize};
use snafu::ensure;

#[derive(Copy, Clone, Serialize, Deserialize, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
/// An axis-aligned rectangle in some coordinate reference system.
/// Note: may degenerate to a point!
pub struct Extent {
    xmin: f64,
    ymin: f64,
    xmax: f64,
    ymax: f64,
}

impl Extent {
    /// Creates a new extent
    ///
    /// # Examples
    ///
    /// ```
    /// use rasterql_datatypes::primitives::Extent;
    ///
    /// let extent = Extent::new(1.0, 1.0, 2.0, 2.0).unwrap();
    /// assert_eq!(extent.width(), 1.0);
    /// ```
    ///
    /// # Errors
    ///
    /// This constructor fails if the coordinate's values are not in order
    ///
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Result<Self> {
        ensure!(
            xmin <= xmax && ymin <= ymax,
            error::InvalidExtent {
                xmin,
                ymin,
                xmax,
                ymax
            }
        );
        Ok(Self::new_unchecked(xmin, ymin, xmax, ymax))
    }

    /// Creates a new extent unchecked
    pub fn new_unchecked(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    pub fn xmin(&self) -> f64 {
        self.xmin
    }

    pub fn ymin(&self) -> f64 {
        self.ymin
    }

    pub fn xmax(&self) -> f64 {
        self.xmax
    }

    pub fn ymax(&self) -> f64 {
        self.ymax
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        (self.xmin..=self.xmax).contains(&x) && (self.ymin..=self.ymax).contains(&y)
    }

    pub fn intersects(&self, other: &Extent) -> bool {
        self.xmin <= other.xmax
            && self.xmax >= other.xmin
            && self.ymin <= other.ymax
            && self.ymax >= other.ymin
    }

    /// The smallest extent that contains both extents
    #[must_use]
    pub fn union(&self, other: &Extent) -> Extent {
        Extent {
            xmin: self.xmin.min(other.xmin),
            ymin: self.ymin.min(other.ymin),
            xmax: self.xmax.max(other.xmax),
            ymax: self.ymax.max(other.ymax),
        }
    }
}

impl TestDefault for Extent {
    fn test_default() -> Self {
        Self::new_unchecked(-180., -90., 180., 90.)
    }
}
