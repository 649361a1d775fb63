use rasterql_datatypes::raster::GridShape2D;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum NeighborhoodShape {
    #[default]
    Square,
    Circle,
}

/// The cells around a center cell that take part in a focal reduction.
///
/// Windows shrink at the tile borders: offsets pointing outside the tile are skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neighborhood {
    radius: usize,
    shape: NeighborhoodShape,
    offsets: Vec<(isize, isize)>,
}

impl Neighborhood {
    #[allow(clippy::cast_possible_wrap)]
    pub fn new(radius: usize, shape: NeighborhoodShape) -> Self {
        let r = radius as isize;

        let offsets = (-r..=r)
            .flat_map(|dy| (-r..=r).map(move |dx| (dx, dy)))
            .filter(|(dx, dy)| match shape {
                NeighborhoodShape::Square => true,
                NeighborhoodShape::Circle => dx * dx + dy * dy <= r * r,
            })
            .collect();

        Self {
            radius,
            shape,
            offsets,
        }
    }

    pub fn radius(&self) -> usize {
        self.radius
    }

    pub fn shape(&self) -> NeighborhoodShape {
        self.shape
    }

    /// The `(dx, dy)` offsets of the window cells, in row-major order
    pub fn offsets(&self) -> &[(isize, isize)] {
        &self.offsets
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Collects the present values of the window around `(col, row)` into `window`
    pub fn collect_window(
        &self,
        values: &[Option<f64>],
        grid: GridShape2D,
        col: usize,
        row: usize,
        window: &mut Vec<f64>,
    ) {
        window.clear();

        for (dx, dy) in &self.offsets {
            let (Some(x), Some(y)) = (col.checked_add_signed(*dx), row.checked_add_signed(*dy))
            else {
                continue;
            };
            if !grid.contains(x, y) {
                continue;
            }
            if let Some(value) = values[grid.linear_space_index_unchecked(x, y)] {
                window.push(value);
            }
        }
    }
}
