use crate::{
    projector::ViewBasis,
    DiscGeometry, ViewParameters,
};
use log::*;
use ndarray::{Array2, ArrayView2};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// The disc pixel a destination pixel copies from.
///
/// Coordinates are truncated toward zero from the projected position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceIndex {
    pub x: i32,
    pub y: i32,
}

impl SourceIndex {
    /// The projected position fell outside of the disc.
    pub const MISS: Self = Self { x: -1, y: -1 };

    pub fn is_miss(self) -> bool {
        self == Self::MISS
    }

    /// `(column, row)` in the disc, or `None` for a miss.
    pub fn get(self) -> Option<(usize, usize)> {
        if self.is_miss() {
            None
        } else {
            Some((self.x as usize, self.y as usize))
        }
    }
}

/// How destination pixels are spaced on the virtual image plane.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Sampling {
    /// Destination pixel `(u, v)` is plane coordinate `(u, v)`.
    ///
    /// A destination smaller than the disc then only shows the upper left
    /// part of the field of view.
    #[default]
    Unit,
    /// Plane coordinates are `trunc(u * horizontal)` and `trunc(v * vertical)`.
    Ratio { horizontal: f64, vertical: f64 },
    /// Stretch the plane so the whole field of view fills the destination.
    FitDisc,
}

impl Sampling {
    /// The `(horizontal, vertical)` plane step per destination pixel, if any.
    fn ratios(self, disc: &DiscGeometry, width: usize, height: usize) -> Option<(f64, f64)> {
        match self {
            Sampling::Unit => None,
            Sampling::Ratio {
                horizontal,
                vertical,
            } => Some((horizontal, vertical)),
            Sampling::FitDisc => Some((
                disc.width as f64 / width as f64,
                disc.height as f64 / height as f64,
            )),
        }
    }
}

/// Precomputed disc coordinates for every pixel of one view.
///
/// Building a table runs the trigonometric projection once per destination
/// pixel; remapping a frame through it is a plain gather. Tables are
/// immutable and are rebuilt whenever their inputs change.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexTable {
    /// Laid out as `(row, column)` of the destination.
    entries: Array2<SourceIndex>,
    view: ViewParameters,
    disc: DiscGeometry,
    sampling: Sampling,
}

impl IndexTable {
    /// Build the table of `view` for a `width` x `height` destination.
    pub fn build(
        view: &ViewParameters,
        disc: &DiscGeometry,
        width: usize,
        height: usize,
    ) -> Self {
        Self::build_sampled(view, disc, width, height, Sampling::Unit)
    }

    pub fn build_sampled(
        view: &ViewParameters,
        disc: &DiscGeometry,
        width: usize,
        height: usize,
        sampling: Sampling,
    ) -> Self {
        let basis = ViewBasis::new(view, disc);
        let ratios = sampling.ratios(disc, width, height);
        // Valid columns and rows are [0, width - 1) and [0, height - 1).
        let x_end = disc.width as i64 - 1;
        let y_end = disc.height as i64 - 1;
        let entries = Array2::from_shape_fn((height, width), |(v, u)| {
            let (pu, pv) = match ratios {
                None => (u as f64, v as f64),
                Some((horizontal, vertical)) => (
                    (u as f64 * horizontal).trunc(),
                    (v as f64 * vertical).trunc(),
                ),
            };
            let (x, y) = basis.project(pu, pv);
            if !(x.is_finite() && y.is_finite()) {
                return SourceIndex::MISS;
            }
            let (x, y) = (x.trunc() as i64, y.trunc() as i64);
            if (0..x_end).contains(&x) && (0..y_end).contains(&y) {
                SourceIndex {
                    x: x as i32,
                    y: y as i32,
                }
            } else {
                SourceIndex::MISS
            }
        });
        let table = Self {
            entries,
            view: *view,
            disc: *disc,
            sampling,
        };
        debug!(
            "Built {}x{} index table, {} of {} pixels land in the {}x{} disc",
            width,
            height,
            table.hits(),
            width * height,
            disc.width,
            disc.height
        );
        table
    }

    pub fn width(&self) -> usize {
        self.entries.dim().1
    }

    pub fn height(&self) -> usize {
        self.entries.dim().0
    }

    pub fn view(&self) -> &ViewParameters {
        &self.view
    }

    pub fn disc(&self) -> &DiscGeometry {
        &self.disc
    }

    pub fn sampling(&self) -> Sampling {
        self.sampling
    }

    /// The entry of destination column `u`, row `v`.
    pub fn get(&self, u: usize, v: usize) -> Option<SourceIndex> {
        self.entries.get((v, u)).copied()
    }

    pub fn entries(&self) -> ArrayView2<'_, SourceIndex> {
        self.entries.view()
    }

    /// Number of destination pixels that copy from the disc.
    pub fn hits(&self) -> usize {
        self.entries.iter().filter(|entry| !entry.is_miss()).count()
    }

    /// A hash of the entries, equal for bitwise identical tables.
    pub fn checksum(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.entries.hash(&mut hasher);
        hasher.finish()
    }
}

/// How the canvases of several views are arranged.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// Every view gets its own canvas.
    #[default]
    Separate,
    /// All views share one canvas, placed row-major with `columns` per row.
    ///
    /// Four views in two columns give the classic quad display.
    Grid { columns: usize },
}

/// Where each view's block lands for a given [`Layout`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arrangement {
    /// `(width, height)` of every canvas.
    pub canvas_size: (usize, usize),
    /// For each view, the canvas it is drawn into and its `(row, column)` offset.
    pub placements: Vec<(usize, [usize; 2])>,
    pub canvas_count: usize,
}

impl Layout {
    /// Arrange `views` blocks of `width` x `height` pixels.
    pub fn arrange(self, views: usize, width: usize, height: usize) -> Arrangement {
        match self {
            Layout::Separate => Arrangement {
                canvas_size: (width, height),
                placements: (0..views).map(|view| (view, [0, 0])).collect(),
                canvas_count: views,
            },
            Layout::Grid { columns } => {
                let columns = columns.clamp(1, views.max(1));
                let rows = (views + columns - 1) / columns;
                Arrangement {
                    canvas_size: (columns * width, rows * height),
                    placements: (0..views)
                        .map(|view| (0, [view / columns * height, view % columns * width]))
                        .collect(),
                    canvas_count: 1,
                }
            }
        }
    }
}
