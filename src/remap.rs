use crate::{Canvas, Error, IndexTable, Result, SourceDisc};
use log::*;
use ndarray::{s, ArrayView3, ArrayViewMut3, Axis};
use rayon::{ThreadPool, ThreadPoolBuilder};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// One view's table and the `(row, column)` of the canvas its block starts at.
#[derive(Debug, Clone, Copy)]
pub struct Placement<'t> {
    pub table: &'t IndexTable,
    pub offset: [usize; 2],
}

impl<'t> Placement<'t> {
    pub fn new(table: &'t IndexTable, offset: [usize; 2]) -> Self {
        Self { table, offset }
    }
}

/// A rectangular part of a canvas that is written by exactly one worker.
#[derive(Debug)]
pub struct Tile<'a> {
    /// `(row, column)` of the tile's top left pixel in the canvas.
    pub origin: [usize; 2],
    pub pixels: ArrayViewMut3<'a, u8>,
}

/// How a canvas is cut into tiles for parallel remapping.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    pub rows: usize,
    pub columns: usize,
}

impl TileGrid {
    /// Each tile gets its own worker thread, so grids are kept small.
    pub const MAX_TILES: usize = 64;

    pub fn new(rows: usize, columns: usize) -> Self {
        Self {
            rows: rows.max(1),
            columns: columns.max(1),
        }
    }

    /// Four tiles, one per quadrant.
    pub fn quadrants() -> Self {
        Self::new(2, 2)
    }

    pub fn count(&self) -> usize {
        self.rows.max(1) * self.columns.max(1)
    }

    /// Cut `canvas` into disjoint tiles.
    ///
    /// Sizes that don't divide evenly give the leading tiles one extra pixel.
    /// Tiles that would be empty are left out.
    pub fn split<'a>(&self, canvas: ArrayViewMut3<'a, u8>) -> Vec<Tile<'a>> {
        let (height, width, _) = canvas.dim();
        let mut tiles = Vec::with_capacity(self.count());
        let mut rest = canvas;
        let mut row = 0;
        for tile_height in split_lengths(height, self.rows) {
            let (mut band, tail) = rest.split_at(Axis(0), tile_height);
            rest = tail;
            let mut column = 0;
            for tile_width in split_lengths(width, self.columns) {
                let (pixels, tail) = band.split_at(Axis(1), tile_width);
                band = tail;
                if tile_height > 0 && tile_width > 0 {
                    tiles.push(Tile {
                        origin: [row, column],
                        pixels,
                    });
                }
                column += tile_width;
            }
            row += tile_height;
        }
        tiles
    }
}

impl Default for TileGrid {
    fn default() -> Self {
        Self::quadrants()
    }
}

fn split_lengths(total: usize, parts: usize) -> impl Iterator<Item = usize> {
    let parts = parts.max(1);
    let base = total / parts;
    let extra = total % parts;
    (0..parts).map(move |part| base + usize::from(part < extra))
}

/// Copy disc pixels into `tile` for every placement that overlaps it.
///
/// Misses and entries outside of `source` leave the tile untouched.
pub fn remap_tile(source: ArrayView3<'_, u8>, placements: &[Placement<'_>], tile: &mut Tile<'_>) {
    let (source_height, source_width, _) = source.dim();
    let (tile_height, tile_width, _) = tile.pixels.dim();
    let [tile_row, tile_column] = tile.origin;
    for placement in placements {
        let [block_row, block_column] = placement.offset;
        let table = placement.table;
        let rows = block_row.max(tile_row)
            ..(block_row + table.height()).min(tile_row + tile_height);
        let columns = block_column.max(tile_column)
            ..(block_column + table.width()).min(tile_column + tile_width);
        if rows.is_empty() || columns.is_empty() {
            continue;
        }
        let entries = table.entries();
        for row in rows {
            for column in columns.clone() {
                let entry = entries[(row - block_row, column - block_column)];
                let Some((x, y)) = entry.get() else {
                    continue;
                };
                if x >= source_width || y >= source_height {
                    continue;
                }
                tile.pixels
                    .slice_mut(s![row - tile_row, column - tile_column, ..])
                    .assign(&source.slice(s![y, x, ..]));
            }
        }
    }
}

/// Remap the whole canvas on the calling thread.
pub fn remap_serial(
    source: &SourceDisc<'_>,
    placements: &[Placement<'_>],
    canvas: &mut Canvas,
) -> Result<()> {
    check_channels(source, canvas)?;
    let mut tile = Tile {
        origin: [0, 0],
        pixels: canvas.view_mut(),
    };
    remap_tile(source.view(), placements, &mut tile);
    Ok(())
}

fn check_channels(source: &SourceDisc<'_>, canvas: &Canvas) -> Result<()> {
    if source.channels() != canvas.channels() {
        return Err(Error::ChannelMismatch {
            disc: source.channels(),
            canvas: canvas.channels(),
        });
    }
    Ok(())
}

/// Gathers disc pixels through index tables on a fixed pool of workers.
///
/// The pool is created once and sized to the tile grid. Every call blocks
/// until all tiles of the frame are written.
pub struct Remapper {
    pool: ThreadPool,
    grid: TileGrid,
}

impl Remapper {
    pub fn new(grid: TileGrid) -> Result<Self> {
        if grid.count() > TileGrid::MAX_TILES {
            return Err(Error::InvalidParameters(format!(
                "{}x{} tile grid exceeds {} tiles",
                grid.rows,
                grid.columns,
                TileGrid::MAX_TILES
            )));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(grid.count())
            .thread_name(|index| format!("remap-{index}"))
            .build()?;
        info!(
            "Started {} remap workers for a {}x{} tile grid",
            grid.count(),
            grid.rows,
            grid.columns
        );
        Ok(Self { pool, grid })
    }

    pub fn grid(&self) -> TileGrid {
        self.grid
    }

    /// Remap one table into `canvas` at its top left corner.
    pub fn apply(
        &self,
        source: &SourceDisc<'_>,
        table: &IndexTable,
        canvas: &mut Canvas,
    ) -> Result<()> {
        self.apply_all(source, vec![(&[Placement::new(table, [0, 0])][..], canvas)])
    }

    /// Remap several canvases in one fan-out, each with its own placements.
    pub fn apply_all(
        &self,
        source: &SourceDisc<'_>,
        jobs: Vec<(&[Placement<'_>], &mut Canvas)>,
    ) -> Result<()> {
        for (_, canvas) in &jobs {
            check_channels(source, canvas)?;
        }
        let view = source.view();
        let tasks: Vec<_> = jobs
            .into_iter()
            .flat_map(|(placements, canvas)| {
                self.grid
                    .split(canvas.view_mut())
                    .into_iter()
                    .map(move |tile| (placements, tile))
            })
            .collect();
        trace!("Remapping {} tiles.", tasks.len());
        self.pool.scope(|scope| {
            for (placements, mut tile) in tasks {
                scope.spawn(move |_| remap_tile(view, placements, &mut tile));
            }
        });
        Ok(())
    }
}

impl std::fmt::Debug for Remapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Remapper")
            .field("grid", &self.grid)
            .field("threads", &self.pool.current_num_threads())
            .finish()
    }
}
