//! Tile grid generation for fixed-input-size models
//!
//! A raster of `H x W` pixels is covered by `ceil(H / th) x ceil(W / tw)`
//! crops of exactly `th x tw` pixels. Neighbouring crops share an integer
//! overlap chosen so that the last row and column of crops end on the raster
//! edge.
//!
//! The overlap is truncated, `(tile * count - extent) / (count - 1)` in
//! integer arithmetic, and tile `j` starts at `j * (tile - overlap)`. The
//! truncation is absorbed by clamping the last tile to `extent - tile`.

use geochange_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Placement of one crop within the source raster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileSpec {
    /// Grid row of this tile
    pub row_index: usize,
    /// Grid column of this tile
    pub col_index: usize,
    /// First raster row covered
    pub start_row: usize,
    /// First raster column covered
    pub start_col: usize,
    pub height: usize,
    pub width: usize,
}

impl TileSpec {
    /// One tile spanning a whole `rows x cols` raster
    pub fn full(rows: usize, cols: usize) -> Self {
        Self {
            row_index: 0,
            col_index: 0,
            start_row: 0,
            start_col: 0,
            height: rows,
            width: cols,
        }
    }

    /// One past the last raster row covered
    pub fn end_row(&self) -> usize {
        self.start_row + self.height
    }

    /// One past the last raster column covered
    pub fn end_col(&self) -> usize {
        self.start_col + self.width
    }

    /// Whether raster cell (`row`, `col`) falls inside this tile
    pub fn contains(&self, row: usize, col: usize) -> bool {
        (self.start_row..self.end_row()).contains(&row)
            && (self.start_col..self.end_col()).contains(&col)
    }
}

/// Grid geometry for a raster/tile size pair.
///
/// # Example
///
/// ```
/// use geochange_parallel::TileGrid;
///
/// let grid = TileGrid::new(2500, 1800, 1024, 1024)?;
/// assert_eq!(grid.dims(), (3, 2));
/// let last = grid.tiles().last().copied().unwrap();
/// assert_eq!((last.end_row(), last.end_col()), (2500, 1800));
/// # Ok::<(), geochange_core::Error>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    raster_rows: usize,
    raster_cols: usize,
    tile_rows: usize,
    tile_cols: usize,
    grid_rows: usize,
    grid_cols: usize,
    overlap_rows: usize,
    overlap_cols: usize,
}

/// Number of tiles along one axis and the overlap between neighbours.
fn axis_layout(extent: usize, tile: usize) -> (usize, usize) {
    let count = extent.div_ceil(tile);
    let overlap = if count > 1 {
        (tile * count - extent) / (count - 1)
    } else {
        0
    };
    (count, overlap)
}

/// Start of tile `index` along one axis, clamped to `[0, extent - tile]`.
fn axis_start(index: usize, count: usize, extent: usize, tile: usize, overlap: usize) -> usize {
    let last = extent - tile;
    if index + 1 == count {
        last
    } else {
        (index * (tile - overlap)).min(last)
    }
}

impl TileGrid {
    /// Lay out tiles of `tile_rows x tile_cols` over a `raster_rows x raster_cols` raster.
    ///
    /// A raster smaller than the tile in either dimension yields a single
    /// tile covering the whole raster, whose shape is then the raster's.
    pub fn new(
        raster_rows: usize,
        raster_cols: usize,
        tile_rows: usize,
        tile_cols: usize,
    ) -> Result<Self> {
        if tile_rows == 0 || tile_cols == 0 {
            return Err(Error::InvalidParameter {
                name: "tile_size",
                value: format!("{tile_rows}x{tile_cols}"),
                reason: "tile dimensions must be positive".into(),
            });
        }
        if raster_rows == 0 || raster_cols == 0 {
            return Err(Error::EmptyTileSet {
                rows: raster_rows,
                cols: raster_cols,
            });
        }

        if raster_rows < tile_rows || raster_cols < tile_cols {
            return Ok(Self {
                raster_rows,
                raster_cols,
                tile_rows: raster_rows,
                tile_cols: raster_cols,
                grid_rows: 1,
                grid_cols: 1,
                overlap_rows: 0,
                overlap_cols: 0,
            });
        }

        let (grid_rows, overlap_rows) = axis_layout(raster_rows, tile_rows);
        let (grid_cols, overlap_cols) = axis_layout(raster_cols, tile_cols);

        Ok(Self {
            raster_rows,
            raster_cols,
            tile_rows,
            tile_cols,
            grid_rows,
            grid_cols,
            overlap_rows,
            overlap_cols,
        })
    }

    /// Grid dimensions as (tile rows, tile columns)
    pub fn dims(&self) -> (usize, usize) {
        (self.grid_rows, self.grid_cols)
    }

    /// Effective tile shape as (rows, cols)
    pub fn tile_shape(&self) -> (usize, usize) {
        (self.tile_rows, self.tile_cols)
    }

    /// Overlap between neighbouring tiles as (rows, cols)
    pub fn overlap(&self) -> (usize, usize) {
        (self.overlap_rows, self.overlap_cols)
    }

    /// Total number of tiles
    pub fn len(&self) -> usize {
        self.grid_rows * self.grid_cols
    }

    /// Always false: a grid has at least one tile
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when one tile covers the whole raster
    pub fn is_single(&self) -> bool {
        self.len() == 1
    }

    /// Tile at grid position (`row_index`, `col_index`)
    pub fn tile(&self, row_index: usize, col_index: usize) -> Result<TileSpec> {
        if row_index >= self.grid_rows || col_index >= self.grid_cols {
            return Err(Error::IndexOutOfBounds {
                row: row_index,
                col: col_index,
                rows: self.grid_rows,
                cols: self.grid_cols,
            });
        }
        Ok(TileSpec {
            row_index,
            col_index,
            start_row: axis_start(
                row_index,
                self.grid_rows,
                self.raster_rows,
                self.tile_rows,
                self.overlap_rows,
            ),
            start_col: axis_start(
                col_index,
                self.grid_cols,
                self.raster_cols,
                self.tile_cols,
                self.overlap_cols,
            ),
            height: self.tile_rows,
            width: self.tile_cols,
        })
    }

    /// All tiles in row-major order
    pub fn tiles(&self) -> Vec<TileSpec> {
        (0..self.grid_rows)
            .flat_map(|r| (0..self.grid_cols).map(move |c| (r, c)))
            .filter_map(|(r, c)| self.tile(r, c).ok())
            .collect()
    }
}

/// Row-major tiles covering a `raster_rows x raster_cols` raster.
pub fn generate_tiles(
    raster_rows: usize,
    raster_cols: usize,
    tile_rows: usize,
    tile_cols: usize,
) -> Result<Vec<TileSpec>> {
    let tiles = TileGrid::new(raster_rows, raster_cols, tile_rows, tile_cols)?.tiles();
    if tiles.is_empty() {
        return Err(Error::EmptyTileSet {
            rows: raster_rows,
            cols: raster_cols,
        });
    }
    Ok(tiles)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_full_coverage(rows: usize, cols: usize, th: usize, tw: usize) {
        let mut covered = vec![vec![false; cols]; rows];
        for tile in generate_tiles(rows, cols, th, tw).unwrap() {
            assert!(tile.end_row() <= rows && tile.end_col() <= cols, "{tile:?}");
            for row in covered.iter_mut().take(tile.end_row()).skip(tile.start_row) {
                for cell in row.iter_mut().take(tile.end_col()).skip(tile.start_col) {
                    *cell = true;
                }
            }
        }
        for (r, row) in covered.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                assert!(*cell, "cell ({r}, {c}) not covered for {rows}x{cols} / {th}x{tw}");
            }
        }
    }

    #[test]
    fn test_tile_coverage() {
        for &(rows, cols, th, tw) in &[
            (100, 100, 32, 32),
            (64, 64, 32, 32),
            (65, 97, 32, 16),
            (1000, 37, 7, 5),
            (33, 33, 32, 32),
            (10, 10, 1, 3),
            (5, 200, 8, 8),
        ] {
            assert_full_coverage(rows, cols, th, tw);
        }
    }

    #[test]
    fn tiles_have_exact_size_and_reach_edge() {
        let tiles = generate_tiles(2500, 1800, 1024, 1024).unwrap();
        assert_eq!(tiles.len(), 6);
        assert!(tiles.iter().all(|t| t.height == 1024 && t.width == 1024));

        // overlap = (3*1024 - 2500) / 2 = 286, step 738
        let starts: Vec<usize> = tiles.iter().step_by(2).map(|t| t.start_row).collect();
        assert_eq!(starts, vec![0, 738, 1476]);
        assert_eq!(tiles[1].start_col, 1800 - 1024);
        assert_eq!(tiles[5].end_row(), 2500);
        assert_eq!(tiles[5].end_col(), 1800);
    }

    #[test]
    fn row_major_order() {
        let tiles = generate_tiles(100, 100, 32, 32).unwrap();
        let indices: Vec<(usize, usize)> =
            tiles.iter().map(|t| (t.row_index, t.col_index)).collect();
        let mut sorted = indices.clone();
        sorted.sort();
        assert_eq!(indices, sorted);
        assert_eq!(indices.len(), 16);
    }

    #[test]
    fn exact_multiple_has_no_overlap() {
        let grid = TileGrid::new(64, 96, 32, 32).unwrap();
        assert_eq!(grid.dims(), (2, 3));
        assert_eq!(grid.overlap(), (0, 0));
        assert_eq!(grid.tile(1, 2).unwrap().start_col, 64);
    }

    #[test]
    fn small_raster_gives_single_whole_tile() {
        let tiles = generate_tiles(300, 2000, 512, 512).unwrap();
        assert_eq!(tiles, vec![TileSpec::full(300, 2000)]);

        let grid = TileGrid::new(100, 80, 128, 128).unwrap();
        assert!(grid.is_single());
        assert_eq!(grid.tile_shape(), (100, 80));
    }

    #[test]
    fn rejects_degenerate_sizes() {
        assert!(matches!(
            generate_tiles(0, 10, 4, 4),
            Err(Error::EmptyTileSet { rows: 0, cols: 10 })
        ));
        assert!(matches!(
            generate_tiles(10, 10, 0, 4),
            Err(Error::InvalidParameter { name: "tile_size", .. })
        ));
        let grid = TileGrid::new(10, 10, 4, 4).unwrap();
        assert!(grid.tile(3, 0).is_err());
    }
}
