//! Grid planning for oversized backgrounds
//!
//! Partitions a `width x height` image into a uniform grid whose cells all
//! fit under a padded texture ceiling, using as few cells as possible.
//!
//! SPDX-FileCopyrightText: 2025 CyberDeco
//! SPDX-License-Identifier: MIT

use crate::error::{Error, Result};

/// Fraction of the client texture limit a tile may occupy.
pub const DEFAULT_PADDING: f64 = 0.95;

/// One cell of a tile grid, in source-image pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileRect {
    /// Grid column
    pub col: u32,
    /// Grid row
    pub row: u32,
    /// Left edge in the source image
    pub offset_x: u32,
    /// Top edge in the source image
    pub offset_y: u32,
    pub width: u32,
    pub height: u32,
}

impl TileRect {
    /// Pixel area of the cell
    #[must_use]
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Whether two cells share any pixel
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.offset_x < other.offset_x + other.width
            && other.offset_x < self.offset_x + self.width
            && self.offset_y < other.offset_y + other.height
            && other.offset_y < self.offset_y + self.height
    }
}

/// A complete grid partition of a source image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileGridPlan {
    /// Source image width
    pub width: u32,
    /// Source image height
    pub height: u32,
    /// Per-tile ceiling after padding
    pub ceiling: u32,
    /// Number of columns
    pub cols: u32,
    /// Number of rows
    pub rows: u32,
    /// Base (interior) tile width
    pub tile_width: u32,
    /// Base (interior) tile height
    pub tile_height: u32,
    /// Cells in row-major order
    pub cells: Vec<TileRect>,
}

impl TileGridPlan {
    /// Total number of tiles
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell at the given grid position
    #[must_use]
    pub fn cell(&self, col: u32, row: u32) -> Option<&TileRect> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        self.cells.get((row * self.cols + col) as usize)
    }
}

/// Whether an image of this size exceeds the texture limit on either axis
#[must_use]
pub fn needs_split(width: u32, height: u32, limit: u32) -> bool {
    width > limit || height > limit
}

/// Per-tile ceiling: `floor(limit * padding)`, never above `limit`.
///
/// `padding` must lie in `(0, 1]`.
pub fn tile_ceiling(limit: u32, padding: f64) -> Result<u32> {
    if !(padding > 0.0 && padding <= 1.0) {
        return Err(Error::InvalidPadding { padding });
    }
    let ceiling = (f64::from(limit) * padding).floor();
    if !ceiling.is_finite() || ceiling < 1.0 {
        return Err(Error::CapacityTooSmall { limit, padding });
    }
    Ok(ceiling.min(f64::from(u32::MAX)) as u32)
}

/// Plan the tile grid for a `width x height` image under `limit`.
///
/// Column count is `ceil(width / ceiling)` and the base tile width is
/// `floor(width / cols)`. The `width % cols` leftover pixels are handed out
/// one each to the trailing columns, so every cell is at most
/// `ceil(width / cols) <= ceiling` wide and the cells cover the image exactly.
/// Rows follow the same rule.
///
/// Because the extra pixels go to the trailing spans, only the leading
/// spans are exactly `tile_width`/`tile_height`. For 10000x8000 at a 4096
/// limit the rows are 2666, 2667 and 2667 high, so the centre cell (1, 1)
/// is 3333x2667 rather than 3333x2666.
pub fn plan_grid(width: u32, height: u32, limit: u32, padding: f64) -> Result<TileGridPlan> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidDimensions { width, height });
    }
    let ceiling = tile_ceiling(limit, padding)?;

    let columns = split_axis(width, ceiling);
    let rows = split_axis(height, ceiling);

    let mut cells = Vec::with_capacity(columns.spans.len() * rows.spans.len());
    for (row, &(offset_y, tile_h)) in rows.spans.iter().enumerate() {
        for (col, &(offset_x, tile_w)) in columns.spans.iter().enumerate() {
            cells.push(TileRect {
                col: col as u32,
                row: row as u32,
                offset_x,
                offset_y,
                width: tile_w,
                height: tile_h,
            });
        }
    }

    tracing::debug!(
        width,
        height,
        limit,
        ceiling,
        cols = columns.count,
        rows = rows.count,
        "Planned tile grid"
    );

    Ok(TileGridPlan {
        width,
        height,
        ceiling,
        cols: columns.count,
        rows: rows.count,
        tile_width: columns.base,
        tile_height: rows.base,
        cells,
    })
}

/// Partition of one axis into `(offset, length)` spans
struct AxisSplit {
    count: u32,
    base: u32,
    spans: Vec<(u32, u32)>,
}

fn split_axis(length: u32, ceiling: u32) -> AxisSplit {
    let count = length.div_ceil(ceiling);
    let base = length / count;
    let remainder = length % count;
    // Columns at index >= first_wide carry one extra pixel
    let first_wide = count - remainder;

    let mut spans = Vec::with_capacity(count as usize);
    let mut offset = 0;
    for i in 0..count {
        let span = if i >= first_wide { base + 1 } else { base };
        spans.push((offset, span));
        offset += span;
    }
    debug_assert_eq!(offset, length);

    AxisSplit { count, base, spans }
}
