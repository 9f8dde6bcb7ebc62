// Copyright (c) 2019, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use crate::frame::Frame;
use crate::partition::MI_SIZE_LOG2;
use crate::util::*;

pub const MAX_TILE_WIDTH: usize = 4096;
pub const MAX_TILE_COLS: usize = 64;
pub const MAX_TILE_ROWS: usize = 64;
/// Largest tile log2 the header can carry.
pub const MAX_TILE_LOG2: usize = 6;

/// Tiling information
///
/// This stores everything necessary to split a frame into tiles, and write
/// headers fields into the bitstream. The requested log2 counts are
/// clamped to what the frame allows; the header carries the clamped
/// values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilingInfo {
  pub frame_width: usize,
  pub frame_height: usize,
  pub sb_cols: usize,
  pub sb_rows: usize,
  pub tile_width_sb: usize,
  pub tile_height_sb: usize,
  pub cols: usize, // number of columns of tiles within the whole frame
  pub rows: usize, // number of rows of tiles within the whole frame
  pub tile_cols_log2: usize,
  pub tile_rows_log2: usize,
  pub sb_size_log2: usize,
}

/// Area of one tile in superblocks and mode info units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRect {
  /// Index in raster order.
  pub index: usize,
  pub col: usize,
  pub row: usize,
  pub sbx: usize,
  pub sby: usize,
  pub sb_cols: usize,
  pub sb_rows: usize,
  pub mi_x: usize,
  pub mi_y: usize,
  /// Mode info columns inside the frame.
  pub mi_cols: usize,
  /// Mode info rows inside the frame.
  pub mi_rows: usize,
}

impl TilingInfo {
  pub fn new(
    sb_size_log2: usize, frame_width: usize, frame_height: usize,
    tile_cols_log2: usize, tile_rows_log2: usize,
  ) -> Self {
    let sb_cols = frame_width.align_power_of_two_and_shift(sb_size_log2);
    let sb_rows = frame_height.align_power_of_two_and_shift(sb_size_log2);

    let max_tile_width_sb = MAX_TILE_WIDTH >> sb_size_log2;
    let min_tile_cols_log2 = Self::tile_log2(max_tile_width_sb, sb_cols);
    let max_tile_cols_log2 =
      Self::tile_log2(1, sb_cols.min(MAX_TILE_COLS)).min(MAX_TILE_LOG2);
    let max_tile_rows_log2 =
      Self::tile_log2(1, sb_rows.min(MAX_TILE_ROWS)).min(MAX_TILE_LOG2);

    let tile_cols_log2 =
      tile_cols_log2.max(min_tile_cols_log2).min(max_tile_cols_log2);
    let tile_width_sb = sb_cols.align_power_of_two_and_shift(tile_cols_log2);
    let tile_rows_log2 = tile_rows_log2.min(max_tile_rows_log2);
    let tile_height_sb = sb_rows.align_power_of_two_and_shift(tile_rows_log2);

    let cols = (sb_cols + tile_width_sb - 1) / tile_width_sb;
    let rows = (sb_rows + tile_height_sb - 1) / tile_height_sb;

    Self {
      frame_width,
      frame_height,
      sb_cols,
      sb_rows,
      tile_width_sb,
      tile_height_sb,
      cols,
      rows,
      tile_cols_log2,
      tile_rows_log2,
      sb_size_log2,
    }
  }

  /// Return the smallest value for `k` such that `blkSize << k` is greater
  /// than or equal to `target`.
  fn tile_log2(blk_size: usize, target: usize) -> usize {
    let mut k = 0;
    while (blk_size << k) < target {
      k += 1;
    }
    k
  }

  #[inline(always)]
  pub fn tile_count(&self) -> usize {
    self.cols * self.rows
  }

  /// Mode info columns of the frame.
  #[inline]
  pub fn mi_cols(&self) -> usize {
    self.frame_width.align_power_of_two_and_shift(MI_SIZE_LOG2)
  }

  #[inline]
  pub fn mi_rows(&self) -> usize {
    self.frame_height.align_power_of_two_and_shift(MI_SIZE_LOG2)
  }

  pub fn tile_rect(&self, index: usize) -> TileRect {
    let (col, row) = (index % self.cols, index / self.cols);
    let sbx = col * self.tile_width_sb;
    let sby = row * self.tile_height_sb;
    let sb_cols = self.tile_width_sb.min(self.sb_cols - sbx);
    let sb_rows = self.tile_height_sb.min(self.sb_rows - sby);
    let sb_mi_log2 = self.sb_size_log2 - MI_SIZE_LOG2;
    let mi_x = sbx << sb_mi_log2;
    let mi_y = sby << sb_mi_log2;
    TileRect {
      index,
      col,
      row,
      sbx,
      sby,
      sb_cols,
      sb_rows,
      mi_x,
      mi_y,
      mi_cols: (sb_cols << sb_mi_log2).min(self.mi_cols() - mi_x),
      mi_rows: (sb_rows << sb_mi_log2).min(self.mi_rows() - mi_y),
    }
  }

  /// Every tile in raster order.
  pub fn tile_rects(&self) -> impl Iterator<Item = TileRect> + '_ {
    (0..self.tile_count()).map(move |i| self.tile_rect(i))
  }

  /// Whether every plane of `frame` has the frame size and room for
  /// whole superblocks.
  pub fn covers(&self, frame: &Frame) -> bool {
    frame.planes.iter().enumerate().all(|(i, p)| {
      let dec = (i > 0) as usize;
      p.cfg.width == (self.frame_width + dec) >> dec
        && p.cfg.height == (self.frame_height + dec) >> dec
        && p.cfg.stride >= (self.sb_cols << self.sb_size_log2) >> dec
        && p.cfg.alloc_height >= (self.sb_rows << self.sb_size_log2) >> dec
    })
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn tiling_clamps_log2() {
    // 640x480 with 64x64 superblocks: 10x8 superblocks.
    let ti = TilingInfo::new(6, 640, 480, 5, 1);
    assert_eq!((ti.sb_cols, ti.sb_rows), (10, 8));
    assert_eq!(ti.tile_cols_log2, 4);
    assert_eq!(ti.tile_width_sb, 1);
    assert_eq!(ti.cols, 10);
    assert_eq!(ti.rows, 2);
  }

  #[test]
  fn edge_tiles_are_clipped() {
    let ti = TilingInfo::new(6, 200, 100, 1, 0);
    assert_eq!(ti.tile_width_sb, 2);
    let last = ti.tile_rect(1);
    assert_eq!((last.sbx, last.sb_cols), (2, 2));
    assert_eq!(last.mi_x, 16);
    assert_eq!(last.mi_cols, 25 - 16);
    assert_eq!(last.mi_rows, 13);
  }

  #[test]
  fn wide_frames_need_columns() {
    let ti = TilingInfo::new(6, 8192, 64, 0, 0);
    assert_eq!(ti.tile_cols_log2, 1);
    assert_eq!(ti.cols, 2);
  }
}
