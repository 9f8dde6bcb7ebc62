// Copyright (c) 2019-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use super::*;

use crate::context::PLANES;
use crate::frame::*;
use crate::partition::*;
use crate::stats::EncoderStats;

/// Mutable state of one tile while it is coded.
///
/// The reconstruction is kept tile-local so tiles can be processed in
/// parallel; it covers whole superblocks and is copied into the frame
/// once the tile is done (see [`TileStateMut::copy_into`]).
#[derive(Debug)]
pub struct TileStateMut<'a> {
  pub rect: TileRect,
  pub sb_size_log2: usize,
  /// The prediction of the whole frame.
  pub prediction: &'a Frame,
  /// Tile relative reconstruction, one plane per component.
  pub rec: [Plane; PLANES],
  pub stats: EncoderStats,
}

impl<'a> TileStateMut<'a> {
  pub fn new(
    rect: TileRect, sb_size_log2: usize, prediction: &'a Frame,
  ) -> Self {
    let width = rect.sb_cols << sb_size_log2;
    let height = rect.sb_rows << sb_size_log2;
    let rec = [0, 1, 2].map(|plane| {
      let dec = (plane > 0) as usize;
      Plane::new(PlaneConfig::new(width >> dec, height >> dec, dec, dec, 0))
    });
    TileStateMut {
      rect,
      sb_size_log2,
      prediction,
      rec,
      stats: EncoderStats::default(),
    }
  }

  /// Frame position of the top-left pixel of the tile in `plane`.
  #[inline]
  pub const fn plane_origin(&self, plane: usize) -> (usize, usize) {
    let dec = (plane > 0) as usize;
    (
      (self.rect.mi_x << MI_SIZE_LOG2) >> dec,
      (self.rect.mi_y << MI_SIZE_LOG2) >> dec,
    )
  }

  /// Visible luma pixels of a block at tile position `bo`.
  pub fn visible_pixels(&self, bo: BlockOffset, bsize: BlockSize) -> usize {
    let (fx, fy) = self.plane_origin(0);
    let x = fx + (bo.x << MI_SIZE_LOG2);
    let y = fy + (bo.y << MI_SIZE_LOG2);
    let frame = &self.prediction.planes[0].cfg;
    let w = bsize.width().min(frame.width.saturating_sub(x));
    let h = bsize.height().min(frame.height.saturating_sub(y));
    w * h
  }

  /// Start the reconstruction of a block from its prediction.
  pub fn predict_block(&mut self, bo: BlockOffset, bsize: BlockSize) {
    for plane in 0..PLANES {
      let dec = (plane > 0) as usize;
      let (ox, oy) = self.plane_origin(plane);
      let x = (bo.x << MI_SIZE_LOG2) >> dec;
      let y = (bo.y << MI_SIZE_LOG2) >> dec;
      let w = bsize.width() >> dec;
      let h = bsize.height() >> dec;
      let pred = &self.prediction.planes[plane];
      let rec = &mut self.rec[plane];
      for row in 0..h {
        let src = &pred.row(oy + y + row)[ox + x..][..w];
        rec.row_mut(y + row)[x..][..w].copy_from_slice(src);
      }
    }
  }

  /// Copy the tile reconstruction into `frame` at the tile position.
  pub fn copy_into(&self, frame: &mut Frame) {
    for (plane, rec) in self.rec.iter().enumerate() {
      let (ox, oy) = self.plane_origin(plane);
      let dst = &mut frame.planes[plane];
      let w = rec.cfg.width.min(dst.cfg.stride - ox);
      let h = rec.cfg.height.min(dst.cfg.alloc_height - oy);
      for y in 0..h {
        dst.row_mut(oy + y)[ox..][..w].copy_from_slice(&rec.row(y)[..w]);
      }
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn prediction_lands_at_the_tile_position() {
    let tiling = TilingInfo::new(6, 128, 64, 1, 0);
    let mut pred = Frame::new(128, 64, 6);
    pred.planes[0].fill(50);
    pred.planes[0].row_mut(0)[64] = 7;
    let rect = tiling.tile_rect(1);
    let mut ts = TileStateMut::new(rect, 6, &pred);
    assert_eq!(ts.plane_origin(0), (64, 0));
    assert_eq!(ts.plane_origin(1), (32, 0));

    ts.predict_block(BlockOffset { x: 0, y: 0 }, BlockSize::BLOCK_8X8);
    assert_eq!(ts.rec[0].p(0, 0), 7);
    assert_eq!(ts.rec[0].p(7, 7), 50);
    assert_eq!(ts.rec[0].p(8, 0), 0);

    let mut rec = Frame::new(128, 64, 6);
    ts.copy_into(&mut rec);
    assert_eq!(rec.planes[0].p(64, 0), 7);
    assert_eq!(rec.planes[0].p(0, 0), 0);
  }

  #[test]
  fn edge_blocks_count_visible_pixels() {
    let tiling = TilingInfo::new(6, 100, 40, 0, 0);
    let pred = Frame::new(100, 40, 6);
    let ts = TileStateMut::new(tiling.tile_rect(0), 6, &pred);
    let bo = BlockOffset { x: 8, y: 4 };
    assert_eq!(ts.visible_pixels(bo, BlockSize::BLOCK_64X64), 36 * 8);
  }
}
