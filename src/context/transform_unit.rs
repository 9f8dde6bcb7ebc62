// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use super::*;

use crate::ec::{BoolReader, Writer};
use crate::partition::*;
use crate::token::{self, BlockType};
use crate::transform::TxSize;

impl BlockContext {
  #[inline]
  fn left_mask(&self, plane: usize) -> usize {
    let dec = (plane > 0) as usize;
    (1 << (self.sb_size_log2() - 2 - dec)) - 1
  }

  /// Whether the 4x4 unit at tile position `(x4, y4)` of `plane` lies
  /// inside the frame.
  #[inline]
  pub fn is_visible(&self, plane: usize, x4: usize, y4: usize) -> bool {
    let (cols, rows) = self.visible_4x4(plane);
    x4 < cols && y4 < rows
  }

  /// Sum of the above and left nonzero flags over the transform edge.
  pub fn coeff_context(
    &self, plane: usize, x4: usize, y4: usize, tx_size: TxSize,
  ) -> usize {
    let n = tx_size.width_4x4();
    let mask = self.left_mask(plane);
    let above = self.above_coeff_context[plane][x4..][..n]
      .iter()
      .any(|&c| c != 0);
    let left = self.left_coeff_context[plane][y4 & mask..][..n]
      .iter()
      .any(|&c| c != 0);
    above as usize + left as usize
  }

  /// Record the outcome of a transform block. Units past the frame edge
  /// always read as zero.
  pub fn set_coeff_context(
    &mut self, plane: usize, x4: usize, y4: usize, tx_size: TxSize,
    nonzero: bool,
  ) {
    let n = tx_size.width_4x4();
    let (cols, rows) = self.visible_4x4(plane);
    let mask = self.left_mask(plane);
    for (i, c) in
      self.above_coeff_context[plane][x4..][..n].iter_mut().enumerate()
    {
      *c = (nonzero && x4 + i < cols) as u8;
    }
    for (i, c) in
      self.left_coeff_context[plane][y4 & mask..][..n].iter_mut().enumerate()
    {
      *c = (nonzero && y4 + i < rows) as u8;
    }
  }

  /// Clear the coefficient contexts of a block coded without residual.
  pub fn reset_skip_context(
    &mut self, bo: BlockOffset, bsize: BlockSize, second_order: bool,
  ) {
    for plane in 0..PLANES {
      let dec = (plane > 0) as usize;
      let x4 = (bo.x << 1) >> dec;
      let y4 = (bo.y << 1) >> dec;
      let w4 = ((bsize.width_mi() << 1) >> dec).max(1);
      let h4 = ((bsize.height_mi() << 1) >> dec).max(1);
      let mask = self.left_mask(plane);

      let above = &mut self.above_coeff_context[plane];
      let x_end = (x4 + w4).min(above.len());
      for c in &mut above[x4..x_end] {
        *c = 0;
      }
      let left = &mut self.left_coeff_context[plane];
      let y_start = y4 & mask;
      let y_end = (y_start + h4).min(mask + 1);
      for c in &mut left[y_start..y_end] {
        *c = 0;
      }
    }
    if second_order {
      self.set_y2_context(bo, false);
    }
  }

  #[inline]
  fn sb_col(&self, bo: BlockOffset) -> usize {
    bo.x >> (self.sb_size_log2() - MI_SIZE_LOG2)
  }

  /// Context of the second order block of the macroblock at `bo`.
  pub fn y2_context(&self, bo: BlockOffset) -> usize {
    self.above_y2_context[self.sb_col(bo)] as usize
      + self.left_y2_context as usize
  }

  pub fn set_y2_context(&mut self, bo: BlockOffset, nonzero: bool) {
    let col = self.sb_col(bo);
    self.above_y2_context[col] = nonzero as u8;
    self.left_y2_context = nonzero as u8;
  }
}

impl<'a> ContextWriter<'a> {
  /// Write the tokens of one transform block of `plane` at tile relative
  /// 4x4 position `(x4, y4)` and update the neighbor contexts.
  ///
  /// `coeffs` holds the quantized values in scan order up to the end of
  /// block.
  pub fn write_coeffs<W: Writer>(
    &mut self, w: &mut W, plane: usize, x4: usize, y4: usize,
    tx_size: TxSize, block_type: BlockType, coeffs: &[i16],
  ) {
    let ctx = self.bc.coeff_context(plane, x4, y4, tx_size);
    token::write_coeffs(
      w,
      &self.fc.coef_probs[tx_size as usize],
      Some(&mut self.counts.coef[tx_size as usize]),
      coeffs,
      tx_size,
      block_type,
      ctx,
    );
    let nonzero = coeffs.len() > block_type.first_coeff();
    self.bc.set_coeff_context(plane, x4, y4, tx_size, nonzero);
  }

  /// Write the second order block of the macroblock at `bo`.
  pub fn write_y2_coeffs<W: Writer>(
    &mut self, w: &mut W, bo: BlockOffset, coeffs: &[i16],
  ) {
    let ctx = self.bc.y2_context(bo);
    token::write_coeffs(
      w,
      &self.fc.coef_probs[TxSize::TX_4X4 as usize],
      Some(&mut self.counts.coef[TxSize::TX_4X4 as usize]),
      coeffs,
      TxSize::TX_4X4,
      BlockType::Y2,
      ctx,
    );
    self.bc.set_y2_context(bo, !coeffs.is_empty());
  }
}

impl<'a> ContextReader<'a> {
  /// Mirror of [`ContextWriter::write_coeffs`]. Returns the end of block.
  pub fn read_coeffs(
    &mut self, r: &mut BoolReader, plane: usize, x4: usize, y4: usize,
    tx_size: TxSize, block_type: BlockType, coeffs: &mut Vec<i16>,
  ) -> usize {
    let ctx = self.bc.coeff_context(plane, x4, y4, tx_size);
    let eob = token::read_coeffs(
      r,
      &self.fc.coef_probs[tx_size as usize],
      Some(&mut self.counts.coef[tx_size as usize]),
      coeffs,
      tx_size,
      block_type,
      ctx,
    );
    self.bc.set_coeff_context(plane, x4, y4, tx_size, eob > 0);
    eob
  }

  pub fn read_y2_coeffs(
    &mut self, r: &mut BoolReader, bo: BlockOffset, coeffs: &mut Vec<i16>,
  ) -> usize {
    let ctx = self.bc.y2_context(bo);
    let eob = token::read_coeffs(
      r,
      &self.fc.coef_probs[TxSize::TX_4X4 as usize],
      Some(&mut self.counts.coef[TxSize::TX_4X4 as usize]),
      coeffs,
      TxSize::TX_4X4,
      BlockType::Y2,
      ctx,
    );
    self.bc.set_y2_context(bo, eob > 0);
    eob
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::ec::WriterEncoder;
  use crate::tiling::TilingInfo;
  use crate::transform::TxSize::*;

  use crate::prelude::BlockSize::BLOCK_8X8;
  #[test]
  fn contexts_past_the_edge_stay_zero() {
    // 40 pixels wide: 10 visible luma units, 5 chroma.
    let ti = TilingInfo::new(6, 40, 40, 0, 0);
    let mut bc = BlockContext::new(&ti.tile_rect(0), 6);
    bc.set_coeff_context(0, 8, 0, TX_16X16, true);
    assert_eq!(bc.above_coeff_context[0][8..12], [1, 1, 0, 0]);
    assert_eq!(bc.coeff_context(0, 8, 4, TX_8X8), 1);
    assert_eq!(bc.coeff_context(0, 10, 4, TX_8X8), 0);
    assert!(bc.is_visible(1, 4, 4));
    assert!(!bc.is_visible(1, 5, 0));

    bc.set_coeff_context(1, 4, 4, TX_8X8, true);
    assert_eq!(bc.left_coeff_context[1][4..6], [1, 0]);
  }

  #[test]
  fn skipped_blocks_clear_their_area() {
    let ti = TilingInfo::new(6, 64, 64, 0, 0);
    let mut bc = BlockContext::new(&ti.tile_rect(0), 6);
    for plane in 0..PLANES {
      bc.set_coeff_context(plane, 0, 0, TX_16X16, true);
    }
    bc.reset_skip_context(BlockOffset { x: 0, y: 0 }, BLOCK_8X8, false);
    assert_eq!(bc.above_coeff_context[0][..4], [0, 0, 1, 1]);
    assert_eq!(bc.left_coeff_context[1][..4], [0, 1, 1, 1]);
    assert_eq!(bc.coeff_context(2, 0, 0, TX_4X4), 0);
  }

  #[test]
  fn coefficients_round_trip_with_contexts() {
    let ti = TilingInfo::new(4, 32, 32, 0, 0);
    let tile = ti.tile_rect(0);
    let fc = FrameContext::default();
    let mut cw = ContextWriter::new(&fc, BlockContext::new(&tile, 4));
    let bo = BlockOffset { x: 0, y: 0 };
    let y2 = [12, -3, 0, 0, 1];
    let y = [0, 4, 0, -1];
    let mut w = WriterEncoder::new();
    cw.write_y2_coeffs(&mut w, bo, &y2);
    cw.write_coeffs(&mut w, 0, 0, 0, TX_4X4, BlockType::Y_NO_DC, &y);
    cw.write_coeffs(&mut w, 0, 1, 0, TX_4X4, BlockType::Y_NO_DC, &[]);
    cw.write_coeffs(&mut w, 1, 0, 0, TX_4X4, BlockType::UV, &[-7]);
    let data = w.done().unwrap();

    let mut cr = ContextReader::new(&fc, BlockContext::new(&tile, 4));
    let mut r = BoolReader::new(&data);
    let mut coeffs = Vec::new();
    assert_eq!(cr.read_y2_coeffs(&mut r, bo, &mut coeffs), 5);
    assert_eq!(coeffs, y2);
    cr.read_coeffs(&mut r, 0, 0, 0, TX_4X4, BlockType::Y_NO_DC, &mut coeffs);
    assert_eq!(coeffs, y);
    assert_eq!(
      cr.read_coeffs(&mut r, 0, 1, 0, TX_4X4, BlockType::Y_NO_DC, &mut coeffs),
      0
    );
    cr.read_coeffs(&mut r, 1, 0, 0, TX_4X4, BlockType::UV, &mut coeffs);
    assert_eq!(coeffs, [-7]);
    assert_eq!(cw.counts, cr.counts);
    assert_eq!(cr.bc.y2_context(BlockOffset { x: 2, y: 0 }), 1);
    assert_eq!(cr.bc.above_coeff_context, cw.bc.above_coeff_context);
  }
}
