// Copyright (c) 2019-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use crate::mv::{MotionVector, MvNeighbor};
use crate::partition::*;
use crate::transform::TxSize;

use std::ops::{Index, IndexMut};

/// Mode info of one 8x8 unit, as coded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Block {
  pub mode: PredictionMode,
  pub ref_frame: RefFrame,
  /// Vector actually used by the block.
  pub mv: MotionVector,
  pub bsize: BlockSize,
  pub tx_size: TxSize,
  pub skip: bool,
  pub segment_id: u8,
  /// Whether the unit was coded yet.
  pub coded: bool,
}

impl Default for Block {
  fn default() -> Block {
    Block {
      mode: PredictionMode::DC_PRED,
      ref_frame: RefFrame::INTRA_FRAME,
      mv: MotionVector::zero(),
      bsize: BlockSize::BLOCK_8X8,
      tx_size: TxSize::TX_4X4,
      skip: false,
      segment_id: 0,
      coded: false,
    }
  }
}

impl Block {
  #[inline]
  pub const fn is_inter(&self) -> bool {
    self.ref_frame.is_inter()
  }

  #[inline]
  pub const fn mv_neighbor(&self) -> MvNeighbor {
    MvNeighbor { mode: self.mode, ref_frame: self.ref_frame, mv: self.mv }
  }
}

/// Mode info grid of one tile, indexed by tile relative mode info
/// position. Lookups never leave the tile.
#[derive(Clone, Debug)]
pub struct TileBlocks {
  blocks: Vec<Block>,
  cols: usize,
  rows: usize,
}

impl TileBlocks {
  pub fn new(cols: usize, rows: usize) -> Self {
    TileBlocks { blocks: vec![Block::default(); cols * rows], cols, rows }
  }

  #[inline(always)]
  pub const fn cols(&self) -> usize {
    self.cols
  }

  #[inline(always)]
  pub const fn rows(&self) -> usize {
    self.rows
  }

  #[inline]
  fn coded(&self, x: usize, y: usize) -> Option<&Block> {
    if x < self.cols && y < self.rows {
      Some(&self[y][x]).filter(|b| b.coded)
    } else {
      None
    }
  }

  #[inline]
  pub fn above_of(&self, bo: BlockOffset) -> Option<&Block> {
    bo.y.checked_sub(1).and_then(|y| self.coded(bo.x, y))
  }

  #[inline]
  pub fn left_of(&self, bo: BlockOffset) -> Option<&Block> {
    bo.x.checked_sub(1).and_then(|x| self.coded(x, bo.y))
  }

  #[inline]
  pub fn above_left_of(&self, bo: BlockOffset) -> Option<&Block> {
    match (bo.x.checked_sub(1), bo.y.checked_sub(1)) {
      (Some(x), Some(y)) => self.coded(x, y),
      _ => None,
    }
  }

  /// Store `block` over the area of its size, clipped to the tile.
  pub fn set_block(&mut self, bo: BlockOffset, block: Block) {
    let x_end = (bo.x + block.bsize.width_mi()).min(self.cols);
    let y_end = (bo.y + block.bsize.height_mi()).min(self.rows);
    for y in bo.y..y_end {
      self[y][bo.x..x_end].fill(Block { coded: true, ..block });
    }
  }
}

impl Index<usize> for TileBlocks {
  type Output = [Block];
  #[inline]
  fn index(&self, index: usize) -> &Self::Output {
    &self.blocks[index * self.cols..][..self.cols]
  }
}

impl IndexMut<usize> for TileBlocks {
  #[inline]
  fn index_mut(&mut self, index: usize) -> &mut Self::Output {
    let cols = self.cols;
    &mut self.blocks[index * cols..][..cols]
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn neighbors_stay_inside_the_tile() {
    let mut tb = TileBlocks::new(4, 4);
    let b = Block { bsize: BlockSize::BLOCK_16X16, ..Default::default() };
    tb.set_block(BlockOffset { x: 0, y: 0 }, b);
    let bo = BlockOffset { x: 2, y: 0 };
    assert!(tb.above_of(bo).is_none());
    assert_eq!(tb.left_of(bo).map(|b| b.bsize), Some(BlockSize::BLOCK_16X16));
    assert!(tb.above_left_of(BlockOffset { x: 2, y: 2 }).is_some());
    assert!(tb.left_of(BlockOffset { x: 0, y: 1 }).is_none());
    // Not coded yet.
    assert!(tb.above_of(BlockOffset { x: 2, y: 1 }).is_none());
  }

  #[test]
  fn blocks_are_clipped() {
    let mut tb = TileBlocks::new(3, 3);
    let b = Block {
      bsize: BlockSize::BLOCK_32X32,
      skip: true,
      ..Default::default()
    };
    tb.set_block(BlockOffset { x: 1, y: 1 }, b);
    assert!(tb[2][2].skip && tb[2][2].coded);
    assert!(!tb[0][2].coded);
  }
}
