// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

#![allow(non_camel_case_types)]

use std::fmt;

use num_derive::FromPrimitive;
use thiserror::Error;

use self::BlockSize::*;
use self::PartitionType::*;
use crate::mv::MotionVector;
use crate::transform::TxSize;
use crate::transform::TxSize::*;

/// Mode info units are 8x8 luma pixels.
pub const MI_SIZE_LOG2: usize = 3;
pub const MI_SIZE: usize = 1 << MI_SIZE_LOG2;

#[derive(PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Debug, FromPrimitive)]
pub enum RefFrame {
  INTRA_FRAME = 0,
  LAST_FRAME = 1,
  GOLDEN_FRAME = 2,
  ALTREF_FRAME = 3,
}

impl RefFrame {
  #[inline]
  pub const fn is_inter(self) -> bool {
    !matches!(self, RefFrame::INTRA_FRAME)
  }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Debug, FromPrimitive)]
pub enum PartitionType {
  PARTITION_NONE,
  PARTITION_HORZ,
  PARTITION_VERT,
  PARTITION_SPLIT,
  PARTITION_HORZ_A, // top half split, bottom half whole
  PARTITION_HORZ_B, // top half whole, bottom half split
  PARTITION_VERT_A, // left half split, right half whole
  PARTITION_VERT_B, // left half whole, right half split
}

impl PartitionType {
  #[inline]
  pub const fn is_extended(self) -> bool {
    self as usize >= PARTITION_HORZ_A as usize
  }

  /// Number of leaf blocks, 0 for a split.
  #[inline]
  pub const fn block_count(self) -> usize {
    match self {
      PARTITION_NONE => 1,
      PARTITION_HORZ | PARTITION_VERT => 2,
      PARTITION_SPLIT => 0,
      _ => 3,
    }
  }
}

#[derive(
  Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, FromPrimitive,
)]
pub enum BlockSize {
  BLOCK_8X8,
  BLOCK_8X16,
  BLOCK_16X8,
  BLOCK_16X16,
  BLOCK_16X32,
  BLOCK_32X16,
  BLOCK_32X32,
  BLOCK_32X64,
  BLOCK_64X32,
  BLOCK_64X64,
}

#[derive(Debug, Error, Copy, Clone, Eq, PartialEq)]
#[error("invalid block size")]
pub struct InvalidBlockSize;

impl BlockSize {
  pub const BLOCK_SIZES: usize = 10;

  /// # Errors
  ///
  /// - Returns `InvalidBlockSize` if `w`x`h` is not a coded block size.
  pub const fn from_width_and_height(
    w: usize, h: usize,
  ) -> Result<BlockSize, InvalidBlockSize> {
    Ok(match (w, h) {
      (8, 8) => BLOCK_8X8,
      (8, 16) => BLOCK_8X16,
      (16, 8) => BLOCK_16X8,
      (16, 16) => BLOCK_16X16,
      (16, 32) => BLOCK_16X32,
      (32, 16) => BLOCK_32X16,
      (32, 32) => BLOCK_32X32,
      (32, 64) => BLOCK_32X64,
      (64, 32) => BLOCK_64X32,
      (64, 64) => BLOCK_64X64,
      _ => return Err(InvalidBlockSize),
    })
  }

  /// Square block of `1 << log2` pixels.
  ///
  /// # Errors
  ///
  /// - Returns `InvalidBlockSize` if the size is not 8, 16, 32 or 64.
  pub const fn square(log2: usize) -> Result<BlockSize, InvalidBlockSize> {
    if log2 < 3 || log2 > 6 {
      return Err(InvalidBlockSize);
    }
    Self::from_width_and_height(1 << log2, 1 << log2)
  }

  #[inline]
  pub const fn width_log2(self) -> usize {
    match self {
      BLOCK_8X8 | BLOCK_8X16 => 3,
      BLOCK_16X8 | BLOCK_16X16 | BLOCK_16X32 => 4,
      BLOCK_32X16 | BLOCK_32X32 | BLOCK_32X64 => 5,
      BLOCK_64X32 | BLOCK_64X64 => 6,
    }
  }

  #[inline]
  pub const fn height_log2(self) -> usize {
    match self {
      BLOCK_8X8 | BLOCK_16X8 => 3,
      BLOCK_8X16 | BLOCK_16X16 | BLOCK_32X16 => 4,
      BLOCK_16X32 | BLOCK_32X32 | BLOCK_64X32 => 5,
      BLOCK_32X64 | BLOCK_64X64 => 6,
    }
  }

  #[inline]
  pub const fn width(self) -> usize {
    1 << self.width_log2()
  }

  #[inline]
  pub const fn height(self) -> usize {
    1 << self.height_log2()
  }

  #[inline]
  pub const fn width_mi(self) -> usize {
    self.width() >> MI_SIZE_LOG2
  }

  #[inline]
  pub const fn height_mi(self) -> usize {
    self.height() >> MI_SIZE_LOG2
  }

  #[inline]
  pub const fn is_sqr(self) -> bool {
    self.width_log2() == self.height_log2()
  }

  /// Largest square transform inside the block.
  #[inline]
  pub const fn largest_tx_size(self) -> TxSize {
    match self {
      BLOCK_8X8 | BLOCK_8X16 | BLOCK_16X8 => TX_8X8,
      BLOCK_16X16 | BLOCK_16X32 | BLOCK_32X16 => TX_16X16,
      _ => TX_32X32,
    }
  }

  /// Largest square transform inside the 4:2:0 chroma block.
  #[inline]
  pub const fn largest_uv_tx_size(self) -> TxSize {
    match self {
      BLOCK_8X8 | BLOCK_8X16 | BLOCK_16X8 => TX_4X4,
      BLOCK_16X16 | BLOCK_16X32 | BLOCK_32X16 => TX_8X8,
      BLOCK_32X32 | BLOCK_32X64 | BLOCK_64X32 => TX_16X16,
      BLOCK_64X64 => TX_32X32,
    }
  }

  /// Probability set of the luma intra modes.
  #[inline]
  pub const fn size_group(self) -> usize {
    match self {
      BLOCK_8X8 | BLOCK_8X16 | BLOCK_16X8 => 1,
      BLOCK_16X16 | BLOCK_16X32 | BLOCK_32X16 => 2,
      _ => 3,
    }
  }

  /// # Errors
  ///
  /// - Returns `InvalidBlockSize` if the block size cannot be split
  ///   in the requested way.
  pub const fn subsize(
    self, partition: PartitionType,
  ) -> Result<BlockSize, InvalidBlockSize> {
    Ok(match partition {
      PARTITION_NONE => self,
      PARTITION_SPLIT => match self {
        BLOCK_16X16 => BLOCK_8X8,
        BLOCK_32X32 => BLOCK_16X16,
        BLOCK_64X64 => BLOCK_32X32,
        _ => return Err(InvalidBlockSize),
      },
      PARTITION_HORZ | PARTITION_HORZ_A | PARTITION_HORZ_B => match self {
        BLOCK_16X16 => BLOCK_16X8,
        BLOCK_32X32 => BLOCK_32X16,
        BLOCK_64X64 => BLOCK_64X32,
        _ => return Err(InvalidBlockSize),
      },
      PARTITION_VERT | PARTITION_VERT_A | PARTITION_VERT_B => match self {
        BLOCK_16X16 => BLOCK_8X16,
        BLOCK_32X32 => BLOCK_16X32,
        BLOCK_64X64 => BLOCK_32X64,
        _ => return Err(InvalidBlockSize),
      },
    })
  }

  /// Leaf blocks of a non-split partition as `(size, x_mi, y_mi)`
  /// offsets, in coding order.
  ///
  /// # Errors
  ///
  /// - Returns `InvalidBlockSize` for a split or a partition the block size
  ///   does not allow.
  pub fn partition_blocks(
    self, partition: PartitionType,
  ) -> Result<Vec<(BlockSize, usize, usize)>, InvalidBlockSize> {
    let half = self.width_mi() / 2;
    let sub = self.subsize(partition)?;
    let quarter = if partition.is_extended() {
      self.subsize(PARTITION_SPLIT)?
    } else {
      sub
    };
    Ok(match partition {
      PARTITION_NONE => vec![(self, 0, 0)],
      PARTITION_HORZ => vec![(sub, 0, 0), (sub, 0, half)],
      PARTITION_VERT => vec![(sub, 0, 0), (sub, half, 0)],
      PARTITION_SPLIT => return Err(InvalidBlockSize),
      PARTITION_HORZ_A => {
        vec![(quarter, 0, 0), (quarter, half, 0), (sub, 0, half)]
      }
      PARTITION_HORZ_B => {
        vec![(sub, 0, 0), (quarter, 0, half), (quarter, half, half)]
      }
      PARTITION_VERT_A => {
        vec![(quarter, 0, 0), (quarter, 0, half), (sub, half, 0)]
      }
      PARTITION_VERT_B => {
        vec![(sub, 0, 0), (quarter, half, 0), (quarter, half, half)]
      }
    })
  }
}

impl fmt::Display for BlockSize {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    write!(f, "{}x{}", self.width(), self.height())
  }
}

#[derive(
  Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, FromPrimitive,
)]
pub enum PredictionMode {
  DC_PRED,
  V_PRED,
  H_PRED,
  D45_PRED,
  D135_PRED,
  D117_PRED,
  D153_PRED,
  D207_PRED,
  D63_PRED,
  TM_PRED,
  NEARESTMV,
  NEARMV,
  ZEROMV,
  NEWMV,
}

impl PredictionMode {
  #[inline]
  pub const fn is_intra(self) -> bool {
    (self as usize) < PredictionMode::NEARESTMV as usize
  }
}

impl Default for PredictionMode {
  fn default() -> Self {
    PredictionMode::DC_PRED
  }
}

/// Position in mode info units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlockOffset {
  pub x: usize,
  pub y: usize,
}

impl BlockOffset {
  #[inline]
  pub const fn with_offset(self, dx: usize, dy: usize) -> BlockOffset {
    BlockOffset { x: self.x + dx, y: self.y + dy }
  }
}

/// Everything decided about one leaf block outside of this crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockDecision {
  /// Luma intra mode, or the inter mode
  pub mode: PredictionMode,
  /// Chroma intra mode; ignored for inter blocks
  pub uv_mode: PredictionMode,
  pub ref_frame: RefFrame,
  /// Motion vector of a NEWMV block
  pub mv: MotionVector,
  pub tx_size: TxSize,
  pub skip: bool,
  pub segment_id: u8,
}

impl BlockDecision {
  pub const fn intra(mode: PredictionMode, tx_size: TxSize) -> Self {
    BlockDecision {
      mode,
      uv_mode: PredictionMode::DC_PRED,
      ref_frame: RefFrame::INTRA_FRAME,
      mv: MotionVector::zero(),
      tx_size,
      skip: false,
      segment_id: 0,
    }
  }

  pub const fn inter(
    mode: PredictionMode, ref_frame: RefFrame, mv: MotionVector,
    tx_size: TxSize,
  ) -> Self {
    BlockDecision {
      mode,
      uv_mode: PredictionMode::DC_PRED,
      ref_frame,
      mv,
      tx_size,
      skip: false,
      segment_id: 0,
    }
  }

  #[inline]
  pub const fn is_inter(&self) -> bool {
    self.ref_frame.is_inter()
  }
}

impl Default for BlockDecision {
  fn default() -> Self {
    BlockDecision::intra(PredictionMode::DC_PRED, TxSize::TX_4X4)
  }
}

/// Partitioning of one square node of a superblock.
///
/// A split carries its four quadrants in raster order; every other
/// partition carries its leaf blocks in coding order (see
/// [`BlockSize::partition_blocks`]). Leaves and quadrants that fall outside
/// the frame are ignored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartitionTree {
  pub partition: PartitionType,
  pub blocks: Vec<BlockDecision>,
  pub children: Vec<PartitionTree>,
}

impl PartitionTree {
  pub fn leaf(d: BlockDecision) -> Self {
    PartitionTree {
      partition: PARTITION_NONE,
      blocks: vec![d],
      children: Vec::new(),
    }
  }

  pub fn split(children: Vec<PartitionTree>) -> Self {
    PartitionTree {
      partition: PARTITION_SPLIT,
      blocks: Vec::new(),
      children,
    }
  }

  pub fn new(partition: PartitionType, blocks: Vec<BlockDecision>) -> Self {
    PartitionTree { partition, blocks, children: Vec::new() }
  }

  /// A tree of `bsize` split down to `leaf_size` leaves, all copies of
  /// `d`.
  pub fn uniform(
    bsize: BlockSize, leaf_size: BlockSize, d: BlockDecision,
  ) -> Self {
    if bsize <= leaf_size || bsize == BLOCK_8X8 {
      return PartitionTree::leaf(d);
    }
    match bsize.subsize(PARTITION_SPLIT) {
      Ok(sub) => PartitionTree::split(
        (0..4).map(|_| PartitionTree::uniform(sub, leaf_size, d)).collect(),
      ),
      Err(_) => PartitionTree::leaf(d),
    }
  }
}

/// Partition trees of a frame, one per superblock in raster order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameDecisions {
  pub sb_cols: usize,
  pub sb_rows: usize,
  pub trees: Vec<PartitionTree>,
}

impl FrameDecisions {
  pub fn new(
    sb_cols: usize, sb_rows: usize, trees: Vec<PartitionTree>,
  ) -> Self {
    FrameDecisions { sb_cols, sb_rows, trees }
  }

  #[inline]
  pub fn tree(&self, sbx: usize, sby: usize) -> Option<&PartitionTree> {
    self.trees.get(sby * self.sb_cols + sbx)
  }
}
