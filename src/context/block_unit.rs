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
use crate::mv::{self, MotionVector, MvCandidates, MvNeighbor};
use crate::partition::*;
use crate::segmentation::{
  read_segment_id, write_segment_id, SegmentationState,
};
use crate::tables::tables;
use crate::tiling::{Block, TileBlocks, TileRect};
use crate::transform::TxSize;

use num_traits::FromPrimitive;

/// Largest superblock in 4x4 units.
pub const MAX_SB_SIZE_4X4: usize = 16;
/// Largest superblock in mode info units.
pub const MAX_SB_SIZE_MI: usize = 8;

/// Neighbor state of one tile: coefficient, second order and partition
/// contexts plus the coded mode info.
///
/// Above contexts span the tile and are only cleared with a new tile.
/// Left contexts span one superblock and are cleared at the start of
/// every superblock row.
#[derive(Clone, Debug)]
pub struct BlockContext {
  pub above_partition_context: Vec<u8>,
  pub left_partition_context: [u8; MAX_SB_SIZE_MI],
  pub above_coeff_context: [Vec<u8>; PLANES],
  pub left_coeff_context: [[u8; MAX_SB_SIZE_4X4]; PLANES],
  /// Per superblock column.
  pub above_y2_context: Vec<u8>,
  pub left_y2_context: u8,
  pub blocks: TileBlocks,
  /// Visible 4x4 columns and rows of the luma plane.
  visible_4x4: (usize, usize),
  sb_size_log2: usize,
}

impl BlockContext {
  pub fn new(tile: &TileRect, sb_size_log2: usize) -> Self {
    let sb_4x4_log2 = sb_size_log2 - 2;
    let cols_4x4 = tile.sb_cols << sb_4x4_log2;
    let sb_mi = 1 << (sb_size_log2 - MI_SIZE_LOG2);
    BlockContext {
      above_partition_context: vec![0; tile.sb_cols * sb_mi],
      left_partition_context: [0; MAX_SB_SIZE_MI],
      above_coeff_context: [
        vec![0; cols_4x4],
        vec![0; cols_4x4 >> 1],
        vec![0; cols_4x4 >> 1],
      ],
      left_coeff_context: [[0; MAX_SB_SIZE_4X4]; PLANES],
      above_y2_context: vec![0; tile.sb_cols],
      left_y2_context: 0,
      blocks: TileBlocks::new(tile.mi_cols, tile.mi_rows),
      visible_4x4: (tile.mi_cols << 1, tile.mi_rows << 1),
      sb_size_log2,
    }
  }

  #[inline]
  pub const fn sb_size_log2(&self) -> usize {
    self.sb_size_log2
  }

  /// Visible 4x4 columns and rows of a plane.
  #[inline]
  pub const fn visible_4x4(&self, plane: usize) -> (usize, usize) {
    let dec = (plane > 0) as usize;
    (self.visible_4x4.0 >> dec, self.visible_4x4.1 >> dec)
  }

  fn reset_left_coeff_context(&mut self, plane: usize) {
    for c in &mut self.left_coeff_context[plane] {
      *c = 0;
    }
  }

  fn reset_left_partition_context(&mut self) {
    for c in &mut self.left_partition_context {
      *c = 0;
    }
  }

  /// Start a superblock row.
  pub fn reset_left_contexts(&mut self) {
    for p in 0..PLANES {
      BlockContext::reset_left_coeff_context(self, p);
    }
    BlockContext::reset_left_partition_context(self);
    self.left_y2_context = 0;
  }

  pub fn skip_context(&self, bo: BlockOffset) -> usize {
    let above_skip = self.blocks.above_of(bo).map_or(false, |b| b.skip);
    let left_skip = self.blocks.left_of(bo).map_or(false, |b| b.skip);
    above_skip as usize + left_skip as usize
  }

  // 0 - inter/inter, inter/--, --/inter, --/--
  // 1 - intra/inter, inter/intra
  // 2 - intra/--, --/intra
  // 3 - intra/intra
  pub fn intra_inter_context(&self, bo: BlockOffset) -> usize {
    let above = self.blocks.above_of(bo);
    let left = self.blocks.left_of(bo);
    match (above, left) {
      (Some(a), Some(l)) => {
        let above_intra = !a.is_inter();
        let left_intra = !l.is_inter();
        if above_intra && left_intra {
          3
        } else {
          (above_intra || left_intra) as usize
        }
      }
      (Some(b), None) | (None, Some(b)) => 2 * !b.is_inter() as usize,
      (None, None) => 0,
    }
  }

  /// Number of neighbors predicting from the last frame.
  pub fn ref_context(&self, bo: BlockOffset) -> usize {
    [self.blocks.above_of(bo), self.blocks.left_of(bo)]
      .iter()
      .flatten()
      .filter(|b| b.ref_frame == RefFrame::LAST_FRAME)
      .count()
  }

  pub fn tx_size_context(
    &self, bo: BlockOffset, max_tx_size: TxSize,
  ) -> usize {
    let max = max_tx_size as usize;
    let tx_of = |b: Option<&Block>| {
      b.map(|b| if b.skip { max } else { b.tx_size as usize })
    };
    let above = tx_of(self.blocks.above_of(bo));
    let left = tx_of(self.blocks.left_of(bo));
    let (above, left) = match (above, left) {
      (Some(a), Some(l)) => (a, l),
      (Some(a), None) => (a, a),
      (None, Some(l)) => (l, l),
      (None, None) => (max, max),
    };
    (above + left > max) as usize
  }

  /// Above, left and above-left neighbors contributing vector candidates.
  pub fn mv_neighbors(&self, bo: BlockOffset) -> [Option<MvNeighbor>; 3] {
    [
      self.blocks.above_of(bo).map(|b| b.mv_neighbor()),
      self.blocks.left_of(bo).map(|b| b.mv_neighbor()),
      self.blocks.above_left_of(bo).map(|b| b.mv_neighbor()),
    ]
  }

  pub fn inter_mode_context(&self, bo: BlockOffset) -> usize {
    let [above, left, _] = self.mv_neighbors(bo);
    mv::inter_mode_context(&above, &left)
  }

  pub fn mv_candidates(
    &self, bo: BlockOffset, ref_frame: RefFrame,
  ) -> MvCandidates {
    MvCandidates::find(&self.mv_neighbors(bo), ref_frame)
  }
}

/// Symbol writer of one tile. Every coded symbol is counted.
pub struct ContextWriter<'a> {
  pub bc: BlockContext,
  pub fc: &'a FrameContext,
  pub counts: FrameCounts,
}

impl<'a> ContextWriter<'a> {
  pub fn new(fc: &'a FrameContext, bc: BlockContext) -> Self {
    ContextWriter { bc, fc, counts: FrameCounts::default() }
  }

  pub fn write_segment_id<W: Writer>(
    &mut self, w: &mut W, segmentation: &SegmentationState, segment_id: u8,
  ) {
    write_segment_id(w, segmentation, segment_id);
  }

  pub fn write_skip<W: Writer>(
    &mut self, w: &mut W, bo: BlockOffset, skip: bool,
  ) {
    let ctx = self.bc.skip_context(bo);
    w.bool(skip, self.fc.skip_probs[ctx]);
    self.counts.skip[ctx][skip as usize] += 1;
  }

  pub fn write_is_inter<W: Writer>(
    &mut self, w: &mut W, bo: BlockOffset, is_inter: bool,
  ) {
    let ctx = self.bc.intra_inter_context(bo);
    w.bool(is_inter, self.fc.intra_inter_probs[ctx]);
    self.counts.intra_inter[ctx][is_inter as usize] += 1;
  }

  /// One bit per step up from `TX_4X4`, stopping at `max_tx_size`.
  pub fn write_tx_size<W: Writer>(
    &mut self, w: &mut W, bo: BlockOffset, tx_size: TxSize,
    max_tx_size: TxSize,
  ) {
    debug_assert!(tx_size <= max_tx_size);
    let ctx = self.bc.tx_size_context(bo, max_tx_size);
    let probs = self.fc.tx_probs.probs(max_tx_size, ctx);
    let counts = self.counts.tx.counts_mut(max_tx_size, ctx);
    for node in 0..max_tx_size as usize {
      let bigger = tx_size as usize > node;
      w.bool(bigger, probs[node]);
      counts[node][bigger as usize] += 1;
      if !bigger {
        break;
      }
    }
  }

  pub fn write_intra_mode<W: Writer>(
    &mut self, w: &mut W, bsize: BlockSize, mode: PredictionMode,
  ) {
    debug_assert!(mode.is_intra());
    let group = bsize.size_group();
    let token = tables().intra_mode_tokens[mode as usize];
    w.write_token(INTRA_MODE_TREE, &self.fc.y_mode_probs[group], token);
    self.counts.y_mode[group][mode as usize] += 1;
  }

  pub fn write_intra_uv_mode<W: Writer>(
    &mut self, w: &mut W, uv_mode: PredictionMode, y_mode: PredictionMode,
  ) {
    debug_assert!(uv_mode.is_intra());
    let token = tables().intra_mode_tokens[uv_mode as usize];
    let probs = &self.fc.uv_mode_probs[y_mode as usize];
    w.write_token(INTRA_MODE_TREE, probs, token);
    self.counts.uv_mode[y_mode as usize][uv_mode as usize] += 1;
  }

  pub fn write_ref_frame<W: Writer>(
    &mut self, w: &mut W, bo: BlockOffset, ref_frame: RefFrame,
  ) {
    debug_assert!(ref_frame.is_inter());
    let ctx = self.bc.ref_context(bo);
    let symbol = ref_frame as usize - RefFrame::LAST_FRAME as usize;
    let token = tables().ref_tokens[symbol];
    w.write_token(REF_TREE, &self.fc.ref_probs[ctx], token);
    self.counts.ref_frame[ctx][symbol] += 1;
  }

  pub fn write_inter_mode<W: Writer>(
    &mut self, w: &mut W, mode: PredictionMode, ctx: usize,
  ) {
    debug_assert!(!mode.is_intra());
    let symbol = mode as usize - PredictionMode::NEARESTMV as usize;
    let token = tables().inter_mode_tokens[symbol];
    w.write_token(INTER_MODE_TREE, &self.fc.inter_mode_probs[ctx], token);
    self.counts.inter_mode[ctx][symbol] += 1;
  }

  pub fn write_mv<W: Writer>(
    &mut self, w: &mut W, mv: MotionVector, best: MotionVector,
  ) {
    mv::write_mv(w, mv, best, &self.fc.mv_probs, Some(&mut self.counts.mv));
  }
}

/// Symbol reader of one tile, the mirror of [`ContextWriter`].
pub struct ContextReader<'a> {
  pub bc: BlockContext,
  pub fc: &'a FrameContext,
  pub counts: FrameCounts,
}

impl<'a> ContextReader<'a> {
  pub fn new(fc: &'a FrameContext, bc: BlockContext) -> Self {
    ContextReader { bc, fc, counts: FrameCounts::default() }
  }

  pub fn read_segment_id(
    &mut self, r: &mut BoolReader, segmentation: &SegmentationState,
  ) -> u8 {
    read_segment_id(r, segmentation)
  }

  pub fn read_skip(&mut self, r: &mut BoolReader, bo: BlockOffset) -> bool {
    let ctx = self.bc.skip_context(bo);
    let skip = r.read_bool(self.fc.skip_probs[ctx]);
    self.counts.skip[ctx][skip as usize] += 1;
    skip
  }

  pub fn read_is_inter(
    &mut self, r: &mut BoolReader, bo: BlockOffset,
  ) -> bool {
    let ctx = self.bc.intra_inter_context(bo);
    let is_inter = r.read_bool(self.fc.intra_inter_probs[ctx]);
    self.counts.intra_inter[ctx][is_inter as usize] += 1;
    is_inter
  }

  pub fn read_tx_size(
    &mut self, r: &mut BoolReader, bo: BlockOffset, max_tx_size: TxSize,
  ) -> TxSize {
    let ctx = self.bc.tx_size_context(bo, max_tx_size);
    let probs = self.fc.tx_probs.probs(max_tx_size, ctx);
    let counts = self.counts.tx.counts_mut(max_tx_size, ctx);
    let mut tx = 0;
    for node in 0..max_tx_size as usize {
      let bigger = r.read_bool(probs[node]);
      counts[node][bigger as usize] += 1;
      if !bigger {
        break;
      }
      tx += 1;
    }
    TxSize::from_usize(tx).unwrap_or(max_tx_size)
  }

  pub fn read_intra_mode(
    &mut self, r: &mut BoolReader, bsize: BlockSize,
  ) -> PredictionMode {
    let group = bsize.size_group();
    let mode = r.read_tree(INTRA_MODE_TREE, &self.fc.y_mode_probs[group]);
    self.counts.y_mode[group][mode] += 1;
    PredictionMode::from_usize(mode).unwrap_or_default()
  }

  pub fn read_intra_uv_mode(
    &mut self, r: &mut BoolReader, y_mode: PredictionMode,
  ) -> PredictionMode {
    let probs = &self.fc.uv_mode_probs[y_mode as usize];
    let mode = r.read_tree(INTRA_MODE_TREE, probs);
    self.counts.uv_mode[y_mode as usize][mode] += 1;
    PredictionMode::from_usize(mode).unwrap_or_default()
  }

  pub fn read_ref_frame(
    &mut self, r: &mut BoolReader, bo: BlockOffset,
  ) -> RefFrame {
    let ctx = self.bc.ref_context(bo);
    let symbol = r.read_tree(REF_TREE, &self.fc.ref_probs[ctx]);
    self.counts.ref_frame[ctx][symbol] += 1;
    RefFrame::from_usize(symbol + RefFrame::LAST_FRAME as usize)
      .unwrap_or(RefFrame::LAST_FRAME)
  }

  pub fn read_inter_mode(
    &mut self, r: &mut BoolReader, ctx: usize,
  ) -> PredictionMode {
    let symbol =
      r.read_tree(INTER_MODE_TREE, &self.fc.inter_mode_probs[ctx]);
    self.counts.inter_mode[ctx][symbol] += 1;
    PredictionMode::from_usize(symbol + PredictionMode::NEARESTMV as usize)
      .unwrap_or(PredictionMode::ZEROMV)
  }

  pub fn read_mv(
    &mut self, r: &mut BoolReader, best: MotionVector,
  ) -> MotionVector {
    mv::read_mv(r, best, &self.fc.mv_probs, Some(&mut self.counts.mv))
  }
}
