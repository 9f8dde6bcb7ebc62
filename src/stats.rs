// Copyright (c) 2019, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use crate::partition::{BlockDecision, BlockSize, PredictionMode};
use crate::transform::TxSize;
use std::collections::BTreeMap;
use std::ops::{Add, AddAssign};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncoderStats {
  /// Stores count of pixels belonging to each block size in this frame
  pub block_size_counts: BTreeMap<BlockSize, usize>,
  /// Stores count of pixels belonging to skip blocks in this frame
  pub skip_block_count: usize,
  /// Stores count of pixels belonging to each transform size in this frame
  pub tx_size_counts: BTreeMap<TxSize, usize>,
  /// Stores count of pixels belonging to each luma prediction mode
  pub luma_pred_mode_counts: BTreeMap<PredictionMode, usize>,
  /// Stores count of pixels belonging to each chroma prediction mode
  pub chroma_pred_mode_counts: BTreeMap<PredictionMode, usize>,
  /// Number of transform blocks with at least one nonzero coefficient
  pub nonzero_tx_blocks: usize,
  /// Probabilities replaced by the compressed header
  pub prob_updates: usize,
  /// Tiles sent as a copy of the tile above
  pub copy_tiles: usize,
  /// Payload bytes of every tile, in tile order
  pub tile_bytes: Vec<usize>,
}

impl EncoderStats {
  /// Account for one coded block covering `pixels` visible luma pixels.
  pub fn add_block(
    &mut self, bsize: BlockSize, d: &BlockDecision, pixels: usize,
  ) {
    *self.block_size_counts.entry(bsize).or_insert(0) += pixels;
    *self.tx_size_counts.entry(d.tx_size).or_insert(0) += pixels;
    *self.luma_pred_mode_counts.entry(d.mode).or_insert(0) += pixels;
    if !d.is_inter() {
      *self.chroma_pred_mode_counts.entry(d.uv_mode).or_insert(0) += pixels;
    }
    if d.skip {
      self.skip_block_count += pixels;
    }
  }
}

impl Add<&Self> for EncoderStats {
  type Output = Self;

  fn add(self, rhs: &EncoderStats) -> Self::Output {
    let mut lhs = self;
    lhs += rhs;
    lhs
  }
}

impl AddAssign<&Self> for EncoderStats {
  fn add_assign(&mut self, rhs: &EncoderStats) {
    rhs.block_size_counts.iter().for_each(|(&k, &v)| {
      *self.block_size_counts.entry(k).or_insert(0) += v;
    });
    rhs.chroma_pred_mode_counts.iter().for_each(|(&k, &v)| {
      *self.chroma_pred_mode_counts.entry(k).or_insert(0) += v;
    });
    rhs.luma_pred_mode_counts.iter().for_each(|(&k, &v)| {
      *self.luma_pred_mode_counts.entry(k).or_insert(0) += v;
    });
    rhs.tx_size_counts.iter().for_each(|(&k, &v)| {
      *self.tx_size_counts.entry(k).or_insert(0) += v;
    });
    self.skip_block_count += rhs.skip_block_count;
    self.nonzero_tx_blocks += rhs.nonzero_tx_blocks;
    self.prob_updates += rhs.prob_updates;
    self.copy_tiles += rhs.copy_tiles;
    self.tile_bytes.extend_from_slice(&rhs.tile_bytes);
  }
}
