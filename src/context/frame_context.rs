// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use super::*;
use crate::token::{CoefCounts, CoefProbs};
use crate::transform::TxSize;

/// Transform size probabilities, one set per largest allowed size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxProbs {
  pub p8x8: [[u8; 1]; TX_SIZE_CONTEXTS],
  pub p16x16: [[u8; 2]; TX_SIZE_CONTEXTS],
  pub p32x32: [[u8; 3]; TX_SIZE_CONTEXTS],
}

impl TxProbs {
  /// # Panics
  ///
  /// - If `max_tx_size` is `TX_4X4`, which has nothing to select
  pub fn probs(&self, max_tx_size: TxSize, ctx: usize) -> &[u8] {
    match max_tx_size {
      TxSize::TX_8X8 => &self.p8x8[ctx],
      TxSize::TX_16X16 => &self.p16x16[ctx],
      TxSize::TX_32X32 => &self.p32x32[ctx],
      TxSize::TX_4X4 => unreachable!(),
    }
  }

  pub fn probs_mut(&mut self, max_tx_size: TxSize, ctx: usize) -> &mut [u8] {
    match max_tx_size {
      TxSize::TX_8X8 => &mut self.p8x8[ctx],
      TxSize::TX_16X16 => &mut self.p16x16[ctx],
      TxSize::TX_32X32 => &mut self.p32x32[ctx],
      TxSize::TX_4X4 => &mut [],
    }
  }
}

/// Branch counts mirroring [`TxProbs`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TxCounts {
  pub p8x8: [[[u32; 2]; 1]; TX_SIZE_CONTEXTS],
  pub p16x16: [[[u32; 2]; 2]; TX_SIZE_CONTEXTS],
  pub p32x32: [[[u32; 2]; 3]; TX_SIZE_CONTEXTS],
}

impl TxCounts {
  pub fn counts_mut(
    &mut self, max_tx_size: TxSize, ctx: usize,
  ) -> &mut [[u32; 2]] {
    match max_tx_size {
      TxSize::TX_8X8 => &mut self.p8x8[ctx],
      TxSize::TX_16X16 => &mut self.p16x16[ctx],
      TxSize::TX_32X32 => &mut self.p32x32[ctx],
      TxSize::TX_4X4 => &mut [],
    }
  }

  pub fn counts(&self, max_tx_size: TxSize, ctx: usize) -> &[[u32; 2]] {
    match max_tx_size {
      TxSize::TX_8X8 => &self.p8x8[ctx],
      TxSize::TX_16X16 => &self.p16x16[ctx],
      TxSize::TX_32X32 => &self.p32x32[ctx],
      TxSize::TX_4X4 => &[],
    }
  }
}

/// Every adaptive probability of the bitstream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameContext {
  pub coef_probs: [CoefProbs; TxSize::TX_SIZES],
  pub y_mode_probs: [[u8; INTRA_MODES - 1]; BLOCK_SIZE_GROUPS],
  pub uv_mode_probs: [[u8; INTRA_MODES - 1]; INTRA_MODES],
  pub partition_probs: [[u8; EXT_PARTITION_TYPES - 1]; PARTITION_CONTEXTS],
  pub skip_probs: [u8; SKIP_CONTEXTS],
  pub tx_probs: TxProbs,
  pub intra_inter_probs: [u8; INTRA_INTER_CONTEXTS],
  pub ref_probs: [[u8; REF_FRAMES - 2]; REF_CONTEXTS],
  pub inter_mode_probs: [[u8; INTER_MODES - 1]; INTER_MODE_CONTEXTS],
  pub mv_probs: [[u8; MV_PROBS]; 2],
}

impl Default for FrameContext {
  fn default() -> Self {
    FrameContext {
      coef_probs: [default_coef_probs(); TxSize::TX_SIZES],
      y_mode_probs: DEFAULT_Y_MODE_PROBS,
      uv_mode_probs: DEFAULT_UV_MODE_PROBS,
      partition_probs: DEFAULT_PARTITION_PROBS,
      skip_probs: DEFAULT_SKIP_PROBS,
      tx_probs: DEFAULT_TX_PROBS,
      intra_inter_probs: DEFAULT_INTRA_INTER_PROBS,
      ref_probs: DEFAULT_REF_PROBS,
      inter_mode_probs: DEFAULT_INTER_MODE_PROBS,
      mv_probs: DEFAULT_MV_PROBS,
    }
  }
}

/// Symbol and branch counts gathered while coding a frame.
///
/// Tree coded elements count symbols, binary ones count branches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameCounts {
  pub coef: Box<[CoefCounts; TxSize::TX_SIZES]>,
  pub y_mode: [[u32; INTRA_MODES]; BLOCK_SIZE_GROUPS],
  pub uv_mode: [[u32; INTRA_MODES]; INTRA_MODES],
  pub partition: [[u32; EXT_PARTITION_TYPES]; PARTITION_CONTEXTS],
  pub skip: [[u32; 2]; SKIP_CONTEXTS],
  pub tx: TxCounts,
  pub intra_inter: [[u32; 2]; INTRA_INTER_CONTEXTS],
  pub ref_frame: [[u32; REF_FRAMES - 1]; REF_CONTEXTS],
  pub inter_mode: [[u32; INTER_MODES]; INTER_MODE_CONTEXTS],
  pub mv: [[[u32; 2]; MV_PROBS]; 2],
}

impl Default for FrameCounts {
  fn default() -> Self {
    FrameCounts {
      coef: Box::new(
        [[[[[[0; 2]; crate::token::ENTROPY_NODES]; PREV_COEF_CONTEXTS];
          COEF_BANDS]; BLOCK_TYPES]; TxSize::TX_SIZES],
      ),
      y_mode: [[0; INTRA_MODES]; BLOCK_SIZE_GROUPS],
      uv_mode: [[0; INTRA_MODES]; INTRA_MODES],
      partition: [[0; EXT_PARTITION_TYPES]; PARTITION_CONTEXTS],
      skip: [[0; 2]; SKIP_CONTEXTS],
      tx: TxCounts::default(),
      intra_inter: [[0; 2]; INTRA_INTER_CONTEXTS],
      ref_frame: [[0; REF_FRAMES - 1]; REF_CONTEXTS],
      inter_mode: [[0; INTER_MODES]; INTER_MODE_CONTEXTS],
      mv: [[[0; 2]; MV_PROBS]; 2],
    }
  }
}

fn add_all<'a>(
  dst: impl IntoIterator<Item = &'a mut u32>,
  src: impl IntoIterator<Item = &'a u32>,
) {
  for (d, s) in dst.into_iter().zip(src) {
    *d += *s;
  }
}

impl FrameCounts {
  /// Add the counts of another tile.
  pub fn accumulate(&mut self, other: &FrameCounts) {
    add_all(
      self.coef.iter_mut().flatten().flatten().flatten().flatten().flatten(),
      other.coef.iter().flatten().flatten().flatten().flatten().flatten(),
    );
    add_all(self.y_mode.iter_mut().flatten(), other.y_mode.iter().flatten());
    add_all(
      self.uv_mode.iter_mut().flatten(),
      other.uv_mode.iter().flatten(),
    );
    add_all(
      self.partition.iter_mut().flatten(),
      other.partition.iter().flatten(),
    );
    add_all(self.skip.iter_mut().flatten(), other.skip.iter().flatten());
    add_all(
      self.tx.p8x8.iter_mut().flatten().flatten(),
      other.tx.p8x8.iter().flatten().flatten(),
    );
    add_all(
      self.tx.p16x16.iter_mut().flatten().flatten(),
      other.tx.p16x16.iter().flatten().flatten(),
    );
    add_all(
      self.tx.p32x32.iter_mut().flatten().flatten(),
      other.tx.p32x32.iter().flatten().flatten(),
    );
    add_all(
      self.intra_inter.iter_mut().flatten(),
      other.intra_inter.iter().flatten(),
    );
    add_all(
      self.ref_frame.iter_mut().flatten(),
      other.ref_frame.iter().flatten(),
    );
    add_all(
      self.inter_mode.iter_mut().flatten(),
      other.inter_mode.iter().flatten(),
    );
    add_all(
      self.mv.iter_mut().flatten().flatten(),
      other.mv.iter().flatten().flatten(),
    );
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn defaults_are_valid_probabilities() {
    let fc = FrameContext::default();
    let all = fc
      .coef_probs
      .iter()
      .flatten()
      .flatten()
      .flatten()
      .flatten()
      .chain(fc.y_mode_probs.iter().flatten())
      .chain(fc.uv_mode_probs.iter().flatten())
      .chain(fc.partition_probs.iter().flatten())
      .chain(fc.mv_probs.iter().flatten());
    for &p in all {
      assert!(p > 0);
    }
  }

  #[test]
  fn accumulate_counts() {
    let mut a = FrameCounts::default();
    let mut b = FrameCounts::default();
    a.skip[1] = [3, 4];
    b.skip[1] = [1, 1];
    b.coef[2][1][3][2][5] = [7, 0];
    b.tx.p32x32[1][2] = [2, 9];
    a.accumulate(&b);
    assert_eq!(a.skip[1], [4, 5]);
    assert_eq!(a.coef[2][1][3][2][5], [7, 0]);
    assert_eq!(a.tx.p32x32[1][2], [2, 9]);
  }
}
