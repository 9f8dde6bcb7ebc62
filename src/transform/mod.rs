// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

#![allow(non_camel_case_types)]

pub use self::forward::*;
pub use self::inverse::*;

use num_derive::FromPrimitive;

use crate::serialize::{Deserialize, Serialize};

mod forward;
mod inverse;

#[derive(
  Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, FromPrimitive,
)]
pub enum TxSize {
  TX_4X4,
  TX_8X8,
  TX_16X16,
  TX_32X32,
}

impl TxSize {
  /// Number of square transform sizes.
  pub const TX_SIZES: usize = 4;

  #[inline]
  pub const fn all() -> [TxSize; TxSize::TX_SIZES] {
    use TxSize::*;
    [TX_4X4, TX_8X8, TX_16X16, TX_32X32]
  }

  #[inline]
  pub const fn width_log2(self) -> usize {
    self as usize + 2
  }

  #[inline]
  pub const fn width(self) -> usize {
    1 << self.width_log2()
  }

  #[inline]
  pub const fn height(self) -> usize {
    self.width()
  }

  /// Width in 4x4 units.
  #[inline]
  pub const fn width_4x4(self) -> usize {
    1 << self as usize
  }

  #[inline]
  pub const fn area(self) -> usize {
    1 << (2 * self.width_log2())
  }

  /// Dequantized coefficients of this size are scaled down by this
  /// shift.
  #[inline]
  pub const fn dequant_shift(self) -> u32 {
    (self as usize == TxSize::TX_32X32 as usize) as u32
  }
}

/// How the transform size of a block is chosen.
#[derive(
  Debug,
  Copy,
  Clone,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  FromPrimitive,
  Serialize,
  Deserialize,
)]
pub enum TxMode {
  ONLY_4X4 = 0,
  ALLOW_8X8 = 1,
  ALLOW_16X16 = 2,
  ALLOW_32X32 = 3,
  TX_MODE_SELECT = 4,
}

impl TxMode {
  /// Largest transform size the mode allows.
  #[inline]
  pub const fn max_tx_size(self) -> TxSize {
    match self {
      TxMode::ONLY_4X4 => TxSize::TX_4X4,
      TxMode::ALLOW_8X8 => TxSize::TX_8X8,
      TxMode::ALLOW_16X16 => TxSize::TX_16X16,
      TxMode::ALLOW_32X32 | TxMode::TX_MODE_SELECT => TxSize::TX_32X32,
    }
  }
}

impl Default for TxMode {
  fn default() -> Self {
    TxMode::ALLOW_32X32
  }
}

/// Residual of one transform block in raster order.
pub fn residual(
  src: &[u8], src_stride: usize, pred: &[u8], pred_stride: usize,
  diff: &mut [i16], tx_size: TxSize,
) {
  let n = tx_size.width();
  for y in 0..n {
    let s = &src[y * src_stride..][..n];
    let p = &pred[y * pred_stride..][..n];
    for (x, d) in diff[y * n..][..n].iter_mut().enumerate() {
      *d = s[x] as i16 - p[x] as i16;
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::tables::tables;
  use rand::{Rng, SeedableRng};
  use rand_chacha::ChaChaRng;

  fn round_trip_error(tx_size: TxSize, seed: u8) -> i32 {
    let mut ra = ChaChaRng::from_seed([seed; 32]);
    let n = tx_size.width();
    let pred: Vec<u8> = (0..n * n).map(|_| ra.gen_range(0..=255)).collect();
    let src: Vec<u8> = pred
      .iter()
      .map(|&p| (p as i32 + ra.gen_range(-40..=40)).clamp(0, 255) as u8)
      .collect();
    let mut diff = vec![0i16; n * n];
    residual(&src, n, &pred, n, &mut diff, tx_size);
    let mut coeffs = vec![0i32; n * n];
    forward_transform(&diff, &mut coeffs, tx_size);
    let mut recon = pred.clone();
    inverse_transform_add(&coeffs, &mut recon, n, tx_size);
    recon
      .iter()
      .zip(src.iter())
      .map(|(&r, &s)| (r as i32 - s as i32).abs())
      .max()
      .unwrap_or(0)
  }

  #[test]
  fn lossless_within_rounding() {
    for tx_size in TxSize::all() {
      for seed in 0..4 {
        let err = round_trip_error(tx_size, seed);
        assert!(err <= 1, "{tx_size:?}: {err}");
      }
    }
  }

  #[test]
  fn dc_scale() {
    for tx_size in TxSize::all() {
      let n = tx_size.width();
      let diff = vec![100i16; n * n];
      let mut coeffs = vec![0i32; n * n];
      forward_transform(&diff, &mut coeffs, tx_size);
      // Twice the orthonormal gain, once for 32x32.
      let expected = (200 * n as i32) >> tx_size.dequant_shift();
      assert!((coeffs[0] - expected).abs() <= 2, "{tx_size:?} {}", coeffs[0]);
      assert!(coeffs[1..].iter().all(|&c| c.abs() <= 1));
    }
  }

  #[test]
  fn second_order_round_trip() {
    let dc: [i32; 16] =
      [800, -40, 33, 0, 12, 1020, -1020, 4, 5, 6, -7, 8, 9, 10, 11, 12];
    let mut y2 = dc;
    forward_wht(&mut y2);
    inverse_wht(&mut y2);
    for (a, b) in y2.iter().zip(dc.iter()) {
      assert!((a - b).abs() <= 1, "{a} {b}");
    }
    assert!(tables().dct_basis[0].is_empty());
  }
}
