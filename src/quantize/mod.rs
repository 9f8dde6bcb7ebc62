// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

#![allow(non_upper_case_globals)]

mod tables;

pub use tables::*;

use crate::partition::{BlockDecision, PredictionMode};
use crate::serialize::{Deserialize, Serialize};
use crate::tables::tables;
use crate::token::{max_coeff_value, BlockType};
use crate::transform::TxSize;

/// Zero-bin width in 1/128 of the quantizer, for low and high indices.
const ZBIN_FACTOR_LOW_Q: i32 = 84;
const ZBIN_FACTOR: i32 = 80;
/// Quantizer index from which `ZBIN_FACTOR` applies.
const ZBIN_FACTOR_Q_SWITCH: u8 = 48;
const ROUNDING_FACTOR: i32 = 48;

/// Rate multiplier constant, in tenths, applied to the squared DC
/// quantizer.
const RDCONST_TENTHS: i64 = 28;

/// Signed offsets of the per-plane quantizer indices from the base index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantDeltas {
  pub y1_dc: i8,
  pub y2_dc: i8,
  pub y2_ac: i8,
  pub uv_dc: i8,
  pub uv_ac: i8,
}

impl QuantDeltas {
  pub fn is_zero(&self) -> bool {
    *self == QuantDeltas::default()
  }
}

#[inline]
fn qindex_with_delta(qindex: u8, delta: i32) -> usize {
  (i32::from(qindex) + delta).clamp(MINQ as i32, MAXQ as i32) as usize
}

pub fn dc_q(qindex: u8, delta: i32) -> i32 {
  i32::from(dc_qlookup[qindex_with_delta(qindex, delta)])
}

pub fn ac_q(qindex: u8, delta: i32) -> i32 {
  i32::from(ac_qlookup[qindex_with_delta(qindex, delta)])
}

/// Multiplier and shift replacing the division by `d`:
/// `((((x * quant) >> 16) + x) * shift) >> 16 == x / d` for the
/// coefficient range.
pub fn invert_quant(d: i32) -> (i32, i32) {
  debug_assert!(d > 0);
  let l = 31 - (d as u32).leading_zeros() as i32;
  let m = 1 + (1i64 << (16 + l)) / i64::from(d);
  ((m - (1 << 16)) as i32, 1 << (16 - l))
}

/// Quantizer of one plane type at one quantizer index. Index 0 of each
/// pair is used for the DC position, index 1 for every other position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaneQuantizer {
  pub dequant: [i32; 2],
  quant: [i32; 2],
  quant_shift: [i32; 2],
  zbin: [i32; 2],
  round: [i32; 2],
  zrun_zbin_boost: [i32; 16],
}

impl PlaneQuantizer {
  pub fn new(dc: i32, ac: i32, qindex: u8) -> Self {
    let zbin_factor = if qindex < ZBIN_FACTOR_Q_SWITCH {
      ZBIN_FACTOR_LOW_Q
    } else {
      ZBIN_FACTOR
    };
    let dequant = [dc, ac];
    let (q0, s0) = invert_quant(dc);
    let (q1, s1) = invert_quant(ac);
    let mut zrun_zbin_boost = [0; 16];
    for (b, &boost) in zrun_zbin_boost.iter_mut().zip(zbin_run_boost.iter()) {
      *b = (ac * i32::from(boost)) >> 7;
    }
    PlaneQuantizer {
      dequant,
      quant: [q0, q1],
      quant_shift: [s0, s1],
      zbin: dequant.map(|q| ((zbin_factor * q) + 64) >> 7),
      round: dequant.map(|q| (ROUNDING_FACTOR * q) >> 7),
      zrun_zbin_boost,
    }
  }

  /// Additional zero-bin of a block, from the frame's zero-bin over-quant
  /// and the block's mode boost.
  #[inline]
  pub fn zbin_extra(&self, zbin_over_quant: i32, mode_boost: i32) -> i32 {
    (self.dequant[1] * (zbin_over_quant + mode_boost)) >> 7
  }

  /// Quantize `coeffs` (raster order) into `qcoeffs` and `dqcoeffs`.
  ///
  /// Positions are visited in scan order from `first` up to `eob_max`.
  /// Returns the end of block: one past the scan index of the last
  /// nonzero value, 0 when every value is zero.
  pub fn quantize(
    &self, coeffs: &[i32], qcoeffs: &mut [i16], dqcoeffs: &mut [i32],
    tx_size: TxSize, first: usize, eob_max: usize, zbin_extra: i32,
  ) -> usize {
    let area = tx_size.area();
    let scan = &tables().scans[tx_size as usize];
    let is_32x32 = tx_size == TxSize::TX_32X32;
    let final_shift = if is_32x32 { 15 } else { 16 };
    let max = i64::from(max_coeff_value(tx_size));

    qcoeffs[..area].fill(0);
    dqcoeffs[..area].fill(0);

    let mut eob = 0;
    let mut run = 0;
    for (i, &rc) in scan.iter().enumerate().take(eob_max.min(area)).skip(first)
    {
      let rc = rc as usize;
      let c = (rc != 0) as usize;
      let (zbin, round) = if is_32x32 {
        ((self.zbin[c] + 1) >> 1, (self.round[c] + 1) >> 1)
      } else {
        (self.zbin[c], self.round[c])
      };
      let zbin = zbin + self.zrun_zbin_boost[run.min(15)] + zbin_extra;
      run += 1;

      let z = coeffs[rc];
      let x = i64::from(z.unsigned_abs());
      if x < i64::from(zbin) {
        continue;
      }
      let x = x + i64::from(round);
      let y = ((((x * i64::from(self.quant[c])) >> 16) + x)
        * i64::from(self.quant_shift[c]))
        >> final_shift;
      let y = y.min(max);
      if y != 0 {
        let q = (if z < 0 { -y } else { y }) as i16;
        qcoeffs[rc] = q;
        dqcoeffs[rc] = dequantize_value(q, self.dequant[c], tx_size);
        eob = i + 1;
        run = 0;
      }
    }
    eob
  }
}

#[inline]
pub fn dequantize_value(q: i16, dequant: i32, tx_size: TxSize) -> i32 {
  let v = i32::from(q) * dequant;
  if tx_size == TxSize::TX_32X32 {
    v / 2
  } else {
    v
  }
}

/// Dequantize a block of quantized values in raster order.
pub fn dequantize(
  qcoeffs: &[i16], dqcoeffs: &mut [i32], dequant: [i32; 2], tx_size: TxSize,
) {
  let area = tx_size.area();
  for (i, (d, &q)) in
    dqcoeffs[..area].iter_mut().zip(&qcoeffs[..area]).enumerate()
  {
    *d = dequantize_value(q, dequant[(i != 0) as usize], tx_size);
  }
}

/// Zero-bin boost of a prediction mode, in 1/128 of the AC quantizer.
pub const fn mode_zbin_boost(d: &BlockDecision) -> i32 {
  match d.mode {
    PredictionMode::ZEROMV => 12,
    PredictionMode::NEARESTMV
    | PredictionMode::NEARMV
    | PredictionMode::NEWMV => 4,
    _ => 0,
  }
}

/// Every quantizer of one quantizer index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuantizationContext {
  pub qindex: u8,
  pub y1: PlaneQuantizer,
  pub y2: PlaneQuantizer,
  pub uv: PlaneQuantizer,
  /// Rate multiplier of the trellis.
  pub rdmult: i64,
  pub rddiv: i64,
}

impl QuantizationContext {
  pub fn new(qindex: u8, deltas: &QuantDeltas) -> Self {
    let y1_dc = dc_q(qindex, deltas.y1_dc.into());
    let y2_dc = dc_q(qindex, deltas.y2_dc.into()) * 2;
    let y2_ac = (ac_q(qindex, deltas.y2_ac.into()) * 155 / 100).max(8);
    let uv_dc = dc_q(qindex, deltas.uv_dc.into()).min(132);
    let q = i64::from(dc_q(qindex, 0));

    QuantizationContext {
      qindex,
      y1: PlaneQuantizer::new(y1_dc, ac_q(qindex, 0), qindex),
      y2: PlaneQuantizer::new(y2_dc, y2_ac, qindex),
      uv: PlaneQuantizer::new(
        uv_dc,
        ac_q(qindex, deltas.uv_ac.into()),
        qindex,
      ),
      rdmult: (q * q * RDCONST_TENTHS / 10).max(1),
      rddiv: 1,
    }
  }

  #[inline]
  pub const fn plane(&self, block_type: BlockType) -> &PlaneQuantizer {
    match block_type {
      BlockType::Y2 => &self.y2,
      BlockType::UV => &self.uv,
      BlockType::Y_NO_DC | BlockType::Y_WITH_DC => &self.y1,
    }
  }

  /// Zero-bin addition of a block of `block_type` coded with `d`.
  pub fn zbin_extra(
    &self, block_type: BlockType, zbin_over_quant: i32, d: &BlockDecision,
  ) -> i32 {
    let zoq = if block_type == BlockType::Y2 {
      zbin_over_quant / 2
    } else {
      zbin_over_quant
    };
    self.plane(block_type).zbin_extra(zoq, mode_zbin_boost(d))
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::mv::MotionVector;
  use crate::partition::RefFrame;

  #[test]
  fn inverted_quant_divides() {
    for d in 4..700 {
      let (quant, shift) = invert_quant(d);
      for x in 0..16384i64 {
        let y = ((((x * quant as i64) >> 16) + x) * shift as i64) >> 16;
        assert_eq!(y, x / d as i64, "{x} / {d}");
      }
    }
  }

  #[test]
  fn plane_quantizers() {
    let qc = QuantizationContext::new(40, &QuantDeltas::default());
    assert_eq!(qc.y1.dequant, [37, 44]);
    assert_eq!(qc.y2.dequant, [74, 68]);
    assert_eq!(qc.uv.dequant, [37, 44]);
    let qc = QuantizationContext::new(127, &QuantDeltas::default());
    assert_eq!(qc.uv.dequant[0], 132);
    let qc = QuantizationContext::new(0, &QuantDeltas::default());
    assert_eq!(qc.y2.dequant[1], 8);
  }

  #[test]
  fn small_block_at_q40() {
    let qc = QuantizationContext::new(40, &QuantDeltas::default());
    let pq = qc.plane(BlockType::Y_WITH_DC);
    // Raster positions 0, 1 and 4 are the first three of the scan.
    let mut coeffs = [0i32; 16];
    coeffs[0] = 5 * 37;
    coeffs[4] = -3 * 44;
    let mut q = [0i16; 16];
    let mut dq = [0i32; 16];
    let eob = pq.quantize(&coeffs, &mut q, &mut dq, TxSize::TX_4X4, 0, 16, 0);
    assert_eq!(eob, 3);
    assert_eq!((q[0], q[1], q[4]), (5, 0, -3));
    assert_eq!((dq[0], dq[4]), (185, -132));
  }

  #[test]
  fn zero_bin_grows_with_extra() {
    let qc = QuantizationContext::new(60, &QuantDeltas::default());
    let pq = qc.plane(BlockType::UV);
    let coeffs: Vec<i32> = (0..64).map(|i| (i * 37 % 200) - 100).collect();
    let mut q = [0i16; 64];
    let mut dq = [0i32; 64];
    let mut last = usize::MAX;
    let mut last_eob = usize::MAX;
    for zoq in [0, 16, 32, 64, 128] {
      let eob = pq.quantize(
        &coeffs,
        &mut q,
        &mut dq,
        TxSize::TX_8X8,
        0,
        64,
        pq.zbin_extra(zoq, 0),
      );
      let nonzero = q.iter().filter(|&&v| v != 0).count();
      assert!(nonzero <= last);
      assert!(eob <= last_eob, "zbin over quant {zoq}: eob {eob}");
      last = nonzero;
      last_eob = eob;
    }
    assert!(last_eob < 64);
  }

  #[test]
  fn eob_limit_and_first_position() {
    let qc = QuantizationContext::new(10, &QuantDeltas::default());
    let pq = qc.plane(BlockType::Y_NO_DC);
    let coeffs = [500i32; 16];
    let mut q = [0i16; 16];
    let mut dq = [0i32; 16];
    let eob = pq.quantize(&coeffs, &mut q, &mut dq, TxSize::TX_4X4, 1, 5, 0);
    assert_eq!(eob, 5);
    assert_eq!(q[0], 0);
    let scan = &tables().scans[0];
    assert!(scan[5..].iter().all(|&rc| q[rc as usize] == 0));
  }

  #[test]
  fn large_block_halves_dequantization() {
    let qc = QuantizationContext::new(30, &QuantDeltas::default());
    let pq = qc.plane(BlockType::Y_WITH_DC);
    let mut coeffs = vec![0i32; 1024];
    coeffs[0] = 1000;
    let mut q = vec![0i16; 1024];
    let mut dq = vec![0i32; 1024];
    let eob =
      pq.quantize(&coeffs, &mut q, &mut dq, TxSize::TX_32X32, 0, 1024, 0);
    assert_eq!(eob, 1);
    assert_eq!(dq[0], i32::from(q[0]) * pq.dequant[0] / 2);
    assert!((dq[0] - 1000).abs() <= pq.dequant[0] / 2);
  }

  #[test]
  fn mode_boosts() {
    let tx = TxSize::TX_4X4;
    let intra = BlockDecision::intra(PredictionMode::DC_PRED, tx);
    let zero = BlockDecision::inter(
      PredictionMode::ZEROMV,
      RefFrame::LAST_FRAME,
      MotionVector::zero(),
      tx,
    );
    assert_eq!(mode_zbin_boost(&intra), 0);
    assert_eq!(mode_zbin_boost(&zero), 12);
    let qc = QuantizationContext::new(50, &QuantDeltas::default());
    assert_eq!(
      qc.zbin_extra(BlockType::Y2, 20, &intra),
      qc.y2.zbin_extra(10, 0)
    );
  }
}
