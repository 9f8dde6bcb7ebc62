// Copyright (c) 2001-2016, Alliance for Open Media. All rights reserved
// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Rate-distortion optimization of quantized coefficients.

use crate::quantize::dequantize_value;
use crate::tables::tables;
use crate::token::*;
use crate::transform::TxSize;

/// Rate is in 1/256 bits; the rate term is scaled back by 256.
#[inline]
pub const fn rd_cost(rdmult: i64, rddiv: i64, rate: i64, dist: i64) -> i64 {
  ((128 + rate * rdmult) >> 8) + rddiv * dist
}

/// Fraction dropped by `rd_cost`, used to break ties.
#[inline]
pub const fn rd_trunc(rdmult: i64, rate: i64) -> i64 {
  (128 + rate * rdmult) & 0xFF
}

/// Index of the cheaper of two `(rate, error)` paths, preferring the
/// first.
#[inline]
fn pick(rdmult: i64, rddiv: i64, p0: (i64, i64), p1: (i64, i64)) -> usize {
  let mut c0 = rd_cost(rdmult, rddiv, p0.0, p0.1);
  let mut c1 = rd_cost(rdmult, rddiv, p1.0, p1.1);
  if c0 == c1 {
    c0 = rd_trunc(rdmult, p0.0);
    c1 = rd_trunc(rdmult, p1.0);
  }
  (c1 < c0) as usize
}

/// Rate multiplier of one block.
#[inline]
pub const fn block_rdmult(
  rdmult: i64, block_type: BlockType, is_intra: bool,
) -> i64 {
  let rdmult = rdmult * block_type.rd_mult();
  if is_intra {
    (rdmult * 9) >> 4
  } else {
    rdmult
  }
}

#[inline]
fn error_scale(tx_size: TxSize) -> u32 {
  2 * tx_size.dequant_shift()
}

#[derive(Clone, Copy, Debug)]
struct TrellisState {
  rate: i64,
  error: i64,
  next: usize,
  /// State of `next` continuing the cheapest path.
  next_state: usize,
  token: Token,
  qc: i16,
}

const SENTINEL: TrellisState = TrellisState {
  rate: 0,
  error: 0,
  next: usize::MAX,
  next_state: 0,
  token: Token::EOB_TOKEN,
  qc: 0,
};

/// Block parameters shared by the trellis and the cost model.
#[derive(Clone, Copy, Debug)]
pub struct TrellisBlock {
  pub tx_size: TxSize,
  pub block_type: BlockType,
  /// Sum of the above and left nonzero flags.
  pub ctx: usize,
  pub dequant: [i32; 2],
  pub rdmult: i64,
  pub rddiv: i64,
}

/// Revise the quantized values of one block to minimize
/// `rate * rdmult + 256 * rddiv * distortion`.
///
/// Every nonzero value may keep its magnitude or, when its dequantized
/// magnitude overshoots the source by less than one step, drop by one.
/// The cheapest path is found by a backward pass over two states per
/// nonzero position, then written back into `qcoeffs` and `dqcoeffs`
/// (raster order). Returns the new end of block.
pub fn optimize_b(
  coeffs: &[i32], qcoeffs: &mut [i16], dqcoeffs: &mut [i32], eob: usize,
  b: &TrellisBlock, costs: &TokenCosts,
) -> usize {
  let t = tables();
  let scan = &t.scans[b.tx_size as usize];
  let bands = &t.bands[b.tx_size as usize];
  let area = b.tx_size.area();
  let i0 = b.block_type.first_coeff();
  if eob <= i0 {
    return 0;
  }
  let sh = b.tx_size.dequant_shift();
  let esh = error_scale(b.tx_size);
  let (rdmult, rddiv) = (b.rdmult, b.rddiv);
  let cost = |band: usize, ctx: usize, token: Token| -> i64 {
    i64::from(costs.token_cost(b.tx_size, b.block_type, band, ctx, token))
  };
  let value_bits = |v: i16| i64::from(value_cost(b.tx_size, v));

  let mut tokens = vec![[SENTINEL; 2]; eob + 1];
  let mut next = eob;

  for i in (i0..eob).rev() {
    let rc = scan[i] as usize;
    let x = qcoeffs[rc];

    if x == 0 {
      // No choice here; the successors now follow a ZERO token.
      let band = bands[i + 1] as usize;
      for s in tokens[next].iter_mut() {
        if s.token != Token::EOB_TOKEN {
          s.rate += cost(band, 0, s.token);
          s.token = Token::ZERO_TOKEN;
        }
      }
      continue;
    }

    let dq = b.dequant[(rc != 0) as usize];
    let c = coeffs[rc];
    let [n0, n1] = tokens[next];
    let successor = |token: Token, s: &TrellisState| -> i64 {
      if next < area && token != Token::EOB_TOKEN {
        s.rate + cost(bands[i + 1] as usize, token.class(), s.token)
      } else {
        s.rate
      }
    };

    // Keep the value.
    let t0 = token_for_value(u32::from(x.unsigned_abs())).0;
    let (r0, r1) = (successor(t0, &n0), successor(t0, &n1));
    let best = pick(rdmult, rddiv, (r0, n0.error), (r1, n1.error));
    let dx = i64::from(dqcoeffs[rc]) - i64::from(c);
    let d2 = (dx * dx) << esh;
    tokens[i][0] = TrellisState {
      rate: value_bits(x) + [r0, r1][best],
      error: d2 + [n0.error, n1.error][best],
      next,
      next_state: best,
      token: t0,
      qc: x,
    };

    // Lower the magnitude by one when it overshoots.
    let ax = i64::from(x.unsigned_abs()) * i64::from(dq);
    let ac = i64::from(c.unsigned_abs()) << sh;
    let shortcut = ax > ac && ax < ac + i64::from(dq);
    let (x1, d2) = if shortcut {
      let x1 = x - x.signum();
      let dx = i64::from(dequantize_value(x1, dq, b.tx_size)) - i64::from(c);
      (x1, (dx * dx) << esh)
    } else {
      (x, d2)
    };
    let (t0, t1) = if x1 == 0 {
      let zero_or_eob = |s: &TrellisState| {
        if s.token == Token::EOB_TOKEN {
          Token::EOB_TOKEN
        } else {
          Token::ZERO_TOKEN
        }
      };
      (zero_or_eob(&n0), zero_or_eob(&n1))
    } else {
      let t = token_for_value(u32::from(x1.unsigned_abs())).0;
      (t, t)
    };
    let (r0, r1) = (successor(t0, &n0), successor(t1, &n1));
    let best = pick(rdmult, rddiv, (r0, n0.error), (r1, n1.error));
    tokens[i][1] = TrellisState {
      rate: value_bits(x1) + [r0, r1][best],
      error: d2 + [n0.error, n1.error][best],
      next,
      next_state: best,
      token: [t0, t1][best],
      qc: x1,
    };

    next = i;
  }

  // The head of the path is coded in the block's own context.
  let band = bands[i0] as usize;
  let [h0, h1] = tokens[next];
  let r0 = h0.rate + cost(band, b.ctx, h0.token);
  let r1 = h1.rate + cost(band, b.ctx, h1.token);
  let mut best = pick(rdmult, rddiv, (r0, h0.error), (r1, h1.error));

  let mut final_eob = 0;
  let mut i = next;
  while i < eob {
    let s = tokens[i][best];
    let rc = scan[i] as usize;
    qcoeffs[rc] = s.qc;
    dqcoeffs[rc] =
      dequantize_value(s.qc, b.dequant[(rc != 0) as usize], b.tx_size);
    if s.qc != 0 {
      final_eob = i + 1;
    }
    i = s.next;
    best = s.next_state;
  }
  final_eob
}

/// Rate of the tokens of a block in the `TokenCosts` model, matching what
/// `write_coeffs` codes.
pub fn block_rate(
  qcoeffs: &[i16], eob: usize, b: &TrellisBlock, costs: &TokenCosts,
) -> i64 {
  let t = tables();
  let scan = &t.scans[b.tx_size as usize];
  let bands = &t.bands[b.tx_size as usize];
  let first = b.block_type.first_coeff();
  let eob = if eob > first { eob } else { 0 };

  let mut rate = 0;
  let mut ctx = b.ctx;
  for i in first..b.tx_size.area() {
    let band = bands[i] as usize;
    if i >= eob {
      rate += costs.token_cost(
        b.tx_size,
        b.block_type,
        band,
        ctx,
        Token::EOB_TOKEN,
      );
      break;
    }
    let v = qcoeffs[scan[i] as usize];
    let token = token_for_value(u32::from(v.unsigned_abs())).0;
    rate += costs.token_cost(b.tx_size, b.block_type, band, ctx, token);
    rate += value_cost(b.tx_size, v);
    ctx = token.class();
  }
  i64::from(rate)
}

/// Squared error of the dequantized values, in the units of
/// `optimize_b`.
pub fn block_distortion(
  coeffs: &[i32], dqcoeffs: &[i32], b: &TrellisBlock,
) -> i64 {
  let first = b.block_type.first_coeff();
  let esh = error_scale(b.tx_size);
  let scan = &tables().scans[b.tx_size as usize];
  scan[first..]
    .iter()
    .map(|&rc| {
      let rc = rc as usize;
      let dx = i64::from(dqcoeffs[rc]) - i64::from(coeffs[rc]);
      (dx * dx) << esh
    })
    .sum()
}

/// Joint cost minimized by `optimize_b`.
pub fn block_rd(rate: i64, dist: i64, b: &TrellisBlock) -> i64 {
  rate * b.rdmult + 256 * b.rddiv * dist
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::context::FrameContext;
  use crate::quantize::{QuantDeltas, QuantizationContext};
  use rand::{Rng, SeedableRng};
  use rand_chacha::ChaChaRng;

  fn block(
    qc: &QuantizationContext, tx_size: TxSize, block_type: BlockType,
    ctx: usize,
  ) -> TrellisBlock {
    TrellisBlock {
      tx_size,
      block_type,
      ctx,
      dequant: qc.plane(block_type).dequant,
      rdmult: block_rdmult(qc.rdmult, block_type, true),
      rddiv: qc.rddiv,
    }
  }

  #[test]
  fn cost_ordering_matches_joint_cost() {
    let pairs =
      [((100, 5), (99, 5)), ((10, 7), (10, 7)), ((3, 100), (800, 1))];
    for (p0, p1) in pairs {
      let rdmult = 1234;
      let j0 = p0.0 * rdmult + 256 * p0.1;
      let j1 = p1.0 * rdmult + 256 * p1.1;
      assert_eq!(pick(rdmult, 1, p0, p1), (j1 < j0) as usize);
    }
  }

  #[test]
  fn never_increases_cost() {
    let costs = TokenCosts::new(&FrameContext::default());
    let mut ra = ChaChaRng::from_seed([7; 32]);
    for qindex in [10u8, 40, 90] {
      let qc = QuantizationContext::new(qindex, &QuantDeltas::default());
      for tx_size in TxSize::all() {
        for block_type in [BlockType::Y_WITH_DC, BlockType::Y_NO_DC] {
          let n = tx_size.area();
          let b = block(&qc, tx_size, block_type, ra.gen_range(0..3));
          let coeffs: Vec<i32> = (0..n)
            .map(|i| {
              let scale = 1 + 600 / (1 + i as i32);
              ra.gen_range(-scale..=scale)
            })
            .collect();
          let mut q = vec![0i16; n];
          let mut dq = vec![0i32; n];
          let pq = qc.plane(block_type);
          let first = block_type.first_coeff();
          let eob =
            pq.quantize(&coeffs, &mut q, &mut dq, tx_size, first, n, 0);
          let before = block_rd(
            block_rate(&q, eob, &b, &costs),
            block_distortion(&coeffs, &dq, &b),
            &b,
          );
          let eob = optimize_b(&coeffs, &mut q, &mut dq, eob, &b, &costs);
          let after = block_rd(
            block_rate(&q, eob, &b, &costs),
            block_distortion(&coeffs, &dq, &b),
            &b,
          );
          assert!(
            after <= before,
            "{tx_size:?} q{qindex}: {after} > {before}"
          );

          let scan = &tables().scans[tx_size as usize];
          assert!(scan[eob..].iter().all(|&rc| q[rc as usize] == 0));
          if eob > 0 {
            assert_ne!(q[scan[eob - 1] as usize], 0);
          }
        }
      }
    }
  }

  #[test]
  fn drops_an_isolated_overshooting_one() {
    let costs = TokenCosts::new(&FrameContext::default());
    let qc = QuantizationContext::new(40, &QuantDeltas::default());
    let b = block(&qc, TxSize::TX_4X4, BlockType::Y_WITH_DC, 0);
    let scan = &tables().scans[0];
    let last = scan[15] as usize;

    let mut coeffs = [0i32; 16];
    let mut q = [0i16; 16];
    let mut dq = [0i32; 16];
    coeffs[0] = 370;
    q[0] = 10;
    dq[0] = 370;
    coeffs[last] = 23;
    q[last] = 1;
    dq[last] = 44;

    let eob = optimize_b(&coeffs, &mut q, &mut dq, 16, &b, &costs);
    assert_eq!(eob, 1);
    assert_eq!((q[0], dq[0]), (10, 370));
    assert_eq!((q[last], dq[last]), (0, 0));
  }

  #[test]
  fn empty_blocks_stay_empty() {
    let costs = TokenCosts::new(&FrameContext::default());
    let qc = QuantizationContext::new(40, &QuantDeltas::default());
    let b = block(&qc, TxSize::TX_8X8, BlockType::UV, 1);
    let coeffs = [3i32; 64];
    let mut q = [0i16; 64];
    let mut dq = [0i32; 64];
    assert_eq!(optimize_b(&coeffs, &mut q, &mut dq, 0, &b, &costs), 0);
    let b = block(&qc, TxSize::TX_4X4, BlockType::Y_NO_DC, 1);
    assert_eq!(optimize_b(&coeffs, &mut q, &mut dq, 1, &b, &costs), 0);
  }

  #[test]
  fn intra_blocks_weigh_rate_less() {
    assert_eq!(block_rdmult(100, BlockType::Y2, false), 1600);
    assert_eq!(block_rdmult(100, BlockType::Y2, true), 900);
    assert_eq!(block_rdmult(100, BlockType::UV, false), 200);
  }
}
