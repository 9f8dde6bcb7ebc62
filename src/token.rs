// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

#![allow(non_camel_case_types)]

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::context::*;
use crate::ec::*;
use crate::tables::tables;
use crate::transform::TxSize;

pub const ENTROPY_TOKENS: usize = 12;
pub const ENTROPY_NODES: usize = ENTROPY_TOKENS - 1;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, FromPrimitive)]
pub enum Token {
  ZERO_TOKEN = 0,
  ONE_TOKEN,
  TWO_TOKEN,
  THREE_TOKEN,
  FOUR_TOKEN,
  CAT1_TOKEN,
  CAT2_TOKEN,
  CAT3_TOKEN,
  CAT4_TOKEN,
  CAT5_TOKEN,
  CAT6_TOKEN,
  EOB_TOKEN,
}

use Token::*;

impl Token {
  /// Context a token leaves for the next position.
  #[inline]
  pub const fn class(self) -> usize {
    match self {
      ZERO_TOKEN => 0,
      ONE_TOKEN => 1,
      _ => 2,
    }
  }
}

/// Which coefficients a transform block holds; selects the probability
/// set and the first coded position.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
pub enum BlockType {
  /// Luma whose DC lives in the second order block
  Y_NO_DC = 0,
  /// Second order luma DC block
  Y2 = 1,
  UV = 2,
  Y_WITH_DC = 3,
}

impl BlockType {
  #[inline]
  pub const fn first_coeff(self) -> usize {
    (self as usize == BlockType::Y_NO_DC as usize) as usize
  }

  /// Scale of the trellis rate-distortion multiplier.
  #[inline]
  pub const fn rd_mult(self) -> i64 {
    [4, 16, 2, 4][self as usize]
  }
}

const CAT_BASE: [u32; 6] = [5, 7, 11, 19, 35, 67];

static CAT1_PROBS: [u8; 1] = [159];
static CAT2_PROBS: [u8; 2] = [165, 145];
static CAT3_PROBS: [u8; 3] = [173, 148, 140];
static CAT4_PROBS: [u8; 4] = [176, 155, 140, 135];
static CAT5_PROBS: [u8; 5] = [180, 157, 141, 134, 130];
static CAT6_PROBS: [u8; 14] =
  [254, 254, 254, 252, 249, 243, 230, 196, 177, 153, 140, 133, 130, 129];

/// Extra bit probabilities of a token, MSB first.
pub fn cat_probs(token: Token) -> &'static [u8] {
  match token {
    CAT1_TOKEN => &CAT1_PROBS,
    CAT2_TOKEN => &CAT2_PROBS,
    CAT3_TOKEN => &CAT3_PROBS,
    CAT4_TOKEN => &CAT4_PROBS,
    CAT5_TOKEN => &CAT5_PROBS,
    CAT6_TOKEN => &CAT6_PROBS,
    _ => &[],
  }
}

/// Leading CAT6 extra bits that are always zero for a transform size.
#[inline]
pub const fn cat6_skip_bits(tx_size: TxSize) -> usize {
  3 - tx_size as usize
}

/// Largest magnitude a transform size can code.
#[inline]
pub const fn max_coeff_value(tx_size: TxSize) -> u32 {
  CAT_BASE[5] + (1 << (14 - cat6_skip_bits(tx_size))) - 1
}

/// Token and extra bits of a magnitude.
pub fn token_for_value(v: u32) -> (Token, u32) {
  match v {
    0 => (ZERO_TOKEN, 0),
    1 => (ONE_TOKEN, 0),
    2 => (TWO_TOKEN, 0),
    3 => (THREE_TOKEN, 0),
    4 => (FOUR_TOKEN, 0),
    _ => {
      let cat = CAT_BASE.iter().rposition(|&b| v >= b).unwrap_or(0);
      let token = Token::from_usize(CAT1_TOKEN as usize + cat)
        .unwrap_or(CAT6_TOKEN);
      (token, v - CAT_BASE[cat])
    }
  }
}

#[inline]
fn cat_base(token: Token) -> u32 {
  let t = token as usize;
  if t >= CAT1_TOKEN as usize {
    CAT_BASE[t - CAT1_TOKEN as usize]
  } else {
    t as u32
  }
}

/// Probabilities of every coefficient node of one transform size.
pub type CoefProbs =
  [[[[u8; ENTROPY_NODES]; PREV_COEF_CONTEXTS]; COEF_BANDS]; BLOCK_TYPES];
/// Branch counts of every coefficient node of one transform size.
pub type CoefCounts =
  [[[[[u32; 2]; ENTROPY_NODES]; PREV_COEF_CONTEXTS]; COEF_BANDS]; BLOCK_TYPES];

/// Write the tokens of one transform block.
///
/// `coeffs` holds the quantized values in scan order up to the end of
/// block; `ctx` is the sum of the above and left nonzero flags.
pub fn write_coeffs<W: Writer>(
  w: &mut W, probs: &CoefProbs, mut counts: Option<&mut CoefCounts>,
  coeffs: &[i16], tx_size: TxSize, block_type: BlockType, ctx: usize,
) {
  let t = tables();
  let bands = &t.bands[tx_size as usize];
  let bt = block_type as usize;
  let first = block_type.first_coeff();
  let eob = if coeffs.len() > first { coeffs.len() } else { 0 };
  let skip = cat6_skip_bits(tx_size);

  let mut pt = ctx;
  let mut after_zero = false;
  for i in first..tx_size.area() {
    let band = bands[i] as usize;
    let p = &probs[bt][band][pt];
    if i >= eob {
      debug_assert!(!after_zero);
      w.bool(false, p[0]);
      if let Some(c) = counts.as_deref_mut() {
        c[bt][band][pt][0][0] += 1;
      }
      break;
    }
    let v = coeffs[i];
    let (token, extra) = token_for_value(v.unsigned_abs() as u32);
    let tt = t.coef_tokens[token as usize];
    w.write_token_from(COEF_TREE, p, tt, after_zero as u8);
    if let Some(c) = counts.as_deref_mut() {
      let branches = &mut c[bt][band][pt];
      count_token_branches(COEF_TREE, tt, after_zero as u8, branches);
    }

    let cp = cat_probs(token);
    let cp = if token == CAT6_TOKEN { &cp[skip..] } else { cp };
    for (n, &prob) in cp.iter().enumerate() {
      w.bool((extra >> (cp.len() - 1 - n)) & 1 != 0, prob);
    }
    if v != 0 {
      w.bit((v < 0) as u16);
    }
    pt = token.class();
    after_zero = token == ZERO_TOKEN;
  }
}

/// Read the tokens of one transform block into `coeffs`, in scan order.
/// Returns the end of block.
pub fn read_coeffs(
  r: &mut BoolReader, probs: &CoefProbs, mut counts: Option<&mut CoefCounts>,
  coeffs: &mut Vec<i16>, tx_size: TxSize, block_type: BlockType, ctx: usize,
) -> usize {
  let t = tables();
  let bands = &t.bands[tx_size as usize];
  let bt = block_type as usize;
  let first = block_type.first_coeff();
  let skip = cat6_skip_bits(tx_size);
  coeffs.clear();
  coeffs.resize(first, 0);

  let mut pt = ctx;
  let mut after_zero = false;
  for i in first..tx_size.area() {
    let band = bands[i] as usize;
    let p = &probs[bt][band][pt];
    let start = if after_zero { 2 } else { 0 };
    let token = Token::from_usize(r.read_tree_from(COEF_TREE, p, start))
      .unwrap_or(EOB_TOKEN);
    if let Some(c) = counts.as_deref_mut() {
      count_token_branches(
        COEF_TREE,
        t.coef_tokens[token as usize],
        after_zero as u8,
        &mut c[bt][band][pt],
      );
    }
    if token == EOB_TOKEN {
      break;
    }
    let cp = cat_probs(token);
    let cp = if token == CAT6_TOKEN { &cp[skip..] } else { cp };
    let extra =
      cp.iter().fold(0, |e, &prob| (e << 1) | r.read_bool(prob) as u32);
    let mut v = (cat_base(token) + extra) as i16;
    if v != 0 && r.read_bit() {
      v = -v;
    }
    coeffs.push(v);
    pt = token.class();
    after_zero = token == ZERO_TOKEN;
  }
  if coeffs.len() <= first {
    coeffs.clear();
  }
  coeffs.len()
}

/// Token costs derived from the current coefficient probabilities.
#[derive(Clone)]
pub struct TokenCosts {
  costs: Box<
    [[[[[u32; ENTROPY_TOKENS]; PREV_COEF_CONTEXTS]; COEF_BANDS]; BLOCK_TYPES];
      TxSize::TX_SIZES],
  >,
}

impl TokenCosts {
  pub fn new(fc: &FrameContext) -> Self {
    let t = tables();
    let mut costs = Box::new(
      [[[[[0u32; ENTROPY_TOKENS]; PREV_COEF_CONTEXTS]; COEF_BANDS];
        BLOCK_TYPES]; TxSize::TX_SIZES],
    );
    for (tx, tx_costs) in costs.iter_mut().enumerate() {
      for (bt, type_costs) in tx_costs.iter_mut().enumerate() {
        let first_band = (bt == BlockType::Y_NO_DC as usize) as usize;
        for (band, band_costs) in type_costs.iter_mut().enumerate() {
          for (ctx, ctx_costs) in band_costs.iter_mut().enumerate() {
            let probs = &fc.coef_probs[tx][bt][band][ctx];
            // After a ZERO token the end of block is not coded.
            let skip = (ctx == 0 && band > first_band) as u8;
            for (token, c) in ctx_costs.iter_mut().enumerate() {
              let tt = t.coef_tokens[token];
              let skip = if token == EOB_TOKEN as usize { 0 } else { skip };
              *c = cost_token(COEF_TREE, probs, tt, skip);
            }
          }
        }
      }
    }
    TokenCosts { costs }
  }

  #[inline]
  pub fn token_cost(
    &self, tx_size: TxSize, block_type: BlockType, band: usize, ctx: usize,
    token: Token,
  ) -> u32 {
    self.costs[tx_size as usize][block_type as usize][band][ctx]
      [token as usize]
  }
}

/// Cost of the extra bits and sign of a quantized value.
#[inline]
pub fn value_cost(tx_size: TxSize, v: i16) -> u32 {
  let costs = &tables().value_costs[tx_size as usize];
  costs[(v.unsigned_abs() as usize).min(costs.len() - 1)] as u32
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::context::default_coef_probs;
  use rand::{Rng, SeedableRng};
  use rand_chacha::ChaChaRng;

  fn round_trip(
    coeffs: &[i16], tx_size: TxSize, block_type: BlockType, ctx: usize,
  ) -> Vec<i16> {
    let probs = default_coef_probs();
    let mut w = WriterEncoder::new();
    write_coeffs(&mut w, &probs, None, coeffs, tx_size, block_type, ctx);
    let bytes = w.done().unwrap();
    let mut r = BoolReader::new(&bytes);
    let mut out = Vec::new();
    let eob =
      read_coeffs(&mut r, &probs, None, &mut out, tx_size, block_type, ctx);
    assert_eq!(eob, out.len());
    out
  }

  #[test]
  fn token_values() {
    assert_eq!(token_for_value(4), (FOUR_TOKEN, 0));
    assert_eq!(token_for_value(6), (CAT1_TOKEN, 1));
    assert_eq!(token_for_value(10), (CAT2_TOKEN, 3));
    assert_eq!(token_for_value(66), (CAT5_TOKEN, 31));
    assert_eq!(token_for_value(67), (CAT6_TOKEN, 0));
    assert_eq!(max_coeff_value(TxSize::TX_4X4), 2114);
    assert_eq!(max_coeff_value(TxSize::TX_32X32), 16450);
  }

  #[test]
  fn small_block() {
    let out = round_trip(&[5, 0, -3], TxSize::TX_4X4, BlockType::Y_WITH_DC, 0);
    assert_eq!(out, vec![5, 0, -3]);
  }

  #[test]
  fn empty_blocks() {
    for bt in [BlockType::Y_NO_DC, BlockType::Y2, BlockType::UV] {
      assert!(round_trip(&[], TxSize::TX_4X4, bt, 1).is_empty());
    }
  }

  #[test]
  fn large_values_every_size() {
    let mut ra = ChaChaRng::from_seed([1; 32]);
    for tx_size in TxSize::all() {
      let max = max_coeff_value(tx_size) as i16;
      let n = tx_size.area();
      let mut coeffs: Vec<i16> = (0..n)
        .map(|i| match ra.gen_range(0..6) {
          0 => ra.gen_range(-max..=max),
          1 | 2 => ra.gen_range(-4..=4),
          _ if i % 7 == 0 => ra.gen_range(-70..70),
          _ => 0,
        })
        .collect();
      coeffs[n / 2] = max;
      while coeffs.last() == Some(&0) {
        coeffs.pop();
      }
      let out = round_trip(&coeffs, tx_size, BlockType::Y_WITH_DC, 2);
      assert_eq!(out, coeffs);
    }
  }

  #[test]
  fn skipped_dc_position() {
    let out =
      round_trip(&[0, 0, 7, 0, 1], TxSize::TX_4X4, BlockType::Y_NO_DC, 1);
    assert_eq!(out, vec![0, 0, 7, 0, 1]);
  }

  #[test]
  fn counted_branches_match_cost() {
    let probs = default_coef_probs();
    let coeffs = [3i16, -1, 0, 0, 2, 0, 1];
    let mut counts = [[[[[0u32; 2]; ENTROPY_NODES]; 3]; 8]; 4];
    let mut w = WriterCounter::new();
    write_coeffs(
      &mut w,
      &probs,
      Some(&mut counts),
      &coeffs,
      TxSize::TX_4X4,
      BlockType::UV,
      0,
    );
    let mut bools = 0;
    for band in counts[BlockType::UV as usize].iter() {
      for ctx in band.iter() {
        for node in ctx.iter() {
          bools += node[0] + node[1];
        }
      }
    }
    // Tree decisions plus one sign bit per nonzero value.
    assert_eq!(bools as usize + 4, w.symbols());
  }
}
