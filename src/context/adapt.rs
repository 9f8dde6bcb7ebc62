// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Forward probability updates and backward adaptation.

use super::*;
use crate::ec::*;
use crate::tables::tables;
use crate::token::ENTROPY_NODES;
use crate::transform::TxSize;

/// Meta probability of the sub-exponential update flags.
pub const DIFF_UPDATE_PROB: u8 = 252;
/// Meta probability of the literal coefficient update flags.
pub const COEF_UPDATE_PROB: u8 = 252;

pub const COEF_COUNT_SAT: u32 = 24;
pub const COEF_MAX_UPDATE_FACTOR: u32 = 112;
pub const COEF_MAX_UPDATE_FACTOR_AFTER_KEY: u32 = 128;
pub const MODE_MV_COUNT_SAT: u32 = 20;
pub const MODE_MV_MAX_UPDATE_FACTOR: u32 = 128;

const MAX_PROB: i32 = 255;

/// How a new probability value is sent after its update flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(
  feature = "serialize",
  derive(serde::Serialize, serde::Deserialize)
)]
pub enum UpdateCoding {
  /// 8-bit literal
  Literal,
  /// 7-bit literal of `prob >> 1`, 0 standing for 1
  MvLiteral,
  /// Sub-exponential code of the remapped difference
  SubExp,
}

#[inline]
pub fn clip_prob(p: i64) -> u8 {
  p.clamp(1, 255) as u8
}

/// Probability of a zero given branch counts, 128 without counts.
#[inline]
pub fn get_binary_prob(n0: u32, n1: u32) -> u8 {
  let den = n0 as u64 + n1 as u64;
  if den == 0 {
    return 128;
  }
  clip_prob(((n0 as u64 * 256 + (den >> 1)) / den) as i64)
}

#[inline]
fn weighted_prob(a: u8, b: u8, factor: u32) -> u8 {
  let v = a as u32 * (256 - factor) + b as u32 * factor;
  clip_prob(((v + 128) >> 8) as i64)
}

/// Blend `pre_prob` towards the probability observed in `ct`, weighting
/// the observation by how many events were seen.
#[inline]
pub fn merge_probs(
  pre_prob: u8, ct: [u32; 2], count_sat: u32, max_update_factor: u32,
) -> u8 {
  let den = ct[0] + ct[1];
  if den == 0 {
    return pre_prob;
  }
  let prob = get_binary_prob(ct[0], ct[1]);
  let count = den.min(count_sat);
  let factor = max_update_factor * count / count_sat;
  weighted_prob(pre_prob, prob, factor)
}

/// Adapt every node of `tree` from symbol counts.
pub fn tree_merge_probs(
  tree: &[i8], pre_probs: &[u8], leaf_counts: &[u32], probs: &mut [u8],
  count_sat: u32, max_update_factor: u32,
) {
  let branch = tree_probs_from_distribution(tree, leaf_counts);
  for ((p, &pre), ct) in probs.iter_mut().zip(pre_probs).zip(branch) {
    *p = merge_probs(pre, ct, count_sat, max_update_factor);
  }
}

fn recenter_nonneg(v: i32, m: i32) -> i32 {
  if v > (m << 1) {
    v
  } else if v >= m {
    (v - m) << 1
  } else {
    ((m - v) << 1) - 1
  }
}

fn inv_recenter_nonneg(v: i32, m: i32) -> i32 {
  if v > 2 * m {
    v
  } else if v & 1 != 0 {
    m - ((v + 1) >> 1)
  } else {
    m + (v >> 1)
  }
}

/// Index of `new` relative to `old` in the sub-exponential alphabet.
/// `new` must differ from `old`.
pub fn remap_prob(new: u8, old: u8) -> usize {
  debug_assert_ne!(new, old);
  let v = new as i32 - 1;
  let m = old as i32 - 1;
  let r = if (m << 1) <= MAX_PROB {
    recenter_nonneg(v, m)
  } else {
    recenter_nonneg(MAX_PROB - 1 - v, MAX_PROB - 1 - m)
  };
  tables().map_table[(r - 1) as usize] as usize
}

pub fn inv_remap_prob(idx: usize, old: u8) -> u8 {
  let v = tables().inv_map_table[idx.min(MAP_TABLE_LAST)] as i32;
  let m = old as i32 - 1;
  let p = if (m << 1) <= MAX_PROB {
    1 + inv_recenter_nonneg(v, m)
  } else {
    MAX_PROB - inv_recenter_nonneg(v, MAX_PROB - 1 - m)
  };
  clip_prob(p as i64)
}

const MAP_TABLE_LAST: usize = crate::tables::MAP_TABLE_SIZE - 1;

const UNIFORM_BITS: u8 = 8;
const UNIFORM_M: u32 = (1 << UNIFORM_BITS) - 191;

pub fn write_term_subexp<W: Writer>(w: &mut W, word: u32) {
  if word < 16 {
    w.bit(0);
    w.literal(4, word);
  } else if word < 32 {
    w.bit(1);
    w.bit(0);
    w.literal(4, word - 16);
  } else if word < 64 {
    w.literal(3, 0b110);
    w.literal(5, word - 32);
  } else {
    w.literal(3, 0b111);
    let v = word - 64;
    if v < UNIFORM_M {
      w.literal(UNIFORM_BITS - 1, v);
    } else {
      w.literal(UNIFORM_BITS - 1, UNIFORM_M + ((v - UNIFORM_M) >> 1));
      w.bit(((v - UNIFORM_M) & 1) as u16);
    }
  }
}

pub fn read_term_subexp(r: &mut BoolReader) -> u32 {
  if !r.read_bit() {
    return r.read_literal(4);
  }
  if !r.read_bit() {
    return r.read_literal(4) + 16;
  }
  if !r.read_bit() {
    return r.read_literal(5) + 32;
  }
  let v = r.read_literal(UNIFORM_BITS - 1);
  let v = if v < UNIFORM_M {
    v
  } else {
    (v << 1) - UNIFORM_M + r.read_bit() as u32
  };
  v + 64
}

/// Length in bits of the sub-exponential code of `word`.
pub const fn term_subexp_bits(word: u32) -> u32 {
  if word < 16 {
    5
  } else if word < 32 {
    6
  } else if word < 64 {
    8
  } else if word - 64 < UNIFORM_M {
    3 + UNIFORM_BITS as u32 - 1
  } else {
    3 + UNIFORM_BITS as u32
  }
}

impl UpdateCoding {
  /// The value an update towards `target` would actually install.
  #[inline]
  pub fn representable(self, target: u8) -> u8 {
    match self {
      UpdateCoding::MvLiteral => (target >> 1 << 1).max(1),
      _ => target,
    }
  }

  /// Cost in 1/256 bits of the value after the update flag.
  pub fn value_cost(self, new: u8, old: u8) -> u32 {
    match self {
      UpdateCoding::Literal => cost_literal(8),
      UpdateCoding::MvLiteral => cost_literal(7),
      UpdateCoding::SubExp => {
        cost_literal(term_subexp_bits(remap_prob(new, old) as u32))
      }
    }
  }

  pub fn write_value<W: Writer>(self, w: &mut W, new: u8, old: u8) {
    match self {
      UpdateCoding::Literal => w.literal(8, new as u32),
      UpdateCoding::MvLiteral => w.literal(7, new as u32 >> 1),
      UpdateCoding::SubExp => {
        write_term_subexp(w, remap_prob(new, old) as u32)
      }
    }
  }

  pub fn read_value(self, r: &mut BoolReader, old: u8) -> u8 {
    match self {
      UpdateCoding::Literal => clip_prob(r.read_literal(8) as i64),
      UpdateCoding::MvLiteral => {
        let x = r.read_literal(7) as u8;
        if x != 0 {
          x << 1
        } else {
          1
        }
      }
      UpdateCoding::SubExp => {
        inv_remap_prob(read_term_subexp(r) as usize, old)
      }
    }
  }
}

/// Bits saved, in 1/256 bits, by replacing `old` with the probability
/// observed in `ct`, net of the cost of sending the update. Returns the
/// savings together with the new probability.
pub fn update_savings(
  old: u8, ct: [u32; 2], coding: UpdateCoding, meta: u8,
) -> (i64, u8) {
  let new = coding.representable(get_binary_prob(ct[0], ct[1]));
  let flag_cost = cost_one(meta) as i64 - cost_zero(meta) as i64;
  if new == old {
    return (-flag_cost, old);
  }
  let cost = |p: u8| {
    ct[0] as i64 * cost_zero(p) as i64 + ct[1] as i64 * cost_one(p) as i64
  };
  let update_cost = flag_cost + coding.value_cost(new, old) as i64;
  (cost(old) - cost(new) - update_cost, new)
}

/// Send an update of `prob` when it pays for itself. Returns whether it
/// was updated.
pub fn write_prob_update<W: Writer>(
  w: &mut W, prob: &mut u8, ct: [u32; 2], coding: UpdateCoding, meta: u8,
) -> bool {
  let (savings, new) = update_savings(*prob, ct, coding, meta);
  let update = savings > 0;
  w.bool(update, meta);
  if update {
    coding.write_value(w, new, *prob);
    *prob = new;
  }
  update
}

pub fn read_prob_update(
  r: &mut BoolReader, prob: &mut u8, coding: UpdateCoding, meta: u8,
) -> bool {
  let update = r.read_bool(meta);
  if update {
    *prob = coding.read_value(r, *prob);
  }
  update
}

/// Whether the coefficient updates of one transform size are worth their
/// group flag: the summed positive savings must exceed the cost of a zero
/// flag for every node of the group.
pub fn coef_group_pays(
  probs: &crate::token::CoefProbs, counts: &crate::token::CoefCounts,
  coding: UpdateCoding, meta: u8,
) -> bool {
  let mut savings = 0i64;
  let mut nodes = 0i64;
  let counts = counts.iter().flatten().flatten();
  for (p, c) in probs.iter().flatten().flatten().zip(counts) {
    for node in 0..ENTROPY_NODES {
      let (s, _) = update_savings(p[node], c[node], coding, meta);
      savings += s.max(0);
      nodes += 1;
    }
  }
  savings > nodes * cost_zero(meta) as i64
}

/// Adapt the coefficient probabilities of a frame.
pub fn adapt_coef_probs(
  pre_fc: &FrameContext, counts: &FrameCounts, fc: &mut FrameContext,
  after_key_frame: bool,
) {
  let factor = if after_key_frame {
    COEF_MAX_UPDATE_FACTOR_AFTER_KEY
  } else {
    COEF_MAX_UPDATE_FACTOR
  };
  for tx in 0..TxSize::TX_SIZES {
    let pre = pre_fc.coef_probs[tx].iter().flatten().flatten();
    let cts = counts.coef[tx].iter().flatten().flatten();
    let dst = fc.coef_probs[tx].iter_mut().flatten().flatten();
    for ((p, pre), ct) in dst.zip(pre).zip(cts) {
      for node in 0..ENTROPY_NODES {
        p[node] = merge_probs(pre[node], ct[node], COEF_COUNT_SAT, factor);
      }
    }
  }
}

fn merge_binary(pre: &[u8], counts: &[[u32; 2]], dst: &mut [u8]) {
  for ((p, &pre), &ct) in dst.iter_mut().zip(pre).zip(counts) {
    *p = merge_probs(pre, ct, MODE_MV_COUNT_SAT, MODE_MV_MAX_UPDATE_FACTOR);
  }
}

/// Adapt mode, partition, skip, transform size, reference and motion
/// vector probabilities of a frame.
pub fn adapt_mode_probs(
  pre_fc: &FrameContext, counts: &FrameCounts, fc: &mut FrameContext,
  ext_partition: bool,
) {
  let sat = MODE_MV_COUNT_SAT;
  let factor = MODE_MV_MAX_UPDATE_FACTOR;

  for (i, dst) in fc.y_mode_probs.iter_mut().enumerate() {
    tree_merge_probs(
      INTRA_MODE_TREE,
      &pre_fc.y_mode_probs[i],
      &counts.y_mode[i],
      dst,
      sat,
      factor,
    );
  }
  for (i, dst) in fc.uv_mode_probs.iter_mut().enumerate() {
    tree_merge_probs(
      INTRA_MODE_TREE,
      &pre_fc.uv_mode_probs[i],
      &counts.uv_mode[i],
      dst,
      sat,
      factor,
    );
  }
  let (tree, symbols) = if ext_partition {
    (EXT_PARTITION_TREE, EXT_PARTITION_TYPES)
  } else {
    (PARTITION_TREE, PARTITION_TYPES)
  };
  for (i, dst) in fc.partition_probs.iter_mut().enumerate() {
    tree_merge_probs(
      tree,
      &pre_fc.partition_probs[i],
      &counts.partition[i][..symbols],
      dst,
      sat,
      factor,
    );
  }
  for (i, dst) in fc.inter_mode_probs.iter_mut().enumerate() {
    tree_merge_probs(
      INTER_MODE_TREE,
      &pre_fc.inter_mode_probs[i],
      &counts.inter_mode[i],
      dst,
      sat,
      factor,
    );
  }
  for (i, dst) in fc.ref_probs.iter_mut().enumerate() {
    tree_merge_probs(
      REF_TREE,
      &pre_fc.ref_probs[i],
      &counts.ref_frame[i],
      dst,
      sat,
      factor,
    );
  }

  merge_binary(&pre_fc.skip_probs, &counts.skip, &mut fc.skip_probs);
  merge_binary(
    &pre_fc.intra_inter_probs,
    &counts.intra_inter,
    &mut fc.intra_inter_probs,
  );
  for ctx in 0..TX_SIZE_CONTEXTS {
    for max_tx in [TxSize::TX_8X8, TxSize::TX_16X16, TxSize::TX_32X32] {
      merge_binary(
        pre_fc.tx_probs.probs(max_tx, ctx),
        counts.tx.counts(max_tx, ctx),
        fc.tx_probs.probs_mut(max_tx, ctx),
      );
    }
  }
  for comp in 0..2 {
    merge_binary(
      &pre_fc.mv_probs[comp],
      &counts.mv[comp],
      &mut fc.mv_probs[comp],
    );
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn binary_probs() {
    assert_eq!(get_binary_prob(0, 0), 128);
    assert_eq!(get_binary_prob(100, 4), 246);
    assert_eq!(get_binary_prob(0, 10), 1);
    assert_eq!(get_binary_prob(10, 0), 255);
  }

  #[test]
  fn merge_moves_towards_counts() {
    let merged = merge_probs(128, [100, 4], MODE_MV_COUNT_SAT, 128);
    assert!(merged > 128 && merged <= 246);
    assert!(246 - merged < 246 - 128);
    assert_eq!(merge_probs(77, [0, 0], COEF_COUNT_SAT, 112), 77);
    // A single event moves the probability only a little.
    let one = merge_probs(128, [1, 0], COEF_COUNT_SAT, 112);
    assert!(one > 128 && one < 140);
  }

  #[test]
  fn savings_of_skewed_counts() {
    for coding in
      [UpdateCoding::Literal, UpdateCoding::MvLiteral, UpdateCoding::SubExp]
    {
      let (savings, new) = update_savings(128, [100, 4], coding, 252);
      assert!(savings > 0, "{coding:?}");
      assert!(new >= 245);
    }
    let (savings, _) = update_savings(128, [1, 1], UpdateCoding::SubExp, 252);
    assert!(savings < 0);
  }

  #[test]
  fn remap_round_trip() {
    for old in 1..=255u8 {
      for new in 1..=255u8 {
        if new != old {
          let idx = remap_prob(new, old);
          assert!(idx < crate::tables::MAP_TABLE_SIZE);
          assert_eq!(inv_remap_prob(idx, old), new, "{old} -> {new}");
        }
      }
    }
  }

  #[test]
  fn subexp_codes() {
    for word in 0..254u32 {
      let mut w = WriterEncoder::new();
      write_term_subexp(&mut w, word);
      let mut c = WriterCounter::new();
      write_term_subexp(&mut c, word);
      assert_eq!(c.symbols() as u32, term_subexp_bits(word));
      let bytes = w.done().unwrap();
      let mut r = BoolReader::new(&bytes);
      assert_eq!(read_term_subexp(&mut r), word);
    }
  }

  #[test]
  fn prob_update_round_trip() {
    let mut w = WriterEncoder::new();
    let mut probs = [128u8, 200, 30];
    let counts = [[100, 4], [5, 5], [1, 400]];
    let mut updated = [false; 3];
    for i in 0..3 {
      updated[i] = write_prob_update(
        &mut w,
        &mut probs[i],
        counts[i],
        UpdateCoding::SubExp,
        DIFF_UPDATE_PROB,
      );
    }
    assert_eq!(updated, [true, false, true]);
    let bytes = w.done().unwrap();
    let mut r = BoolReader::new(&bytes);
    let mut read = [128u8, 200, 30];
    for p in read.iter_mut() {
      read_prob_update(&mut r, p, UpdateCoding::SubExp, DIFF_UPDATE_PROB);
    }
    assert_eq!(read, probs);
  }

  #[test]
  fn adaptation_without_counts_keeps_previous() {
    let pre = FrameContext::default();
    let mut fc = pre.clone();
    fc.skip_probs[0] = 3;
    let counts = FrameCounts::default();
    adapt_mode_probs(&pre, &counts, &mut fc, true);
    adapt_coef_probs(&pre, &counts, &mut fc, false);
    assert_eq!(fc, pre);
  }
}
