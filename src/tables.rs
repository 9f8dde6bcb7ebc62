// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Process-wide constant tables, derived once on first use.

use std::f64::consts::PI;
use std::sync::OnceLock;

use crate::context::*;
use crate::token::*;
use crate::transform::TxSize;

/// Number of values of the sub-exponential probability delta alphabet.
pub const MAP_TABLE_SIZE: usize = 254;

/// Bands of the first 16 scan positions; later positions use the last band.
const COEF_BANDS_4X4: [u8; 16] =
  [0, 1, 2, 3, 6, 4, 5, 6, 6, 6, 6, 6, 6, 6, 6, 7];

pub struct CodecTables {
  /// Cost in 1/256 bits of an event of probability `i / 256`.
  pub prob_cost: [u16; 257],
  pub coef_tokens: Vec<TreeToken>,
  pub intra_mode_tokens: Vec<TreeToken>,
  pub inter_mode_tokens: Vec<TreeToken>,
  pub partition_tokens: Vec<TreeToken>,
  pub ext_partition_tokens: Vec<TreeToken>,
  pub ref_tokens: Vec<TreeToken>,
  pub segment_tokens: Vec<TreeToken>,
  pub mv_short_tokens: Vec<TreeToken>,
  /// Raster position of every scan index, per transform size.
  pub scans: [Vec<u16>; TxSize::TX_SIZES],
  /// Band of every scan index, per transform size.
  pub bands: [Vec<u8>; TxSize::TX_SIZES],
  /// Q14 DCT-II basis, `basis[k * n + i]`; empty for 4x4.
  pub dct_basis: [Vec<i32>; TxSize::TX_SIZES],
  /// Recentered delta minus one to coded index.
  pub map_table: [u8; MAP_TABLE_SIZE],
  /// Coded index to recentered delta.
  pub inv_map_table: [u8; MAP_TABLE_SIZE],
  /// Cost of the extra bits and sign of every magnitude, per transform
  /// size.
  pub value_costs: [Vec<u16>; TxSize::TX_SIZES],
}

static TABLES: OnceLock<CodecTables> = OnceLock::new();

#[inline]
pub fn tables() -> &'static CodecTables {
  TABLES.get_or_init(CodecTables::new)
}

/// Diagonal zig-zag order of an `n`x`n` block.
fn zigzag(n: usize) -> Vec<u16> {
  let mut scan = Vec::with_capacity(n * n);
  for s in 0..(2 * n - 1) {
    let rows = s.saturating_sub(n - 1)..=s.min(n - 1);
    if s % 2 == 0 {
      scan.extend(rows.rev().map(|r| (r * n + s - r) as u16));
    } else {
      scan.extend(rows.map(|r| (r * n + s - r) as u16));
    }
  }
  scan
}

fn dct_basis(n: usize) -> Vec<i32> {
  let mut basis = vec![0; n * n];
  for k in 0..n {
    let scale =
      if k == 0 { (1.0 / n as f64).sqrt() } else { (2.0 / n as f64).sqrt() };
    for i in 0..n {
      let c = ((2 * i + 1) as f64 * k as f64 * PI / (2 * n) as f64).cos();
      basis[k * n + i] = (16384.0 * scale * c).round() as i32;
    }
  }
  basis
}

fn map_tables() -> ([u8; MAP_TABLE_SIZE], [u8; MAP_TABLE_SIZE]) {
  let mut inv = [0u8; MAP_TABLE_SIZE];
  let mut n = 0;
  for k in 0..20 {
    inv[n] = 7 + 13 * k;
    n += 1;
  }
  for v in 1..=253u8 {
    if v < 7 || (v - 7) % 13 != 0 {
      inv[n] = v;
      n += 1;
    }
  }
  debug_assert_eq!(n, MAP_TABLE_SIZE);
  let mut map = [0u8; MAP_TABLE_SIZE];
  for (i, &r) in inv.iter().enumerate() {
    map[r as usize - 1] = i as u8;
  }
  (inv, map)
}

fn value_costs(prob_cost: &[u16; 257], tx_size: TxSize) -> Vec<u16> {
  let cost = |p: u8, b: u32| {
    if b != 0 {
      prob_cost[256 - p as usize]
    } else {
      prob_cost[p as usize]
    }
  };
  (0..=max_coeff_value(tx_size))
    .map(|v| {
      if v == 0 {
        return 0;
      }
      let (token, extra) = token_for_value(v);
      let skip = if token == Token::CAT6_TOKEN {
        cat6_skip_bits(tx_size)
      } else {
        0
      };
      let probs = &cat_probs(token)[skip..];
      let len = probs.len();
      let bits: u16 = probs
        .iter()
        .enumerate()
        .map(|(n, &p)| cost(p, (extra >> (len - 1 - n)) & 1))
        .sum();
      bits + 256
    })
    .collect()
}

impl CodecTables {
  fn new() -> Self {
    let mut prob_cost = [0u16; 257];
    for (p, c) in prob_cost.iter_mut().enumerate().skip(1) {
      *c = (-(p as f64 / 256.0).log2() * 256.0).round() as u16;
    }
    prob_cost[0] = prob_cost[1];

    let sizes = TxSize::all();
    let scans = sizes.map(|t| zigzag(t.width()));
    let bands = sizes.map(|t| {
      (0..t.area())
        .map(|i| COEF_BANDS_4X4.get(i).copied().unwrap_or(7))
        .collect()
    });
    let dct_basis = sizes.map(|t| {
      if t == TxSize::TX_4X4 {
        Vec::new()
      } else {
        dct_basis(t.width())
      }
    });
    let (inv_map_table, map_table) = map_tables();
    let value_costs = sizes.map(|t| value_costs(&prob_cost, t));

    CodecTables {
      prob_cost,
      coef_tokens: tokens_from_tree(COEF_TREE),
      intra_mode_tokens: tokens_from_tree(INTRA_MODE_TREE),
      inter_mode_tokens: tokens_from_tree(INTER_MODE_TREE),
      partition_tokens: tokens_from_tree(PARTITION_TREE),
      ext_partition_tokens: tokens_from_tree(EXT_PARTITION_TREE),
      ref_tokens: tokens_from_tree(REF_TREE),
      segment_tokens: tokens_from_tree(SEGMENT_TREE),
      mv_short_tokens: tokens_from_tree(MV_SHORT_TREE),
      scans,
      bands,
      dct_basis,
      map_table,
      inv_map_table,
      value_costs,
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn zigzag_4x4() {
    assert_eq!(
      tables().scans[0],
      vec![0, 1, 4, 8, 5, 2, 3, 6, 9, 12, 13, 10, 7, 11, 14, 15]
    );
  }

  #[test]
  fn scans_are_permutations() {
    for (t, scan) in TxSize::all().iter().zip(tables().scans.iter()) {
      let mut sorted = scan.clone();
      sorted.sort_unstable();
      assert_eq!(sorted, (0..t.area() as u16).collect::<Vec<_>>());
    }
  }

  #[test]
  fn prob_costs() {
    let t = tables();
    assert_eq!(t.prob_cost[128], 256);
    assert_eq!(t.prob_cost[256], 0);
    assert_eq!(t.prob_cost[64], 512);
    assert!(t.prob_cost[1] > t.prob_cost[2]);
  }

  #[test]
  fn map_tables_invert() {
    let t = tables();
    assert_eq!(&t.inv_map_table[..3], &[7, 20, 33]);
    assert_eq!(t.inv_map_table[19], 254);
    assert_eq!(t.inv_map_table[20], 1);
    for i in 0..MAP_TABLE_SIZE {
      let r = t.inv_map_table[i] as usize;
      assert_eq!(t.map_table[r - 1] as usize, i);
    }
  }

  #[test]
  fn dct_basis_is_orthogonal() {
    let basis = &tables().dct_basis[1];
    for a in 0..8 {
      for b in 0..8 {
        let dot: i64 = (0..8)
          .map(|i| basis[a * 8 + i] as i64 * basis[b * 8 + i] as i64)
          .sum();
        let expected = if a == b { 1i64 << 28 } else { 0 };
        assert!((dot - expected).abs() < 1 << 16, "{a} {b} {dot}");
      }
    }
  }

  #[test]
  fn value_cost_includes_sign() {
    let costs = &tables().value_costs[0];
    assert_eq!(costs[0], 0);
    assert_eq!(costs[1], 256);
    assert!(costs[100] > costs[5]);
    assert_eq!(costs.len(), max_coeff_value(TxSize::TX_4X4) as usize + 1);
  }
}
