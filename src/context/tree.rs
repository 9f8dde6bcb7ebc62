// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Binary trees over symbol alphabets.
//!
//! A tree is a flat array of pairs. Entry `i` is the branch taken when the
//! bit at node `i >> 1` is `i & 1`; a positive entry is the index of the
//! next pair, an entry `<= 0` is a leaf holding the negated symbol. The
//! probability of node `i >> 1` is `probs[i >> 1]`.

use crate::partition::PartitionType::*;
use crate::partition::PredictionMode::*;
use crate::partition::RefFrame::*;
use crate::token::Token::*;

/// Path of a symbol: `len` bits, MSB first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TreeToken {
  pub value: u32,
  pub len: u8,
}

macro_rules! leaf {
  ($s:expr) => {
    -($s as i8)
  };
}

pub static COEF_TREE: &[i8] = &[
  leaf!(EOB_TOKEN), 2,
  leaf!(ZERO_TOKEN), 4,
  leaf!(ONE_TOKEN), 6,
  8, 12,
  leaf!(TWO_TOKEN), 10,
  leaf!(THREE_TOKEN), leaf!(FOUR_TOKEN),
  14, 16,
  leaf!(CAT1_TOKEN), leaf!(CAT2_TOKEN),
  18, 20,
  leaf!(CAT3_TOKEN), leaf!(CAT4_TOKEN),
  leaf!(CAT5_TOKEN), leaf!(CAT6_TOKEN),
];

pub static INTRA_MODE_TREE: &[i8] = &[
  leaf!(DC_PRED), 2,
  leaf!(TM_PRED), 4,
  leaf!(V_PRED), 6,
  8, 12,
  leaf!(H_PRED), 10,
  leaf!(D135_PRED), leaf!(D117_PRED),
  leaf!(D45_PRED), 14,
  leaf!(D63_PRED), 16,
  leaf!(D153_PRED), leaf!(D207_PRED),
];

/// Symbols are `mode - NEARESTMV`.
pub static INTER_MODE_TREE: &[i8] = &[
  -(ZEROMV as i8 - NEARESTMV as i8), 2,
  -(NEARESTMV as i8 - NEARESTMV as i8), 4,
  -(NEARMV as i8 - NEARESTMV as i8), -(NEWMV as i8 - NEARESTMV as i8),
];

pub static PARTITION_TREE: &[i8] = &[
  leaf!(PARTITION_NONE), 2,
  leaf!(PARTITION_HORZ), 4,
  leaf!(PARTITION_VERT), leaf!(PARTITION_SPLIT),
];

pub static EXT_PARTITION_TREE: &[i8] = &[
  leaf!(PARTITION_NONE), 2,
  leaf!(PARTITION_HORZ), 4,
  leaf!(PARTITION_VERT), 6,
  leaf!(PARTITION_SPLIT), 8,
  leaf!(PARTITION_HORZ_A), 10,
  leaf!(PARTITION_HORZ_B), 12,
  leaf!(PARTITION_VERT_A), leaf!(PARTITION_VERT_B),
];

/// Symbols are `ref_frame - LAST_FRAME`.
pub static REF_TREE: &[i8] = &[
  -(LAST_FRAME as i8 - LAST_FRAME as i8), 2,
  -(GOLDEN_FRAME as i8 - LAST_FRAME as i8),
  -(ALTREF_FRAME as i8 - LAST_FRAME as i8),
];

pub static SEGMENT_TREE: &[i8] = &[2, 4, -0, -1, -2, -3];

/// Magnitudes below `MV_SHORT_COUNT`.
pub static MV_SHORT_TREE: &[i8] =
  &[2, 8, 4, 6, -0, -1, -2, -3, 10, 12, -4, -5, -6, -7];

/// Number of symbols of a tree.
pub fn tree_symbols(tree: &[i8]) -> usize {
  tree.iter().filter(|&&t| t <= 0).count()
}

fn walk(tree: &[i8], tokens: &mut [TreeToken], i: usize, value: u32, len: u8) {
  for b in 0..2 {
    let v = (value << 1) | b as u32;
    let next = tree[i + b];
    if next <= 0 {
      tokens[(-next) as usize] = TreeToken { value: v, len: len + 1 };
    } else {
      walk(tree, tokens, next as usize, v, len + 1);
    }
  }
}

/// Flatten a tree into one path per symbol, indexed by symbol.
pub fn tokens_from_tree(tree: &[i8]) -> Vec<TreeToken> {
  let mut tokens = vec![TreeToken::default(); tree_symbols(tree)];
  walk(tree, &mut tokens, 0, 0, 0);
  tokens
}

/// Branch counts `[count0, count1]` for every node given per-symbol
/// counts.
pub fn tree_probs_from_distribution(
  tree: &[i8], leaf_counts: &[u32],
) -> Vec<[u32; 2]> {
  fn sum(
    tree: &[i8], i: usize, leaf_counts: &[u32], branch: &mut [[u32; 2]],
  ) -> u32 {
    let mut total = 0;
    for b in 0..2 {
      let next = tree[i + b];
      let c = if next <= 0 {
        leaf_counts[(-next) as usize]
      } else {
        sum(tree, next as usize, leaf_counts, branch)
      };
      branch[i >> 1][b] = c;
      total += c;
    }
    total
  }

  let mut branch = vec![[0u32; 2]; tree.len() / 2];
  sum(tree, 0, leaf_counts, &mut branch);
  branch
}

/// Add the path of `token` to per-node branch counts, without the first
/// `skip` decisions.
pub fn count_token_branches(
  tree: &[i8], token: TreeToken, skip: u8, branch: &mut [[u32; 2]],
) {
  let mut i = 0usize;
  for n in (0..token.len).rev() {
    let b = ((token.value >> n) & 1) as usize;
    if token.len - 1 - n >= skip {
      branch[i >> 1][b] += 1;
    }
    i = tree[i + b] as usize;
  }
}
