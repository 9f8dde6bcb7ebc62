// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! The compressed header: forward probability updates of one frame.

use super::*;

use crate::ec::{BoolReader, Writer};
use crate::header::FrameHeader;
use crate::transform::{TxMode, TxSize};

/// Update flags and values of a run of binary probabilities.
fn write_updates<W: Writer>(
  w: &mut W, probs: &mut [u8], counts: &[[u32; 2]], coding: UpdateCoding,
  meta: u8,
) -> usize {
  let mut updates = 0;
  for (p, &ct) in probs.iter_mut().zip(counts) {
    updates += write_prob_update(w, p, ct, coding, meta) as usize;
  }
  updates
}

fn read_updates(
  r: &mut BoolReader, probs: &mut [u8], coding: UpdateCoding, meta: u8,
) -> usize {
  let mut updates = 0;
  for p in probs.iter_mut() {
    updates += read_prob_update(r, p, coding, meta) as usize;
  }
  updates
}

fn write_tree_updates<W: Writer>(
  w: &mut W, tree: &[i8], probs: &mut [u8], leaf_counts: &[u32],
  coding: UpdateCoding,
) -> usize {
  let branch = tree_probs_from_distribution(tree, leaf_counts);
  write_updates(w, probs, &branch, coding, DIFF_UPDATE_PROB)
}

/// Largest transform size whose coefficient probabilities are sent.
fn coef_tx_limit(fh: &FrameHeader) -> TxSize {
  fh.tx_mode.max_tx_size().min(fh.profile().max_tx_size)
}

fn partition_tree(ext_partition: bool) -> (&'static [i8], usize) {
  if ext_partition {
    (EXT_PARTITION_TREE, EXT_PARTITION_TYPES)
  } else {
    (PARTITION_TREE, PARTITION_TYPES)
  }
}

/// Write the updates of `fc` that pay for themselves given the counts of
/// the frame, applying them to `fc`. Returns the number of updated
/// probabilities.
pub fn write_compressed_header<W: Writer>(
  w: &mut W, fh: &FrameHeader, fc: &mut FrameContext, counts: &FrameCounts,
) -> usize {
  let profile = fh.profile();
  let coding = profile.prob_update_coding;
  let mut updates = 0;

  if fh.tx_mode == TxMode::TX_MODE_SELECT {
    for max_tx in [TxSize::TX_8X8, TxSize::TX_16X16, TxSize::TX_32X32] {
      for ctx in 0..TX_SIZE_CONTEXTS {
        updates += write_updates(
          w,
          fc.tx_probs.probs_mut(max_tx, ctx),
          counts.tx.counts(max_tx, ctx),
          coding,
          DIFF_UPDATE_PROB,
        );
      }
    }
  }

  let limit = coef_tx_limit(fh);
  for tx in TxSize::all().into_iter().filter(|&tx| tx <= limit) {
    let probs = &mut fc.coef_probs[tx as usize];
    let cts = &counts.coef[tx as usize];
    let pays = coef_group_pays(probs, cts, coding, COEF_UPDATE_PROB);
    w.bit(pays as u16);
    if !pays {
      continue;
    }
    let nodes = probs.iter_mut().flatten().flatten();
    for (p, c) in nodes.zip(cts.iter().flatten().flatten()) {
      updates += write_updates(w, p, c, coding, COEF_UPDATE_PROB);
    }
  }

  updates += write_updates(
    w,
    &mut fc.skip_probs,
    &counts.skip,
    coding,
    DIFF_UPDATE_PROB,
  );

  if !fh.is_key() {
    for (p, c) in fc.inter_mode_probs.iter_mut().zip(&counts.inter_mode) {
      updates += write_tree_updates(w, INTER_MODE_TREE, p, c, coding);
    }
    updates += write_updates(
      w,
      &mut fc.intra_inter_probs,
      &counts.intra_inter,
      coding,
      DIFF_UPDATE_PROB,
    );
    for (p, c) in fc.ref_probs.iter_mut().zip(&counts.ref_frame) {
      updates += write_tree_updates(w, REF_TREE, p, c, coding);
    }
  }

  for (p, c) in fc.y_mode_probs.iter_mut().zip(&counts.y_mode) {
    updates += write_tree_updates(w, INTRA_MODE_TREE, p, c, coding);
  }

  if profile.partition_coded {
    let (tree, symbols) = partition_tree(profile.ext_partition);
    for (p, c) in fc.partition_probs.iter_mut().zip(&counts.partition) {
      let p = &mut p[..symbols - 1];
      updates += write_tree_updates(w, tree, p, &c[..symbols], coding);
    }
  }

  if !fh.is_key() {
    for comp in 0..2 {
      for ((p, &ct), &meta) in fc.mv_probs[comp]
        .iter_mut()
        .zip(&counts.mv[comp])
        .zip(&MV_UPDATE_PROBS[comp])
      {
        updates +=
          write_prob_update(w, p, ct, UpdateCoding::MvLiteral, meta) as usize;
      }
    }
  }

  updates
}

/// Mirror of [`write_compressed_header`]. Returns the number of updated
/// probabilities.
pub fn read_compressed_header(
  r: &mut BoolReader, fh: &FrameHeader, fc: &mut FrameContext,
) -> usize {
  let profile = fh.profile();
  let coding = profile.prob_update_coding;
  let mut updates = 0;

  if fh.tx_mode == TxMode::TX_MODE_SELECT {
    for max_tx in [TxSize::TX_8X8, TxSize::TX_16X16, TxSize::TX_32X32] {
      for ctx in 0..TX_SIZE_CONTEXTS {
        updates += read_updates(
          r,
          fc.tx_probs.probs_mut(max_tx, ctx),
          coding,
          DIFF_UPDATE_PROB,
        );
      }
    }
  }

  let limit = coef_tx_limit(fh);
  for tx in TxSize::all().into_iter().filter(|&tx| tx <= limit) {
    if !r.read_bit() {
      continue;
    }
    for p in fc.coef_probs[tx as usize].iter_mut().flatten().flatten() {
      updates += read_updates(r, p, coding, COEF_UPDATE_PROB);
    }
  }

  updates += read_updates(r, &mut fc.skip_probs, coding, DIFF_UPDATE_PROB);

  if !fh.is_key() {
    for p in fc.inter_mode_probs.iter_mut() {
      updates += read_updates(r, p, coding, DIFF_UPDATE_PROB);
    }
    updates +=
      read_updates(r, &mut fc.intra_inter_probs, coding, DIFF_UPDATE_PROB);
    for p in fc.ref_probs.iter_mut() {
      updates += read_updates(r, p, coding, DIFF_UPDATE_PROB);
    }
  }

  for p in fc.y_mode_probs.iter_mut() {
    updates += read_updates(r, p, coding, DIFF_UPDATE_PROB);
  }

  if profile.partition_coded {
    let (_, symbols) = partition_tree(profile.ext_partition);
    for p in fc.partition_probs.iter_mut() {
      let p = &mut p[..symbols - 1];
      updates += read_updates(r, p, coding, DIFF_UPDATE_PROB);
    }
  }

  if !fh.is_key() {
    for comp in 0..2 {
      let metas = &MV_UPDATE_PROBS[comp];
      for (p, &meta) in fc.mv_probs[comp].iter_mut().zip(metas) {
        updates +=
          read_prob_update(r, p, UpdateCoding::MvLiteral, meta) as usize;
      }
    }
  }

  updates
}

/// Merge the counts of a coded frame into `fc`, which holds the
/// probabilities the frame was coded with. `pre_fc` is the slot content
/// before the forward updates.
pub fn adapt_frame_context(
  fh: &FrameHeader, pre_fc: &FrameContext, counts: &FrameCounts,
  fc: &mut FrameContext, last_frame_was_key: bool,
) {
  if !fh.adapts() {
    return;
  }
  let after_key = last_frame_was_key && !fh.is_key();
  adapt_coef_probs(pre_fc, counts, fc, after_key);
  if !fh.is_key() {
    adapt_mode_probs(pre_fc, counts, fc, fh.profile().ext_partition);
  }
}
