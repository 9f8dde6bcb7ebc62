// Copyright (c) 2018-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use super::*;

use crate::ec::Writer;
use crate::mv::MotionVector;
use crate::partition::PredictionMode::*;
use crate::partition::*;
use crate::tiling::{Block, TileStateMut};
use crate::transform::{TxMode, TxSize};

/// Transform size a block uses when none is coded, and the largest one
/// it may code.
#[inline]
pub fn max_block_tx_size(bsize: BlockSize, tx_mode: TxMode) -> TxSize {
  bsize.largest_tx_size().min(tx_mode.max_tx_size())
}

/// Whether the transform size of a block is coded.
#[inline]
pub fn codes_tx_size(tx_mode: TxMode, is_inter: bool, skip: bool) -> bool {
  tx_mode == TxMode::TX_MODE_SELECT && !(is_inter && skip)
}

/// Code the mode info of one leaf block and, unless it is skipped, its
/// residual. The reconstruction of the block is left in the tile.
///
/// # Errors
///
/// - `EncoderError::InvalidConfiguration` if the decision cannot be coded
///   in this frame.
pub fn encode_block<W: Writer>(
  fi: &FrameInvariants, fs: &FrameState, ts: &mut TileStateMut,
  cw: &mut ContextWriter, w: &mut W, bo: BlockOffset, bsize: BlockSize,
  d: &BlockDecision,
) -> Result<(), EncoderError> {
  let fh = &fi.header;
  let seg = &fh.segmentation;

  if d.segment_id as usize >= MAX_SEGMENTS {
    return invalid(format!("segment id {} out of range", d.segment_id));
  }
  let codes_segment_id = seg.enabled && seg.update_map;
  if codes_segment_id {
    cw.write_segment_id(w, seg, d.segment_id);
  } else if d.segment_id != 0 {
    return invalid("segment ids are not coded in this frame");
  }

  let skip_forced = seg.skip_forced(d.segment_id);
  let skip = d.skip || skip_forced;
  if !skip_forced {
    cw.write_skip(w, bo, d.skip);
  }

  let is_inter = d.is_inter();
  let implied_ref = seg.ref_frame(d.segment_id);
  if let Some(ref_frame) = implied_ref {
    if ref_frame != d.ref_frame {
      return invalid(format!(
        "segment {} implies {:?}, block uses {:?}",
        d.segment_id, ref_frame, d.ref_frame
      ));
    }
  }
  if fh.is_key() {
    if is_inter {
      return invalid("inter block in a key frame");
    }
  } else if implied_ref.is_none() {
    cw.write_is_inter(w, bo, is_inter);
  }
  if is_inter == d.mode.is_intra() {
    return invalid(format!("{:?} with {:?}", d.mode, d.ref_frame));
  }

  let max_tx_size = max_block_tx_size(bsize, fh.tx_mode);
  if codes_tx_size(fh.tx_mode, is_inter, skip) {
    if d.tx_size > max_tx_size {
      return invalid(format!("{:?} exceeds {:?}", d.tx_size, max_tx_size));
    }
    cw.write_tx_size(w, bo, d.tx_size, max_tx_size);
  } else if d.tx_size != max_tx_size {
    return invalid(format!(
      "{:?} is implied, got {:?}",
      max_tx_size, d.tx_size
    ));
  }

  let mut mv = MotionVector::zero();
  if !is_inter {
    if !d.uv_mode.is_intra() {
      return invalid(format!("chroma mode {:?}", d.uv_mode));
    }
    cw.write_intra_mode(w, bsize, d.mode);
    cw.write_intra_uv_mode(w, d.uv_mode, d.mode);
  } else {
    if implied_ref.is_none() {
      cw.write_ref_frame(w, bo, d.ref_frame);
    }
    let cands = cw.bc.mv_candidates(bo, d.ref_frame);
    if skip_forced {
      if d.mode != ZEROMV {
        return invalid("blocks of a skipped segment use ZEROMV");
      }
    } else {
      let ctx = cw.bc.inter_mode_context(bo);
      cw.write_inter_mode(w, d.mode, ctx);
    }
    if d.mode == NEWMV {
      if !d.mv.codable_against(cands.best) {
        return invalid(format!("{:?} is out of range", d.mv));
      }
      cw.write_mv(w, d.mv, cands.best);
    }
    mv = cands.resolve(d.mode, d.mv);
  }

  cw.bc.blocks.set_block(
    bo,
    Block {
      mode: d.mode,
      ref_frame: d.ref_frame,
      mv,
      bsize,
      tx_size: d.tx_size,
      skip,
      segment_id: d.segment_id,
      coded: true,
    },
  );

  ts.predict_block(bo, bsize);
  if skip {
    cw.bc.reset_skip_context(bo, bsize, fi.profile.second_order_dc);
  } else {
    ts.stats.nonzero_tx_blocks +=
      encode_tx_blocks(fi, fs, ts, cw, w, bo, bsize, d);
  }

  let pixels = ts.visible_pixels(bo, bsize);
  ts.stats.add_block(bsize, &BlockDecision { skip, ..*d }, pixels);
  Ok(())
}
