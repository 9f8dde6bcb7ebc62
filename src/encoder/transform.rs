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
use crate::partition::*;
use crate::rdo::{block_rdmult, optimize_b, TrellisBlock};
use crate::tables::tables;
use crate::tiling::TileStateMut;
use crate::token::BlockType;
use crate::transform::*;

use arrayvec::ArrayVec;

const MAX_TX_AREA: usize = 32 * 32;

/// Residual of the transform block at tile relative 4x4 position
/// `(x4, y4)` of `plane`, transformed into `coeffs`.
pub fn forward_tx_block(
  fs: &FrameState, ts: &TileStateMut, plane: usize, x4: usize, y4: usize,
  tx_size: TxSize, coeffs: &mut [i32],
) {
  let (ox, oy) = ts.plane_origin(plane);
  let (x, y) = (ox + (x4 << 2), oy + (y4 << 2));
  let src = &fs.input.planes[plane];
  let pred = &fs.prediction.planes[plane];
  let mut diff = [0i16; MAX_TX_AREA];
  let diff = &mut diff[..tx_size.area()];
  residual(
    src.slice(x, y),
    src.cfg.stride,
    pred.slice(x, y),
    pred.cfg.stride,
    diff,
    tx_size,
  );
  forward_transform(diff, coeffs, tx_size);
}

/// Quantize one block of transformed coefficients and run the trellis
/// over it. Returns the end of block.
fn quantize_tx_block(
  fi: &FrameInvariants, d: &BlockDecision, coeffs: &[i32],
  qcoeffs: &mut [i16], dqcoeffs: &mut [i32], tx_size: TxSize,
  block_type: BlockType, ctx: usize, eob_max: usize,
) -> usize {
  let qc = &fi.quantizers[d.segment_id as usize];
  let pq = qc.plane(block_type);
  let zbin_extra = qc.zbin_extra(block_type, fi.zbin_over_quant, d);
  let eob = pq.quantize(
    coeffs,
    qcoeffs,
    dqcoeffs,
    tx_size,
    block_type.first_coeff(),
    eob_max,
    zbin_extra,
  );
  if !fi.trellis {
    return eob;
  }
  let b = TrellisBlock {
    tx_size,
    block_type,
    ctx,
    dequant: pq.dequant,
    rdmult: block_rdmult(qc.rdmult, block_type, !d.is_inter()),
    rddiv: qc.rddiv,
  };
  optimize_b(coeffs, qcoeffs, dqcoeffs, eob, &b, &fi.token_costs)
}

/// Quantized values in scan order up to `eob`.
fn scan_order(
  qcoeffs: &[i16], tx_size: TxSize, eob: usize,
) -> ArrayVec<i16, MAX_TX_AREA> {
  tables().scans[tx_size as usize][..eob]
    .iter()
    .map(|&rc| qcoeffs[rc as usize])
    .collect()
}

/// Code one transform block from its transformed coefficients and add
/// its reconstruction to the tile. A `dc` replaces the dequantized DC
/// value, for luma blocks whose DC travels in the second order block.
///
/// Returns whether the block carries nonzero values.
pub fn encode_tx_block<W: Writer>(
  fi: &FrameInvariants, ts: &mut TileStateMut, cw: &mut ContextWriter,
  w: &mut W, d: &BlockDecision, plane: usize, x4: usize, y4: usize,
  tx_size: TxSize, block_type: BlockType, coeffs: &[i32], dc: Option<i32>,
) -> bool {
  let area = tx_size.area();
  let mut qcoeffs = [0i16; MAX_TX_AREA];
  let mut dqcoeffs = [0i32; MAX_TX_AREA];
  let (qcoeffs, dqcoeffs) = (&mut qcoeffs[..area], &mut dqcoeffs[..area]);

  let eob_max =
    fi.header.segmentation.eob_max(d.segment_id).unwrap_or(area).min(area);
  let ctx = cw.bc.coeff_context(plane, x4, y4, tx_size);
  let eob = quantize_tx_block(
    fi, d, coeffs, qcoeffs, dqcoeffs, tx_size, block_type, ctx, eob_max,
  );
  let scanned = scan_order(qcoeffs, tx_size, eob);
  cw.write_coeffs(w, plane, x4, y4, tx_size, block_type, &scanned);

  if let Some(dc) = dc {
    dqcoeffs[0] = dc;
  }
  if eob > 0 || dqcoeffs[0] != 0 {
    let rec = &mut ts.rec[plane];
    let stride = rec.cfg.stride;
    let dst = rec.slice_mut(x4 << 2, y4 << 2);
    inverse_transform_add(dqcoeffs, dst, stride, tx_size);
  }
  eob > block_type.first_coeff()
}

/// Luma of a macroblock whose DC values go through a second order
/// block: the sixteen 4x4 DCs are Walsh-Hadamard transformed and coded
/// first, the 4x4 blocks follow without their DC.
fn encode_luma_second_order<W: Writer>(
  fi: &FrameInvariants, fs: &FrameState, ts: &mut TileStateMut,
  cw: &mut ContextWriter, w: &mut W, bo: BlockOffset, d: &BlockDecision,
) -> usize {
  let x4 = bo.x << 1;
  let y4 = bo.y << 1;
  let mut coeffs = [[0i32; 16]; 16];
  let mut dc = [0i32; 16];
  for (i, c) in coeffs.iter_mut().enumerate() {
    let (bx, by) = (x4 + (i & 3), y4 + (i >> 2));
    if cw.bc.is_visible(0, bx, by) {
      forward_tx_block(fs, ts, 0, bx, by, TxSize::TX_4X4, c);
      dc[i] = c[0];
    }
  }
  forward_wht(&mut dc);

  let mut q = [0i16; 16];
  let mut dq = [0i32; 16];
  let ctx = cw.bc.y2_context(bo);
  let eob = quantize_tx_block(
    fi,
    d,
    &dc,
    &mut q,
    &mut dq,
    TxSize::TX_4X4,
    BlockType::Y2,
    ctx,
    16,
  );
  cw.write_y2_coeffs(w, bo, &scan_order(&q, TxSize::TX_4X4, eob));
  inverse_wht(&mut dq);

  let mut nonzero = (eob > 0) as usize;
  for (i, c) in coeffs.iter().enumerate() {
    let (bx, by) = (x4 + (i & 3), y4 + (i >> 2));
    if !cw.bc.is_visible(0, bx, by) {
      continue;
    }
    nonzero += encode_tx_block(
      fi,
      ts,
      cw,
      w,
      d,
      0,
      bx,
      by,
      TxSize::TX_4X4,
      BlockType::Y_NO_DC,
      c,
      Some(dq[i]),
    ) as usize;
  }
  nonzero
}

/// Code every visible transform block of a block with residual, luma
/// then both chroma planes, each in raster order. Returns the number of
/// transform blocks carrying nonzero values.
pub fn encode_tx_blocks<W: Writer>(
  fi: &FrameInvariants, fs: &FrameState, ts: &mut TileStateMut,
  cw: &mut ContextWriter, w: &mut W, bo: BlockOffset, bsize: BlockSize,
  d: &BlockDecision,
) -> usize {
  let mut nonzero = 0;
  let first_plane = if fi.profile.second_order_dc {
    nonzero += encode_luma_second_order(fi, fs, ts, cw, w, bo, d);
    1
  } else {
    0
  };
  let uv_tx_size = d.tx_size.min(bsize.largest_uv_tx_size());

  for plane in first_plane..PLANES {
    let (tx_size, block_type) = if plane == 0 {
      (d.tx_size, BlockType::Y_WITH_DC)
    } else {
      (uv_tx_size, BlockType::UV)
    };
    let dec = (plane > 0) as usize;
    let (bx4, by4) = ((bo.x << 1) >> dec, (bo.y << 1) >> dec);
    let w4 = ((bsize.width_mi() << 1) >> dec).max(1);
    let h4 = ((bsize.height_mi() << 1) >> dec).max(1);
    let step = tx_size.width_4x4();
    let mut coeffs = [0i32; MAX_TX_AREA];
    let coeffs = &mut coeffs[..tx_size.area()];

    for y in (0..h4).step_by(step) {
      for x in (0..w4).step_by(step) {
        let (x4, y4) = (bx4 + x, by4 + y);
        if !cw.bc.is_visible(plane, x4, y4) {
          continue;
        }
        forward_tx_block(fs, ts, plane, x4, y4, tx_size, coeffs);
        nonzero += encode_tx_block(
          fi, ts, cw, w, d, plane, x4, y4, tx_size, block_type, coeffs, None,
        ) as usize;
      }
    }
  }
  nonzero
}
