// Copyright (c) 2018-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use crate::api::DecoderError;
use crate::context::*;
use crate::ec::BoolReader;
use crate::encoder::{codes_tx_size, max_block_tx_size};
use crate::frame::Frame;
use crate::header::FrameHeader;
use crate::mv::MotionVector;
use crate::partition::BlockSize::*;
use crate::partition::PartitionType::*;
use crate::partition::PredictionMode::*;
use crate::partition::*;
use crate::profile::CodecProfile;
use crate::quantize::{dequantize, QuantizationContext};
use crate::tables::tables;
use crate::tiling::{Block, TileRect, TileStateMut};
use crate::token::BlockType;
use crate::transform::*;

const MAX_TX_AREA: usize = 32 * 32;

/// One transform block as read from the tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTxBlock {
  pub plane: usize,
  /// Frame position of the top-left pixel in `plane`.
  pub x: usize,
  pub y: usize,
  pub tx_size: TxSize,
  pub block_type: BlockType,
  /// Quantized values in scan order up to the end of block. Blocks
  /// without DC start with a zero placeholder.
  pub coeffs: Vec<i16>,
}

/// What one tile decodes to.
pub struct DecodedTile<'a> {
  /// Partition trees of the tile in superblock raster order.
  pub trees: Vec<PartitionTree>,
  pub tx_blocks: Vec<DecodedTxBlock>,
  pub ts: TileStateMut<'a>,
  pub counts: FrameCounts,
}

struct TileDecoder<'a> {
  fh: &'a FrameHeader,
  profile: CodecProfile,
  quantizers: &'a [QuantizationContext; MAX_SEGMENTS],
  r: BoolReader<'a>,
  cr: ContextReader<'a>,
  ts: TileStateMut<'a>,
  tx_blocks: Vec<DecodedTxBlock>,
}

/// Read every superblock of one tile.
///
/// # Errors
///
/// - `DecoderError::InvalidSymbol` if a partition does not fit its node.
pub fn decode_tile<'a>(
  fh: &'a FrameHeader, fc: &'a FrameContext,
  quantizers: &'a [QuantizationContext; MAX_SEGMENTS], rect: TileRect,
  data: &'a [u8], prediction: &'a Frame,
) -> Result<DecodedTile<'a>, DecoderError> {
  let profile = fh.profile();
  let sb_size_log2 = profile.sb_size_log2();
  let sb_size = BlockSize::square(sb_size_log2)
    .map_err(|_| DecoderError::InvalidSymbol("superblock size"))?;
  let sb_mi = sb_size.width_mi();

  let mut td = TileDecoder {
    fh,
    profile,
    quantizers,
    r: BoolReader::new(data),
    cr: ContextReader::new(fc, BlockContext::new(&rect, sb_size_log2)),
    ts: TileStateMut::new(rect, sb_size_log2, prediction),
    tx_blocks: Vec::new(),
  };
  let mut trees = Vec::with_capacity(rect.sb_cols * rect.sb_rows);
  for sby in 0..rect.sb_rows {
    td.cr.bc.reset_left_contexts();
    for sbx in 0..rect.sb_cols {
      let bo = BlockOffset { x: sbx * sb_mi, y: sby * sb_mi };
      trees.push(td.read_partition(bo, sb_size)?);
    }
  }
  if td.r.is_exhausted() {
    log::warn!("tile {} read past the end of its data", rect.index);
  }

  Ok(DecodedTile {
    trees,
    tx_blocks: td.tx_blocks,
    ts: td.ts,
    counts: td.cr.counts,
  })
}

impl<'a> TileDecoder<'a> {
  #[inline]
  fn inside(&self, bo: BlockOffset) -> bool {
    bo.x < self.ts.rect.mi_cols && bo.y < self.ts.rect.mi_rows
  }

  fn read_partition(
    &mut self, bo: BlockOffset, bsize: BlockSize,
  ) -> Result<PartitionTree, DecoderError> {
    if !self.inside(bo) {
      return Ok(PartitionTree::leaf(BlockDecision::default()));
    }
    if !self.profile.partition_coded {
      return Ok(PartitionTree::leaf(self.read_block(bo, bsize)));
    }

    let p = if bsize == BLOCK_8X8 {
      PARTITION_NONE
    } else {
      let ext = self.profile.ext_partition;
      self.cr.read_partition(&mut self.r, bo, bsize, ext)
    };
    let subsize = bsize
      .subsize(p)
      .map_err(|_| DecoderError::InvalidSymbol("partition"))?;

    if p == PARTITION_SPLIT {
      let hbs = bsize.width_mi() >> 1;
      let mut children = Vec::with_capacity(4);
      for i in 0..4 {
        let cbo = bo.with_offset((i & 1) * hbs, (i >> 1) * hbs);
        children.push(self.read_partition(cbo, subsize)?);
      }
      return Ok(PartitionTree::split(children));
    }

    let blocks = bsize
      .partition_blocks(p)
      .map_err(|_| DecoderError::InvalidSymbol("partition"))?;
    let mut decisions = Vec::with_capacity(blocks.len());
    for (block_size, x, y) in blocks {
      let cbo = bo.with_offset(x, y);
      decisions.push(if self.inside(cbo) {
        self.read_block(cbo, block_size)
      } else {
        BlockDecision::default()
      });
    }
    self.cr.bc.update_partition_context(bo, subsize, bsize);
    Ok(PartitionTree::new(p, decisions))
  }

  fn read_block(
    &mut self, bo: BlockOffset, bsize: BlockSize,
  ) -> BlockDecision {
    let fh = self.fh;
    let seg = &fh.segmentation;
    let r = &mut self.r;

    let segment_id = if seg.enabled && seg.update_map {
      self.cr.read_segment_id(r, seg)
    } else {
      0
    };
    let skip_forced = seg.skip_forced(segment_id);
    let skip = skip_forced || self.cr.read_skip(r, bo);
    let implied_ref = seg.ref_frame(segment_id);
    let is_inter = if fh.is_key() {
      false
    } else {
      match implied_ref {
        Some(ref_frame) => ref_frame.is_inter(),
        None => self.cr.read_is_inter(r, bo),
      }
    };

    let max_tx_size = max_block_tx_size(bsize, fh.tx_mode);
    let tx_size = if codes_tx_size(fh.tx_mode, is_inter, skip) {
      self.cr.read_tx_size(r, bo, max_tx_size)
    } else {
      max_tx_size
    };

    let mut d =
      BlockDecision { tx_size, skip, segment_id, ..Default::default() };
    let mut mv = MotionVector::zero();
    if !is_inter {
      d.mode = self.cr.read_intra_mode(r, bsize);
      d.uv_mode = self.cr.read_intra_uv_mode(r, d.mode);
    } else {
      d.ref_frame = match implied_ref {
        Some(ref_frame) => ref_frame,
        None => self.cr.read_ref_frame(r, bo),
      };
      let cands = self.cr.bc.mv_candidates(bo, d.ref_frame);
      d.mode = if skip_forced {
        ZEROMV
      } else {
        let ctx = self.cr.bc.inter_mode_context(bo);
        self.cr.read_inter_mode(r, ctx)
      };
      if d.mode == NEWMV {
        d.mv = self.cr.read_mv(r, cands.best);
      }
      mv = cands.resolve(d.mode, d.mv);
    }

    self.cr.bc.blocks.set_block(
      bo,
      Block {
        mode: d.mode,
        ref_frame: d.ref_frame,
        mv,
        bsize,
        tx_size,
        skip,
        segment_id,
        coded: true,
      },
    );

    self.ts.predict_block(bo, bsize);
    if skip {
      let second_order = self.profile.second_order_dc;
      self.cr.bc.reset_skip_context(bo, bsize, second_order);
    } else {
      self.read_tx_blocks(bo, bsize, &d);
    }
    d
  }

  fn read_tx_blocks(
    &mut self, bo: BlockOffset, bsize: BlockSize, d: &BlockDecision,
  ) {
    let qc = self.quantizers[d.segment_id as usize];
    let first_plane = if self.profile.second_order_dc {
      self.read_luma_second_order(bo, &qc);
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
      let dequant = qc.plane(block_type).dequant;
      let dec = (plane > 0) as usize;
      let (bx4, by4) = ((bo.x << 1) >> dec, (bo.y << 1) >> dec);
      let w4 = ((bsize.width_mi() << 1) >> dec).max(1);
      let h4 = ((bsize.height_mi() << 1) >> dec).max(1);
      let step = tx_size.width_4x4();

      for y in (0..h4).step_by(step) {
        for x in (0..w4).step_by(step) {
          let (x4, y4) = (bx4 + x, by4 + y);
          if self.cr.bc.is_visible(plane, x4, y4) {
            self.read_tx_block(
              plane, x4, y4, tx_size, block_type, dequant, None,
            );
          }
        }
      }
    }
  }

  fn read_luma_second_order(
    &mut self, bo: BlockOffset, qc: &QuantizationContext,
  ) {
    let mut scanned = Vec::new();
    self.cr.read_y2_coeffs(&mut self.r, bo, &mut scanned);
    let mut q = [0i16; 16];
    scatter(&scanned, &mut q, TxSize::TX_4X4);
    let mut dc = [0i32; 16];
    dequantize(&q, &mut dc, qc.y2.dequant, TxSize::TX_4X4);
    inverse_wht(&mut dc);

    let (x4, y4) = (bo.x << 1, bo.y << 1);
    let (ox, oy) = self.ts.plane_origin(0);
    self.tx_blocks.push(DecodedTxBlock {
      plane: 0,
      x: ox + (x4 << 2),
      y: oy + (y4 << 2),
      tx_size: TxSize::TX_4X4,
      block_type: BlockType::Y2,
      coeffs: scanned,
    });

    for (i, &dc) in dc.iter().enumerate() {
      let (bx, by) = (x4 + (i & 3), y4 + (i >> 2));
      if self.cr.bc.is_visible(0, bx, by) {
        self.read_tx_block(
          0,
          bx,
          by,
          TxSize::TX_4X4,
          BlockType::Y_NO_DC,
          qc.y1.dequant,
          Some(dc),
        );
      }
    }
  }

  /// Read one transform block and add its reconstruction to the tile.
  fn read_tx_block(
    &mut self, plane: usize, x4: usize, y4: usize, tx_size: TxSize,
    block_type: BlockType, dequant: [i32; 2], dc: Option<i32>,
  ) {
    let mut scanned = Vec::new();
    let eob = self.cr.read_coeffs(
      &mut self.r,
      plane,
      x4,
      y4,
      tx_size,
      block_type,
      &mut scanned,
    );

    let area = tx_size.area();
    let mut q = [0i16; MAX_TX_AREA];
    let mut dq = [0i32; MAX_TX_AREA];
    let (q, dq) = (&mut q[..area], &mut dq[..area]);
    scatter(&scanned, q, tx_size);
    dequantize(q, dq, dequant, tx_size);
    if let Some(dc) = dc {
      dq[0] = dc;
    }
    if eob > 0 || dq[0] != 0 {
      let rec = &mut self.ts.rec[plane];
      let stride = rec.cfg.stride;
      let dst = rec.slice_mut(x4 << 2, y4 << 2);
      inverse_transform_add(dq, dst, stride, tx_size);
    }

    let (ox, oy) = self.ts.plane_origin(plane);
    self.tx_blocks.push(DecodedTxBlock {
      plane,
      x: ox + (x4 << 2),
      y: oy + (y4 << 2),
      tx_size,
      block_type,
      coeffs: scanned,
    });
  }
}

/// Place scan ordered values at their raster positions.
fn scatter(scanned: &[i16], q: &mut [i16], tx_size: TxSize) {
  let scan = &tables().scans[tx_size as usize];
  for (&v, &rc) in scanned.iter().zip(scan.iter()) {
    q[rc as usize] = v;
  }
}
