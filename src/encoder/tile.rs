// Copyright (c) 2019-2022, The rav1e contributors. All rights reserved
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
use crate::tiling::TileStateMut;

/// Code every superblock of one tile in raster order. The tile starts
/// with fresh neighbor contexts; the left contexts are cleared at the
/// start of each superblock row.
///
/// Returns the symbol counts of the tile.
///
/// # Errors
///
/// - `EncoderError::InvalidConfiguration` if a partition tree of the tile
///   cannot be coded.
pub fn encode_tile<W: Writer>(
  fi: &FrameInvariants, fs: &FrameState, fc: &FrameContext,
  ts: &mut TileStateMut, w: &mut W,
) -> Result<FrameCounts, EncoderError> {
  let rect = ts.rect;
  let sb_size_log2 = fi.sb_size_log2();
  let sb_size = BlockSize::square(sb_size_log2)
    .or_else(|_| invalid("unsupported superblock size"))?;
  let sb_mi = sb_size.width_mi();

  let mut cw = ContextWriter::new(fc, BlockContext::new(&rect, sb_size_log2));
  for sby in 0..rect.sb_rows {
    cw.bc.reset_left_contexts();
    for sbx in 0..rect.sb_cols {
      let tree = fs
        .decisions
        .tree(rect.sbx + sbx, rect.sby + sby)
        .ok_or_else(|| {
          EncoderError::InvalidConfiguration("missing superblock".into())
        })?;
      let bo = BlockOffset { x: sbx * sb_mi, y: sby * sb_mi };
      encode_partition(fi, fs, ts, &mut cw, w, bo, sb_size, tree)?;
    }
  }

  log::trace!(
    "tile {} ({}, {}): {}x{} superblocks, {} nonzero transform blocks",
    rect.index,
    rect.col,
    rect.row,
    rect.sb_cols,
    rect.sb_rows,
    ts.stats.nonzero_tx_blocks
  );
  Ok(cw.counts)
}
