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
use crate::partition::BlockSize::*;
use crate::partition::PartitionType::*;
use crate::partition::*;
use crate::tiling::TileStateMut;

/// Walk the partition tree of one square node at tile position `bo`,
/// coding the partition symbols and every leaf block inside the tile.
///
/// # Errors
///
/// - `EncoderError::InvalidConfiguration` if the tree does not fit the
///   node, the tile edge or the generation.
pub fn encode_partition<W: Writer>(
  fi: &FrameInvariants, fs: &FrameState, ts: &mut TileStateMut,
  cw: &mut ContextWriter, w: &mut W, bo: BlockOffset, bsize: BlockSize,
  tree: &PartitionTree,
) -> Result<(), EncoderError> {
  let (mi_cols, mi_rows) = (ts.rect.mi_cols, ts.rect.mi_rows);
  if bo.x >= mi_cols || bo.y >= mi_rows {
    return Ok(());
  }

  if !fi.profile.partition_coded {
    return match (tree.partition, tree.blocks.as_slice()) {
      (PARTITION_NONE, [d]) => encode_block(fi, fs, ts, cw, w, bo, bsize, d),
      _ => invalid("superblocks of this generation are not partitioned"),
    };
  }

  let p = tree.partition;
  if p.is_extended() && !fi.profile.ext_partition {
    return invalid(format!("{:?} needs extended partitions", p));
  }
  if bsize == BLOCK_8X8 {
    if p != PARTITION_NONE {
      return invalid("8x8 blocks are not partitioned");
    }
  } else {
    if !cw.bc.partition_edge(bo, bsize).allows(p) {
      return invalid(format!(
        "{:?} of {} at ({}, {}) crosses the frame edge",
        p, bsize, bo.x, bo.y
      ));
    }
    cw.write_partition(w, bo, p, bsize, fi.profile.ext_partition);
  }

  if p == PARTITION_SPLIT {
    if tree.children.len() != 4 {
      return invalid(format!("split with {} children", tree.children.len()));
    }
    let subsize = bsize.subsize(p).or_else(|_| invalid("cannot split"))?;
    let hbs = bsize.width_mi() >> 1;
    for (i, child) in tree.children.iter().enumerate() {
      let cbo = bo.with_offset((i & 1) * hbs, (i >> 1) * hbs);
      encode_partition(fi, fs, ts, cw, w, cbo, subsize, child)?;
    }
    return Ok(());
  }

  let blocks = bsize
    .partition_blocks(p)
    .or_else(|_| invalid(format!("{:?} of {}", p, bsize)))?;
  if blocks.len() != tree.blocks.len() {
    return invalid(format!(
      "{:?} with {} blocks, expected {}",
      p,
      tree.blocks.len(),
      blocks.len()
    ));
  }
  for (&(subsize, x, y), d) in blocks.iter().zip(tree.blocks.iter()) {
    let cbo = bo.with_offset(x, y);
    if cbo.x < mi_cols && cbo.y < mi_rows {
      encode_block(fi, fs, ts, cw, w, cbo, subsize, d)?;
    }
  }
  let subsize = bsize.subsize(p).or_else(|_| invalid("bad subsize"))?;
  cw.bc.update_partition_context(bo, subsize, bsize);
  Ok(())
}
