// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

#![allow(non_upper_case_globals)]

use super::*;

use crate::ec::{BoolReader, Writer};
use crate::partition::BlockSize::*;
use crate::partition::PartitionType::*;
use crate::partition::*;
use crate::tables::tables;

use num_traits::FromPrimitive;

// Generates 4 bit field in which each bit set to 1 represents
// a blocksize partition  1110 means we split 64x64, 32x32 and 16x16.
// 1000 means we just split the 64x64 to 32x32
pub static partition_context_lookup: [[u8; 2]; BlockSize::BLOCK_SIZES] = [
  [14, 14], // 8X8   - {0b1110, 0b1110}
  [14, 12], // 8X16  - {0b1110, 0b1100}
  [12, 14], // 16X8  - {0b1100, 0b1110}
  [12, 12], // 16X16 - {0b1100, 0b1100}
  [12, 8],  // 16X32 - {0b1100, 0b1000}
  [8, 12],  // 32X16 - {0b1000, 0b1100}
  [8, 8],   // 32X32 - {0b1000, 0b1000}
  [8, 0],   // 32X64 - {0b1000, 0b0000}
  [0, 8],   // 64X32 - {0b0000, 0b1000}
  [0, 0],   // 64X64 - {0b0000, 0b0000}
];

/// Which halves of a square node lie inside the tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartitionEdge {
  pub has_rows: bool,
  pub has_cols: bool,
}

impl PartitionEdge {
  /// Partitions codable at this edge.
  pub fn allows(self, p: PartitionType) -> bool {
    match (self.has_rows, self.has_cols) {
      (true, true) => true,
      (false, true) => p == PARTITION_SPLIT || p == PARTITION_HORZ,
      (true, false) => p == PARTITION_SPLIT || p == PARTITION_VERT,
      (false, false) => p == PARTITION_SPLIT,
    }
  }
}

impl BlockContext {
  pub fn partition_edge(
    &self, bo: BlockOffset, bsize: BlockSize,
  ) -> PartitionEdge {
    let hbs = bsize.width_mi() / 2;
    PartitionEdge {
      has_rows: (bo.y + hbs) < self.blocks.rows(),
      has_cols: (bo.x + hbs) < self.blocks.cols(),
    }
  }

  /// # Panics
  ///
  /// - If called with a non-square `bsize` or a `BLOCK_8X8`
  pub fn partition_plane_context(
    &self, bo: BlockOffset, bsize: BlockSize,
  ) -> usize {
    assert!(bsize.is_sqr() && bsize > BLOCK_8X8);
    let sb_mask = (1 << (self.sb_size_log2() - MI_SIZE_LOG2)) - 1;
    let above_ctx = self.above_partition_context[bo.x];
    let left_ctx = self.left_partition_context[bo.y & sb_mask];
    let bsl = bsize.width_log2() - BLOCK_8X8.width_log2();
    let above = (above_ctx >> bsl) & 1;
    let left = (left_ctx >> bsl) & 1;

    (left * 2 + above) as usize + (bsl - 1) * PARTITION_PLOFFSET
  }

  /// # Panics
  ///
  /// - If called with a non-square `bsize`
  pub fn update_partition_context(
    &mut self, bo: BlockOffset, subsize: BlockSize, bsize: BlockSize,
  ) {
    assert!(bsize.is_sqr());

    let bs = bsize.width_mi();
    let sb_mask = (1 << (self.sb_size_log2() - MI_SIZE_LOG2)) - 1;
    let y = bo.y & sb_mask;

    // set partition bits of block sizes larger than the current one to be
    // one, and partition bits of smaller block sizes to be zero.
    for above in &mut self.above_partition_context[bo.x..][..bs] {
      *above = partition_context_lookup[subsize as usize][0];
    }
    for left in &mut self.left_partition_context[y..][..bs] {
      *left = partition_context_lookup[subsize as usize][1];
    }
  }
}

impl<'a> ContextWriter<'a> {
  /// Write the partition of a square node. At the tile edge only the
  /// choices that leave a block inside are coded.
  ///
  /// # Panics
  ///
  /// - If `p` is not codable at this position
  pub fn write_partition(
    &mut self, w: &mut impl Writer, bo: BlockOffset, p: PartitionType,
    bsize: BlockSize, ext_partition: bool,
  ) {
    let edge = self.bc.partition_edge(bo, bsize);
    assert!(edge.allows(p));
    let ctx = self.bc.partition_plane_context(bo, bsize);
    assert!(ctx < PARTITION_CONTEXTS);
    let probs = &self.fc.partition_probs[ctx];
    self.counts.partition[ctx][p as usize] += 1;

    match (edge.has_rows, edge.has_cols) {
      (true, true) => {
        let t = tables();
        if ext_partition {
          let token = t.ext_partition_tokens[p as usize];
          w.write_token(EXT_PARTITION_TREE, probs, token);
        } else {
          let token = t.partition_tokens[p as usize];
          w.write_token(PARTITION_TREE, probs, token);
        }
      }
      (false, true) => w.bool(p == PARTITION_SPLIT, probs[1]),
      (true, false) => w.bool(p == PARTITION_SPLIT, probs[2]),
      (false, false) => {}
    }
  }
}

impl<'a> ContextReader<'a> {
  pub fn read_partition(
    &mut self, r: &mut BoolReader, bo: BlockOffset, bsize: BlockSize,
    ext_partition: bool,
  ) -> PartitionType {
    let edge = self.bc.partition_edge(bo, bsize);
    let ctx = self.bc.partition_plane_context(bo, bsize);
    let probs = &self.fc.partition_probs[ctx];

    let p = match (edge.has_rows, edge.has_cols) {
      (true, true) => {
        let tree =
          if ext_partition { EXT_PARTITION_TREE } else { PARTITION_TREE };
        PartitionType::from_usize(r.read_tree(tree, probs))
          .unwrap_or(PARTITION_SPLIT)
      }
      (false, true) => {
        if r.read_bool(probs[1]) {
          PARTITION_SPLIT
        } else {
          PARTITION_HORZ
        }
      }
      (true, false) => {
        if r.read_bool(probs[2]) {
          PARTITION_SPLIT
        } else {
          PARTITION_VERT
        }
      }
      (false, false) => PARTITION_SPLIT,
    };
    self.counts.partition[ctx][p as usize] += 1;
    p
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::ec::WriterEncoder;
  use crate::tiling::TilingInfo;

  #[test]
  fn partition_contexts_follow_neighbor_sizes() {
    let ti = TilingInfo::new(6, 128, 128, 0, 0);
    let mut bc = BlockContext::new(&ti.tile_rect(0), 6);
    let bo = BlockOffset { x: 8, y: 0 };
    assert_eq!(bc.partition_plane_context(bo, BLOCK_64X64), 8);
    assert_eq!(bc.partition_plane_context(bo, BLOCK_16X16), 0);

    // A 64x64 split into 32x32 quadrants to the left.
    bc.update_partition_context(
      BlockOffset { x: 0, y: 0 },
      BLOCK_32X32,
      BLOCK_64X64,
    );
    assert_eq!(bc.partition_plane_context(bo, BLOCK_64X64), 8 + 2);
    assert_eq!(bc.partition_plane_context(bo, BLOCK_32X32), 4);

    bc.reset_left_contexts();
    assert_eq!(bc.partition_plane_context(bo, BLOCK_64X64), 8);
  }

  #[test]
  fn edge_partitions_round_trip() {
    // 96x80: the second superblock column only has its left half.
    let ti = TilingInfo::new(6, 96, 80, 0, 0);
    let tile = ti.tile_rect(0);
    let fc = FrameContext::default();
    let mut cw = ContextWriter::new(&fc, BlockContext::new(&tile, 6));
    let right = BlockOffset { x: 8, y: 0 };
    let bottom = BlockOffset { x: 0, y: 8 };
    let corner = BlockOffset { x: 8, y: 8 };
    assert_eq!(
      cw.bc.partition_edge(right, BLOCK_64X64),
      PartitionEdge { has_rows: true, has_cols: false }
    );
    assert!(!cw.bc.partition_edge(bottom, BLOCK_64X64).allows(PARTITION_VERT));

    let mut w = WriterEncoder::new();
    cw.write_partition(&mut w, right, PARTITION_VERT, BLOCK_64X64, true);
    cw.write_partition(&mut w, bottom, PARTITION_HORZ, BLOCK_64X64, true);
    cw.write_partition(&mut w, corner, PARTITION_SPLIT, BLOCK_64X64, true);
    cw.write_partition(
      &mut w,
      BlockOffset { x: 0, y: 0 },
      PARTITION_VERT_B,
      BLOCK_64X64,
      true,
    );
    let data = w.done().unwrap();

    let mut cr = ContextReader::new(&fc, BlockContext::new(&tile, 6));
    let mut r = BoolReader::new(&data);
    assert_eq!(
      cr.read_partition(&mut r, right, BLOCK_64X64, true),
      PARTITION_VERT
    );
    assert_eq!(
      cr.read_partition(&mut r, bottom, BLOCK_64X64, true),
      PARTITION_HORZ
    );
    assert_eq!(
      cr.read_partition(&mut r, corner, BLOCK_64X64, true),
      PARTITION_SPLIT
    );
    assert_eq!(
      cr.read_partition(&mut r, BlockOffset { x: 0, y: 0 }, BLOCK_64X64, true),
      PARTITION_VERT_B
    );
    assert_eq!(cw.counts, cr.counts);
  }
}
