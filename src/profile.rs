// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use std::fmt;

use num_derive::FromPrimitive;

use crate::context::UpdateCoding;
use crate::partition::BlockSize;
use crate::serialize::{Deserialize, Serialize};
use crate::transform::TxSize;

/// Bitstream generation.
#[derive(
  Clone,
  Copy,
  Debug,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  FromPrimitive,
  Serialize,
  Deserialize,
)]
pub enum Generation {
  /// Macroblocks with 4x4 transforms and a second order DC transform
  Gen1 = 0,
  /// Superblock quad-trees, transforms up to 32x32, adaptive contexts
  Gen2 = 1,
  /// Extended partitions, minimal tile size fields and copy tiles
  Gen3 = 2,
}

impl Default for Generation {
  fn default() -> Self {
    Generation::Gen2
  }
}

impl fmt::Display for Generation {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    let name = match self {
      Generation::Gen1 => "gen1",
      Generation::Gen2 => "gen2",
      Generation::Gen3 => "gen3",
    };
    write!(f, "{}", name)
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ByteOrder {
  Little,
  Big,
}

/// Everything the bitstream does differently between generations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CodecProfile {
  pub generation: Generation,
  /// Superblock size, also the root of the partition tree.
  pub sb_size: BlockSize,
  /// Whether partition symbols are coded at all.
  pub partition_coded: bool,
  /// HORZ_A/HORZ_B/VERT_A/VERT_B partitions.
  pub ext_partition: bool,
  pub max_tx_size: TxSize,
  /// Luma DCs go through the second order transform.
  pub second_order_dc: bool,
  /// Counts are merged into the probabilities after each frame.
  pub backward_adaptation: bool,
  pub prob_update_coding: UpdateCoding,
  /// Width of a tile size field, 0 when chosen per frame.
  pub tile_size_bytes: usize,
  pub tile_size_order: ByteOrder,
  /// The last tile carries a size field as well.
  pub all_tiles_prefixed: bool,
  /// Tiles equal to the tile above may be sent as a back reference.
  pub tile_copy: bool,
}

impl CodecProfile {
  pub const fn new(generation: Generation) -> Self {
    match generation {
      Generation::Gen1 => CodecProfile {
        generation,
        sb_size: BlockSize::BLOCK_16X16,
        partition_coded: false,
        ext_partition: false,
        max_tx_size: TxSize::TX_4X4,
        second_order_dc: true,
        backward_adaptation: false,
        prob_update_coding: UpdateCoding::Literal,
        tile_size_bytes: 3,
        tile_size_order: ByteOrder::Little,
        all_tiles_prefixed: false,
        tile_copy: false,
      },
      Generation::Gen2 => CodecProfile {
        generation,
        sb_size: BlockSize::BLOCK_64X64,
        partition_coded: true,
        ext_partition: false,
        max_tx_size: TxSize::TX_32X32,
        second_order_dc: false,
        backward_adaptation: true,
        prob_update_coding: UpdateCoding::SubExp,
        tile_size_bytes: 4,
        tile_size_order: ByteOrder::Big,
        all_tiles_prefixed: false,
        tile_copy: false,
      },
      Generation::Gen3 => CodecProfile {
        generation,
        sb_size: BlockSize::BLOCK_64X64,
        partition_coded: true,
        ext_partition: true,
        max_tx_size: TxSize::TX_32X32,
        second_order_dc: false,
        backward_adaptation: true,
        prob_update_coding: UpdateCoding::SubExp,
        tile_size_bytes: 0,
        tile_size_order: ByteOrder::Little,
        all_tiles_prefixed: true,
        tile_copy: true,
      },
    }
  }

  #[inline]
  pub const fn sb_size_log2(&self) -> usize {
    self.sb_size.width_log2()
  }

  /// Superblock width in mode info units.
  #[inline]
  pub const fn sb_size_mi(&self) -> usize {
    self.sb_size.width_mi()
  }

  /// Whether the header carries a transform mode.
  #[inline]
  pub const fn codes_tx_mode(&self) -> bool {
    !matches!(self.max_tx_size, TxSize::TX_4X4)
  }
}
