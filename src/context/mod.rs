// Copyright (c) 2017-2023, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]

pub const PLANES: usize = 3;

pub const BLOCK_TYPES: usize = 4;
pub const COEF_BANDS: usize = 8;
pub const PREV_COEF_CONTEXTS: usize = 3;

pub const INTRA_MODES: usize = 10;
pub const INTER_MODES: usize = 4;
pub const INTER_MODE_CONTEXTS: usize = 7;
pub const BLOCK_SIZE_GROUPS: usize = 4;

pub const PARTITION_PLOFFSET: usize = 4;
/// Partition symbols are coded at 16x16, 32x32 and 64x64 nodes.
pub const PARTITION_CONTEXTS: usize = 3 * PARTITION_PLOFFSET;
pub const PARTITION_TYPES: usize = 4;
pub const EXT_PARTITION_TYPES: usize = 8;

pub const SKIP_CONTEXTS: usize = 3;
pub const INTRA_INTER_CONTEXTS: usize = 4;
pub const REF_CONTEXTS: usize = 3;
/// Intra plus the three references.
pub const REF_FRAMES: usize = 4;
pub const TX_SIZE_CONTEXTS: usize = 2;

pub const MAX_SEGMENTS: usize = 4;
pub const SEG_TREE_PROBS: usize = MAX_SEGMENTS - 1;

/// Number of frame context slots.
pub const FRAME_CONTEXTS: usize = 4;

pub const MV_PROBS: usize = 19;

mod tree;
pub use tree::*;

mod default_probs;
pub use default_probs::*;

mod frame_context;
pub use frame_context::*;

mod adapt;
pub use adapt::*;

mod block_unit;
pub use block_unit::*;

mod partition_unit;
pub use partition_unit::*;

mod transform_unit;
pub use transform_unit::*;

mod frame_header;
pub use frame_header::*;
