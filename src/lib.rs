// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! rvpx is the bitstream core of a VP8/VP9 family video encoder.
//!
//! It turns decisions made elsewhere (partition trees, prediction modes,
//! motion vectors, transform sizes) and the caller's source and
//! prediction pictures into a packed frame: a boolean arithmetic coded
//! stream of modes and quantized transform coefficients, framed by an
//! uncompressed header, a compressed header of probability updates and
//! one payload per tile.
//!
//! Three bitstream generations share the code:
//!
//! - `Generation::Gen1`: 16x16 macroblocks, a second order DC block and
//!   fixed per-frame probabilities.
//! - `Generation::Gen2`: 64x64 superblocks with coded partitions,
//!   selectable transform sizes and backward adapted probabilities.
//! - `Generation::Gen3`: extended partitions and tile copies on top of
//!   `Gen2`.
//!
//! A [`Decoder`](decoder::Decoder) reads the packed frames back for
//! verification.
//!
//! # Usage
//!
//! Frames are packed with an [`Encoder`] obtained from a [`Config`]:
//!
//! ```no_run
//! use rvpx::prelude::*;
//!
//! # fn main() -> Result<(), EncoderError> {
//! let enc = EncoderConfig { width: 64, height: 64, ..Default::default() };
//! let mut encoder = Config::new().with_encoder_config(enc).new_encoder()?;
//! let source = Frame::new(64, 64, 6);
//! let prediction = Frame::new(64, 64, 6);
//! let decisions = FrameDecisions::new(
//!   1,
//!   1,
//!   vec![PartitionTree::uniform(
//!     BlockSize::BLOCK_64X64,
//!     BlockSize::BLOCK_16X16,
//!     BlockDecision::intra(PredictionMode::DC_PRED, TxSize::TX_8X8),
//!   )],
//! );
//! let packet = encoder.encode_frame(
//!   &FrameParams::key(60),
//!   &source,
//!   &prediction,
//!   &decisions,
//! )?;
//! assert!(!packet.data.is_empty());
//! # Ok(())
//! # }
//! ```

#![deny(bare_trait_objects)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::cast_ptr_alignment)]
#![allow(clippy::cognitive_complexity)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::verbose_bit_mask)]
#![allow(clippy::unreadable_literal)]
#![allow(clippy::many_single_char_names)]
#![warn(clippy::expl_impl_clone_on_copy)]
#![warn(clippy::linkedlist)]
#![warn(clippy::map_flatten)]
#![warn(clippy::mem_forget)]
#![warn(clippy::mut_mut)]
#![warn(clippy::mutex_integer)]
#![warn(clippy::needless_borrow)]
#![warn(clippy::needless_continue)]
#![warn(clippy::path_buf_push_overwrite)]
#![warn(clippy::range_plus_one)]
#![warn(clippy::inconsistent_struct_constructor)]
#![warn(clippy::unused_self)]

mod serialize {
  cfg_if::cfg_if! {
    if #[cfg(feature="serialize")] {
      pub use serde::*;
    } else {
      pub use noop_proc_macro::{Deserialize, Serialize};
    }
  }
}

pub(crate) mod util;

pub mod context;
pub mod decoder;
pub mod ec;
pub mod encoder;
pub mod frame;
pub mod header;
pub mod mv;
pub mod partition;
pub mod profile;
pub mod quantize;
pub mod rdo;
pub mod segmentation;
pub mod stats;
pub mod tables;
pub mod tiling;
pub mod token;
pub mod transform;

mod api;

pub use crate::api::{
  Config, DecoderError, EncoderConfig, EncoderError, FrameParams,
  FrameType, InvalidConfig, Packet,
};
pub use crate::encoder::Encoder;

/// Commonly used types and traits.
pub mod prelude {
  pub use crate::api::*;
  pub use crate::decoder::{DecodedFrame, Decoder};
  pub use crate::encoder::Encoder;
  pub use crate::frame::{Frame, Plane, PlaneConfig};
  pub use crate::mv::MotionVector;
  pub use crate::partition::{
    BlockDecision, BlockSize, FrameDecisions, PartitionTree, PartitionType,
    PredictionMode, RefFrame,
  };
  pub use crate::profile::{CodecProfile, Generation};
  pub use crate::segmentation::{SegLvl, SegmentationState};
  pub use crate::stats::EncoderStats;
  pub use crate::transform::{TxMode, TxSize};
}
