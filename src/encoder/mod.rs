// Copyright (c) 2018-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Frame packing: from the decisions of a frame to its bitstream.

mod block;
mod frame;
mod partition;
mod tile;
mod transform;

pub use self::block::*;
pub use self::frame::*;
pub use self::partition::*;
pub use self::tile::*;
pub use self::transform::*;

use crate::api::*;
use crate::context::*;
use crate::frame::Frame;
use crate::header::FrameHeader;
use crate::partition::FrameDecisions;
use crate::profile::CodecProfile;
use crate::quantize::QuantizationContext;
use crate::tiling::TilingInfo;
use crate::token::TokenCosts;

use rayon::ThreadPool;
use std::sync::Arc;

/// Shorthand for a rejected frame.
pub(crate) fn invalid<T>(
  msg: impl Into<String>,
) -> Result<T, EncoderError> {
  Err(EncoderError::InvalidConfiguration(msg.into()))
}

/// Everything fixed for the duration of one frame.
#[derive(Clone)]
pub struct FrameInvariants {
  pub config: EncoderConfig,
  pub profile: CodecProfile,
  pub header: FrameHeader,
  pub tiling: TilingInfo,
  /// One quantizer set per segment.
  pub quantizers: [QuantizationContext; MAX_SEGMENTS],
  /// Token costs of the probabilities the frame starts from. Both coding
  /// passes use them so the trellis decides the same way twice.
  pub token_costs: TokenCosts,
  pub trellis: bool,
  pub zbin_over_quant: i32,
}

impl FrameInvariants {
  pub fn new(
    config: &EncoderConfig, header: FrameHeader, fc: &FrameContext,
    zbin_over_quant: i32,
  ) -> Self {
    let quantizers = header.segment_quantizers();
    FrameInvariants {
      config: *config,
      profile: config.profile(),
      tiling: config.tiling(),
      quantizers,
      token_costs: TokenCosts::new(fc),
      trellis: config.trellis,
      zbin_over_quant,
      header,
    }
  }

  #[inline]
  pub const fn sb_size_log2(&self) -> usize {
    self.tiling.sb_size_log2
  }
}

/// Packs frames one after the other, keeping the probability slots and
/// the state carried from frame to frame.
pub struct Encoder {
  config: EncoderConfig,
  pool: Option<Arc<ThreadPool>>,
  frame_contexts: [FrameContext; FRAME_CONTEXTS],
  last_header: Option<FrameHeader>,
  frames: u64,
}

impl Encoder {
  pub(crate) fn new(
    config: EncoderConfig, pool: Option<Arc<ThreadPool>>,
  ) -> Self {
    Encoder {
      config,
      pool,
      frame_contexts: Default::default(),
      last_header: None,
      frames: 0,
    }
  }

  #[inline]
  pub const fn config(&self) -> &EncoderConfig {
    &self.config
  }

  /// Current content of probability slot `idx`.
  #[inline]
  pub fn frame_context(&self, idx: usize) -> &FrameContext {
    &self.frame_contexts[idx]
  }

  /// Header of the last packed frame.
  #[inline]
  pub fn last_header(&self) -> Option<&FrameHeader> {
    self.last_header.as_ref()
  }

  /// Pack one frame.
  ///
  /// `source` and `prediction` must have the configured size and cover
  /// whole superblocks; `decisions` holds one partition tree per
  /// superblock. On error nothing is emitted and the encoder state is
  /// left as it was.
  ///
  /// # Errors
  ///
  /// - `EncoderError::Config` if `params` fails validation
  /// - `EncoderError::InvalidConfiguration` if the decisions cannot be
  ///   coded, or an inter frame arrives before any key frame
  /// - `EncoderError::BufferOverflow` if the frame exceeds
  ///   `max_frame_bytes`
  pub fn encode_frame(
    &mut self, params: &FrameParams, source: &Frame, prediction: &Frame,
    decisions: &FrameDecisions,
  ) -> Result<Packet, EncoderError> {
    let profile = self.config.profile();
    params.validate(&profile)?;
    if params.frame_type.has_inter() && self.last_header.is_none() {
      return invalid("inter frame without a preceding key frame");
    }

    let tiling = self.config.tiling();
    let mut header = FrameHeader::new(&self.config, params, &tiling);
    let prev_seg = match &self.last_header {
      Some(h) if !header.resets_contexts() => Some(&h.segmentation),
      _ => None,
    };
    header.segmentation = header.segmentation.inherit(prev_seg);

    let mut contexts = if header.resets_contexts() {
      Default::default()
    } else {
      self.frame_contexts.clone()
    };
    let idx = header.frame_context_idx as usize;
    let pre_fc = contexts[idx].clone();

    let zbin_over_quant = params.zbin_over_quant;
    let fi =
      FrameInvariants::new(&self.config, header, &pre_fc, zbin_over_quant);
    let fs = FrameState::new(&fi, source, prediction, decisions)?;
    let coded = encode_frame_data(&fi, &fs, &pre_fc, self.pool.as_deref())?;

    let mut fc = coded.fc;
    let last_was_key = self.last_header.as_ref().map_or(false, |h| h.is_key());
    adapt_frame_context(
      &coded.header,
      &pre_fc,
      &coded.counts,
      &mut fc,
      last_was_key,
    );
    if coded.header.refresh_frame_context {
      contexts[idx] = fc;
    }

    log::debug!(
      "frame {}: {} q {} - {} bytes, {} tiles, {} updates",
      self.frames,
      coded.header.frame_type,
      coded.header.base_q_idx,
      coded.data.len(),
      fi.tiling.tile_count(),
      coded.stats.prob_updates,
    );

    self.frame_contexts = contexts;
    self.last_header = Some(coded.header);
    self.frames += 1;

    Ok(Packet {
      data: coded.data,
      frame_type: params.frame_type,
      qp: params.base_q_idx,
      rec: coded.rec,
      enc_stats: coded.stats,
    })
  }
}
