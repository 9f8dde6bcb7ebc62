// Copyright (c) 2020-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use thiserror::Error;

use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;

use crate::encoder::Encoder;

mod encoder;
pub use encoder::*;

pub use crate::tiling::TilingInfo;

/// Enumeration of possible invalid configuration errors.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum InvalidConfig {
  /// The width is invalid.
  #[error("invalid width {0} (expected >= 1, <= 65536)")]
  InvalidWidth(usize),
  /// The height is invalid.
  #[error("invalid height {0} (expected >= 1, <= 65536)")]
  InvalidHeight(usize),
  /// Tile columns log2 is invalid.
  #[error("invalid tile cols log2 {0} (expected <= 6)")]
  InvalidTileColsLog2(usize),
  /// Tile rows log2 is invalid.
  #[error("invalid tile rows log2 {0} (expected <= 6)")]
  InvalidTileRowsLog2(usize),
  /// The output capacity is invalid.
  #[error("invalid max frame bytes {0} (expected > 0)")]
  InvalidMaxFrameBytes(usize),
  /// The quantizer index is invalid.
  #[error("invalid quantizer index {actual} (expected <= {max})")]
  InvalidQuantizer {
    /// The actual value.
    actual: usize,
    /// The maximal supported value.
    max: usize,
  },
  /// A quantizer delta is out of range or unused by the generation.
  #[error("invalid quantizer delta {0} (expected >= -15, <= 15)")]
  InvalidQuantizerDelta(i8),
  /// The zero-bin over-quantization is invalid.
  #[error("invalid zbin over quant {0} (expected >= 0, <= 127)")]
  InvalidZbinOverQuant(i32),
  /// The frame context slot is invalid.
  #[error("invalid frame context index {0} (expected < 4)")]
  InvalidFrameContextIdx(u8),
  /// The loop filter parameters do not fit the header.
  #[error("invalid loop filter parameters")]
  InvalidLoopFilter,
  /// A segment feature value is out of range.
  #[error("invalid segmentation data for segment {segment}")]
  InvalidSegmentation {
    /// The first segment carrying an invalid value.
    segment: usize,
  },
}

/// Contains the encoder configuration.
#[derive(Clone, Debug, Default)]
pub struct Config {
  /// Settings which impact the produced bitstream.
  pub(crate) enc: EncoderConfig,
  /// The number of threads in the threadpool.
  pub(crate) threads: usize,
}

impl Config {
  /// Create a default configuration
  ///
  /// same as `Default::default()`
  pub fn new() -> Self {
    Config::default()
  }

  /// Set the encoder configuration
  ///
  /// `EncoderConfig` contains the settings impacting the
  /// codec features used in the produced bitstream.
  pub fn with_encoder_config(mut self, enc: EncoderConfig) -> Self {
    self.enc = enc;
    self
  }

  /// Set the number of workers in the threadpool
  ///
  /// The threadpool packs the tiles of a frame.
  ///
  /// If it is left unset, the encoder will use the default global
  /// threadpool provided by Rayon instead.
  pub const fn with_threads(mut self, threads: usize) -> Self {
    self.threads = threads;
    self
  }

  /// Create a new threadpool with this configuration if set,
  /// or return `None` if global threadpool should be used instead.
  pub(crate) fn new_thread_pool(&self) -> Option<Arc<ThreadPool>> {
    if self.threads == 0 {
      return None;
    }
    match ThreadPoolBuilder::new().num_threads(self.threads).build() {
      Ok(pool) => Some(Arc::new(pool)),
      Err(e) => {
        log::warn!("falling back to the global threadpool: {}", e);
        None
      }
    }
  }

  /// Creates an [`Encoder`] with this configuration.
  ///
  /// # Errors
  ///
  /// Returns `InvalidConfig` if the config is invalid.
  ///
  /// # Examples
  ///
  /// ```
  /// use rvpx::prelude::*;
  ///
  /// # fn main() -> Result<(), InvalidConfig> {
  /// let cfg = Config::default();
  /// let encoder = cfg.new_encoder()?;
  /// # Ok(())
  /// # }
  /// ```
  pub fn new_encoder(&self) -> Result<Encoder, InvalidConfig> {
    self.validate()?;
    Ok(Encoder::new(self.enc.clone(), self.new_thread_pool()))
  }

  /// Validates the configuration.
  ///
  /// # Errors
  ///
  /// - Returns `InvalidConfig` if the frame size, the tiling or the
  ///   capacity is invalid.
  pub fn validate(&self) -> Result<(), InvalidConfig> {
    self.enc.validate()
  }
}
