// Copyright (c) 2020, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use itertools::*;

use crate::api::{FrameType, InvalidConfig};
use crate::context::FRAME_CONTEXTS;
use crate::profile::{CodecProfile, Generation};
use crate::quantize::{QuantDeltas, MAXQ};
use crate::segmentation::SegmentationState;
use crate::serialize::{Deserialize, Serialize};
use crate::tiling::{TilingInfo, MAX_TILE_LOG2};
use crate::transform::TxMode;

use std::fmt;

/// Largest frame dimension the header can carry.
pub(crate) const MAX_FRAME_DIMENSION: usize = 1 << 16;
/// Largest magnitude of a quantizer delta.
pub(crate) const MAX_QUANT_DELTA: i8 = 15;
/// Largest magnitude of a loop filter delta.
pub(crate) const MAX_LF_DELTA: i8 = 63;

/// Encoder settings which impact the produced bitstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderConfig {
  // output size
  /// Width of the frames in pixels.
  pub width: usize,
  /// Height of the frames in pixels.
  pub height: usize,

  /// Bitstream generation.
  pub generation: Generation,

  /// log2 of the requested number of tile columns. Clamped to what the
  /// frame width allows.
  pub tile_cols_log2: usize,
  /// log2 of the requested number of tile rows.
  pub tile_rows_log2: usize,

  /// Run the trellis on every transform block.
  pub trellis: bool,

  /// Byte capacity of one packed frame.
  pub max_frame_bytes: usize,
}

/// Default preset for `EncoderConfig`: 640x480, one tile.
impl Default for EncoderConfig {
  fn default() -> Self {
    EncoderConfig {
      width: 640,
      height: 480,
      generation: Generation::default(),
      tile_cols_log2: 0,
      tile_rows_log2: 0,
      trellis: true,
      max_frame_bytes: 1 << 22,
    }
  }
}

impl EncoderConfig {
  /// Bitstream features of the configured generation.
  pub const fn profile(&self) -> CodecProfile {
    CodecProfile::new(self.generation)
  }

  /// Tiling of every frame.
  pub fn tiling(&self) -> TilingInfo {
    TilingInfo::new(
      self.profile().sb_size_log2(),
      self.width,
      self.height,
      self.tile_cols_log2,
      self.tile_rows_log2,
    )
  }

  /// Validates the configuration.
  ///
  /// # Errors
  ///
  /// - Returns `InvalidConfig` if the frame size, the tiling or the
  ///   capacity is invalid.
  pub fn validate(&self) -> Result<(), InvalidConfig> {
    use InvalidConfig::*;

    if self.width == 0 || self.width > MAX_FRAME_DIMENSION {
      return Err(InvalidWidth(self.width));
    }
    if self.height == 0 || self.height > MAX_FRAME_DIMENSION {
      return Err(InvalidHeight(self.height));
    }
    if self.tile_cols_log2 > MAX_TILE_LOG2 {
      return Err(InvalidTileColsLog2(self.tile_cols_log2));
    }
    if self.tile_rows_log2 > MAX_TILE_LOG2 {
      return Err(InvalidTileRowsLog2(self.tile_rows_log2));
    }
    if self.max_frame_bytes == 0 {
      return Err(InvalidMaxFrameBytes(self.max_frame_bytes));
    }
    Ok(())
  }
}

impl fmt::Display for EncoderConfig {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let pairs = [
      ("size", format!("{}x{}", self.width, self.height)),
      ("generation", self.generation.to_string()),
      ("tile_cols_log2", self.tile_cols_log2.to_string()),
      ("tile_rows_log2", self.tile_rows_log2.to_string()),
      ("trellis", self.trellis.to_string()),
      ("max_frame_bytes", self.max_frame_bytes.to_string()),
    ];
    write!(
      f,
      "{}",
      pairs.iter().map(|pair| format!("{}={}", pair.0, pair.1)).join(" ")
    )
  }
}

/// Loop filter parameters. Only serialized, the filter itself runs
/// outside the encoder core.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopFilterParams {
  /// Filter level, 6 bits.
  pub level: u8,
  /// Sharpness, 3 bits.
  pub sharpness: u8,
  /// Whether the reference and mode deltas are sent.
  pub deltas_enabled: bool,
  /// Per reference frame adjustments.
  pub ref_deltas: [i8; 4],
  /// Per mode adjustments.
  pub mode_deltas: [i8; 2],
}

impl LoopFilterParams {
  fn validate(&self) -> Result<(), InvalidConfig> {
    let deltas_ok = self
      .ref_deltas
      .iter()
      .chain(self.mode_deltas.iter())
      .all(|d| (-MAX_LF_DELTA..=MAX_LF_DELTA).contains(d));
    if self.level >= 64 || self.sharpness >= 8 || !deltas_ok {
      return Err(InvalidConfig::InvalidLoopFilter);
    }
    Ok(())
  }
}

/// Per frame parameters supplied by the caller along with the decisions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameParams {
  /// Type of the frame.
  pub frame_type: FrameType,
  /// Whether the frame is meant for display.
  pub show_frame: bool,
  /// Reset every probability slot and disable backward adaptation.
  pub error_resilient: bool,
  /// Reference slots replaced by this frame (last, golden, altref).
  pub refresh_frame_flags: u8,
  /// Base quantizer index.
  pub base_q_idx: u8,
  /// Per plane quantizer deltas.
  pub deltas: QuantDeltas,
  /// Transform size mode. Ignored by generations with 4x4 transforms
  /// only.
  pub tx_mode: TxMode,
  /// Store the adapted probabilities into `frame_context_idx`.
  pub refresh_frame_context: bool,
  /// Skip backward adaptation.
  pub frame_parallel: bool,
  /// Probability slot the frame codes with.
  pub frame_context_idx: u8,
  /// Loop filter parameters.
  pub loop_filter: LoopFilterParams,
  /// Segment features.
  pub segmentation: SegmentationState,
  /// Extra zero-bin width in 1/128 of the AC quantizer.
  pub zbin_over_quant: i32,
}

impl Default for FrameParams {
  fn default() -> Self {
    FrameParams {
      frame_type: FrameType::KEY,
      show_frame: true,
      error_resilient: false,
      refresh_frame_flags: 0b111,
      base_q_idx: 40,
      deltas: QuantDeltas::default(),
      tx_mode: TxMode::TX_MODE_SELECT,
      refresh_frame_context: true,
      frame_parallel: false,
      frame_context_idx: 0,
      loop_filter: LoopFilterParams::default(),
      segmentation: SegmentationState::default(),
      zbin_over_quant: 0,
    }
  }
}

impl FrameParams {
  /// Key frame parameters at quantizer index `base_q_idx`.
  pub fn key(base_q_idx: u8) -> Self {
    FrameParams { base_q_idx, ..Default::default() }
  }

  /// Inter frame parameters at quantizer index `base_q_idx`, refreshing
  /// the last frame only.
  pub fn inter(base_q_idx: u8) -> Self {
    FrameParams {
      frame_type: FrameType::INTER,
      refresh_frame_flags: 0b001,
      base_q_idx,
      ..Default::default()
    }
  }

  /// Validates the parameters against the generation.
  ///
  /// # Errors
  ///
  /// - Returns `InvalidConfig` if a value does not fit its header field
  ///   or is not carried by the generation.
  pub fn validate(&self, profile: &CodecProfile) -> Result<(), InvalidConfig> {
    use InvalidConfig::*;

    if self.base_q_idx as usize > MAXQ {
      return Err(InvalidQuantizer {
        actual: self.base_q_idx as usize,
        max: MAXQ,
      });
    }
    let d = &self.deltas;
    let range = -MAX_QUANT_DELTA..=MAX_QUANT_DELTA;
    if let Some(&bad) = [d.y1_dc, d.y2_dc, d.y2_ac, d.uv_dc, d.uv_ac]
      .iter()
      .find(|&&v| !range.contains(&v))
    {
      return Err(InvalidQuantizerDelta(bad));
    }
    if !profile.second_order_dc && (d.y2_dc != 0 || d.y2_ac != 0) {
      return Err(InvalidQuantizerDelta(if d.y2_dc != 0 {
        d.y2_dc
      } else {
        d.y2_ac
      }));
    }
    if !(0..=127).contains(&self.zbin_over_quant) {
      return Err(InvalidZbinOverQuant(self.zbin_over_quant));
    }
    if self.frame_context_idx as usize >= FRAME_CONTEXTS {
      return Err(InvalidFrameContextIdx(self.frame_context_idx));
    }
    self.loop_filter.validate()?;
    self.segmentation.validate()
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn config_validation() {
    let mut config = EncoderConfig::default();
    assert!(config.validate().is_ok());
    config.width = 0;
    assert_eq!(config.validate(), Err(InvalidConfig::InvalidWidth(0)));
    config.width = 64;
    config.tile_rows_log2 = 7;
    assert_eq!(config.validate(), Err(InvalidConfig::InvalidTileRowsLog2(7)));
  }

  #[test]
  fn frame_params_validation() {
    let gen1 = CodecProfile::new(Generation::Gen1);
    let gen2 = CodecProfile::new(Generation::Gen2);
    let mut params = FrameParams::key(40);
    assert!(params.validate(&gen2).is_ok());

    params.deltas.y2_ac = -4;
    assert!(params.validate(&gen1).is_ok());
    assert_eq!(
      params.validate(&gen2),
      Err(InvalidConfig::InvalidQuantizerDelta(-4))
    );

    params = FrameParams::inter(200);
    assert!(matches!(
      params.validate(&gen2),
      Err(InvalidConfig::InvalidQuantizer { actual: 200, .. })
    ));

    params = FrameParams { frame_context_idx: 4, ..FrameParams::key(1) };
    assert_eq!(
      params.validate(&gen2),
      Err(InvalidConfig::InvalidFrameContextIdx(4))
    );

    params = FrameParams::key(1);
    params.loop_filter.level = 64;
    assert_eq!(params.validate(&gen2), Err(InvalidConfig::InvalidLoopFilter));
  }
}
