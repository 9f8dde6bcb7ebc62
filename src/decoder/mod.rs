// Copyright (c) 2018-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Reads back what the encoder packs: headers, decisions, coefficients
//! and the reconstruction made from a caller supplied prediction.

mod tile;

pub use self::tile::*;

use crate::api::DecoderError;
use crate::context::*;
use crate::ec::BoolReader;
use crate::frame::Frame;
use crate::header::*;
use crate::partition::{FrameDecisions, PartitionTree};
use crate::tiling::TilingInfo;

use std::ops::Range;

/// Everything read from one frame.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
  pub header: FrameHeader,
  /// Partition trees in superblock raster order. Blocks outside the
  /// frame are not coded and read back as `BlockDecision::default()`.
  pub decisions: FrameDecisions,
  /// Transform blocks in coding order.
  pub tx_blocks: Vec<DecodedTxBlock>,
  pub rec: Frame,
  /// Probabilities the tiles were read with.
  pub fc: FrameContext,
  pub counts: FrameCounts,
  /// Probability updates carried by the compressed header.
  pub prob_updates: usize,
}

/// Keeps the probability slots and the last header across frames, the
/// same way the encoder does.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
  frame_contexts: [FrameContext; 4],
  last_header: Option<FrameHeader>,
}

impl Decoder {
  pub fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub fn frame_context(&self, idx: usize) -> &FrameContext {
    &self.frame_contexts[idx & 3]
  }

  /// Decode one frame. `prediction` must have the size of the frame;
  /// every block is reconstructed on top of it.
  ///
  /// The decoder state is only updated when the whole frame was read.
  ///
  /// # Errors
  ///
  /// - `DecoderError` if the data is truncated, malformed or the
  ///   prediction does not fit the frame.
  pub fn decode(
    &mut self, data: &[u8], prediction: &Frame,
  ) -> Result<DecodedFrame, DecoderError> {
    let (header, header_len) =
      read_uncompressed_header(data, self.last_header.as_ref())?;
    let profile = header.profile();
    let compressed_end = header_len + header.compressed_header_size;
    let compressed =
      data.get(header_len..compressed_end).ok_or(DecoderError::Truncated)?;

    let mut contexts = if header.resets_contexts() {
      Default::default()
    } else {
      self.frame_contexts.clone()
    };
    let idx = header.frame_context_idx as usize & 3;
    let pre_fc = contexts[idx].clone();
    let mut fc = pre_fc.clone();
    let mut r = BoolReader::new(compressed);
    let prob_updates = read_compressed_header(&mut r, &header, &mut fc);

    let tiling = TilingInfo::new(
      profile.sb_size_log2(),
      header.width,
      header.height,
      header.tile_cols_log2,
      header.tile_rows_log2,
    );
    if tiling.tile_cols_log2 != header.tile_cols_log2
      || tiling.tile_rows_log2 != header.tile_rows_log2
    {
      return Err(DecoderError::InvalidSymbol("tile layout"));
    }
    if !tiling.covers(prediction) {
      return Err(DecoderError::PredictionMismatch);
    }

    let ranges = tile_ranges(data, compressed_end, &header, &tiling)?;
    let quantizers = header.segment_quantizers();
    let mut rec =
      Frame::new(header.width, header.height, tiling.sb_size_log2);
    let mut counts = FrameCounts::default();
    let mut trees: Vec<Option<PartitionTree>> =
      vec![None; tiling.sb_cols * tiling.sb_rows];
    let mut tx_blocks = Vec::new();

    for rect in tiling.tile_rects() {
      let payload = &data[ranges[rect.index].clone()];
      let tile =
        decode_tile(&header, &fc, &quantizers, rect, payload, prediction)?;
      tile.ts.copy_into(&mut rec);
      counts.accumulate(&tile.counts);
      for (i, tree) in tile.trees.into_iter().enumerate() {
        let sbx = rect.sbx + i % rect.sb_cols;
        let sby = rect.sby + i / rect.sb_cols;
        trees[sby * tiling.sb_cols + sbx] = Some(tree);
      }
      tx_blocks.extend(tile.tx_blocks);
    }
    let trees = trees
      .into_iter()
      .collect::<Option<Vec<_>>>()
      .ok_or(DecoderError::InvalidSymbol("superblock outside every tile"))?;

    let last_was_key = self.last_header.as_ref().map_or(false, |h| h.is_key());
    let mut adapted = fc.clone();
    adapt_frame_context(&header, &pre_fc, &counts, &mut adapted, last_was_key);
    if header.refresh_frame_context {
      contexts[idx] = adapted;
    }

    log::debug!(
      "decoded {} frame {}x{}: {} tiles, {} probability updates",
      header.frame_type,
      header.width,
      header.height,
      tiling.tile_count(),
      prob_updates
    );

    self.frame_contexts = contexts;
    self.last_header = Some(header.clone());
    Ok(DecodedFrame {
      header,
      decisions: FrameDecisions::new(tiling.sb_cols, tiling.sb_rows, trees),
      tx_blocks,
      rec,
      fc,
      counts,
      prob_updates,
    })
  }
}

/// Byte range of every tile payload. A copied tile resolves to the range
/// of the tile it repeats.
fn tile_ranges(
  data: &[u8], mut pos: usize, fh: &FrameHeader, tiling: &TilingInfo,
) -> Result<Vec<Range<usize>>, DecoderError> {
  let profile = fh.profile();
  let count = tiling.tile_count();
  let mut ranges: Vec<Range<usize>> = Vec::with_capacity(count);
  for i in 0..count {
    let last = i + 1 == count;
    if !profile.all_tiles_prefixed && last {
      let start = pos.min(data.len());
      ranges.push(start..data.len());
      break;
    }
    let field = data.get(pos..).ok_or(DecoderError::Truncated)?;
    let (size, copy) = read_tile_size(
      field,
      fh.tile_size_bytes,
      profile.tile_size_order,
      profile.tile_copy,
    )?;
    pos += fh.tile_size_bytes;
    if copy {
      let back = size * tiling.cols;
      if size == 0 || back > i {
        return Err(DecoderError::InvalidSymbol("tile copy offset"));
      }
      let src = ranges[i - back].clone();
      ranges.push(src);
      continue;
    }
    let available = data.len().saturating_sub(pos);
    if size > available {
      return Err(DecoderError::BadTileSize { size, available });
    }
    ranges.push(pos..pos + size);
    pos += size;
  }
  Ok(ranges)
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::api::*;
  use crate::partition::*;
  use crate::profile::Generation;

  fn frames(config: &EncoderConfig) -> (Frame, Frame) {
    let sb_size_log2 = config.profile().sb_size_log2();
    let mut source = Frame::new(config.width, config.height, sb_size_log2);
    for (p, plane) in source.planes.iter_mut().enumerate() {
      for (i, v) in plane.data.iter_mut().enumerate() {
        *v = ((i * (5 + p) + i / 13) % 256) as u8;
      }
    }
    let mut pred = Frame::new(config.width, config.height, sb_size_log2);
    for plane in pred.planes.iter_mut() {
      plane.fill(128);
    }
    (source, pred)
  }

  fn decisions(config: &EncoderConfig) -> FrameDecisions {
    let profile = config.profile();
    let tiling = config.tiling();
    let sb = BlockSize::square(profile.sb_size_log2()).unwrap();
    let (leaf, tx) = match config.generation {
      Generation::Gen1 => (sb, crate::transform::TxSize::TX_4X4),
      _ => (BlockSize::BLOCK_16X16, crate::transform::TxSize::TX_8X8),
    };
    let d = BlockDecision::intra(PredictionMode::V_PRED, tx);
    FrameDecisions::new(
      tiling.sb_cols,
      tiling.sb_rows,
      vec![
        PartitionTree::uniform(sb, leaf, d);
        tiling.sb_cols * tiling.sb_rows
      ],
    )
  }

  #[test]
  fn key_frame_reads_back() {
    for generation in [Generation::Gen1, Generation::Gen2, Generation::Gen3] {
      let config = EncoderConfig {
        width: 128,
        height: 64,
        generation,
        ..Default::default()
      };
      let (source, pred) = frames(&config);
      let decisions = decisions(&config);
      let mut enc =
        Config::new().with_encoder_config(config).new_encoder().unwrap();
      let packet = enc
        .encode_frame(&FrameParams::key(40), &source, &pred, &decisions)
        .unwrap();

      let mut dec = Decoder::new();
      let frame = dec.decode(&packet.data, &pred).unwrap();
      assert_eq!(frame.decisions, decisions, "{generation}");
      assert!(frame.rec.visible_eq(&packet.rec), "{generation}");
      assert!(!frame.tx_blocks.is_empty());
      assert_eq!(dec.frame_context(0), enc.frame_context(0));
    }
  }

  #[test]
  fn truncated_data_is_rejected() {
    let config = EncoderConfig { width: 64, height: 64, ..Default::default() };
    let (source, pred) = frames(&config);
    let mut enc =
      Config::new().with_encoder_config(config).new_encoder().unwrap();
    let packet = enc
      .encode_frame(&FrameParams::key(40), &source, &pred, &decisions(&config))
      .unwrap();
    let mut dec = Decoder::new();
    assert!(dec.decode(&packet.data[..3], &pred).is_err());
    assert!(dec.last_header.is_none());
  }

  #[test]
  fn prediction_must_fit() {
    let config = EncoderConfig { width: 64, height: 64, ..Default::default() };
    let (source, pred) = frames(&config);
    let mut enc =
      Config::new().with_encoder_config(config).new_encoder().unwrap();
    let packet = enc
      .encode_frame(&FrameParams::key(40), &source, &pred, &decisions(&config))
      .unwrap();
    let small = Frame::new(32, 32, 6);
    assert!(matches!(
      Decoder::new().decode(&packet.data, &small),
      Err(DecoderError::PredictionMismatch)
    ));
  }
}
