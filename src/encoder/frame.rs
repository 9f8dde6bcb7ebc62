// Copyright (c) 2018-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use super::*;

use crate::ec::{Writer, WriterCounter, WriterEncoder};
use crate::frame::Plane;
use crate::header::*;
use crate::stats::EncoderStats;
use crate::tiling::{TileRect, TileStateMut};

use rayon::ThreadPool;

cfg_if::cfg_if! {
  if #[cfg(feature = "threading")] {
    use rayon::prelude::*;
  }
}

/// The pictures and decisions a frame is packed from.
#[derive(Debug, Clone, Copy)]
pub struct FrameState<'a> {
  pub input: &'a Frame,
  pub prediction: &'a Frame,
  pub decisions: &'a FrameDecisions,
}

fn check_plane(
  name: &str, plane: &Plane, width: usize, height: usize,
) -> Result<(), EncoderError> {
  let cfg = &plane.cfg;
  if cfg.width != width || cfg.height != height {
    return invalid(format!(
      "{} plane is {}x{}, expected {}x{}",
      name, cfg.width, cfg.height, width, height
    ));
  }
  Ok(())
}

fn check_frame(
  name: &str, frame: &Frame, tiling: &TilingInfo,
) -> Result<(), EncoderError> {
  let sb_width = tiling.sb_cols << tiling.sb_size_log2;
  let sb_height = tiling.sb_rows << tiling.sb_size_log2;
  for (i, plane) in frame.planes.iter().enumerate() {
    let dec = (i > 0) as usize;
    let width = (tiling.frame_width + dec) >> dec;
    let height = (tiling.frame_height + dec) >> dec;
    check_plane(name, plane, width, height)?;
    let cfg = &plane.cfg;
    if cfg.stride < sb_width >> dec || cfg.alloc_height < sb_height >> dec {
      return invalid(format!(
        "{} plane {} does not cover whole superblocks",
        name, i
      ));
    }
  }
  Ok(())
}

impl<'a> FrameState<'a> {
  /// # Errors
  ///
  /// - `EncoderError::InvalidConfiguration` if a picture does not match
  ///   the configured size or the decisions do not match the superblock
  ///   grid.
  pub fn new(
    fi: &FrameInvariants, input: &'a Frame, prediction: &'a Frame,
    decisions: &'a FrameDecisions,
  ) -> Result<Self, EncoderError> {
    check_frame("source", input, &fi.tiling)?;
    check_frame("prediction", prediction, &fi.tiling)?;
    let (cols, rows) = (fi.tiling.sb_cols, fi.tiling.sb_rows);
    if decisions.sb_cols != cols
      || decisions.sb_rows != rows
      || decisions.trees.len() != cols * rows
    {
      return invalid(format!(
        "{} trees on a {}x{} grid, expected {}x{} superblocks",
        decisions.trees.len(),
        decisions.sb_cols,
        decisions.sb_rows,
        cols,
        rows
      ));
    }
    Ok(FrameState { input, prediction, decisions })
  }
}

/// One packed frame along with what the encoder keeps from it.
pub struct CodedFrame {
  /// The header as sent.
  pub header: FrameHeader,
  pub data: Vec<u8>,
  /// Probabilities the tiles were coded with.
  pub fc: FrameContext,
  /// Symbol counts of every tile.
  pub counts: FrameCounts,
  pub rec: Frame,
  pub stats: EncoderStats,
}

/// Run `f` over every tile, in parallel when threading is enabled.
/// Results come back in tile order.
fn map_tiles<T, F>(
  pool: Option<&ThreadPool>, rects: &[TileRect], f: F,
) -> Vec<T>
where
  T: Send,
  F: Fn(TileRect) -> T + Send + Sync,
{
  cfg_if::cfg_if! {
    if #[cfg(feature = "threading")] {
      let run =
        || -> Vec<T> { rects.to_vec().into_par_iter().map(&f).collect() };
      match pool {
        Some(pool) => pool.install(run),
        None => run(),
      }
    } else {
      let _ = pool;
      rects.iter().map(|&rect| f(rect)).collect()
    }
  }
}

/// Code one tile from scratch into `w`.
fn code_tile<'a, W: Writer>(
  fi: &FrameInvariants, fs: &FrameState<'a>, fc: &FrameContext,
  rect: TileRect, w: &mut W,
) -> Result<(FrameCounts, TileStateMut<'a>), EncoderError> {
  let mut ts = TileStateMut::new(rect, fi.sb_size_log2(), fs.prediction);
  let counts = encode_tile(fi, fs, fc, &mut ts, w)?;
  Ok((counts, ts))
}

/// For every tile, the tile directly above it when both cover the same
/// area and coded to the same bytes.
fn copy_sources(
  fi: &FrameInvariants, rects: &[TileRect], tiles: &[Vec<u8>],
) -> Vec<Option<usize>> {
  if !fi.profile.tile_copy || fi.header.is_key() {
    return vec![None; rects.len()];
  }
  rects
    .iter()
    .map(|r| {
      let above = r.index.checked_sub(fi.tiling.cols)?;
      let a = &rects[above];
      let same = a.mi_cols == r.mi_cols
        && a.mi_rows == r.mi_rows
        && tiles[above] == tiles[r.index];
      same.then_some(above)
    })
    .collect()
}

/// Pack one frame: count the symbols of every tile, choose the forward
/// updates those counts pay for, then code the tiles again with the
/// updated probabilities and lay out the frame.
///
/// # Errors
///
/// - `EncoderError::InvalidConfiguration` if the decisions cannot be
///   coded or a size field overflows
/// - `EncoderError::BufferOverflow` if the frame exceeds
///   `max_frame_bytes`
pub fn encode_frame_data(
  fi: &FrameInvariants, fs: &FrameState, fc: &FrameContext,
  pool: Option<&ThreadPool>,
) -> Result<CodedFrame, EncoderError> {
  let capacity = fi.config.max_frame_bytes;
  let rects: Vec<TileRect> = fi.tiling.tile_rects().collect();

  // Analysis pass.
  let mut counts = FrameCounts::default();
  let analysis = map_tiles(pool, &rects, |rect| {
    let mut w = WriterCounter::new();
    code_tile(fi, fs, fc, rect, &mut w).map(|(counts, _)| counts)
  });
  for tile_counts in analysis {
    counts.accumulate(&tile_counts?);
  }

  let mut coded_fc = fc.clone();
  let mut w = WriterEncoder::with_capacity(capacity);
  let prob_updates =
    write_compressed_header(&mut w, &fi.header, &mut coded_fc, &counts);
  let compressed = w.done()?;

  // A remuxed tile size width is written as a placeholder and patched
  // once the largest tile is known.
  let mut header = fi.header.clone();
  header.compressed_header_size = compressed.len();
  let mut data = write_uncompressed_header(&header)?;

  // Final pass with the updated probabilities.
  let coded_fc = &coded_fc;
  let coded = map_tiles(pool, &rects, |rect| -> Result<_, EncoderError> {
    let mut w = WriterEncoder::with_capacity(capacity);
    let (_, ts) = code_tile(fi, fs, coded_fc, rect, &mut w)?;
    Ok((w.done()?, ts))
  });

  let mut rec = Frame::new(
    fi.tiling.frame_width,
    fi.tiling.frame_height,
    fi.sb_size_log2(),
  );
  let mut stats = EncoderStats { prob_updates, ..Default::default() };
  let mut tiles = Vec::with_capacity(rects.len());
  for tile in coded {
    let (bytes, ts): (Vec<u8>, TileStateMut) = tile?;
    ts.copy_into(&mut rec);
    stats += &ts.stats;
    tiles.push(bytes);
  }

  let copies = copy_sources(fi, &rects, &tiles);
  let max_tile = tiles
    .iter()
    .zip(copies.iter())
    .filter(|(_, copy)| copy.is_none())
    .map(|(t, _)| t.len())
    .max()
    .unwrap_or(0);
  let tile_size_bytes = if fi.profile.tile_size_bytes == 0 {
    min_tile_size_bytes(max_tile)
  } else {
    fi.profile.tile_size_bytes
  };

  if fi.profile.tile_size_bytes == 0 {
    patch_tile_size_bytes(&mut data, tile_size_bytes);
  }
  header.tile_size_bytes = tile_size_bytes;
  data.extend_from_slice(&compressed);

  let order = fi.profile.tile_size_order;
  let tile_copy = fi.profile.tile_copy;
  let last = tiles.len() - 1;
  for (i, (tile, copy)) in tiles.iter().zip(copies.iter()).enumerate() {
    match copy {
      Some(src) => {
        log::trace!("tile {} repeats tile {}", i, src);
        let offset = (i - src) / fi.tiling.cols;
        write_tile_size(
          &mut data,
          offset,
          true,
          tile_size_bytes,
          order,
          tile_copy,
        )?;
        stats.copy_tiles += 1;
        stats.tile_bytes.push(0);
      }
      None => {
        if fi.profile.all_tiles_prefixed || i != last {
          let size = tile.len();
          write_tile_size(
            &mut data,
            size,
            false,
            tile_size_bytes,
            order,
            tile_copy,
          )?;
        }
        data.extend_from_slice(tile);
        stats.tile_bytes.push(tile.len());
      }
    }
    if data.len() > capacity {
      return Err(EncoderError::BufferOverflow { capacity });
    }
  }

  log::debug!(
    "{}: {} header bytes, {} compressed header bytes, {} byte tile sizes",
    header.frame_type,
    data.len() - compressed.len() - stats.tile_bytes.iter().sum::<usize>(),
    compressed.len(),
    tile_size_bytes
  );

  Ok(CodedFrame { header, data, fc: coded_fc.clone(), counts, rec, stats })
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::partition::*;
  use crate::profile::Generation;
  use crate::transform::TxSize;

  fn frames(config: &EncoderConfig) -> (Frame, Frame) {
    let sb_size_log2 = config.profile().sb_size_log2();
    let mut source = Frame::new(config.width, config.height, sb_size_log2);
    let stride = source.planes[0].cfg.stride;
    for (y, row) in source.planes[0].data.chunks_mut(stride).enumerate() {
      for (x, v) in row.iter_mut().enumerate() {
        *v = ((x * 3 + y * 5) % 200) as u8;
      }
    }
    let mut pred = Frame::new(config.width, config.height, sb_size_log2);
    for p in pred.planes.iter_mut() {
      p.fill(100);
    }
    (source, pred)
  }

  fn invariants(
    config: &EncoderConfig, params: &FrameParams,
  ) -> FrameInvariants {
    let header = FrameHeader::new(config, params, &config.tiling());
    FrameInvariants::new(config, header, &FrameContext::default(), 0)
  }

  fn decisions(fi: &FrameInvariants, d: BlockDecision) -> FrameDecisions {
    let sb = BlockSize::square(fi.sb_size_log2()).unwrap();
    let (cols, rows) = (fi.tiling.sb_cols, fi.tiling.sb_rows);
    FrameDecisions::new(
      cols,
      rows,
      vec![
        PartitionTree::uniform(sb, BlockSize::BLOCK_32X32, d);
        cols * rows
      ],
    )
  }

  #[test]
  fn mismatched_grids_are_rejected() {
    let config =
      EncoderConfig { width: 128, height: 64, ..Default::default() };
    let fi = invariants(&config, &FrameParams::key(40));
    let (source, pred) = frames(&config);
    let d = BlockDecision::intra(PredictionMode::DC_PRED, TxSize::TX_32X32);
    let mut dec = decisions(&fi, d);
    dec.trees.pop();
    assert!(FrameState::new(&fi, &source, &pred, &dec).is_err());

    let small = Frame::new(64, 64, 6);
    let dec = decisions(&fi, d);
    assert!(FrameState::new(&fi, &small, &pred, &dec).is_err());
  }

  #[test]
  fn every_tile_but_the_last_is_prefixed() {
    let config = EncoderConfig {
      width: 256,
      height: 64,
      tile_cols_log2: 2,
      ..Default::default()
    };
    let fi = invariants(&config, &FrameParams::key(40));
    let (source, pred) = frames(&config);
    let dec = decisions(
      &fi,
      BlockDecision::intra(PredictionMode::V_PRED, TxSize::TX_32X32),
    );
    let fs = FrameState::new(&fi, &source, &pred, &dec).unwrap();
    let coded =
      encode_frame_data(&fi, &fs, &FrameContext::default(), None).unwrap();
    assert_eq!(coded.stats.tile_bytes.len(), 4);
    let payload: usize = coded.stats.tile_bytes.iter().sum();
    let (header, len) = read_uncompressed_header(&coded.data, None).unwrap();
    assert_eq!(
      coded.data.len(),
      len + header.compressed_header_size + payload + 3 * 4
    );
    assert_eq!(header.tile_cols_log2, 2);
  }

  #[test]
  fn remuxed_width_is_patched_into_the_header() {
    let config = EncoderConfig {
      width: 128,
      height: 64,
      generation: Generation::Gen3,
      ..Default::default()
    };
    let fi = invariants(&config, &FrameParams::key(0));
    assert_eq!(fi.header.tile_size_bytes, 0);
    let (source, pred) = frames(&config);
    let dec = decisions(
      &fi,
      BlockDecision::intra(PredictionMode::DC_PRED, TxSize::TX_4X4),
    );
    let fs = FrameState::new(&fi, &source, &pred, &dec).unwrap();
    let coded =
      encode_frame_data(&fi, &fs, &FrameContext::default(), None).unwrap();
    let payload = coded.stats.tile_bytes[0];
    assert!(payload >= 128);

    let width = min_tile_size_bytes(payload);
    assert_eq!(coded.header.tile_size_bytes, width);
    let (header, len) = read_uncompressed_header(&coded.data, None).unwrap();
    assert_eq!(header.tile_size_bytes, width);
    assert_eq!(
      coded.data.len(),
      len + header.compressed_header_size + width + payload
    );
  }

  #[test]
  fn copies_need_an_identical_tile_above() {
    let config = EncoderConfig {
      width: 64,
      height: 128,
      generation: Generation::Gen3,
      tile_rows_log2: 1,
      ..Default::default()
    };
    let fi = invariants(&config, &FrameParams::inter(40));
    let rects: Vec<TileRect> = fi.tiling.tile_rects().collect();
    assert_eq!(rects.len(), 2);
    let same = vec![vec![1, 2, 3], vec![1, 2, 3]];
    assert_eq!(copy_sources(&fi, &rects, &same), vec![None, Some(0)]);
    let different = vec![vec![1, 2, 3], vec![1, 2]];
    assert_eq!(copy_sources(&fi, &rects, &different), vec![None, None]);

    let key = invariants(&config, &FrameParams::key(40));
    assert_eq!(copy_sources(&key, &rects, &same), vec![None, None]);
  }

  #[test]
  fn capacity_is_enforced() {
    let config = EncoderConfig {
      width: 64,
      height: 64,
      max_frame_bytes: 16,
      ..Default::default()
    };
    let fi = invariants(&config, &FrameParams::key(0));
    let (source, pred) = frames(&config);
    let dec = decisions(
      &fi,
      BlockDecision::intra(PredictionMode::DC_PRED, TxSize::TX_4X4),
    );
    let fs = FrameState::new(&fi, &source, &pred, &dec).unwrap();
    assert!(matches!(
      encode_frame_data(&fi, &fs, &FrameContext::default(), None),
      Err(EncoderError::BufferOverflow { capacity: 16 })
    ));
  }
}
