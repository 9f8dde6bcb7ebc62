// Copyright (c) 2018-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use crate::api::*;
use crate::context::{MAX_SEGMENTS, SEG_TREE_PROBS};
use crate::profile::{ByteOrder, CodecProfile, Generation};
use crate::quantize::{QuantDeltas, QuantizationContext};
use crate::segmentation::*;
use crate::tiling::TilingInfo;
use crate::transform::TxMode;

use bitstream_io::{
  BigEndian, BitRead, BitReader, BitWrite, BitWriter, LittleEndian,
};
use num_traits::FromPrimitive;

use std::io;

pub const FRAME_MARKER: u32 = 2;
pub const SYNC_CODE: [u8; 3] = [0x49, 0x83, 0x42];

const QUANT_DELTA_BITS: u32 = 4;
const LF_DELTA_BITS: u32 = 6;
/// Top bit of a tile size field marking a copy of the tile above.
pub const TILE_COPY_FLAG: u32 = 1 << 31;

/// Everything the uncompressed header carries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameHeader {
  pub generation: Generation,
  pub frame_type: FrameType,
  pub show_frame: bool,
  pub error_resilient: bool,
  pub width: usize,
  pub height: usize,
  pub refresh_frame_flags: u8,
  pub refresh_frame_context: bool,
  pub frame_parallel: bool,
  pub frame_context_idx: u8,
  pub loop_filter: LoopFilterParams,
  pub base_q_idx: u8,
  pub deltas: QuantDeltas,
  pub segmentation: SegmentationState,
  pub tile_cols_log2: usize,
  pub tile_rows_log2: usize,
  pub tx_mode: TxMode,
  pub compressed_header_size: usize,
  /// Width of the tile size fields, 0 until chosen for generations that
  /// pick it per frame.
  pub tile_size_bytes: usize,
}

impl FrameHeader {
  pub fn new(
    config: &EncoderConfig, params: &FrameParams, tiling: &TilingInfo,
  ) -> Self {
    let profile = config.profile();
    let tx_mode =
      if profile.codes_tx_mode() { params.tx_mode } else { TxMode::ONLY_4X4 };
    FrameHeader {
      generation: config.generation,
      frame_type: params.frame_type,
      show_frame: params.show_frame,
      error_resilient: params.error_resilient,
      width: config.width,
      height: config.height,
      refresh_frame_flags: params.refresh_frame_flags & 0b111,
      refresh_frame_context: params.refresh_frame_context,
      frame_parallel: params.frame_parallel,
      frame_context_idx: params.frame_context_idx,
      loop_filter: params.loop_filter,
      base_q_idx: params.base_q_idx,
      deltas: params.deltas,
      segmentation: params.segmentation,
      tile_cols_log2: tiling.tile_cols_log2,
      tile_rows_log2: tiling.tile_rows_log2,
      tx_mode,
      compressed_header_size: 0,
      tile_size_bytes: profile.tile_size_bytes,
    }
  }

  #[inline]
  pub fn profile(&self) -> CodecProfile {
    CodecProfile::new(self.generation)
  }

  #[inline]
  pub fn is_key(&self) -> bool {
    self.frame_type == FrameType::KEY
  }

  /// Whether every probability slot starts over with this frame.
  #[inline]
  pub fn resets_contexts(&self) -> bool {
    self.is_key() || self.error_resilient
  }

  /// One quantizer set per segment.
  pub fn segment_quantizers(&self) -> [QuantizationContext; MAX_SEGMENTS] {
    [0u8, 1, 2, 3].map(|segment_id| {
      let qindex = self.segmentation.qindex(self.base_q_idx, segment_id);
      QuantizationContext::new(qindex, &self.deltas)
    })
  }

  /// Whether the frame counts are merged into the probabilities.
  #[inline]
  pub fn adapts(&self) -> bool {
    self.profile().backward_adaptation
      && !self.error_resilient
      && !self.frame_parallel
  }
}

pub trait UncompressedHeader {
  fn write_frame_header(&mut self, fh: &FrameHeader) -> io::Result<()>;
  fn write_loop_filter(&mut self, lf: &LoopFilterParams) -> io::Result<()>;
  fn write_quantizer(&mut self, fh: &FrameHeader) -> io::Result<()>;
  fn write_segment_data(
    &mut self, segmentation: &SegmentationState,
  ) -> io::Result<()>;
  fn write_delta_q(&mut self, delta_q: i8) -> io::Result<()>;
}

impl<W: io::Write> UncompressedHeader for BitWriter<W, BigEndian> {
  /// Write the whole uncompressed header, ending byte aligned. Generations
  /// choosing the tile size width per frame end with a byte holding it,
  /// see [`patch_tile_size_bytes`].
  fn write_frame_header(&mut self, fh: &FrameHeader) -> io::Result<()> {
    let profile = fh.profile();
    self.write(2, FRAME_MARKER)?;
    self.write(2, fh.generation as u32)?;
    self.write_bit(fh.frame_type == FrameType::INTER)?;
    self.write_bit(fh.show_frame)?;
    self.write_bit(fh.error_resilient)?;

    if fh.is_key() {
      self.write_bytes(&SYNC_CODE)?;
      self.write(16, (fh.width - 1) as u32)?;
      self.write(16, (fh.height - 1) as u32)?;
    } else {
      self.write(3, fh.refresh_frame_flags as u32)?;
    }

    self.write_bit(fh.refresh_frame_context)?;
    self.write_bit(fh.frame_parallel)?;
    self.write(2, fh.frame_context_idx as u32)?;

    self.write_loop_filter(&fh.loop_filter)?;
    self.write_quantizer(fh)?;
    self.write_segment_data(&fh.segmentation)?;

    self.write(3, fh.tile_cols_log2 as u32)?;
    self.write(3, fh.tile_rows_log2 as u32)?;

    if profile.codes_tx_mode() {
      self.write(3, fh.tx_mode as u32)?;
    }

    self.byte_align()?;
    self.write(16, fh.compressed_header_size as u32)?;
    if profile.tile_size_bytes == 0 {
      // 2 bits of width minus one, 6 reserved bits
      let n = fh.tile_size_bytes.max(1) - 1;
      self.write(8, (n as u32) << 6)?;
    }
    Ok(())
  }

  fn write_loop_filter(&mut self, lf: &LoopFilterParams) -> io::Result<()> {
    assert!(lf.level < 64);
    self.write(6, lf.level)?; // loop filter level
    assert!(lf.sharpness < 8);
    self.write(3, lf.sharpness)?; // loop filter sharpness
    self.write_bit(lf.deltas_enabled)?; // loop filter deltas enabled
    if lf.deltas_enabled {
      for &delta in lf.ref_deltas.iter().chain(lf.mode_deltas.iter()) {
        self.write_signed(LF_DELTA_BITS + 1, delta)?;
      }
    }
    Ok(())
  }

  fn write_quantizer(&mut self, fh: &FrameHeader) -> io::Result<()> {
    self.write(7, fh.base_q_idx)?;
    let d = &fh.deltas;
    self.write_delta_q(d.y1_dc)?;
    if fh.profile().second_order_dc {
      self.write_delta_q(d.y2_dc)?;
      self.write_delta_q(d.y2_ac)?;
    }
    self.write_delta_q(d.uv_dc)?;
    self.write_delta_q(d.uv_ac)
  }

  fn write_segment_data(
    &mut self, segmentation: &SegmentationState,
  ) -> io::Result<()> {
    self.write_bit(segmentation.enabled)?;

    if segmentation.enabled {
      self.write_bit(segmentation.update_map)?;
      if segmentation.update_map {
        for &prob in &segmentation.tree_probs {
          self.write_bit(prob != 255)?;
          if prob != 255 {
            self.write(8, prob)?;
          }
        }
      }
      self.write_bit(segmentation.update_data)?;
      if segmentation.update_data {
        self.write_bit(segmentation.abs_delta)?;
        for i in 0..MAX_SEGMENTS {
          for j in 0..SegLvl::SEG_LVL_MAX as usize {
            self.write_bit(segmentation.features[i][j])?;
            if segmentation.features[i][j] {
              let bits = seg_feature_bits[j];
              let data = segmentation.data[i][j];
              if seg_feature_is_signed[j] {
                self.write_signed(bits + 1, data)?;
              } else if bits > 0 {
                self.write(bits, data as u16)?;
              }
            }
          }
        }
      }
    }
    Ok(())
  }

  fn write_delta_q(&mut self, delta_q: i8) -> io::Result<()> {
    self.write_bit(delta_q != 0)?;
    if delta_q != 0 {
      assert!((-15..=15).contains(&delta_q));
      self.write_signed(QUANT_DELTA_BITS + 1, delta_q)?;
    }
    Ok(())
  }
}

/// Serialize the uncompressed header.
///
/// # Errors
///
/// - `EncoderError::InvalidConfiguration` if the compressed header size
///   does not fit its 16 bit field
pub fn write_uncompressed_header(
  fh: &FrameHeader,
) -> Result<Vec<u8>, EncoderError> {
  if fh.compressed_header_size >= 1 << 16 {
    return Err(EncoderError::InvalidConfiguration(format!(
      "compressed header of {} bytes exceeds the size field",
      fh.compressed_header_size
    )));
  }
  let mut packed = Vec::new();
  let mut bw = BitWriter::endian(&mut packed, BigEndian);
  bw.write_frame_header(fh)
    .map_err(|e| EncoderError::InvalidConfiguration(e.to_string()))?;
  Ok(packed)
}

/// Store the tile size width chosen after remux into a header written by
/// [`write_uncompressed_header`].
pub fn patch_tile_size_bytes(header: &mut [u8], tile_size_bytes: usize) {
  debug_assert!((1..=4).contains(&tile_size_bytes));
  if let Some(last) = header.last_mut() {
    *last = ((tile_size_bytes - 1) as u8) << 6;
  }
}

fn read_delta_q<R: BitRead>(r: &mut R) -> io::Result<i8> {
  if r.read_bit()? {
    r.read_signed::<i8>(QUANT_DELTA_BITS + 1)
  } else {
    Ok(0)
  }
}

fn read_segment_data<R: BitRead>(
  r: &mut R, prev: &SegmentationState,
) -> io::Result<SegmentationState> {
  let mut seg = SegmentationState {
    enabled: r.read_bit()?,
    features: prev.features,
    data: prev.data,
    abs_delta: prev.abs_delta,
    ..Default::default()
  };
  if !seg.enabled {
    return Ok(SegmentationState::default());
  }
  seg.update_map = r.read_bit()?;
  if seg.update_map {
    for prob in seg.tree_probs.iter_mut().take(SEG_TREE_PROBS) {
      *prob = if r.read_bit()? { r.read::<u8>(8)? } else { 255 };
    }
  }
  seg.update_data = r.read_bit()?;
  if seg.update_data {
    seg.abs_delta = r.read_bit()?;
    for i in 0..MAX_SEGMENTS {
      for j in 0..SegLvl::SEG_LVL_MAX as usize {
        seg.features[i][j] = r.read_bit()?;
        seg.data[i][j] = if !seg.features[i][j] || seg_feature_bits[j] == 0 {
          0
        } else if seg_feature_is_signed[j] {
          r.read_signed::<i16>(seg_feature_bits[j] + 1)?
        } else {
          r.read::<u16>(seg_feature_bits[j])? as i16
        };
      }
    }
  }
  Ok(seg)
}

/// Parse an uncompressed header. Returns the header and its length in
/// bytes.
///
/// Inter frames take their size from `prev`, segment data not sent with
/// the frame is carried over from it as well.
///
/// # Errors
///
/// - `DecoderError::BadMarker` on a wrong marker or sync code
/// - `DecoderError::MissingKeyFrame` for an inter frame without `prev`
/// - `DecoderError::Truncated` if the data ends inside the header
pub fn read_uncompressed_header(
  data: &[u8], prev: Option<&FrameHeader>,
) -> Result<(FrameHeader, usize), DecoderError> {
  let mut r = BitReader::endian(io::Cursor::new(data), BigEndian);
  if r.read::<u32>(2)? != FRAME_MARKER {
    return Err(DecoderError::BadMarker);
  }
  let generation = Generation::from_u32(r.read::<u32>(2)?)
    .ok_or(DecoderError::InvalidSymbol("generation"))?;
  let profile = CodecProfile::new(generation);
  let frame_type =
    if r.read_bit()? { FrameType::INTER } else { FrameType::KEY };
  let show_frame = r.read_bit()?;
  let error_resilient = r.read_bit()?;

  let (width, height, refresh_frame_flags) = if frame_type == FrameType::KEY
  {
    let mut sync = [0u8; 3];
    r.read_bytes(&mut sync)?;
    if sync != SYNC_CODE {
      return Err(DecoderError::BadMarker);
    }
    let width = r.read::<u32>(16)? as usize + 1;
    let height = r.read::<u32>(16)? as usize + 1;
    (width, height, 0b111)
  } else {
    let prev = prev.ok_or(DecoderError::MissingKeyFrame)?;
    (prev.width, prev.height, r.read::<u8>(3)?)
  };

  let refresh_frame_context = r.read_bit()?;
  let frame_parallel = r.read_bit()?;
  let frame_context_idx = r.read::<u8>(2)?;

  let mut loop_filter = LoopFilterParams {
    level: r.read::<u8>(6)?,
    sharpness: r.read::<u8>(3)?,
    deltas_enabled: r.read_bit()?,
    ..Default::default()
  };
  if loop_filter.deltas_enabled {
    for delta in loop_filter
      .ref_deltas
      .iter_mut()
      .chain(loop_filter.mode_deltas.iter_mut())
    {
      *delta = r.read_signed::<i8>(LF_DELTA_BITS + 1)?;
    }
  }

  let base_q_idx = r.read::<u8>(7)?;
  let mut deltas =
    QuantDeltas { y1_dc: read_delta_q(&mut r)?, ..Default::default() };
  if profile.second_order_dc {
    deltas.y2_dc = read_delta_q(&mut r)?;
    deltas.y2_ac = read_delta_q(&mut r)?;
  }
  deltas.uv_dc = read_delta_q(&mut r)?;
  deltas.uv_ac = read_delta_q(&mut r)?;

  let prev_seg = match prev {
    Some(p) if !error_resilient && frame_type == FrameType::INTER => {
      p.segmentation
    }
    _ => SegmentationState::default(),
  };
  let segmentation = read_segment_data(&mut r, &prev_seg)?;

  let tile_cols_log2 = r.read::<u32>(3)? as usize;
  let tile_rows_log2 = r.read::<u32>(3)? as usize;

  let tx_mode = if profile.codes_tx_mode() {
    TxMode::from_u32(r.read::<u32>(3)?)
      .ok_or(DecoderError::InvalidSymbol("tx_mode"))?
  } else {
    TxMode::ONLY_4X4
  };

  r.byte_align();
  let compressed_header_size = r.read::<u32>(16)? as usize;
  let tile_size_bytes = if profile.tile_size_bytes == 0 {
    (r.read::<u8>(8)? >> 6) as usize + 1
  } else {
    profile.tile_size_bytes
  };
  let len = r.into_reader().position() as usize;

  let fh = FrameHeader {
    generation,
    frame_type,
    show_frame,
    error_resilient,
    width,
    height,
    refresh_frame_flags,
    refresh_frame_context,
    frame_parallel,
    frame_context_idx,
    loop_filter,
    base_q_idx,
    deltas,
    segmentation,
    tile_cols_log2,
    tile_rows_log2,
    tx_mode,
    compressed_header_size,
    tile_size_bytes,
  };
  Ok((fh, len))
}

/// Smallest field width, in bytes, holding `max_size` with the copy flag
/// bit left free.
pub fn min_tile_size_bytes(max_size: usize) -> usize {
  (1..4).find(|&n| max_size < 1 << (8 * n - 1)).unwrap_or(4)
}

/// Append a tile size field. With `tile_copy` the top bit of the field is
/// the copy flag, so every size must stay below it.
///
/// # Errors
///
/// - `EncoderError::InvalidConfiguration` if `size` does not fit the field
pub fn write_tile_size(
  out: &mut Vec<u8>, size: usize, copy: bool, bytes: usize, order: ByteOrder,
  tile_copy: bool,
) -> Result<(), EncoderError> {
  debug_assert!((1..=4).contains(&bytes));
  debug_assert!(tile_copy || !copy);
  let bits = 8 * bytes as u32;
  let limit = if tile_copy { 1u64 << (bits - 1) } else { 1u64 << bits };
  if size as u64 >= limit {
    return Err(EncoderError::InvalidConfiguration(format!(
      "tile of {} bytes does not fit a {} byte size field",
      size, bytes
    )));
  }
  let flag = if copy { TILE_COPY_FLAG >> (32 - bits) } else { 0 };
  let value = size as u32 | flag;
  let res = match order {
    ByteOrder::Little => {
      BitWriter::endian(out, LittleEndian).write(bits, value)
    }
    ByteOrder::Big => BitWriter::endian(out, BigEndian).write(bits, value),
  };
  res.map_err(|e| EncoderError::InvalidConfiguration(e.to_string()))
}

/// Read a tile size field. Returns the size and whether the copy flag is
/// set; the flag is only defined for generations with copy tiles.
///
/// # Errors
///
/// - `DecoderError::Truncated` if `data` is shorter than the field
pub fn read_tile_size(
  data: &[u8], bytes: usize, order: ByteOrder, tile_copy: bool,
) -> Result<(usize, bool), DecoderError> {
  let bits = 8 * bytes as u32;
  let value: u32 = match order {
    ByteOrder::Little => BitReader::endian(data, LittleEndian).read(bits)?,
    ByteOrder::Big => BitReader::endian(data, BigEndian).read(bits)?,
  };
  let flag = 1u32 << (bits - 1);
  if tile_copy && value & flag != 0 {
    Ok(((value & !flag) as usize, true))
  } else {
    Ok((value as usize, false))
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use pretty_assertions::assert_eq;

  fn header(generation: Generation, params: &FrameParams) -> FrameHeader {
    let config = EncoderConfig {
      width: 200,
      height: 120,
      generation,
      ..Default::default()
    };
    FrameHeader::new(&config, params, &config.tiling())
  }

  #[test]
  fn key_frame_header_round_trips() {
    let mut params = FrameParams::key(93);
    params.deltas.y1_dc = -3;
    params.deltas.uv_ac = 15;
    params.loop_filter = LoopFilterParams {
      level: 33,
      sharpness: 5,
      deltas_enabled: true,
      ref_deltas: [1, 0, -1, -63],
      mode_deltas: [0, 7],
    };
    params.segmentation.enabled = true;
    params.segmentation.update_map = true;
    params.segmentation.update_data = true;
    params.segmentation.tree_probs = [128, 255, 3];
    params.segmentation.set_feature(2, SegLvl::SEG_LVL_ALT_Q, -20);
    params.segmentation.set_feature(3, SegLvl::SEG_LVL_EOB, 1024);
    params.segmentation.set_feature(1, SegLvl::SEG_LVL_REF_FRAME, 3);

    for generation in [Generation::Gen1, Generation::Gen2, Generation::Gen3] {
      let mut fh = header(generation, &params);
      fh.compressed_header_size = 777;
      let mut data = write_uncompressed_header(&fh).unwrap();
      if fh.profile().tile_size_bytes == 0 {
        patch_tile_size_bytes(&mut data, 3);
        fh.tile_size_bytes = 3;
      }
      let len = data.len();
      data.extend_from_slice(&[0xAA; 4]);
      let (parsed, parsed_len) =
        read_uncompressed_header(&data, None).unwrap();
      assert_eq!(parsed, fh);
      assert_eq!(parsed_len, len);
    }
  }

  #[test]
  fn inter_frames_inherit_size_and_segments() {
    let mut key = FrameParams::key(10);
    key.segmentation.enabled = true;
    key.segmentation.update_data = true;
    key.segmentation.set_feature(1, SegLvl::SEG_LVL_SKIP, 0);
    let key = header(Generation::Gen2, &key);
    let data = write_uncompressed_header(&key).unwrap();
    let (key, _) = read_uncompressed_header(&data, None).unwrap();

    let mut inter = FrameParams::inter(20);
    inter.segmentation = key.segmentation;
    inter.segmentation.update_data = false;
    let inter = header(Generation::Gen2, &inter);
    let data = write_uncompressed_header(&inter).unwrap();
    assert_eq!(
      read_uncompressed_header(&data, None),
      Err(DecoderError::MissingKeyFrame)
    );
    let (parsed, _) = read_uncompressed_header(&data, Some(&key)).unwrap();
    assert_eq!((parsed.width, parsed.height), (200, 120));
    assert_eq!(parsed.refresh_frame_flags, 0b001);
    assert!(parsed.segmentation.skip_forced(1));
    assert_eq!(parsed, inter);
  }

  #[test]
  fn bad_marker() {
    assert_eq!(
      read_uncompressed_header(&[0x40, 0, 0, 0], None),
      Err(DecoderError::BadMarker)
    );
    assert_eq!(
      read_uncompressed_header(&[0x80], None).err(),
      Some(DecoderError::Truncated)
    );
  }

  #[test]
  fn tile_size_fields() {
    assert_eq!(min_tile_size_bytes(0), 1);
    assert_eq!(min_tile_size_bytes(127), 1);
    assert_eq!(min_tile_size_bytes(128), 2);
    assert_eq!(min_tile_size_bytes(1 << 15), 3);
    assert_eq!(min_tile_size_bytes(1 << 23), 4);

    let mut out = Vec::new();
    let le = ByteOrder::Little;
    write_tile_size(&mut out, 0x123456, false, 3, le, false).unwrap();
    write_tile_size(&mut out, 0x1234, false, 4, ByteOrder::Big, false)
      .unwrap();
    write_tile_size(&mut out, 5, true, 1, le, true).unwrap();
    assert_eq!(out, [0x56, 0x34, 0x12, 0, 0, 0x12, 0x34, 0x85]);
    assert_eq!(
      read_tile_size(&out, 3, ByteOrder::Little, false),
      Ok((0x123456, false))
    );
    assert_eq!(
      read_tile_size(&out[3..], 4, ByteOrder::Big, false),
      Ok((0x1234, false))
    );
    assert_eq!(
      read_tile_size(&out[7..], 1, ByteOrder::Little, true),
      Ok((5, true))
    );
    assert_eq!(
      read_tile_size(&out[7..], 2, ByteOrder::Little, true),
      Err(DecoderError::Truncated)
    );

    let be = ByteOrder::Big;
    assert!(write_tile_size(&mut out, 256, false, 1, be, false).is_err());
    assert!(write_tile_size(&mut out, 128, true, 1, be, true).is_err());
  }

  #[test]
  fn copy_flag_bit_is_reserved() {
    let mut out = Vec::new();
    let be = ByteOrder::Big;
    write_tile_size(&mut out, 0x80, false, 1, be, false).unwrap();
    assert_eq!(read_tile_size(&out, 1, be, false), Ok((0x80, false)));

    let mut out = Vec::new();
    assert!(write_tile_size(&mut out, 0x80, false, 1, be, true).is_err());
    assert!(
      write_tile_size(&mut out, 1 << 31, false, 4, be, true).is_err()
    );
    assert!(out.is_empty());

    write_tile_size(&mut out, 0x7f, false, 1, be, true).unwrap();
    assert_eq!(read_tile_size(&out, 1, be, true), Ok((0x7f, false)));
  }
}
