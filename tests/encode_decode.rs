// Copyright (c) 2018-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use interpolate_name::interpolate_test;
use pretty_assertions::assert_eq;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;
use rvpx::encoder::max_block_tx_size;
use rvpx::header::{min_tile_size_bytes, read_uncompressed_header};
use rvpx::prelude::*;

use rvpx::partition::BlockSize::*;
use rvpx::partition::PartitionType::*;
use rvpx::partition::PredictionMode::*;

const INTRA_MODES: [PredictionMode; 10] = [
  DC_PRED, V_PRED, H_PRED, D45_PRED, D135_PRED, D117_PRED, D153_PRED,
  D207_PRED, D63_PRED, TM_PRED,
];
const INTER_MODES: [PredictionMode; 4] = [NEARESTMV, NEARMV, ZEROMV, NEWMV];
const REFS: [RefFrame; 3] =
  [RefFrame::LAST_FRAME, RefFrame::GOLDEN_FRAME, RefFrame::ALTREF_FRAME];

fn generation(n: usize) -> Generation {
  match n {
    1 => Generation::Gen1,
    2 => Generation::Gen2,
    _ => Generation::Gen3,
  }
}

fn config(
  generation: Generation, width: usize, height: usize,
) -> EncoderConfig {
  EncoderConfig { width, height, generation, ..Default::default() }
}

/// A prediction of random pixels and a source close to it.
fn pictures(rng: &mut ChaChaRng, config: &EncoderConfig) -> (Frame, Frame) {
  let sb_size_log2 = config.profile().sb_size_log2();
  let mut source = Frame::new(config.width, config.height, sb_size_log2);
  let mut pred = Frame::new(config.width, config.height, sb_size_log2);
  for (s, p) in source.planes.iter_mut().zip(pred.planes.iter_mut()) {
    for (s, p) in s.data.iter_mut().zip(p.data.iter_mut()) {
      *p = rng.gen_range(16..240);
      *s = (i32::from(*p) + rng.gen_range(-16..=16)) as u8;
    }
  }
  (source, pred)
}

fn tx_mode(config: &EncoderConfig, params: &FrameParams) -> TxMode {
  if config.profile().codes_tx_mode() {
    params.tx_mode
  } else {
    TxMode::ONLY_4X4
  }
}

fn random_block(
  rng: &mut ChaChaRng, bsize: BlockSize, inter: bool, tx_mode: TxMode,
) -> BlockDecision {
  let max_tx_size = max_block_tx_size(bsize, tx_mode);
  let skip = rng.gen_bool(0.2);
  let any_tx = |rng: &mut ChaChaRng| {
    TxSize::all()[rng.gen_range(0..=max_tx_size as usize)]
  };
  if inter && rng.gen_bool(0.7) {
    let mode = INTER_MODES[rng.gen_range(0..INTER_MODES.len())];
    let ref_frame = REFS[rng.gen_range(0..REFS.len())];
    let mv = if mode == NEWMV {
      MotionVector::new(rng.gen_range(-40..=40), rng.gen_range(-40..=40))
    } else {
      MotionVector::zero()
    };
    let tx_size = if skip { max_tx_size } else { any_tx(rng) };
    let d = BlockDecision::inter(mode, ref_frame, mv, tx_size);
    BlockDecision { skip, ..d }
  } else {
    let mode = INTRA_MODES[rng.gen_range(0..INTRA_MODES.len())];
    let tx_size = any_tx(rng);
    BlockDecision {
      uv_mode: INTRA_MODES[rng.gen_range(0..INTRA_MODES.len())],
      skip,
      ..BlockDecision::intra(mode, tx_size)
    }
  }
}

fn random_tree(
  rng: &mut ChaChaRng, profile: &CodecProfile, bsize: BlockSize,
  inter: bool, tx_mode: TxMode,
) -> PartitionTree {
  if !profile.partition_coded {
    return PartitionTree::leaf(random_block(rng, bsize, inter, tx_mode));
  }
  let p = if bsize == BLOCK_8X8 {
    PARTITION_NONE
  } else if profile.ext_partition && rng.gen_bool(0.3) {
    [PARTITION_HORZ_A, PARTITION_HORZ_B, PARTITION_VERT_A, PARTITION_VERT_B]
      [rng.gen_range(0..4)]
  } else {
    [PARTITION_NONE, PARTITION_HORZ, PARTITION_VERT, PARTITION_SPLIT]
      [rng.gen_range(0..4)]
  };
  if p == PARTITION_SPLIT {
    let subsize = bsize.subsize(p).unwrap();
    return PartitionTree::split(
      (0..4)
        .map(|_| random_tree(rng, profile, subsize, inter, tx_mode))
        .collect(),
    );
  }
  let blocks = bsize
    .partition_blocks(p)
    .unwrap()
    .into_iter()
    .map(|(b, _, _)| random_block(rng, b, inter, tx_mode))
    .collect();
  PartitionTree::new(p, blocks)
}

fn random_decisions(
  rng: &mut ChaChaRng, config: &EncoderConfig, params: &FrameParams,
) -> FrameDecisions {
  let profile = config.profile();
  let tiling = config.tiling();
  let inter = params.frame_type == FrameType::INTER;
  let tx_mode = tx_mode(config, params);
  let trees = (0..tiling.sb_cols * tiling.sb_rows)
    .map(|_| random_tree(rng, &profile, profile.sb_size, inter, tx_mode))
    .collect();
  FrameDecisions::new(tiling.sb_cols, tiling.sb_rows, trees)
}

fn nonzero_tx_blocks(frame: &DecodedFrame) -> usize {
  frame.tx_blocks.iter().filter(|b| !b.coeffs.is_empty()).count()
}

#[interpolate_test(gen1, 1)]
#[interpolate_test(gen2, 2)]
#[interpolate_test(gen3, 3)]
fn frames_read_back(n: usize) {
  let mut rng = ChaChaRng::from_seed([n as u8; 32]);
  let config = config(generation(n), 128, 64);
  let mut encoder =
    Config::new().with_encoder_config(config).new_encoder().unwrap();
  let mut decoder = Decoder::new();

  let mut params = FrameParams::key(60);
  for i in 0..4 {
    if i > 0 {
      params = FrameParams::inter(40 + 10 * i as u8);
    }
    let (source, pred) = pictures(&mut rng, &config);
    let decisions = random_decisions(&mut rng, &config, &params);
    let packet =
      encoder.encode_frame(&params, &source, &pred, &decisions).unwrap();
    let frame = decoder.decode(&packet.data, &pred).unwrap();

    assert_eq!(frame.header.frame_type, params.frame_type);
    assert_eq!(frame.decisions, decisions);
    assert!(frame.rec.visible_eq(&packet.rec));
    assert_eq!(nonzero_tx_blocks(&frame), packet.enc_stats.nonzero_tx_blocks);
    assert_eq!(frame.prob_updates, packet.enc_stats.prob_updates);
    for idx in 0..4 {
      assert_eq!(decoder.frame_context(idx), encoder.frame_context(idx));
    }
  }
}

#[interpolate_test(gen1, 1)]
#[interpolate_test(gen2, 2)]
#[interpolate_test(gen3, 3)]
fn partial_superblocks(n: usize) {
  let mut rng = ChaChaRng::from_seed([7; 32]);
  let config = config(generation(n), 100, 36);
  let mut encoder =
    Config::new().with_encoder_config(config).new_encoder().unwrap();
  let mut decoder = Decoder::new();

  let sb_size = config.profile().sb_size;
  let tiling = config.tiling();
  let leaf = if n == 1 { sb_size } else { BLOCK_8X8 };
  let tx_size = if n == 1 { TxSize::TX_4X4 } else { TxSize::TX_8X8 };
  for params in [FrameParams::key(80), FrameParams::inter(80)] {
    let (source, pred) = pictures(&mut rng, &config);
    let d = if params.frame_type == FrameType::KEY {
      BlockDecision::intra(TM_PRED, tx_size)
    } else {
      let mv = MotionVector::new(4, -6);
      BlockDecision::inter(NEWMV, RefFrame::LAST_FRAME, mv, tx_size)
    };
    let decisions = FrameDecisions::new(
      tiling.sb_cols,
      tiling.sb_rows,
      vec![
        PartitionTree::uniform(sb_size, leaf, d);
        tiling.sb_cols * tiling.sb_rows
      ],
    );
    let packet =
      encoder.encode_frame(&params, &source, &pred, &decisions).unwrap();
    let frame = decoder.decode(&packet.data, &pred).unwrap();
    assert!(frame.rec.visible_eq(&packet.rec));
    assert_eq!(frame.decisions.sb_cols, tiling.sb_cols);
  }
}

#[test]
fn packing_is_deterministic() {
  let mut rng = ChaChaRng::from_seed([3; 32]);
  let config = EncoderConfig {
    tile_cols_log2: 2,
    tile_rows_log2: 1,
    ..config(Generation::Gen2, 256, 128)
  };
  let params = FrameParams::key(50);
  let (source, pred) = pictures(&mut rng, &config);
  let decisions = random_decisions(&mut rng, &config, &params);

  let packets: Vec<_> = [1, 4]
    .iter()
    .map(|&threads| {
      let mut encoder = Config::new()
        .with_encoder_config(config)
        .with_threads(threads)
        .new_encoder()
        .unwrap();
      encoder.encode_frame(&params, &source, &pred, &decisions).unwrap()
    })
    .collect();
  assert_eq!(packets[0].data, packets[1].data);
  assert_eq!(packets[0].enc_stats, packets[1].enc_stats);
  assert_eq!(packets[0].enc_stats.tile_bytes.len(), 8);
}

/// Frame whose two halves, split at `half` luma pixels along one axis,
/// hold the same pixels.
fn mirrored_pictures(
  config: &EncoderConfig, half: usize, vertical: bool,
) -> (Frame, Frame) {
  let sb_size_log2 = config.profile().sb_size_log2();
  let mut source = Frame::new(config.width, config.height, sb_size_log2);
  let mut pred = Frame::new(config.width, config.height, sb_size_log2);
  for (plane, (s, p)) in
    source.planes.iter_mut().zip(pred.planes.iter_mut()).enumerate()
  {
    let h = half >> (plane > 0) as usize;
    let (w, rows) = (s.cfg.width, s.cfg.height);
    for y in 0..rows {
      for x in 0..w {
        let (u, v) = if vertical { (x, y % h) } else { (x % h, y) };
        let value = ((u * 7 + v * 13) % 200 + 20) as u8;
        s.row_mut(y)[x] = value;
        p.row_mut(y)[x] = value.wrapping_add((u % 5) as u8);
      }
    }
  }
  (source, pred)
}

#[test]
fn identical_tiles_pack_identically() {
  let config = EncoderConfig {
    tile_cols_log2: 1,
    ..config(Generation::Gen2, 128, 64)
  };
  let (source, pred) = mirrored_pictures(&config, 64, false);
  let d = BlockDecision::intra(D45_PRED, TxSize::TX_16X16);
  let tree = PartitionTree::uniform(BLOCK_64X64, BLOCK_32X32, d);
  let decisions = FrameDecisions::new(2, 1, vec![tree.clone(), tree]);
  let mut encoder =
    Config::new().with_encoder_config(config).new_encoder().unwrap();
  let packet = encoder
    .encode_frame(&FrameParams::key(70), &source, &pred, &decisions)
    .unwrap();

  let (fh, len) = read_uncompressed_header(&packet.data, None).unwrap();
  let start = len + fh.compressed_header_size;
  let size_field: [u8; 4] =
    packet.data[start..start + 4].try_into().unwrap();
  let size = u32::from_be_bytes(size_field) as usize;
  let first = &packet.data[start + 4..start + 4 + size];
  let second = &packet.data[start + 4 + size..];
  assert_eq!(first, second);
  assert_eq!(packet.enc_stats.tile_bytes, vec![size, size]);
}

#[test]
fn repeated_tiles_are_copied() {
  let config = EncoderConfig {
    tile_rows_log2: 1,
    ..config(Generation::Gen3, 64, 128)
  };
  let (source, pred) = mirrored_pictures(&config, 64, true);
  let mut encoder =
    Config::new().with_encoder_config(config).new_encoder().unwrap();
  let mut decoder = Decoder::new();

  let key = BlockDecision::intra(V_PRED, TxSize::TX_8X8);
  let tree = PartitionTree::uniform(BLOCK_64X64, BLOCK_16X16, key);
  let decisions = FrameDecisions::new(1, 2, vec![tree.clone(), tree]);
  let packet = encoder
    .encode_frame(&FrameParams::key(60), &source, &pred, &decisions)
    .unwrap();
  assert_eq!(packet.enc_stats.copy_tiles, 0);
  decoder.decode(&packet.data, &pred).unwrap();

  let inter = BlockDecision::inter(
    ZEROMV,
    RefFrame::LAST_FRAME,
    MotionVector::zero(),
    TxSize::TX_16X16,
  );
  let tree = PartitionTree::new(PARTITION_VERT, vec![inter, inter]);
  let decisions = FrameDecisions::new(1, 2, vec![tree.clone(), tree]);
  let packet = encoder
    .encode_frame(&FrameParams::inter(60), &source, &pred, &decisions)
    .unwrap();
  assert_eq!(packet.enc_stats.copy_tiles, 1);
  assert_eq!(packet.enc_stats.tile_bytes[1], 0);

  let frame = decoder.decode(&packet.data, &pred).unwrap();
  assert_eq!(frame.decisions, decisions);
  assert!(frame.rec.visible_eq(&packet.rec));
}

#[test]
fn tile_size_fields_fit_the_largest_tile() {
  let mut rng = ChaChaRng::from_seed([11; 32]);
  let config = EncoderConfig {
    tile_cols_log2: 1,
    ..config(Generation::Gen3, 256, 64)
  };
  let params = FrameParams::key(20);
  let (source, pred) = pictures(&mut rng, &config);
  let decisions = random_decisions(&mut rng, &config, &params);
  let mut encoder =
    Config::new().with_encoder_config(config).new_encoder().unwrap();
  let packet =
    encoder.encode_frame(&params, &source, &pred, &decisions).unwrap();

  let (fh, len) = read_uncompressed_header(&packet.data, None).unwrap();
  let largest = packet.enc_stats.tile_bytes.iter().copied().max().unwrap();
  assert_eq!(fh.tile_size_bytes, min_tile_size_bytes(largest));
  let fields = fh.tile_size_bytes * packet.enc_stats.tile_bytes.len();
  let payload: usize = packet.enc_stats.tile_bytes.iter().sum();
  assert_eq!(
    packet.data.len(),
    len + fh.compressed_header_size + fields + payload
  );
}

#[test]
fn segments_round_trip() {
  let mut rng = ChaChaRng::from_seed([5; 32]);
  let config = config(Generation::Gen2, 128, 64);
  let mut encoder =
    Config::new().with_encoder_config(config).new_encoder().unwrap();
  let mut decoder = Decoder::new();

  let mut params = FrameParams::key(60);
  params.segmentation.enabled = true;
  params.segmentation.update_map = true;
  params.segmentation.update_data = true;
  params.segmentation.tree_probs = [128, 100, 160];
  params.segmentation.set_feature(1, SegLvl::SEG_LVL_ALT_Q, -30);
  params.segmentation.set_feature(2, SegLvl::SEG_LVL_ALT_Q, 40);
  params.segmentation.set_feature(3, SegLvl::SEG_LVL_EOB, 3);

  let (source, pred) = pictures(&mut rng, &config);
  let mut decisions = random_decisions(&mut rng, &config, &params);
  fn assign(rng: &mut ChaChaRng, tree: &mut PartitionTree) {
    for d in tree.blocks.iter_mut() {
      d.segment_id = rng.gen_range(0..4);
    }
    for child in tree.children.iter_mut() {
      assign(rng, child);
    }
  }
  for tree in decisions.trees.iter_mut() {
    assign(&mut rng, tree);
  }

  let packet =
    encoder.encode_frame(&params, &source, &pred, &decisions).unwrap();
  let frame = decoder.decode(&packet.data, &pred).unwrap();
  assert_eq!(frame.header.segmentation, params.segmentation);
  assert_eq!(frame.decisions, decisions);
  assert!(frame.rec.visible_eq(&packet.rec));
  assert!(frame
    .tx_blocks
    .iter()
    .all(|b| b.coeffs.len() <= b.tx_size.area()));

  // The next frame keeps the segment data without sending it.
  let mut params = FrameParams::inter(60);
  params.segmentation.enabled = true;
  let (source, pred) = pictures(&mut rng, &config);
  let decisions = random_decisions(&mut rng, &config, &params);
  let packet =
    encoder.encode_frame(&params, &source, &pred, &decisions).unwrap();
  let frame = decoder.decode(&packet.data, &pred).unwrap();
  assert_eq!(frame.header.segmentation.data[1][0], -30);
  assert_eq!(frame.decisions, decisions);
}

#[test]
fn damaged_tiles_are_reported() {
  let mut rng = ChaChaRng::from_seed([9; 32]);
  let config = EncoderConfig {
    tile_cols_log2: 1,
    ..config(Generation::Gen2, 128, 64)
  };
  let params = FrameParams::key(60);
  let (source, pred) = pictures(&mut rng, &config);
  let decisions = random_decisions(&mut rng, &config, &params);
  let mut encoder =
    Config::new().with_encoder_config(config).new_encoder().unwrap();
  let mut packet =
    encoder.encode_frame(&params, &source, &pred, &decisions).unwrap();
  let truncated = packet.data[..2].to_vec();

  let (fh, len) = read_uncompressed_header(&packet.data, None).unwrap();
  let start = len + fh.compressed_header_size;
  packet.data[start..start + 4].copy_from_slice(&[0x7f, 0xff, 0xff, 0xff]);
  assert!(matches!(
    Decoder::new().decode(&packet.data, &pred),
    Err(DecoderError::BadTileSize { size: 0x7fff_ffff, .. })
  ));

  assert!(matches!(
    Decoder::new().decode(&truncated, &pred),
    Err(DecoderError::Truncated)
  ));
}

#[test]
fn inter_frames_need_a_key_frame() {
  let config = config(Generation::Gen2, 64, 64);
  let mut encoder =
    Config::new().with_encoder_config(config).new_encoder().unwrap();
  let frame = Frame::new(64, 64, 6);
  let d = BlockDecision::inter(
    ZEROMV,
    RefFrame::LAST_FRAME,
    MotionVector::zero(),
    TxSize::TX_32X32,
  );
  let decisions = FrameDecisions::new(
    1,
    1,
    vec![PartitionTree::uniform(BLOCK_64X64, BLOCK_32X32, d)],
  );
  assert!(matches!(
    encoder.encode_frame(&FrameParams::inter(60), &frame, &frame, &decisions),
    Err(EncoderError::InvalidConfiguration(_))
  ));
  assert!(encoder.last_header().is_none());
}
