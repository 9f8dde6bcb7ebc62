// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use criterion::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;

use rvpx::context::FrameContext;
use rvpx::ec::{BoolReader, Writer, WriterEncoder};
use rvpx::prelude::*;
use rvpx::quantize::QuantizationContext;
use rvpx::rdo::{optimize_b, TrellisBlock};
use rvpx::token::{BlockType, TokenCosts};
use rvpx::transform::forward_transform;

fn random_bools(n: usize) -> Vec<(bool, u8)> {
  let mut ra = ChaChaRng::from_seed([0; 32]);
  (0..n).map(|_| (ra.gen(), ra.gen_range(1..=255))).collect()
}

fn bool_coder(c: &mut Criterion) {
  let bools = random_bools(1 << 16);
  c.bench_function("bool_write", |b| {
    b.iter(|| {
      let mut w = WriterEncoder::new();
      for &(bit, prob) in bools.iter() {
        w.bool(bit, prob);
      }
      w.done().unwrap()
    })
  });

  let mut w = WriterEncoder::new();
  for &(bit, prob) in bools.iter() {
    w.bool(bit, prob);
  }
  let data = w.done().unwrap();
  c.bench_function("bool_read", |b| {
    b.iter(|| {
      let mut r = BoolReader::new(&data);
      bools.iter().filter(|&&(_, prob)| r.read_bool(prob)).count()
    })
  });
}

fn trellis(c: &mut Criterion) {
  let mut ra = ChaChaRng::from_seed([1; 32]);
  let tx_size = TxSize::TX_16X16;
  let area = tx_size.area();
  let residual: Vec<i16> =
    (0..area).map(|_| ra.gen_range(-48..=48)).collect();
  let mut coeffs = vec![0i32; area];
  forward_transform(&residual, &mut coeffs, tx_size);

  let qc = QuantizationContext::new(60, &Default::default());
  let costs = TokenCosts::new(&FrameContext::default());
  let block = TrellisBlock {
    tx_size,
    block_type: BlockType::Y_WITH_DC,
    ctx: 1,
    dequant: qc.y1.dequant,
    rdmult: qc.rdmult,
    rddiv: qc.rddiv,
  };
  c.bench_function("trellis_16x16", |b| {
    b.iter(|| {
      let mut q = vec![0i16; area];
      let mut dq = vec![0i32; area];
      let eob =
        qc.y1.quantize(&coeffs, &mut q, &mut dq, tx_size, 0, area, 0);
      optimize_b(&coeffs, &mut q, &mut dq, eob, &block, &costs)
    })
  });
}

fn full_frame(c: &mut Criterion) {
  let config = EncoderConfig { width: 256, height: 128, ..Default::default() };
  let mut ra = ChaChaRng::from_seed([2; 32]);
  let mut source = Frame::new(256, 128, 6);
  let mut pred = Frame::new(256, 128, 6);
  for (s, p) in source.planes.iter_mut().zip(pred.planes.iter_mut()) {
    for (s, p) in s.data.iter_mut().zip(p.data.iter_mut()) {
      *p = ra.gen_range(32..224);
      *s = (i32::from(*p) + ra.gen_range(-24..=24)) as u8;
    }
  }
  let d = BlockDecision::intra(PredictionMode::TM_PRED, TxSize::TX_8X8);
  let tree = PartitionTree::uniform(
    BlockSize::BLOCK_64X64,
    BlockSize::BLOCK_16X16,
    d,
  );
  let decisions = FrameDecisions::new(4, 2, vec![tree; 8]);
  let params = FrameParams::key(60);

  c.bench_function("key_frame_256x128", |b| {
    b.iter(|| {
      let mut encoder =
        Config::new().with_encoder_config(config).new_encoder().unwrap();
      encoder.encode_frame(&params, &source, &pred, &decisions).unwrap()
    })
  });
}

criterion_group!(benches, bool_coder, trellis, full_frame);
criterion_main!(benches);
