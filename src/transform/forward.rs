// Copyright (c) 2018-2019, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use super::TxSize;
use crate::tables::tables;
use crate::util::round_shift64;

/// Shift after the column pass of the basis transforms.
const FWD_SHIFT_1: usize = 12;

/// Integer 4x4 DCT with twice the orthonormal gain.
pub fn fdct4x4(input: &[i16], output: &mut [i32]) {
  let fetch = |idx: usize| i64::from(input[idx]);
  let mut tmp = [0i64; 16];

  for i in 0..4 {
    let a = (fetch(i * 4) + fetch(i * 4 + 3)) * 8;
    let b = (fetch(i * 4 + 1) + fetch(i * 4 + 2)) * 8;
    let c = (fetch(i * 4 + 1) - fetch(i * 4 + 2)) * 8;
    let d = (fetch(i * 4) - fetch(i * 4 + 3)) * 8;

    tmp[i * 4] = a + b;
    tmp[i * 4 + 2] = a - b;
    tmp[i * 4 + 1] = (c * 2217 + d * 5352 + 14500) >> 12;
    tmp[i * 4 + 3] = (d * 2217 - c * 5352 + 7500) >> 12;
  }

  for i in 0..4 {
    let a = tmp[i] + tmp[i + 12];
    let b = tmp[i + 4] + tmp[i + 8];
    let c = tmp[i + 4] - tmp[i + 8];
    let d = tmp[i] - tmp[i + 12];

    output[i] = ((a + b + 7) >> 4) as i32;
    output[i + 8] = ((a - b + 7) >> 4) as i32;
    output[i + 4] =
      (((c * 2217 + d * 5352 + 12000) >> 16) + (d != 0) as i64) as i32;
    output[i + 12] = ((d * 2217 - c * 5352 + 51000) >> 16) as i32;
  }
}

/// Walsh-Hadamard transform of the 16 luma DC values of a macroblock.
pub fn forward_wht(block: &mut [i32; 16]) {
  let mut tmp = [0i64; 16];
  for i in 0..4 {
    let a = i64::from(block[i * 4]) + i64::from(block[i * 4 + 3]);
    let b = i64::from(block[i * 4 + 1]) + i64::from(block[i * 4 + 2]);
    let c = i64::from(block[i * 4 + 1]) - i64::from(block[i * 4 + 2]);
    let d = i64::from(block[i * 4]) - i64::from(block[i * 4 + 3]);

    tmp[i * 4] = a + b;
    tmp[i * 4 + 1] = c + d;
    tmp[i * 4 + 2] = a - b;
    tmp[i * 4 + 3] = d - c;
  }

  let halve = |v: i64| ((v + (v > 0) as i64) / 2) as i32;
  for i in 0..4 {
    let a1 = tmp[i] + tmp[i + 12];
    let b1 = tmp[i + 4] + tmp[i + 8];
    let c1 = tmp[i + 4] - tmp[i + 8];
    let d1 = tmp[i] - tmp[i + 12];

    block[i] = halve(a1 + b1);
    block[i + 4] = halve(c1 + d1);
    block[i + 8] = halve(a1 - b1);
    block[i + 12] = halve(d1 - c1);
  }
}

/// Separable DCT over the Q14 basis of `tables()`, columns first.
fn fdct_basis(input: &[i16], output: &mut [i32], tx_size: TxSize) {
  let n = tx_size.width();
  let basis = &tables().dct_basis[tx_size as usize];
  let shift2 = if tx_size == TxSize::TX_32X32 { 16 } else { 15 };

  let mut tmp = vec![0i32; n * n];
  for k in 0..n {
    let b = &basis[k * n..][..n];
    for x in 0..n {
      let sum: i64 = (0..n)
        .map(|y| i64::from(b[y]) * i64::from(input[y * n + x]))
        .sum();
      tmp[k * n + x] = round_shift64(sum, FWD_SHIFT_1) as i32;
    }
  }
  for k in 0..n {
    let row = &tmp[k * n..][..n];
    for l in 0..n {
      let b = &basis[l * n..][..n];
      let sum: i64 =
        row.iter().zip(b).map(|(&t, &c)| i64::from(t) * i64::from(c)).sum();
      output[k * n + l] = round_shift64(sum, shift2) as i32;
    }
  }
}

/// Transform a residual block, both in raster order.
pub fn forward_transform(input: &[i16], output: &mut [i32], tx_size: TxSize) {
  match tx_size {
    TxSize::TX_4X4 => fdct4x4(input, output),
    _ => fdct_basis(input, output, tx_size),
  }
}
