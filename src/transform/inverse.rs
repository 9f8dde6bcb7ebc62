// Copyright (c) 2018-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use super::TxSize;
use crate::tables::tables;
use crate::util::{clip_pixel, round_shift64};

const COSPI8SQRT2MINUS1: i64 = 20091;
const SINPI8SQRT2: i64 = 35468;

const INV_SHIFT_1: usize = 12;

#[inline(always)]
fn idct4_butterfly(i0: i64, i1: i64, i2: i64, i3: i64) -> [i64; 4] {
  let a1 = i0 + i2;
  let b1 = i0 - i2;
  let c1 =
    ((i1 * SINPI8SQRT2) >> 16) - (i3 + ((i3 * COSPI8SQRT2MINUS1) >> 16));
  let d1 =
    (i1 + ((i1 * COSPI8SQRT2MINUS1) >> 16)) + ((i3 * SINPI8SQRT2) >> 16);
  [a1 + d1, b1 + c1, b1 - c1, a1 - d1]
}

/// Inverse of `fdct4x4`, writing the residual in raster order.
pub fn idct4x4(input: &[i32], output: &mut [i32]) {
  let mut tmp = [0i64; 16];
  for i in 0..4 {
    let col = idct4_butterfly(
      i64::from(input[i]),
      i64::from(input[4 + i]),
      i64::from(input[8 + i]),
      i64::from(input[12 + i]),
    );
    for (r, v) in col.into_iter().enumerate() {
      tmp[r * 4 + i] = v;
    }
  }
  for i in 0..4 {
    let t = &tmp[i * 4..][..4];
    let row = idct4_butterfly(t[0], t[1], t[2], t[3]);
    for (c, v) in row.into_iter().enumerate() {
      output[i * 4 + c] = ((v + 4) >> 3) as i32;
    }
  }
}

/// Inverse of `forward_wht`. The outputs are the dequantized DC values of
/// the 16 luma blocks, in raster order.
pub fn inverse_wht(block: &mut [i32; 16]) {
  let mut tmp = [0i64; 16];
  for i in 0..4 {
    let a1 = i64::from(block[i]) + i64::from(block[12 + i]);
    let b1 = i64::from(block[4 + i]) + i64::from(block[8 + i]);
    let c1 = i64::from(block[4 + i]) - i64::from(block[8 + i]);
    let d1 = i64::from(block[i]) - i64::from(block[12 + i]);

    tmp[i] = a1 + b1;
    tmp[4 + i] = c1 + d1;
    tmp[8 + i] = a1 - b1;
    tmp[12 + i] = d1 - c1;
  }
  for i in 0..4 {
    let a1 = tmp[i * 4] + tmp[i * 4 + 3];
    let b1 = tmp[i * 4 + 1] + tmp[i * 4 + 2];
    let c1 = tmp[i * 4 + 1] - tmp[i * 4 + 2];
    let d1 = tmp[i * 4] - tmp[i * 4 + 3];

    block[i * 4] = ((a1 + b1 + 3) >> 3) as i32;
    block[i * 4 + 1] = ((c1 + d1 + 3) >> 3) as i32;
    block[i * 4 + 2] = ((a1 - b1 + 3) >> 3) as i32;
    block[i * 4 + 3] = ((d1 - c1 + 3) >> 3) as i32;
  }
}

fn idct_basis(input: &[i32], output: &mut [i32], tx_size: TxSize) {
  let n = tx_size.width();
  let basis = &tables().dct_basis[tx_size as usize];
  let shift2 = if tx_size == TxSize::TX_32X32 { 16 } else { 17 };

  // Rows of coefficients to rows of spatial samples.
  let mut tmp = vec![0i32; n * n];
  for k in 0..n {
    let row = &input[k * n..][..n];
    if row.iter().all(|&c| c == 0) {
      continue;
    }
    for x in 0..n {
      let sum: i64 = row
        .iter()
        .enumerate()
        .map(|(l, &c)| i64::from(c) * i64::from(basis[l * n + x]))
        .sum();
      tmp[k * n + x] = round_shift64(sum, INV_SHIFT_1) as i32;
    }
  }
  for y in 0..n {
    for x in 0..n {
      let sum: i64 = (0..n)
        .map(|k| i64::from(tmp[k * n + x]) * i64::from(basis[k * n + y]))
        .sum();
      output[y * n + x] = round_shift64(sum, shift2) as i32;
    }
  }
}

/// Residual of a block of dequantized coefficients, in raster order.
pub fn inverse_transform(input: &[i32], output: &mut [i32], tx_size: TxSize) {
  match tx_size {
    TxSize::TX_4X4 => idct4x4(input, output),
    _ => idct_basis(input, output, tx_size),
  }
}

/// Inverse transform `input` and add the residual to `dst`, clipping to
/// the pixel range.
pub fn inverse_transform_add(
  input: &[i32], dst: &mut [u8], stride: usize, tx_size: TxSize,
) {
  let n = tx_size.width();
  let mut residual = [0i32; 32 * 32];
  let residual = &mut residual[..n * n];
  inverse_transform(input, residual, tx_size);
  for (y, row) in residual.chunks_exact(n).enumerate() {
    let dst_row = &mut dst[y * stride..][..n];
    for (d, &r) in dst_row.iter_mut().zip(row) {
      *d = clip_pixel(i32::from(*d) + r);
    }
  }
}
