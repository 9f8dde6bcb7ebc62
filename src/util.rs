// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

pub trait Fixed {
  fn floor_log2(&self, n: usize) -> usize;
  fn ceil_log2(&self, n: usize) -> usize;
  fn align_power_of_two(&self, n: usize) -> usize;
  fn align_power_of_two_and_shift(&self, n: usize) -> usize;
}

impl Fixed for usize {
  #[inline]
  fn floor_log2(&self, n: usize) -> usize {
    self & !((1 << n) - 1)
  }
  #[inline]
  fn ceil_log2(&self, n: usize) -> usize {
    (self + (1 << n) - 1).floor_log2(n)
  }
  #[inline]
  fn align_power_of_two(&self, n: usize) -> usize {
    self.ceil_log2(n)
  }
  #[inline]
  fn align_power_of_two_and_shift(&self, n: usize) -> usize {
    (self + (1 << n) - 1) >> n
  }
}

pub fn clamp<T: PartialOrd>(input: T, min: T, max: T) -> T {
  if input < min {
    min
  } else if input > max {
    max
  } else {
    input
  }
}

#[inline]
pub const fn round_shift64(value: i64, bit: usize) -> i64 {
  if bit == 0 {
    value
  } else {
    (value + (1 << (bit - 1))) >> bit
  }
}

/// Clip a reconstructed sample to the 8-bit pixel range.
#[inline]
pub fn clip_pixel(v: i32) -> u8 {
  clamp(v, 0, 255) as u8
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn align() {
    assert_eq!(17usize.align_power_of_two(3), 24);
    assert_eq!(16usize.align_power_of_two(3), 16);
    assert_eq!(17usize.align_power_of_two_and_shift(3), 3);
    assert_eq!(65usize.align_power_of_two_and_shift(6), 2);
  }

  #[test]
  fn pixel_clipping() {
    assert_eq!(clip_pixel(-3), 0);
    assert_eq!(clip_pixel(300), 255);
    assert_eq!(round_shift64(7, 2), 2);
    assert_eq!(round_shift64(-7, 2), -2);
  }
}
