// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use std::fmt;

use crate::util::Fixed;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneConfig {
  /// Row length of the allocation.
  pub stride: usize,
  /// Rows of the allocation.
  pub alloc_height: usize,
  /// Visible width.
  pub width: usize,
  /// Visible height.
  pub height: usize,
  pub xdec: usize,
  pub ydec: usize,
}

impl PlaneConfig {
  /// Configuration of a plane whose allocation covers `width`x`height`
  /// rounded up to `align` pixels.
  pub fn new(
    width: usize, height: usize, xdec: usize, ydec: usize, align_log2: usize,
  ) -> Self {
    PlaneConfig {
      stride: width.align_power_of_two(align_log2),
      alloc_height: height.align_power_of_two(align_log2),
      width,
      height,
      xdec,
      ydec,
    }
  }
}

/// An 8-bit sample plane. The area past the visible edge is kept equal to
/// the last visible column and row once [`Plane::pad`] ran.
#[derive(Clone, PartialEq, Eq)]
pub struct Plane {
  pub data: Vec<u8>,
  pub cfg: PlaneConfig,
}

impl fmt::Debug for Plane {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "Plane {{ {}x{}, stride {}, dec {}x{} }}",
      self.cfg.width,
      self.cfg.height,
      self.cfg.stride,
      self.cfg.xdec,
      self.cfg.ydec
    )
  }
}

impl Plane {
  pub fn new(cfg: PlaneConfig) -> Self {
    Plane { data: vec![0; cfg.stride * cfg.alloc_height], cfg }
  }

  #[inline]
  pub fn row(&self, y: usize) -> &[u8] {
    &self.data[y * self.cfg.stride..][..self.cfg.stride]
  }

  #[inline]
  pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
    let stride = self.cfg.stride;
    &mut self.data[y * stride..][..stride]
  }

  /// Samples from `(x, y)` to the end of the allocation.
  #[inline]
  pub fn slice(&self, x: usize, y: usize) -> &[u8] {
    &self.data[y * self.cfg.stride + x..]
  }

  #[inline]
  pub fn slice_mut(&mut self, x: usize, y: usize) -> &mut [u8] {
    let stride = self.cfg.stride;
    &mut self.data[y * stride + x..]
  }

  #[inline]
  pub fn p(&self, x: usize, y: usize) -> u8 {
    self.data[y * self.cfg.stride + x]
  }

  /// Copy the visible area from `source` and pad.
  pub fn copy_from_raw_u8(&mut self, source: &[u8], source_stride: usize) {
    let width = self.cfg.width;
    for (y, src) in
      source.chunks(source_stride).take(self.cfg.height).enumerate()
    {
      self.row_mut(y)[..width].copy_from_slice(&src[..width]);
    }
    self.pad();
  }

  /// Replicate the last visible column and row into the rest of the
  /// allocation.
  pub fn pad(&mut self) {
    let PlaneConfig { width, height, stride, alloc_height, .. } = self.cfg;
    if width == 0 || height == 0 {
      return;
    }
    for y in 0..height {
      let row = self.row_mut(y);
      let edge = row[width - 1];
      row[width..stride].fill(edge);
    }
    for y in height..alloc_height {
      let (above, below) = self.data.split_at_mut(y * stride);
      below[..stride]
        .copy_from_slice(&above[(height - 1) * stride..][..stride]);
    }
  }

  /// Fill the whole allocation with one value.
  pub fn fill(&mut self, v: u8) {
    self.data.fill(v);
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn pad_replicates_edges() {
    let mut plane = Plane::new(PlaneConfig::new(3, 2, 0, 0, 3));
    plane.copy_from_raw_u8(&[1, 2, 3, 4, 5, 6], 3);
    assert_eq!(plane.cfg.stride, 8);
    assert_eq!(plane.row(0), &[1, 2, 3, 3, 3, 3, 3, 3]);
    assert_eq!(plane.row(7), &[4, 5, 6, 6, 6, 6, 6, 6]);
  }
}
