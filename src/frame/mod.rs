// Copyright (c) 2018-2019, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

mod plane;
pub use plane::*;

/// One 4:2:0 video frame.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Frame {
  /// Planes constituting the frame.
  pub planes: [Plane; 3],
}

impl Frame {
  /// Creates a new frame whose allocation covers whole superblocks of
  /// `1 << sb_size_log2` luma pixels.
  pub fn new(width: usize, height: usize, sb_size_log2: usize) -> Self {
    let chroma_width = (width + 1) >> 1;
    let chroma_height = (height + 1) >> 1;
    let luma = PlaneConfig::new(width, height, 0, 0, sb_size_log2);
    let chroma = PlaneConfig {
      stride: luma.stride >> 1,
      alloc_height: luma.alloc_height >> 1,
      ..PlaneConfig::new(chroma_width, chroma_height, 1, 1, 0)
    };
    Frame {
      planes: [Plane::new(luma), Plane::new(chroma), Plane::new(chroma)],
    }
  }

  #[inline]
  pub fn width(&self) -> usize {
    self.planes[0].cfg.width
  }

  #[inline]
  pub fn height(&self) -> usize {
    self.planes[0].cfg.height
  }

  /// Pad every plane after its visible area was written.
  pub fn pad(&mut self) {
    for p in self.planes.iter_mut() {
      p.pad();
    }
  }

  /// Whether the visible areas of two frames are equal.
  pub fn visible_eq(&self, other: &Frame) -> bool {
    self.planes.iter().zip(other.planes.iter()).all(|(a, b)| {
      a.cfg.width == b.cfg.width
        && a.cfg.height == b.cfg.height
        && (0..a.cfg.height)
          .all(|y| a.row(y)[..a.cfg.width] == b.row(y)[..b.cfg.width])
    })
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn odd_dimensions() {
    let f = Frame::new(33, 17, 6);
    assert_eq!(f.planes[0].cfg.stride, 64);
    assert_eq!(f.planes[0].cfg.alloc_height, 64);
    assert_eq!(f.planes[1].cfg.width, 17);
    assert_eq!(f.planes[1].cfg.height, 9);
    assert_eq!(f.planes[2].cfg.stride, 32);
  }
}
