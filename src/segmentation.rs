// Copyright (c) 2018, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

#![allow(non_upper_case_globals)]

use crate::api::InvalidConfig;
use crate::context::{MAX_SEGMENTS, SEG_TREE_PROBS, SEGMENT_TREE};
use crate::ec::{BoolReader, Writer};
use crate::partition::RefFrame;
use crate::quantize::MAXQ;
use crate::serialize::{Deserialize, Serialize};
use crate::tables::tables;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum SegLvl {
  SEG_LVL_ALT_Q = 0,
  SEG_LVL_ALT_LF = 1,
  SEG_LVL_REF_FRAME = 2,
  SEG_LVL_SKIP = 3,
  SEG_LVL_EOB = 4,
  SEG_LVL_MAX = 5,
}

pub const seg_feature_bits: [u32; SegLvl::SEG_LVL_MAX as usize] =
  [7, 6, 2, 0, 11];

pub const seg_feature_is_signed: [bool; SegLvl::SEG_LVL_MAX as usize] =
  [true, true, false, false, false];

const seg_feature_max: [i16; SegLvl::SEG_LVL_MAX as usize] =
  [MAXQ as i16, 63, RefFrame::ALTREF_FRAME as i16, 0, 1024];

/// Segment features of a frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentationState {
  pub enabled: bool,
  /// Whether blocks code their segment id
  pub update_map: bool,
  /// Whether the header carries the feature data
  pub update_data: bool,
  /// Feature data replaces the frame values instead of adjusting them
  pub abs_delta: bool,
  pub tree_probs: [u8; SEG_TREE_PROBS],
  pub features: [[bool; SegLvl::SEG_LVL_MAX as usize]; MAX_SEGMENTS],
  pub data: [[i16; SegLvl::SEG_LVL_MAX as usize]; MAX_SEGMENTS],
}

impl Default for SegmentationState {
  fn default() -> Self {
    SegmentationState {
      enabled: false,
      update_map: false,
      update_data: false,
      abs_delta: false,
      tree_probs: [255; SEG_TREE_PROBS],
      features: [[false; SegLvl::SEG_LVL_MAX as usize]; MAX_SEGMENTS],
      data: [[0; SegLvl::SEG_LVL_MAX as usize]; MAX_SEGMENTS],
    }
  }
}

impl SegmentationState {
  /// Data of `feature` for segment `segment_id`, `None` when the feature
  /// is not active.
  #[inline]
  pub fn feature(&self, segment_id: u8, feature: SegLvl) -> Option<i16> {
    let s = segment_id as usize;
    if self.enabled && self.features[s][feature as usize] {
      Some(self.data[s][feature as usize])
    } else {
      None
    }
  }

  /// Enable `feature` on segment `segment_id`.
  pub fn set_feature(&mut self, segment_id: u8, feature: SegLvl, data: i16) {
    let s = segment_id as usize;
    self.features[s][feature as usize] = true;
    self.data[s][feature as usize] = data;
  }

  /// Quantizer index of a segment.
  pub fn qindex(&self, base_q_idx: u8, segment_id: u8) -> u8 {
    match self.feature(segment_id, SegLvl::SEG_LVL_ALT_Q) {
      Some(data) => {
        let q = if self.abs_delta { data } else { base_q_idx as i16 + data };
        q.clamp(0, MAXQ as i16) as u8
      }
      None => base_q_idx,
    }
  }

  /// Number of leading scan positions a segment may code.
  #[inline]
  pub fn eob_max(&self, segment_id: u8) -> Option<usize> {
    self.feature(segment_id, SegLvl::SEG_LVL_EOB).map(|d| d as usize)
  }

  #[inline]
  pub fn skip_forced(&self, segment_id: u8) -> bool {
    self.feature(segment_id, SegLvl::SEG_LVL_SKIP).is_some()
  }

  /// Reference frame implied by a segment.
  #[inline]
  pub fn ref_frame(&self, segment_id: u8) -> Option<RefFrame> {
    use num_traits::FromPrimitive;
    self
      .feature(segment_id, SegLvl::SEG_LVL_REF_FRAME)
      .and_then(|d| RefFrame::from_i16(d))
  }

  /// The state a decoder ends up with once the header carrying `self`
  /// is parsed: a disabled state is cleared, tree probabilities not sent
  /// are 255 and feature data not sent comes from `prev`.
  pub fn inherit(self, prev: Option<&SegmentationState>) -> Self {
    if !self.enabled {
      return SegmentationState::default();
    }
    let mut seg = self;
    if !seg.update_map {
      seg.tree_probs = [255; SEG_TREE_PROBS];
    }
    if seg.update_data {
      for (features, data) in seg.features.iter().zip(seg.data.iter_mut()) {
        for j in 0..SegLvl::SEG_LVL_MAX as usize {
          if !features[j] || seg_feature_bits[j] == 0 {
            data[j] = 0;
          }
        }
      }
    } else {
      let prev = prev.copied().unwrap_or_default();
      seg.features = prev.features;
      seg.data = prev.data;
      seg.abs_delta = prev.abs_delta;
    }
    seg
  }

  /// # Errors
  ///
  /// - Returns `InvalidConfig::InvalidSegmentation` when a feature value
  ///   does not fit its field or a tree probability is 0.
  pub fn validate(&self) -> Result<(), InvalidConfig> {
    if !self.enabled {
      return Ok(());
    }
    if self.tree_probs.contains(&0) {
      return Err(InvalidConfig::InvalidSegmentation { segment: 0 });
    }
    for (s, (features, data)) in
      self.features.iter().zip(self.data.iter()).enumerate()
    {
      for j in 0..SegLvl::SEG_LVL_MAX as usize {
        if !features[j] {
          continue;
        }
        let max = seg_feature_max[j];
        let min = if seg_feature_is_signed[j] { -max } else { 0 };
        if !(min..=max).contains(&data[j]) {
          return Err(InvalidConfig::InvalidSegmentation { segment: s });
        }
      }
    }
    Ok(())
  }
}

pub fn write_segment_id<W: Writer>(
  w: &mut W, segmentation: &SegmentationState, segment_id: u8,
) {
  let token = tables().segment_tokens[segment_id as usize];
  w.write_token(SEGMENT_TREE, &segmentation.tree_probs, token);
}

pub fn read_segment_id(
  r: &mut BoolReader, segmentation: &SegmentationState,
) -> u8 {
  r.read_tree(SEGMENT_TREE, &segmentation.tree_probs) as u8
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn segment_quantizers() {
    let mut seg = SegmentationState { enabled: true, ..Default::default() };
    seg.set_feature(1, SegLvl::SEG_LVL_ALT_Q, -20);
    seg.set_feature(2, SegLvl::SEG_LVL_ALT_Q, 100);
    assert_eq!(seg.qindex(40, 0), 40);
    assert_eq!(seg.qindex(40, 1), 20);
    assert_eq!(seg.qindex(40, 2), 127);
    seg.abs_delta = true;
    assert_eq!(seg.qindex(40, 1), 0);
  }

  #[test]
  fn disabled_features_are_ignored() {
    let mut seg = SegmentationState::default();
    seg.set_feature(0, SegLvl::SEG_LVL_SKIP, 0);
    assert!(!seg.skip_forced(0));
    seg.enabled = true;
    assert!(seg.skip_forced(0));
    assert_eq!(seg.ref_frame(0), None);
  }

  #[test]
  fn out_of_range_data() {
    let mut seg = SegmentationState { enabled: true, ..Default::default() };
    seg.set_feature(3, SegLvl::SEG_LVL_EOB, 2000);
    assert_eq!(
      seg.validate(),
      Err(InvalidConfig::InvalidSegmentation { segment: 3 })
    );
    seg.set_feature(3, SegLvl::SEG_LVL_EOB, 16);
    assert_eq!(seg.validate(), Ok(()));
  }

  #[test]
  fn unsent_data_is_carried_over() {
    let mut prev = SegmentationState {
      enabled: true,
      update_data: true,
      ..Default::default()
    };
    prev.set_feature(1, SegLvl::SEG_LVL_ALT_Q, -8);
    prev.set_feature(2, SegLvl::SEG_LVL_SKIP, 5);
    let prev = prev.inherit(None);
    assert_eq!(prev.data[2][SegLvl::SEG_LVL_SKIP as usize], 0);

    let mut next = SegmentationState { enabled: true, ..Default::default() };
    next.tree_probs = [10, 20, 30];
    let next = next.inherit(Some(&prev));
    assert_eq!(next.tree_probs, [255; SEG_TREE_PROBS]);
    assert_eq!(next.qindex(40, 1), 32);
    assert!(next.skip_forced(2));
    assert_eq!(next.inherit(None).qindex(40, 1), 40);

    let off = SegmentationState { enabled: false, ..next };
    assert_eq!(off.inherit(Some(&prev)), SegmentationState::default());
  }
}
