// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Motion vector coding and reference candidates.

use std::ops;

use arrayvec::ArrayVec;

use crate::context::{MV_PROBS, MV_SHORT_TREE};
use crate::ec::*;
use crate::partition::{PredictionMode, RefFrame};
use crate::serialize::{Deserialize, Serialize};
use crate::tables::tables;

/// Magnitudes below this are coded with the short tree.
pub const MV_SHORT_COUNT: u32 = 8;
/// Bits of a long magnitude.
pub const MV_LONG_BITS: usize = 10;
/// Largest codable component difference.
pub const MV_MAX: i32 = (1 << MV_LONG_BITS) - 1;

const MVP_IS_SHORT: usize = 0;
const MVP_SIGN: usize = 1;
const MVP_SHORT: usize = 2;
const MVP_BITS: usize = MVP_SHORT + MV_SHORT_COUNT as usize - 1;

/// Branch counts of the probabilities of one component.
pub type MvCounts = [[u32; 2]; MV_PROBS];

#[derive(
  Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct MotionVector {
  pub row: i16,
  pub col: i16,
}

impl MotionVector {
  #[inline]
  pub const fn new(row: i16, col: i16) -> Self {
    MotionVector { row, col }
  }

  #[inline]
  pub const fn zero() -> Self {
    MotionVector { row: 0, col: 0 }
  }

  #[inline]
  pub const fn is_zero(self) -> bool {
    self.row == 0 && self.col == 0
  }

  /// Whether the difference to `best` is codable.
  #[inline]
  pub fn codable_against(self, best: MotionVector) -> bool {
    let d = self - best;
    i32::from(d.row).abs() <= MV_MAX && i32::from(d.col).abs() <= MV_MAX
  }
}

impl ops::Sub for MotionVector {
  type Output = MotionVector;

  fn sub(self, rhs: MotionVector) -> MotionVector {
    MotionVector {
      row: self.row.wrapping_sub(rhs.row),
      col: self.col.wrapping_sub(rhs.col),
    }
  }
}

impl ops::Add for MotionVector {
  type Output = MotionVector;

  fn add(self, rhs: MotionVector) -> MotionVector {
    MotionVector {
      row: self.row.wrapping_add(rhs.row),
      col: self.col.wrapping_add(rhs.col),
    }
  }
}

#[inline]
fn write_counted<W: Writer>(
  w: &mut W, bit: bool, probs: &[u8; MV_PROBS],
  counts: &mut Option<&mut MvCounts>, node: usize,
) {
  w.bool(bit, probs[node]);
  if let Some(c) = counts.as_deref_mut() {
    c[node][bit as usize] += 1;
  }
}

#[inline]
fn read_counted(
  r: &mut BoolReader, probs: &[u8; MV_PROBS],
  counts: &mut Option<&mut MvCounts>, node: usize,
) -> bool {
  let bit = r.read_bool(probs[node]);
  if let Some(c) = counts.as_deref_mut() {
    c[node][bit as usize] += 1;
  }
  bit
}

/// Order in which the long magnitude bits are coded. Bit 3 comes last
/// and is implied when no higher bit is set.
const LONG_BIT_ORDER: [usize; MV_LONG_BITS - 1] = [0, 1, 2, 9, 8, 7, 6, 5, 4];

/// Write one component difference, `|v| <= MV_MAX`.
pub fn write_mv_component<W: Writer>(
  w: &mut W, v: i32, probs: &[u8; MV_PROBS], mut counts: Option<&mut MvCounts>,
) {
  debug_assert!(v.abs() <= MV_MAX);
  let x = v.unsigned_abs();
  if x < MV_SHORT_COUNT {
    write_counted(w, false, probs, &mut counts, MVP_IS_SHORT);
    let tt = tables().mv_short_tokens[x as usize];
    let short = &probs[MVP_SHORT..MVP_BITS];
    w.write_token(MV_SHORT_TREE, short, tt);
    if let Some(c) = counts.as_deref_mut() {
      crate::context::count_token_branches(
        MV_SHORT_TREE,
        tt,
        0,
        &mut c[MVP_SHORT..MVP_BITS],
      );
    }
    if x == 0 {
      return;
    }
  } else {
    write_counted(w, true, probs, &mut counts, MVP_IS_SHORT);
    for i in LONG_BIT_ORDER {
      write_counted(w, (x >> i) & 1 != 0, probs, &mut counts, MVP_BITS + i);
    }
    if x & 0xFFF0 != 0 {
      write_counted(w, (x >> 3) & 1 != 0, probs, &mut counts, MVP_BITS + 3);
    }
  }
  write_counted(w, v < 0, probs, &mut counts, MVP_SIGN);
}

pub fn read_mv_component(
  r: &mut BoolReader, probs: &[u8; MV_PROBS],
  mut counts: Option<&mut MvCounts>,
) -> i32 {
  let x = if read_counted(r, probs, &mut counts, MVP_IS_SHORT) {
    let mut x = 0u32;
    for i in LONG_BIT_ORDER {
      x |= (read_counted(r, probs, &mut counts, MVP_BITS + i) as u32) << i;
    }
    if x & 0xFFF0 == 0 || read_counted(r, probs, &mut counts, MVP_BITS + 3) {
      x += 8;
    }
    x
  } else {
    let short = &probs[MVP_SHORT..MVP_BITS];
    let x = r.read_tree(MV_SHORT_TREE, short) as u32;
    if let Some(c) = counts.as_deref_mut() {
      crate::context::count_token_branches(
        MV_SHORT_TREE,
        tables().mv_short_tokens[x as usize],
        0,
        &mut c[MVP_SHORT..MVP_BITS],
      );
    }
    x
  };
  if x != 0 && read_counted(r, probs, &mut counts, MVP_SIGN) {
    -(x as i32)
  } else {
    x as i32
  }
}

/// Write `mv` as a difference to `best`, row first.
pub fn write_mv<W: Writer>(
  w: &mut W, mv: MotionVector, best: MotionVector,
  probs: &[[u8; MV_PROBS]; 2], counts: Option<&mut [MvCounts; 2]>,
) {
  let d = mv - best;
  match counts {
    Some([rc, cc]) => {
      write_mv_component(w, d.row.into(), &probs[0], Some(rc));
      write_mv_component(w, d.col.into(), &probs[1], Some(cc));
    }
    None => {
      write_mv_component(w, d.row.into(), &probs[0], None);
      write_mv_component(w, d.col.into(), &probs[1], None);
    }
  }
}

pub fn read_mv(
  r: &mut BoolReader, best: MotionVector, probs: &[[u8; MV_PROBS]; 2],
  counts: Option<&mut [MvCounts; 2]>,
) -> MotionVector {
  let (row, col) = match counts {
    Some([rc, cc]) => (
      read_mv_component(r, &probs[0], Some(rc)),
      read_mv_component(r, &probs[1], Some(cc)),
    ),
    None => (
      read_mv_component(r, &probs[0], None),
      read_mv_component(r, &probs[1], None),
    ),
  };
  best + MotionVector::new(row as i16, col as i16)
}

/// Cost in 1/256 bits of a component difference.
pub fn mv_component_cost(v: i32, probs: &[u8; MV_PROBS]) -> u32 {
  let mut w = WriterCounter::new();
  write_mv_component(&mut w, v, probs, None);
  w.tell_frac() as u32
}

/// What a neighboring block contributes to the candidates of a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MvNeighbor {
  pub mode: PredictionMode,
  pub ref_frame: RefFrame,
  pub mv: MotionVector,
}

/// Motion vectors an inter block may use without coding a vector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MvCandidates {
  pub nearest: MotionVector,
  pub near: MotionVector,
  /// Base of a coded difference
  pub best: MotionVector,
}

impl MvCandidates {
  /// Candidates from the available neighbors, nearest first. Neighbors
  /// using `ref_frame` come before those using another reference; zero
  /// and repeated vectors are skipped.
  pub fn find(neighbors: &[Option<MvNeighbor>], ref_frame: RefFrame) -> Self {
    let mut found: ArrayVec<MotionVector, 2> = ArrayVec::new();
    let same = neighbors.iter().flatten().filter(|n| n.ref_frame == ref_frame);
    let other = neighbors
      .iter()
      .flatten()
      .filter(|n| n.ref_frame.is_inter() && n.ref_frame != ref_frame);
    for n in same.chain(other) {
      if found.is_full() {
        break;
      }
      if !n.mv.is_zero() && !found.contains(&n.mv) {
        found.push(n.mv);
      }
    }
    let nearest = found.first().copied().unwrap_or_default();
    let near = found.get(1).copied().unwrap_or_default();
    MvCandidates { nearest, near, best: nearest }
  }

  /// Vector used by a block coded with `mode`.
  pub fn resolve(
    &self, mode: PredictionMode, coded: MotionVector,
  ) -> MotionVector {
    match mode {
      PredictionMode::NEARESTMV => self.nearest,
      PredictionMode::NEARMV => self.near,
      PredictionMode::NEWMV => coded,
      _ => MotionVector::zero(),
    }
  }
}

#[inline]
const fn mode_counter(n: &Option<MvNeighbor>) -> usize {
  match n {
    None => 0,
    Some(n) => match n.mode {
      PredictionMode::NEARESTMV | PredictionMode::NEARMV => 0,
      PredictionMode::NEWMV => 1,
      PredictionMode::ZEROMV => 3,
      _ => 9,
    },
  }
}

const BOTH_ZERO: usize = 0;
const ZERO_PLUS_PREDICTED: usize = 1;
const BOTH_PREDICTED_MV: usize = 2;
const NEW_PLUS_NON_INTRA: usize = 3;
const BOTH_NEW: usize = 4;
const INTRA_PLUS_NON_INTRA: usize = 5;
const BOTH_INTRA: usize = 6;

/// Context of the inter mode symbol from the above and left neighbors.
pub const fn inter_mode_context(
  above: &Option<MvNeighbor>, left: &Option<MvNeighbor>,
) -> usize {
  match mode_counter(above) + mode_counter(left) {
    0 => BOTH_PREDICTED_MV,
    1 | 4 => NEW_PLUS_NON_INTRA,
    2 => BOTH_NEW,
    3 => ZERO_PLUS_PREDICTED,
    6 => BOTH_ZERO,
    9 | 10 | 12 => INTRA_PLUS_NON_INTRA,
    _ => BOTH_INTRA,
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::context::DEFAULT_MV_PROBS;

  #[test]
  fn components_round_trip() {
    let values = [0, 1, -1, 7, -7, 8, 15, 16, -17, 100, 511, -1023, MV_MAX];
    let probs = &DEFAULT_MV_PROBS[0];
    let mut w = WriterEncoder::new();
    let mut wc = [[0u32; 2]; MV_PROBS];
    for &v in values.iter() {
      write_mv_component(&mut w, v, probs, Some(&mut wc));
    }
    let bytes = w.done().unwrap();
    let mut r = BoolReader::new(&bytes);
    let mut rc = [[0u32; 2]; MV_PROBS];
    for &v in values.iter() {
      assert_eq!(read_mv_component(&mut r, probs, Some(&mut rc)), v);
    }
    assert_eq!(wc, rc);
  }

  #[test]
  fn implied_third_bit() {
    let probs = &DEFAULT_MV_PROBS[1];
    // 8..=15 never code bit 3.
    let mut counts = [[0u32; 2]; MV_PROBS];
    let mut w = WriterCounter::new();
    write_mv_component(&mut w, 12, probs, Some(&mut counts));
    assert_eq!(counts[MVP_BITS + 3], [0, 0]);
    write_mv_component(&mut w, 24, probs, Some(&mut counts));
    assert_eq!(counts[MVP_BITS + 3], [0, 1]);
    assert!(mv_component_cost(0, probs) < mv_component_cost(300, probs));
  }

  #[test]
  fn vectors_round_trip_against_best() {
    let best = MotionVector::new(-12, 40);
    let mvs = [MotionVector::new(3, -5), MotionVector::new(-500, 800), best];
    let mut w = WriterEncoder::new();
    for &mv in mvs.iter() {
      assert!(mv.codable_against(best));
      write_mv(&mut w, mv, best, &DEFAULT_MV_PROBS, None);
    }
    let bytes = w.done().unwrap();
    let mut r = BoolReader::new(&bytes);
    for &mv in mvs.iter() {
      assert_eq!(read_mv(&mut r, best, &DEFAULT_MV_PROBS, None), mv);
    }
    assert!(!MotionVector::new(1100, 0).codable_against(best));
  }

  #[test]
  fn candidates() {
    let n = |mode, ref_frame, row, col| {
      Some(MvNeighbor { mode, ref_frame, mv: MotionVector::new(row, col) })
    };
    let neighbors = [
      n(PredictionMode::NEWMV, RefFrame::GOLDEN_FRAME, 4, 4),
      n(PredictionMode::NEARMV, RefFrame::LAST_FRAME, 2, -2),
      None,
    ];
    let c = MvCandidates::find(&neighbors, RefFrame::LAST_FRAME);
    assert_eq!(c.nearest, MotionVector::new(2, -2));
    assert_eq!(c.near, MotionVector::new(4, 4));
    assert_eq!(c.best, c.nearest);
    assert_eq!(
      c.resolve(PredictionMode::ZEROMV, MotionVector::new(9, 9)),
      MotionVector::zero()
    );
    let c = MvCandidates::find(&[None, None], RefFrame::LAST_FRAME);
    assert_eq!(c, MvCandidates::default());
  }

  #[test]
  fn mode_contexts() {
    let n = |mode| {
      Some(MvNeighbor {
        mode,
        ref_frame: RefFrame::LAST_FRAME,
        mv: MotionVector::zero(),
      })
    };
    let zero = n(PredictionMode::ZEROMV);
    let new = n(PredictionMode::NEWMV);
    let intra = n(PredictionMode::DC_PRED);
    assert_eq!(inter_mode_context(&None, &None), BOTH_PREDICTED_MV);
    assert_eq!(inter_mode_context(&zero, &zero), BOTH_ZERO);
    assert_eq!(inter_mode_context(&new, &new), BOTH_NEW);
    assert_eq!(inter_mode_context(&intra, &intra), BOTH_INTRA);
    assert_eq!(inter_mode_context(&intra, &zero), INTRA_PLUS_NON_INTRA);
  }
}
