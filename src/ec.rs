// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use std::fmt;

use crate::api::EncoderError;
use crate::context::TreeToken;
use crate::tables::tables;

/// Costs reported by `tell_frac` are in units of `1 / (1 << COST_BITRES)`
/// bits.
pub const COST_BITRES: u32 = 8;
/// Probability of an equiprobable bit.
pub const PROB_HALF: u8 = 128;

/// Number of zero bits at `PROB_HALF` appended by `done()`.
const FLUSH_BITS: usize = 32;

pub trait Writer {
  /// Encode a single binary value.
  /// - `val`: The value to encode (`false` or `true`).
  /// - `prob`: The probability that `val` is `false`, scaled by 256.
  fn bool(&mut self, val: bool, prob: u8);
  /// Encode a single boolean value with flat probability.
  fn bit(&mut self, bit: u16);
  /// Encode a literal bitstring, bit by bit in MSB order, with flat
  /// probability.
  fn literal(&mut self, bits: u8, s: u32);
  /// Magnitude as an unsigned literal followed by a sign bit.
  fn signed_literal(&mut self, bits: u8, v: i32);
  /// Encode the path of a tree symbol.
  /// - `tree`: flat tree, see [`crate::context::tree`].
  /// - `probs`: one probability per internal node pair.
  /// - `token`: the `(value, len)` path of the symbol.
  fn write_token(&mut self, tree: &[i8], probs: &[u8], token: TreeToken);
  /// Like `write_token`, without the first `skip` decisions of the path.
  fn write_token_from(
    &mut self, tree: &[i8], probs: &[u8], token: TreeToken, skip: u8,
  );
  /// Cost in `1/256` bits of everything written so far.
  fn tell_frac(&self) -> u64;
  /// Save current point in coding/recording to a checkpoint.
  fn checkpoint(&mut self) -> WriterCheckpoint;
  /// Restore saved position in coding/recording from a checkpoint.
  fn rollback(&mut self, _: &WriterCheckpoint);
}

/// `StorageBackend` is an internal trait used to tie a specific `Writer`
/// implementation's storage to the generic `Writer`.  It would be private,
/// but Rust is deprecating 'private trait in a public interface' support.
pub trait StorageBackend {
  /// Store a coded bool with its probability.
  fn store(&mut self, val: bool, prob: u8);
  /// Number of whole bytes stored so far.
  fn stream_bytes(&self) -> usize;
  /// Backend implementation of checkpoint to pass through Writer interface
  fn checkpoint(&mut self) -> WriterCheckpoint;
  /// Backend implementation of rollback to pass through Writer interface
  fn rollback(&mut self, _: &WriterCheckpoint);
}

#[derive(Debug, Clone)]
pub struct WriterBase<S> {
  /// Accumulated cost of the coded symbols in 1/256 bits
  cost: u64,
  /// Storage backend
  s: S,
}

/// Only accumulates the cost of what would be written.
#[derive(Debug, Clone)]
pub struct WriterCounter {
  /// Number of bools counted
  count: usize,
}

/// Records `(bool, prob)` pairs for a later `replay`.
#[derive(Debug, Clone)]
pub struct WriterRecorder {
  /// Storage for the recorded symbols
  storage: Vec<(bool, u8)>,
}

/// The bool coder proper.
#[derive(Clone)]
pub struct WriterEncoder {
  /// A buffer for output bytes with their carry bit
  precarry: Vec<u16>,
  /// The low end of the current range, including pending bits
  low: u32,
  /// The number of values in the current range, in `[128, 255]`
  range: u32,
  /// Bits shifted out of the window and not yet emitted as a byte
  cnt: u32,
  /// Maximum number of output bytes
  capacity: usize,
  /// Set once the output grew beyond `capacity`
  overflow: bool,
}

impl fmt::Debug for WriterEncoder {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.debug_struct("WriterEncoder")
      .field("bytes", &self.precarry.len())
      .field("low", &self.low)
      .field("range", &self.range)
      .field("cnt", &self.cnt)
      .finish()
  }
}

/// Position in a coded or recorded stream.
#[derive(Clone, Debug)]
pub struct WriterCheckpoint {
  /// Cost at the time of the checkpoint
  cost: u64,
  /// Byte or symbol count at the time of the checkpoint
  stream_size: usize,
  /// The last staged byte, which a later carry may modify
  last_byte: u16,
  low: u32,
  range: u32,
  cnt: u32,
}

impl WriterCounter {
  #[inline]
  pub const fn new() -> WriterBase<WriterCounter> {
    WriterBase::new(WriterCounter { count: 0 })
  }
}

impl WriterRecorder {
  #[inline]
  pub const fn new() -> WriterBase<WriterRecorder> {
    WriterBase::new(WriterRecorder { storage: Vec::new() })
  }
}

impl WriterEncoder {
  /// An encoder without an output limit.
  #[inline]
  pub const fn new() -> WriterBase<WriterEncoder> {
    Self::with_capacity(usize::MAX)
  }

  /// An encoder which fails in `done()` when its output exceeds
  /// `capacity` bytes.
  #[inline]
  pub const fn with_capacity(capacity: usize) -> WriterBase<WriterEncoder> {
    WriterBase::new(WriterEncoder {
      precarry: Vec::new(),
      low: 0,
      range: 255,
      cnt: 0,
      capacity,
      overflow: false,
    })
  }
}

impl StorageBackend for WriterBase<WriterCounter> {
  #[inline]
  fn store(&mut self, _val: bool, _prob: u8) {
    self.s.count += 1;
  }
  #[inline]
  fn stream_bytes(&self) -> usize {
    (self.cost >> (COST_BITRES + 3)) as usize
  }
  #[inline]
  fn checkpoint(&mut self) -> WriterCheckpoint {
    WriterCheckpoint {
      cost: self.cost,
      stream_size: self.s.count,
      last_byte: 0,
      low: 0,
      range: 0,
      cnt: 0,
    }
  }
  #[inline]
  fn rollback(&mut self, checkpoint: &WriterCheckpoint) {
    self.cost = checkpoint.cost;
    self.s.count = checkpoint.stream_size;
  }
}

impl StorageBackend for WriterBase<WriterRecorder> {
  #[inline]
  fn store(&mut self, val: bool, prob: u8) {
    self.s.storage.push((val, prob));
  }
  #[inline]
  fn stream_bytes(&self) -> usize {
    (self.cost >> (COST_BITRES + 3)) as usize
  }
  #[inline]
  fn checkpoint(&mut self) -> WriterCheckpoint {
    WriterCheckpoint {
      cost: self.cost,
      stream_size: self.s.storage.len(),
      last_byte: 0,
      low: 0,
      range: 0,
      cnt: 0,
    }
  }
  #[inline]
  fn rollback(&mut self, checkpoint: &WriterCheckpoint) {
    self.cost = checkpoint.cost;
    self.s.storage.truncate(checkpoint.stream_size);
  }
}

impl StorageBackend for WriterBase<WriterEncoder> {
  fn store(&mut self, val: bool, prob: u8) {
    let s = &mut self.s;
    let split = 1 + (((s.range - 1) * prob as u32) >> 8);
    if val {
      s.low += split;
      s.range -= split;
      // The interval moved past the pending bits: propagate into the
      // last emitted byte, resolved in done().
      if s.low >> (8 + s.cnt) != 0 {
        debug_assert!(!s.precarry.is_empty());
        if let Some(last) = s.precarry.last_mut() {
          *last += 1;
        }
        s.low &= (1 << (8 + s.cnt)) - 1;
      }
    } else {
      s.range = split;
    }
    let shift = s.range.leading_zeros() - 24;
    s.range <<= shift;
    s.low <<= shift;
    s.cnt += shift;
    if s.cnt >= 8 {
      s.cnt -= 8;
      let byte = s.low >> (8 + s.cnt);
      s.low &= (1 << (8 + s.cnt)) - 1;
      if s.precarry.len() >= s.capacity {
        s.overflow = true;
      }
      s.precarry.push(byte as u16);
    }
  }
  #[inline]
  fn stream_bytes(&self) -> usize {
    self.s.precarry.len()
  }
  fn checkpoint(&mut self) -> WriterCheckpoint {
    WriterCheckpoint {
      cost: self.cost,
      stream_size: self.s.precarry.len(),
      last_byte: self.s.precarry.last().copied().unwrap_or(0),
      low: self.s.low,
      range: self.s.range,
      cnt: self.s.cnt,
    }
  }
  fn rollback(&mut self, checkpoint: &WriterCheckpoint) {
    self.cost = checkpoint.cost;
    self.s.precarry.truncate(checkpoint.stream_size);
    if let Some(last) = self.s.precarry.last_mut() {
      *last = checkpoint.last_byte;
    }
    self.s.low = checkpoint.low;
    self.s.range = checkpoint.range;
    self.s.cnt = checkpoint.cnt;
    self.s.overflow = self.s.precarry.len() > self.s.capacity;
  }
}

impl<S> WriterBase<S> {
  /// Internal constructor called by the subtypes that implement the
  /// actual encoder and Recorder.
  #[inline]
  const fn new(storage: S) -> Self {
    WriterBase { cost: 0, s: storage }
  }
}

impl WriterBase<WriterCounter> {
  /// Number of bools counted so far.
  pub const fn symbols(&self) -> usize {
    self.s.count
  }
}

impl WriterBase<WriterRecorder> {
  /// Replays the partially-computed range tokens out of the Recorder's
  /// storage and into the passed in Writer, which may be an Encoder
  /// or another Recorder.  Clears the Recorder after replay.
  pub fn replay<W: Writer>(&mut self, dest: &mut W) {
    for &(val, prob) in self.s.storage.iter() {
      dest.bool(val, prob);
    }
    self.cost = 0;
    self.s.storage.truncate(0);
  }

  /// Number of recorded bools.
  pub fn len(&self) -> usize {
    self.s.storage.len()
  }

  pub fn is_empty(&self) -> bool {
    self.s.storage.is_empty()
  }
}

impl WriterBase<WriterEncoder> {
  /// Flushes the coder and returns the coded bytes.
  ///
  /// # Errors
  ///
  /// - `EncoderError::BufferOverflow` if the output exceeds the capacity
  ///   the encoder was created with.
  pub fn done(&mut self) -> Result<Vec<u8>, EncoderError> {
    for _ in 0..FLUSH_BITS {
      self.store(false, PROB_HALF);
    }
    let s = &mut self.s;
    if s.overflow || s.precarry.len() > s.capacity {
      return Err(EncoderError::BufferOverflow { capacity: s.capacity });
    }
    let mut out = vec![0u8; s.precarry.len()];
    let mut c = 0u32;
    for (o, &p) in out.iter_mut().zip(s.precarry.iter()).rev() {
      c += p as u32;
      *o = c as u8;
      c >>= 8;
    }
    debug_assert_eq!(c, 0);
    s.precarry.clear();
    s.low = 0;
    s.range = 255;
    s.cnt = 0;
    self.cost = 0;
    Ok(out)
  }
}

/// Generic/shared implementation for `Writer`s with `StorageBackend`s
/// (ie, `Encoder`s and `Recorder`s)
impl<S> Writer for WriterBase<S>
where
  WriterBase<S>: StorageBackend,
{
  #[inline]
  fn bool(&mut self, val: bool, prob: u8) {
    debug_assert!(prob > 0);
    self.cost += cost_bit(prob, val) as u64;
    self.store(val, prob);
  }
  #[inline]
  fn bit(&mut self, bit: u16) {
    self.bool(bit == 1, PROB_HALF);
  }
  fn literal(&mut self, bits: u8, s: u32) {
    for bit in (0..bits).rev() {
      self.bit((1 & (s >> bit)) as u16);
    }
  }
  fn signed_literal(&mut self, bits: u8, v: i32) {
    self.literal(bits, v.unsigned_abs());
    self.bit((v < 0) as u16);
  }
  #[inline]
  fn write_token(&mut self, tree: &[i8], probs: &[u8], token: TreeToken) {
    self.write_token_from(tree, probs, token, 0);
  }
  fn write_token_from(
    &mut self, tree: &[i8], probs: &[u8], token: TreeToken, skip: u8,
  ) {
    let mut i = 0usize;
    for n in (0..token.len).rev() {
      let b = (token.value >> n) & 1;
      if token.len - 1 - n >= skip {
        self.bool(b != 0, probs[i >> 1]);
      }
      i = tree[i + b as usize] as usize;
    }
  }
  #[inline]
  fn tell_frac(&self) -> u64 {
    self.cost
  }
  fn checkpoint(&mut self) -> WriterCheckpoint {
    StorageBackend::checkpoint(self)
  }
  fn rollback(&mut self, wc: &WriterCheckpoint) {
    StorageBackend::rollback(self, wc)
  }
}

/// Cost in 1/256 bits of coding `val` with probability `prob` of zero.
#[inline]
pub fn cost_bit(prob: u8, val: bool) -> u32 {
  let t = &tables().prob_cost;
  if val {
    t[256 - prob as usize] as u32
  } else {
    t[prob as usize] as u32
  }
}

#[inline]
pub fn cost_zero(prob: u8) -> u32 {
  cost_bit(prob, false)
}

#[inline]
pub fn cost_one(prob: u8) -> u32 {
  cost_bit(prob, true)
}

/// Cost of a literal of `bits` bits at flat probability.
#[inline]
pub const fn cost_literal(bits: u32) -> u32 {
  bits << COST_BITRES
}

/// Cost of the path of `token` through `tree`, without the first `skip`
/// decisions.
pub fn cost_token(
  tree: &[i8], probs: &[u8], token: TreeToken, skip: u8,
) -> u32 {
  let mut cost = 0;
  let mut i = 0usize;
  for n in (0..token.len).rev() {
    let b = (token.value >> n) & 1;
    if token.len - 1 - n >= skip {
      cost += cost_bit(probs[i >> 1], b != 0);
    }
    i = tree[i + b as usize] as usize;
  }
  cost
}

/// Decoder side of the bool coder.
#[derive(Debug, Clone)]
pub struct BoolReader<'a> {
  data: &'a [u8],
  pos: usize,
  value: u32,
  range: u32,
  bit_count: u32,
}

impl<'a> BoolReader<'a> {
  pub fn new(data: &'a [u8]) -> Self {
    let mut r =
      BoolReader { data, pos: 0, value: 0, range: 255, bit_count: 0 };
    r.value = (r.next_byte() << 8) | r.next_byte();
    r
  }

  /// Past the end of the data the stream reads as zeros.
  #[inline]
  fn next_byte(&mut self) -> u32 {
    let b = self.data.get(self.pos).copied().unwrap_or(0);
    self.pos += 1;
    b as u32
  }

  /// True once more bytes were consumed than available, beyond the
  /// two byte lookahead.
  pub fn is_exhausted(&self) -> bool {
    self.pos > self.data.len() + 2
  }

  pub fn read_bool(&mut self, prob: u8) -> bool {
    let split = 1 + (((self.range - 1) * prob as u32) >> 8);
    let big_split = split << 8;
    let ret = if self.value >= big_split {
      self.range -= split;
      self.value -= big_split;
      true
    } else {
      self.range = split;
      false
    };
    while self.range < 128 {
      self.value <<= 1;
      self.range <<= 1;
      self.bit_count += 1;
      if self.bit_count == 8 {
        self.bit_count = 0;
        self.value |= self.next_byte();
      }
    }
    ret
  }

  #[inline]
  pub fn read_bit(&mut self) -> bool {
    self.read_bool(PROB_HALF)
  }

  pub fn read_literal(&mut self, bits: u8) -> u32 {
    (0..bits).fold(0, |v, _| (v << 1) | self.read_bit() as u32)
  }

  pub fn read_signed_literal(&mut self, bits: u8) -> i32 {
    let v = self.read_literal(bits) as i32;
    if self.read_bit() {
      -v
    } else {
      v
    }
  }

  #[inline]
  pub fn read_tree(&mut self, tree: &[i8], probs: &[u8]) -> usize {
    self.read_tree_from(tree, probs, 0)
  }

  /// Walk `tree` starting at node index `start`.
  pub fn read_tree_from(
    &mut self, tree: &[i8], probs: &[u8], start: usize,
  ) -> usize {
    let mut i = start;
    loop {
      let b = self.read_bool(probs[i >> 1]) as usize;
      let next = tree[i + b];
      if next <= 0 {
        return (-next) as usize;
      }
      i = next as usize;
    }
  }
}
