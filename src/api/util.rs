// Copyright (c) 2018-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.
#![deny(missing_docs)]

use crate::api::InvalidConfig;
use crate::frame::Frame;
use crate::serialize::{Deserialize, Serialize};
use crate::stats::EncoderStats;

use std::{fmt, io};

use thiserror::*;

/// Possible types of a frame.
#[allow(non_camel_case_types)]
#[derive(Debug, Eq, PartialEq, Clone, Copy, Serialize, Deserialize)]
#[repr(C)]
pub enum FrameType {
  /// Key frame.
  KEY,
  /// Inter-frame.
  INTER,
}

impl FrameType {
  /// Returns whether frame can have inter blocks
  #[inline]
  pub fn has_inter(self) -> bool {
    self == FrameType::INTER
  }
}

impl Default for FrameType {
  fn default() -> Self {
    FrameType::KEY
  }
}

impl fmt::Display for FrameType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    use self::FrameType::*;
    match self {
      KEY => write!(f, "Key frame"),
      INTER => write!(f, "Inter frame"),
    }
  }
}

/// Errors returned while packing a frame.
///
/// No bytes are produced when a frame fails.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum EncoderError {
  /// The packed frame does not fit the byte capacity.
  #[error("output exceeds the capacity of {capacity} bytes")]
  BufferOverflow {
    /// The capacity of the buffer.
    capacity: usize,
  },
  /// The frame decisions or parameters cannot be coded.
  #[error("invalid configuration: {0}")]
  InvalidConfiguration(String),
  /// The encoder or frame configuration failed validation.
  #[error(transparent)]
  Config(#[from] InvalidConfig),
}

/// Errors returned by the verification decoder.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum DecoderError {
  /// The data ended inside a header.
  #[error("truncated data")]
  Truncated,
  /// The frame marker or sync code does not match.
  #[error("bad frame marker")]
  BadMarker,
  /// A tile size prefix points past the end of the data.
  #[error("tile size {size} exceeds the {available} remaining bytes")]
  BadTileSize {
    /// The size read from the prefix.
    size: usize,
    /// The bytes left in the frame.
    available: usize,
  },
  /// A decoded value is out of range.
  #[error("invalid symbol: {0}")]
  InvalidSymbol(&'static str),
  /// The prediction does not cover the frame.
  #[error("prediction does not match the frame size")]
  PredictionMismatch,
  /// An inter frame arrived before any key frame.
  #[error("inter frame without a preceding key frame")]
  MissingKeyFrame,
}

impl From<io::Error> for DecoderError {
  fn from(_: io::Error) -> Self {
    DecoderError::Truncated
  }
}

/// One packed frame.
#[derive(Debug, Clone)]
pub struct Packet {
  /// The packet data: uncompressed header, compressed header and tiles.
  pub data: Vec<u8>,
  /// Type of the frame.
  pub frame_type: FrameType,
  /// Base quantizer index of the frame.
  pub qp: u8,
  /// The reconstruction a decoder produces from `data`.
  pub rec: Frame,
  /// Block-level encoding stats for the frame
  pub enc_stats: EncoderStats,
}

impl PartialEq for Packet {
  fn eq(&self, other: &Self) -> bool {
    self.data == other.data
      && self.frame_type == other.frame_type
      && self.qp == other.qp
  }
}

impl fmt::Display for Packet {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{} - q {} - {} bytes",
      self.frame_type,
      self.qp,
      self.data.len()
    )
  }
}
