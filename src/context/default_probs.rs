// Copyright (c) 2017-2022, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Probabilities every frame context starts from.

use super::*;
use crate::token::CoefProbs;

/// Coefficient probabilities shared by every transform size, indexed
/// `[block type][band][context][node]`.
static DEFAULT_COEF_PROBS: CoefProbs = [
  // Y after Y2
  [
    [[128, 128, 128, 128, 128, 128, 128, 128, 128, 128, 128],
     [128, 128, 128, 128, 128, 128, 128, 128, 128, 128, 128],
     [128, 128, 128, 128, 128, 128, 128, 128, 128, 128, 128]],
    [[253, 136, 254, 255, 228, 219, 128, 128, 128, 128, 128],
     [189, 129, 242, 255, 227, 213, 255, 219, 128, 128, 128],
     [106, 126, 227, 252, 214, 209, 255, 255, 128, 128, 128]],
    [[1, 98, 248, 255, 236, 226, 255, 255, 128, 128, 128],
     [181, 133, 238, 254, 221, 234, 255, 154, 128, 128, 128],
     [78, 134, 202, 247, 198, 180, 255, 219, 128, 128, 128]],
    [[1, 185, 249, 255, 243, 255, 128, 128, 128, 128, 128],
     [184, 150, 247, 255, 236, 224, 128, 128, 128, 128, 128],
     [77, 110, 216, 255, 236, 230, 128, 128, 128, 128, 128]],
    [[1, 101, 251, 255, 241, 255, 128, 128, 128, 128, 128],
     [170, 139, 241, 252, 236, 209, 255, 255, 128, 128, 128],
     [37, 116, 196, 243, 228, 255, 255, 255, 128, 128, 128]],
    [[1, 204, 254, 255, 245, 255, 128, 128, 128, 128, 128],
     [207, 160, 250, 255, 238, 128, 128, 128, 128, 128, 128],
     [102, 103, 231, 255, 211, 171, 128, 128, 128, 128, 128]],
    [[1, 152, 252, 255, 240, 255, 128, 128, 128, 128, 128],
     [177, 135, 243, 255, 234, 225, 128, 128, 128, 128, 128],
     [80, 129, 211, 255, 194, 224, 128, 128, 128, 128, 128]],
    [[1, 1, 255, 128, 128, 128, 128, 128, 128, 128, 128],
     [246, 1, 255, 128, 128, 128, 128, 128, 128, 128, 128],
     [255, 128, 128, 128, 128, 128, 128, 128, 128, 128, 128]],
  ],
  // Y2
  [
    [[128, 128, 128, 128, 128, 128, 128, 128, 128, 128, 128],
     [128, 128, 128, 128, 128, 128, 128, 128, 128, 128, 128],
     [128, 128, 128, 128, 128, 128, 128, 128, 128, 128, 128]],
    [[198, 35, 237, 223, 193, 187, 162, 160, 145, 155, 62],
     [131, 45, 198, 221, 172, 176, 220, 157, 252, 128, 128],
     [68, 47, 146, 208, 149, 167, 221, 162, 255, 128, 128]],
    [[1, 149, 241, 255, 221, 224, 255, 255, 128, 128, 128],
     [184, 141, 234, 253, 222, 220, 255, 199, 128, 128, 128],
     [81, 99, 181, 242, 176, 190, 249, 202, 255, 128, 128]],
    [[1, 129, 232, 253, 214, 197, 242, 196, 255, 128, 128],
     [99, 121, 210, 250, 201, 198, 255, 202, 128, 128, 128],
     [23, 91, 163, 242, 170, 187, 247, 210, 255, 128, 128]],
    [[1, 200, 246, 255, 234, 255, 128, 128, 128, 128, 128],
     [109, 178, 241, 255, 231, 245, 255, 255, 128, 128, 128],
     [44, 130, 201, 253, 205, 192, 255, 255, 128, 128, 128]],
    [[1, 132, 239, 251, 219, 209, 255, 165, 128, 128, 128],
     [94, 136, 225, 251, 218, 190, 255, 255, 128, 128, 128],
     [22, 100, 174, 245, 186, 161, 255, 199, 128, 128, 128]],
    [[1, 182, 249, 255, 232, 235, 128, 128, 128, 128, 128],
     [124, 143, 241, 255, 227, 234, 128, 128, 128, 128, 128],
     [35, 77, 181, 251, 193, 211, 255, 205, 128, 128, 128]],
    [[1, 157, 247, 255, 236, 231, 255, 255, 128, 128, 128],
     [121, 141, 235, 255, 225, 227, 255, 255, 128, 128, 128],
     [45, 99, 188, 251, 195, 217, 255, 224, 128, 128, 128]],
  ],
  // UV
  [
    [[128, 128, 128, 128, 128, 128, 128, 128, 128, 128, 128],
     [128, 128, 128, 128, 128, 128, 128, 128, 128, 128, 128],
     [128, 128, 128, 128, 128, 128, 128, 128, 128, 128, 128]],
    [[202, 24, 213, 235, 186, 191, 220, 160, 240, 175, 255],
     [126, 38, 182, 232, 169, 184, 228, 174, 255, 187, 128],
     [61, 46, 138, 219, 151, 178, 240, 170, 255, 216, 128]],
    [[1, 112, 230, 250, 199, 191, 247, 159, 255, 255, 128],
     [166, 109, 228, 252, 211, 215, 255, 174, 128, 128, 128],
     [39, 77, 162, 232, 172, 180, 245, 178, 255, 255, 128]],
    [[1, 52, 220, 246, 198, 199, 249, 220, 255, 255, 128],
     [124, 74, 191, 243, 183, 193, 250, 221, 255, 255, 128],
     [24, 71, 130, 219, 154, 170, 243, 182, 255, 255, 128]],
    [[1, 182, 225, 249, 219, 240, 255, 224, 128, 128, 128],
     [149, 150, 226, 252, 216, 205, 255, 171, 128, 128, 128],
     [28, 108, 170, 242, 183, 194, 254, 223, 255, 255, 128]],
    [[1, 81, 230, 252, 204, 203, 255, 192, 128, 128, 128],
     [123, 102, 209, 247, 188, 196, 255, 233, 128, 128, 128],
     [20, 95, 153, 243, 164, 173, 255, 203, 128, 128, 128]],
    [[1, 222, 248, 255, 216, 213, 128, 128, 128, 128, 128],
     [168, 175, 246, 252, 235, 205, 255, 255, 128, 128, 128],
     [47, 116, 215, 255, 211, 212, 255, 255, 128, 128, 128]],
    [[1, 121, 236, 253, 212, 214, 255, 255, 128, 128, 128],
     [141, 84, 213, 252, 201, 202, 255, 219, 128, 128, 128],
     [42, 80, 160, 240, 162, 185, 255, 205, 128, 128, 128]],
  ],
  // Y with DC
  [
    [[128, 128, 128, 128, 128, 128, 128, 128, 128, 128, 128],
     [128, 128, 128, 128, 128, 128, 128, 128, 128, 128, 128],
     [128, 128, 128, 128, 128, 128, 128, 128, 128, 128, 128]],
    [[202, 40, 227, 251, 213, 181, 255, 171, 128, 128, 128],
     [152, 69, 192, 238, 185, 176, 255, 255, 128, 128, 128],
     [83, 40, 139, 224, 155, 152, 255, 255, 128, 128, 128]],
    [[1, 107, 238, 254, 213, 175, 255, 255, 128, 128, 128],
     [147, 108, 227, 254, 210, 194, 255, 255, 128, 128, 128],
     [28, 87, 164, 243, 170, 159, 255, 255, 128, 128, 128]],
    [[1, 49, 214, 252, 214, 243, 255, 191, 128, 128, 128],
     [142, 57, 193, 249, 191, 221, 255, 205, 128, 128, 128],
     [31, 59, 142, 236, 180, 211, 255, 255, 128, 128, 128]],
    [[1, 200, 252, 255, 241, 241, 128, 128, 128, 128, 128],
     [175, 163, 249, 255, 242, 243, 128, 128, 128, 128, 128],
     [39, 160, 219, 255, 221, 213, 128, 128, 128, 128, 128]],
    [[1, 107, 236, 254, 217, 211, 255, 255, 128, 128, 128],
     [134, 95, 210, 252, 195, 201, 255, 255, 128, 128, 128],
     [18, 73, 147, 236, 167, 191, 255, 224, 128, 128, 128]],
    [[1, 216, 255, 255, 250, 243, 128, 128, 128, 128, 128],
     [200, 163, 253, 255, 248, 232, 128, 128, 128, 128, 128],
     [85, 126, 241, 255, 238, 234, 128, 128, 128, 128, 128]],
    [[1, 148, 246, 255, 231, 218, 128, 128, 128, 128, 128],
     [143, 102, 231, 255, 221, 214, 255, 255, 128, 128, 128],
     [39, 103, 188, 255, 200, 199, 255, 255, 128, 128, 128]],
  ],
];

pub fn default_coef_probs() -> CoefProbs {
  DEFAULT_COEF_PROBS
}

pub static DEFAULT_MV_PROBS: [[u8; MV_PROBS]; 2] = [
  [
    162, 128, 225, 146, 172, 147, 214, 39, 156, 128, 129, 132, 75, 145, 178,
    206, 239, 254, 254,
  ],
  [
    164, 128, 204, 170, 119, 235, 140, 230, 228, 128, 130, 130, 74, 148, 180,
    203, 236, 254, 254,
  ],
];

/// Meta probabilities of the literal coded motion vector probability
/// updates.
pub static MV_UPDATE_PROBS: [[u8; MV_PROBS]; 2] = [
  [
    237, 246, 253, 253, 254, 254, 254, 254, 254, 254, 254, 254, 254, 254, 250,
    250, 252, 254, 254,
  ],
  [
    231, 243, 245, 253, 254, 254, 254, 254, 254, 254, 254, 254, 254, 254, 251,
    251, 254, 254, 254,
  ],
];

pub static DEFAULT_Y_MODE_PROBS: [[u8; INTRA_MODES - 1]; BLOCK_SIZE_GROUPS] = [
  [65, 32, 18, 144, 162, 194, 41, 51, 98],
  [132, 68, 18, 165, 217, 196, 45, 40, 78],
  [173, 80, 19, 176, 240, 193, 64, 35, 46],
  [221, 135, 38, 194, 248, 121, 96, 85, 29],
];

pub static DEFAULT_UV_MODE_PROBS: [[u8; INTRA_MODES - 1]; INTRA_MODES] = [
  [120, 7, 76, 176, 208, 126, 28, 54, 103],
  [48, 12, 154, 155, 139, 90, 34, 117, 119],
  [67, 6, 25, 204, 243, 158, 13, 21, 96],
  [97, 5, 44, 131, 176, 139, 48, 68, 97],
  [83, 5, 42, 156, 111, 152, 26, 49, 152],
  [80, 5, 58, 178, 74, 83, 33, 62, 145],
  [86, 5, 32, 154, 192, 168, 14, 22, 163],
  [85, 5, 32, 156, 216, 148, 19, 29, 73],
  [77, 7, 64, 116, 132, 122, 37, 126, 120],
  [101, 21, 107, 181, 192, 103, 19, 67, 125],
];

/// The last four nodes only exist in the extended partition tree.
pub static DEFAULT_PARTITION_PROBS: [[u8; EXT_PARTITION_TYPES - 1];
  PARTITION_CONTEXTS] = [
  // 16x16 -> 8x8
  [174, 73, 87, 200, 128, 128, 128],
  [92, 41, 83, 200, 128, 128, 128],
  [82, 99, 50, 200, 128, 128, 128],
  [53, 39, 39, 200, 128, 128, 128],
  // 32x32 -> 16x16
  [177, 58, 59, 200, 128, 128, 128],
  [68, 26, 63, 200, 128, 128, 128],
  [52, 79, 25, 200, 128, 128, 128],
  [17, 14, 12, 200, 128, 128, 128],
  // 64x64 -> 32x32
  [222, 34, 30, 200, 128, 128, 128],
  [72, 16, 44, 200, 128, 128, 128],
  [58, 32, 12, 200, 128, 128, 128],
  [10, 7, 6, 200, 128, 128, 128],
];

pub static DEFAULT_SKIP_PROBS: [u8; SKIP_CONTEXTS] = [192, 128, 64];

pub static DEFAULT_INTRA_INTER_PROBS: [u8; INTRA_INTER_CONTEXTS] =
  [9, 102, 187, 225];

pub static DEFAULT_REF_PROBS: [[u8; REF_FRAMES - 2]; REF_CONTEXTS] =
  [[33, 16], [142, 142], [238, 247]];

pub static DEFAULT_INTER_MODE_PROBS: [[u8; INTER_MODES - 1];
  INTER_MODE_CONTEXTS] = [
  [2, 173, 34],
  [7, 145, 85],
  [7, 166, 63],
  [7, 94, 66],
  [8, 64, 46],
  [17, 81, 31],
  [25, 29, 30],
];

pub static DEFAULT_TX_PROBS: TxProbs = TxProbs {
  p8x8: [[100], [66]],
  p16x16: [[20, 152], [15, 101]],
  p32x32: [[3, 136, 37], [5, 52, 13]],
};
