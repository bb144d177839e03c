// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Requantization and scale factor tables for layer 1.
//!
//! ISO/IEC 11172-3 requantizes the nb-bit raw sample `s` of a sub-band with allocation `a`
//! (nb = a + 1), read as an unsigned integer, as `(2^nb / (2^nb - 1)) * ((s + 1) / 2^a - 1)`.
//! Splitting the expression yields a multiply-add, `s * FACTOR[a] + OFFSET[a]`. The entries are
//! written as the rational expressions they are defined by so that the compiler folds them to the
//! same single precision values used by the reference decoders.

/// Requantization factors indexed by allocation. Index 0 is unused since allocation 0 is silence.
#[rustfmt::skip]
pub const FACTOR: [f32; 15] = [
    0.0,
    (1.0 / 2.0) * (4.0 / 3.0),
    (1.0 / 4.0) * (8.0 / 7.0),
    (1.0 / 8.0) * (16.0 / 15.0),
    (1.0 / 16.0) * (32.0 / 31.0),
    (1.0 / 32.0) * (64.0 / 63.0),
    (1.0 / 64.0) * (128.0 / 127.0),
    (1.0 / 128.0) * (256.0 / 255.0),
    (1.0 / 256.0) * (512.0 / 511.0),
    (1.0 / 512.0) * (1024.0 / 1023.0),
    (1.0 / 1024.0) * (2048.0 / 2047.0),
    (1.0 / 2048.0) * (4096.0 / 4095.0),
    (1.0 / 4096.0) * (8192.0 / 8191.0),
    (1.0 / 8192.0) * (16384.0 / 16383.0),
    (1.0 / 16384.0) * (32768.0 / 32767.0),
];

/// Requantization offsets indexed by allocation. Index 0 is unused since allocation 0 is silence.
#[rustfmt::skip]
pub const OFFSET: [f32; 15] = [
    0.0,
    ((1.0 / 2.0) - 1.0) * (4.0 / 3.0),
    ((1.0 / 4.0) - 1.0) * (8.0 / 7.0),
    ((1.0 / 8.0) - 1.0) * (16.0 / 15.0),
    ((1.0 / 16.0) - 1.0) * (32.0 / 31.0),
    ((1.0 / 32.0) - 1.0) * (64.0 / 63.0),
    ((1.0 / 64.0) - 1.0) * (128.0 / 127.0),
    ((1.0 / 128.0) - 1.0) * (256.0 / 255.0),
    ((1.0 / 256.0) - 1.0) * (512.0 / 511.0),
    ((1.0 / 512.0) - 1.0) * (1024.0 / 1023.0),
    ((1.0 / 1024.0) - 1.0) * (2048.0 / 2047.0),
    ((1.0 / 2048.0) - 1.0) * (4096.0 / 4095.0),
    ((1.0 / 4096.0) - 1.0) * (8192.0 / 8191.0),
    ((1.0 / 8192.0) - 1.0) * (16384.0 / 16383.0),
    ((1.0 / 16384.0) - 1.0) * (32768.0 / 32767.0),
];

/// The index of the reserved scale factor. It is illegal, but maps to silence.
pub const SCALEFACTOR_RESERVED: usize = 63;

/// Scale factors for layers 1 and 2, ISO/IEC 11172-3 Annex 3-B.1.
///
/// Index 63 is illegal. The table is extended to 64 entries so that a corrupt stream maps to
/// silence instead of indexing out-of-bounds.
#[rustfmt::skip]
pub const SCALEFACTORS: [f32; 64] = [
    2.00000000000000, 1.58740105196820, 1.25992104989487, 1.00000000000000,
    0.79370052598410, 0.62996052494744, 0.50000000000000, 0.39685026299205,
    0.31498026247372, 0.25000000000000, 0.19842513149602, 0.15749013123686,
    0.12500000000000, 0.09921256574801, 0.07874506561843, 0.06250000000000,
    0.04960628287401, 0.03937253280921, 0.03125000000000, 0.02480314143700,
    0.01968626640461, 0.01562500000000, 0.01240157071850, 0.00984313320230,
    0.00781250000000, 0.00620078535925, 0.00492156660115, 0.00390625000000,
    0.00310039267963, 0.00246078330058, 0.00195312500000, 0.00155019633981,
    0.00123039165029, 0.00097656250000, 0.00077509816991, 0.00061519582514,
    0.00048828125000, 0.00038754908495, 0.00030759791257, 0.00024414062500,
    0.00019377454248, 0.00015379895629, 0.00012207031250, 0.00009688727124,
    0.00007689947814, 0.00006103515625, 0.00004844363562, 0.00003844973907,
    0.00003051757813, 0.00002422181781, 0.00001922486954, 0.00001525878906,
    0.00001211090890, 0.00000961243477, 0.00000762939453, 0.00000605545445,
    0.00000480621738, 0.00000381469727, 0.00000302772723, 0.00000240310869,
    0.00000190734863, 0.00000151386361, 0.00000120155435, 0.00000000000000,
];

/// Gets the requantization factor and offset for an allocation. The illegal allocation 15 has no
/// table entry and requantizes to silence.
#[inline(always)]
pub fn requantization(allocation: u32) -> (f32, f32) {
    match (FACTOR.get(allocation as usize), OFFSET.get(allocation as usize)) {
        (Some(&factor), Some(&offset)) => (factor, offset),
        _ => (0.0, 0.0),
    }
}
