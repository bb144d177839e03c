// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `checksum` module implements the CRC-16 used to protect MPEG audio frames.

/// The CRC-16 generator polynomial used by MPEG audio (x^16 + x^15 + x^2 + 1).
const CRC16_POLYNOMIAL: u16 = 0x8005;

/// `Crc16` is a bit-granular CRC-16 accumulator as defined in ISO/IEC 11172-3 section 2.4.3.1.
///
/// Unlike a byte-oriented CRC, the fields protected by the MPEG audio CRC are not byte aligned, so
/// values are folded in one field at a time, most-significant bit first.
#[derive(Clone, Debug)]
pub struct Crc16 {
    crc: u16,
}

impl Crc16 {
    /// Instantiates a new `Crc16` with the initial value mandated by the standard.
    pub fn new() -> Self {
        Crc16 { crc: 0xffff }
    }

    /// Resets the accumulator to the initial value.
    pub fn reset(&mut self) {
        self.crc = 0xffff;
    }

    /// Folds the `width` least-significant bits of `value` into the checksum, most-significant
    /// bit first.
    pub fn add_bits(&mut self, value: u32, width: u32) {
        debug_assert!(width <= 32);

        for i in (0..width).rev() {
            let bit = (value >> i) & 1 != 0;
            let carry = self.crc & 0x8000 != 0;

            self.crc <<= 1;

            if bit ^ carry {
                self.crc ^= CRC16_POLYNOMIAL;
            }
        }
    }

    /// Gets the current checksum.
    pub fn checksum(&self) -> u16 {
        self.crc
    }
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new()
    }
}
