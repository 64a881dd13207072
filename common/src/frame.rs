//! The fixed AC power command, captured bit-for-bit from the original remote.
//!
//! Each repeat is sent MSB first. The last group only contributes its two
//! leading bits; the remote cuts the tenth byte short.

use crate::{
    types::{Bit, Symbol},
    waveform::{emit_bit, CarrierTiming, IrOutput},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitGroup {
    pub pattern: u8,
    pub len: u8,
}

impl BitGroup {
    pub const fn byte(pattern: u8) -> Self {
        Self { pattern, len: 8 }
    }

    /// The first `len` bits of `pattern`.
    pub const fn leading(pattern: u8, len: u8) -> Self {
        Self { pattern, len }
    }

    pub fn bits(self) -> impl Iterator<Item = Bit> {
        (0..self.len.min(8)).map(move |i| Bit::from_level(self.pattern & (0x80 >> i) != 0))
    }
}

pub const REPEAT_BODY: [BitGroup; 10] = [
    BitGroup::byte(0b1110_0001),
    BitGroup::byte(0b1010_0110),
    BitGroup::byte(0b1010_1010),
    BitGroup::byte(0b1010_0110),
    BitGroup::byte(0b1010_1010),
    BitGroup::byte(0b1010_1010),
    BitGroup::byte(0b1010_1010),
    BitGroup::byte(0b1010_1010),
    BitGroup::byte(0b1010_1001),
    BitGroup::leading(0b1000_0000, 2),
];

pub const REPEAT_COUNT: usize = 3;

/// End-of-frame mark.
pub const TRAILER: BitGroup = BitGroup::leading(0b1111_0000, 4);

pub const BITS_PER_REPEAT: usize = repeat_body_len();
pub const FRAME_BITS: usize = BITS_PER_REPEAT * REPEAT_COUNT + TRAILER.len as usize;

const fn repeat_body_len() -> usize {
    let mut total = 0;
    let mut i = 0;
    while i < REPEAT_BODY.len() {
        total += REPEAT_BODY[i].len as usize;
        i += 1;
    }
    total
}

/// The complete frame in transmission order. Identical on every call.
pub fn bits() -> impl Iterator<Item = Bit> {
    (0..REPEAT_COUNT)
        .flat_map(|_| REPEAT_BODY.into_iter().flat_map(BitGroup::bits))
        .chain(TRAILER.bits())
}

pub fn symbols(timing: CarrierTiming) -> impl Iterator<Item = Symbol> {
    let mark_us = timing.mark_duration_us();
    bits().map(move |bit| match bit {
        Bit::One => Symbol::Mark(mark_us),
        Bit::Zero => Symbol::Space(timing.bit_us),
    })
}

pub fn nominal_duration_us(timing: CarrierTiming) -> u64 {
    symbols(timing).map(|s| u64::from(s.duration_us())).sum()
}

/// Sends the whole command. Runs to completion without yielding.
pub fn encode_and_transmit<O: IrOutput + ?Sized>(out: &mut O, timing: &CarrierTiming) {
    for bit in bits() {
        emit_bit(out, timing, bit);
    }
}
