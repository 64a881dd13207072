//! Carrier pulse and bit timing for the IR LED.
//!
//! Everything in here busy-waits. Callers must run it on a context that is
//! not preempted mid-frame; a few microseconds of jitter per edge already
//! shifts the carrier frequency noticeably.

use crate::types::Bit;

pub const DEFAULT_HALF_CYCLE_US: u32 = 10;
/// Measured cost of a single GPIO level change on the target.
pub const DEFAULT_EDGE_OVERHEAD_US: u32 = 3;
pub const DEFAULT_BIT_US: u32 = 950;

/// Pin and delay primitives the waveform is generated from.
///
/// Pin writes cannot report failure: a failed write is dropped, since any
/// error handling inside the pulse loop would distort the timing more than
/// the missing edge does.
pub trait IrOutput {
    fn set_high(&mut self);
    fn set_low(&mut self);
    fn delay_us(&mut self, us: u32);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarrierTiming {
    pub high_us: u32,
    pub low_us: u32,
    pub edge_overhead_us: u32,
    pub bit_us: u32,
}

impl Default for CarrierTiming {
    fn default() -> Self {
        Self {
            high_us: DEFAULT_HALF_CYCLE_US,
            low_us: DEFAULT_HALF_CYCLE_US,
            edge_overhead_us: DEFAULT_EDGE_OVERHEAD_US,
            bit_us: DEFAULT_BIT_US,
        }
    }
}

impl CarrierTiming {
    /// Time one carrier cycle is accounted for, including both edges.
    /// Never zero, so the mark countdown always terminates.
    pub fn cycle_cost_us(&self) -> u32 {
        self.high_us
            .saturating_add(self.low_us)
            .saturating_add(self.edge_overhead_us.saturating_mul(2))
            .max(1)
    }

    pub fn carrier_hz(&self) -> u32 {
        1_000_000 / self.cycle_cost_us()
    }

    pub fn cycles_per_mark(&self) -> u32 {
        carrier_cycles_for(self.bit_us, self.cycle_cost_us())
    }

    /// Accounted on-air time of a mark. Overshoots `bit_us` by less than one cycle.
    pub fn mark_duration_us(&self) -> u32 {
        self.cycles_per_mark().saturating_mul(self.cycle_cost_us())
    }
}

/// Number of carrier cycles the countdown in [`emit_bit`] produces for a budget.
pub fn carrier_cycles_for(budget_us: u32, cycle_cost_us: u32) -> u32 {
    if cycle_cost_us == 0 {
        return 0;
    }
    budget_us.div_ceil(cycle_cost_us)
}

pub fn emit_carrier_cycle<O: IrOutput + ?Sized>(out: &mut O, timing: &CarrierTiming) {
    out.set_high();
    out.delay_us(timing.high_us);
    out.set_low();
    out.delay_us(timing.low_us);
}

pub fn emit_bit<O: IrOutput + ?Sized>(out: &mut O, timing: &CarrierTiming, bit: Bit) {
    match bit {
        Bit::One => {
            let cost = i64::from(timing.cycle_cost_us());
            let mut remaining = i64::from(timing.bit_us);
            while remaining > 0 {
                emit_carrier_cycle(out, timing);
                remaining -= cost;
            }
        }
        Bit::Zero => out.delay_us(timing.bit_us),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Event, RecordingOutput};

    #[test]
    fn carrier_cycle_is_high_then_low() {
        let mut out = RecordingOutput::default();
        emit_carrier_cycle(&mut out, &CarrierTiming::default());

        assert_eq!(
            out.events,
            vec![
                Event::High,
                Event::Delay(10),
                Event::Low,
                Event::Delay(10)
            ]
        );
    }

    #[test]
    fn default_timing_is_close_to_38khz() {
        let timing = CarrierTiming::default();
        assert_eq!(timing.cycle_cost_us(), 26);
        assert_eq!(timing.carrier_hz(), 38_461);
    }

    #[test]
    fn mark_stays_within_one_cycle_of_bit_duration() {
        let timing = CarrierTiming::default();
        let mut out = RecordingOutput::default();
        emit_bit(&mut out, &timing, Bit::One);

        assert_eq!(out.rising_edges(), 37);
        assert_eq!(out.rising_edges(), timing.cycles_per_mark() as usize);

        let active = out.accounted_us(timing.edge_overhead_us);
        assert!(active >= u64::from(timing.bit_us));
        assert!(active < u64::from(timing.bit_us + timing.cycle_cost_us()));
        assert_eq!(active, u64::from(timing.mark_duration_us()));
        assert_eq!(out.last_level(), Some(false));
    }

    #[test]
    fn space_is_a_single_idle_wait() {
        let timing = CarrierTiming::default();
        let mut out = RecordingOutput::default();
        emit_bit(&mut out, &timing, Bit::Zero);

        assert_eq!(out.events, vec![Event::Delay(950)]);
    }

    #[test]
    fn countdown_terminates_for_degenerate_timing() {
        let timing = CarrierTiming {
            high_us: 0,
            low_us: 0,
            edge_overhead_us: 0,
            bit_us: 4,
        };
        let mut out = RecordingOutput::default();
        emit_bit(&mut out, &timing, Bit::One);

        assert_eq!(out.rising_edges(), 4);
    }

    #[test]
    fn cycle_count_rounds_up() {
        assert_eq!(carrier_cycles_for(950, 26), 37);
        assert_eq!(carrier_cycles_for(52, 26), 2);
        assert_eq!(carrier_cycles_for(0, 26), 0);
        assert_eq!(carrier_cycles_for(10, 0), 0);
    }
}
