use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use log::{debug, info};

use crate::{
    frame::{self, FRAME_BITS},
    gate::TriggerGate,
    transmit::{TransmitStats, TransmitTask},
    types::{AcState, IrDiagnostics},
    waveform::{CarrierTiming, IrOutput},
};

/// Last AC state reported to the web client. Display only; the transmitted
/// frame is the same for on and off.
#[derive(Debug, Clone, Default)]
pub struct ToggleState(Arc<AtomicBool>);

impl ToggleState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> AcState {
        AcState::from_on(self.0.load(Ordering::Acquire))
    }

    /// Flips the state and returns the new value.
    pub fn flip(&self) -> AcState {
        let previous = self.0.fetch_xor(true, Ordering::AcqRel);
        AcState::from_on(!previous)
    }
}

/// Handles shared by the request handlers and the transmit task. Built once
/// at boot; clones refer to the same gate, state and counters.
#[derive(Debug, Clone)]
pub struct RemoteControl {
    gate: TriggerGate,
    toggle: ToggleState,
    stats: Arc<TransmitStats>,
    timing: CarrierTiming,
}

impl RemoteControl {
    pub fn new(timing: CarrierTiming) -> Self {
        Self {
            gate: TriggerGate::new(),
            toggle: ToggleState::new(),
            stats: Arc::new(TransmitStats::default()),
            timing,
        }
    }

    /// Builds the consumer side. The returned task is the only writer of
    /// `output`.
    pub fn transmit_task<O: IrOutput>(&self, output: O) -> TransmitTask<O> {
        TransmitTask::new(output, self.gate.clone(), self.timing, self.stats.clone())
    }

    /// Queues a transmission and flips the displayed state. Does not wait for
    /// the frame to go out.
    pub fn on_toggle(&self) -> AcState {
        let accepted = self.gate.signal();
        self.stats.record_signal(accepted);
        let state = self.toggle.flip();

        if accepted {
            info!("toggle requested, AC is now {}", state.as_str());
        } else {
            debug!(
                "toggle coalesced into pending transmission, AC is now {}",
                state.as_str()
            );
        }
        state
    }

    pub fn ac_state(&self) -> AcState {
        self.toggle.current()
    }

    pub fn stats(&self) -> &TransmitStats {
        &self.stats
    }

    pub fn timing(&self) -> CarrierTiming {
        self.timing
    }

    pub fn diagnostics(&self) -> IrDiagnostics {
        IrDiagnostics {
            ac_state: self.ac_state(),
            carrier_hz: self.timing.carrier_hz(),
            half_cycle_us: self.timing.high_us,
            cycle_cost_us: self.timing.cycle_cost_us(),
            bit_us: self.timing.bit_us,
            cycles_per_mark: self.timing.cycles_per_mark(),
            frame_bits: FRAME_BITS,
            frame_duration_us: frame::nominal_duration_us(self.timing),
            pending: self.gate.is_signaled(),
            signals: self.stats.signals(),
            coalesced: self.stats.coalesced(),
            transmissions: self.stats.transmissions(),
            last_transmit_us: self.stats.last_transmit_us(),
            last_transmit_ms: self.stats.last_transmit_ms(),
        }
    }
}
