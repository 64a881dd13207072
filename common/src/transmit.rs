use core::convert::TryInto;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, OnceLock,
    },
    time::{Duration, Instant},
};

use log::{debug, info};

use crate::{
    frame::{self, FRAME_BITS},
    gate::TriggerGate,
    waveform::{CarrierTiming, IrOutput},
};

/// Counters shared between the transmit thread and the HTTP side.
#[derive(Debug, Default)]
pub struct TransmitStats {
    signals: AtomicU64,
    coalesced: AtomicU64,
    transmissions: AtomicU64,
    last_transmit_us: AtomicU64,
    last_transmit_ms: AtomicU64,
}

impl TransmitStats {
    pub fn record_signal(&self, accepted: bool) {
        self.signals.fetch_add(1, Ordering::Relaxed);
        if !accepted {
            self.coalesced.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record_transmission(&self, elapsed_us: u64, now_ms: u64) {
        self.last_transmit_us.store(elapsed_us, Ordering::Relaxed);
        self.last_transmit_ms.store(now_ms, Ordering::Relaxed);
        self.transmissions.fetch_add(1, Ordering::Release);
    }

    pub fn signals(&self) -> u64 {
        self.signals.load(Ordering::Relaxed)
    }

    pub fn coalesced(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }

    pub fn transmissions(&self) -> u64 {
        self.transmissions.load(Ordering::Acquire)
    }

    pub fn last_transmit_us(&self) -> Option<u64> {
        (self.transmissions() > 0).then(|| self.last_transmit_us.load(Ordering::Relaxed))
    }

    pub fn last_transmit_ms(&self) -> Option<u64> {
        (self.transmissions() > 0).then(|| self.last_transmit_ms.load(Ordering::Relaxed))
    }
}

/// Owns the IR output and sends the command frame each time the gate fires.
pub struct TransmitTask<O> {
    output: O,
    gate: TriggerGate,
    timing: CarrierTiming,
    stats: Arc<TransmitStats>,
}

impl<O: IrOutput> TransmitTask<O> {
    pub fn new(
        output: O,
        gate: TriggerGate,
        timing: CarrierTiming,
        stats: Arc<TransmitStats>,
    ) -> Self {
        Self {
            output,
            gate,
            timing,
            stats,
        }
    }

    pub fn run(mut self) -> ! {
        info!(
            "IR transmit task waiting for triggers ({} bits/frame, {} Hz carrier)",
            FRAME_BITS,
            self.timing.carrier_hz()
        );
        loop {
            self.run_once();
        }
    }

    /// Blocks until triggered, then sends one frame.
    pub fn run_once(&mut self) {
        self.gate.wait();
        self.transmit();
    }

    /// Sends one frame if the gate fires within `timeout`.
    pub fn poll(&mut self, timeout: Duration) -> bool {
        if !self.gate.wait_timeout(timeout) {
            return false;
        }
        self.transmit();
        true
    }

    pub fn transmit(&mut self) {
        debug!("IR frame start");
        let started = Instant::now();
        frame::encode_and_transmit(&mut self.output, &self.timing);
        let elapsed_us: u64 = started.elapsed().as_micros().try_into().unwrap_or(u64::MAX);

        self.stats.record_transmission(elapsed_us, monotonic_ms());
        info!(
            "IR frame sent in {elapsed_us} us (#{})",
            self.stats.transmissions()
        );
    }

    pub fn output(&self) -> &O {
        &self.output
    }
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::mock::RecordingOutput;

    fn task(gate: &TriggerGate) -> (TransmitTask<RecordingOutput>, Arc<TransmitStats>) {
        let stats = Arc::new(TransmitStats::default());
        let task = TransmitTask::new(
            RecordingOutput::default(),
            gate.clone(),
            CarrierTiming::default(),
            stats.clone(),
        );
        (task, stats)
    }

    #[test]
    fn idle_without_signal() {
        let gate = TriggerGate::new();
        let (mut task, stats) = task(&gate);

        assert!(!task.poll(Duration::from_millis(10)));
        assert_eq!(stats.transmissions(), 0);
        assert!(task.output().events.is_empty());
        assert_eq!(stats.last_transmit_us(), None);
    }

    #[test]
    fn one_signal_sends_one_full_frame() {
        let gate = TriggerGate::new();
        let (mut task, stats) = task(&gate);
        let timing = CarrierTiming::default();

        gate.signal();
        task.run_once();

        assert_eq!(stats.transmissions(), 1);
        assert!(stats.last_transmit_us().is_some());
        assert!(!gate.is_signaled());

        let decoded = task
            .output()
            .decode_bits(timing.cycles_per_mark() as usize);
        assert_eq!(decoded.len(), FRAME_BITS);
    }

    #[test]
    fn signals_before_drain_collapse_into_one_transmission() {
        let gate = TriggerGate::new();
        let (mut task, stats) = task(&gate);

        stats.record_signal(gate.signal());
        stats.record_signal(gate.signal());

        assert!(task.poll(Duration::from_millis(10)));
        assert!(!task.poll(Duration::from_millis(10)));
        assert_eq!(stats.transmissions(), 1);
        assert_eq!(stats.signals(), 2);
        assert_eq!(stats.coalesced(), 1);
    }

    #[test]
    fn burst_of_signals_yields_between_one_and_n_transmissions() {
        const SIGNALS: u64 = 20;
        let gate = TriggerGate::new();
        let (mut task, stats) = task(&gate);

        let consumer = thread::spawn(move || {
            while task.poll(Duration::from_millis(200)) {}
        });

        for _ in 0..SIGNALS {
            stats.record_signal(gate.signal());
        }
        consumer.join().unwrap();

        let sent = stats.transmissions();
        assert!(sent >= 1, "no transmission for {SIGNALS} signals");
        assert!(sent <= SIGNALS, "{sent} transmissions for {SIGNALS} signals");
        assert_eq!(sent + stats.coalesced(), SIGNALS);
    }
}
