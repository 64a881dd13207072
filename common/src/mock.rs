use crate::waveform::IrOutput;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    High,
    Low,
    Delay(u32),
}

/// Records every pin write and delay instead of touching hardware.
#[derive(Debug, Default)]
pub struct RecordingOutput {
    pub events: Vec<Event>,
}

impl RecordingOutput {
    pub fn rising_edges(&self) -> usize {
        self.events.iter().filter(|e| **e == Event::High).count()
    }

    pub fn last_level(&self) -> Option<bool> {
        self.events.iter().rev().find_map(|e| match e {
            Event::High => Some(true),
            Event::Low => Some(false),
            Event::Delay(_) => None,
        })
    }

    /// Total delay plus the nominal cost of every pin write.
    pub fn accounted_us(&self, edge_overhead_us: u32) -> u64 {
        self.events
            .iter()
            .map(|e| match e {
                Event::High | Event::Low => u64::from(edge_overhead_us),
                Event::Delay(us) => u64::from(*us),
            })
            .sum()
    }

    /// Collapses the recording back into mark/space bits. A run of carrier
    /// cycles is `cycles_per_mark` cycles per `1`; a delay that is not part
    /// of a carrier cycle is a `0`.
    pub fn decode_bits(&self, cycles_per_mark: usize) -> String {
        let mut bits = String::new();
        let mut run = 0_usize;
        let mut previous: Option<Event> = None;
        for event in &self.events {
            match event {
                Event::High => run += 1,
                Event::Low => {}
                Event::Delay(_) => {
                    let bare = !matches!(previous, Some(Event::High) | Some(Event::Low));
                    if bare {
                        flush_marks(&mut bits, &mut run, cycles_per_mark);
                        bits.push('0');
                    }
                }
            }
            previous = Some(*event);
        }
        flush_marks(&mut bits, &mut run, cycles_per_mark);
        bits
    }
}

fn flush_marks(bits: &mut String, run: &mut usize, cycles_per_mark: usize) {
    if cycles_per_mark > 0 {
        for _ in 0..*run / cycles_per_mark {
            bits.push('1');
        }
    }
    *run = 0;
}

impl IrOutput for RecordingOutput {
    fn set_high(&mut self) {
        self.events.push(Event::High);
    }

    fn set_low(&mut self) {
        self.events.push(Event::Low);
    }

    fn delay_us(&mut self, us: u32) {
        self.events.push(Event::Delay(us));
    }
}
