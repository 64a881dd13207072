use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AcState {
    Off,
    On,
}

impl AcState {
    pub fn from_on(on: bool) -> Self {
        if on {
            Self::On
        } else {
            Self::Off
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::On => "ON",
        }
    }
}

/// One logical bit of the command frame. `One` is a mark (carrier burst),
/// `Zero` is a space (carrier off).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bit {
    Zero,
    One,
}

impl Bit {
    pub fn from_level(high: bool) -> Self {
        if high {
            Self::One
        } else {
            Self::Zero
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Self::Zero => '0',
            Self::One => '1',
        }
    }
}

/// A bit rendered as an on-air interval in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Mark(u32),
    Space(u32),
}

impl Symbol {
    pub fn duration_us(self) -> u32 {
        match self {
            Self::Mark(us) | Self::Space(us) => us,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IrDiagnostics {
    #[serde(rename = "acState")]
    pub ac_state: AcState,
    #[serde(rename = "carrierHz")]
    pub carrier_hz: u32,
    #[serde(rename = "halfCycleUs")]
    pub half_cycle_us: u32,
    #[serde(rename = "cycleCostUs")]
    pub cycle_cost_us: u32,
    #[serde(rename = "bitUs")]
    pub bit_us: u32,
    #[serde(rename = "cyclesPerMark")]
    pub cycles_per_mark: u32,
    #[serde(rename = "frameBits")]
    pub frame_bits: usize,
    #[serde(rename = "frameDurationUs")]
    pub frame_duration_us: u64,
    pub pending: bool,
    pub signals: u64,
    pub coalesced: u64,
    pub transmissions: u64,
    #[serde(rename = "lastTransmitUs")]
    pub last_transmit_us: Option<u64>,
    #[serde(rename = "lastTransmitMs")]
    pub last_transmit_ms: Option<u64>,
}
