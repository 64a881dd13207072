pub mod config;
pub mod frame;
pub mod gate;
#[cfg(test)]
mod mock;
pub mod remote;
pub mod transmit;
pub mod types;
pub mod waveform;

pub use config::{ConfigError, HttpConfig, IrHardwareConfig, NetworkConfig, RuntimeConfig};
pub use gate::TriggerGate;
pub use remote::{RemoteControl, ToggleState};
pub use transmit::{TransmitStats, TransmitTask};
pub use types::{AcState, Bit, IrDiagnostics, Symbol};
pub use waveform::{CarrierTiming, IrOutput};
