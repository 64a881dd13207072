use thiserror::Error;

use crate::waveform::{
    CarrierTiming, DEFAULT_BIT_US, DEFAULT_EDGE_OVERHEAD_US, DEFAULT_HALF_CYCLE_US,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid tx pin: {0}")]
    InvalidPin(i32),
    #[error("carrier half cycle must be 1..=100 us, got {0}")]
    InvalidHalfCycle(u32),
    #[error("bit duration {bit_us} us is shorter than one carrier cycle ({cycle_us} us)")]
    BitShorterThanCycle { bit_us: u32, cycle_us: u32 },
    #[error("transmit core {0} does not exist")]
    InvalidCore(u8),
    #[error("transmit stack size {0} is below 2048 bytes")]
    StackTooSmall(usize),
}

const MIN_TRANSMIT_STACK_SIZE: usize = 2 * 1024;

#[derive(Debug, Clone, Default)]
pub struct NetworkConfig {
    pub wifi_ssid: String,
    pub wifi_pass: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrHardwareConfig {
    pub tx_pin: i32,
    pub half_cycle_us: u32,
    pub edge_overhead_us: u32,
    pub bit_us: u32,
    /// The transmit thread gets this core to itself; networking stays on core 0.
    pub transmit_core: u8,
    pub transmit_priority: u8,
    pub transmit_stack_size: usize,
}

impl Default for IrHardwareConfig {
    fn default() -> Self {
        Self {
            tx_pin: 2,
            half_cycle_us: DEFAULT_HALF_CYCLE_US,
            edge_overhead_us: DEFAULT_EDGE_OVERHEAD_US,
            bit_us: DEFAULT_BIT_US,
            transmit_core: 1,
            transmit_priority: 24,
            transmit_stack_size: 4 * 1024,
        }
    }
}

impl IrHardwareConfig {
    pub fn sanitize(&mut self) {
        if self.tx_pin < 0 {
            self.tx_pin = 2;
        }

        if self.transmit_core > 1 {
            self.transmit_core = 1;
        }

        self.half_cycle_us = self.half_cycle_us.clamp(1, 100);
        self.transmit_priority = self.transmit_priority.clamp(1, 24);
        self.transmit_stack_size = self.transmit_stack_size.max(MIN_TRANSMIT_STACK_SIZE);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tx_pin < 0 {
            return Err(ConfigError::InvalidPin(self.tx_pin));
        }
        if !(1..=100).contains(&self.half_cycle_us) {
            return Err(ConfigError::InvalidHalfCycle(self.half_cycle_us));
        }
        let cycle_us = self.timing().cycle_cost_us();
        if self.bit_us < cycle_us {
            return Err(ConfigError::BitShorterThanCycle {
                bit_us: self.bit_us,
                cycle_us,
            });
        }
        if self.transmit_core > 1 {
            return Err(ConfigError::InvalidCore(self.transmit_core));
        }
        if self.transmit_stack_size < MIN_TRANSMIT_STACK_SIZE {
            return Err(ConfigError::StackTooSmall(self.transmit_stack_size));
        }
        Ok(())
    }

    pub fn timing(&self) -> CarrierTiming {
        CarrierTiming {
            high_us: self.half_cycle_us,
            low_us: self.half_cycle_us,
            edge_overhead_us: self.edge_overhead_us,
            bit_us: self.bit_us,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    pub port: u16,
    pub stack_size: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            stack_size: 8 * 1024,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    pub network: NetworkConfig,
    pub ir: IrHardwareConfig,
    pub http: HttpConfig,
}
