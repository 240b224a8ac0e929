//! # Samples Module
//!
//! Physical-unit samples and the processing applied to them after decoding.
//!
//! This module handles:
//! - Scaling raw package samples into volts and amperes
//! - Keeping a bounded window of the most recent samples
//! - Running decode, scale and append for one inbound frame

use serde::Serialize;

pub mod scaler;
pub mod buffer;
pub mod pipeline;

pub use buffer::RollingSampleBuffer;
pub use pipeline::{SamplePipeline, SampleWindow, WindowStats};
pub use scaler::scale;

/// Scaled voltage/current reading
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PhysicalSample {
    /// Voltage in volts
    pub voltage: f64,

    /// Current in amperes
    pub current: f64,
}

impl PhysicalSample {
    pub fn new(voltage: f64, current: f64) -> Self {
        Self { voltage, current }
    }

    /// Instantaneous power in watts
    pub fn power(&self) -> f64 {
        self.voltage * self.current
    }
}
