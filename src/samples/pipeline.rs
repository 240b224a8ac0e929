//! # Sample Pipeline
//!
//! Decode, scale and append for a single inbound frame. Runs synchronously on
//! whatever task receives the frame.

use tracing::trace;

use super::buffer::RollingSampleBuffer;
use super::scaler::scale;
use super::PhysicalSample;
use crate::error::Result;
use crate::protocol::decoder::{decode_frame, decode_legacy_frame};
use crate::protocol::wire::{WireFormat, PACKAGES_PER_FRAME, SAMPLES_PER_PACKAGE};

/// Window delivered to consumers after each frame
#[derive(Debug, Clone, PartialEq)]
pub struct SampleWindow {
    /// Every sample in the window, oldest first
    pub samples: Vec<PhysicalSample>,

    /// How many of the trailing samples came from the latest frame
    pub appended: usize,
}

impl SampleWindow {
    /// Samples contributed by the latest frame
    ///
    /// An `appended` larger than the window yields the whole window.
    pub fn latest(&self) -> &[PhysicalSample] {
        &self.samples[self.samples.len().saturating_sub(self.appended)..]
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Ranges and mean power over the window; `None` when empty
    pub fn stats(&self) -> Option<WindowStats> {
        let first = self.samples.first()?;
        let mut stats = WindowStats {
            voltage_min: first.voltage,
            voltage_max: first.voltage,
            current_min: first.current,
            current_max: first.current,
            mean_power: 0.0,
        };

        let mut power = 0.0;
        for sample in &self.samples {
            stats.voltage_min = stats.voltage_min.min(sample.voltage);
            stats.voltage_max = stats.voltage_max.max(sample.voltage);
            stats.current_min = stats.current_min.min(sample.current);
            stats.current_max = stats.current_max.max(sample.current);
            power += sample.power();
        }
        stats.mean_power = power / self.samples.len() as f64;

        Some(stats)
    }
}

/// Summary of a [`SampleWindow`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    pub voltage_min: f64,
    pub voltage_max: f64,
    pub current_min: f64,
    pub current_max: f64,
    /// Mean of voltage × current, in watts
    pub mean_power: f64,
}

/// Frame-to-window processing for one connection session
#[derive(Debug)]
pub struct SamplePipeline {
    format: WireFormat,
    buffer: RollingSampleBuffer,
}

impl SamplePipeline {
    pub fn new(format: WireFormat, capacity: usize) -> Self {
        Self {
            format,
            buffer: RollingSampleBuffer::new(capacity),
        }
    }

    /// Process one frame and return the updated window
    ///
    /// # Errors
    ///
    /// Returns the decode error for malformed frames. The buffer is left
    /// untouched in that case.
    pub fn ingest(&mut self, frame: &[u8]) -> Result<SampleWindow> {
        let samples = self.decode(frame)?;
        let appended = self.buffer.append(&samples);

        trace!(
            frame_len = frame.len(),
            appended,
            window = self.buffer.len(),
            "Frame appended to sample window"
        );

        Ok(SampleWindow {
            samples: self.buffer.snapshot(),
            appended,
        })
    }

    fn decode(&self, frame: &[u8]) -> Result<Vec<PhysicalSample>> {
        match self.format {
            WireFormat::Scaled => {
                let packages = decode_frame(frame)?;
                let mut samples = Vec::with_capacity(PACKAGES_PER_FRAME * SAMPLES_PER_PACKAGE);
                for package in &packages {
                    samples.extend_from_slice(&scale(package));
                }
                Ok(samples)
            }
            WireFormat::Legacy => decode_legacy_frame(frame),
        }
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    pub fn buffer(&self) -> &RollingSampleBuffer {
        &self.buffer
    }
}
