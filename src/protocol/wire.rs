//! # Wire Format Constants and Types
//!
//! Core definitions for the wattmeter's binary sample stream.
//!
//! One transport message (a frame) carries three package records back to back:
//!
//! ```text
//! offset  size  field
//! 0       8     timestamp            (u64, little-endian)
//! 8       4     voltage scale factor (f32, little-endian)
//! 12      4     current scale factor (f32, little-endian)
//! 16      256   64 × { voltage: i16, current: i16 }
//! ```

use serde::Deserialize;

/// Number of raw samples in one package
pub const SAMPLES_PER_PACKAGE: usize = 64;

/// Number of packages in one frame
pub const PACKAGES_PER_FRAME: usize = 3;

/// Size of the package header (timestamp + two scale factors)
pub const PACKAGE_HEADER_SIZE: usize = 8 + 4 + 4;

/// Size of one raw sample on the wire (two i16)
pub const RAW_SAMPLE_SIZE: usize = 4;

/// Size of one package record (272 bytes)
pub const PACKAGE_SIZE: usize = PACKAGE_HEADER_SIZE + SAMPLES_PER_PACKAGE * RAW_SAMPLE_SIZE;

/// Size of one frame (816 bytes)
pub const FRAME_SIZE: usize = PACKAGE_SIZE * PACKAGES_PER_FRAME;

/// Size of one legacy sample record (two f32)
pub const LEGACY_SAMPLE_SIZE: usize = 8;

/// Unscaled ADC reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawSample {
    /// Voltage channel counts
    pub voltage: i16,

    /// Current channel counts
    pub current: i16,
}

/// One decoded package record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplesPackage {
    /// Device timestamp of the package
    pub time: u64,

    /// Factor converting voltage counts to volts
    pub voltage_scale_factor: f32,

    /// Factor converting current counts to amperes
    pub current_scale_factor: f32,

    /// Raw samples, oldest first
    pub samples: [RawSample; SAMPLES_PER_PACKAGE],
}

impl SamplesPackage {
    /// Create a package with every sample set to `sample`
    pub fn filled(
        time: u64,
        voltage_scale_factor: f32,
        current_scale_factor: f32,
        sample: RawSample,
    ) -> Self {
        Self {
            time,
            voltage_scale_factor,
            current_scale_factor,
            samples: [sample; SAMPLES_PER_PACKAGE],
        }
    }
}

/// Encoding used by the device for its frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// Three packages of scaled i16 samples per frame
    #[default]
    Scaled,

    /// Flat f32 voltage/current pairs already in physical units
    Legacy,
}
