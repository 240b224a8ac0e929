//! # Frame Decoder
//!
//! Decodes binary frames received from the wattmeter.

use bytes::Buf;

use super::wire::*;
use crate::error::{MonitorError, Result};
use crate::samples::PhysicalSample;

/// Decode a complete scaled-format frame
///
/// # Arguments
///
/// * `frame` - Frame bytes as received from the transport
///
/// # Returns
///
/// * `Result<[SamplesPackage; 3]>` - The three packages in wire order
///
/// # Errors
///
/// Returns `FrameTooShort` if the frame holds fewer than 816 bytes. Nothing
/// is decoded in that case. Bytes past the third record are ignored.
pub fn decode_frame(frame: &[u8]) -> Result<[SamplesPackage; PACKAGES_PER_FRAME]> {
    if frame.len() < FRAME_SIZE {
        return Err(MonitorError::FrameTooShort {
            expected: FRAME_SIZE,
            actual: frame.len(),
        });
    }

    let mut buf = &frame[..FRAME_SIZE];
    Ok(std::array::from_fn(|_| read_package(&mut buf)))
}

/// Decode a single package record
///
/// # Arguments
///
/// * `record` - At least 272 bytes starting at a record boundary
///
/// # Errors
///
/// Returns `FrameTooShort` if the record is truncated
pub fn decode_package(record: &[u8]) -> Result<SamplesPackage> {
    if record.len() < PACKAGE_SIZE {
        return Err(MonitorError::FrameTooShort {
            expected: PACKAGE_SIZE,
            actual: record.len(),
        });
    }

    let mut buf = &record[..PACKAGE_SIZE];
    Ok(read_package(&mut buf))
}

/// Decode a legacy frame of `f32` voltage/current pairs
///
/// # Errors
///
/// Returns `MisalignedFrame` if the length is not a multiple of 8
pub fn decode_legacy_frame(frame: &[u8]) -> Result<Vec<PhysicalSample>> {
    if frame.len() % LEGACY_SAMPLE_SIZE != 0 {
        return Err(MonitorError::MisalignedFrame {
            len: frame.len(),
            record_size: LEGACY_SAMPLE_SIZE,
        });
    }

    let mut buf = frame;
    let mut samples = Vec::with_capacity(frame.len() / LEGACY_SAMPLE_SIZE);
    while buf.has_remaining() {
        let voltage = buf.get_f32_le();
        let current = buf.get_f32_le();
        samples.push(PhysicalSample::new(f64::from(voltage), f64::from(current)));
    }

    Ok(samples)
}

// Caller guarantees PACKAGE_SIZE bytes remain.
fn read_package(buf: &mut &[u8]) -> SamplesPackage {
    let time = buf.get_u64_le();
    let voltage_scale_factor = buf.get_f32_le();
    let current_scale_factor = buf.get_f32_le();
    let samples = std::array::from_fn(|_| RawSample {
        voltage: buf.get_i16_le(),
        current: buf.get_i16_le(),
    });

    SamplesPackage {
        time,
        voltage_scale_factor,
        current_scale_factor,
        samples,
    }
}
