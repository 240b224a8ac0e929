//! # Frame Encoder
//!
//! Encodes sample packages into the wattmeter's wire format. The device is the
//! only producer of real frames; this side exists to build reference frames for
//! tests and for feeding a monitor from recorded or synthetic data.

use bytes::{BufMut, BytesMut};

use super::wire::*;
use crate::samples::PhysicalSample;

/// Encode three packages into a complete frame
///
/// # Arguments
///
/// * `packages` - Packages in wire order
///
/// # Returns
///
/// * `Vec<u8>` - 816-byte frame
///
/// # Examples
///
/// ```
/// use wattmeter_monitor::protocol::encoder::encode_frame;
/// use wattmeter_monitor::protocol::wire::{RawSample, SamplesPackage, FRAME_SIZE};
///
/// let package = SamplesPackage::filled(0, 1.0, 1.0, RawSample::default());
/// let frame = encode_frame(&[package; 3]);
/// assert_eq!(frame.len(), FRAME_SIZE);
/// ```
pub fn encode_frame(packages: &[SamplesPackage; PACKAGES_PER_FRAME]) -> Vec<u8> {
    let mut frame = BytesMut::with_capacity(FRAME_SIZE);
    for package in packages {
        encode_package(package, &mut frame);
    }
    frame.to_vec()
}

/// Append one 272-byte package record to `out`
pub fn encode_package(package: &SamplesPackage, out: &mut BytesMut) {
    out.reserve(PACKAGE_SIZE);
    out.put_u64_le(package.time);
    out.put_f32_le(package.voltage_scale_factor);
    out.put_f32_le(package.current_scale_factor);
    for sample in &package.samples {
        out.put_i16_le(sample.voltage);
        out.put_i16_le(sample.current);
    }
}

/// Encode physical samples in the legacy `f32` pair format
///
/// Values are narrowed to `f32` as the device sends them.
pub fn encode_legacy_frame(samples: &[PhysicalSample]) -> Vec<u8> {
    let mut frame = BytesMut::with_capacity(samples.len() * LEGACY_SAMPLE_SIZE);
    for sample in samples {
        frame.put_f32_le(sample.voltage as f32);
        frame.put_f32_le(sample.current as f32);
    }
    frame.to_vec()
}
